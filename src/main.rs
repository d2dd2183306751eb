use std::env;

use clap::Parser;

#[tokio::main]
async fn main() {
    env_logger::init();

    let raw_args: Vec<String> = env::args().collect();
    if raw_args.get(1).map(|s| s.as_str()) == Some("serve") {
        let port = raw_args
            .get(2)
            .and_then(|s| s.parse::<u16>().ok())
            .unwrap_or(8080);
        if let Err(e) = drawdown::api::run_http_server(port).await {
            eprintln!("Server error: {e}");
            std::process::exit(1);
        }
        return;
    }

    let cli = drawdown::api::Cli::parse();
    match drawdown::api::run_cli(cli) {
        Ok(report) => print!("{report}"),
        Err(msg) => {
            eprintln!("Error: {msg}");
            std::process::exit(2);
        }
    }
}

mod format;

use axum::{
    Router,
    extract::{
        Json, Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    http::{StatusCode, header},
    response::{Html, IntoResponse, Response},
    routing::get,
};
use clap::Parser;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;

use crate::core::{
    HistoricalSeries, ProjectionParameters, ProjectionRow, ProjectionSummary, SeriesField,
    SeriesParameters, SharedProjectionCache, WithdrawalAdjustment, average, project_constant,
    project_from_series, summarize,
};

pub use format::{format_currency, format_percent, render_summary, render_table};

const INDEX_HTML: &str = include_str!("../../web/index.html");
const STYLES_CSS: &str = include_str!("../../web/styles.css");
const APP_JS: &str = include_str!("../../web/app.js");

const CACHE_CAPACITY: usize = 256;
const MAX_HORIZON_YEARS: u32 = 500;

#[derive(Parser, Debug, Clone)]
#[command(
    name = "drawdown",
    about = "Retirement withdrawal projections under the 4% rule, with constant or historical returns"
)]
pub struct Cli {
    #[arg(long, default_value_t = 1_000_000.0, help = "Starting principal")]
    pub principal: f64,
    #[arg(
        long,
        default_value_t = 9.58,
        allow_negative_numbers = true,
        help = "Expected annual return in percent"
    )]
    pub return_rate: f64,
    #[arg(long, default_value_t = 30, help = "Years to project")]
    pub years: u32,
    #[arg(
        long,
        default_value_t = 4.0,
        help = "First-year withdrawal as a percent of the balance"
    )]
    pub withdrawal_rate: f64,
    #[arg(
        long,
        default_value_t = 2.53,
        allow_negative_numbers = true,
        help = "Annual inflation in percent, applied to the withdrawal rate"
    )]
    pub inflation_rate: f64,
    #[arg(long, help = "Withdraw the same rate every year instead of raising it with inflation")]
    pub flat_withdrawal: bool,
    #[arg(long, help = "Also replay the withdrawal plan against recorded market history")]
    pub historical: bool,
    #[arg(
        long,
        help = "CSV with year,return_percent,inflation_percent columns; defaults to S&P 500 1993-2023"
    )]
    pub series_csv: Option<PathBuf>,
    #[arg(long, help = "First calendar year of the historical replay")]
    pub start_year: Option<i32>,
}

impl Cli {
    fn adjustment(&self) -> WithdrawalAdjustment {
        if self.flat_withdrawal {
            WithdrawalAdjustment::Flat
        } else {
            WithdrawalAdjustment::InflationAdjusted
        }
    }
}

fn check_horizon(cli: &Cli) -> Result<(), String> {
    if cli.years > MAX_HORIZON_YEARS {
        return Err(format!("--years must be <= {MAX_HORIZON_YEARS}"));
    }
    Ok(())
}

fn build_projection_parameters(cli: &Cli) -> Result<ProjectionParameters, String> {
    check_horizon(cli)?;
    Ok(ProjectionParameters {
        initial_principal: cli.principal,
        annual_return_rate: cli.return_rate / 100.0,
        horizon_periods: cli.years,
        initial_withdrawal_rate: cli.withdrawal_rate / 100.0,
        inflation_rate: cli.inflation_rate / 100.0,
        adjustment: cli.adjustment(),
    })
}

fn build_series_parameters(cli: &Cli) -> Result<SeriesParameters, String> {
    check_horizon(cli)?;
    Ok(SeriesParameters {
        initial_principal: cli.principal,
        initial_withdrawal_rate: cli.withdrawal_rate / 100.0,
        horizon_periods: cli.years,
        adjustment: cli.adjustment(),
    })
}

fn select_series(series: &HistoricalSeries, cli: &Cli) -> Result<HistoricalSeries, String> {
    match cli.start_year {
        Some(year) => series
            .window(year, cli.years as usize)
            .map_err(|e| format!("--start-year {year}: {e}")),
        None => Ok(series.clone()),
    }
}

fn load_series(cli: &Cli) -> Result<HistoricalSeries, String> {
    match &cli.series_csv {
        Some(path) => {
            let file = File::open(path)
                .map_err(|e| format!("--series-csv {}: {e}", path.display()))?;
            HistoricalSeries::from_csv_reader(file)
                .map_err(|e| format!("--series-csv {}: {e}", path.display()))
        }
        None => Ok(HistoricalSeries::sp500_1993_2023()),
    }
}

/// Runs the command-line report: constant projection first, then the
/// historical replay when `--historical` is set.
pub fn run_cli(cli: Cli) -> Result<String, String> {
    let mut out = String::new();

    let rows = project_constant(&build_projection_parameters(&cli)?).map_err(|e| e.to_string())?;
    out.push_str(&render_summary("", &summarize(&rows)));
    out.push('\n');
    out.push_str(&render_table(&rows));

    if cli.historical {
        let params = build_series_parameters(&cli)?;
        let series = select_series(&load_series(&cli)?, &cli)?;
        let rows = project_from_series(&params, series.years())
            .map_err(|e| e.to_string())?;
        let used = &series.years()[..rows.len()];

        out.push('\n');
        out.push_str(&render_summary(" against real data", &summarize(&rows)));
        out.push_str(&format!(
            "Average returns: {}\nAverage inflation: {}\n\n",
            format_percent(average(used, SeriesField::AnnualReturn) / 100.0),
            format_percent(average(used, SeriesField::AnnualInflation) / 100.0)
        ));
        out.push_str(&render_table(&rows));
    }

    Ok(out)
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
enum ApiWithdrawalAdjustment {
    #[serde(alias = "inflationAdjusted", alias = "inflation_adjusted", alias = "inflation")]
    InflationAdjusted,
    Flat,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct ProjectPayload {
    principal: Option<f64>,
    return_rate: Option<f64>,
    years: Option<u32>,
    withdrawal_rate: Option<f64>,
    inflation_rate: Option<f64>,
    withdrawal_adjustment: Option<ApiWithdrawalAdjustment>,
    start_year: Option<i32>,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
enum ResponseMode {
    Constant,
    Historical,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ProjectResponse {
    mode: ResponseMode,
    withdrawal_adjustment: WithdrawalAdjustment,
    #[serde(skip_serializing_if = "Option::is_none")]
    first_year: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    average_return_percent: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    average_inflation_percent: Option<f64>,
    summary: ProjectionSummary,
    rows: Vec<ProjectionRow>,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Clone)]
struct AppState {
    cache: SharedProjectionCache,
    series: Arc<HistoricalSeries>,
}

fn default_cli_for_api() -> Cli {
    Cli {
        principal: 1_000_000.0,
        return_rate: 9.58,
        years: 30,
        withdrawal_rate: 4.0,
        inflation_rate: 2.53,
        flat_withdrawal: false,
        historical: false,
        series_csv: None,
        start_year: None,
    }
}

fn cli_from_payload(payload: ProjectPayload) -> Cli {
    let mut cli = default_cli_for_api();
    if let Some(v) = payload.principal {
        cli.principal = v;
    }
    if let Some(v) = payload.return_rate {
        cli.return_rate = v;
    }
    if let Some(v) = payload.years {
        cli.years = v;
    }
    if let Some(v) = payload.withdrawal_rate {
        cli.withdrawal_rate = v;
    }
    if let Some(v) = payload.inflation_rate {
        cli.inflation_rate = v;
    }
    if let Some(v) = payload.withdrawal_adjustment {
        cli.flat_withdrawal = v == ApiWithdrawalAdjustment::Flat;
    }
    if let Some(v) = payload.start_year {
        cli.start_year = Some(v);
    }
    cli
}

fn constant_response(cache: &SharedProjectionCache, cli: &Cli) -> Result<ProjectResponse, String> {
    let params = build_projection_parameters(cli)?;
    let rows = cache
        .get_or_project_constant(&params)
        .map_err(|e| e.to_string())?;

    Ok(ProjectResponse {
        mode: ResponseMode::Constant,
        withdrawal_adjustment: params.adjustment,
        first_year: None,
        average_return_percent: None,
        average_inflation_percent: None,
        summary: summarize(&rows),
        rows: rows.to_vec(),
    })
}

fn historical_response(
    cache: &SharedProjectionCache,
    series: &HistoricalSeries,
    cli: &Cli,
) -> Result<ProjectResponse, String> {
    let params = build_series_parameters(cli)?;
    let series = select_series(series, cli)?;
    let rows = cache
        .get_or_project_series(&params, series.years())
        .map_err(|e| e.to_string())?;
    let used = &series.years()[..rows.len()];

    Ok(ProjectResponse {
        mode: ResponseMode::Historical,
        withdrawal_adjustment: params.adjustment,
        first_year: series.first_year(),
        average_return_percent: Some(average(used, SeriesField::AnnualReturn)),
        average_inflation_percent: Some(average(used, SeriesField::AnnualInflation)),
        summary: summarize(&rows),
        rows: rows.to_vec(),
    })
}

pub async fn run_http_server(port: u16) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let state = AppState {
        cache: SharedProjectionCache::new(CACHE_CAPACITY),
        series: Arc::new(HistoricalSeries::sp500_1993_2023()),
    };
    let app = Router::new()
        .route("/", get(index_handler))
        .route("/index.html", get(index_handler))
        .route("/styles.css", get(styles_handler))
        .route("/app.js", get(app_js_handler))
        .route(
            "/api/project",
            get(project_get_handler).post(project_post_handler),
        )
        .route(
            "/api/historical",
            get(historical_get_handler).post(historical_post_handler),
        )
        .fallback(not_found_handler)
        .with_state(state);

    let listener = TcpListener::bind(addr).await?;
    info!("drawdown HTTP API listening on http://{addr}");
    info!("local access: http://127.0.0.1:{port}/");

    axum::serve(listener, app).await
}

async fn index_handler() -> impl IntoResponse {
    with_cache_control(Html(INDEX_HTML))
}

async fn styles_handler() -> impl IntoResponse {
    with_cache_control((
        [(header::CONTENT_TYPE, "text/css; charset=utf-8")],
        STYLES_CSS,
    ))
}

async fn app_js_handler() -> impl IntoResponse {
    with_cache_control((
        [(
            header::CONTENT_TYPE,
            "application/javascript; charset=utf-8",
        )],
        APP_JS,
    ))
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

async fn project_get_handler(
    State(state): State<AppState>,
    payload: Result<Query<ProjectPayload>, QueryRejection>,
) -> Response {
    match payload {
        Ok(Query(payload)) => project_handler_impl(&state, payload),
        Err(rejection) => rejected_payload(rejection.body_text()),
    }
}

async fn project_post_handler(
    State(state): State<AppState>,
    payload: Result<Json<ProjectPayload>, JsonRejection>,
) -> Response {
    match payload {
        Ok(Json(payload)) => project_handler_impl(&state, payload),
        Err(rejection) => rejected_payload(rejection.body_text()),
    }
}

async fn historical_get_handler(
    State(state): State<AppState>,
    payload: Result<Query<ProjectPayload>, QueryRejection>,
) -> Response {
    match payload {
        Ok(Query(payload)) => historical_handler_impl(&state, payload),
        Err(rejection) => rejected_payload(rejection.body_text()),
    }
}

async fn historical_post_handler(
    State(state): State<AppState>,
    payload: Result<Json<ProjectPayload>, JsonRejection>,
) -> Response {
    match payload {
        Ok(Json(payload)) => historical_handler_impl(&state, payload),
        Err(rejection) => rejected_payload(rejection.body_text()),
    }
}

fn rejected_payload(msg: String) -> Response {
    warn!("rejected malformed payload: {msg}");
    error_response(StatusCode::BAD_REQUEST, &msg)
}

fn project_handler_impl(state: &AppState, payload: ProjectPayload) -> Response {
    let cli = cli_from_payload(payload);
    match constant_response(&state.cache, &cli) {
        Ok(response) => json_response(StatusCode::OK, response),
        Err(msg) => {
            warn!("rejected constant projection: {msg}");
            error_response(StatusCode::BAD_REQUEST, &msg)
        }
    }
}

fn historical_handler_impl(state: &AppState, payload: ProjectPayload) -> Response {
    let cli = cli_from_payload(payload);
    match historical_response(&state.cache, &state.series, &cli) {
        Ok(response) => json_response(StatusCode::OK, response),
        Err(msg) => {
            warn!("rejected historical projection: {msg}");
            error_response(StatusCode::BAD_REQUEST, &msg)
        }
    }
}

fn with_cache_control<R: IntoResponse>(response: R) -> Response {
    let mut response = response.into_response();
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        header::HeaderValue::from_static("no-store"),
    );
    response
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    with_cache_control((status, Json(body)))
}

fn error_response(status: StatusCode, msg: &str) -> Response {
    json_response(
        status,
        ErrorResponse {
            error: msg.to_string(),
        },
    )
}

#[cfg(test)]
fn cli_from_json(json: &str) -> Result<Cli, String> {
    let payload = serde_json::from_str::<ProjectPayload>(json)
        .map_err(|e| format!("Invalid API JSON payload: {e}"))?;
    Ok(cli_from_payload(payload))
}

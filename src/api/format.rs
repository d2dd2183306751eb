use std::fmt::Write;

use crate::core::{ProjectionRow, ProjectionSummary};

/// `$#,##0.00`, with a leading minus for shortfalls: `-$1,234.50`.
pub fn format_currency(value: f64) -> String {
    let fixed = format!("{:.2}", value.abs());
    let (whole, cents) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (idx, digit) in whole.chars().enumerate() {
        if idx > 0 && (whole.len() - idx) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    // -0.001 rounds to 0.00 and should not print as a shortfall
    let sign = if value < 0.0 && fixed != "0.00" { "-" } else { "" };
    format!("{sign}${grouped}.{cents}")
}

/// `0.00%` from a decimal fraction.
pub fn format_percent(fraction: f64) -> String {
    format!("{:.2}%", fraction * 100.0)
}

pub fn render_summary(label: &str, summary: &ProjectionSummary) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Total interest earned{label}: {}",
        format_currency(summary.total_interest_earned)
    );
    let _ = writeln!(
        out,
        "Total amount withdrawn{label}: {}",
        format_currency(summary.total_withdrawal_amount)
    );
    let _ = writeln!(
        out,
        "Ending principal{label}: {}",
        format_currency(summary.final_principal)
    );
    if let Some(period) = summary.depleted_at {
        let _ = writeln!(out, "Fund exhausted in year {period}");
    }
    out
}

pub fn render_table(rows: &[ProjectionRow]) -> String {
    let with_market = rows.iter().any(|r| r.yearly_return_percent.is_some());

    let mut out = String::new();
    let _ = write!(
        out,
        "{:>5} {:>20} {:>18} {:>18}",
        "Year", "Principal Amount", "Interest Earned", "Withdrawal Amount"
    );
    if with_market {
        let _ = write!(out, " {:>10} {:>10}", "Return", "Inflation");
    }
    out.push('\n');

    for row in rows {
        let _ = write!(
            out,
            "{:>5} {:>20} {:>18} {:>18}",
            row.period_index,
            format_currency(row.principal),
            format_currency(row.interest_earned),
            format_currency(row.withdrawal_amount)
        );
        if with_market {
            let ret = row.yearly_return_percent.unwrap_or(0.0) / 100.0;
            let infl = row.yearly_inflation_percent.unwrap_or(0.0) / 100.0;
            let _ = write!(out, " {:>10} {:>10}", format_percent(ret), format_percent(infl));
        }
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn currency_groups_thousands() {
        assert_eq!(format_currency(0.0), "$0.00");
        assert_eq!(format_currency(999.999), "$1,000.00");
        assert_eq!(format_currency(3_955.2), "$3,955.20");
        assert_eq!(format_currency(1_234_567.891), "$1,234,567.89");
        assert_eq!(format_currency(100_000.0), "$100,000.00");
    }

    #[test]
    fn currency_marks_shortfalls() {
        assert_eq!(format_currency(-50_000.0), "-$50,000.00");
        assert_eq!(format_currency(-0.001), "$0.00");
    }

    #[test]
    fn percent_uses_two_decimals() {
        assert_eq!(format_percent(0.0253), "2.53%");
        assert_eq!(format_percent(-0.3849), "-38.49%");
        assert_eq!(format_percent(0.0), "0.00%");
    }

    #[test]
    fn table_adds_market_columns_only_for_historical_rows() {
        let constant = [ProjectionRow {
            period_index: 0,
            principal: 1_000.0,
            interest_earned: 50.0,
            withdrawal_amount: 42.0,
            yearly_return_percent: None,
            yearly_inflation_percent: None,
        }];
        let table = render_table(&constant);
        assert!(table.contains("$1,000.00"));
        assert!(!table.contains("Inflation"));

        let historical = [ProjectionRow {
            yearly_return_percent: Some(7.06),
            yearly_inflation_percent: Some(2.7),
            ..constant[0]
        }];
        let table = render_table(&historical);
        assert!(table.contains("Inflation"));
        assert!(table.contains("7.06%"));
        assert!(table.contains("2.70%"));
    }

    #[test]
    fn summary_reports_exhaustion() {
        let summary = ProjectionSummary {
            total_interest_earned: 0.0,
            total_withdrawal_amount: 150_000.0,
            final_principal: -50_000.0,
            depleted_at: Some(1),
        };
        let text = render_summary("", &summary);
        assert!(text.contains("Total amount withdrawn: $150,000.00"));
        assert!(text.contains("Ending principal: -$50,000.00"));
        assert!(text.contains("Fund exhausted in year 1"));
    }
}

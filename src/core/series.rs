use std::io::Read;

use serde::Deserialize;

use super::error::{ProjectionError, SeriesLoadError};
use super::types::{HistoricalYear, ProjectionRow, ProjectionSummary, SeriesField};

/// S&P 500 total return and US CPI inflation, percent, 1993 through 2023.
const SP500_1993_2023: [(i32, f64, f64); 31] = [
    (1993, 7.06, 2.70),
    (1994, -1.54, 2.70),
    (1995, 34.11, 2.50),
    (1996, 20.26, 3.30),
    (1997, 31.01, 1.70),
    (1998, 26.67, 1.60),
    (1999, 19.53, 2.70),
    (2000, -10.14, 3.40),
    (2001, -13.04, 1.60),
    (2002, -23.37, 2.40),
    (2003, 26.38, 1.90),
    (2004, 8.99, 3.30),
    (2005, 3.00, 3.40),
    (2006, 13.62, 2.50),
    (2007, 3.53, 4.10),
    (2008, -38.49, 0.10),
    (2009, 23.45, 2.70),
    (2010, 12.78, 1.50),
    (2011, 0.00, 3.00),
    (2012, 13.41, 1.70),
    (2013, 29.60, 1.50),
    (2014, 11.39, 0.80),
    (2015, -0.73, 0.70),
    (2016, 9.54, 2.10),
    (2017, 19.42, 2.10),
    (2018, -6.24, 1.90),
    (2019, 28.88, 2.30),
    (2020, 16.26, 1.40),
    (2021, 26.89, 7.00),
    (2022, -19.44, 6.50),
    (2023, 24.23, 3.40),
];

/// Ordered, year-aligned market history ready for [`super::project_from_series`].
#[derive(Debug, Clone, PartialEq)]
pub struct HistoricalSeries {
    years: Vec<HistoricalYear>,
}

#[derive(Debug, Deserialize)]
struct CsvYear {
    year: i32,
    return_percent: f64,
    inflation_percent: f64,
}

impl HistoricalSeries {
    pub fn new(years: Vec<HistoricalYear>) -> Self {
        Self { years }
    }

    pub fn sp500_1993_2023() -> Self {
        Self::new(
            SP500_1993_2023
                .iter()
                .map(|&(year, ret, infl)| HistoricalYear {
                    year,
                    annual_return_percent: ret,
                    annual_inflation_percent: infl,
                })
                .collect(),
        )
    }

    /// Reads `year,return_percent,inflation_percent` records. Rows are sorted
    /// by year; duplicate years and non-finite values are rejected.
    pub fn from_csv_reader<R: Read>(reader: R) -> Result<Self, SeriesLoadError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);

        let mut years = Vec::new();
        for (idx, record) in csv_reader.deserialize::<CsvYear>().enumerate() {
            let record = record?;
            let row = idx + 1;
            if !record.return_percent.is_finite() || !record.inflation_percent.is_finite() {
                return Err(SeriesLoadError::InvalidRow {
                    row,
                    message: format!("year {} has a non-finite value", record.year),
                });
            }
            years.push(HistoricalYear {
                year: record.year,
                annual_return_percent: record.return_percent,
                annual_inflation_percent: record.inflation_percent,
            });
        }

        if years.is_empty() {
            return Err(SeriesLoadError::Empty);
        }
        years.sort_by_key(|y| y.year);
        if let Some(pair) = years.windows(2).find(|pair| pair[0].year == pair[1].year) {
            return Err(SeriesLoadError::DuplicateYear(pair[0].year));
        }

        Ok(Self::new(years))
    }

    /// Sub-series of `len` years starting at `start_year`.
    pub fn window(&self, start_year: i32, len: usize) -> Result<Self, ProjectionError> {
        let start = self
            .years
            .iter()
            .position(|y| y.year == start_year)
            .ok_or(ProjectionError::UnknownStartYear { year: start_year })?;
        let available = self.years.len() - start;
        if available < len {
            return Err(ProjectionError::SeriesTooShort {
                required: len,
                available,
            });
        }
        Ok(Self::new(self.years[start..start + len].to_vec()))
    }

    pub fn years(&self) -> &[HistoricalYear] {
        &self.years
    }

    pub fn len(&self) -> usize {
        self.years.len()
    }

    pub fn is_empty(&self) -> bool {
        self.years.is_empty()
    }

    pub fn first_year(&self) -> Option<i32> {
        self.years.first().map(|y| y.year)
    }
}

pub fn summarize(rows: &[ProjectionRow]) -> ProjectionSummary {
    let mut summary = ProjectionSummary {
        total_interest_earned: 0.0,
        total_withdrawal_amount: 0.0,
        final_principal: rows.last().map(|r| r.principal).unwrap_or(0.0),
        depleted_at: None,
    };
    for row in rows {
        summary.total_interest_earned += row.interest_earned;
        summary.total_withdrawal_amount += row.withdrawal_amount;
        if summary.depleted_at.is_none() && row.principal < 0.0 {
            summary.depleted_at = Some(row.period_index);
        }
    }
    summary
}

/// Mean of `field` across the series, in percent. An empty series averages to 0.
pub fn average(series: &[HistoricalYear], field: SeriesField) -> f64 {
    if series.is_empty() {
        return 0.0;
    }
    series.iter().map(|y| field.read(y)).sum::<f64>() / series.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ProjectionParameters, WithdrawalAdjustment, project_constant};
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    #[test]
    fn embedded_table_spans_thirty_one_years() {
        let series = HistoricalSeries::sp500_1993_2023();
        assert_eq!(series.len(), 31);
        assert_eq!(series.first_year(), Some(1993));
        assert_eq!(series.years().last().map(|y| y.year), Some(2023));
        let crash = series.years()[15];
        assert_eq!(crash.year, 2008);
        assert_eq!(crash.annual_return_percent, -38.49);
    }

    #[test]
    fn embedded_table_averages() {
        let series = HistoricalSeries::sp500_1993_2023();
        let avg_return = average(series.years(), SeriesField::AnnualReturn);
        let avg_inflation = average(series.years(), SeriesField::AnnualInflation);
        assert_relative_eq!(avg_return, 297.02 / 31.0, max_relative = 1e-9);
        assert_relative_eq!(avg_inflation, 78.5 / 31.0, max_relative = 1e-9);
    }

    #[test]
    fn average_of_empty_series_is_zero() {
        assert_eq!(average(&[], SeriesField::AnnualReturn), 0.0);
    }

    #[test]
    fn window_selects_consecutive_years() {
        let series = HistoricalSeries::sp500_1993_2023();
        let window = series.window(2000, 5).expect("in range");
        assert_eq!(window.len(), 5);
        assert_eq!(window.first_year(), Some(2000));
        assert_eq!(window.years()[4].year, 2004);
    }

    #[test]
    fn window_past_the_end_is_too_short() {
        let series = HistoricalSeries::sp500_1993_2023();
        assert_eq!(
            series.window(2020, 10),
            Err(ProjectionError::SeriesTooShort {
                required: 10,
                available: 4
            })
        );
    }

    #[test]
    fn window_names_a_start_year_outside_the_series() {
        let series = HistoricalSeries::sp500_1993_2023();
        let err = series.window(1950, 1).expect_err("1950 is not recorded");
        assert_eq!(err, ProjectionError::UnknownStartYear { year: 1950 });
        assert_eq!(err.to_string(), "historical series has no entry for year 1950");
    }

    #[test]
    fn csv_loader_parses_and_sorts() {
        let data = "year,return_percent,inflation_percent\n\
                    2001, -13.04, 1.6\n\
                    2000,-10.14,3.4\n";
        let series = HistoricalSeries::from_csv_reader(data.as_bytes()).expect("valid csv");
        assert_eq!(series.len(), 2);
        assert_eq!(series.first_year(), Some(2000));
        assert_eq!(series.years()[1].annual_return_percent, -13.04);
        assert_eq!(series.years()[1].annual_inflation_percent, 1.6);
    }

    #[test]
    fn csv_loader_rejects_bad_input() {
        let empty = "year,return_percent,inflation_percent\n";
        assert!(matches!(
            HistoricalSeries::from_csv_reader(empty.as_bytes()),
            Err(SeriesLoadError::Empty)
        ));

        let garbled = "year,return_percent,inflation_percent\n2000,abc,1.0\n";
        assert!(matches!(
            HistoricalSeries::from_csv_reader(garbled.as_bytes()),
            Err(SeriesLoadError::Csv(_))
        ));

        let duplicate = "year,return_percent,inflation_percent\n2000,1,1\n2000,2,2\n";
        let err = HistoricalSeries::from_csv_reader(duplicate.as_bytes()).expect_err("dup");
        assert!(err.to_string().contains("2000 appears more than once"));

        let nan = "year,return_percent,inflation_percent\n2000,NaN,1\n";
        assert!(matches!(
            HistoricalSeries::from_csv_reader(nan.as_bytes()),
            Err(SeriesLoadError::InvalidRow { row: 1, .. })
        ));
    }

    #[test]
    fn summarize_reports_depletion_point() {
        let params = ProjectionParameters {
            initial_principal: 100_000.0,
            annual_return_rate: 0.0,
            horizon_periods: 3,
            initial_withdrawal_rate: 1.5,
            inflation_rate: 0.0,
            adjustment: WithdrawalAdjustment::Flat,
        };
        let rows = project_constant(&params).expect("valid params");
        let summary = summarize(&rows);
        assert_eq!(summary.depleted_at, Some(1));
        assert_eq!(summary.final_principal, rows[3].principal);
    }

    #[test]
    fn summarize_of_no_rows_is_zeroed() {
        let summary = summarize(&[]);
        assert_eq!(summary.total_interest_earned, 0.0);
        assert_eq!(summary.total_withdrawal_amount, 0.0);
        assert_eq!(summary.final_principal, 0.0);
        assert_eq!(summary.depleted_at, None);
    }

    proptest! {
        #![proptest_config(proptest::test_runner::Config::with_cases(48))]

        #[test]
        fn prop_summary_matches_independent_sums(
            principal in 1u32..5_000_000,
            ret_bp in -3_000i32..3_000,
            horizon in 1u32..50,
            wd_bp in 0u32..1_500,
            infl_bp in 0u32..800,
        ) {
            let params = ProjectionParameters {
                initial_principal: principal as f64,
                annual_return_rate: ret_bp as f64 / 10_000.0,
                horizon_periods: horizon,
                initial_withdrawal_rate: wd_bp as f64 / 10_000.0,
                inflation_rate: infl_bp as f64 / 10_000.0,
                adjustment: WithdrawalAdjustment::InflationAdjusted,
            };
            let rows = project_constant(&params).expect("valid params");
            let summary = summarize(&rows);

            let interest: f64 = rows.iter().map(|r| r.interest_earned).sum();
            let withdrawn: f64 = rows.iter().map(|r| r.withdrawal_amount).sum();
            prop_assert!((summary.total_interest_earned - interest).abs() <= 1e-9 * interest.abs().max(1.0));
            prop_assert!((summary.total_withdrawal_amount - withdrawn).abs() <= 1e-9 * withdrawn.abs().max(1.0));
        }
    }
}

use serde::{Deserialize, Serialize};

/// How the withdrawal rate evolves after the first period.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WithdrawalAdjustment {
    /// Compound the rate by `(1 + inflation)` after every period from 1 onwards.
    #[default]
    InflationAdjusted,
    /// Keep withdrawing the initial rate for the whole horizon.
    Flat,
}

/// Constant-assumption inputs. Rates are decimal fractions (0.04 = 4%).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProjectionParameters {
    pub initial_principal: f64,
    pub annual_return_rate: f64,
    pub horizon_periods: u32,
    pub initial_withdrawal_rate: f64,
    pub inflation_rate: f64,
    pub adjustment: WithdrawalAdjustment,
}

/// Inputs for replaying a recorded market history. Returns and inflation come
/// from the series, so only the principal and starting rate are held here.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeriesParameters {
    pub initial_principal: f64,
    pub initial_withdrawal_rate: f64,
    pub horizon_periods: u32,
    pub adjustment: WithdrawalAdjustment,
}

/// One calendar year of market history, in percent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoricalYear {
    pub year: i32,
    pub annual_return_percent: f64,
    pub annual_inflation_percent: f64,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SeriesField {
    AnnualReturn,
    AnnualInflation,
}

impl SeriesField {
    pub fn read(self, year: &HistoricalYear) -> f64 {
        match self {
            SeriesField::AnnualReturn => year.annual_return_percent,
            SeriesField::AnnualInflation => year.annual_inflation_percent,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectionRow {
    pub period_index: u32,
    pub principal: f64,
    pub interest_earned: f64,
    pub withdrawal_amount: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub yearly_return_percent: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub yearly_inflation_percent: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectionSummary {
    pub total_interest_earned: f64,
    pub total_withdrawal_amount: f64,
    pub final_principal: f64,
    /// First period whose principal went below zero.
    pub depleted_at: Option<u32>,
}

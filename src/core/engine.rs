use log::debug;

use super::error::{ProjectionError, ensure_finite};
use super::types::{
    HistoricalYear, ProjectionParameters, ProjectionRow, SeriesParameters, WithdrawalAdjustment,
};

/// Market conditions applied to a single period. `recorded` carries the
/// original percentages for rows that replay a historical series.
#[derive(Debug, Clone, Copy)]
struct MarketStep {
    return_rate: f64,
    inflation_rate: f64,
    recorded: Option<HistoricalYear>,
}

impl MarketStep {
    fn constant(return_rate: f64, inflation_rate: f64) -> Self {
        Self {
            return_rate,
            inflation_rate,
            recorded: None,
        }
    }

    fn historical(year: HistoricalYear) -> Self {
        Self {
            return_rate: year.annual_return_percent / 100.0,
            inflation_rate: year.annual_inflation_percent / 100.0,
            recorded: Some(year),
        }
    }
}

/// Projects `horizon_periods + 1` rows under constant return and inflation.
///
/// Row 0 records the seed principal. Its interest and withdrawal are computed
/// against that seed and reported, but the withdrawal is never subtracted from
/// any row's principal; period 1 starts again from the untouched seed. This
/// matches the long-standing output of the calculator and is kept for
/// compatibility even though it reads like an off-by-one.
pub fn project_constant(
    params: &ProjectionParameters,
) -> Result<Vec<ProjectionRow>, ProjectionError> {
    validate_constant(params)?;
    debug!(
        "constant projection: principal={} return={} withdrawal={} inflation={} horizon={} adjustment={:?}",
        params.initial_principal,
        params.annual_return_rate,
        params.initial_withdrawal_rate,
        params.inflation_rate,
        params.horizon_periods,
        params.adjustment
    );

    let step = MarketStep::constant(params.annual_return_rate, params.inflation_rate);
    let periods = params.horizon_periods as usize + 1;
    Ok(run_recurrence(
        params.initial_principal,
        params.initial_withdrawal_rate,
        params.adjustment,
        std::iter::repeat_n(step, periods),
    ))
}

/// Replays the first `horizon_periods` entries of `series`, producing one row
/// per entry. Row `t` takes its return and inflation from `series[t]`; the row
/// 0 seeding rule is the same as [`project_constant`].
pub fn project_from_series(
    params: &SeriesParameters,
    series: &[HistoricalYear],
) -> Result<Vec<ProjectionRow>, ProjectionError> {
    validate_series(params, series)?;
    debug!(
        "historical projection: principal={} withdrawal={} horizon={} first_year={:?} adjustment={:?}",
        params.initial_principal,
        params.initial_withdrawal_rate,
        params.horizon_periods,
        series.first().map(|y| y.year),
        params.adjustment
    );

    let used = &series[..params.horizon_periods as usize];
    Ok(run_recurrence(
        params.initial_principal,
        params.initial_withdrawal_rate,
        params.adjustment,
        used.iter().copied().map(MarketStep::historical),
    ))
}

fn validate_constant(params: &ProjectionParameters) -> Result<(), ProjectionError> {
    if params.horizon_periods < 1 {
        return Err(ProjectionError::InvalidHorizon {
            horizon: params.horizon_periods,
        });
    }
    ensure_finite("initial_principal", params.initial_principal)?;
    ensure_finite("annual_return_rate", params.annual_return_rate)?;
    ensure_finite("initial_withdrawal_rate", params.initial_withdrawal_rate)?;
    ensure_finite("inflation_rate", params.inflation_rate)?;
    Ok(())
}

fn validate_series(
    params: &SeriesParameters,
    series: &[HistoricalYear],
) -> Result<(), ProjectionError> {
    if params.horizon_periods < 1 {
        return Err(ProjectionError::InvalidHorizon {
            horizon: params.horizon_periods,
        });
    }
    ensure_finite("initial_principal", params.initial_principal)?;
    ensure_finite("initial_withdrawal_rate", params.initial_withdrawal_rate)?;

    let required = params.horizon_periods as usize;
    if series.len() < required {
        return Err(ProjectionError::SeriesTooShort {
            required,
            available: series.len(),
        });
    }
    for year in &series[..required] {
        ensure_finite("annual_return_percent", year.annual_return_percent)?;
        ensure_finite("annual_inflation_percent", year.annual_inflation_percent)?;
    }
    Ok(())
}

fn run_recurrence<I>(
    initial_principal: f64,
    initial_withdrawal_rate: f64,
    adjustment: WithdrawalAdjustment,
    steps: I,
) -> Vec<ProjectionRow>
where
    I: IntoIterator<Item = MarketStep>,
{
    let mut steps = steps.into_iter();
    let mut rows = Vec::with_capacity(steps.size_hint().0);

    let Some(seed) = steps.next() else {
        return rows;
    };
    let seed_interest = initial_principal * seed.return_rate;
    rows.push(ProjectionRow {
        period_index: 0,
        principal: initial_principal,
        interest_earned: seed_interest,
        withdrawal_amount: (initial_principal + seed_interest) * initial_withdrawal_rate,
        yearly_return_percent: seed.recorded.map(|y| y.annual_return_percent),
        yearly_inflation_percent: seed.recorded.map(|y| y.annual_inflation_percent),
    });

    let mut withdrawal_rate = initial_withdrawal_rate;
    let mut previous = initial_principal;
    for (offset, step) in steps.enumerate() {
        let interest = previous * step.return_rate;
        let new_balance = previous + interest;
        let withdrawal = new_balance * withdrawal_rate;
        if adjustment == WithdrawalAdjustment::InflationAdjusted {
            withdrawal_rate *= 1.0 + step.inflation_rate;
        }
        let principal = new_balance - withdrawal;

        rows.push(ProjectionRow {
            period_index: offset as u32 + 1,
            principal,
            interest_earned: interest,
            withdrawal_amount: withdrawal,
            yearly_return_percent: step.recorded.map(|y| y.annual_return_percent),
            yearly_inflation_percent: step.recorded.map(|y| y.annual_inflation_percent),
        });
        previous = principal;
    }

    rows
}

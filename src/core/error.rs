use thiserror::Error;

/// Precondition violations detected before any projection work starts.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProjectionError {
    #[error("horizon must be at least 1 period, got {horizon}")]
    InvalidHorizon { horizon: u32 },

    #[error("historical series covers {available} years but the horizon needs {required}")]
    SeriesTooShort { required: usize, available: usize },

    #[error("historical series has no entry for year {year}")]
    UnknownStartYear { year: i32 },

    #[error("{field} must be a finite number, got {value}")]
    NonFiniteInput { field: &'static str, value: f64 },
}

/// Failures while reading a user supplied historical series.
#[derive(Debug, Error)]
pub enum SeriesLoadError {
    #[error("failed to read series: {0}")]
    Csv(#[from] csv::Error),

    #[error("series row {row}: {message}")]
    InvalidRow { row: usize, message: String },

    #[error("year {0} appears more than once")]
    DuplicateYear(i32),

    #[error("series contains no rows")]
    Empty,
}

pub(crate) fn ensure_finite(field: &'static str, value: f64) -> Result<(), ProjectionError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ProjectionError::NonFiniteInput { field, value })
    }
}

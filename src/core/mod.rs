mod cache;
mod engine;
mod error;
mod series;
mod types;

pub use cache::{CacheKey, ProjectionCache, SharedProjectionCache, SharedRows};
pub use engine::{project_constant, project_from_series};
pub use error::{ProjectionError, SeriesLoadError};
pub use series::{HistoricalSeries, average, summarize};
pub use types::{
    HistoricalYear, ProjectionParameters, ProjectionRow, ProjectionSummary, SeriesField,
    SeriesParameters, WithdrawalAdjustment,
};

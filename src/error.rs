use crate::fetch::error::PageError;
use crate::stations::error::StationCacheError;
use polars::error::PolarsError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClimateError {
    /// A caller mistake detected before any I/O (bad interval, period, coords or date range).
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A station or climate identifier that does not resolve.
    #[error("Not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Page(#[from] PageError),

    #[error(transparent)]
    StationCache(#[from] StationCacheError),

    #[error("Failed to build HTTP client")]
    HttpClient(#[source] reqwest::Error),

    #[error("Failed to serialize rows")]
    Serialize(#[source] serde_json::Error),

    #[error("Failed to build DataFrame")]
    Frame(#[from] PolarsError),
}

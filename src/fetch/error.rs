use crate::types::record::Record;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PageError {
    #[error("Network request failed for {0}")]
    NetworkRequest(String, #[source] reqwest::Error),

    #[error("HTTP request failed for {url} with status {status_code}")]
    HttpStatus { url: String, status_code: u16 },

    #[error("Failed to decode page returned by {0}")]
    Decode(String, #[source] reqwest::Error),

    #[error("Request to {0} was cancelled")]
    Cancelled(String),

    #[error("Request to {0} timed out")]
    Timeout(String),
}

impl PageError {
    /// HTTP status for non-success responses.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            PageError::HttpStatus { status_code, .. } => Some(*status_code),
            PageError::NetworkRequest(_, e) | PageError::Decode(_, e) => {
                e.status().map(|s| s.as_u16())
            }
            _ => None,
        }
    }
}

/// A collection walk that stopped on a failing page.
///
/// `rows` holds everything flattened before the failure; callers decide whether
/// a partial result is usable.
#[derive(Debug, Error)]
#[error("Collection download stopped after {} rows", rows.len())]
pub struct CollectError {
    pub rows: Vec<Record>,
    #[source]
    pub error: PageError,
}

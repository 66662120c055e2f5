use crate::fetch::error::PageError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StationCacheError {
    #[error("Failed to read cache file '{0}'")]
    CacheRead(PathBuf, #[source] std::io::Error),

    #[error("Failed to decode cache data from '{0}', refresh the cache to replace it")]
    CacheDecode(PathBuf, #[source] Box<bincode::error::DecodeError>),

    #[error("Failed to download the station list")]
    Page(#[from] PageError),

    // Covers errors joining tokio blocking tasks
    #[error("Background task failed to complete")]
    TaskJoin(#[from] tokio::task::JoinError),
}

/// A persistence problem that did not stop the station table from being returned.
#[derive(Debug, Error)]
pub enum CacheWarning {
    #[error("Failed to create cache directory '{0}', using the cache file name as given")]
    DirCreation(PathBuf, #[source] std::io::Error),

    #[error("Failed to write cache file '{0}'")]
    Write(PathBuf, #[source] std::io::Error),

    #[error("Failed to encode cache data")]
    Encode(#[source] Box<bincode::error::EncodeError>),

    #[error("Cache write task failed to complete")]
    TaskJoin(#[source] tokio::task::JoinError),
}

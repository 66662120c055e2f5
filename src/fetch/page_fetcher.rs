//! One-page-at-a-time access to the GeoMet OGC API collections.
//!
//! [`PageFetcher`] is the seam between the download pipeline and the HTTP
//! transport. [`HttpPageFetcher`] is the production implementation; tests swap in
//! a scripted fetcher.

use crate::fetch::error::PageError;
use log::debug;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// A query parameter restricting which features a collection returns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    /// `key=value`, matched verbatim by the server.
    Eq { key: String, value: String },
    /// `key=start/end`, an inclusive range.
    Range {
        key: String,
        start: String,
        end: String,
    },
}

impl Filter {
    pub fn eq(key: impl Into<String>, value: impl Into<String>) -> Self {
        Filter::Eq {
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn range(key: impl Into<String>, start: impl Into<String>, end: impl Into<String>) -> Self {
        Filter::Range {
            key: key.into(),
            start: start.into(),
            end: end.into(),
        }
    }

    fn to_query_pair(&self) -> (String, String) {
        match self {
            Filter::Eq { key, value } => (key.clone(), value.clone()),
            Filter::Range { key, start, end } => (key.clone(), format!("{start}/{end}")),
        }
    }
}

/// One GeoJSON feature: a bag of properties plus an optional geometry.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Feature {
    #[serde(default)]
    pub properties: Map<String, Value>,
    #[serde(default)]
    pub geometry: Option<Value>,
}

/// A decoded page of a collection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    pub features: Vec<Feature>,
    /// The server's total match count, when reported. Only a termination hint.
    pub number_matched: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct FeatureCollection {
    #[serde(default)]
    features: Vec<Feature>,
    #[serde(rename = "numberMatched")]
    number_matched: Option<u64>,
}

/// Addresses one page of a filtered collection.
#[derive(Debug, Clone, Copy)]
pub struct PageRequest<'a> {
    pub collection: &'a str,
    pub filters: &'a [Filter],
    pub offset: usize,
    pub limit: usize,
}

impl PageRequest<'_> {
    /// Query string pairs in the order the server receives them.
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = vec![("f".to_string(), "json".to_string())];
        pairs.extend(self.filters.iter().map(Filter::to_query_pair));
        pairs.push(("offset".to_string(), self.offset.to_string()));
        pairs.push(("limit".to_string(), self.limit.to_string()));
        pairs
    }
}

/// Fetches a single page of a collection.
///
/// Implementations report non-success responses as [`PageError`] instead of
/// retrying; the caller owns the retry/abort policy.
pub trait PageFetcher: Send + Sync {
    fn fetch_page(
        &self,
        request: &PageRequest<'_>,
    ) -> impl Future<Output = Result<Page, PageError>> + Send;
}

impl<T: PageFetcher> PageFetcher for Arc<T> {
    fn fetch_page(
        &self,
        request: &PageRequest<'_>,
    ) -> impl Future<Output = Result<Page, PageError>> + Send {
        (**self).fetch_page(request)
    }
}

/// [`PageFetcher`] over HTTP with `reqwest`.
///
/// Requests block until the server answers unless a timeout or a
/// [`CancellationToken`] is supplied.
#[derive(Debug, Clone)]
pub struct HttpPageFetcher {
    client: Client,
    base_url: String,
    cancel: Option<CancellationToken>,
}

impl HttpPageFetcher {
    pub fn new(base_url: impl Into<String>) -> Result<Self, reqwest::Error> {
        Self::with_timeout(base_url, None)
    }

    pub fn with_timeout(
        base_url: impl Into<String>,
        timeout: Option<Duration>,
    ) -> Result<Self, reqwest::Error> {
        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            client: builder.build()?,
            base_url: base_url.into(),
            cancel: None,
        })
    }

    /// Aborts in-flight and future requests once `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    fn items_url(&self, collection: &str) -> String {
        format!(
            "{}/collections/{}/items",
            self.base_url.trim_end_matches('/'),
            collection
        )
    }

    async fn request(&self, url: &str, request: &PageRequest<'_>) -> Result<Page, PageError> {
        let transport_error = |e: reqwest::Error| {
            if e.is_timeout() {
                PageError::Timeout(url.to_string())
            } else {
                PageError::NetworkRequest(url.to_string(), e)
            }
        };

        let response = self
            .client
            .get(url)
            .query(&request.query_pairs())
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(PageError::HttpStatus {
                url: url.to_string(),
                status_code: status.as_u16(),
            });
        }

        let body: FeatureCollection = response.json().await.map_err(|e| {
            if e.is_timeout() {
                PageError::Timeout(url.to_string())
            } else {
                PageError::Decode(url.to_string(), e)
            }
        })?;

        Ok(Page {
            features: body.features,
            number_matched: body.number_matched,
        })
    }
}

impl PageFetcher for HttpPageFetcher {
    async fn fetch_page(&self, request: &PageRequest<'_>) -> Result<Page, PageError> {
        let url = self.items_url(request.collection);
        debug!(
            "Fetching {} offset={} limit={}",
            url, request.offset, request.limit
        );
        match &self.cancel {
            Some(token) => {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => Err(PageError::Cancelled(url.clone())),
                    page = self.request(&url, request) => page,
                }
            }
            None => self.request(&url, request).await,
        }
    }
}

//! Walks a paginated collection from offset 0 until it is exhausted.

use crate::fetch::error::{CollectError, PageError};
use crate::fetch::flatten::ColumnSpec;
use crate::fetch::page_fetcher::{Filter, PageFetcher, PageRequest};
use crate::types::record::Record;
use futures_util::{stream, Stream, StreamExt};
use log::debug;

/// Which collection to walk, how to filter it, and how many features to ask for per page.
#[derive(Debug, Clone, Copy)]
pub struct CollectionQuery<'a> {
    pub collection: &'a str,
    pub filters: &'a [Filter],
    pub page_size: usize,
}

#[derive(Debug, Default)]
struct Cursor {
    offset: usize,
    fetched: u64,
    done: bool,
}

pub struct PaginatedCollector<F> {
    fetcher: F,
}

impl<F: PageFetcher> PaginatedCollector<F> {
    pub fn new(fetcher: F) -> Self {
        Self { fetcher }
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    /// Lazily fetches and flattens one page per item.
    ///
    /// The stream ends after an empty page, after a page shorter than the page
    /// size, or once the rows fetched reach the server's `numberMatched`. A
    /// short page ends the walk even when `numberMatched` is absent or claims
    /// more rows. A failing page is yielded as an error and ends the stream.
    /// Every call starts again from offset 0.
    pub fn pages<'a>(
        &'a self,
        query: CollectionQuery<'a>,
        spec: &'a ColumnSpec,
    ) -> impl Stream<Item = Result<Vec<Record>, PageError>> + 'a {
        let limit = query.page_size.max(1);
        stream::unfold(Cursor::default(), move |mut cursor| async move {
            if cursor.done {
                return None;
            }
            let request = PageRequest {
                collection: query.collection,
                filters: query.filters,
                offset: cursor.offset,
                limit,
            };
            let page = match self.fetcher.fetch_page(&request).await {
                Ok(page) => page,
                Err(e) => {
                    cursor.done = true;
                    return Some((Err(e), cursor));
                }
            };
            if page.features.is_empty() {
                return None;
            }

            let count = page.features.len();
            let rows: Vec<Record> = page.features.iter().map(|f| spec.flatten(f)).collect();
            cursor.fetched += count as u64;

            let short_page = count < limit;
            let reached_total = page
                .number_matched
                .is_some_and(|total| cursor.fetched >= total);
            if short_page || reached_total {
                cursor.done = true;
            } else {
                cursor.offset += limit;
            }
            Some((Ok(rows), cursor))
        })
    }

    /// Fetches every page and returns all rows.
    ///
    /// # Errors
    ///
    /// On a failing page, returns a [`CollectError`] holding the rows fetched so far.
    pub async fn collect_all(
        &self,
        query: CollectionQuery<'_>,
        spec: &ColumnSpec,
    ) -> Result<Vec<Record>, CollectError> {
        self.collect_all_with_progress(query, spec, |rows| {
            debug!("{}: {} rows fetched", query.collection, rows);
        })
        .await
    }

    /// Like [`PaginatedCollector::collect_all`], calling `progress` with the
    /// running row count after every page.
    pub async fn collect_all_with_progress(
        &self,
        query: CollectionQuery<'_>,
        spec: &ColumnSpec,
        mut progress: impl FnMut(usize),
    ) -> Result<Vec<Record>, CollectError> {
        let pages = self.pages(query, spec);
        let mut pages = std::pin::pin!(pages);
        let mut rows = Vec::new();
        while let Some(batch) = pages.next().await {
            match batch {
                Ok(batch) => {
                    rows.extend(batch);
                    progress(rows.len());
                }
                Err(error) => return Err(CollectError { rows, error }),
            }
        }
        Ok(rows)
    }
}

use crate::error::ClimateError;
use crate::fetch::collector::PaginatedCollector;
use crate::fetch::error::PageError;
use crate::fetch::flatten::ColumnSpec;
use crate::fetch::page_fetcher::{Filter, PageFetcher, PageRequest};
use crate::stations::station_index::StationIndex;
use crate::types::frame::records_to_dataframe;
use crate::types::interval::NormalsPeriod;
use crate::types::record::Record;
use log::{info, warn};
use polars::prelude::DataFrame;
use std::str::FromStr;
use thiserror::Error;

pub const NORMALS_PERIOD_COLUMN: &str = "normals_period";

/// Why a normals download came back empty. Never fatal.
#[derive(Debug, Error)]
pub enum NormalsWarning {
    #[error("Station {climate_id} has no climate normals")]
    NoNormalsData { climate_id: String },

    #[error("Normals request for {climate_id} failed")]
    Request {
        climate_id: String,
        #[source]
        source: PageError,
    },

    #[error("No {period} normals returned for {climate_id}")]
    NoRecords { climate_id: String, period: String },
}

#[derive(Debug, Default)]
pub struct NormalsDownload {
    pub rows: Vec<Record>,
    /// Set whenever `rows` is empty.
    pub warning: Option<NormalsWarning>,
}

impl NormalsDownload {
    fn empty(warning: NormalsWarning) -> Self {
        warn!("{warning}");
        Self {
            rows: Vec::new(),
            warning: Some(warning),
        }
    }

    pub fn to_dataframe(&self) -> Result<DataFrame, ClimateError> {
        records_to_dataframe(&self.rows)
    }
}

pub struct NormalsDownloader<'a, F> {
    collector: &'a PaginatedCollector<F>,
    index: &'a StationIndex,
    page_limit: usize,
}

impl<'a, F: PageFetcher> NormalsDownloader<'a, F> {
    pub fn new(collector: &'a PaginatedCollector<F>, index: &'a StationIndex, page_limit: usize) -> Self {
        Self {
            collector,
            index,
            page_limit,
        }
    }

    /// Downloads the climate normals of one station for `period`
    /// (`current`, `1991-2020`, `1981-2010` or `1971-2000`).
    ///
    /// Each row is the station metadata, then `normals_period` echoing `period`,
    /// then every property of the returned feature.
    ///
    /// # Errors
    ///
    /// * [`ClimateError::InvalidArgument`] for an unknown `period`.
    /// * [`ClimateError::NotFound`] if `climate_id` matches no station.
    ///
    /// A station without normals, a failed request or an empty response yield an
    /// empty [`NormalsDownload`] carrying a [`NormalsWarning`].
    pub async fn download(&self, climate_id: &str, period: &str) -> Result<NormalsDownload, ClimateError> {
        let normals_period = NormalsPeriod::from_str(period)?;
        let period = period.trim();
        let station = self
            .index
            .by_climate_id(climate_id)
            .into_iter()
            .next()
            .ok_or_else(|| ClimateError::NotFound(format!("climate_id '{climate_id}' not found")))?;
        let climate_id = station.climate_id.clone().unwrap_or_default();

        if !station.has_normals {
            return Ok(NormalsDownload::empty(NormalsWarning::NoNormalsData { climate_id }));
        }

        let filters = [Filter::eq("CLIMATE_IDENTIFIER", climate_id.as_str())];
        let request = PageRequest {
            collection: normals_period.collection(),
            filters: &filters,
            offset: 0,
            limit: self.page_limit,
        };
        let page = match self.collector.fetcher().fetch_page(&request).await {
            Ok(page) => page,
            Err(source) => {
                return Ok(NormalsDownload::empty(NormalsWarning::Request { climate_id, source }));
            }
        };
        if page.features.is_empty() {
            return Ok(NormalsDownload::empty(NormalsWarning::NoRecords {
                climate_id,
                period: period.to_string(),
            }));
        }
        if page
            .number_matched
            .is_some_and(|total| total > page.features.len() as u64)
        {
            warn!(
                "{climate_id}: normals truncated to {} of {:?} records",
                page.features.len(),
                page.number_matched
            );
        }

        let spec = ColumnSpec::passthrough();
        let rows: Vec<Record> = page
            .features
            .iter()
            .map(|feature| {
                let mut row = station.metadata_record(false);
                row.insert(NORMALS_PERIOD_COLUMN, period);
                row.extend(spec.flatten(feature));
                row
            })
            .collect();
        info!("Downloaded {} {period} normals records for {climate_id}", rows.len());
        Ok(NormalsDownload { rows, warning: None })
    }
}

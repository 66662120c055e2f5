//! The main entry point: station discovery, observation and normals downloads
//! against the MSC GeoMet climate collections.

use crate::config::ClimateConfig;
use crate::downloads::normals::{NormalsDownload, NormalsDownloader};
use crate::downloads::observations::{
    ObservationBatch, ObservationDownloader, ObservationRequest, StationSelector,
};
use crate::error::ClimateError;
use crate::fetch::collector::PaginatedCollector;
use crate::fetch::page_fetcher::{HttpPageFetcher, PageFetcher};
use crate::stations::station_cache::StationCache;
use crate::stations::station_index::{SearchCriteria, StationHit, StationIndex};
use crate::types::interval::{Interval, NormalsPeriod};
use crate::types::station::Station;
use crate::types::variables;
use bon::bon;
use chrono::NaiveDate;
use log::debug;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// Client for the GeoMet climate API.
///
/// The station table is loaded lazily on first use, from the on-disk cache
/// when it is fresh, and kept in memory afterwards. Every request is awaited in
/// turn: one page at a time, one station at a time.
///
/// # Examples
///
/// ```rust,no_run
/// # use climate_geomet::{ClimateClient, ClimateConfig, ClimateError, Interval, SearchCriteria};
/// # async fn run() -> Result<(), ClimateError> {
/// let client = ClimateClient::with_config(ClimateConfig::with_system_cache_dir())?;
///
/// let criteria = SearchCriteria::builder()
///     .prov("BC")
///     .interval(Interval::Daily)
///     .build();
/// let stations = client.search_stations(&criteria).await?;
/// println!("{} BC stations with daily data", stations.len());
/// # Ok(())
/// # }
/// ```
pub struct ClimateClient<F = HttpPageFetcher> {
    config: ClimateConfig,
    collector: PaginatedCollector<F>,
    index: Mutex<Option<Arc<StationIndex>>>,
}

impl ClimateClient<HttpPageFetcher> {
    /// A client with [`ClimateConfig::default`] settings.
    pub fn new() -> Result<Self, ClimateError> {
        Self::with_config(ClimateConfig::default())
    }

    /// # Errors
    ///
    /// Returns [`ClimateError::HttpClient`] if the HTTP client cannot be built.
    pub fn with_config(config: ClimateConfig) -> Result<Self, ClimateError> {
        let fetcher = HttpPageFetcher::with_timeout(config.base_url.clone(), config.request_timeout)
            .map_err(ClimateError::HttpClient)?;
        Ok(Self::with_fetcher(config, fetcher))
    }
}

#[bon]
impl<F: PageFetcher> ClimateClient<F> {
    /// A client issuing its page requests through `fetcher`.
    pub fn with_fetcher(config: ClimateConfig, fetcher: F) -> Self {
        Self {
            config,
            collector: PaginatedCollector::new(fetcher),
            index: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &ClimateConfig {
        &self.config
    }

    /// Returns every station, from the cache blob when it is fresh.
    ///
    /// The loaded table also replaces the in-memory table used by searches and
    /// downloads.
    ///
    /// # Arguments
    ///
    /// * `.refresh(bool)`: Download even when the cache is fresh. Defaults to `false`.
    /// * `.cache_path(PathBuf)`: Full path of the cache blob. Defaults to the configured directory and file.
    /// * `.max_age(Duration)`: Freshness limit of the blob. Defaults to the configured `max_age`.
    ///
    /// # Errors
    ///
    /// Returns [`ClimateError::StationCache`] if a download page fails or a fresh
    /// blob cannot be decoded.
    #[builder]
    pub async fn get_all_stations(
        &self,
        #[builder(default)] refresh: bool,
        #[builder(into)] cache_path: Option<PathBuf>,
        max_age: Option<Duration>,
    ) -> Result<Vec<Station>, ClimateError> {
        let mut guard = self.index.lock().await;
        let index = self.load_index(refresh, cache_path, max_age).await?;
        let stations = index.stations().to_vec();
        *guard = Some(index);
        Ok(stations)
    }

    /// Filters the station table by `criteria`, loading it first if needed.
    ///
    /// # Errors
    ///
    /// [`ClimateError::InvalidArgument`] for malformed proximity criteria, or any
    /// error of loading the station table.
    pub async fn search_stations(
        &self,
        criteria: &SearchCriteria,
    ) -> Result<Vec<StationHit>, ClimateError> {
        self.station_index().await?.search(criteria)
    }

    /// Downloads observations for the selected stations.
    ///
    /// # Arguments
    ///
    /// * `.selector(StationSelector)`: **Required.** Station ids, climate ids or name fragments.
    /// * `.start(NaiveDate)` / `.end(NaiveDate)`: **Required.** Inclusive date range.
    /// * `.interval(Interval)`: Defaults to [`Interval::Daily`].
    /// * `.trim(bool)`: Drop rows outside the range. Defaults to `true`.
    /// * `.verbose(bool)`: Per-page progress at info level. Defaults to `false`.
    /// * `.include_geometry(bool)`: Add a `geometry` column. Defaults to `false`.
    ///
    /// # Errors
    ///
    /// [`ClimateError::InvalidArgument`] when `end` precedes `start` (before any
    /// request, including the station table), [`ClimateError::NotFound`] for
    /// unmatched names or climate ids. Per-station failures are reported in
    /// [`ObservationBatch::failures`] instead.
    #[builder]
    pub async fn download_observations(
        &self,
        selector: StationSelector,
        start: NaiveDate,
        end: NaiveDate,
        #[builder(default = Interval::Daily)] interval: Interval,
        #[builder(default = true)] trim: bool,
        #[builder(default)] verbose: bool,
        #[builder(default)] include_geometry: bool,
    ) -> Result<ObservationBatch, ClimateError> {
        if end < start {
            return Err(ClimateError::InvalidArgument(format!(
                "end date {end} is before start date {start}"
            )));
        }
        let request = ObservationRequest {
            selector,
            start,
            end,
            interval,
            trim,
            verbose,
            include_geometry,
        };
        let index = self.station_index().await?;
        ObservationDownloader::new(&self.collector, &index, self.config.page_size)
            .download(&request)
            .await
    }

    /// Downloads the climate normals of one station.
    ///
    /// # Arguments
    ///
    /// * `.climate_id(&str)`: **Required.** Climate identifier, any case.
    /// * `.period(&str)`: `current`, `1991-2020`, `1981-2010` or `1971-2000`. Defaults to `current`.
    ///
    /// # Errors
    ///
    /// [`ClimateError::InvalidArgument`] for an unknown period (before any
    /// request), [`ClimateError::NotFound`] for an unknown climate id. A missing
    /// or failed normals response is an empty [`NormalsDownload`] with a warning.
    #[builder]
    pub async fn download_normals(
        &self,
        #[builder(into)] climate_id: String,
        #[builder(into, default = NormalsPeriod::Current.label().to_string())] period: String,
    ) -> Result<NormalsDownload, ClimateError> {
        NormalsPeriod::from_str(&period)?;
        let index = self.station_index().await?;
        NormalsDownloader::new(&self.collector, &index, self.config.normals_page_limit)
            .download(&climate_id, &period)
            .await
    }

    /// Column names the observation collection of `interval` is expected to return.
    pub fn list_variables(&self, interval: Interval) -> &'static [&'static str] {
        variables::list_variables(interval)
    }

    async fn station_index(&self) -> Result<Arc<StationIndex>, ClimateError> {
        let mut guard = self.index.lock().await;
        if let Some(index) = guard.as_ref() {
            return Ok(Arc::clone(index));
        }
        let index = self.load_index(false, None, None).await?;
        *guard = Some(Arc::clone(&index));
        Ok(index)
    }

    async fn load_index(
        &self,
        refresh: bool,
        cache_path: Option<PathBuf>,
        max_age: Option<Duration>,
    ) -> Result<Arc<StationIndex>, ClimateError> {
        let (cache_dir, cache_file) = match cache_path {
            Some(path) => split_cache_path(&path, &self.config.cache_file),
            None => (self.config.cache_dir.clone(), self.config.cache_file.clone()),
        };
        let cache = StationCache::new(
            &self.collector,
            cache_dir,
            cache_file,
            max_age.unwrap_or(self.config.max_age),
        )
        .with_page_size(self.config.page_size);
        let table = cache.get_stations(refresh).await?;
        debug!(
            "Loaded {} stations ({:?}, {} warnings)",
            table.stations.len(),
            table.origin,
            table.warnings.len()
        );
        Ok(Arc::new(StationIndex::new(table.stations)))
    }
}

fn split_cache_path(path: &Path, default_file: &Path) -> (Option<PathBuf>, PathBuf) {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf);
    let file = path
        .file_name()
        .map_or_else(|| default_file.to_path_buf(), PathBuf::from);
    (dir, file)
}

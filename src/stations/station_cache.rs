use crate::fetch::collector::{CollectionQuery, PaginatedCollector};
use crate::fetch::flatten::{ColumnSpec, Extract};
use crate::fetch::page_fetcher::PageFetcher;
use crate::stations::error::{CacheWarning, StationCacheError};
use crate::types::station::Station;
use crate::utils::{ensure_cache_dir_exists, file_age};
use bincode::config::{Configuration, Fixint, LittleEndian};
use log::{info, warn};
use std::collections::HashSet;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::NamedTempFile;

pub const STATIONS_COLLECTION: &str = "climate-stations";
pub const STATIONS_PAGE_SIZE: usize = 1000;
const COORDINATE_DIVISOR: f64 = 1e7;
const BINCODE_CONFIG: Configuration<LittleEndian, Fixint> =
    bincode::config::standard().with_fixed_int_encoding();

/// Fixed schema of a station row. Properties not listed here are dropped.
pub(crate) fn station_columns() -> ColumnSpec {
    ColumnSpec::new()
        .column("station_name", Extract::Copy("STATION_NAME"))
        .column("station_id", Extract::Copy("STN_ID"))
        .column("climate_id", Extract::TrimUpper("CLIMATE_IDENTIFIER"))
        .column("prov", Extract::TrimUpper("PROV_STATE_TERR_CODE"))
        .column(
            "lat",
            Extract::Scale {
                key: "LATITUDE",
                divisor: COORDINATE_DIVISOR,
            },
        )
        .column(
            "lon",
            Extract::Scale {
                key: "LONGITUDE",
                divisor: COORDINATE_DIVISOR,
            },
        )
        .column("elev", Extract::Copy("ELEVATION"))
        .column("tz", Extract::Copy("TIMEZONE"))
        .column("station_type", Extract::Copy("STATION_TYPE"))
        .column("first_date", Extract::Copy("FIRST_DATE"))
        .column("last_date", Extract::Copy("LAST_DATE"))
        .column("has_daily", Extract::NonEmpty("DLY_FIRST_DATE"))
        .column("has_hourly", Extract::NonEmpty("HLY_FIRST_DATE"))
        .column("has_monthly", Extract::NonEmpty("MLY_FIRST_DATE"))
        .column(
            "has_normals",
            Extract::Equals {
                key: "HAS_NORMALS_DATA",
                literal: "Y",
            },
        )
        .column("dly_first_date", Extract::Copy("DLY_FIRST_DATE"))
        .column("dly_last_date", Extract::Copy("DLY_LAST_DATE"))
        .column("hly_first_date", Extract::Copy("HLY_FIRST_DATE"))
        .column("hly_last_date", Extract::Copy("HLY_LAST_DATE"))
        .column("mly_first_date", Extract::Copy("MLY_FIRST_DATE"))
        .column("mly_last_date", Extract::Copy("MLY_LAST_DATE"))
}

/// Where a [`StationTable`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableOrigin {
    Cached,
    Downloaded,
}

#[derive(Debug)]
pub struct StationTable {
    pub stations: Vec<Station>,
    pub origin: TableOrigin,
    /// Non-fatal persistence problems hit while producing the table.
    pub warnings: Vec<CacheWarning>,
}

/// The full `climate-stations` table, persisted to a single blob on disk.
///
/// The blob lives at `{cache_dir or "."}/{cache_file}` and is considered fresh
/// while its last-modified time is at most `max_age` ago.
pub struct StationCache<'a, F> {
    collector: &'a PaginatedCollector<F>,
    cache_dir: Option<PathBuf>,
    cache_file: PathBuf,
    max_age: Duration,
    page_size: usize,
}

impl<'a, F: PageFetcher> StationCache<'a, F> {
    pub fn new(
        collector: &'a PaginatedCollector<F>,
        cache_dir: Option<PathBuf>,
        cache_file: impl Into<PathBuf>,
        max_age: Duration,
    ) -> Self {
        Self {
            collector,
            cache_dir,
            cache_file: cache_file.into(),
            max_age,
            page_size: STATIONS_PAGE_SIZE,
        }
    }

    /// `limit` of each `climate-stations` page request. Defaults to 1000.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    /// Returns the station table, from the blob when it is fresh and `refresh`
    /// is false, otherwise by downloading every page of `climate-stations`.
    ///
    /// A downloaded table replaces the blob wholesale. Failing to create the cache
    /// directory or to write the blob is reported in
    /// [`StationTable::warnings`]; the downloaded table is still returned.
    ///
    /// # Errors
    ///
    /// * [`StationCacheError::Page`] if any page fails during a download.
    /// * [`StationCacheError::CacheRead`] / [`StationCacheError::CacheDecode`] if
    ///   a fresh blob cannot be read. It is not repaired automatically; call again
    ///   with `refresh` set.
    pub async fn get_stations(&self, refresh: bool) -> Result<StationTable, StationCacheError> {
        let mut warnings = Vec::new();
        let path = self.resolve_path(&mut warnings).await;

        if !refresh {
            match file_age(&path).await {
                Ok(Some(age)) if age <= self.max_age => {
                    info!(
                        "Station cache hit at {} (age {:?})",
                        path.display(),
                        age
                    );
                    let stations = Self::read_cached_stations(path).await?;
                    return Ok(StationTable {
                        stations,
                        origin: TableOrigin::Cached,
                        warnings,
                    });
                }
                Ok(Some(age)) => info!(
                    "Station cache at {} is stale (age {:?} > {:?}), refreshing",
                    path.display(),
                    age,
                    self.max_age
                ),
                Ok(None) => info!("Station cache not found at {}, downloading", path.display()),
                Err(e) => warn!(
                    "Could not stat station cache {}: {}, downloading",
                    path.display(),
                    e
                ),
            }
        }

        let stations = self.download_stations().await?;
        match Self::cache_stations(&stations, &path).await {
            Ok(bytes) => info!(
                "Wrote station cache ({} bytes) to {}",
                bytes,
                path.display()
            ),
            Err(warning) => {
                warn!("{warning}");
                warnings.push(warning);
            }
        }
        Ok(StationTable {
            stations,
            origin: TableOrigin::Downloaded,
            warnings,
        })
    }

    async fn resolve_path(&self, warnings: &mut Vec<CacheWarning>) -> PathBuf {
        let Some(dir) = &self.cache_dir else {
            return Path::new(".").join(&self.cache_file);
        };
        match ensure_cache_dir_exists(dir).await {
            Ok(()) => dir.join(&self.cache_file),
            Err(e) => {
                let warning = CacheWarning::DirCreation(dir.clone(), e);
                warn!("{warning}");
                warnings.push(warning);
                self.cache_file.clone()
            }
        }
    }

    async fn download_stations(&self) -> Result<Vec<Station>, StationCacheError> {
        let query = CollectionQuery {
            collection: STATIONS_COLLECTION,
            filters: &[],
            page_size: self.page_size,
        };
        let rows = self
            .collector
            .collect_all_with_progress(query, &station_columns(), |n| {
                info!("Downloaded {n} stations");
            })
            .await
            .map_err(|e| StationCacheError::Page(e.error))?;

        let mut seen = HashSet::new();
        let mut stations = Vec::with_capacity(rows.len());
        let (mut unkeyed, mut duplicates) = (0usize, 0usize);
        for row in &rows {
            match Station::from_record(row) {
                Some(station) if seen.insert(station.station_id) => stations.push(station),
                Some(_) => duplicates += 1,
                None => unkeyed += 1,
            }
        }
        if unkeyed > 0 {
            warn!("Dropped {unkeyed} station rows without a station id");
        }
        if duplicates > 0 {
            warn!("Dropped {duplicates} station rows with a repeated station id");
        }
        Ok(stations)
    }

    async fn read_cached_stations(path: PathBuf) -> Result<Vec<Station>, StationCacheError> {
        tokio::task::spawn_blocking(move || {
            let bytes =
                std::fs::read(&path).map_err(|e| StationCacheError::CacheRead(path.clone(), e))?;
            let (stations, _) =
                bincode::serde::decode_from_slice::<Vec<Station>, _>(&bytes, BINCODE_CONFIG)
                    .map_err(|e| StationCacheError::CacheDecode(path.clone(), Box::new(e)))?;
            Ok(stations)
        })
        .await?
    }

    /// Encodes and writes the table through a temporary file renamed over `path`,
    /// so readers never observe a half-written blob.
    async fn cache_stations(stations: &[Station], path: &Path) -> Result<usize, CacheWarning> {
        let stations = stations.to_vec();
        let path = path.to_path_buf();
        tokio::task::spawn_blocking(move || {
            let bytes = bincode::serde::encode_to_vec(&stations, BINCODE_CONFIG)
                .map_err(|e| CacheWarning::Encode(Box::new(e)))?;
            let dir = match path.parent() {
                Some(parent) if !parent.as_os_str().is_empty() => parent,
                _ => Path::new("."),
            };
            let mut temp_file =
                NamedTempFile::new_in(dir).map_err(|e| CacheWarning::Write(path.clone(), e))?;
            temp_file
                .write_all(&bytes)
                .and_then(|_| temp_file.flush())
                .map_err(|e| CacheWarning::Write(path.clone(), e))?;
            temp_file
                .persist(&path)
                .map_err(|e| CacheWarning::Write(path.clone(), e.error))?;
            Ok(bytes.len())
        })
        .await
        .map_err(CacheWarning::TaskJoin)?
    }
}

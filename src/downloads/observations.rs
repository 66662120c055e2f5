use crate::error::ClimateError;
use crate::fetch::collector::{CollectionQuery, PaginatedCollector};
use crate::fetch::flatten::ColumnSpec;
use crate::fetch::page_fetcher::{Filter, PageFetcher};
use crate::stations::station_index::{SearchCriteria, StationIndex};
use crate::types::frame::records_to_dataframe;
use crate::types::interval::Interval;
use crate::types::record::{union_columns, Record};
use crate::types::station::Station;
use chrono::{Datelike, NaiveDate};
use log::{debug, info, log, warn, Level};
use polars::prelude::DataFrame;
use serde_json::Value;
use std::collections::HashSet;
use thiserror::Error;

/// Column the observation collections index their local timestamp with.
pub const DATE_COLUMN: &str = "LOCAL_DATE";
/// Fallback trim anchor for monthly rows without [`DATE_COLUMN`].
pub const YEAR_COLUMN: &str = "LOCAL_YEAR";

const CLIMATE_ID_FILTER: &str = "CLIMATE_IDENTIFIER";
const DATETIME_FILTER: &str = "datetime";

/// Which stations to download observations for.
#[derive(Debug, Clone, PartialEq)]
pub enum StationSelector {
    StationIds(Vec<i64>),
    ClimateIds(Vec<String>),
    /// Case-insensitive station name fragments.
    Names(Vec<String>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ObservationRequest {
    pub selector: StationSelector,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub interval: Interval,
    /// Drop rows outside `[start, end]` after download.
    pub trim: bool,
    /// Report per-page progress at info level instead of debug.
    pub verbose: bool,
    /// Add the feature geometry as a `geometry` column.
    pub include_geometry: bool,
}

/// Why an observation batch came back without rows. Never fatal.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ObservationWarning {
    #[error("No {interval} observations found between {start} and {end}")]
    NoRows {
        interval: Interval,
        start: NaiveDate,
        end: NaiveDate,
    },
}

/// A station whose download did not contribute rows.
#[derive(Debug)]
pub struct StationFailure {
    pub station_id: Option<i64>,
    pub climate_id: Option<String>,
    pub error: ClimateError,
}

/// Observation rows of every station that downloaded, plus one entry per
/// station that failed.
#[derive(Debug, Default)]
pub struct ObservationBatch {
    pub rows: Vec<Record>,
    pub failures: Vec<StationFailure>,
    /// Set whenever `rows` is empty.
    pub warning: Option<ObservationWarning>,
}

impl ObservationBatch {
    /// Union of the row columns, in first-seen order.
    pub fn columns(&self) -> Vec<String> {
        union_columns(&self.rows)
    }

    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn to_dataframe(&self) -> Result<DataFrame, ClimateError> {
        records_to_dataframe(&self.rows)
    }
}

pub struct ObservationDownloader<'a, F> {
    collector: &'a PaginatedCollector<F>,
    index: &'a StationIndex,
    page_size: usize,
}

impl<'a, F: PageFetcher> ObservationDownloader<'a, F> {
    pub fn new(collector: &'a PaginatedCollector<F>, index: &'a StationIndex, page_size: usize) -> Self {
        Self {
            collector,
            index,
            page_size,
        }
    }

    /// Downloads observations station by station.
    ///
    /// A failing station is recorded in [`ObservationBatch::failures`] and the
    /// remaining stations are still downloaded.
    ///
    /// # Errors
    ///
    /// * [`ClimateError::InvalidArgument`] if `end` precedes `start`, before any request.
    /// * [`ClimateError::NotFound`] if a name or climate id selector matches no station.
    pub async fn download(&self, request: &ObservationRequest) -> Result<ObservationBatch, ClimateError> {
        if request.end < request.start {
            return Err(ClimateError::InvalidArgument(format!(
                "end date {} is before start date {}",
                request.end, request.start
            )));
        }

        let mut batch = ObservationBatch::default();
        let stations = self.resolve(&request.selector, &mut batch.failures)?;
        let spec = ColumnSpec::passthrough().with_geometry(request.include_geometry);
        let progress_level = if request.verbose { Level::Info } else { Level::Debug };
        let mut downloaded = 0usize;

        for (position, station) in stations.iter().enumerate() {
            let Some(climate_id) = station.climate_id.as_deref() else {
                warn!("Station {} has no climate id, skipping", station.station_id);
                batch.failures.push(StationFailure {
                    station_id: Some(station.station_id),
                    climate_id: None,
                    error: ClimateError::NotFound(format!(
                        "station {} has no climate id",
                        station.station_id
                    )),
                });
                continue;
            };
            log!(
                progress_level,
                "[{}/{}] Downloading {} data for {} ({})",
                position + 1,
                stations.len(),
                request.interval,
                station.station_name,
                climate_id
            );

            let (range_start, range_end) = request.interval.datetime_bounds(request.start, request.end);
            let filters = [
                Filter::eq(CLIMATE_ID_FILTER, climate_id),
                Filter::range(DATETIME_FILTER, range_start, range_end),
            ];
            let query = CollectionQuery {
                collection: request.interval.collection(),
                filters: &filters,
                page_size: self.page_size,
            };
            let result = self
                .collector
                .collect_all_with_progress(query, &spec, |rows| {
                    log!(progress_level, "{climate_id}: {rows} rows fetched");
                })
                .await;

            match result {
                Ok(rows) => {
                    let fetched = rows.len();
                    let rows = if request.trim {
                        trim_rows(rows, request.interval, request.start, request.end)
                    } else {
                        rows
                    };
                    debug!("{climate_id}: kept {} of {fetched} rows", rows.len());
                    downloaded += 1;
                    batch.rows.extend(rows.into_iter().map(|row| {
                        let mut joined = station.metadata_record(true);
                        joined.extend(row);
                        joined
                    }));
                }
                Err(e) => {
                    warn!(
                        "Download for {climate_id} failed after {} rows, skipping station: {}",
                        e.rows.len(),
                        e.error
                    );
                    batch.failures.push(StationFailure {
                        station_id: Some(station.station_id),
                        climate_id: Some(climate_id.to_string()),
                        error: ClimateError::Page(e.error),
                    });
                }
            }
        }

        if batch.rows.is_empty() {
            let warning = ObservationWarning::NoRows {
                interval: request.interval,
                start: request.start,
                end: request.end,
            };
            warn!("{warning}");
            batch.warning = Some(warning);
        } else {
            info!(
                "Downloaded {} {} observations from {} stations",
                batch.rows.len(),
                request.interval,
                downloaded
            );
        }
        Ok(batch)
    }

    /// Resolves the selector to stations, deduplicated in first-seen order.
    fn resolve(
        &self,
        selector: &StationSelector,
        failures: &mut Vec<StationFailure>,
    ) -> Result<Vec<&'a Station>, ClimateError> {
        let mut seen = HashSet::new();
        let mut stations = Vec::new();
        let mut push = |station: &'a Station| {
            if seen.insert(station.station_id) {
                stations.push(station);
            }
        };

        match selector {
            StationSelector::StationIds(ids) => {
                for &id in ids {
                    match self.index.by_station_id(id) {
                        Some(station) => push(station),
                        None => {
                            warn!("Station id {id} not found, skipping");
                            failures.push(StationFailure {
                                station_id: Some(id),
                                climate_id: None,
                                error: ClimateError::NotFound(format!("station id {id}")),
                            });
                        }
                    }
                }
            }
            StationSelector::ClimateIds(climate_ids) => {
                for climate_id in climate_ids {
                    let matches = self.index.by_climate_id(climate_id);
                    if matches.is_empty() {
                        return Err(ClimateError::NotFound(format!(
                            "no stations found for climate id '{climate_id}'"
                        )));
                    }
                    matches.into_iter().for_each(&mut push);
                }
            }
            StationSelector::Names(names) => {
                for name in names {
                    let criteria = SearchCriteria::builder().name(name.as_str()).build();
                    let hits = self.index.search(&criteria)?;
                    if hits.is_empty() {
                        return Err(ClimateError::NotFound(format!(
                            "no stations found matching name '{name}'"
                        )));
                    }
                    for hit in hits {
                        if let Some(station) = self.index.by_station_id(hit.station.station_id) {
                            push(station);
                        }
                    }
                }
            }
        }
        Ok(stations)
    }
}

enum TrimAnchor {
    Date,
    Year,
}

/// Keeps rows inside `[start, end]`, anchored on [`DATE_COLUMN`], or on
/// [`YEAR_COLUMN`] for monthly rows without dates. Rows are untouched when
/// neither column exists; rows whose anchor does not parse are dropped.
fn trim_rows(rows: Vec<Record>, interval: Interval, start: NaiveDate, end: NaiveDate) -> Vec<Record> {
    let anchor = if rows.iter().any(|r| r.contains(DATE_COLUMN)) {
        TrimAnchor::Date
    } else if interval == Interval::Monthly && rows.iter().any(|r| r.contains(YEAR_COLUMN)) {
        TrimAnchor::Year
    } else {
        return rows;
    };
    // Monthly rows are dated to the first of their month.
    let start = match interval {
        Interval::Monthly => NaiveDate::from_ymd_opt(start.year(), start.month(), 1).unwrap_or(start),
        _ => start,
    };
    let years = i64::from(start.year())..=i64::from(end.year());

    rows.into_iter()
        .filter(|row| match anchor {
            TrimAnchor::Date => row
                .get(DATE_COLUMN)
                .and_then(anchor_date)
                .is_some_and(|date| (start..=end).contains(&date)),
            TrimAnchor::Year => row.get_i64(YEAR_COLUMN).is_some_and(|y| years.contains(&y)),
        })
        .collect()
}

/// Parses `YYYY-MM-DD[ HH:MM:SS]`, or `YYYY-MM` as the first of that month.
fn anchor_date(value: &Value) -> Option<NaiveDate> {
    let text = value.as_str()?.trim();
    if let Some(day) = text.get(..10) {
        if let Ok(date) = NaiveDate::parse_from_str(day, "%Y-%m-%d") {
            return Some(date);
        }
    }
    NaiveDate::parse_from_str(&format!("{}-01", text.get(..7)?), "%Y-%m-%d").ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::page_fetcher::{Page, PageRequest};
    use crate::test_utils::{feature, http_error, station, MockFetcher};
    use serde_json::json;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn index() -> StationIndex {
        StationIndex::new(vec![
            station(1, "1108395", "VANCOUVER INTL A", "BC", 49.195, -123.181),
            station(2, "1018621", "VICTORIA GONZALES", "BC", 48.413, -123.325),
            station(3, "6158355", "TORONTO CITY", "ON", 43.667, -79.4),
        ])
    }

    fn climate_id_of<'r>(request: &'r PageRequest<'_>) -> Option<&'r str> {
        request.filters.iter().find_map(|f| match f {
            Filter::Eq { key, value } if key == CLIMATE_ID_FILTER => Some(value.as_str()),
            _ => None,
        })
    }

    fn daily_rows(days: &[&str]) -> Vec<crate::fetch::page_fetcher::Feature> {
        days.iter()
            .map(|d| feature(json!({ "LOCAL_DATE": format!("{d} 00:00:00"), "MEAN_TEMPERATURE": 3.5 })))
            .collect()
    }

    fn request(selector: StationSelector) -> ObservationRequest {
        ObservationRequest {
            selector,
            start: date("2020-01-01"),
            end: date("2020-01-03"),
            interval: Interval::Daily,
            trim: false,
            verbose: false,
            include_geometry: false,
        }
    }

    fn serving_days() -> MockFetcher {
        MockFetcher::new(|request| {
            Ok(if request.offset == 0 {
                Page {
                    features: daily_rows(&["2020-01-01", "2020-01-02"]),
                    number_matched: Some(2),
                }
            } else {
                Page::default()
            })
        })
    }

    #[tokio::test]
    async fn test_end_before_start_fails_before_io() {
        let index = index();
        let collector = PaginatedCollector::new(serving_days());
        let downloader = ObservationDownloader::new(&collector, &index, 1000);
        let mut bad = request(StationSelector::StationIds(vec![1]));
        bad.start = date("2021-01-01");
        bad.end = date("2020-01-01");
        let err = downloader.download(&bad).await.unwrap_err();
        assert!(matches!(err, ClimateError::InvalidArgument(_)));
        assert_eq!(collector.fetcher().calls(), 0);
    }

    #[tokio::test]
    async fn test_failing_station_does_not_abort_batch() -> Result<(), ClimateError> {
        let index = index();
        let collector = PaginatedCollector::new(MockFetcher::new(|request| {
            match climate_id_of(request) {
                Some("1018621") => Err(http_error(503)),
                _ if request.offset == 0 => Ok(Page {
                    features: daily_rows(&["2020-01-01"]),
                    number_matched: Some(1),
                }),
                _ => Ok(Page::default()),
            }
        }));
        let downloader = ObservationDownloader::new(&collector, &index, 1000);
        let batch = downloader
            .download(&request(StationSelector::StationIds(vec![1, 2, 3])))
            .await?;

        let station_ids: Vec<_> = batch.rows.iter().map(|r| r.get_i64("station_id")).collect();
        assert_eq!(station_ids, [Some(1), Some(3)]);
        assert_eq!(batch.failures.len(), 1);
        assert_eq!(batch.failures[0].climate_id.as_deref(), Some("1018621"));
        assert_eq!(collector.fetcher().calls(), 3);
        Ok(())
    }

    #[tokio::test]
    async fn test_empty_batch_carries_warning() -> Result<(), ClimateError> {
        let index = index();
        let collector = PaginatedCollector::new(MockFetcher::new(|_| Ok(Page::default())));
        let downloader = ObservationDownloader::new(&collector, &index, 1000);
        let batch = downloader
            .download(&request(StationSelector::StationIds(vec![1])))
            .await?;

        assert!(batch.rows.is_empty());
        assert!(batch.is_complete());
        assert_eq!(
            batch.warning,
            Some(ObservationWarning::NoRows {
                interval: Interval::Daily,
                start: date("2020-01-01"),
                end: date("2020-01-03"),
            })
        );
        assert_eq!(
            batch.warning.map(|w| w.to_string()).as_deref(),
            Some("No day observations found between 2020-01-01 and 2020-01-03")
        );

        let collector = PaginatedCollector::new(serving_days());
        let downloader = ObservationDownloader::new(&collector, &index, 1000);
        let batch = downloader
            .download(&request(StationSelector::StationIds(vec![1])))
            .await?;
        assert_eq!(batch.rows.len(), 2);
        assert!(batch.warning.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_rows_carry_metadata_prefix_and_filters() -> Result<(), ClimateError> {
        let index = index();
        let collector = PaginatedCollector::new(serving_days());
        let downloader = ObservationDownloader::new(&collector, &index, 1000);
        let batch = downloader
            .download(&request(StationSelector::ClimateIds(vec!["1108395".to_string()])))
            .await?;

        assert_eq!(
            batch.columns(),
            [
                "station_name", "station_id", "climate_id", "prov", "lat", "lon", "elev", "tz",
                "LOCAL_DATE", "MEAN_TEMPERATURE"
            ]
        );
        let sent = &collector.fetcher().requests()[0];
        assert_eq!(sent.collection, "climate-daily");
        assert_eq!(sent.limit, 1000);
        assert_eq!(sent.filter_value("CLIMATE_IDENTIFIER").as_deref(), Some("1108395"));
        assert_eq!(
            sent.filter_value("datetime").as_deref(),
            Some("2020-01-01 00:00:00/2020-01-03 00:00:00")
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_unknown_station_id_is_skipped_and_duplicates_removed() -> Result<(), ClimateError> {
        let index = index();
        let collector = PaginatedCollector::new(serving_days());
        let downloader = ObservationDownloader::new(&collector, &index, 1000);
        let batch = downloader
            .download(&request(StationSelector::StationIds(vec![3, 999, 3, 1])))
            .await?;

        let climate_ids: Vec<_> = collector
            .fetcher()
            .requests()
            .iter()
            .filter_map(|r| r.filter_value("CLIMATE_IDENTIFIER"))
            .collect();
        assert_eq!(climate_ids, ["6158355", "1108395"]);
        assert_eq!(batch.rows.len(), 4);
        assert_eq!(batch.failures.len(), 1);
        assert_eq!(batch.failures[0].station_id, Some(999));
        assert!(matches!(batch.failures[0].error, ClimateError::NotFound(_)));
        Ok(())
    }

    #[tokio::test]
    async fn test_unmatched_name_or_climate_id_is_not_found() {
        let index = index();
        let collector = PaginatedCollector::new(serving_days());
        let downloader = ObservationDownloader::new(&collector, &index, 1000);

        let by_name = downloader
            .download(&request(StationSelector::Names(vec!["atlantis".to_string()])))
            .await;
        assert!(matches!(by_name, Err(ClimateError::NotFound(_))));
        let by_climate_id = downloader
            .download(&request(StationSelector::ClimateIds(vec!["0000000".to_string()])))
            .await;
        assert!(matches!(by_climate_id, Err(ClimateError::NotFound(_))));
        assert_eq!(collector.fetcher().calls(), 0);
    }

    #[tokio::test]
    async fn test_name_selector_resolves_every_match() -> Result<(), ClimateError> {
        let index = index();
        let collector = PaginatedCollector::new(serving_days());
        let downloader = ObservationDownloader::new(&collector, &index, 1000);
        let batch = downloader
            .download(&request(StationSelector::Names(vec!["o".to_string()])))
            .await?;
        // VANCOUVER, VICTORIA GONZALES and TORONTO all contain an 'o'.
        assert_eq!(collector.fetcher().calls(), 3);
        assert_eq!(batch.rows.len(), 6);
        Ok(())
    }

    #[tokio::test]
    async fn test_trim_keeps_requested_range() -> Result<(), ClimateError> {
        let index = index();
        let collector = PaginatedCollector::new(MockFetcher::new(|request| {
            Ok(if request.offset == 0 {
                Page {
                    features: daily_rows(&["2019-12-31", "2020-01-01", "2020-01-03", "2020-01-04"]),
                    number_matched: None,
                }
            } else {
                Page::default()
            })
        }));
        let downloader = ObservationDownloader::new(&collector, &index, 1000);
        let mut trimmed = request(StationSelector::StationIds(vec![1]));
        trimmed.trim = true;
        let batch = downloader.download(&trimmed).await?;
        let dates: Vec<_> = batch.rows.iter().filter_map(|r| r.get_str(DATE_COLUMN)).collect();
        assert_eq!(dates, ["2020-01-01 00:00:00", "2020-01-03 00:00:00"]);

        trimmed.trim = false;
        assert_eq!(downloader.download(&trimmed).await?.rows.len(), 4);
        Ok(())
    }

    #[test]
    fn test_monthly_trim_anchors() {
        let start = date("2020-03-15");
        let end = date("2021-02-01");
        let by_date: Vec<Record> = ["2020-02", "2020-03", "2021-02", "2021-03"]
            .iter()
            .map(|m| Record::from_iter([(DATE_COLUMN.to_string(), json!(m))]))
            .collect();
        let kept = trim_rows(by_date, Interval::Monthly, start, end);
        let months: Vec<_> = kept.iter().filter_map(|r| r.get_str(DATE_COLUMN)).collect();
        assert_eq!(months, ["2020-03", "2021-02"]);

        let by_year: Vec<Record> = [2019, 2020, 2021, 2022]
            .iter()
            .map(|y| Record::from_iter([(YEAR_COLUMN.to_string(), json!(y))]))
            .collect();
        assert_eq!(trim_rows(by_year, Interval::Monthly, start, end).len(), 2);

        let no_anchor = vec![Record::from_iter([("TEMP".to_string(), json!(1.0))])];
        assert_eq!(trim_rows(no_anchor, Interval::Daily, start, end).len(), 1);
    }

    #[tokio::test]
    async fn test_include_geometry_adds_column() -> Result<(), ClimateError> {
        let index = index();
        let collector = PaginatedCollector::new(MockFetcher::new(|request| {
            let mut with_geometry = feature(json!({ "LOCAL_DATE": "2020-01-01 00:00:00" }));
            with_geometry.geometry = Some(json!({ "type": "Point", "coordinates": [-123.18, 49.19] }));
            Ok(if request.offset == 0 {
                Page {
                    features: vec![with_geometry],
                    number_matched: Some(1),
                }
            } else {
                Page::default()
            })
        }));
        let downloader = ObservationDownloader::new(&collector, &index, 1000);
        let mut with = request(StationSelector::StationIds(vec![1]));
        assert!(!downloader.download(&with).await?.columns().contains(&"geometry".to_string()));
        with.include_geometry = true;
        let batch = downloader.download(&with).await?;
        assert_eq!(batch.columns().last().map(String::as_str), Some("geometry"));
        Ok(())
    }
}

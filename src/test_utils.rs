//! Scripted fetcher and fixtures shared by the unit tests.

use crate::fetch::error::PageError;
use crate::fetch::page_fetcher::{Feature, Filter, Page, PageFetcher, PageRequest};
use crate::types::station::Station;
use serde_json::{json, Value};
use std::sync::Mutex;

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRequest {
    pub collection: String,
    pub filters: Vec<Filter>,
    pub offset: usize,
    pub limit: usize,
}

impl RecordedRequest {
    pub fn filter_value(&self, key: &str) -> Option<String> {
        self.filters.iter().find_map(|f| match f {
            Filter::Eq { key: k, value } if k == key => Some(value.clone()),
            Filter::Range { key: k, start, end } if k == key => Some(format!("{start}/{end}")),
            _ => None,
        })
    }
}

type Handler = Box<dyn Fn(&PageRequest<'_>) -> Result<Page, PageError> + Send + Sync>;

/// A [`PageFetcher`] answering from a closure and recording every request.
pub struct MockFetcher {
    handler: Handler,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl MockFetcher {
    pub fn new(
        handler: impl Fn(&PageRequest<'_>) -> Result<Page, PageError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            handler: Box::new(handler),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Serves `features` by offset/limit for any collection.
    pub fn serving(features: Vec<Feature>, number_matched: Option<u64>) -> Self {
        Self::new(move |request| Ok(slice_page(&features, request, number_matched)))
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn requests_for(&self, collection: &str) -> Vec<RecordedRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.collection == collection)
            .collect()
    }
}

impl PageFetcher for MockFetcher {
    async fn fetch_page(&self, request: &PageRequest<'_>) -> Result<Page, PageError> {
        self.requests.lock().unwrap().push(RecordedRequest {
            collection: request.collection.to_string(),
            filters: request.filters.to_vec(),
            offset: request.offset,
            limit: request.limit,
        });
        (self.handler)(request)
    }
}

pub fn slice_page(features: &[Feature], request: &PageRequest<'_>, number_matched: Option<u64>) -> Page {
    let start = request.offset.min(features.len());
    let end = (request.offset + request.limit).min(features.len());
    Page {
        features: features[start..end].to_vec(),
        number_matched,
    }
}

pub fn http_error(status_code: u16) -> PageError {
    PageError::HttpStatus {
        url: "mock://collections".to_string(),
        status_code,
    }
}

pub fn feature(properties: Value) -> Feature {
    Feature {
        properties: properties.as_object().cloned().unwrap_or_default(),
        geometry: None,
    }
}

/// A `climate-stations` feature as the API encodes it (integer coordinates, Y/N flags).
pub fn station_feature(
    stn_id: i64,
    climate_id: &str,
    name: &str,
    prov: &str,
    lat: f64,
    lon: f64,
) -> Feature {
    feature(json!({
        "STATION_NAME": name,
        "STN_ID": stn_id,
        "CLIMATE_IDENTIFIER": climate_id,
        "PROV_STATE_TERR_CODE": prov,
        "LATITUDE": (lat * 1e7).round() as i64,
        "LONGITUDE": (lon * 1e7).round() as i64,
        "ELEVATION": "4.3",
        "TIMEZONE": "PST",
        "STATION_TYPE": "Climate-Auto",
        "FIRST_DATE": "1937-01-01 00:00:00",
        "LAST_DATE": "2024-12-31 00:00:00",
        "DLY_FIRST_DATE": "1937-01-01 00:00:00",
        "DLY_LAST_DATE": "2024-12-31 00:00:00",
        "HLY_FIRST_DATE": "",
        "HLY_LAST_DATE": null,
        "MLY_FIRST_DATE": "1937-01-01 00:00:00",
        "MLY_LAST_DATE": "2007-11-01 00:00:00",
        "HAS_NORMALS_DATA": "Y"
    }))
}

pub fn station(
    station_id: i64,
    climate_id: &str,
    name: &str,
    prov: &str,
    lat: f64,
    lon: f64,
) -> Station {
    Station {
        station_name: name.to_string(),
        station_id,
        climate_id: Some(climate_id.to_string()),
        prov: Some(prov.to_string()),
        lat: Some(lat),
        lon: Some(lon),
        elev: Some(4.3),
        tz: Some("PST".to_string()),
        station_type: Some("Climate-Auto".to_string()),
        first_date: Some("1937-01-01 00:00:00".to_string()),
        last_date: Some("2024-12-31 00:00:00".to_string()),
        has_daily: true,
        has_hourly: false,
        has_monthly: true,
        has_normals: true,
        dly_first_date: Some("1937-01-01 00:00:00".to_string()),
        dly_last_date: Some("2024-12-31 00:00:00".to_string()),
        hly_first_date: None,
        hly_last_date: None,
        mly_first_date: Some("1937-01-01 00:00:00".to_string()),
        mly_last_date: Some("2007-11-01 00:00:00".to_string()),
    }
}

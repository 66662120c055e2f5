//! Defines the climate station record and the coordinate type used for
//! proximity searches.

use crate::error::ClimateError;
use crate::types::record::Record;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A geographical coordinate: latitude first (index 0), longitude second (index 1),
/// both in decimal degrees.
///
/// # Examples
///
/// ```
/// use climate_geomet::LatLon;
///
/// let vancouver = LatLon(49.2827, -123.1207);
/// assert_eq!(vancouver.0, 49.2827);
///
/// let parsed = LatLon::try_from(&[49.2827, -123.1207][..]).unwrap();
/// assert_eq!(parsed, vancouver);
/// assert!(LatLon::try_from(&[49.2827][..]).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatLon(pub f64, pub f64);

impl LatLon {
    pub(crate) fn validate(&self) -> Result<(), ClimateError> {
        let LatLon(lat, lon) = *self;
        if !lat.is_finite() || !(-90.0..=90.0).contains(&lat) {
            return Err(ClimateError::InvalidArgument(format!(
                "coords latitude must be within [-90, 90], got {lat}"
            )));
        }
        if !lon.is_finite() || !(-180.0..=180.0).contains(&lon) {
            return Err(ClimateError::InvalidArgument(format!(
                "coords longitude must be within [-180, 180], got {lon}"
            )));
        }
        Ok(())
    }
}

impl TryFrom<&[f64]> for LatLon {
    type Error = ClimateError;

    fn try_from(value: &[f64]) -> Result<Self, Self::Error> {
        match value {
            [lat, lon] => {
                let coords = LatLon(*lat, *lon);
                coords.validate()?;
                Ok(coords)
            }
            _ => Err(ClimateError::InvalidArgument(format!(
                "coords must be a (latitude, longitude) pair, got {} values",
                value.len()
            ))),
        }
    }
}

/// One climate observing site, as listed by the `climate-stations` collection.
///
/// Rows are produced wholesale when the station cache is refreshed and are
/// read-only afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Station {
    pub station_name: String,
    /// Stable internal key, unique within a snapshot.
    pub station_id: i64,
    /// Upper-cased climate identifier. `None` only when the API omits it.
    pub climate_id: Option<String>,
    /// Two-letter province/territory code.
    pub prov: Option<String>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    /// Elevation in metres.
    pub elev: Option<f64>,
    pub tz: Option<String>,
    pub station_type: Option<String>,
    pub first_date: Option<String>,
    pub last_date: Option<String>,
    pub has_daily: bool,
    pub has_hourly: bool,
    pub has_monthly: bool,
    pub has_normals: bool,
    pub dly_first_date: Option<String>,
    pub dly_last_date: Option<String>,
    pub hly_first_date: Option<String>,
    pub hly_last_date: Option<String>,
    pub mly_first_date: Option<String>,
    pub mly_last_date: Option<String>,
}

impl Station {
    /// Builds a station from a row flattened with the station column spec.
    ///
    /// Returns `None` when the row carries no `station_id`, since such a row
    /// cannot be keyed.
    pub(crate) fn from_record(record: &Record) -> Option<Station> {
        let text = |column: &str| {
            record
                .get_str(column)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };
        Some(Station {
            station_name: text("station_name").unwrap_or_default(),
            station_id: record.get_i64("station_id")?,
            climate_id: text("climate_id"),
            prov: text("prov"),
            lat: record.get_f64("lat"),
            lon: record.get_f64("lon"),
            elev: record.get_f64("elev"),
            tz: text("tz"),
            station_type: text("station_type"),
            first_date: text("first_date"),
            last_date: text("last_date"),
            has_daily: record.get_bool("has_daily").unwrap_or(false),
            has_hourly: record.get_bool("has_hourly").unwrap_or(false),
            has_monthly: record.get_bool("has_monthly").unwrap_or(false),
            has_normals: record.get_bool("has_normals").unwrap_or(false),
            dly_first_date: text("dly_first_date"),
            dly_last_date: text("dly_last_date"),
            hly_first_date: text("hly_first_date"),
            hly_last_date: text("hly_last_date"),
            mly_first_date: text("mly_first_date"),
            mly_last_date: text("mly_last_date"),
        })
    }

    /// The station metadata prefix joined onto every downloaded row.
    ///
    /// Observation rows carry the timezone (`include_tz`), normals rows do not.
    pub(crate) fn metadata_record(&self, include_tz: bool) -> Record {
        let mut record = Record::new();
        record.insert("station_name", self.station_name.clone());
        record.insert("station_id", self.station_id);
        record.insert("climate_id", opt_value(self.climate_id.clone()));
        record.insert("prov", opt_value(self.prov.clone()));
        record.insert("lat", opt_value(self.lat));
        record.insert("lon", opt_value(self.lon));
        record.insert("elev", opt_value(self.elev));
        if include_tz {
            record.insert("tz", opt_value(self.tz.clone()));
        }
        record
    }

    pub(crate) fn location(&self) -> Option<LatLon> {
        Some(LatLon(self.lat?, self.lon?))
    }
}

fn opt_value<T: Into<Value>>(value: Option<T>) -> Value {
    value.map_or(Value::Null, Into::into)
}

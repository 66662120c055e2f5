//! Turns one API feature into one flat [`Record`] according to a [`ColumnSpec`].

use crate::fetch::page_fetcher::Feature;
use crate::types::record::Record;
use serde_json::{Map, Value};

pub const GEOMETRY_COLUMN: &str = "geometry";

/// How a canonical column is derived from a feature's property bag.
#[derive(Debug, Clone, PartialEq)]
pub enum Extract {
    /// Copy the property as is.
    Copy(&'static str),
    /// Divide a numeric property by a constant (the API encodes coordinates as integers).
    Scale { key: &'static str, divisor: f64 },
    /// Trimmed, upper-cased text.
    TrimUpper(&'static str),
    /// `true` when the property is a non-empty string.
    NonEmpty(&'static str),
    /// `true` when the property equals a literal.
    Equals {
        key: &'static str,
        literal: &'static str,
    },
}

impl Extract {
    fn source_key(&self) -> &'static str {
        match self {
            Extract::Copy(key)
            | Extract::Scale { key, .. }
            | Extract::TrimUpper(key)
            | Extract::NonEmpty(key)
            | Extract::Equals { key, .. } => *key,
        }
    }

    fn apply(&self, properties: &Map<String, Value>) -> Value {
        let raw = properties.get(self.source_key());
        match self {
            Extract::Copy(_) => raw.cloned().unwrap_or(Value::Null),
            Extract::Scale { divisor, .. } => raw
                .and_then(as_number)
                .map_or(Value::Null, |n| Value::from(n / divisor)),
            Extract::TrimUpper(_) => raw
                .and_then(as_text)
                .map(|s| s.trim().to_uppercase())
                .filter(|s| !s.is_empty())
                .map_or(Value::Null, Value::from),
            Extract::NonEmpty(_) => Value::Bool(
                raw.and_then(Value::as_str)
                    .is_some_and(|s| !s.trim().is_empty()),
            ),
            Extract::Equals { literal, .. } => Value::Bool(
                raw.and_then(as_text)
                    .is_some_and(|s| s.trim() == *literal),
            ),
        }
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Ordered mapping of canonical column name to extraction rule.
///
/// With `passthrough` enabled, every property that no rule reads is appended
/// verbatim under its original key, after the canonical columns. With
/// `geometry` enabled, the feature's GeoJSON geometry is appended last as a
/// `geometry` column.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColumnSpec {
    columns: Vec<(&'static str, Extract)>,
    passthrough: bool,
    geometry: bool,
}

impl ColumnSpec {
    /// A fixed schema: only the columns added with [`ColumnSpec::column`].
    pub fn new() -> Self {
        Self::default()
    }

    /// No canonical columns; every property is copied through.
    pub fn passthrough() -> Self {
        Self {
            columns: Vec::new(),
            passthrough: true,
            geometry: false,
        }
    }

    pub fn column(mut self, name: &'static str, rule: Extract) -> Self {
        self.columns.push((name, rule));
        self
    }

    pub fn with_passthrough(mut self, passthrough: bool) -> Self {
        self.passthrough = passthrough;
        self
    }

    pub fn with_geometry(mut self, geometry: bool) -> Self {
        self.geometry = geometry;
        self
    }

    pub fn column_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.columns.iter().map(|(name, _)| *name)
    }

    /// Flattens one feature. Missing properties become nulls; this never fails.
    pub fn flatten(&self, feature: &Feature) -> Record {
        let mut record = Record::new();
        for (name, rule) in &self.columns {
            record.insert(*name, rule.apply(&feature.properties));
        }
        if self.passthrough {
            for (key, value) in &feature.properties {
                let consumed = self
                    .columns
                    .iter()
                    .any(|(_, rule)| rule.source_key() == key.as_str());
                if !consumed && !record.contains(key) {
                    record.insert(key.clone(), value.clone());
                }
            }
        }
        if self.geometry {
            record.insert(
                GEOMETRY_COLUMN,
                feature.geometry.clone().unwrap_or(Value::Null),
            );
        }
        record
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn feature(properties: Value) -> Feature {
        Feature {
            properties: properties.as_object().cloned().unwrap_or_default(),
            geometry: None,
        }
    }

    #[test]
    fn test_extraction_rules() {
        let spec = ColumnSpec::new()
            .column("name", Extract::Copy("STATION_NAME"))
            .column("lat", Extract::Scale { key: "LATITUDE", divisor: 1e7 })
            .column("prov", Extract::TrimUpper("PROV_STATE_TERR_CODE"))
            .column("has_daily", Extract::NonEmpty("DLY_FIRST_DATE"))
            .column("has_hourly", Extract::NonEmpty("HLY_FIRST_DATE"))
            .column("has_normals", Extract::Equals { key: "HAS_NORMALS_DATA", literal: "Y" });

        let record = spec.flatten(&feature(json!({
            "STATION_NAME": "VANCOUVER INTL A",
            "LATITUDE": 491950000,
            "PROV_STATE_TERR_CODE": " bc ",
            "DLY_FIRST_DATE": "2013-06-11 00:00:00",
            "HLY_FIRST_DATE": "",
            "HAS_NORMALS_DATA": "Y",
            "ELEVATION": "4.3"
        })));

        assert_eq!(record.get_str("name"), Some("VANCOUVER INTL A"));
        assert!((record.get_f64("lat").unwrap() - 49.195).abs() < 1e-9);
        assert_eq!(record.get_str("prov"), Some("BC"));
        assert_eq!(record.get_bool("has_daily"), Some(true));
        assert_eq!(record.get_bool("has_hourly"), Some(false));
        assert_eq!(record.get_bool("has_normals"), Some(true));
        // Fixed schema: unnamed properties are dropped.
        assert!(!record.contains("ELEVATION"));
        assert_eq!(record.len(), 6);
    }

    #[test]
    fn test_missing_properties_become_null() {
        let spec = ColumnSpec::new()
            .column("name", Extract::Copy("STATION_NAME"))
            .column("lat", Extract::Scale { key: "LATITUDE", divisor: 1e7 })
            .column("prov", Extract::TrimUpper("PROV_STATE_TERR_CODE"))
            .column("has_daily", Extract::NonEmpty("DLY_FIRST_DATE"))
            .column("has_normals", Extract::Equals { key: "HAS_NORMALS_DATA", literal: "Y" });

        let record = spec.flatten(&feature(json!({})));
        assert_eq!(record.get("name"), Some(&Value::Null));
        assert_eq!(record.get("lat"), Some(&Value::Null));
        assert_eq!(record.get("prov"), Some(&Value::Null));
        assert_eq!(record.get_bool("has_daily"), Some(false));
        assert_eq!(record.get_bool("has_normals"), Some(false));
    }

    #[test]
    fn test_passthrough_keeps_unnamed_properties_in_order() {
        let spec = ColumnSpec::new()
            .column("climate_id", Extract::TrimUpper("CLIMATE_IDENTIFIER"))
            .with_passthrough(true);
        let record = spec.flatten(&feature(json!({
            "LOCAL_DATE": "2020-01-01 00:00:00",
            "CLIMATE_IDENTIFIER": "1108395",
            "MAX_TEMPERATURE": 7.1
        })));
        assert_eq!(
            record.columns().collect::<Vec<_>>(),
            ["climate_id", "LOCAL_DATE", "MAX_TEMPERATURE"]
        );
    }

    #[test]
    fn test_geometry_column_is_opt_in() {
        let mut f = feature(json!({"LOCAL_DATE": "2020-01-01"}));
        f.geometry = Some(json!({"type": "Point", "coordinates": [-123.18, 49.19]}));

        let plain = ColumnSpec::passthrough().flatten(&f);
        assert!(!plain.contains(GEOMETRY_COLUMN));

        let with_geometry = ColumnSpec::passthrough().with_geometry(true).flatten(&f);
        assert_eq!(
            with_geometry.columns().collect::<Vec<_>>(),
            ["LOCAL_DATE", GEOMETRY_COLUMN]
        );
        assert_eq!(with_geometry.get(GEOMETRY_COLUMN).unwrap()["type"], "Point");
    }

    #[test]
    fn test_passthrough_only_copies_everything() {
        let record = ColumnSpec::passthrough().flatten(&feature(json!({"A": 1, "B": null})));
        assert_eq!(record.len(), 2);
        assert_eq!(record.get("B"), Some(&Value::Null));
    }
}

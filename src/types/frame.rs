//! Optional schema inference: turns loosely-typed rows into a Polars `DataFrame`.

use crate::error::ClimateError;
use crate::types::record::{union_columns, Record};
use crate::types::station::Station;
use polars::prelude::*;
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnKind {
    Boolean,
    Integer,
    Float,
    Text,
}

fn infer_kind<'a>(values: impl Iterator<Item = &'a Value>) -> ColumnKind {
    let mut kind: Option<ColumnKind> = None;
    for value in values {
        let next = match value {
            Value::Null => continue,
            Value::Bool(_) => ColumnKind::Boolean,
            Value::Number(n) if n.is_i64() => ColumnKind::Integer,
            Value::Number(_) => ColumnKind::Float,
            _ => return ColumnKind::Text,
        };
        kind = Some(match (kind, next) {
            (None, k) => k,
            (Some(a), b) if a == b => a,
            (Some(ColumnKind::Integer), ColumnKind::Float)
            | (Some(ColumnKind::Float), ColumnKind::Integer) => ColumnKind::Float,
            _ => return ColumnKind::Text,
        });
    }
    // All-null columns become text.
    kind.unwrap_or(ColumnKind::Text)
}

fn text_of(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Builds a `DataFrame` whose columns are the union of the columns of `records`
/// (first-seen order). Each column's dtype is inferred from its non-null values:
/// booleans, integers, floats (integers mixed with floats widen to float), and
/// text for anything else. Rows lacking a column get a null.
///
/// # Errors
///
/// Returns [`ClimateError::Frame`] if Polars rejects the assembled columns.
pub fn records_to_dataframe(records: &[Record]) -> Result<DataFrame, ClimateError> {
    let mut columns = Vec::new();
    for name in union_columns(records) {
        let values: Vec<Option<&Value>> = records.iter().map(|r| r.get(&name)).collect();
        let kind = infer_kind(values.iter().flatten().copied());
        let series = match kind {
            ColumnKind::Boolean => Series::new(
                name.as_str().into(),
                values
                    .iter()
                    .map(|v| v.and_then(Value::as_bool))
                    .collect::<Vec<_>>(),
            ),
            ColumnKind::Integer => Series::new(
                name.as_str().into(),
                values
                    .iter()
                    .map(|v| v.and_then(Value::as_i64))
                    .collect::<Vec<_>>(),
            ),
            ColumnKind::Float => Series::new(
                name.as_str().into(),
                values
                    .iter()
                    .map(|v| v.and_then(Value::as_f64))
                    .collect::<Vec<_>>(),
            ),
            ColumnKind::Text => Series::new(
                name.as_str().into(),
                values
                    .iter()
                    .map(|v| v.and_then(text_of))
                    .collect::<Vec<_>>(),
            ),
        };
        columns.push(series.into_column());
    }
    Ok(DataFrame::new(columns)?)
}

/// Builds a `DataFrame` with one row per station and the station fields as columns.
pub fn stations_to_dataframe(stations: &[Station]) -> Result<DataFrame, ClimateError> {
    let records = stations
        .iter()
        .map(|s| match serde_json::to_value(s) {
            Ok(Value::Object(map)) => Ok(Record::from(map)),
            Ok(_) => Ok(Record::new()),
            Err(e) => Err(ClimateError::Serialize(e)),
        })
        .collect::<Result<Vec<_>, _>>()?;
    records_to_dataframe(&records)
}

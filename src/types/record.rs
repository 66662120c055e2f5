//! A single flattened row, keyed by column name in insertion order.
//!
//! Observation and normals rows do not have a fixed schema: their columns are
//! whatever keys the API put in each feature's property bag. A [`Record`] keeps
//! those columns in the order they were first inserted so that a batch of rows
//! can be turned into a stable table later (see [`crate::records_to_dataframe`]).

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One flattened row. Values are plain JSON scalars (string, number, boolean
/// or null); nested values from the API are passed through untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(Map<String, Value>);

impl Record {
    pub fn new() -> Self {
        Self(Map::new())
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.0.get(column)
    }

    /// Inserts a column. An existing column keeps its position and takes the new value.
    pub fn insert(&mut self, column: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(column.into(), value.into());
    }

    pub fn contains(&self, column: &str) -> bool {
        self.0.contains_key(column)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Appends every column of `other`, overwriting columns that already exist.
    pub fn extend(&mut self, other: Record) {
        self.0.extend(other.0);
    }

    pub fn into_inner(self) -> Map<String, Value> {
        self.0
    }

    pub fn get_str(&self, column: &str) -> Option<&str> {
        self.get(column).and_then(Value::as_str)
    }

    /// Numeric value of a column. Numeric strings (`"12.5"`) are accepted as well,
    /// since some collections encode numbers as text.
    pub fn get_f64(&self, column: &str) -> Option<f64> {
        match self.get(column)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn get_i64(&self, column: &str) -> Option<i64> {
        match self.get(column)? {
            Value::Number(n) => n
                .as_i64()
                .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn get_bool(&self, column: &str) -> Option<bool> {
        self.get(column).and_then(Value::as_bool)
    }
}

impl From<Map<String, Value>> for Record {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl FromIterator<(String, Value)> for Record {
    fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Union of the columns of `records`, in order of first appearance.
pub fn union_columns(records: &[Record]) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut columns = Vec::new();
    for record in records {
        for column in record.columns() {
            if seen.insert(column) {
                columns.push(column.to_string());
            }
        }
    }
    columns
}

//! Defines the observation intervals offered by the GeoMet climate collections
//! and the climate normals periods.

use crate::error::ClimateError;
use chrono::NaiveDate;
use std::fmt;
use std::str::FromStr;

/// The time granularity of climate observations.
///
/// Each interval maps onto its own GeoMet collection and onto one of the
/// availability flags of a [`crate::Station`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Interval {
    /// One observation per station per hour (`climate-hourly`).
    Hourly,
    /// Daily summaries (`climate-daily`).
    Daily,
    /// Monthly summaries (`climate-monthly`).
    Monthly,
}

impl Interval {
    /// The collection that serves observations of this interval.
    pub fn collection(&self) -> &'static str {
        match self {
            Interval::Hourly => "climate-hourly",
            Interval::Daily => "climate-daily",
            Interval::Monthly => "climate-monthly",
        }
    }

    /// Short label accepted by [`Interval::from_str`].
    pub fn label(&self) -> &'static str {
        match self {
            Interval::Hourly => "hour",
            Interval::Daily => "day",
            Interval::Monthly => "month",
        }
    }

    /// Bounds of the `datetime` filter for an inclusive `[start, end]` range, in
    /// the resolution the collection indexes its `LOCAL_DATE` column with.
    pub(crate) fn datetime_bounds(&self, start: NaiveDate, end: NaiveDate) -> (String, String) {
        match self {
            Interval::Hourly => (
                format!("{} 00:00:00", start.format("%Y-%m-%d")),
                format!("{} 23:59:59", end.format("%Y-%m-%d")),
            ),
            Interval::Daily => (
                format!("{} 00:00:00", start.format("%Y-%m-%d")),
                format!("{} 00:00:00", end.format("%Y-%m-%d")),
            ),
            Interval::Monthly => (
                start.format("%Y-%m").to_string(),
                end.format("%Y-%m").to_string(),
            ),
        }
    }
}

impl FromStr for Interval {
    type Err = ClimateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hour" | "hourly" => Ok(Interval::Hourly),
            "day" | "daily" => Ok(Interval::Daily),
            "month" | "monthly" => Ok(Interval::Monthly),
            other => Err(ClimateError::InvalidArgument(format!(
                "interval must be one of 'hour', 'day' or 'month', got '{other}'"
            ))),
        }
    }
}

/// Formats an `Interval` using its short label.
///
/// # Examples
///
/// ```
/// use climate_geomet::Interval;
///
/// assert_eq!(Interval::Daily.to_string(), "day");
/// ```
impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// A published variant of the 30-year climate normals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NormalsPeriod {
    /// The most recent normals, currently 1991-2020.
    Current,
    P1991To2020,
    P1981To2010,
    P1971To2000,
}

impl NormalsPeriod {
    pub fn collection(&self) -> &'static str {
        match self {
            NormalsPeriod::Current | NormalsPeriod::P1991To2020 => "climate-normals",
            NormalsPeriod::P1981To2010 => "climate-normals-1981-2010",
            NormalsPeriod::P1971To2000 => "climate-normals-1971-2000",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            NormalsPeriod::Current => "current",
            NormalsPeriod::P1991To2020 => "1991-2020",
            NormalsPeriod::P1981To2010 => "1981-2010",
            NormalsPeriod::P1971To2000 => "1971-2000",
        }
    }
}

impl fmt::Display for NormalsPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl FromStr for NormalsPeriod {
    type Err = ClimateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "current" => Ok(NormalsPeriod::Current),
            "1991-2020" => Ok(NormalsPeriod::P1991To2020),
            "1981-2010" => Ok(NormalsPeriod::P1981To2010),
            "1971-2000" => Ok(NormalsPeriod::P1971To2000),
            other => Err(ClimateError::InvalidArgument(format!(
                "normals period must be one of 'current', '1991-2020', '1981-2010' or '1971-2000', got '{other}'"
            ))),
        }
    }
}

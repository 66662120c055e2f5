//! Static catalog of the columns each observation collection is expected to
//! return. Used for documentation and validation only; downloads never enforce it.

use crate::types::interval::Interval;

const HOURLY_VARIABLES: &[&str] = &[
    "LOCAL_DATE",
    "LOCAL_YEAR",
    "LOCAL_MONTH",
    "LOCAL_DAY",
    "LOCAL_HOUR",
    "UTC_DATE",
    "UTC_YEAR",
    "UTC_MONTH",
    "UTC_DAY",
    "TEMP",
    "TEMP_FLAG",
    "DEW_POINT_TEMP",
    "DEW_POINT_TEMP_FLAG",
    "HUMIDEX",
    "HUMIDEX_FLAG",
    "PRECIP_AMOUNT",
    "PRECIP_AMOUNT_FLAG",
    "RELATIVE_HUMIDITY",
    "RELATIVE_HUMIDITY_FLAG",
    "STATION_PRESSURE",
    "STATION_PRESSURE_FLAG",
    "VISIBILITY",
    "VISIBILITY_FLAG",
    "WINDCHILL",
    "WINDCHILL_FLAG",
    "WIND_DIRECTION",
    "WIND_DIRECTION_FLAG",
    "WIND_SPEED",
    "WIND_SPEED_FLAG",
    "WEATHER_ENG_DESC",
    "WEATHER_FRE_DESC",
];

const DAILY_VARIABLES: &[&str] = &[
    "LOCAL_DATE",
    "LOCAL_YEAR",
    "LOCAL_MONTH",
    "LOCAL_DAY",
    "MEAN_TEMPERATURE",
    "MEAN_TEMPERATURE_FLAG",
    "MIN_TEMPERATURE",
    "MIN_TEMPERATURE_FLAG",
    "MAX_TEMPERATURE",
    "MAX_TEMPERATURE_FLAG",
    "TOTAL_PRECIPITATION",
    "TOTAL_PRECIPITATION_FLAG",
    "TOTAL_RAIN",
    "TOTAL_RAIN_FLAG",
    "TOTAL_SNOW",
    "TOTAL_SNOW_FLAG",
    "SNOW_ON_GROUND",
    "SNOW_ON_GROUND_FLAG",
    "DIRECTION_MAX_GUST",
    "DIRECTION_MAX_GUST_FLAG",
    "SPEED_MAX_GUST",
    "SPEED_MAX_GUST_FLAG",
    "COOLING_DEGREE_DAYS",
    "COOLING_DEGREE_DAYS_FLAG",
    "HEATING_DEGREE_DAYS",
    "HEATING_DEGREE_DAYS_FLAG",
    "MIN_REL_HUMIDITY",
    "MIN_REL_HUMIDITY_FLAG",
    "MAX_REL_HUMIDITY",
    "MAX_REL_HUMIDITY_FLAG",
];

const MONTHLY_VARIABLES: &[&str] = &[
    "LOCAL_DATE",
    "LOCAL_YEAR",
    "LOCAL_MONTH",
    "MEAN_TEMPERATURE",
    "MIN_TEMPERATURE",
    "MAX_TEMPERATURE",
    "TOTAL_PRECIPITATION",
    "TOTAL_RAIN",
    "TOTAL_SNOWFALL",
    "SNOW_ON_GROUND_LAST_DAY",
    "DAYS_WITH_PRECIP_GE_1MM",
    "DAYS_WITH_VALID_MEAN_TEMP",
    "DAYS_WITH_VALID_MIN_TEMP",
    "DAYS_WITH_VALID_MAX_TEMP",
    "DAYS_WITH_VALID_PRECIP",
    "DAYS_WITH_VALID_SNOWFALL",
    "DAYS_WITH_VALID_SUNSHINE",
    "BRIGHT_SUNSHINE",
    "COOLING_DEGREE_DAYS",
    "HEATING_DEGREE_DAYS",
    "NORMAL_MEAN_TEMPERATURE",
    "NORMAL_PRECIPITATION",
    "NORMAL_SNOWFALL",
    "NORMAL_SUNSHINE",
];

/// Expected measurement columns for `interval`, in the order the API lists them.
///
/// # Examples
///
/// ```
/// use climate_geomet::{list_variables, Interval};
///
/// assert!(list_variables(Interval::Daily).contains(&"MAX_TEMPERATURE"));
/// ```
pub fn list_variables(interval: Interval) -> &'static [&'static str] {
    match interval {
        Interval::Hourly => HOURLY_VARIABLES,
        Interval::Daily => DAILY_VARIABLES,
        Interval::Monthly => MONTHLY_VARIABLES,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::downloads::observations::{DATE_COLUMN, YEAR_COLUMN};

    #[test]
    fn test_every_interval_lists_trim_anchor() {
        for interval in [Interval::Hourly, Interval::Daily, Interval::Monthly] {
            let variables = list_variables(interval);
            assert!(variables.contains(&DATE_COLUMN), "{interval} lacks {DATE_COLUMN}");
            assert!(variables.contains(&YEAR_COLUMN), "{interval} lacks {YEAR_COLUMN}");
        }
    }

    #[test]
    fn test_catalog_has_no_duplicates() {
        for interval in [Interval::Hourly, Interval::Daily, Interval::Monthly] {
            let variables = list_variables(interval);
            let unique: std::collections::HashSet<_> = variables.iter().collect();
            assert_eq!(unique.len(), variables.len());
        }
    }
}

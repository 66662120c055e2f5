use crate::error::ClimateError;
use crate::types::interval::Interval;
use crate::types::station::{LatLon, Station};
use bon::Builder;
use haversine::{distance, Location as HaversineLocation, Units};
use std::collections::HashSet;

/// Radius applied when `coords` is given without `dist_km`.
pub const DEFAULT_SEARCH_RADIUS_KM: f64 = 50.0;

/// Station search predicates. Every supplied predicate must hold (logical AND).
/// An empty criteria set matches the whole table.
///
/// # Examples
///
/// ```
/// use climate_geomet::{Interval, SearchCriteria};
///
/// let criteria = SearchCriteria::builder()
///     .prov("bc")
///     .interval(Interval::Daily)
///     .build();
/// assert_eq!(criteria.prov.as_deref(), Some("bc"));
/// ```
#[derive(Debug, Clone, Default, Builder)]
pub struct SearchCriteria {
    /// Case-insensitive substring of `station_name`.
    #[builder(into)]
    pub name: Option<String>,
    /// Climate identifiers, compared upper-cased.
    #[builder(default)]
    pub climate_ids: Vec<String>,
    #[builder(default)]
    pub station_ids: Vec<i64>,
    /// Province code, compared trimmed and upper-cased.
    #[builder(into)]
    pub prov: Option<String>,
    /// Keep stations with data at this interval.
    pub interval: Option<Interval>,
    pub has_normals: Option<bool>,
    pub coords: Option<LatLon>,
    /// Search radius around `coords` in kilometres.
    pub dist_km: Option<f64>,
}

/// A station matching a search, with its distance to `coords` when one was given.
#[derive(Debug, Clone, PartialEq)]
pub struct StationHit {
    pub station: Station,
    pub distance_km: Option<f64>,
}

/// In-memory filter engine over a station table snapshot.
#[derive(Debug, Clone)]
pub struct StationIndex {
    stations: Vec<Station>,
}

struct Proximity {
    origin: LatLon,
    radius_km: f64,
}

impl StationIndex {
    pub fn new(stations: Vec<Station>) -> Self {
        Self { stations }
    }

    pub fn stations(&self) -> &[Station] {
        &self.stations
    }

    pub fn len(&self) -> usize {
        self.stations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stations.is_empty()
    }

    pub fn by_station_id(&self, station_id: i64) -> Option<&Station> {
        self.stations.iter().find(|s| s.station_id == station_id)
    }

    /// Stations whose climate identifier equals `climate_id` ignoring case.
    pub fn by_climate_id(&self, climate_id: &str) -> Vec<&Station> {
        let wanted = climate_id.trim().to_uppercase();
        self.stations
            .iter()
            .filter(|s| s.climate_id.as_deref() == Some(wanted.as_str()))
            .collect()
    }

    /// Filters the table by `criteria`.
    ///
    /// Hits keep table order, except for proximity searches which are sorted
    /// closest first.
    ///
    /// # Errors
    ///
    /// [`ClimateError::InvalidArgument`] for out-of-range `coords`, a negative or
    /// non-finite `dist_km`, or a `dist_km` given without `coords`.
    pub fn search(&self, criteria: &SearchCriteria) -> Result<Vec<StationHit>, ClimateError> {
        let proximity = Self::proximity(criteria)?;
        let name = criteria.name.as_ref().map(|n| n.to_lowercase());
        let climate_ids: HashSet<String> = criteria
            .climate_ids
            .iter()
            .map(|id| id.trim().to_uppercase())
            .collect();
        let station_ids: HashSet<i64> = criteria.station_ids.iter().copied().collect();
        let prov = criteria.prov.as_ref().map(|p| p.trim().to_uppercase());

        let mut hits = Vec::new();
        for station in &self.stations {
            if let Some(name) = &name {
                if !station.station_name.to_lowercase().contains(name.as_str()) {
                    continue;
                }
            }
            if !climate_ids.is_empty()
                && !station
                    .climate_id
                    .as_ref()
                    .is_some_and(|id| climate_ids.contains(id))
            {
                continue;
            }
            if !station_ids.is_empty() && !station_ids.contains(&station.station_id) {
                continue;
            }
            if let Some(prov) = &prov {
                if station.prov.as_deref() != Some(prov.as_str()) {
                    continue;
                }
            }
            if let Some(interval) = criteria.interval {
                if !has_interval(station, interval) {
                    continue;
                }
            }
            if let Some(has_normals) = criteria.has_normals {
                if station.has_normals != has_normals {
                    continue;
                }
            }
            let distance_km = match &proximity {
                Some(p) => match station.location() {
                    Some(location) => {
                        let km = haversine_km(p.origin, location);
                        if km > p.radius_km {
                            continue;
                        }
                        Some(km)
                    }
                    None => continue,
                },
                None => None,
            };
            hits.push(StationHit {
                station: station.clone(),
                distance_km,
            });
        }

        if proximity.is_some() {
            hits.sort_by(|a, b| {
                a.distance_km
                    .unwrap_or(f64::INFINITY)
                    .total_cmp(&b.distance_km.unwrap_or(f64::INFINITY))
            });
        }
        Ok(hits)
    }

    fn proximity(criteria: &SearchCriteria) -> Result<Option<Proximity>, ClimateError> {
        match (criteria.coords, criteria.dist_km) {
            (None, None) => Ok(None),
            (None, Some(_)) => Err(ClimateError::InvalidArgument(
                "dist requires coords".to_string(),
            )),
            (Some(origin), dist) => {
                origin.validate()?;
                let radius_km = dist.unwrap_or(DEFAULT_SEARCH_RADIUS_KM);
                if !radius_km.is_finite() || radius_km < 0.0 {
                    return Err(ClimateError::InvalidArgument(format!(
                        "dist must be a non-negative number of kilometres, got {radius_km}"
                    )));
                }
                Ok(Some(Proximity { origin, radius_km }))
            }
        }
    }
}

fn has_interval(station: &Station, interval: Interval) -> bool {
    match interval {
        Interval::Hourly => station.has_hourly,
        Interval::Daily => station.has_daily,
        Interval::Monthly => station.has_monthly,
    }
}

fn haversine_km(a: LatLon, b: LatLon) -> f64 {
    distance(
        HaversineLocation {
            latitude: a.0,
            longitude: a.1,
        },
        HaversineLocation {
            latitude: b.0,
            longitude: b.1,
        },
        Units::Kilometers,
    )
}

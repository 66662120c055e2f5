pub mod error;
pub mod station_cache;
pub mod station_index;

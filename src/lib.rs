mod climate;
mod config;
mod downloads;
mod error;
mod fetch;
mod stations;
mod types;
mod utils;

#[cfg(test)]
mod test_utils;

pub use climate::ClimateClient;
pub use config::*;
pub use error::ClimateError;

pub use fetch::collector::{CollectionQuery, PaginatedCollector};
pub use fetch::error::{CollectError, PageError};
pub use fetch::flatten::{ColumnSpec, Extract, GEOMETRY_COLUMN};
pub use fetch::page_fetcher::{Feature, Filter, HttpPageFetcher, Page, PageFetcher, PageRequest};

pub use stations::error::{CacheWarning, StationCacheError};
pub use stations::station_cache::{StationCache, StationTable, TableOrigin, STATIONS_COLLECTION};
pub use stations::station_index::{SearchCriteria, StationHit, StationIndex, DEFAULT_SEARCH_RADIUS_KM};

pub use downloads::normals::{NormalsDownload, NormalsDownloader, NormalsWarning, NORMALS_PERIOD_COLUMN};
pub use downloads::observations::{
    ObservationBatch, ObservationDownloader, ObservationRequest, ObservationWarning, StationFailure,
    StationSelector, DATE_COLUMN, YEAR_COLUMN,
};

pub use types::frame::{records_to_dataframe, stations_to_dataframe};
pub use types::interval::{Interval, NormalsPeriod};
pub use types::record::{union_columns, Record};
pub use types::station::{LatLon, Station};
pub use types::variables::list_variables;

pub use tokio_util::sync::CancellationToken;

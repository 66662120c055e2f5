use crate::stations::station_cache::STATIONS_PAGE_SIZE;
use crate::utils::get_cache_dir;
use bon::Builder;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://api.weather.gc.ca";
pub const DEFAULT_CACHE_FILE: &str = "stations_cache.bin";
pub const DEFAULT_MAX_AGE: Duration = Duration::from_secs(7 * 24 * 60 * 60);
pub const DEFAULT_NORMALS_PAGE_LIMIT: usize = 10_000;

/// Settings shared by every operation of a [`crate::ClimateClient`].
///
/// # Examples
///
/// ```
/// use climate_geomet::ClimateConfig;
/// use std::time::Duration;
///
/// let config = ClimateConfig::builder()
///     .cache_dir("/tmp/climate")
///     .max_age(Duration::from_secs(3600))
///     .build();
/// assert_eq!(config.page_size, 1000);
/// assert_eq!(config.cache_file.to_str(), Some("stations_cache.bin"));
/// ```
#[derive(Debug, Clone, Builder)]
pub struct ClimateConfig {
    /// Root of the OGC API, without the `/collections` suffix.
    #[builder(into, default = DEFAULT_BASE_URL.to_string())]
    pub base_url: String,
    /// Directory holding the station cache. `None` means the working directory.
    #[builder(into)]
    pub cache_dir: Option<PathBuf>,
    #[builder(into, default = PathBuf::from(DEFAULT_CACHE_FILE))]
    pub cache_file: PathBuf,
    /// Age after which the station cache is downloaded again.
    #[builder(default = DEFAULT_MAX_AGE)]
    pub max_age: Duration,
    /// `limit` of every paginated request (station and observation pages).
    #[builder(default = STATIONS_PAGE_SIZE)]
    pub page_size: usize,
    /// `limit` of the single normals request.
    #[builder(default = DEFAULT_NORMALS_PAGE_LIMIT)]
    pub normals_page_limit: usize,
    /// Per-request timeout. `None` waits for the server indefinitely.
    pub request_timeout: Option<Duration>,
}

impl Default for ClimateConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl ClimateConfig {
    /// Default settings with the cache kept in the platform cache directory
    /// (e.g. `~/.cache/climate_geomet_cache` on Linux), when one exists.
    pub fn with_system_cache_dir() -> Self {
        Self {
            cache_dir: get_cache_dir(),
            ..Self::default()
        }
    }
}

use log::warn;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

const CACHE_DIR_NAME: &str = "climate_geomet_cache";

pub fn get_cache_dir() -> Option<PathBuf> {
    dirs::cache_dir().map(|p| p.join(CACHE_DIR_NAME))
}

/// Creates `path` (and parents) if needed. An existing directory is not an error.
pub async fn ensure_cache_dir_exists(path: &Path) -> io::Result<()> {
    match tokio::fs::metadata(path).await {
        Ok(metadata) if metadata.is_dir() => Ok(()),
        Ok(_) => Err(io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!("Cache path exists but is not a directory: {}", path.display()),
        )),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            log::info!("Creating cache directory: {}", path.display());
            match tokio::fs::create_dir_all(path).await {
                Err(e) if e.kind() != io::ErrorKind::AlreadyExists => Err(e),
                _ => Ok(()),
            }
        }
        Err(e) => Err(e),
    }
}

/// Wall-clock time since `path` was last written, or `None` if it does not exist.
///
/// A modification time in the future counts as age zero.
pub async fn file_age(path: &Path) -> io::Result<Option<Duration>> {
    let modified = match tokio::fs::metadata(path).await {
        Ok(metadata) => metadata.modified()?,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e),
    };
    let age = SystemTime::now().duration_since(modified).unwrap_or_else(|_| {
        warn!("Cache file {} is dated in the future", path.display());
        Duration::ZERO
    });
    Ok(Some(age))
}

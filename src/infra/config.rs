use std::path::{Path, PathBuf};
use thiserror::Error;
use time::UtcOffset;

pub const DEFAULT_CATALOG_PAGE_SIZE: usize = 100;
pub const DEFAULT_MESSAGE_PAGE_SIZE: usize = 10_000;
pub const DEFAULT_MANIFEST_PATH: &str = "output/progress.json";

const MANIFEST_ENV: &str = "DUMPVIEW_MANIFEST";
const CATALOG_PAGE_SIZE_ENV: &str = "DUMPVIEW_CATALOG_PAGE_SIZE";
const MESSAGE_PAGE_SIZE_ENV: &str = "DUMPVIEW_MESSAGE_PAGE_SIZE";

#[derive(Debug, Error)]
pub enum ResolveManifestPathError {
    #[error("manifest does not exist: {0}")]
    ManifestMissing(String),
}

/// Picks the manifest from the `--manifest` flag, then `DUMPVIEW_MANIFEST`, then the dump
/// tool's default output location.
pub fn resolve_manifest_path(flag: Option<&Path>) -> Result<PathBuf, ResolveManifestPathError> {
    let env = std::env::var_os(MANIFEST_ENV).map(PathBuf::from);
    let path = pick_manifest_path(flag, env);
    if !path.is_file() {
        return Err(ResolveManifestPathError::ManifestMissing(
            path.display().to_string(),
        ));
    }
    Ok(path)
}

fn pick_manifest_path(flag: Option<&Path>, env: Option<PathBuf>) -> PathBuf {
    if let Some(flag) = flag {
        return flag.to_path_buf();
    }
    env.unwrap_or_else(|| PathBuf::from(DEFAULT_MANIFEST_PATH))
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct LoaderConfig {
    pub catalog_page_size: usize,
    pub message_page_size: usize,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            catalog_page_size: DEFAULT_CATALOG_PAGE_SIZE,
            message_page_size: DEFAULT_MESSAGE_PAGE_SIZE,
        }
    }
}

#[derive(Debug, Error)]
pub enum LoaderConfigError {
    #[error("invalid value for {name}: {value} (expected a positive integer)")]
    InvalidValue { name: &'static str, value: String },
}

pub fn load_loader_config() -> Result<LoaderConfig, LoaderConfigError> {
    loader_config_from(|name| std::env::var(name).ok())
}

fn loader_config_from(
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<LoaderConfig, LoaderConfigError> {
    let defaults = LoaderConfig::default();
    Ok(LoaderConfig {
        catalog_page_size: page_size_from(
            CATALOG_PAGE_SIZE_ENV,
            lookup(CATALOG_PAGE_SIZE_ENV),
            defaults.catalog_page_size,
        )?,
        message_page_size: page_size_from(
            MESSAGE_PAGE_SIZE_ENV,
            lookup(MESSAGE_PAGE_SIZE_ENV),
            defaults.message_page_size,
        )?,
    })
}

fn page_size_from(
    name: &'static str,
    value: Option<String>,
    default: usize,
) -> Result<usize, LoaderConfigError> {
    let Some(value) = value else {
        return Ok(default);
    };
    match value.trim().parse::<usize>() {
        Ok(size) if size > 0 => Ok(size),
        _ => Err(LoaderConfigError::InvalidValue { name, value }),
    }
}

/// Local UTC offset, falling back to UTC when the platform cannot tell.
///
/// Resolve this before spawning threads; some platforms refuse to report the offset from a
/// multi-threaded process.
pub fn local_utc_offset() -> UtcOffset {
    UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC)
}

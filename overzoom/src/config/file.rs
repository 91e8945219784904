use std::collections::HashMap;
use std::ffi::OsStr;
use std::fs::File;
use std::io::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use overzoom_core::AutoScale;
use overzoom_core::tiles::pmtiles::PmtilesSource;
use overzoom_core::tiles::{OptTileCache, TileCache};
use serde::{Deserialize, Serialize};
use subst::VariableMap;
use tracing::{info, warn};
use url::Url;

use crate::render::OutputFormat;
use crate::{OverzoomError, OverzoomResult};

/// Default size of the raw tile cache.
pub const DEFAULT_CACHE_SIZE_MB: u64 = 64;

pub type ConfigFileResult<T> = Result<T, ConfigFileError>;

#[derive(thiserror::Error, Debug)]
pub enum ConfigFileError {
    #[error("IO error {0}: {1}")]
    IoError(#[source] std::io::Error, PathBuf),

    #[error("Unable to load config file {1}: {0}")]
    ConfigLoadError(#[source] std::io::Error, PathBuf),

    #[error("Unable to parse config file {1}: {0}")]
    ConfigParseError(#[source] subst::yaml::Error, PathBuf),

    #[error("Unable to write config file {1}: {0}")]
    ConfigWriteError(#[source] std::io::Error, PathBuf),

    #[error("Unable to serialize config: {0}")]
    ConfigSerializeError(#[source] serde_yaml::Error),

    #[error("Error {0} while parsing URL {1}")]
    InvalidSourceUrl(#[source] url::ParseError, String),

    #[error("Failed to parse object store URL of {1}: {0}")]
    ObjectStoreUrlParsing(#[source] object_store::Error, String),

    #[error("Concurrency must be at least 1")]
    InvalidConcurrency,
}

pub type UnrecognizedValues = HashMap<String, serde_yaml::Value>;

#[serde_with::skip_serializing_none]
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Path or URL of the `.pmtiles` archive to read from.
    ///
    /// `s3://`, `gs://`, `az://`, `http(s)://` and `file://` URLs are passed to
    /// `object_store`, anything else is treated as a local path.
    pub archive: Option<String>,

    /// How tiles past the archive's max zoom are produced. Defaults to `geometry`.
    pub autoscale: Option<AutoScale>,

    /// Output format of rendered tiles. Defaults to `json`.
    pub format: Option<OutputFormat>,

    /// Directory to write tiles into, as `z/x/y.<format>`. Without it, JSON is printed to stdout.
    pub output: Option<PathBuf>,

    /// Number of tiles rendered at the same time. Defaults to the number of CPUs.
    pub concurrency: Option<usize>,

    /// Maximum size of the raw tile cache in megabytes (0 to disable)
    pub cache_size_mb: Option<u64>,

    /// Maximum lifetime of cached tiles (TTL - time to live from creation).
    ///
    /// Supports human-readable formats like "1h", "30m", "1d", or "3600s".
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "humantime_serde"
    )]
    pub cache_expiry: Option<Duration>,

    /// Maximum idle time of cached tiles (TTI - time to idle since last access).
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "humantime_serde"
    )]
    pub cache_idle_timeout: Option<Duration>,

    #[serde(flatten, skip_serializing)]
    pub unrecognized: UnrecognizedValues,
}

impl Config {
    /// Validate the config and warn about keys that are not understood.
    pub fn finalize(&mut self) -> OverzoomResult<()> {
        let mut keys: Vec<&String> = self.unrecognized.keys().collect();
        keys.sort();
        for key in keys {
            warn!(
                "Ignoring unrecognized configuration key '{key}'. Please check your configuration file for typos."
            );
        }
        if self.concurrency == Some(0) {
            return Err(ConfigFileError::InvalidConcurrency.into());
        }
        if self.archive.is_none() {
            return Err(OverzoomError::NoArchive);
        }
        if self.format == Some(OutputFormat::Mvt) && self.output.is_none() {
            return Err(OverzoomError::MvtToStdout);
        }
        Ok(())
    }

    #[must_use]
    pub fn concurrency(&self) -> usize {
        self.concurrency.unwrap_or_else(num_cpus::get).max(1)
    }

    #[must_use]
    pub fn tile_cache(&self) -> OptTileCache {
        let size_mb = self.cache_size_mb.unwrap_or(DEFAULT_CACHE_SIZE_MB);
        if size_mb == 0 {
            info!("Tile cache is disabled");
            return None;
        }
        Some(TileCache::new(
            size_mb * 1024 * 1024,
            self.cache_expiry,
            self.cache_idle_timeout,
        ))
    }

    /// Create the tile source for [`Config::archive`]. The archive itself is opened on first use.
    pub fn resolve_source(&self) -> OverzoomResult<PmtilesSource> {
        let archive = self.archive.as_deref().ok_or(OverzoomError::NoArchive)?;
        let url = archive_url(archive)?;
        let (store, path) = object_store::parse_url(&url)
            .map_err(|e| ConfigFileError::ObjectStoreUrlParsing(e, archive.to_string()))?;
        Ok(PmtilesSource::new(source_id(&url), Arc::from(store), path))
    }

    pub fn save_to_file(&self, file_name: &Path) -> ConfigFileResult<()> {
        let yaml = serde_yaml::to_string(&self).map_err(ConfigFileError::ConfigSerializeError)?;
        if file_name.as_os_str() == OsStr::new("-") {
            info!("Current system configuration:");
            println!("\n\n{yaml}\n");
            Ok(())
        } else {
            info!(
                "Saving config to {}, use --config to load it",
                file_name.display()
            );
            File::create(file_name)
                .map_err(|e| ConfigFileError::ConfigWriteError(e, file_name.to_path_buf()))?
                .write_all(yaml.as_bytes())
                .map_err(|e| ConfigFileError::ConfigWriteError(e, file_name.to_path_buf()))?;
            Ok(())
        }
    }
}

const URL_SCHEMES: &[&str] = &[
    "s3://", "s3a://", "gs://", "az://", "adl://", "azure://", "abfs://", "abfss://", "http://",
    "https://", "file://",
];

fn archive_url(archive: &str) -> ConfigFileResult<Url> {
    if URL_SCHEMES.iter().any(|scheme| archive.starts_with(scheme)) {
        return Url::parse(archive)
            .map_err(|e| ConfigFileError::InvalidSourceUrl(e, archive.to_string()));
    }
    let path = PathBuf::from(archive);
    // canonicalize to get rid of symlinks, object_store does not support relative paths
    let path = path
        .canonicalize()
        .map_err(|e| ConfigFileError::IoError(e, path))?;
    Url::from_file_path(&path).map_err(|()| {
        ConfigFileError::InvalidSourceUrl(url::ParseError::RelativeUrlWithoutBase, archive.to_string())
    })
}

/// File stem of the archive, e.g. `osm` for `s3://bucket/tiles/osm.pmtiles`.
fn source_id(url: &Url) -> String {
    url.path_segments()
        .and_then(|mut segments| segments.next_back())
        .map(|name| name.split('.').next().unwrap_or(name))
        .filter(|name| !name.is_empty())
        .unwrap_or("archive")
        .to_string()
}

pub fn read_config<'a, M>(file_name: &Path, env: &'a M) -> ConfigFileResult<Config>
where
    M: VariableMap<'a>,
    M::Value: AsRef<str>,
{
    let mut file =
        File::open(file_name).map_err(|e| ConfigFileError::ConfigLoadError(e, file_name.into()))?;
    let mut contents = String::new();
    file.read_to_string(&mut contents)
        .map_err(|e| ConfigFileError::ConfigLoadError(e, file_name.into()))?;
    parse_config(&contents, env, file_name)
}

pub fn parse_config<'a, M>(contents: &str, env: &'a M, file_name: &Path) -> ConfigFileResult<Config>
where
    M: VariableMap<'a>,
    M::Value: AsRef<str>,
{
    subst::yaml::from_str(contents, env)
        .map_err(|e| ConfigFileError::ConfigParseError(e, file_name.into()))
}

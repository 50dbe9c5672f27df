//! Host configuration
//!
//! Data directory resolution, highest priority first:
//! 1. Command-line argument
//! 2. `ESPLOTTER_USER_DATA_DIR` environment variable
//! 3. `data_dir` key of the TOML config file
//! 4. Platform data directory (`<data_dir>/esplot`)
//!
//! The remaining settings come from the config file when present and
//! fall back to the defaults below.

use crate::error::ConfigError;
use esplot_contract::DEFAULT_EVENT_BUFFER;
use esplot_ingest::DEFAULT_MAX_FILE_SIZE;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Environment variable overriding the data directory
pub const DATA_DIR_ENV: &str = "ESPLOTTER_USER_DATA_DIR";

/// Directory under the data directory holding one cache directory per file
pub const IMPORT_CACHE_DIR: &str = "import-cache";

/// Default hot series cache size, in entries
pub const DEFAULT_SERIES_CACHE_CAPACITY: u64 = 256;

/// Default host actor queue bound
pub const DEFAULT_COMMAND_BUFFER: usize = 256;

const APP_DIR: &str = "esplot";
const CONFIG_FILE: &str = "config.toml";

/// Host settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostConfig {
    /// Root for `state.json` and `import-cache/`
    pub data_dir: PathBuf,
    /// Largest accepted source file, in bytes
    pub max_file_size: u64,
    /// Series kept in memory after a read
    pub series_cache_capacity: u64,
    /// Per-surface event queue bound
    pub event_buffer: usize,
    /// Host actor queue bound
    pub command_buffer: usize,
}

/// Keys accepted in `config.toml`
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ConfigFile {
    data_dir: Option<PathBuf>,
    max_file_size: Option<u64>,
    series_cache_capacity: Option<u64>,
    event_buffer: Option<usize>,
    command_buffer: Option<usize>,
}

impl HostConfig {
    /// Defaults rooted at `data_dir`
    #[must_use]
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            series_cache_capacity: DEFAULT_SERIES_CACHE_CAPACITY,
            event_buffer: DEFAULT_EVENT_BUFFER,
            command_buffer: DEFAULT_COMMAND_BUFFER,
        }
    }

    #[must_use]
    pub fn with_max_file_size(mut self, max_file_size: u64) -> Self {
        self.max_file_size = max_file_size;
        self
    }

    #[must_use]
    pub fn with_series_cache_capacity(mut self, capacity: u64) -> Self {
        self.series_cache_capacity = capacity;
        self
    }

    #[must_use]
    pub fn with_event_buffer(mut self, event_buffer: usize) -> Self {
        self.event_buffer = event_buffer;
        self
    }

    #[must_use]
    pub fn with_command_buffer(mut self, command_buffer: usize) -> Self {
        self.command_buffer = command_buffer;
        self
    }

    /// Parent of every per-file cache directory
    #[must_use]
    pub fn cache_root(&self) -> PathBuf {
        self.data_dir.join(IMPORT_CACHE_DIR)
    }

    /// Resolve from the process environment
    ///
    /// `config_file` defaults to `<config_dir>/esplot/config.toml`, which
    /// may be absent.
    ///
    /// # Errors
    /// - [`ConfigError::Read`] / [`ConfigError::Parse`] for a bad config file
    /// - [`ConfigError::NoDataDir`] when no source yields a data directory
    pub fn resolve(
        cli_data_dir: Option<&Path>,
        config_file: Option<&Path>,
    ) -> Result<Self, ConfigError> {
        Self::resolve_with(cli_data_dir, config_file, |key| std::env::var_os(key))
    }

    /// [`resolve`](Self::resolve) with an explicit environment lookup
    ///
    /// # Errors
    /// See [`resolve`](Self::resolve)
    pub fn resolve_with<F>(
        cli_data_dir: Option<&Path>,
        config_file: Option<&Path>,
        env: F,
    ) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<std::ffi::OsString>,
    {
        let file = match config_file {
            Some(path) => load_file(path)?,
            None => match default_config_file() {
                Some(path) if path.is_file() => load_file(&path)?,
                _ => ConfigFile::default(),
            },
        };

        let data_dir = cli_data_dir
            .map(Path::to_path_buf)
            .or_else(|| env(DATA_DIR_ENV).filter(|v| !v.is_empty()).map(PathBuf::from))
            .or(file.data_dir)
            .or_else(|| dirs::data_dir().map(|d| d.join(APP_DIR)))
            .ok_or(ConfigError::NoDataDir)?;

        let mut config = Self::new(data_dir);
        if let Some(v) = file.max_file_size {
            config.max_file_size = v;
        }
        if let Some(v) = file.series_cache_capacity {
            config.series_cache_capacity = v;
        }
        if let Some(v) = file.event_buffer {
            config.event_buffer = v;
        }
        if let Some(v) = file.command_buffer {
            config.command_buffer = v;
        }

        debug!(data_dir = %config.data_dir.display(), "resolved host configuration");
        Ok(config)
    }
}

fn default_config_file() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join(APP_DIR).join(CONFIG_FILE))
}

fn load_file(path: &Path) -> Result<ConfigFile, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&text).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

use std::path::{Path, PathBuf};
use std::time::Duration;

use ini::Ini;
use tracing::{debug, warn};

use super::{config_file_path, ConfigError, ConfigKey};
use crate::logging::{LoggingConfig, DEFAULT_LOG_LEVEL};
use crate::renderer::FrameParams;
use crate::storage::{HttpConfig, DEFAULT_TIMEOUT_SECS};
use crate::tile::{StoreConfig, DEFAULT_TILE_CACHE_CAPACITY};
use crate::tiler::{TilerOptions, DEFAULT_BUFFER, DEFAULT_MAX_ZOOM, DEFAULT_TOLERANCE};

#[derive(Debug, Clone, PartialEq)]
pub struct FetchSettings {
    pub user_agent: String,
    pub timeout_secs: u64,
}

impl Default for FetchSettings {
    fn default() -> Self {
        let http = HttpConfig::default();
        Self {
            user_agent: http.user_agent,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl FetchSettings {
    pub fn http_config(&self) -> HttpConfig {
        HttpConfig {
            user_agent: self.user_agent.clone(),
            timeout: Duration::from_secs(self.timeout_secs),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TilerSettings {
    pub max_zoom: u8,
    pub buffer: u32,
    pub tolerance: f64,
}

impl Default for TilerSettings {
    fn default() -> Self {
        Self {
            max_zoom: DEFAULT_MAX_ZOOM,
            buffer: DEFAULT_BUFFER,
            tolerance: DEFAULT_TOLERANCE,
        }
    }
}

impl TilerSettings {
    pub fn options(&self) -> TilerOptions {
        TilerOptions::default()
            .with_max_zoom(self.max_zoom)
            .with_buffer(self.buffer)
            .with_tolerance(self.tolerance)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreSettings {
    pub tile_cache_capacity: u64,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            tile_cache_capacity: DEFAULT_TILE_CACHE_CAPACITY,
        }
    }
}

impl StoreSettings {
    pub fn store_config(&self) -> StoreConfig {
        StoreConfig {
            tile_cache_capacity: self.tile_cache_capacity,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PainterSettings {
    pub overdraw: bool,
    pub debug_clip: bool,
}

impl PainterSettings {
    pub fn frame_params(&self) -> FrameParams {
        FrameParams {
            overdraw: self.overdraw,
            debug_clip: self.debug_clip,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingSettings {
    pub level: String,
    /// Log file directory. Console only when unset.
    pub directory: Option<PathBuf>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_LEVEL.to_string(),
            directory: None,
        }
    }
}

impl LoggingSettings {
    pub fn logging_config(&self) -> LoggingConfig {
        LoggingConfig {
            level: self.level.clone(),
            directory: self.directory.clone(),
            ..LoggingConfig::default()
        }
    }
}

/// All settings, one struct per INI section.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigFile {
    pub fetch: FetchSettings,
    pub tiler: TilerSettings,
    pub store: StoreSettings,
    pub painter: PainterSettings,
    pub logging: LoggingSettings,
}

impl ConfigFile {
    /// Loads from the default path. A missing file yields defaults.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&config_file_path()?)
    }

    /// Loads from `path`. A missing file yields defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }
        let ini = Ini::load_from_file(path).map_err(|e| match e {
            ini::Error::Io(source) => ConfigError::Io {
                path: path.to_path_buf(),
                source,
            },
            ini::Error::Parse(e) => ConfigError::Parse {
                path: path.to_path_buf(),
                message: e.to_string(),
            },
        })?;
        let config = Self::from_ini(&ini)?;
        debug!(path = %path.display(), "Loaded config file");
        Ok(config)
    }

    /// Parses INI text.
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let ini = Ini::load_from_str(text).map_err(|e| ConfigError::Parse {
            path: PathBuf::new(),
            message: e.to_string(),
        })?;
        Self::from_ini(&ini)
    }

    fn from_ini(ini: &Ini) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        for (section, properties) in ini.iter() {
            let Some(section) = section else {
                continue;
            };
            for (key, value) in properties.iter() {
                let name = format!("{}.{}", section, key);
                match name.parse::<ConfigKey>() {
                    Ok(config_key) => config_key.set(&mut config, value)?,
                    Err(_) => warn!(key = %name, "Ignoring unknown config key"),
                }
            }
        }
        Ok(config)
    }

    pub fn to_ini(&self) -> Ini {
        let mut ini = Ini::new();
        for key in ConfigKey::all() {
            let value = key.get(self);
            if !value.is_empty() {
                ini.with_section(Some(key.section()))
                    .set(key.key_name(), value);
            }
        }
        ini
    }

    /// Saves to the default path, creating its directory.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&config_file_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let io_error = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io_error)?;
        }
        self.to_ini().write_to_file(path).map_err(io_error)
    }
}

//! Configuration file support
//!
//! Settings live in an INI file, by default
//! `~/.config/tilerender/config.ini`. A missing file means defaults.
//!
//! ```ini
//! [fetch]
//! user_agent = tilerender/0.1.0
//! timeout_secs = 30
//!
//! [tiler]
//! max_zoom = 18
//! buffer = 255
//! tolerance = 4.0
//!
//! [store]
//! tile_cache_capacity = 512
//!
//! [painter]
//! overdraw = false
//! debug_clip = false
//!
//! [logging]
//! level = info
//! directory = /var/log/tilerender
//! ```
//!
//! Individual settings are addressed as `section.key` through
//! [`ConfigKey`], which validates values before storing them.

mod file;
mod keys;

pub use file::{
    ConfigFile, FetchSettings, LoggingSettings, PainterSettings, StoreSettings, TilerSettings,
};
pub use keys::ConfigKey;

use std::path::PathBuf;

use thiserror::Error;

/// Directory name under the user configuration directory.
pub const CONFIG_DIR_NAME: &str = "tilerender";

pub const CONFIG_FILE_NAME: &str = "config.ini";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to access config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("Invalid value '{value}' for {key}: {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },

    #[error("Unknown configuration key '{0}'")]
    UnknownKey(String),

    #[error("Could not determine the user configuration directory")]
    NoConfigDir,
}

/// `<config dir>/tilerender`, if the platform has a config directory.
pub fn config_dir() -> Result<PathBuf, ConfigError> {
    dirs::config_dir()
        .map(|dir| dir.join(CONFIG_DIR_NAME))
        .ok_or(ConfigError::NoConfigDir)
}

/// Default location of the configuration file.
pub fn config_file_path() -> Result<PathBuf, ConfigError> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

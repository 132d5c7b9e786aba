use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use tracing_subscriber::EnvFilter;

use super::{ConfigError, ConfigFile};
use crate::coord::MAX_ZOOM;

/// A single `section.key` setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigKey {
    FetchUserAgent,
    FetchTimeoutSecs,
    TilerMaxZoom,
    TilerBuffer,
    TilerTolerance,
    StoreTileCacheCapacity,
    PainterOverdraw,
    PainterDebugClip,
    LoggingLevel,
    LoggingDirectory,
}

const ALL_KEYS: [ConfigKey; 10] = [
    ConfigKey::FetchUserAgent,
    ConfigKey::FetchTimeoutSecs,
    ConfigKey::TilerMaxZoom,
    ConfigKey::TilerBuffer,
    ConfigKey::TilerTolerance,
    ConfigKey::StoreTileCacheCapacity,
    ConfigKey::PainterOverdraw,
    ConfigKey::PainterDebugClip,
    ConfigKey::LoggingLevel,
    ConfigKey::LoggingDirectory,
];

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Some(true),
        "false" | "no" | "off" | "0" => Some(false),
        _ => None,
    }
}

impl ConfigKey {
    /// Every key, grouped by section.
    pub fn all() -> &'static [ConfigKey] {
        &ALL_KEYS
    }

    /// Full `section.key` name.
    pub fn name(&self) -> String {
        format!("{}.{}", self.section(), self.key_name())
    }

    pub fn section(&self) -> &'static str {
        match self {
            ConfigKey::FetchUserAgent | ConfigKey::FetchTimeoutSecs => "fetch",
            ConfigKey::TilerMaxZoom | ConfigKey::TilerBuffer | ConfigKey::TilerTolerance => {
                "tiler"
            }
            ConfigKey::StoreTileCacheCapacity => "store",
            ConfigKey::PainterOverdraw | ConfigKey::PainterDebugClip => "painter",
            ConfigKey::LoggingLevel | ConfigKey::LoggingDirectory => "logging",
        }
    }

    pub fn key_name(&self) -> &'static str {
        match self {
            ConfigKey::FetchUserAgent => "user_agent",
            ConfigKey::FetchTimeoutSecs => "timeout_secs",
            ConfigKey::TilerMaxZoom => "max_zoom",
            ConfigKey::TilerBuffer => "buffer",
            ConfigKey::TilerTolerance => "tolerance",
            ConfigKey::StoreTileCacheCapacity => "tile_cache_capacity",
            ConfigKey::PainterOverdraw => "overdraw",
            ConfigKey::PainterDebugClip => "debug_clip",
            ConfigKey::LoggingLevel => "level",
            ConfigKey::LoggingDirectory => "directory",
        }
    }

    /// Current value as text. Unset optional values are empty.
    pub fn get(&self, config: &ConfigFile) -> String {
        match self {
            ConfigKey::FetchUserAgent => config.fetch.user_agent.clone(),
            ConfigKey::FetchTimeoutSecs => config.fetch.timeout_secs.to_string(),
            ConfigKey::TilerMaxZoom => config.tiler.max_zoom.to_string(),
            ConfigKey::TilerBuffer => config.tiler.buffer.to_string(),
            ConfigKey::TilerTolerance => config.tiler.tolerance.to_string(),
            ConfigKey::StoreTileCacheCapacity => config.store.tile_cache_capacity.to_string(),
            ConfigKey::PainterOverdraw => config.painter.overdraw.to_string(),
            ConfigKey::PainterDebugClip => config.painter.debug_clip.to_string(),
            ConfigKey::LoggingLevel => config.logging.level.clone(),
            ConfigKey::LoggingDirectory => config
                .logging
                .directory
                .as_ref()
                .map(|d| d.display().to_string())
                .unwrap_or_default(),
        }
    }

    /// Validates and stores `value`.
    pub fn set(&self, config: &mut ConfigFile, value: &str) -> Result<(), ConfigError> {
        let value = value.trim();
        let invalid = |reason: &str| ConfigError::InvalidValue {
            key: self.name(),
            value: value.to_string(),
            reason: reason.to_string(),
        };

        match self {
            ConfigKey::FetchUserAgent => {
                if value.is_empty() {
                    return Err(invalid("must not be empty"));
                }
                config.fetch.user_agent = value.to_string();
            }
            ConfigKey::FetchTimeoutSecs => {
                config.fetch.timeout_secs = value
                    .parse::<u64>()
                    .ok()
                    .filter(|&secs| secs > 0)
                    .ok_or_else(|| invalid("expected a positive number of seconds"))?;
            }
            ConfigKey::TilerMaxZoom => {
                config.tiler.max_zoom = value
                    .parse::<u8>()
                    .ok()
                    .filter(|&zoom| zoom <= MAX_ZOOM)
                    .ok_or_else(|| invalid(&format!("expected a zoom level 0-{}", MAX_ZOOM)))?;
            }
            ConfigKey::TilerBuffer => {
                let buffer = value
                    .parse::<u32>()
                    .map_err(|_| invalid("expected a non-negative integer"))?;
                let options = config.tiler.options().with_buffer(buffer);
                options.validate().map_err(|e| invalid(&e.to_string()))?;
                config.tiler.buffer = buffer;
            }
            ConfigKey::TilerTolerance => {
                config.tiler.tolerance = value
                    .parse::<f64>()
                    .ok()
                    .filter(|t| t.is_finite() && *t >= 0.0)
                    .ok_or_else(|| invalid("expected a finite non-negative number"))?;
            }
            ConfigKey::StoreTileCacheCapacity => {
                config.store.tile_cache_capacity = value
                    .parse::<u64>()
                    .ok()
                    .filter(|&n| n > 0)
                    .ok_or_else(|| invalid("expected a positive tile count"))?;
            }
            ConfigKey::PainterOverdraw => {
                config.painter.overdraw =
                    parse_bool(value).ok_or_else(|| invalid("expected true or false"))?;
            }
            ConfigKey::PainterDebugClip => {
                config.painter.debug_clip =
                    parse_bool(value).ok_or_else(|| invalid("expected true or false"))?;
            }
            ConfigKey::LoggingLevel => {
                EnvFilter::try_new(value).map_err(|e| invalid(&e.to_string()))?;
                config.logging.level = value.to_string();
            }
            ConfigKey::LoggingDirectory => {
                config.logging.directory = (!value.is_empty()).then(|| PathBuf::from(value));
            }
        }
        Ok(())
    }
}

impl FromStr for ConfigKey {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        ALL_KEYS
            .iter()
            .copied()
            .find(|key| key.name() == s)
            .ok_or_else(|| ConfigError::UnknownKey(s.to_string()))
    }
}

impl fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.section(), self.key_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_key_names() {
        for key in ConfigKey::all() {
            assert_eq!(key.name().parse::<ConfigKey>().unwrap(), *key);
        }
        assert!(matches!(
            "tiler.wrap".parse::<ConfigKey>(),
            Err(ConfigError::UnknownKey(_))
        ));
    }

    #[test]
    fn test_get_set() {
        let mut config = ConfigFile::default();
        ConfigKey::TilerTolerance.set(&mut config, " 1.5 ").unwrap();
        assert_eq!(ConfigKey::TilerTolerance.get(&config), "1.5");

        ConfigKey::PainterDebugClip.set(&mut config, "yes").unwrap();
        assert!(config.painter.debug_clip);

        assert_eq!(ConfigKey::LoggingDirectory.get(&config), "");
        ConfigKey::LoggingDirectory.set(&mut config, "/tmp/logs").unwrap();
        assert_eq!(config.logging.directory, Some(PathBuf::from("/tmp/logs")));
    }

    #[test]
    fn test_validation() {
        let mut config = ConfigFile::default();
        let rejected = [
            (ConfigKey::FetchUserAgent, ""),
            (ConfigKey::FetchTimeoutSecs, "0"),
            (ConfigKey::TilerMaxZoom, "26"),
            (ConfigKey::TilerBuffer, "40000"),
            (ConfigKey::TilerBuffer, "4294967295"),
            (ConfigKey::TilerTolerance, "NaN"),
            (ConfigKey::TilerTolerance, "-1"),
            (ConfigKey::StoreTileCacheCapacity, "0"),
            (ConfigKey::PainterOverdraw, "maybe"),
            (ConfigKey::LoggingLevel, "tilerender=loud"),
        ];
        for (key, value) in rejected {
            assert!(
                matches!(key.set(&mut config, value), Err(ConfigError::InvalidValue { .. })),
                "{key} accepted {value:?}"
            );
        }
        assert_eq!(config, ConfigFile::default());
    }
}

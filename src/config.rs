//! Configuration file support
//!
//! ```toml
//! programmer = "physmap"
//!
//! [timing]
//! byte_write_timeout_us = 200
//! sector_erase_timeout_ms = 250
//! max_tick_wait_loops = 0x40000000
//! ```

use romflasher_core::timing::{
    TimingLimits, BYTE_WRITE_TIMEOUT_US, MAX_TICK_WAIT_LOOPS, SECTOR_ERASE_TIMEOUT_MS,
};
use serde::Deserialize;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Locations tried when no --config is given
const DEFAULT_PATHS: &[&str] = &["romflasher.toml", "/etc/romflasher/romflasher.toml"];

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid value in config file: {0} must not be zero")]
    Zero(&'static str),
}

/// Contents of romflasher.toml
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Programmer used when -p is not given
    #[serde(default)]
    pub programmer: Option<String>,

    #[serde(default)]
    pub timing: TimingConfig,
}

/// `[timing]` table
#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TimingConfig {
    #[serde(deserialize_with = "deserialize_hex_u32")]
    pub byte_write_timeout_us: u32,
    #[serde(deserialize_with = "deserialize_hex_u32")]
    pub sector_erase_timeout_ms: u32,
    #[serde(deserialize_with = "deserialize_hex_u32")]
    pub max_tick_wait_loops: u32,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            byte_write_timeout_us: BYTE_WRITE_TIMEOUT_US,
            sector_erase_timeout_ms: SECTOR_ERASE_TIMEOUT_MS,
            max_tick_wait_loops: MAX_TICK_WAIT_LOOPS,
        }
    }
}

impl TimingConfig {
    /// Limits for the programming engine
    pub fn limits(&self) -> TimingLimits {
        TimingLimits {
            byte_write_timeout_us: self.byte_write_timeout_us,
            sector_erase_timeout_ms: self.sector_erase_timeout_ms,
            max_tick_wait_loops: self.max_tick_wait_loops,
            ..TimingLimits::default()
        }
    }
}

impl Config {
    /// Parse and validate a TOML document
    pub fn from_toml(path: &Path, text: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        let timing = &config.timing;
        if timing.byte_write_timeout_us == 0 {
            return Err(ConfigError::Zero("byte_write_timeout_us"));
        }
        if timing.sector_erase_timeout_ms == 0 {
            return Err(ConfigError::Zero("sector_erase_timeout_ms"));
        }
        if timing.max_tick_wait_loops == 0 {
            return Err(ConfigError::Zero("max_tick_wait_loops"));
        }

        Ok(config)
    }

    /// Load from `explicit`, or from the first default location that exists
    ///
    /// A missing explicit file is an error; missing default files are not.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            return Self::load_file(path);
        }

        for candidate in DEFAULT_PATHS {
            let path = Path::new(candidate);
            if path.is_file() {
                return Self::load_file(path);
            }
        }

        log::debug!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml(path, &text)?;
        log::debug!("Loaded config from {}", path.display());
        Ok(config)
    }
}

/// Deserialize a u32 that can be hex (0x...) or decimal
fn deserialize_hex_u32<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum HexOrInt {
        Int(u32),
        Str(String),
    }

    match HexOrInt::deserialize(deserializer)? {
        HexOrInt::Int(n) => Ok(n),
        HexOrInt::Str(s) => parse_number(&s).map_err(serde::de::Error::custom),
    }
}

/// Parse a number that can be hex (0x...) or decimal
fn parse_number(s: &str) -> Result<u32, String> {
    let s = s.trim();
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16).map_err(|e| format!("invalid hex: {}", e))
    } else {
        s.parse::<u32>().map_err(|e| format!("invalid number: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> Result<Config, ConfigError> {
        Config::from_toml(Path::new("test.toml"), text)
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = parse("").unwrap();
        assert!(config.programmer.is_none());
        assert_eq!(config.timing.limits(), TimingLimits::default());
    }

    #[test]
    fn test_full_config() {
        let config = parse(
            r#"
            programmer = "dummy:chip=SST39SF040"

            [timing]
            byte_write_timeout_us = 400
            sector_erase_timeout_ms = "0x1F4"
            max_tick_wait_loops = "0x1000"
            "#,
        )
        .unwrap();
        assert_eq!(config.programmer.as_deref(), Some("dummy:chip=SST39SF040"));
        let limits = config.timing.limits();
        assert_eq!(limits.byte_write_timeout_us, 400);
        assert_eq!(limits.sector_erase_timeout_ms, 500);
        assert_eq!(limits.max_tick_wait_loops, 0x1000);
    }

    #[test]
    fn test_partial_timing_keeps_defaults() {
        let config = parse("[timing]\nsector_erase_timeout_ms = 1000\n").unwrap();
        assert_eq!(config.timing.sector_erase_timeout_ms, 1000);
        assert_eq!(config.timing.byte_write_timeout_us, BYTE_WRITE_TIMEOUT_US);
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(matches!(
            parse("[timing]\nbyte_write_timeout_us = 0\n"),
            Err(ConfigError::Zero("byte_write_timeout_us"))
        ));
        assert!(matches!(
            parse("[timing]\nbyte_write_timeout_us = \"fast\"\n"),
            Err(ConfigError::Parse { .. })
        ));
        assert!(matches!(
            parse("frobnicate = true\n"),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_missing_explicit_file_is_error() {
        let result = Config::load(Some(Path::new("/nonexistent/romflasher.toml")));
        assert!(matches!(result, Err(ConfigError::Read { .. })));
    }
}

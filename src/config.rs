//=========================================================================
// Engine Configuration
//=========================================================================
//
// Runtime settings loadable from TOML. Every field has a default, so an
// empty document (or no file at all) yields a working configuration.
//
// Example:
//   frame_rate = 72.0
//   drain_cap = 16
//
//   [window]
//   title = "Lobby"
//   width = 1280
//   height = 720
//
//=========================================================================

//=== External Dependencies ===============================================

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

//=== Internal Dependencies ===============================================

use crate::core::scheduler::DEFAULT_DRAIN_CAP;

//=== ConfigError =========================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config value `{field}`: {reason}")]
    Invalid {
        field: &'static str,
        reason: &'static str,
    },
}

//=== WindowConfig ========================================================

/// Desktop preview window.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WindowConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "Visor".to_owned(),
            width: 1280,
            height: 720,
        }
    }
}

//=== EngineConfig ========================================================

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Render cycles per second.
    pub frame_rate: f64,

    /// Deferred actions executed per cycle.
    pub drain_cap: usize,

    /// Capacity of the host → render thread event channel.
    pub channel_capacity: usize,

    /// Host events processed per frame before the rest is deferred.
    pub max_host_events_per_frame: usize,

    /// Hold time after which a press becomes a long press.
    pub long_press_ms: u64,

    /// Maximum gap between two short presses forming a double tap.
    pub double_tap_ms: u64,

    pub window: WindowConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            frame_rate: 60.0,
            drain_cap: DEFAULT_DRAIN_CAP,
            channel_capacity: 128,
            max_host_events_per_frame: 100,
            long_press_ms: 500,
            double_tap_ms: 300,
            window: WindowConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Parses and validates a TOML document.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and parses a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&source)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |field, reason| Err(ConfigError::Invalid { field, reason });

        if !(self.frame_rate.is_finite() && self.frame_rate > 0.0) {
            return invalid("frame_rate", "must be a positive number");
        }
        if self.drain_cap == 0 {
            return invalid("drain_cap", "must be positive");
        }
        if self.channel_capacity == 0 {
            return invalid("channel_capacity", "must be positive");
        }
        if self.max_host_events_per_frame == 0 {
            return invalid("max_host_events_per_frame", "must be positive");
        }
        if self.double_tap_ms >= self.long_press_ms {
            return invalid("double_tap_ms", "must be shorter than long_press_ms");
        }
        Ok(())
    }

    pub fn long_press(&self) -> Duration {
        Duration::from_millis(self.long_press_ms)
    }

    pub fn double_tap(&self) -> Duration {
        Duration::from_millis(self.double_tap_ms)
    }
}

//=========================================================================
// Unit Tests
//=========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let config = EngineConfig::from_toml_str("").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.drain_cap, 16);
        assert_eq!(config.frame_rate, 60.0);
    }

    #[test]
    fn partial_document_overrides_fields() {
        let config = EngineConfig::from_toml_str(
            r#"
            frame_rate = 72.0
            drain_cap = 8

            [window]
            title = "Lobby"
            "#,
        )
        .unwrap();

        assert_eq!(config.frame_rate, 72.0);
        assert_eq!(config.drain_cap, 8);
        assert_eq!(config.window.title, "Lobby");
        assert_eq!(config.window.width, 1280);
        assert_eq!(config.channel_capacity, 128);
    }

    #[test]
    fn unknown_field_is_rejected() {
        assert!(matches!(
            EngineConfig::from_toml_str("tick_rate = 30"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn zero_drain_cap_is_invalid() {
        assert!(matches!(
            EngineConfig::from_toml_str("drain_cap = 0"),
            Err(ConfigError::Invalid { field: "drain_cap", .. })
        ));
    }

    #[test]
    fn double_tap_must_fit_inside_long_press() {
        assert!(matches!(
            EngineConfig::from_toml_str("long_press_ms = 200\ndouble_tap_ms = 300"),
            Err(ConfigError::Invalid { field: "double_tap_ms", .. })
        ));
    }

    #[test]
    fn missing_file_reports_path() {
        match EngineConfig::load("/nonexistent/visor.toml") {
            Err(ConfigError::Io { path, .. }) => assert!(path.ends_with("visor.toml")),
            other => panic!("Expected IO error, got {:?}", other),
        }
    }
}

//! Configuration loading and typed config structures.
//!
//! The canonical configuration lives in `petri-config.yaml`. Every field
//! has a default, so a missing file or a partial file both yield a usable
//! configuration.

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ControlConfig {
    /// Remote engine connection settings.
    #[serde(default)]
    pub engine: EngineConfig,

    /// Where preferences are persisted.
    #[serde(default)]
    pub preferences: PreferencesConfig,

    /// Control surface behaviour.
    #[serde(default)]
    pub controls: ControlsConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl ControlConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// Environment variables override file values:
    /// - `PETRI_ENGINE_URL` overrides `engine.base_url`
    /// - `PETRI_PREFERENCES_PATH` overrides `preferences.path`
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, or
    /// [`ConfigError::Yaml`] if the content is not valid YAML.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Load from `path` when it exists, otherwise start from defaults.
    /// Environment overrides apply either way.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file exists but cannot be read or
    /// parsed.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::from_file(path)
        } else {
            let mut config = Self::default();
            config.apply_env_overrides();
            Ok(config)
        }
    }

    /// Parse configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let mut config: Self = if yaml.trim().is_empty() {
            Self::default()
        } else {
            serde_yml::from_str(yaml)?
        };
        config.apply_env_overrides();
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("PETRI_ENGINE_URL") {
            self.engine.base_url = url;
        }
        if let Ok(path) = std::env::var("PETRI_PREFERENCES_PATH") {
            self.preferences.path = PathBuf::from(path);
        }
    }
}

/// Remote engine connection settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EngineConfig {
    /// Base URL of the engine's REST API.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Per-request timeout in milliseconds.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

/// Preference persistence settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PreferencesConfig {
    /// Path of the JSON preference file.
    #[serde(default = "default_preferences_path")]
    pub path: PathBuf,
}

impl Default for PreferencesConfig {
    fn default() -> Self {
        Self {
            path: default_preferences_path(),
        }
    }
}

/// Control surface behaviour.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ControlsConfig {
    /// Whether keyboard shortcuts are active.
    #[serde(default = "default_true")]
    pub keyboard_shortcuts: bool,

    /// Resolution of the elapsed-time ticker in milliseconds.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// Speed multiplier used when none is persisted (`1..=10`).
    #[serde(default = "default_speed")]
    pub default_speed: u8,

    /// Name given to runs created without one.
    #[serde(default = "default_run_name")]
    pub default_run_name: String,
}

impl Default for ControlsConfig {
    fn default() -> Self {
        Self {
            keyboard_shortcuts: true,
            tick_interval_ms: default_tick_interval_ms(),
            default_speed: default_speed(),
            default_run_name: default_run_name(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Default `tracing` filter when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

// ---------------------------------------------------------------------------
// Default value functions
// ---------------------------------------------------------------------------

fn default_base_url() -> String {
    String::from("http://localhost:8000/api")
}

const fn default_request_timeout_ms() -> u64 {
    10_000
}

fn default_preferences_path() -> PathBuf {
    PathBuf::from(".petri/preferences.json")
}

const fn default_true() -> bool {
    true
}

const fn default_tick_interval_ms() -> u64 {
    1_000
}

const fn default_speed() -> u8 {
    1
}

fn default_run_name() -> String {
    String::from("Bacteria Evolution Simulation")
}

fn default_log_level() -> String {
    String::from("info")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn empty_yaml_yields_defaults() {
        let config = ControlConfig::parse("").unwrap();
        assert_eq!(config.controls.tick_interval_ms, 1_000);
        assert_eq!(config.controls.default_speed, 1);
        assert!(config.controls.keyboard_shortcuts);
        assert_eq!(config.engine.request_timeout_ms, 10_000);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn partial_yaml_keeps_other_defaults() {
        let yaml = r"
engine:
  request_timeout_ms: 2500
controls:
  keyboard_shortcuts: false
  default_speed: 4
";
        let config = ControlConfig::parse(yaml).unwrap();
        assert_eq!(config.engine.request_timeout_ms, 2_500);
        assert!(!config.controls.keyboard_shortcuts);
        assert_eq!(config.controls.default_speed, 4);
        assert_eq!(config.controls.tick_interval_ms, 1_000);
        assert_eq!(config.controls.default_run_name, "Bacteria Evolution Simulation");
    }

    #[test]
    fn malformed_yaml_is_an_error() {
        assert!(matches!(
            ControlConfig::parse("engine: [unclosed"),
            Err(ConfigError::Yaml { .. })
        ));
    }

    #[test]
    fn missing_file_loads_defaults() {
        let config =
            ControlConfig::load_or_default(Path::new("/definitely/not/here/petri-config.yaml"))
                .unwrap();
        assert_eq!(config.controls.tick_interval_ms, 1_000);
    }
}

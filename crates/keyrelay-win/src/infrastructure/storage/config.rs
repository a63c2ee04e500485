//! Pipeline settings stored as TOML.
//!
//! `AppConfig` lives in `config.toml` under the platform config directory:
//! - Windows:  `%APPDATA%\KeyRelay\config.toml`
//! - Linux:    `$XDG_CONFIG_HOME/keyrelay/config.toml` (or `~/.config/...`)
//! - macOS:    `~/Library/Application Support/KeyRelay/config.toml`
//!
//! # The file (for beginners)
//!
//! Two tables, both optional. A complete file with every default written out
//! except the log level:
//!
//! ```toml
//! [pipeline]
//! backlog_warning_threshold = 1000
//! legacy_channel = true
//! channel_name = "flutter/keyevent"
//! forge_altgr_control_release = true
//!
//! [logging]
//! level = "debug"
//! ```
//!
//! Missing keys take their built-in values, so an empty file (or no file at
//! all) is the default configuration. Values that parse but make no sense for
//! the pipeline are rejected by [`AppConfig::validate`].

use std::path::{Path, PathBuf};

use keyrelay_core::protocol::DEFAULT_CHANNEL_NAME;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    /// Neither `%APPDATA%`, `$XDG_CONFIG_HOME` nor `$HOME` is set.
    #[error("no platform config directory (APPDATA / XDG_CONFIG_HOME / HOME unset)")]
    NoPlatformConfigDir,

    #[error("cannot access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed config.toml: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("cannot write config.toml: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// The file parsed but a value is out of range.
    #[error("invalid setting `{key}`: {reason}")]
    Invalid { key: &'static str, reason: &'static str },
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level configuration stored on disk.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Keyboard pipeline behaviour.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Pending occurrences (or outstanding redispatches) above which a
    /// warning is logged on every new one.
    #[serde(default = "default_backlog_warning_threshold")]
    pub backlog_warning_threshold: usize,
    /// Also send every key on the legacy JSON channel.
    #[serde(default = "default_true")]
    pub legacy_channel: bool,
    /// Name of the legacy channel.
    #[serde(default = "default_channel_name")]
    pub channel_name: String,
    /// Forge a left-control release when AltGr is released while the host
    /// still reports left control down.
    #[serde(default = "default_true")]
    pub forge_altgr_control_release: bool,
}

/// Diagnostics settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Default `EnvFilter` directive for the replay binary, e.g. `"debug"` or
    /// `"keyrelay_win::application=trace"`. `RUST_LOG` overrides it.
    #[serde(default = "default_log_level")]
    pub level: String,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_backlog_warning_threshold() -> usize {
    1000
}
fn default_true() -> bool {
    true
}
fn default_channel_name() -> String {
    DEFAULT_CHANNEL_NAME.to_string()
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            backlog_warning_threshold: default_backlog_warning_threshold(),
            legacy_channel: default_true(),
            channel_name: default_channel_name(),
            forge_altgr_control_release: default_true(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl AppConfig {
    /// Rejects values the pipeline cannot run with.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Invalid`] naming the first offending key.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pipeline.backlog_warning_threshold == 0 {
            return Err(ConfigError::Invalid {
                key: "pipeline.backlog_warning_threshold",
                reason: "must be at least 1",
            });
        }
        if self.pipeline.legacy_channel && self.pipeline.channel_name.trim().is_empty() {
            return Err(ConfigError::Invalid {
                key: "pipeline.channel_name",
                reason: "must not be empty while the legacy channel is on",
            });
        }
        Ok(())
    }
}

// ── Loading and saving ────────────────────────────────────────────────────────

/// `KeyRelay` directory under the platform config root.
///
/// # Errors
///
/// [`ConfigError::NoPlatformConfigDir`] if the root cannot be found.
pub fn config_dir() -> Result<PathBuf, ConfigError> {
    platform_config_dir().ok_or(ConfigError::NoPlatformConfigDir)
}

/// `<config_dir>/config.toml`.
///
/// # Errors
///
/// As [`config_dir`].
pub fn config_file_path() -> Result<PathBuf, ConfigError> {
    config_dir().map(|dir| dir.join("config.toml"))
}

/// Reads the platform config file. See [`load_config_from`].
///
/// # Errors
///
/// As [`config_file_path`] and [`load_config_from`].
pub fn load_config() -> Result<AppConfig, ConfigError> {
    load_config_from(&config_file_path()?)
}

/// Reads and validates the config at `path`. A missing file yields the
/// defaults.
///
/// # Errors
///
/// [`ConfigError::Io`] for read failures other than not-found,
/// [`ConfigError::Parse`] for bad TOML and [`ConfigError::Invalid`] for
/// out-of-range values.
pub fn load_config_from(path: &Path) -> Result<AppConfig, ConfigError> {
    let config: AppConfig = match std::fs::read_to_string(path) {
        Ok(content) => toml::from_str(&content)?,
        Err(source) if source.kind() == std::io::ErrorKind::NotFound => {
            return Ok(AppConfig::default())
        }
        Err(source) => {
            return Err(ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    config.validate()?;
    Ok(config)
}

/// Writes the platform config file. See [`save_config_to`].
///
/// # Errors
///
/// As [`config_file_path`] and [`save_config_to`].
pub fn save_config(config: &AppConfig) -> Result<(), ConfigError> {
    save_config_to(config, &config_file_path()?)
}

/// Writes `config` to `path`, creating missing parent directories.
///
/// # Errors
///
/// [`ConfigError::Io`] for file-system failures, [`ConfigError::Serialize`]
/// if the config cannot be rendered.
pub fn save_config_to(config: &AppConfig, path: &Path) -> Result<(), ConfigError> {
    let io_error = |at: &Path| {
        let at = at.to_path_buf();
        move |source| ConfigError::Io { path: at, source }
    };
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(io_error(parent))?;
    }
    let rendered = toml::to_string_pretty(config)?;
    std::fs::write(path, rendered).map_err(io_error(path))
}

fn platform_config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA").map(|appdata| PathBuf::from(appdata).join("KeyRelay"))
    }

    #[cfg(target_os = "linux")]
    {
        let xdg = std::env::var_os("XDG_CONFIG_HOME").map(PathBuf::from);
        let home = || std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".config"));
        xdg.or_else(home).map(|root| root.join("keyrelay"))
    }

    #[cfg(target_os = "macos")]
    {
        std::env::var_os("HOME").map(|h| {
            PathBuf::from(h)
                .join("Library")
                .join("Application Support")
                .join("KeyRelay")
        })
    }

    #[cfg(not(any(target_os = "windows", target_os = "linux", target_os = "macos")))]
    {
        None
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("keyrelay_test_{}_{name}", std::process::id()))
            .join("config.toml")
    }

    #[test]
    fn test_pipeline_defaults() {
        // Arrange / Act
        let cfg = PipelineConfig::default();

        // Assert
        assert_eq!(cfg.backlog_warning_threshold, 1000);
        assert!(cfg.legacy_channel);
        assert_eq!(cfg.channel_name, "flutter/keyevent");
        assert!(cfg.forge_altgr_control_release);
    }

    #[test]
    fn test_logging_default_level_is_info() {
        assert_eq!(LoggingConfig::default().level, "info");
    }

    #[test]
    fn test_empty_toml_uses_defaults() {
        let cfg: AppConfig = toml::from_str("").expect("deserialize empty");
        assert_eq!(cfg, AppConfig::default());
    }

    #[test]
    fn test_partial_pipeline_section_overrides_only_given_keys() {
        // Arrange
        let toml_str = r#"
[pipeline]
legacy_channel = false
backlog_warning_threshold = 5
"#;

        // Act
        let cfg: AppConfig = toml::from_str(toml_str).expect("deserialize partial");

        // Assert
        assert!(!cfg.pipeline.legacy_channel);
        assert_eq!(cfg.pipeline.backlog_warning_threshold, 5);
        assert_eq!(cfg.pipeline.channel_name, "flutter/keyevent");
        assert_eq!(cfg.logging.level, "info");
    }

    #[test]
    fn test_invalid_toml_returns_parse_error() {
        // Arrange
        let path = temp_path("invalid");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "[[[ not valid toml").unwrap();

        // Act
        let result = load_config_from(&path);

        // Assert
        assert!(matches!(result, Err(ConfigError::Parse(_))));
        std::fs::remove_dir_all(path.parent().unwrap()).ok();
    }

    #[test]
    fn test_absent_file_loads_as_default() {
        let path = temp_path("absent");
        let cfg = load_config_from(&path).expect("absent file yields defaults");
        assert_eq!(cfg, AppConfig::default());
    }

    #[test]
    fn test_zero_backlog_threshold_is_rejected() {
        // Arrange
        let path = temp_path("zero_backlog");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "[pipeline]\nbacklog_warning_threshold = 0\n").unwrap();

        // Act
        let result = load_config_from(&path);

        // Assert
        assert!(matches!(
            result,
            Err(ConfigError::Invalid { key: "pipeline.backlog_warning_threshold", .. })
        ));
        std::fs::remove_dir_all(path.parent().unwrap()).ok();
    }

    #[test]
    fn test_blank_channel_name_only_matters_with_legacy_channel_on() {
        // Arrange
        let mut cfg = AppConfig::default();
        cfg.pipeline.channel_name = "  ".to_string();

        // Act / Assert
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::Invalid { key: "pipeline.channel_name", .. })
        ));
        cfg.pipeline.legacy_channel = false;
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_saved_config_reloads_identically() {
        // Arrange
        let path = temp_path("round_trip");
        let mut cfg = AppConfig::default();
        cfg.pipeline.channel_name = "custom/keys".to_string();
        cfg.logging.level = "debug".to_string();

        // Act
        save_config_to(&cfg, &path).expect("save");
        let loaded = load_config_from(&path).expect("load");

        // Assert
        assert_eq!(loaded, cfg);

        // Cleanup
        std::fs::remove_dir_all(path.parent().unwrap()).ok();
    }

    #[test]
    fn test_platform_path_is_config_toml_inside_config_dir() {
        // Environments without HOME/APPDATA have no platform path at all.
        let (Ok(dir), Ok(file)) = (config_dir(), config_file_path()) else {
            return;
        };
        assert_eq!(file.parent(), Some(dir.as_path()));
        assert_eq!(file.file_name().and_then(|n| n.to_str()), Some("config.toml"));
    }
}

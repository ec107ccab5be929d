//! Gatehouse configuration file handling.
//!
//! Operator configuration is TOML, stored adjacent to the state snapshot by
//! default. It covers deployment knobs only (admin identity, delays,
//! logging); per-chat runtime state lives in the `StateStore` snapshot.

use crate::bot::{BotSettings, DEFAULT_TAG_PATTERN};
use crate::chat::UserId;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("could not serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("invalid duration for `{field}`: {source}")]
    BadDuration {
        field: &'static str,
        source: humantime::DurationError,
    },

    #[error("invalid tag pattern: {0}")]
    BadPattern(#[from] regex::Error),
}

/// Top-level operator configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatehouseConfig {
    pub bot: BotSection,
    #[serde(default)]
    pub gate: GateSection,
    #[serde(default)]
    pub announce: AnnounceSection,
    #[serde(default)]
    pub storage: StorageSection,
    #[serde(default)]
    pub logging: LoggingSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotSection {
    /// Numeric id of the single administrator account.
    pub admin_id: i64,
    /// Regex for the self-introduction tag.
    #[serde(default = "default_tag_pattern")]
    pub tag_pattern: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateSection {
    /// Idle time before the warning message ("90m", "2h", ...).
    #[serde(default = "default_warn_delay")]
    pub warn_delay: String,
    /// Further idle time before removal.
    #[serde(default = "default_kick_delay")]
    pub kick_delay: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnnounceSection {
    /// Interval between scheduled announcement refreshes.
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval: String,
    /// Delay before the first refresh after `/set`.
    #[serde(default = "default_first_refresh")]
    pub first_refresh: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageSection {
    /// State snapshot path; defaults next to the config file.
    pub state_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSection {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log file path; stderr when unset.
    pub file: Option<PathBuf>,
}

fn default_tag_pattern() -> String {
    DEFAULT_TAG_PATTERN.to_string()
}

fn default_warn_delay() -> String {
    "90m".to_string()
}

fn default_kick_delay() -> String {
    "30m".to_string()
}

fn default_refresh_interval() -> String {
    "1h".to_string()
}

fn default_first_refresh() -> String {
    "1m".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for GateSection {
    fn default() -> Self {
        Self {
            warn_delay: default_warn_delay(),
            kick_delay: default_kick_delay(),
        }
    }
}

impl Default for AnnounceSection {
    fn default() -> Self {
        Self {
            refresh_interval: default_refresh_interval(),
            first_refresh: default_first_refresh(),
        }
    }
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

impl Default for GatehouseConfig {
    fn default() -> Self {
        Self {
            bot: BotSection {
                admin_id: 0,
                tag_pattern: default_tag_pattern(),
            },
            gate: GateSection::default(),
            announce: AnnounceSection::default(),
            storage: StorageSection::default(),
            logging: LoggingSection::default(),
        }
    }
}

fn parse_duration(field: &'static str, value: &str) -> Result<Duration, ConfigError> {
    humantime::parse_duration(value).map_err(|source| ConfigError::BadDuration { field, source })
}

impl GatehouseConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&raw)?)
    }

    /// Write a default config to `path`, creating parent directories.
    pub fn create_default(path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let raw = toml::to_string_pretty(&Self::default())?;
        std::fs::write(path, raw)?;
        Ok(())
    }

    /// Resolve the typed runtime settings out of the string-heavy TOML.
    pub fn settings(&self) -> Result<BotSettings, ConfigError> {
        Ok(BotSettings {
            admin: UserId(self.bot.admin_id),
            tag_pattern: Regex::new(&self.bot.tag_pattern)?,
            warn_delay: parse_duration("gate.warn_delay", &self.gate.warn_delay)?,
            kick_delay: parse_duration("gate.kick_delay", &self.gate.kick_delay)?,
            announce_first: parse_duration("announce.first_refresh", &self.announce.first_refresh)?,
            announce_interval: parse_duration(
                "announce.refresh_interval",
                &self.announce.refresh_interval,
            )?,
            ..BotSettings::default()
        })
    }

    /// State snapshot path: explicit, or `state.json` next to the config.
    pub fn state_path(&self, config_path: &Path) -> PathBuf {
        self.storage.state_path.clone().unwrap_or_else(|| {
            config_path
                .parent()
                .unwrap_or(Path::new("."))
                .join("state.json")
        })
    }
}

/// Default config location: `~/.local/share/gatehouse/config.toml` (or the
/// platform equivalent), falling back to the working directory.
pub fn default_config_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("gatehouse")
        .join("config.toml")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_round_trips() {
        let config = GatehouseConfig::default();
        let raw = toml::to_string_pretty(&config).unwrap();
        let parsed: GatehouseConfig = toml::from_str(&raw).unwrap();
        assert_eq!(parsed.gate.warn_delay, "90m");
        assert_eq!(parsed.logging.level, "info");
    }

    #[test]
    fn settings_parse_durations() {
        let mut config = GatehouseConfig::default();
        config.bot.admin_id = 42;
        config.gate.warn_delay = "2h".to_string();

        let settings = config.settings().unwrap();
        assert_eq!(settings.admin, UserId(42));
        assert_eq!(settings.warn_delay, Duration::from_secs(2 * 60 * 60));
    }

    #[test]
    fn bad_duration_is_rejected_with_field_name() {
        let mut config = GatehouseConfig::default();
        config.gate.kick_delay = "half past three".to_string();

        let err = config.settings().unwrap_err();
        assert!(err.to_string().contains("gate.kick_delay"));
    }

    #[test]
    fn minimal_config_parses_with_defaults() {
        let parsed: GatehouseConfig = toml::from_str("[bot]\nadmin_id = 7\n").unwrap();
        assert_eq!(parsed.bot.admin_id, 7);
        assert_eq!(parsed.announce.refresh_interval, "1h");
    }
}

//! Bot configuration.
//!
//! Secrets come from the environment, everything else from `pritbot.toml`.
//! Every setting in the file has a default, so a missing file is fine.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, CoreError, Result};
use crate::schedule::TimeOfDay;
use crate::summary::{DEFAULT_MARKER, DEFAULT_PREFIX, SummaryFormat};

/// Settings read from `pritbot.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    /// JSON document with per-guild settings.
    pub data_file: PathBuf,
    pub reactions_file: PathBuf,
    pub activities_file: PathBuf,
    /// IANA timezone the daily loops run in.
    pub timezone: String,
    /// Used for guilds that have not set their own announcement time.
    pub announce_time: String,
    /// Used for guilds that have not set their own reminders time.
    pub reminders_time: String,
    /// Seconds between activity changes.
    pub activity_interval_secs: u64,
    pub summary_prefix: String,
    pub summary_marker: String,
    pub services: ServiceConfig,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            data_file: PathBuf::from("data.json"),
            reactions_file: PathBuf::from("reactions.json"),
            activities_file: PathBuf::from("activities.json"),
            timezone: "Europe/Stockholm".to_string(),
            announce_time: "08:00".to_string(),
            reminders_time: "09:00".to_string(),
            activity_interval_secs: 60 * 60,
            summary_prefix: DEFAULT_PREFIX.to_string(),
            summary_marker: DEFAULT_MARKER.to_string(),
            services: ServiceConfig::default(),
        }
    }
}

/// External web services.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Page whose first `<time>` element holds the calendar week.
    pub week_url: String,
    /// Page whose first `<time>` element holds the study week.
    pub study_week_url: String,
    /// TimeSend instance used to share generated calendars.
    pub timesend_url: String,
    /// BookIT GraphQL endpoint. `/events` is disabled without it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bookit_url: Option<String>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            week_url: "https://vecka.nu".to_string(),
            study_week_url: "https://läsvecka.nu".to_string(),
            timesend_url: "https://timesend.olillin.com".to_string(),
            bookit_url: None,
        }
    }
}

fn invalid(path: &Path, field: &str, expected: &str, reason: impl Into<String>) -> CoreError {
    CoreError::ConfigurationError {
        config_path: path.display().to_string(),
        field: field.to_string(),
        expected: expected.to_string(),
        cause: ConfigError::InvalidValue {
            field: field.to_string(),
            reason: reason.into(),
        },
    }
}

impl BotConfig {
    pub fn timezone(&self) -> Result<Tz> {
        Tz::from_str(&self.timezone).map_err(|e| {
            invalid(
                Path::new("pritbot.toml"),
                "timezone",
                "an IANA timezone such as Europe/Stockholm",
                e.to_string(),
            )
        })
    }

    pub fn default_announce_time(&self) -> Result<TimeOfDay> {
        self.announce_time.parse()
    }

    pub fn default_reminders_time(&self) -> Result<TimeOfDay> {
        self.reminders_time.parse()
    }

    pub fn summary_format(&self) -> Result<SummaryFormat> {
        SummaryFormat::new(self.summary_prefix.clone(), &self.summary_marker)
    }

    pub fn activity_interval(&self) -> Duration {
        Duration::from_secs(self.activity_interval_secs.max(1))
    }

    /// Check every derived value so startup fails early on a bad file.
    pub fn validate(&self) -> Result<()> {
        self.timezone()?;
        self.default_announce_time()?;
        self.default_reminders_time()?;
        self.summary_format()?;
        Ok(())
    }

    /// Resolve relative file paths against a base directory.
    fn resolve_paths(&mut self, base_dir: &Path) {
        for path in [
            &mut self.data_file,
            &mut self.reactions_file,
            &mut self.activities_file,
        ] {
            if path.is_relative() {
                *path = base_dir.join(&*path);
            }
        }
    }
}

/// Load configuration from a TOML file.
///
/// Relative file paths in the configuration are resolved against the
/// directory the file is in.
pub async fn load_config(path: &Path) -> Result<BotConfig> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| CoreError::ConfigurationError {
            config_path: path.display().to_string(),
            field: "file".to_string(),
            expected: "readable TOML file".to_string(),
            cause: ConfigError::Io(e.to_string()),
        })?;

    let mut config: BotConfig =
        toml::from_str(&content).map_err(|e| CoreError::ConfigurationError {
            config_path: path.display().to_string(),
            field: "content".to_string(),
            expected: "valid TOML configuration".to_string(),
            cause: ConfigError::TomlParse(e.to_string()),
        })?;

    if let Some(base_dir) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        config.resolve_paths(base_dir);
    }

    config.validate().map_err(|e| match e {
        CoreError::ConfigurationError {
            field,
            expected,
            cause,
            ..
        } => CoreError::ConfigurationError {
            config_path: path.display().to_string(),
            field,
            expected,
            cause,
        },
        other => other,
    })?;

    Ok(config)
}

/// Save configuration to a TOML file.
pub async fn save_config(config: &BotConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| CoreError::ConfigurationError {
                config_path: parent.display().to_string(),
                field: "directory".to_string(),
                expected: "writable directory".to_string(),
                cause: ConfigError::Io(e.to_string()),
            })?;
    }

    let content = toml::to_string_pretty(config).map_err(|e| CoreError::ConfigurationError {
        config_path: path.display().to_string(),
        field: "serialization".to_string(),
        expected: "serializable config structure".to_string(),
        cause: ConfigError::TomlSerialize(e.to_string()),
    })?;

    tokio::fs::write(path, content)
        .await
        .map_err(|e| CoreError::ConfigurationError {
            config_path: path.display().to_string(),
            field: "file".to_string(),
            expected: "writable file location".to_string(),
            cause: ConfigError::Io(e.to_string()),
        })?;

    Ok(())
}

/// Standard configuration file locations, most specific first.
pub fn config_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from("pritbot.toml")];

    if let Some(config_dir) = dirs::config_dir() {
        paths.push(config_dir.join("pritbot").join("config.toml"));
    }

    if let Some(home_dir) = dirs::home_dir() {
        paths.push(home_dir.join(".pritbot").join("config.toml"));
    }

    paths
}

/// Load from the first standard location that exists, or use defaults.
pub async fn load_config_from_standard_locations() -> Result<BotConfig> {
    for path in config_paths() {
        if path.exists() {
            tracing::info!("Loading configuration from {}", path.display());
            return load_config(&path).await;
        }
    }
    tracing::info!("No configuration file found, using defaults");
    Ok(BotConfig::default())
}

/// Secrets and access control read from the environment.
#[derive(Debug, Clone)]
pub struct Secrets {
    pub discord_token: String,
    /// Opaque BookIT session cookie, overriding the one in the data file.
    pub bookit_cookie: Option<String>,
    /// Guilds the bot serves. `None` serves every guild it is in.
    pub allowed_guilds: Option<Vec<u64>>,
}

impl Secrets {
    /// Read secrets from the environment.
    ///
    /// Returns `None` without a bot token.
    ///
    /// # Environment Variables
    ///
    /// - `DISCORD_TOKEN` or `TOKEN` -> discord_token (required)
    /// - `BOOKIT_COOKIE` -> bookit_cookie
    /// - `DISCORD_GUILD_IDS` or `DISCORD_GUILD_ID` (comma-separated) -> allowed_guilds
    pub fn from_env() -> Option<Self> {
        let discord_token = std::env::var("DISCORD_TOKEN")
            .ok()
            .or_else(|| std::env::var("TOKEN").ok())
            .filter(|token| !token.trim().is_empty())?;

        let bookit_cookie = std::env::var("BOOKIT_COOKIE")
            .ok()
            .filter(|cookie| !cookie.is_empty());

        let allowed_guilds = std::env::var("DISCORD_GUILD_IDS")
            .ok()
            .or_else(|| std::env::var("DISCORD_GUILD_ID").ok())
            .map(|s| parse_guild_ids(&s));

        Some(Self {
            discord_token,
            bookit_cookie,
            allowed_guilds,
        })
    }

    pub fn serves(&self, guild_id: u64) -> bool {
        self.allowed_guilds
            .as_ref()
            .is_none_or(|guilds| guilds.contains(&guild_id))
    }
}

fn parse_guild_ids(s: &str) -> Vec<u64> {
    s.split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .filter_map(|id| match id.parse() {
            Ok(id) => Some(id),
            Err(_) => {
                tracing::warn!("Ignoring invalid guild id '{}'", id);
                None
            }
        })
        .collect()
}

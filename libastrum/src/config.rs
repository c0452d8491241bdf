//! Configuration management for Astrumverse
//!
//! Configuration is read from a TOML file. Every section is optional, so a
//! missing file or an empty file yields the defaults below.
//!
//! ```toml
//! [database]
//! path = "~/.local/share/astrumverse/astrum.db"
//!
//! [storage]
//! data_dir = "~/.local/share/astrumverse"
//!
//! [http]
//! timeout_secs = 30
//!
//! [scheduler]
//! daily_time = "23:45"
//! poll_interval = 60
//! batch_limit = 10
//!
//! [endpoints]
//! linkedin = "https://api.linkedin.com"
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{ConfigError, Result};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub storage: StorageConfig,
    pub http: HttpConfig,
    pub scheduler: SchedulerConfig,
    pub endpoints: Endpoints,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: "~/.local/share/astrumverse/astrum.db".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding one `<key>.json` document per storage key
    pub data_dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: "~/.local/share/astrumverse".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self { timeout_secs: 30 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Local wall-clock time of the daily job, `HH:MM`
    pub daily_time: String,
    /// Seconds between task queue polls
    pub poll_interval: u64,
    /// Maximum number of due tasks processed per poll
    pub batch_limit: u32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            daily_time: "23:45".to_string(),
            poll_interval: 60,
            batch_limit: 10,
        }
    }
}

impl SchedulerConfig {
    /// Parse `daily_time` into a `NaiveTime`
    pub fn daily_time(&self) -> Result<chrono::NaiveTime> {
        chrono::NaiveTime::parse_from_str(&self.daily_time, "%H:%M").map_err(|e| {
            ConfigError::InvalidValue {
                field: "scheduler.daily_time".to_string(),
                reason: format!("expected HH:MM ({})", e),
            }
            .into()
        })
    }
}

/// Base URLs of every outbound API
///
/// Only the scheme and host (plus any fixed prefix) live here; request paths
/// are appended by the clients. Tests point these at a mock server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Endpoints {
    pub openai: String,
    pub gemini: String,
    pub hashnode: String,
    pub devto: String,
    pub twitter: String,
    pub linkedin: String,
    pub instagram: String,
    pub youtube: String,
    pub dropbox_api: String,
    pub dropbox_content: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            openai: "https://api.openai.com".to_string(),
            gemini: "https://generativelanguage.googleapis.com".to_string(),
            hashnode: "https://gql.hashnode.com".to_string(),
            devto: "https://dev.to".to_string(),
            twitter: "https://api.twitter.com".to_string(),
            linkedin: "https://api.linkedin.com".to_string(),
            instagram: "https://graph.facebook.com".to_string(),
            youtube: "https://www.googleapis.com".to_string(),
            dropbox_api: "https://api.dropboxapi.com".to_string(),
            dropbox_content: "https://content.dropboxapi.com".to_string(),
        }
    }
}

impl Endpoints {
    /// Point every endpoint at the same base URL
    pub fn all(base_url: &str) -> Self {
        let base = base_url.trim_end_matches('/').to_string();
        Self {
            openai: base.clone(),
            gemini: base.clone(),
            hashnode: base.clone(),
            devto: base.clone(),
            twitter: base.clone(),
            linkedin: base.clone(),
            instagram: base.clone(),
            youtube: base.clone(),
            dropbox_api: base.clone(),
            dropbox_content: base,
        }
    }
}

/// Join a base URL and a path with exactly one slash between them
pub(crate) fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

impl Config {
    /// Load configuration from the default location
    ///
    /// A missing file is not an error; defaults are used instead.
    pub fn load() -> Result<Self> {
        let config_path = resolve_config_path()?;
        if !config_path.exists() {
            tracing::debug!(
                "No config file at {}, using defaults",
                config_path.display()
            );
            return Ok(Self::default().with_env_overrides());
        }
        Ok(Self::load_from_path(&config_path)?.with_env_overrides())
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadError)?;
        let config: Config = toml::from_str(&content).map_err(ConfigError::ParseError)?;
        config.scheduler.daily_time()?;
        Ok(config)
    }

    /// Apply `ASTRUM_DB_PATH` and `ASTRUM_DATA_DIR` overrides
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(path) = std::env::var("ASTRUM_DB_PATH") {
            self.database.path = path;
        }
        if let Ok(dir) = std::env::var("ASTRUM_DATA_DIR") {
            self.storage.data_dir = dir;
        }
        self
    }

    /// Database path with `~` expanded
    pub fn database_path(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.database.path).to_string())
    }

    /// Storage directory with `~` expanded
    pub fn data_dir(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.storage.data_dir).to_string())
    }

    /// Configuration rooted in a single directory (database and documents)
    pub fn rooted_at(dir: &Path) -> Self {
        Self {
            database: DatabaseConfig {
                path: dir.join("astrum.db").to_string_lossy().to_string(),
            },
            storage: StorageConfig {
                data_dir: dir.to_string_lossy().to_string(),
            },
            ..Self::default()
        }
    }
}

/// Resolve the configuration file path following XDG Base Directory spec
pub fn resolve_config_path() -> Result<PathBuf> {
    if let Ok(path) = std::env::var("ASTRUM_CONFIG") {
        return Ok(PathBuf::from(shellexpand::tilde(&path).to_string()));
    }

    let config_dir = dirs::config_dir()
        .ok_or_else(|| ConfigError::MissingField("config directory".to_string()))?;

    Ok(config_dir.join("astrumverse").join("config.toml"))
}

use serde_derive::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use std::{env, fs};

use crate::error::Result;

const ENV_PREFIX: &str = "AUTOMAP_";

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct Settings {
    pub project_name: String,
    pub api_prefix: String,
    pub bind_addr: String,
    pub log_level: String,
    /// TOML file describing the model graph.
    pub models_path: PathBuf,
    /// Bookkeeping table the migration tool records applied migrations in.
    pub migrations_table: String,
    pub database: DatabaseSettings,
    pub internal: InternalSettings,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct DatabaseSettings {
    pub url: String,
    pub max_connections: u32,
    pub acquire_timeout_secs: u64,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct InternalSettings {
    /// Shared secret for the refresh endpoint and the push notification.
    /// Empty disables the endpoint.
    pub refresh_token: String,
    /// Base URL of the query-serving process, used by the notifier.
    pub internal_url: String,
    pub notify_timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            project_name: "schema-automap".into(),
            api_prefix: "/api".into(),
            bind_addr: "0.0.0.0:8001".into(),
            log_level: "info".into(),
            models_path: PathBuf::from("models.toml"),
            migrations_table: "django_migrations".into(),
            database: DatabaseSettings::default(),
            internal: InternalSettings::default(),
        }
    }
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            url: "sqlite://db.sqlite3".into(),
            max_connections: 10,
            acquire_timeout_secs: 30,
        }
    }
}

impl Default for InternalSettings {
    fn default() -> Self {
        Self {
            refresh_token: String::new(),
            internal_url: "http://127.0.0.1:8001".into(),
            notify_timeout_secs: 5,
        }
    }
}

impl DatabaseSettings {
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_secs)
    }
}

impl InternalSettings {
    pub fn notify_timeout(&self) -> Duration {
        Duration::from_secs(self.notify_timeout_secs)
    }
}

impl Settings {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let mut settings: Self = toml::from_str(content)?;
        settings.api_prefix = normalize_api_prefix(&settings.api_prefix);
        Ok(settings)
    }

    /// Reads the optional TOML file, then applies `AUTOMAP_*` environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut settings = match path {
            Some(path) => Self::from_toml_str(&fs::read_to_string(path)?)?,
            None => Self::default(),
        };

        settings.apply_overrides(|key| env::var(format!("{}{}", ENV_PREFIX, key)).ok());

        Ok(settings)
    }

    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(value) = lookup("DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = lookup("REFRESH_TOKEN") {
            self.internal.refresh_token = value;
        }
        if let Some(value) = lookup("INTERNAL_URL") {
            self.internal.internal_url = value;
        }
        if let Some(value) = lookup("LOG_LEVEL") {
            self.log_level = value;
        }
        if let Some(value) = lookup("BIND_ADDR") {
            self.bind_addr = value;
        }
        if let Some(value) = lookup("MODELS_PATH") {
            self.models_path = PathBuf::from(value);
        }
        if let Some(value) = lookup("API_PREFIX") {
            self.api_prefix = normalize_api_prefix(&value);
        }
        if let Some(value) = lookup("MIGRATIONS_TABLE") {
            self.migrations_table = value;
        }
    }
}

/// Mount point for the router: a single leading `/` and no trailing one.
/// `api` and `/api/` both become `/api`. Empty or `/` means no prefix.
pub fn normalize_api_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim().trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{trimmed}")
    }
}

use std::time::Duration;

use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;
use serde_aux::field_attributes::deserialize_number_from_string;
use sqlx::postgres::{PgConnectOptions, PgSslMode};

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub application: ApplicationSettings,
    pub database: DatabaseSettings,
    #[serde(default)]
    pub sync: SyncSettings,
    #[serde(default)]
    pub store: StoreKind,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ApplicationSettings {
    pub host: String,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub port: u16,
    pub signing_key: Secret<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseSettings {
    pub username: String,
    pub password: Secret<String>,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub port: u16,
    pub host: String,
    pub db_name: String,
    #[serde(default)]
    pub require_ssl: bool,
}

impl DatabaseSettings {
    pub fn without_db(&self) -> PgConnectOptions {
        let ssl_mode = if self.require_ssl {
            PgSslMode::Require
        } else {
            PgSslMode::Prefer
        };
        PgConnectOptions::new()
            .host(&self.host)
            .username(&self.username)
            .password(self.password.expose_secret())
            .port(self.port)
            .ssl_mode(ssl_mode)
    }

    pub fn with_db(&self) -> PgConnectOptions {
        self.without_db().database(&self.db_name)
    }
}

/// Client-side autosave timing and the API the editor talks to.
#[derive(Debug, Deserialize, Clone)]
pub struct SyncSettings {
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub typing_debounce_ms: u64,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub structural_debounce_ms: u64,
    pub api_base_url: String,
}

impl SyncSettings {
    pub fn typing_debounce(&self) -> Duration {
        Duration::from_millis(self.typing_debounce_ms)
    }

    pub fn structural_debounce(&self) -> Duration {
        Duration::from_millis(self.structural_debounce_ms)
    }
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            typing_debounce_ms: 800,
            structural_debounce_ms: 200,
            api_base_url: "http://127.0.0.1:8000".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    #[default]
    Postgres,
    Memory,
}

/// Reads `configuration.yaml` from the working directory, then applies
/// `APP_`-prefixed overrides such as `APP_APPLICATION__PORT=8080`.
pub fn get_configuration() -> Result<Settings, config::ConfigError> {
    let mut settings = config::Config::default();
    settings.merge(config::File::with_name("configuration"))?;
    settings.merge(config::Environment::with_prefix("app").separator("__"))?;
    settings.try_into()
}

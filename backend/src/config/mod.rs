use ::config::{Config, ConfigError, Environment, File};
use dotenv::dotenv;
use serde::Deserialize;
use std::fmt;

#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Postgres,
    Memory,
}

#[derive(Clone, Deserialize)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub storage: StorageBackend,
    pub database_url: Option<String>,
    pub pool_size: u32,
    pub jwt_secret: String,
    /// Expected `aud` claim; unchecked when unset.
    pub jwt_audience: Option<String>,
    pub session_cookie: String,
}

// Hand-written so secrets never reach the log.
impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("storage", &self.storage)
            .field("database_url", &self.database_url.as_ref().map(|_| "<redacted>"))
            .field("pool_size", &self.pool_size)
            .field("jwt_secret", &"<redacted>")
            .field("jwt_audience", &self.jwt_audience)
            .field("session_cookie", &self.session_cookie)
            .finish()
    }
}

impl AppConfig {
    /// `.env`, then an optional `crm.toml`, then the process environment.
    pub fn load() -> Result<Self, ConfigError> {
        dotenv().ok();
        Self::from_env(Environment::default().try_parsing(true))
    }

    fn from_env(env: Environment) -> Result<Self, ConfigError> {
        let config: Self = Config::builder()
            .set_default("host", "127.0.0.1")?
            .set_default("port", 8080)?
            .set_default("storage", "postgres")?
            .set_default("pool_size", 10)?
            .set_default("session_cookie", "crm_session")?
            .add_source(File::with_name("crm").required(false))
            .add_source(env)
            .build()?
            .try_deserialize()?;

        if config.storage == StorageBackend::Postgres && config.database_url.is_none() {
            return Err(ConfigError::Message(
                "database_url is required when storage = postgres".to_string(),
            ));
        }
        if config.jwt_secret.is_empty() {
            return Err(ConfigError::Message("jwt_secret must not be empty".to_string()));
        }
        Ok(config)
    }
}

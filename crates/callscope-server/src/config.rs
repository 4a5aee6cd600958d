//! Layered configuration: built-in defaults, then an optional
//! `config/callscope.toml` (or the file named by `CALLSCOPE_CONFIG`), then
//! `CALLSCOPE__*` environment variables.

use std::path::Path;

use callscope_analytics::MetricsJobConfig;
use callscope_auth::{AuthConfig, SmtpConfig};
use callscope_db::DbConfig;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 5000,
        }
    }
}

impl ServerConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DbConfig,
    pub auth: AuthConfig,
    /// Absent means mail is logged instead of sent.
    pub smtp: Option<SmtpConfig>,
    pub metrics_job: MetricsJobConfig,
}

impl AppConfig {
    /// Load configuration. A `.env` file, when present, is read into the
    /// process environment first.
    pub fn load() -> Result<Self, config::ConfigError> {
        let _ = dotenvy::dotenv();
        let path = std::env::var("CALLSCOPE_CONFIG")
            .unwrap_or_else(|_| "config/callscope.toml".to_string());
        Self::from_sources(Some(Path::new(&path)))
    }

    fn from_sources(file: Option<&Path>) -> Result<Self, config::ConfigError> {
        let builder = config::Config::builder();
        let builder = match file {
            Some(path) if path.exists() => builder.add_source(config::File::from(path)),
            _ => builder,
        };

        builder
            .add_source(
                config::Environment::with_prefix("CALLSCOPE")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }
}

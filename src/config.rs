//! Configuration loader and validator for the settlement console.
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Environment variable that overrides `api.base_url`.
pub const API_URL_ENV: &str = "PASSIIFY_API_URL";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(&'static str),
}

/// Root configuration struct mirroring the YAML schema exactly.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    pub app: App,
    pub api: Api,
    #[serde(default)]
    pub settlement: Settlement,
}

/// App-level settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct App {
    pub data_dir: String,
}

/// Backend location and HTTP client settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Api {
    /// Explicit backend base. Empty means "pick from `hostname`".
    #[serde(default)]
    pub base_url: String,
    pub hostname: String,
    pub local_base_url: String,
    pub production_base_url: String,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

/// Settlement table settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Settlement {
    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

impl Default for Settlement {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
        }
    }
}

fn default_timeout_seconds() -> u64 {
    30
}

fn default_page_size() -> usize {
    crate::settlement::DEFAULT_PAGE_SIZE
}

impl Config {
    /// Ensure required directories exist (creates `app.data_dir` if missing).
    pub fn ensure_dirs(&self) -> Result<(), std::io::Error> {
        if self.app.data_dir.trim().is_empty() {
            return Ok(());
        }
        fs::create_dir_all(&self.app.data_dir)
    }

    /// Explicit base URL, preferring the environment over the file.
    pub fn explicit_base_url(&self) -> Option<String> {
        std::env::var(API_URL_ENV)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .or_else(|| Some(self.api.base_url.clone()).filter(|v| !v.trim().is_empty()))
    }

    /// SQLite URL of the credential database inside `app.data_dir`.
    pub fn credentials_database_url(&self) -> String {
        std::env::var("DATABASE_URL").unwrap_or_else(|_| {
            format!(
                "sqlite://{}/credentials.db",
                self.app.data_dir.trim_end_matches('/')
            )
        })
    }
}

/// Load configuration from a YAML file and validate it.
/// - If `path` is None, uses `config.yaml` in the current working directory.
pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = path.unwrap_or_else(|| Path::new("config.yaml"));
    let content = fs::read_to_string(path)?;
    let cfg: Config = serde_yaml::from_str(&content)?;
    validate(&cfg)?;
    Ok(cfg)
}

/// Validate a configuration instance.
fn validate(cfg: &Config) -> Result<(), ConfigError> {
    if cfg.app.data_dir.trim().is_empty() {
        return Err(ConfigError::Invalid("app.data_dir must be non-empty"));
    }

    if cfg.api.hostname.trim().is_empty() {
        return Err(ConfigError::Invalid("api.hostname must be non-empty"));
    }
    if cfg.api.local_base_url.trim().is_empty() {
        return Err(ConfigError::Invalid("api.local_base_url must be non-empty"));
    }
    if cfg.api.production_base_url.trim().is_empty() {
        return Err(ConfigError::Invalid(
            "api.production_base_url must be non-empty",
        ));
    }
    if cfg.api.timeout_seconds == 0 {
        return Err(ConfigError::Invalid("api.timeout_seconds must be > 0"));
    }

    if cfg.settlement.page_size == 0 {
        return Err(ConfigError::Invalid("settlement.page_size must be > 0"));
    }

    Ok(())
}

/// Returns the example YAML shipped with the console.
pub fn example() -> &'static str {
    r#"app:
  data_dir: "./data"

api:
  base_url: ""
  hostname: "localhost"
  local_base_url: "http://localhost:5000/api"
  production_base_url: "https://passiify-backend.onrender.com/api"
  timeout_seconds: 30

settlement:
  page_size: 15
"#
}

//! # tm-config
//!
//! Layered settings for the TrailMate binary: built-in defaults, then an
//! optional `trailmate.toml`, then `TRAILMATE__SECTION__KEY` environment
//! variables. A `.env` file is read into the environment first.

use std::path::{Path, PathBuf};

use config::{Config, Environment, File};
use secrecy::SecretString;
use serde::Deserialize;
use tm_core::models::{GeoPoint, PermissionStatus};
use tm_core::validation::MIN_PASSWORD_LEN;
use tracing::debug;

pub const DEFAULT_FILE: &str = "trailmate.toml";
pub const ENV_PREFIX: &str = "TRAILMATE";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not load configuration: {0}")]
    Load(#[from] config::ConfigError),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct MediaConfig {
    pub root: PathBuf,
    pub url_prefix: String,
}

/// Answers given by the simulated device.
#[derive(Debug, Clone, Deserialize)]
pub struct DeviceConfig {
    pub latitude: f64,
    pub longitude: f64,
    pub location_permission: PermissionStatus,
    pub media_permission: PermissionStatus,
}

impl DeviceConfig {
    pub fn position(&self) -> GeoPoint {
        GeoPoint::new(self.latitude, self.longitude)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    /// `EnvFilter` directive; `RUST_LOG` wins when set.
    pub filter: String,
    pub json: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    pub min_password_len: usize,
    #[serde(default)]
    pub pepper: Option<SecretString>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub media: MediaConfig,
    pub device: DeviceConfig,
    pub log: LogConfig,
    pub auth: AuthConfig,
}

impl AppConfig {
    /// Reads `.env`, `trailmate.toml` (if present) and the process environment.
    pub fn load() -> Result<Self, ConfigError> {
        if let Ok(path) = dotenvy::dotenv() {
            debug!(path = %path.display(), "loaded .env");
        }
        Self::from_layers(Some(Path::new(DEFAULT_FILE)), None)
    }

    /// `env` replaces the process environment when given.
    pub fn from_layers(
        file: Option<&Path>,
        env: Option<config::Map<String, String>>,
    ) -> Result<Self, ConfigError> {
        let mut builder = Config::builder()
            .set_default("media.root", "./data/media")?
            .set_default("media.url_prefix", "/media")?
            .set_default("device.latitude", 49.7312)?
            .set_default("device.longitude", -123.1552)?
            .set_default("device.location_permission", "granted")?
            .set_default("device.media_permission", "granted")?
            .set_default("log.filter", "info")?
            .set_default("log.json", false)?
            .set_default("auth.min_password_len", MIN_PASSWORD_LEN as i64)?;

        if let Some(file) = file {
            builder = builder.add_source(File::from(file).required(false));
        }
        let cfg: AppConfig = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true)
                    .source(env),
            )
            .build()?
            .try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.auth.min_password_len < MIN_PASSWORD_LEN {
            return Err(ConfigError::Invalid(format!(
                "auth.min_password_len must be at least {MIN_PASSWORD_LEN}"
            )));
        }
        if !self.device.position().is_valid() {
            return Err(ConfigError::Invalid(format!(
                "device position {} is out of range",
                self.device.position()
            )));
        }
        if self.media.url_prefix.is_empty() {
            return Err(ConfigError::Invalid("media.url_prefix is empty".into()));
        }
        Ok(())
    }
}

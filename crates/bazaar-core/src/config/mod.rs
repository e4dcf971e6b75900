//! Application configuration schemas.
//!
//! All configuration structs are deserialized from TOML files via the
//! `config` crate. Each sub-module represents a logical configuration
//! section, and every field carries a default so an empty file is valid.

pub mod backend;
pub mod cache;
pub mod currency;
pub mod logging;
pub mod notifications;
pub mod session;

use serde::{Deserialize, Serialize};

pub use self::backend::BackendConfig;
pub use self::cache::CacheConfig;
pub use self::currency::CurrencyConfig;
pub use self::logging::LoggingConfig;
pub use self::notifications::{NotificationsConfig, ReconnectConfig};
pub use self::session::SessionConfig;

use crate::error::AppError;

/// Environment variable prefix for overrides, e.g. `BAZAAR__CURRENCY__TARGET`.
const ENV_PREFIX: &str = "BAZAAR";

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Managed backend settings.
    #[serde(default)]
    pub backend: BackendConfig,
    /// Persisted cache provider settings.
    #[serde(default)]
    pub cache: CacheConfig,
    /// Currency conversion settings.
    #[serde(default)]
    pub currency: CurrencyConfig,
    /// Notification sync settings.
    #[serde(default)]
    pub notifications: NotificationsConfig,
    /// Signed-in session settings.
    #[serde(default)]
    pub session: SessionConfig,
}

impl AppConfig {
    /// Load configuration from a single TOML file plus `BAZAAR__*`
    /// environment variables. A missing file yields the defaults.
    pub fn load(path: &str) -> Result<Self, AppError> {
        Self::build(&[path])
    }

    /// Load the base file, then an environment overlay `config/{env}`,
    /// then environment variables.
    pub fn load_layered(path: &str, env: &str) -> Result<Self, AppError> {
        let overlay = format!("config/{env}");
        Self::build(&[path, &overlay])
    }

    fn build(files: &[&str]) -> Result<Self, AppError> {
        let mut builder = config::Config::builder();
        for file in files {
            builder = builder.add_source(config::File::with_name(file).required(false));
        }

        let config = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| AppError::configuration(format!("Failed to build config: {e}")))?;

        config
            .try_deserialize()
            .map_err(|e| AppError::configuration(format!("Failed to deserialize config: {e}")))
    }
}

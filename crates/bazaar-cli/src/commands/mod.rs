//! CLI command definitions and dispatch.

pub mod config;
pub mod notifications;
pub mod rate;

use clap::{Parser, Subcommand};

use bazaar_cache::CacheManager;
use bazaar_core::config::AppConfig;
use bazaar_core::error::AppError;

use crate::output::OutputFormat;

/// Bazaar: exchange rates and notifications from the command line
#[derive(Debug, Parser)]
#[command(name = "bazaar", version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/default.toml")]
    pub config: String,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub format: OutputFormat,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Exchange rate lookup and conversion
    Rate(rate::RateArgs),
    /// Notification center
    Notifications(notifications::NotificationArgs),
    /// Configuration inspection
    Config(config::ConfigArgs),
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(&self) -> Result<(), AppError> {
        match &self.command {
            Commands::Rate(args) => rate::execute(args, &self.config, self.format).await,
            Commands::Notifications(args) => {
                notifications::execute(args, &self.config, self.format).await
            }
            Commands::Config(args) => config::execute(args, &self.config, self.format).await,
        }
    }
}

/// Helper: load configuration from file and `BAZAAR__*` variables
pub fn load_config(config_path: &str) -> Result<AppConfig, AppError> {
    AppConfig::load(config_path)
}

/// Helper: open the configured persisted cache
pub async fn open_cache(config: &AppConfig) -> Result<CacheManager, AppError> {
    CacheManager::new(&config.cache).await
}

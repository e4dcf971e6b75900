//! Configuration inspection CLI commands.

use clap::{Args, Subcommand};

use crate::output::{self, OutputFormat};
use bazaar_core::error::AppError;

/// Arguments for config commands
#[derive(Debug, Args)]
pub struct ConfigArgs {
    /// Config subcommand
    #[command(subcommand)]
    pub command: ConfigCommand,
}

/// Config subcommands
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show the effective configuration (secrets masked)
    Show,
}

/// Execute config commands
pub async fn execute(
    args: &ConfigArgs,
    config_path: &str,
    format: OutputFormat,
) -> Result<(), AppError> {
    match &args.command {
        ConfigCommand::Show => {
            let mut config = super::load_config(config_path)?;
            config.backend.api_key = mask_secret(&config.backend.api_key);
            config.backend.access_token = config.backend.access_token.as_deref().map(mask_secret);

            match format {
                OutputFormat::Json => output::print_json(&config),
                OutputFormat::Table => {
                    println!("Configuration '{config_path}'");
                    output::print_kv(
                        "logging",
                        &format!("{} ({})", config.logging.level, config.logging.format),
                    );
                    output::print_kv("backend.rest_url", &config.backend.rest_url);
                    output::print_kv("backend.realtime_url", &config.backend.realtime_url);
                    output::print_kv("backend.api_key", &config.backend.api_key);
                    output::print_kv("cache.provider", &config.cache.provider);
                    output::print_kv("currency.pair", &config.currency.pair());
                    output::print_kv("currency.provider_url", &config.currency.provider_url);
                    output::print_kv(
                        "currency.fresh_for",
                        &format!("{}s", config.currency.fresh_for_seconds),
                    );
                    output::print_kv(
                        "notifications.reconcile",
                        &format!("{}s", config.notifications.reconcile_interval_seconds),
                    );
                    output::print_kv(
                        "session.user_id",
                        &config
                            .session
                            .user_id
                            .map(|id| id.to_string())
                            .unwrap_or_else(|| "-".to_string()),
                    );
                }
            }
        }
    }

    Ok(())
}

/// Keep the first four characters of a secret
fn mask_secret(secret: &str) -> String {
    if secret.is_empty() {
        return String::new();
    }
    let visible: String = secret.chars().take(4).collect();
    format!("{visible}****")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_secret() {
        assert_eq!(mask_secret(""), "");
        assert_eq!(mask_secret("eyJhbGciOi"), "eyJh****");
        assert_eq!(mask_secret("ab"), "ab****");
    }
}

//! Exchange rate CLI commands.

use std::sync::Arc;

use clap::{Args, Subcommand};
use serde::Serialize;
use tabled::Tabled;

use bazaar_core::config::AppConfig;
use bazaar_core::error::AppError;
use bazaar_core::traits::clock::SystemClock;
use bazaar_currency::{HttpRateProvider, RateCache, RateSnapshot};

use crate::output::{self, OutputFormat};

/// Arguments for rate commands
#[derive(Debug, Args)]
pub struct RateArgs {
    /// Rate subcommand
    #[command(subcommand)]
    pub command: RateCommand,
}

/// Rate subcommands
#[derive(Debug, Subcommand)]
pub enum RateCommand {
    /// Show the current rate, fetching it if the cached one is stale
    Show,
    /// Convert an amount from the base to the target currency
    Convert {
        /// Amount in the base currency
        amount: f64,
    },
    /// Drop the cached rate so the next lookup fetches a new one
    Invalidate,
}

/// Rate display row for table output
#[derive(Debug, Serialize, Tabled)]
struct RateRow {
    /// Currency pair
    pair: String,
    /// Conversion factor
    rate: String,
    /// When the rate was fetched
    fetched_at: String,
    /// Last fetch error, if any
    error: String,
}

impl RateRow {
    fn new(pair: String, snapshot: &RateSnapshot) -> Self {
        Self {
            pair,
            rate: snapshot
                .rate
                .map(|r| format!("{r:.4}"))
                .unwrap_or_else(|| "-".to_string()),
            fetched_at: snapshot
                .fetched_at
                .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
                .unwrap_or_else(|| "-".to_string()),
            error: snapshot.error.clone().unwrap_or_default(),
        }
    }
}

/// Conversion display row
#[derive(Debug, Serialize, Tabled)]
struct ConversionRow {
    /// Source amount
    amount: String,
    /// Converted amount
    converted: String,
    /// Rate used
    rate: String,
}

/// Execute rate commands
pub async fn execute(
    args: &RateArgs,
    config_path: &str,
    format: OutputFormat,
) -> Result<(), AppError> {
    let config = super::load_config(config_path)?;
    let cache = open_rate_cache(&config).await?;
    let currency = &config.currency;

    match &args.command {
        RateCommand::Show => {
            let snapshot = cache.refresh().await;
            if let Some(error) = &snapshot.error {
                output::print_warning(&format!("Rate refresh failed: {error}"));
            }
            output::print_record(&RateRow::new(currency.pair(), &snapshot), format);
        }
        RateCommand::Convert { amount } => {
            let snapshot = cache.refresh().await;
            let converted = snapshot.convert(*amount).ok_or_else(|| {
                AppError::service_unavailable(format!(
                    "No {} rate available: {}",
                    currency.pair(),
                    snapshot.error.as_deref().unwrap_or("rate not loaded")
                ))
            })?;

            let row = ConversionRow {
                amount: format!("{amount:.2} {}", currency.base),
                converted: format!("{converted:.2} {}", currency.target),
                rate: snapshot.rate.map(|r| format!("{r:.4}")).unwrap_or_default(),
            };
            output::print_record(&row, format);
        }
        RateCommand::Invalidate => {
            cache.purge().await;
            output::print_success(&format!("Cached {} rate dropped", currency.pair()));
        }
    }

    Ok(())
}

async fn open_rate_cache(config: &AppConfig) -> Result<Arc<RateCache>, AppError> {
    let store = super::open_cache(config).await?;
    let provider = HttpRateProvider::new(&config.currency)?;
    Ok(RateCache::open(
        &config.currency,
        Arc::new(provider),
        store.shared(),
        Arc::new(SystemClock),
    )
    .await)
}

//! Bazaar Sync agent
//!
//! Keeps the shared exchange rate warm and the signed-in user's
//! notifications live, logging rate changes and alerts until shutdown.

use std::sync::Arc;

use tracing_subscriber::{EnvFilter, fmt};

use bazaar_cache::CacheManager;
use bazaar_core::config::AppConfig;
use bazaar_core::error::AppError;
use bazaar_core::traits::clock::SystemClock;
use bazaar_core::types::id::UserId;
use bazaar_currency::{HttpRateProvider, RateCache};
use bazaar_realtime::NotificationStore;
use bazaar_realtime::backend::RestNotificationBackend;

#[tokio::main]
async fn main() {
    let config = match load_configuration() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    init_logging(&config);

    if let Err(e) = run(config).await {
        tracing::error!("Sync agent error: {}", e);
        std::process::exit(1);
    }
}

/// Load configuration from file, environment overlay and variables
fn load_configuration() -> Result<AppConfig, AppError> {
    let config_path =
        std::env::var("BAZAAR_CONFIG").unwrap_or_else(|_| "config/default.toml".to_string());
    let env = std::env::var("BAZAAR_ENV").unwrap_or_else(|_| "development".to_string());

    AppConfig::load_layered(&config_path, &env)
}

/// Initialize tracing/logging
fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format.as_str() {
        "json" => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .init();
        }
        _ => {
            fmt()
                .pretty()
                .with_env_filter(filter)
                .with_target(true)
                .init();
        }
    }
}

/// Main agent run function
async fn run(config: AppConfig) -> Result<(), AppError> {
    tracing::info!("Starting Bazaar Sync v{}", env!("CARGO_PKG_VERSION"));

    // ── Step 1: Persisted cache ──────────────────────────────────
    tracing::info!(
        "Initializing cache (provider: {})...",
        config.cache.provider
    );
    let cache = CacheManager::new(&config.cache).await?;
    tracing::info!(provider = cache.kind(), "Cache initialized");

    // ── Step 2: Exchange rate cache ──────────────────────────────
    let provider = HttpRateProvider::new(&config.currency)?;
    let rates = RateCache::open(
        &config.currency,
        Arc::new(provider),
        cache.shared(),
        Arc::new(SystemClock),
    )
    .await;
    let warm = rates.refresh().await;
    match (&warm.rate, &warm.error) {
        (Some(rate), None) => {
            tracing::info!(pair = %config.currency.pair(), rate, "Exchange rate ready");
        }
        (rate, Some(error)) => tracing::warn!(
            pair = %config.currency.pair(),
            fallback = ?rate,
            error = %error,
            "Exchange rate unavailable, serving fallback"
        ),
        (None, None) => {
            tracing::warn!(pair = %config.currency.pair(), "No exchange rate loaded");
        }
    }

    // ── Step 3: Notification store ───────────────────────────────
    let store = match config.session.user_id {
        Some(user) => {
            let backend = Arc::new(RestNotificationBackend::new(&config.backend)?);
            let store = NotificationStore::new(backend, config.notifications.clone());
            store.bind_user(Some(UserId::from_uuid(user)));
            Some(store)
        }
        None => {
            tracing::info!("No session.user_id configured, notification sync disabled");
            None
        }
    };

    // ── Step 4: Observers ────────────────────────────────────────
    let mut observers = Vec::new();
    observers.push(tokio::spawn(log_rate_changes(Arc::clone(&rates))));
    if let Some(store) = &store {
        observers.push(tokio::spawn(log_alerts(Arc::clone(store))));
        observers.push(tokio::spawn(log_sync_state(Arc::clone(store))));
    }

    tracing::info!("Bazaar Sync running, press Ctrl+C to stop");

    // ── Step 5: Graceful shutdown ────────────────────────────────
    shutdown_signal().await;
    tracing::info!("Shutdown signal received, stopping...");

    if let Some(store) = &store {
        store.shutdown();
    }
    for observer in observers {
        observer.abort();
    }

    tracing::info!("Bazaar Sync stopped");
    Ok(())
}

/// Log every settled rate change and keep the rate fresh on demand
async fn log_rate_changes(rates: Arc<RateCache>) {
    let mut rx = rates.subscribe();
    let mut ticker = tokio::time::interval(std::time::Duration::from_secs(60));

    loop {
        tokio::select! {
            changed = rx.changed() => {
                if changed.is_err() {
                    return;
                }
                let snapshot = rx.borrow_and_update().clone();
                if snapshot.is_loading {
                    continue;
                }
                match &snapshot.error {
                    Some(error) => tracing::warn!(
                        rate = ?snapshot.rate,
                        error = %error,
                        "Exchange rate refresh failed"
                    ),
                    None => tracing::info!(rate = ?snapshot.rate, "Exchange rate updated"),
                }
            }
            _ = ticker.tick() => {
                rates.get_rate();
            }
        }
    }
}

/// Log alerts for newly arrived notifications
async fn log_alerts(store: Arc<NotificationStore>) {
    let mut alerts = store.alerts();
    loop {
        match alerts.recv().await {
            Ok(alert) => tracing::info!(
                id = %alert.id,
                kind = %alert.kind,
                title = %alert.title,
                link = ?alert.link,
                "New notification: {}",
                alert.message
            ),
            Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "Alert log fell behind");
            }
            Err(tokio::sync::broadcast::error::RecvError::Closed) => return,
        }
    }
}

/// Log sync state transitions with the unread count
async fn log_sync_state(store: Arc<NotificationStore>) {
    let mut rx = store.subscribe();
    let mut last = rx.borrow().state.clone();
    while rx.changed().await.is_ok() {
        let snapshot = rx.borrow_and_update().clone();
        if snapshot.state != last {
            tracing::info!(
                state = %snapshot.state,
                items = snapshot.items.len(),
                unread = snapshot.unread_count,
                "Notification sync state changed"
            );
            last = snapshot.state;
        }
    }
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

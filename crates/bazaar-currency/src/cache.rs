//! The shared exchange rate cache.
//!
//! One [`RateCache`] is created per process and handed out as an
//! `Arc`. Only its own fetch routine writes rate state; everybody else
//! reads a [`RateSnapshot`] or subscribes to changes.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use bazaar_cache::keys;
use bazaar_core::config::currency::CurrencyConfig;
use bazaar_core::traits::cache::CacheProvider;
use bazaar_core::traits::clock::Clock;
use bazaar_entity::currency::ExchangeRate;

use crate::provider::RateProvider;
use crate::snapshot::RateSnapshot;

/// Fetch bookkeeping, guarded by one lock so that "serve cached" and
/// "start a fetch" can never both happen for the same demand.
#[derive(Debug, Default)]
struct FetchState {
    /// Last rate adopted (fresh cache hit or successful fetch).
    current: Option<ExchangeRate>,
    /// A provider request is running.
    in_flight: bool,
    /// The last fetch failed. Cleared by a success or `invalidate`.
    failed: bool,
    /// `invalidate` was called since the last successful fetch.
    invalidated: bool,
}

/// Process-wide, single-flight exchange rate cache.
#[derive(Debug)]
pub struct RateCache {
    provider: Arc<dyn RateProvider>,
    store: Arc<dyn CacheProvider>,
    clock: Arc<dyn Clock>,
    key: String,
    fresh_for: chrono::Duration,
    persist_ttl: Duration,
    state: Mutex<FetchState>,
    tx: watch::Sender<RateSnapshot>,
}

impl RateCache {
    /// Create the cache and hydrate it from the persisted entry.
    ///
    /// A fresh persisted rate is adopted immediately, so the first
    /// `get_rate` makes no network call. Stale entries are kept on disk
    /// as a fallback only.
    pub async fn open(
        config: &CurrencyConfig,
        provider: Arc<dyn RateProvider>,
        store: Arc<dyn CacheProvider>,
        clock: Arc<dyn Clock>,
    ) -> Arc<Self> {
        let key = keys::exchange_rate(&config.base, &config.target);
        let fresh_for = freshness_window(config.fresh_for_seconds);

        let persisted = read_persisted(store.as_ref(), &key).await;
        let now = clock.now();
        let current = persisted.filter(|rate| rate.is_fresh(now, fresh_for));

        let initial = match current {
            Some(rate) => {
                info!(pair = %config.pair(), rate = rate.rate, "Adopted fresh cached exchange rate");
                RateSnapshot::ready(rate)
            }
            None => RateSnapshot::default(),
        };
        let (tx, _) = watch::channel(initial);

        Arc::new(Self {
            provider,
            store,
            clock,
            key,
            fresh_for,
            persist_ttl: Duration::from_secs(config.persist_ttl_seconds),
            state: Mutex::new(FetchState {
                current,
                ..Default::default()
            }),
            tx,
        })
    }

    /// Current state, starting a background refresh when needed.
    ///
    /// A refresh starts only if no fetch is in flight, the served rate is
    /// not fresh, and the previous fetch did not fail. Must be called from
    /// within a Tokio runtime.
    pub fn get_rate(self: &Arc<Self>) -> RateSnapshot {
        let mut state = self.lock_state();
        let now = self.clock.now();
        let fresh = !state.invalidated
            && state
                .current
                .is_some_and(|rate| rate.is_fresh(now, self.fresh_for));

        if !fresh && !state.in_flight && !state.failed {
            state.in_flight = true;
            self.tx.send_modify(|snapshot| snapshot.is_loading = true);

            let this = Arc::clone(self);
            tokio::spawn(async move { this.run_fetch().await });
        }
        drop(state);

        self.snapshot()
    }

    /// Current state without side effects.
    pub fn snapshot(&self) -> RateSnapshot {
        self.tx.borrow().clone()
    }

    /// Convert with the currently served rate; `None` if there is none yet.
    pub fn convert(&self, amount: f64) -> Option<f64> {
        self.tx.borrow().convert(amount)
    }

    /// Receive every state change. Subscribing never triggers a fetch.
    pub fn subscribe(&self) -> watch::Receiver<RateSnapshot> {
        self.tx.subscribe()
    }

    /// Trigger (or join) the in-flight fetch and wait for it to settle.
    pub async fn refresh(self: &Arc<Self>) -> RateSnapshot {
        let mut rx = self.subscribe();
        let snapshot = self.get_rate();
        if !snapshot.is_loading {
            return snapshot;
        }

        match rx.wait_for(|snapshot| !snapshot.is_loading).await {
            Ok(settled) => settled.clone(),
            Err(_) => self.snapshot(),
        }
    }

    /// Mark the served rate stale and allow a fetch after a failure.
    ///
    /// The persisted entry is kept so it can still serve as a fallback.
    pub fn invalidate(&self) {
        let mut state = self.lock_state();
        state.invalidated = true;
        state.failed = false;
        debug!(key = %self.key, "Exchange rate invalidated");
    }

    /// Invalidate and also drop the persisted entry.
    pub async fn purge(&self) {
        self.invalidate();
        if let Err(e) = self.store.delete(&self.key).await {
            warn!(key = %self.key, error = %e, "Failed to delete persisted exchange rate");
        }
    }

    /// The persisted entry, ignoring freshness. Malformed entries read as `None`.
    pub async fn persisted(&self) -> Option<ExchangeRate> {
        read_persisted(self.store.as_ref(), &self.key).await
    }

    async fn run_fetch(self: Arc<Self>) {
        let outcome = self.provider.fetch_rate().await;

        match outcome {
            Ok(rate) => {
                let entry = ExchangeRate::new(rate, self.clock.now());
                self.persist(&entry).await;

                let mut state = self.lock_state();
                state.current = Some(entry);
                state.in_flight = false;
                state.failed = false;
                state.invalidated = false;
                self.tx.send_replace(RateSnapshot::ready(entry));
                drop(state);

                info!(key = %self.key, rate, "Exchange rate refreshed");
            }
            Err(e) => {
                let persisted = self.persisted().await;

                let mut state = self.lock_state();
                let fallback = persisted.or(state.current);
                state.in_flight = false;
                state.failed = true;
                self.tx
                    .send_replace(RateSnapshot::degraded(fallback, e.message.clone()));
                drop(state);

                warn!(
                    key = %self.key,
                    error = %e,
                    fallback = fallback.map(|r| r.rate),
                    "Exchange rate fetch failed"
                );
            }
        }
    }

    async fn persist(&self, entry: &ExchangeRate) {
        let json = match serde_json::to_string(entry) {
            Ok(json) => json,
            Err(e) => {
                warn!(error = %e, "Failed to serialize exchange rate");
                return;
            }
        };

        if let Err(e) = self.store.set(&self.key, &json, self.persist_ttl).await {
            warn!(key = %self.key, error = %e, "Failed to persist exchange rate");
        }
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, FetchState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Freshness window for a configured number of seconds.
///
/// Values beyond what `chrono` can represent saturate to the largest window.
fn freshness_window(seconds: u64) -> chrono::Duration {
    i64::try_from(seconds)
        .ok()
        .and_then(chrono::Duration::try_seconds)
        .unwrap_or(chrono::Duration::MAX)
}

/// Read the persisted entry, treating anything unreadable as a miss.
async fn read_persisted(store: &dyn CacheProvider, key: &str) -> Option<ExchangeRate> {
    let raw = match store.get(key).await {
        Ok(raw) => raw?,
        Err(e) => {
            warn!(key, error = %e, "Failed to read persisted exchange rate");
            return None;
        }
    };

    match serde_json::from_str::<ExchangeRate>(&raw) {
        Ok(rate) if rate.is_valid() => Some(rate),
        Ok(_) => {
            debug!(key, "Discarding persisted exchange rate with unusable value");
            None
        }
        Err(e) => {
            debug!(key, error = %e, "Discarding malformed persisted exchange rate");
            None
        }
    }
}

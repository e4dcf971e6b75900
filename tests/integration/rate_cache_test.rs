//! Integration tests for the shared exchange rate cache.

mod helpers;

use std::sync::Arc;
use std::time::Duration;

use bazaar_cache::file::FileCacheProvider;
use bazaar_cache::keys;
use bazaar_cache::memory::MemoryCacheProvider;
use bazaar_core::config::cache::{FileCacheConfig, MemoryCacheConfig};
use bazaar_core::config::currency::CurrencyConfig;
use bazaar_core::traits::cache::CacheProvider;
use bazaar_currency::RateCache;
use bazaar_entity::currency::ExchangeRate;

use helpers::{ManualClock, ScriptedProvider, reference_time};

fn memory_store() -> Arc<MemoryCacheProvider> {
    Arc::new(MemoryCacheProvider::new(&MemoryCacheConfig::default()))
}

fn rate_key() -> String {
    let config = CurrencyConfig::default();
    keys::exchange_rate(&config.base, &config.target)
}

async fn seed_rate(store: &dyn CacheProvider, rate: f64, age: chrono::Duration) {
    let entry = ExchangeRate::new(rate, reference_time() - age);
    store
        .set(
            &rate_key(),
            &serde_json::to_string(&entry).unwrap(),
            Duration::from_secs(86_400 * 30),
        )
        .await
        .unwrap();
}

async fn open(
    provider: &Arc<ScriptedProvider>,
    store: Arc<dyn CacheProvider>,
    clock: &Arc<ManualClock>,
) -> Arc<RateCache> {
    RateCache::open(
        &CurrencyConfig::default(),
        provider.clone(),
        store,
        clock.clone(),
    )
    .await
}

fn assert_close(actual: Option<f64>, expected: f64) {
    let actual = actual.expect("expected a converted amount");
    assert!(
        (actual - expected).abs() < 1e-9,
        "expected {expected}, got {actual}"
    );
}

#[tokio::test]
async fn test_concurrent_demand_makes_one_request() {
    let provider =
        Arc::new(ScriptedProvider::returning(5.1).with_latency(Duration::from_millis(50)));
    let clock = Arc::new(ManualClock::at(reference_time()));
    let cache = open(&provider, memory_store(), &clock).await;

    let callers: Vec<_> = (0..10)
        .map(|_| {
            let cache = Arc::clone(&cache);
            tokio::spawn(async move { cache.get_rate() })
        })
        .collect();
    for caller in callers {
        assert!(caller.await.unwrap().is_loading);
    }

    let settled = cache.refresh().await;
    assert_eq!(settled.rate, Some(5.1));
    assert_eq!(provider.calls(), 1);
}

#[tokio::test]
async fn test_rate_59_minutes_old_is_served_without_request() {
    let provider = Arc::new(ScriptedProvider::returning(5.3));
    let clock = Arc::new(ManualClock::at(reference_time()));
    let store = memory_store();
    seed_rate(store.as_ref(), 5.0, chrono::Duration::minutes(59)).await;

    let cache = open(&provider, store, &clock).await;
    let snapshot = cache.get_rate();

    assert!(!snapshot.is_loading);
    assert_eq!(snapshot.rate, Some(5.0));
    assert_eq!(provider.calls(), 0);
}

#[tokio::test]
async fn test_rate_61_minutes_old_is_refetched() {
    let provider = Arc::new(ScriptedProvider::returning(5.3));
    let clock = Arc::new(ManualClock::at(reference_time()));
    let store = memory_store();
    seed_rate(store.as_ref(), 5.0, chrono::Duration::minutes(61)).await;

    let cache = open(&provider, store, &clock).await;
    assert!(cache.get_rate().is_loading);

    let settled = cache.refresh().await;
    assert_eq!(settled.rate, Some(5.3));
    assert_eq!(settled.error, None);
    assert_eq!(provider.calls(), 1);
}

#[tokio::test]
async fn test_adopted_rate_expires_as_clock_moves() {
    let provider = Arc::new(ScriptedProvider::returning(5.4));
    let clock = Arc::new(ManualClock::at(reference_time()));
    let store = memory_store();
    seed_rate(store.as_ref(), 5.0, chrono::Duration::minutes(59)).await;

    let cache = open(&provider, store, &clock).await;
    assert_eq!(cache.get_rate().rate, Some(5.0));

    clock.advance(chrono::Duration::minutes(2));
    assert!(cache.get_rate().is_loading);
    assert_eq!(cache.refresh().await.rate, Some(5.4));
    assert_eq!(provider.calls(), 1);
}

#[tokio::test]
async fn test_failed_refetch_falls_back_to_stale_rate() {
    let provider = Arc::new(ScriptedProvider::failing());
    let clock = Arc::new(ManualClock::at(reference_time()));
    let store = memory_store();
    seed_rate(store.as_ref(), 5.2, chrono::Duration::hours(2)).await;

    let cache = open(&provider, store, &clock).await;
    let settled = cache.refresh().await;

    assert_eq!(settled.rate, Some(5.2));
    assert!(settled.error.is_some());
    assert!(!settled.is_loading);
    assert_close(cache.convert(100.0), 520.0);
}

#[tokio::test]
async fn test_failure_does_not_loop() {
    let provider = Arc::new(ScriptedProvider::failing());
    let clock = Arc::new(ManualClock::at(reference_time()));
    let cache = open(&provider, memory_store(), &clock).await;

    cache.refresh().await;
    for _ in 0..20 {
        cache.get_rate();
        tokio::task::yield_now().await;
    }
    assert_eq!(provider.calls(), 1);

    provider.set_rate(Some(5.0));
    cache.invalidate();
    let recovered = cache.refresh().await;
    assert_eq!(recovered.rate, Some(5.0));
    assert_eq!(recovered.error, None);
    assert_eq!(provider.calls(), 2);
}

#[tokio::test]
async fn test_conversion_scenario() {
    let provider = Arc::new(ScriptedProvider::returning(0.75));
    let clock = Arc::new(ManualClock::at(reference_time()));
    let cache = open(&provider, memory_store(), &clock).await;

    cache.refresh().await;
    assert_close(cache.convert(200.0), 150.0);
}

#[tokio::test]
async fn test_conversion_without_rate_is_none() {
    let provider = Arc::new(ScriptedProvider::failing());
    let clock = Arc::new(ManualClock::at(reference_time()));
    let cache = open(&provider, memory_store(), &clock).await;

    assert_eq!(cache.convert(200.0), None);
    let settled = cache.refresh().await;
    assert_eq!(settled.rate, None);
    assert_eq!(settled.convert(200.0), None);
    assert_eq!(cache.convert(200.0), None);
}

#[tokio::test]
async fn test_malformed_persisted_entry_is_a_miss() {
    let provider = Arc::new(ScriptedProvider::returning(5.0));
    let clock = Arc::new(ManualClock::at(reference_time()));
    let store = memory_store();
    store
        .set(&rate_key(), "{\"rate\": \"lots\"", Duration::from_secs(600))
        .await
        .unwrap();

    let cache = open(&provider, store, &clock).await;
    assert_eq!(cache.persisted().await, None);
    assert!(cache.get_rate().is_loading);
    assert_eq!(cache.refresh().await.rate, Some(5.0));
}

#[tokio::test]
async fn test_subscribers_observe_the_same_state() {
    let provider = Arc::new(ScriptedProvider::returning(4.8));
    let clock = Arc::new(ManualClock::at(reference_time()));
    let cache = open(&provider, memory_store(), &clock).await;

    let mut first = cache.subscribe();
    let mut second = cache.subscribe();
    tokio::task::yield_now().await;
    assert_eq!(provider.calls(), 0);

    cache.refresh().await;
    let a = first.wait_for(|s| s.rate.is_some()).await.unwrap().clone();
    let b = second.wait_for(|s| s.rate.is_some()).await.unwrap().clone();
    assert_eq!(a, b);
    assert_eq!(a, cache.snapshot());
}

#[tokio::test]
async fn test_rate_survives_restart_with_file_store() {
    let dir = tempfile::tempdir().unwrap();
    let config = FileCacheConfig {
        path: dir.path().join("local-store.json").to_string_lossy().into_owned(),
    };
    let clock = Arc::new(ManualClock::at(reference_time()));

    let first_provider = Arc::new(ScriptedProvider::returning(5.25));
    let first_store = Arc::new(FileCacheProvider::open(&config).await.unwrap());
    let first = open(&first_provider, first_store, &clock).await;
    first.refresh().await;

    clock.advance(chrono::Duration::minutes(30));
    let second_provider = Arc::new(ScriptedProvider::returning(9.0));
    let second_store = Arc::new(FileCacheProvider::open(&config).await.unwrap());
    let second = open(&second_provider, second_store, &clock).await;

    assert_eq!(second.get_rate().rate, Some(5.25));
    assert_eq!(second_provider.calls(), 0);
}

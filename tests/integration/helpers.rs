//! Shared test helpers for integration tests.

#![allow(dead_code)]

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use bazaar_core::config::notifications::{NotificationsConfig, ReconnectConfig};
use bazaar_core::error::AppError;
use bazaar_core::result::AppResult;
use bazaar_core::traits::clock::Clock;
use bazaar_core::types::id::{NotificationId, UserId};
use bazaar_currency::RateProvider;
use bazaar_entity::notification::{Notification, NotificationType};

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn at(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn advance(&self, by: chrono::Duration) {
        *self.now.lock().unwrap() += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

/// Rate provider with a scripted answer, optional latency, and a call counter.
#[derive(Debug)]
pub struct ScriptedProvider {
    rate: Mutex<Option<f64>>,
    latency: Duration,
    calls: AtomicUsize,
}

impl ScriptedProvider {
    pub fn returning(rate: f64) -> Self {
        Self {
            rate: Mutex::new(Some(rate)),
            latency: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            rate: Mutex::new(None),
            latency: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn set_rate(&self, rate: Option<f64>) {
        *self.rate.lock().unwrap() = rate;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RateProvider for ScriptedProvider {
    async fn fetch_rate(&self) -> AppResult<f64> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        let rate = *self.rate.lock().unwrap();
        rate.ok_or_else(|| AppError::external_service("Rate provider returned 503"))
    }
}

/// A fixed reference instant.
pub fn reference_time() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2026-03-02T12:00:00Z")
        .unwrap()
        .with_timezone(&Utc)
}

/// Notification settings with short reconnect delays.
pub fn fast_sync_config() -> NotificationsConfig {
    NotificationsConfig {
        reconcile_interval_seconds: 3600,
        reconnect: ReconnectConfig {
            initial_delay_ms: 20,
            max_delay_ms: 100,
            multiplier: 2.0,
        },
        ..Default::default()
    }
}

/// A notification for `user`, created `minutes_ago` before the reference time.
pub fn notification(user: UserId, minutes_ago: i64, is_read: bool) -> Notification {
    Notification {
        id: NotificationId::new(),
        user_id: user,
        kind: NotificationType::Community,
        title: format!("Reply {minutes_ago}m ago"),
        message: "Someone replied to your post".to_string(),
        link: Some("/community".to_string()),
        is_read,
        created_at: reference_time() - chrono::Duration::minutes(minutes_ago),
        sender_id: None,
    }
}

/// Poll `condition` until it holds, failing the test after five seconds.
pub async fn eventually(what: &str, mut condition: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "timed out waiting for {what}"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

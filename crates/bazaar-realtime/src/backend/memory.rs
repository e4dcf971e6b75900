//! In-process notification backend.
//!
//! Rows live in a [`DashMap`] keyed by user, and every mutation is
//! echoed to that user's broadcast feed, the same way the hosted
//! backend echoes row changes over its realtime channel.

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::broadcast;
use tracing::debug;

use bazaar_core::error::AppError;
use bazaar_core::result::AppResult;
use bazaar_core::types::id::{NotificationId, UserId};
use bazaar_entity::notification::Notification;

use super::{ChangeStream, NotificationBackend};
use crate::event::ChangeEvent;

/// In-memory backend with a per-user change feed.
#[derive(Debug)]
pub struct MemoryNotificationBackend {
    rows: DashMap<UserId, Vec<Notification>>,
    feeds: DashMap<UserId, broadcast::Sender<ChangeEvent>>,
    feed_capacity: usize,
    failing_loads: AtomicUsize,
    failing_subscribes: AtomicUsize,
    rejection: Mutex<Option<String>>,
    load_calls: AtomicUsize,
}

impl MemoryNotificationBackend {
    /// Create an empty backend whose feeds buffer `feed_capacity` events.
    pub fn new(feed_capacity: usize) -> Self {
        Self {
            rows: DashMap::new(),
            feeds: DashMap::new(),
            feed_capacity: feed_capacity.max(1),
            failing_loads: AtomicUsize::new(0),
            failing_subscribes: AtomicUsize::new(0),
            rejection: Mutex::new(None),
            load_calls: AtomicUsize::new(0),
        }
    }

    /// Store rows without emitting events (pre-existing data).
    pub fn seed(&self, notifications: impl IntoIterator<Item = Notification>) {
        for notification in notifications {
            self.rows
                .entry(notification.user_id)
                .or_default()
                .push(notification);
        }
    }

    /// Create a row and emit an insert, as a server-side trigger would.
    pub fn insert(&self, notification: Notification) {
        let user = notification.user_id;
        self.rows
            .entry(user)
            .or_default()
            .push(notification.clone());
        self.emit(user, ChangeEvent::Insert { record: notification });
    }

    /// Emit an event without touching the rows (replays, duplicates).
    pub fn emit(&self, user: UserId, event: ChangeEvent) {
        if let Some(feed) = self.feeds.get(&user) {
            // No receivers just means nobody is subscribed right now.
            let _ = feed.send(event);
        }
    }

    /// Drop the user's feed. Open subscriptions end after draining.
    pub fn disconnect(&self, user: UserId) {
        if self.feeds.remove(&user).is_some() {
            debug!(user_id = %user, "Dropped change feed");
        }
    }

    /// Make the next `count` bulk loads fail.
    pub fn fail_next_loads(&self, count: usize) {
        self.failing_loads.store(count, Ordering::SeqCst);
    }

    /// Make the next `count` subscribe attempts fail.
    pub fn fail_next_subscribes(&self, count: usize) {
        self.failing_subscribes.store(count, Ordering::SeqCst);
    }

    /// Reject every mutation with `message` until cleared with `None`.
    pub fn reject_mutations(&self, message: Option<&str>) {
        *self.rejection.lock().unwrap_or_else(|e| e.into_inner()) = message.map(str::to_owned);
    }

    /// Open subscriptions for the user.
    pub fn subscriber_count(&self, user: UserId) -> usize {
        self.feeds
            .get(&user)
            .map(|feed| feed.receiver_count())
            .unwrap_or(0)
    }

    /// Number of bulk loads served or failed so far.
    pub fn load_calls(&self) -> usize {
        self.load_calls.load(Ordering::SeqCst)
    }

    /// Server-side rows for the user.
    pub fn rows_for(&self, user: UserId) -> Vec<Notification> {
        self.rows
            .get(&user)
            .map(|rows| rows.value().clone())
            .unwrap_or_default()
    }

    fn check_rejection(&self) -> AppResult<()> {
        match self.rejection.lock().unwrap_or_else(|e| e.into_inner()).as_deref() {
            Some(message) => Err(AppError::authorization(message)),
            None => Ok(()),
        }
    }

    fn take_failure(counter: &AtomicUsize) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    fn update_where(&self, user: UserId, mut predicate: impl FnMut(&Notification) -> bool) {
        let changed: Vec<Notification> = match self.rows.get_mut(&user) {
            Some(mut rows) => rows
                .iter_mut()
                .filter(|row| predicate(row) && !row.is_read)
                .map(|row| {
                    row.is_read = true;
                    row.clone()
                })
                .collect(),
            None => Vec::new(),
        };

        for record in changed {
            self.emit(user, ChangeEvent::Update { record });
        }
    }

    fn delete_where(&self, user: UserId, mut predicate: impl FnMut(&Notification) -> bool) {
        let removed: Vec<NotificationId> = match self.rows.get_mut(&user) {
            Some(mut rows) => {
                let mut removed = Vec::new();
                rows.retain(|row| {
                    if predicate(row) {
                        removed.push(row.id);
                        false
                    } else {
                        true
                    }
                });
                removed
            }
            None => Vec::new(),
        };

        for id in removed {
            self.emit(user, ChangeEvent::Delete { id });
        }
    }
}

impl Default for MemoryNotificationBackend {
    fn default() -> Self {
        Self::new(256)
    }
}

#[async_trait]
impl NotificationBackend for MemoryNotificationBackend {
    async fn list_for_user(&self, user: UserId) -> AppResult<Vec<Notification>> {
        self.load_calls.fetch_add(1, Ordering::SeqCst);
        if Self::take_failure(&self.failing_loads) {
            return Err(AppError::service_unavailable("Notification service unavailable"));
        }
        Ok(self.rows_for(user))
    }

    async fn mark_read(&self, user: UserId, id: NotificationId) -> AppResult<()> {
        self.check_rejection()?;
        self.update_where(user, |row| row.id == id);
        Ok(())
    }

    async fn mark_all_read(&self, user: UserId) -> AppResult<()> {
        self.check_rejection()?;
        self.update_where(user, |_| true);
        Ok(())
    }

    async fn delete(&self, user: UserId, id: NotificationId) -> AppResult<()> {
        self.check_rejection()?;
        self.delete_where(user, |row| row.id == id);
        Ok(())
    }

    async fn delete_all(&self, user: UserId) -> AppResult<()> {
        self.check_rejection()?;
        self.delete_where(user, |_| true);
        Ok(())
    }

    async fn subscribe(&self, user: UserId) -> AppResult<ChangeStream> {
        if Self::take_failure(&self.failing_subscribes) {
            return Err(AppError::service_unavailable("Change feed unavailable"));
        }

        let rx = self
            .feeds
            .entry(user)
            .or_insert_with(|| broadcast::channel(self.feed_capacity).0)
            .subscribe();

        let stream = futures::stream::unfold(rx, |mut rx| async move {
            match rx.recv().await {
                Ok(event) => Some((Ok(event), rx)),
                Err(broadcast::error::RecvError::Lagged(skipped)) => Some((
                    Err(AppError::service_unavailable(format!(
                        "Change feed lagged by {skipped} events"
                    ))),
                    rx,
                )),
                Err(broadcast::error::RecvError::Closed) => None,
            }
        });

        Ok(Box::pin(stream))
    }
}

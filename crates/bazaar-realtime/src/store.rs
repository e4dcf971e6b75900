//! The notification store for the signed-in user.
//!
//! A [`NotificationStore`] owns the projection of one user's
//! notifications. Binding a user starts a background sync driver; binding
//! a different user (or none) cancels it and bumps the binding epoch, so
//! anything the old driver still delivers is dropped.
//!
//! Mutations go to the backend only. Their effect comes back as change
//! events (or the next reload) like any other server-side change.

use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::{broadcast, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use bazaar_core::config::notifications::NotificationsConfig;
use bazaar_core::error::AppError;
use bazaar_core::result::AppResult;
use bazaar_core::types::id::{NotificationId, UserId};
use bazaar_entity::notification::Notification;

use crate::backend::NotificationBackend;
use crate::event::ChangeEvent;
use crate::list::{Applied, NotificationList};
use crate::state::{Alert, NotificationSnapshot, SyncState};
use crate::sync::driver::SyncDriver;

/// One user binding. A new epoch is issued on every user change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Binding {
    pub(crate) user: UserId,
    pub(crate) epoch: u64,
}

#[derive(Debug)]
struct Inner {
    user: Option<UserId>,
    epoch: u64,
    state: SyncState,
    list: NotificationList,
    driver: Option<CancellationToken>,
}

/// Per-user notification list kept in sync with the backend.
#[derive(Debug)]
pub struct NotificationStore {
    backend: Arc<dyn NotificationBackend>,
    config: NotificationsConfig,
    inner: Mutex<Inner>,
    tx: watch::Sender<NotificationSnapshot>,
    alerts: broadcast::Sender<Alert>,
}

impl NotificationStore {
    /// Create an unbound store.
    pub fn new(backend: Arc<dyn NotificationBackend>, config: NotificationsConfig) -> Arc<Self> {
        let (tx, _) = watch::channel(NotificationSnapshot::default());
        let (alerts, _) = broadcast::channel(config.alert_buffer_size.max(1));

        Arc::new(Self {
            backend,
            config,
            inner: Mutex::new(Inner {
                user: None,
                epoch: 0,
                state: SyncState::Unbound,
                list: NotificationList::new(),
                driver: None,
            }),
            tx,
            alerts,
        })
    }

    /// Follow the signed-in user.
    ///
    /// Binding the already-bound user is a no-op. Any other change clears
    /// the list, cancels the previous sync driver and, for `Some`, starts
    /// a new one in `Loading`. Must be called from within a Tokio runtime.
    pub fn bind_user(self: &Arc<Self>, user: Option<UserId>) {
        let mut inner = self.lock();
        if inner.user == user {
            return;
        }

        if let Some(previous) = inner.driver.take() {
            previous.cancel();
        }
        inner.epoch += 1;
        inner.user = user;
        inner.list.clear();
        inner.state = match user {
            Some(_) => SyncState::Loading,
            None => SyncState::Unbound,
        };
        self.publish(&inner);

        match user {
            Some(user) => {
                let binding = Binding {
                    user,
                    epoch: inner.epoch,
                };
                let cancel = CancellationToken::new();
                inner.driver = Some(cancel.clone());
                drop(inner);

                info!(user_id = %user, epoch = binding.epoch, "Bound notification store");
                let driver = SyncDriver::new(Arc::clone(self), binding, cancel);
                tokio::spawn(driver.run());
            }
            None => {
                drop(inner);
                info!("Unbound notification store");
            }
        }
    }

    /// Stop syncing and return to `Unbound`.
    pub fn shutdown(self: &Arc<Self>) {
        self.bind_user(None);
    }

    /// The bound user, if any.
    pub fn user(&self) -> Option<UserId> {
        self.lock().user
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SyncState {
        self.lock().state.clone()
    }

    /// Notifications, newest first.
    pub fn list(&self) -> Vec<Notification> {
        self.lock().list.items().to_vec()
    }

    /// Unread notifications in the current list.
    pub fn unread_count(&self) -> usize {
        self.lock().list.unread_count()
    }

    /// Everything at once, consistent with itself.
    pub fn snapshot(&self) -> NotificationSnapshot {
        self.tx.borrow().clone()
    }

    /// Receive every state change.
    pub fn subscribe(&self) -> watch::Receiver<NotificationSnapshot> {
        self.tx.subscribe()
    }

    /// Receive an alert for every newly arrived notification.
    pub fn alerts(&self) -> broadcast::Receiver<Alert> {
        self.alerts.subscribe()
    }

    /// Wait until the snapshot satisfies `predicate`.
    pub async fn wait_for(
        &self,
        mut predicate: impl FnMut(&NotificationSnapshot) -> bool,
    ) -> NotificationSnapshot {
        let mut rx = self.subscribe();
        match rx.wait_for(|snapshot| predicate(snapshot)).await {
            Ok(snapshot) => snapshot.clone(),
            Err(_) => self.snapshot(),
        }
    }

    /// Apply one change event for `user`.
    ///
    /// Events for a user other than the bound one are ignored.
    pub fn apply_event(&self, user: UserId, event: ChangeEvent) -> Applied {
        let mut inner = self.lock();
        if inner.user != Some(user) {
            debug!(user_id = %user, kind = event.kind(), "Ignoring event for unbound user");
            return Applied::Ignored;
        }
        self.apply_locked(&mut inner, event)
    }

    /// Replace the list with a fresh bulk load for the bound user.
    pub async fn reconcile(&self) -> AppResult<()> {
        let binding = self.binding().ok_or_else(|| not_signed_in("reload notifications"))?;
        let items = self.backend.list_for_user(binding.user).await?;
        self.replace_items(binding, items);
        Ok(())
    }

    /// Mark one notification as read on the server.
    pub async fn mark_read(&self, id: NotificationId) -> AppResult<()> {
        let user = self.require_user("mark a notification as read")?;
        self.backend
            .mark_read(user, id)
            .await
            .inspect_err(|e| warn!(user_id = %user, id = %id, error = %e, "Mark read failed"))
    }

    /// Mark every notification of the bound user as read on the server.
    pub async fn mark_all_read(&self) -> AppResult<()> {
        let user = self.require_user("mark notifications as read")?;
        self.backend
            .mark_all_read(user)
            .await
            .inspect_err(|e| warn!(user_id = %user, error = %e, "Mark all read failed"))
    }

    /// Delete one notification on the server.
    pub async fn delete(&self, id: NotificationId) -> AppResult<()> {
        let user = self.require_user("delete a notification")?;
        self.backend
            .delete(user, id)
            .await
            .inspect_err(|e| warn!(user_id = %user, id = %id, error = %e, "Delete failed"))
    }

    /// Delete every notification of the bound user on the server.
    pub async fn delete_all(&self) -> AppResult<()> {
        let user = self.require_user("delete notifications")?;
        self.backend
            .delete_all(user)
            .await
            .inspect_err(|e| warn!(user_id = %user, error = %e, "Delete all failed"))
    }

    pub(crate) fn config(&self) -> &NotificationsConfig {
        &self.config
    }

    pub(crate) fn backend(&self) -> Arc<dyn NotificationBackend> {
        Arc::clone(&self.backend)
    }

    /// Move to `state` if `binding` is still current.
    pub(crate) fn set_state(&self, binding: Binding, state: SyncState) -> bool {
        let mut inner = self.lock();
        if !is_current(&inner, binding) {
            return false;
        }
        if inner.state != state {
            debug!(user_id = %binding.user, from = %inner.state, to = %state, "Sync state changed");
            inner.state = state;
            self.publish(&inner);
        }
        true
    }

    /// Adopt a completed initial load. The state stays `Loading` until
    /// the stream is attached.
    pub(crate) fn finish_load(&self, binding: Binding, items: Vec<Notification>) -> bool {
        let mut inner = self.lock();
        if !is_current(&inner, binding) {
            return false;
        }
        inner.list.replace_all(items);
        inner.state = SyncState::Loading;
        self.publish(&inner);
        true
    }

    /// Replace the items if `binding` is still current.
    pub(crate) fn replace_items(&self, binding: Binding, items: Vec<Notification>) -> bool {
        let mut inner = self.lock();
        if !is_current(&inner, binding) {
            return false;
        }
        inner.list.replace_all(items);
        self.publish(&inner);
        true
    }

    /// Apply an event from the driver of `binding`. `None` if stale.
    pub(crate) fn apply_bound(&self, binding: Binding, event: ChangeEvent) -> Option<Applied> {
        let mut inner = self.lock();
        if !is_current(&inner, binding) {
            debug!(user_id = %binding.user, kind = event.kind(), "Dropping event from stale binding");
            return None;
        }
        Some(self.apply_locked(&mut inner, event))
    }

    fn apply_locked(&self, inner: &mut Inner, event: ChangeEvent) -> Applied {
        let alert = match &event {
            ChangeEvent::Insert { record } => Some(Alert::from(record)),
            _ => None,
        };

        let applied = inner.list.apply(event);
        if applied != Applied::Ignored {
            self.publish(inner);
        }

        if applied == Applied::Inserted {
            if let Some(alert) = alert {
                debug!(id = %alert.id, kind = %alert.kind, "New notification");
                // Nobody listening is fine; alerts are transient.
                let _ = self.alerts.send(alert);
            }
        }
        applied
    }

    fn binding(&self) -> Option<Binding> {
        let inner = self.lock();
        inner.user.map(|user| Binding {
            user,
            epoch: inner.epoch,
        })
    }

    fn require_user(&self, action: &str) -> AppResult<UserId> {
        self.user().ok_or_else(|| not_signed_in(action))
    }

    fn publish(&self, inner: &Inner) {
        self.tx.send_replace(NotificationSnapshot {
            user_id: inner.user,
            state: inner.state.clone(),
            items: inner.list.items().to_vec(),
            unread_count: inner.list.unread_count(),
        });
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn is_current(inner: &Inner, binding: Binding) -> bool {
    inner.epoch == binding.epoch && inner.user == Some(binding.user)
}

fn not_signed_in(action: &str) -> AppError {
    AppError::authentication(format!("Cannot {action}: no user is signed in"))
}

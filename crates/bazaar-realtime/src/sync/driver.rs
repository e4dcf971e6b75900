//! Sync loop for one user binding.
//!
//! Load, attach the change stream, reconcile, apply events until the
//! stream drops, then re-attach with backoff and reconcile again. A
//! periodic full reload runs while live. The loop exits when its binding is cancelled.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::backend::{ChangeStream, NotificationBackend};
use crate::state::SyncState;
use crate::store::{Binding, NotificationStore};
use crate::sync::backoff::Backoff;

/// Why the live phase ended.
enum Detached {
    Cancelled,
    Dropped(String),
}

pub(crate) struct SyncDriver {
    store: Arc<NotificationStore>,
    backend: Arc<dyn NotificationBackend>,
    binding: Binding,
    cancel: CancellationToken,
    backoff: Backoff,
    reconcile_every: Duration,
}

impl SyncDriver {
    pub(crate) fn new(
        store: Arc<NotificationStore>,
        binding: Binding,
        cancel: CancellationToken,
    ) -> Self {
        let backoff = Backoff::new(&store.config().reconnect);
        let reconcile_every =
            Duration::from_secs(store.config().reconcile_interval_seconds.max(1));
        Self {
            backend: store.backend(),
            binding,
            cancel,
            backoff,
            reconcile_every,
            store,
        }
    }

    pub(crate) async fn run(mut self) {
        let user = self.binding.user;
        info!(user_id = %user, epoch = self.binding.epoch, "Notification sync started");

        if self.initial_load().await {
            while let Some(stream) = self.attach().await {
                // Changes made while no stream was attached were never delivered.
                self.reconcile().await;
                if !self.store.set_state(self.binding, SyncState::Live) {
                    break;
                }
                info!(user_id = %user, "Notification stream live");

                match self.pump(stream).await {
                    Detached::Cancelled => break,
                    Detached::Dropped(reason) => {
                        warn!(user_id = %user, reason = %reason, "Notification stream dropped");
                        if !self.store.set_state(self.binding, SyncState::Reconnecting) {
                            break;
                        }
                    }
                }
            }
        }

        info!(user_id = %user, epoch = self.binding.epoch, "Notification sync stopped");
    }

    /// Bulk load, retrying with backoff. Returns `false` when cancelled.
    async fn initial_load(&mut self) -> bool {
        let user = self.binding.user;
        loop {
            let result = tokio::select! {
                _ = self.cancel.cancelled() => return false,
                result = self.backend.list_for_user(user) => result,
            };

            match result {
                Ok(items) => {
                    self.backoff.reset();
                    debug!(user_id = %user, count = items.len(), "Initial notification load complete");
                    return self.store.finish_load(self.binding, items);
                }
                Err(e) => {
                    warn!(user_id = %user, error = %e, "Notification load failed");
                    let state = SyncState::Failed { error: e.message };
                    if !self.store.set_state(self.binding, state) {
                        return false;
                    }
                }
            }

            if !self.backoff.wait(&self.cancel).await {
                return false;
            }
        }
    }

    /// Subscribe, retrying with backoff. `None` when cancelled.
    async fn attach(&mut self) -> Option<ChangeStream> {
        let user = self.binding.user;
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            let result = tokio::select! {
                _ = self.cancel.cancelled() => return None,
                result = self.backend.subscribe(user) => result,
            };

            match result {
                Ok(stream) => {
                    self.backoff.reset();
                    return Some(stream);
                }
                Err(e) => {
                    warn!(user_id = %user, attempt, error = %e, "Change stream subscribe failed");
                    if !self.store.set_state(self.binding, SyncState::Reconnecting) {
                        return None;
                    }
                }
            }

            if !self.backoff.wait(&self.cancel).await {
                return None;
            }
        }
    }

    async fn pump(&self, mut stream: ChangeStream) -> Detached {
        let mut ticker = tokio::time::interval_at(
            Instant::now() + self.reconcile_every,
            self.reconcile_every,
        );
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Detached::Cancelled,
                next = stream.next() => match next {
                    Some(Ok(event)) => {
                        if self.store.apply_bound(self.binding, event).is_none() {
                            return Detached::Cancelled;
                        }
                    }
                    Some(Err(e)) => return Detached::Dropped(e.message),
                    None => return Detached::Dropped("stream closed".to_string()),
                },
                _ = ticker.tick() => self.reconcile().await,
            }
        }
    }

    async fn reconcile(&self) {
        let user = self.binding.user;
        let result = tokio::select! {
            _ = self.cancel.cancelled() => return,
            result = self.backend.list_for_user(user) => result,
        };

        match result {
            Ok(items) => {
                debug!(user_id = %user, count = items.len(), "Reconciled notifications");
                self.store.replace_items(self.binding, items);
            }
            Err(e) => warn!(user_id = %user, error = %e, "Notification reconciliation failed"),
        }
    }
}

//! Integration tests for the notification sync store against the
//! in-memory backend and its change feed.

mod helpers;

use std::sync::Arc;
use std::time::Duration;

use bazaar_core::error::ErrorKind;
use bazaar_core::types::id::UserId;
use bazaar_realtime::backend::MemoryNotificationBackend;
use bazaar_realtime::{Applied, ChangeEvent, NotificationSnapshot, NotificationStore, SyncState};

use helpers::{eventually, fast_sync_config, notification};

fn setup() -> (Arc<MemoryNotificationBackend>, Arc<NotificationStore>) {
    let backend = Arc::new(MemoryNotificationBackend::default());
    let store = NotificationStore::new(backend.clone(), fast_sync_config());
    (backend, store)
}

async fn wait_until(
    store: &NotificationStore,
    what: &str,
    predicate: impl FnMut(&NotificationSnapshot) -> bool,
) -> NotificationSnapshot {
    match tokio::time::timeout(Duration::from_secs(5), store.wait_for(predicate)).await {
        Ok(snapshot) => snapshot,
        Err(_) => panic!("timed out waiting for {what}; last snapshot: {:?}", store.snapshot()),
    }
}

async fn wait_live(store: &NotificationStore) -> NotificationSnapshot {
    wait_until(store, "live", |s| s.state == SyncState::Live).await
}

#[tokio::test]
async fn test_initial_load_is_sorted_newest_first() {
    let (backend, store) = setup();
    let user = UserId::new();
    backend.seed([
        notification(user, 30, false),
        notification(user, 5, true),
        notification(user, 120, false),
    ]);

    store.bind_user(Some(user));
    let snapshot = wait_live(&store).await;

    let titles: Vec<_> = snapshot.items.iter().map(|n| n.title.as_str()).collect();
    assert_eq!(titles, ["Reply 5m ago", "Reply 30m ago", "Reply 120m ago"]);
    assert_eq!(snapshot.unread_count, 2);
    store.shutdown();
}

#[tokio::test]
async fn test_live_insert_prepends_and_alerts() {
    let (backend, store) = setup();
    let user = UserId::new();
    backend.seed([notification(user, 60, true)]);
    store.bind_user(Some(user));
    wait_live(&store).await;
    let mut alerts = store.alerts();

    let fresh = notification(user, 0, false);
    backend.insert(fresh.clone());

    let alert = tokio::time::timeout(Duration::from_secs(5), alerts.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(alert.id, fresh.id);
    assert_eq!(alert.link.as_deref(), Some("/community"));

    let items = store.list();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0].id, fresh.id);
    assert_eq!(store.unread_count(), 1);
    store.shutdown();
}

#[tokio::test]
async fn test_replayed_events_are_idempotent() {
    let (backend, store) = setup();
    let user = UserId::new();
    let existing = notification(user, 10, false);
    backend.seed([existing.clone()]);
    store.bind_user(Some(user));
    wait_live(&store).await;
    let mut alerts = store.alerts();

    backend.emit(user, ChangeEvent::Insert { record: existing.clone() });
    backend.emit(user, ChangeEvent::Delete { id: notification(user, 1, false).id });
    let marker = notification(user, 0, true);
    backend.insert(marker.clone());

    wait_until(&store, "marker", |s| s.items.iter().any(|n| n.id == marker.id)).await;
    assert_eq!(store.list().len(), 2);
    assert_eq!(store.unread_count(), 1);

    assert_eq!(alerts.recv().await.unwrap().id, marker.id);
    assert!(alerts.try_recv().is_err());
    store.shutdown();
}

#[tokio::test]
async fn test_mark_all_read_converges_through_events() {
    let (backend, store) = setup();
    let user = UserId::new();
    backend.seed((0..5).map(|i| notification(user, i, i >= 3)));
    store.bind_user(Some(user));
    assert_eq!(wait_live(&store).await.unread_count, 3);

    store.mark_all_read().await.unwrap();

    let snapshot = wait_until(&store, "all read", |s| s.unread_count == 0).await;
    assert_eq!(snapshot.items.len(), 5);
    assert!(snapshot.items.iter().all(|n| n.is_read));
    store.shutdown();
}

#[tokio::test]
async fn test_mark_read_and_delete_converge() {
    let (backend, store) = setup();
    let user = UserId::new();
    let first = notification(user, 1, false);
    let second = notification(user, 2, false);
    backend.seed([first.clone(), second.clone()]);
    store.bind_user(Some(user));
    wait_live(&store).await;

    store.mark_read(first.id).await.unwrap();
    wait_until(&store, "one read", |s| s.unread_count == 1).await;

    store.delete(second.id).await.unwrap();
    let snapshot = wait_until(&store, "one left", |s| s.items.len() == 1).await;
    assert_eq!(snapshot.items[0].id, first.id);
    assert_eq!(snapshot.unread_count, 0);

    store.delete_all().await.unwrap();
    wait_until(&store, "empty", |s| s.items.is_empty()).await;
    store.shutdown();
}

#[tokio::test]
async fn test_user_switch_replaces_list_and_detaches_stream() {
    let (backend, store) = setup();
    let alice = UserId::new();
    let bob = UserId::new();
    backend.seed((0..3).map(|i| notification(alice, i, false)));
    backend.seed([notification(bob, 1, false), notification(bob, 2, true)]);

    store.bind_user(Some(alice));
    assert_eq!(wait_live(&store).await.unread_count, 3);
    assert_eq!(backend.subscriber_count(alice), 1);

    store.bind_user(Some(bob));
    let switched = store.snapshot();
    assert_eq!(switched.user_id, Some(bob));
    assert!(switched.items.is_empty());
    assert_eq!(switched.state, SyncState::Loading);

    let snapshot = wait_live(&store).await;
    assert_eq!(snapshot.unread_count, 1);
    assert!(snapshot.items.iter().all(|n| n.user_id == bob));

    eventually("alice's stream to detach", || backend.subscriber_count(alice) == 0).await;
    backend.insert(notification(alice, 0, false));
    let late = store.apply_event(
        alice,
        ChangeEvent::Insert {
            record: notification(alice, 0, false),
        },
    );
    assert_eq!(late, Applied::Ignored);

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(store.unread_count(), 1);
    assert!(store.list().iter().all(|n| n.user_id == bob));
    store.shutdown();
}

#[tokio::test]
async fn test_failed_load_recovers_with_backoff() {
    let (backend, store) = setup();
    let user = UserId::new();
    backend.seed([notification(user, 1, false)]);
    backend.fail_next_loads(2);

    store.bind_user(Some(user));
    let failed = wait_until(&store, "failed", |s| matches!(s.state, SyncState::Failed { .. })).await;
    assert!(failed.items.is_empty());
    assert_eq!(backend.subscriber_count(user), 0);

    let snapshot = wait_live(&store).await;
    assert_eq!(snapshot.items.len(), 1);
    // Two failed loads, the successful one, then the post-attach reconcile.
    assert_eq!(backend.load_calls(), 4);
    store.shutdown();
}

#[tokio::test]
async fn test_change_before_first_attach_is_reconciled() {
    let (backend, store) = setup();
    let user = UserId::new();
    backend.seed([notification(user, 10, true)]);
    backend.fail_next_subscribes(1);

    store.bind_user(Some(user));
    let reconnecting = wait_until(&store, "reconnecting", |s| s.state == SyncState::Reconnecting).await;
    assert_eq!(reconnecting.items.len(), 1);
    assert_eq!(backend.subscriber_count(user), 0);

    // No feed is attached yet, so this insert is never pushed.
    let missed = notification(user, 0, false);
    backend.insert(missed.clone());

    let snapshot = wait_live(&store).await;
    assert_eq!(snapshot.items.len(), 2);
    assert_eq!(snapshot.items[0].id, missed.id);
    assert_eq!(snapshot.unread_count, 1);
    assert_eq!(backend.subscriber_count(user), 1);
    store.shutdown();
}

#[tokio::test]
async fn test_lagged_feed_reattaches_and_reconciles() {
    let backend = Arc::new(MemoryNotificationBackend::new(2));
    let store = NotificationStore::new(backend.clone(), fast_sync_config());
    let user = UserId::new();
    backend.seed([notification(user, 60, true)]);
    store.bind_user(Some(user));
    wait_live(&store).await;

    // Overflow the feed before the driver gets to read it.
    let burst: Vec<_> = (0..5).map(|m| notification(user, m, false)).collect();
    for n in &burst {
        backend.insert(n.clone());
    }

    let snapshot = wait_until(&store, "reconciled after lag", |s| {
        s.state == SyncState::Live && s.items.len() == 6
    })
    .await;
    assert_eq!(snapshot.unread_count, 5);
    assert_eq!(snapshot.items[0].id, burst[0].id);
    assert!(burst.iter().all(|n| snapshot.items.iter().any(|i| i.id == n.id)));
    store.shutdown();
}

#[tokio::test]
async fn test_disconnect_reconnects_and_reconciles() {
    let (backend, store) = setup();
    let user = UserId::new();
    backend.seed([notification(user, 10, true)]);
    store.bind_user(Some(user));
    wait_live(&store).await;

    backend.fail_next_subscribes(1);
    backend.disconnect(user);
    let reconnecting = wait_until(&store, "reconnecting", |s| s.state == SyncState::Reconnecting).await;
    assert_eq!(reconnecting.items.len(), 1);

    // Created while the stream was down; only a reload can pick it up.
    let missed = notification(user, 0, false);
    backend.seed([missed.clone()]);

    let snapshot = wait_until(&store, "reconciled", |s| {
        s.state == SyncState::Live && s.items.iter().any(|n| n.id == missed.id)
    })
    .await;
    assert_eq!(snapshot.items[0].id, missed.id);
    assert_eq!(snapshot.unread_count, 1);
    assert_eq!(backend.subscriber_count(user), 1);

    let after = notification(user, 0, false);
    backend.insert(after.clone());
    wait_until(&store, "post-reconnect insert", |s| s.items.len() == 3).await;
    store.shutdown();
}

#[tokio::test]
async fn test_explicit_reconcile_replaces_items() {
    let (backend, store) = setup();
    let user = UserId::new();
    store.bind_user(Some(user));
    wait_live(&store).await;

    backend.seed([notification(user, 3, false), notification(user, 4, false)]);
    store.reconcile().await.unwrap();
    assert_eq!(store.list().len(), 2);
    assert_eq!(store.unread_count(), 2);
    store.shutdown();
}

#[tokio::test]
async fn test_mutations_without_user_fail() {
    let (_backend, store) = setup();
    for err in [
        store.mark_read(bazaar_core::types::id::NotificationId::new()).await,
        store.mark_all_read().await,
        store.delete_all().await,
    ] {
        assert_eq!(err.unwrap_err().kind, ErrorKind::Authentication);
    }
}

#[tokio::test]
async fn test_backend_rejection_surfaces_message() {
    let (backend, store) = setup();
    let user = UserId::new();
    let n = notification(user, 1, false);
    backend.seed([n.clone()]);
    store.bind_user(Some(user));
    wait_live(&store).await;

    backend.reject_mutations(Some("new row violates row-level security policy"));
    let err = store.delete(n.id).await.unwrap_err();
    assert_eq!(err.message, "new row violates row-level security policy");
    assert_eq!(store.list().len(), 1);
    store.shutdown();
}

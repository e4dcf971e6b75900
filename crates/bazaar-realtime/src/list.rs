//! Ordered projection of one user's notifications.
//!
//! Items are kept sorted by `created_at`, newest first. Applying change
//! events is idempotent: duplicate inserts never duplicate an entry, and
//! updates or deletes for unknown ids are no-ops.

use bazaar_core::types::id::NotificationId;
use bazaar_entity::notification::Notification;

use crate::event::ChangeEvent;

/// What applying an event did to the list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    /// A notification not seen before was added.
    Inserted,
    /// An insert for an id already present replaced the existing entry.
    Replaced,
    /// An existing entry was updated in place.
    Updated,
    /// An entry was removed.
    Removed,
    /// The event referred to an id that is not present.
    Ignored,
}

/// Newest-first list of notifications with a derived unread count.
#[derive(Debug, Clone, Default)]
pub struct NotificationList {
    items: Vec<Notification>,
}

impl NotificationList {
    /// An empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a list from a bulk load, sorting and dropping duplicate ids.
    pub fn from_items(items: Vec<Notification>) -> Self {
        let mut list = Self::new();
        list.replace_all(items);
        list
    }

    /// Replace the whole list with the authoritative server state.
    pub fn replace_all(&mut self, mut items: Vec<Notification>) {
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let mut seen = std::collections::HashSet::with_capacity(items.len());
        items.retain(|item| seen.insert(item.id));
        self.items = items;
    }

    /// Drop everything (user change).
    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Apply one change event.
    pub fn apply(&mut self, event: ChangeEvent) -> Applied {
        match event {
            ChangeEvent::Insert { record } => {
                let applied = match self.position(record.id) {
                    Some(pos) => {
                        self.items.remove(pos);
                        Applied::Replaced
                    }
                    None => Applied::Inserted,
                };
                let at = self
                    .items
                    .partition_point(|existing| existing.created_at > record.created_at);
                self.items.insert(at, record);
                applied
            }
            ChangeEvent::Update { record } => match self.position(record.id) {
                Some(pos) => {
                    self.items[pos] = record;
                    Applied::Updated
                }
                None => Applied::Ignored,
            },
            ChangeEvent::Delete { id } => match self.position(id) {
                Some(pos) => {
                    self.items.remove(pos);
                    Applied::Removed
                }
                None => Applied::Ignored,
            },
        }
    }

    /// Items, newest first.
    pub fn items(&self) -> &[Notification] {
        &self.items
    }

    /// Look up one notification.
    pub fn get(&self, id: NotificationId) -> Option<&Notification> {
        self.items.iter().find(|item| item.id == id)
    }

    /// Number of items whose `is_read` is false.
    pub fn unread_count(&self) -> usize {
        self.items.iter().filter(|item| item.is_unread()).count()
    }

    /// Number of items.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the list is empty.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    fn position(&self, id: NotificationId) -> Option<usize> {
        self.items.iter().position(|item| item.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bazaar_core::types::id::UserId;
    use bazaar_entity::notification::NotificationType;
    use chrono::{DateTime, Duration, Utc};

    fn base_time() -> DateTime<Utc> {
        DateTime::from_timestamp(1_767_225_600, 0).unwrap()
    }

    fn notification(minute: i64, is_read: bool) -> Notification {
        Notification {
            id: NotificationId::new(),
            user_id: UserId::from_uuid(uuid::Uuid::nil()),
            kind: NotificationType::Product,
            title: format!("Product {minute}"),
            message: "A new product was published".to_string(),
            link: Some("/products".to_string()),
            is_read,
            created_at: base_time() + Duration::minutes(minute),
            sender_id: None,
        }
    }

    fn assert_sorted(list: &NotificationList) {
        assert!(
            list.items()
                .windows(2)
                .all(|pair| pair[0].created_at >= pair[1].created_at),
            "items out of order"
        );
    }

    #[test]
    fn test_duplicate_insert_is_idempotent() {
        let mut list = NotificationList::new();
        let n = notification(1, false);
        assert_eq!(list.apply(ChangeEvent::Insert { record: n.clone() }), Applied::Inserted);
        assert_eq!(list.apply(ChangeEvent::Insert { record: n.clone() }), Applied::Replaced);
        assert_eq!(list.len(), 1);
        assert_eq!(list.unread_count(), 1);
    }

    #[test]
    fn test_delete_absent_is_noop() {
        let mut list = NotificationList::from_items(vec![notification(1, false)]);
        let before = list.items().to_vec();
        assert_eq!(
            list.apply(ChangeEvent::Delete { id: NotificationId::new() }),
            Applied::Ignored
        );
        assert_eq!(list.items(), before.as_slice());
    }

    #[test]
    fn test_update_absent_is_noop() {
        let mut list = NotificationList::new();
        assert_eq!(
            list.apply(ChangeEvent::Update { record: notification(1, true) }),
            Applied::Ignored
        );
        assert!(list.is_empty());
    }

    #[test]
    fn test_update_replaces_in_place() {
        let older = notification(1, false);
        let newer = notification(2, false);
        let mut list = NotificationList::from_items(vec![older.clone(), newer.clone()]);

        let mut read = older.clone();
        read.is_read = true;
        assert_eq!(list.apply(ChangeEvent::Update { record: read }), Applied::Updated);

        assert_eq!(list.items()[0].id, newer.id);
        assert_eq!(list.items()[1].id, older.id);
        assert!(list.items()[1].is_read);
        assert_eq!(list.unread_count(), 1);
    }

    #[test]
    fn test_newest_insert_is_prepended() {
        let mut list = NotificationList::from_items(vec![notification(1, true), notification(2, true)]);
        let newest = notification(3, false);
        list.apply(ChangeEvent::Insert { record: newest.clone() });
        assert_eq!(list.items()[0].id, newest.id);
    }

    #[test]
    fn test_any_insert_order_stays_sorted() {
        let minutes = [7, 3, 9, 1, 1, 12, 0, 5, 8, 2, 11, 4, 10, 6];
        let mut list = NotificationList::new();
        for minute in minutes {
            list.apply(ChangeEvent::Insert { record: notification(minute, minute % 2 == 0) });
            assert_sorted(&list);
        }
        assert_eq!(list.len(), minutes.len());
    }

    #[test]
    fn test_unread_count_tracks_every_transition() {
        let items: Vec<_> = (0..5).map(|m| notification(m, m >= 3)).collect();
        let mut list = NotificationList::from_items(items.clone());
        let expected = |list: &NotificationList| list.items().iter().filter(|n| !n.is_read).count();
        assert_eq!(list.unread_count(), 3);

        let mut read = items[0].clone();
        read.is_read = true;
        list.apply(ChangeEvent::Update { record: read });
        assert_eq!(list.unread_count(), expected(&list));
        assert_eq!(list.unread_count(), 2);

        list.apply(ChangeEvent::Delete { id: items[1].id });
        assert_eq!(list.unread_count(), expected(&list));
        assert_eq!(list.unread_count(), 1);

        list.apply(ChangeEvent::Insert { record: notification(9, false) });
        assert_eq!(list.unread_count(), expected(&list));
        assert_eq!(list.unread_count(), 2);
    }

    #[test]
    fn test_bulk_load_dedupes_and_sorts() {
        let a = notification(1, false);
        let b = notification(5, false);
        let list = NotificationList::from_items(vec![a.clone(), b.clone(), a.clone()]);
        assert_eq!(list.len(), 2);
        assert_eq!(list.items()[0].id, b.id);
        assert!(list.get(a.id).is_some());
    }
}

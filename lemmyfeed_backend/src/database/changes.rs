//! Store change notifications.
//!
//! Instead of tracking object mutations, the store bumps a version counter
//! per entity kind whenever a write transaction that touched that kind
//! commits. Consumers hold the last version they rendered and re-query when
//! it moves; the watch channel lets async consumers sleep until any write
//! lands instead of polling.

use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::watch;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Entity {
    Instance,
    Site,
    Account,
    Person,
    Post,
    Feed,
    Page,
    Comment,
}

const ENTITY_COUNT: usize = 8;

impl Entity {
    fn index(self) -> usize {
        match self {
            Entity::Instance => 0,
            Entity::Site => 1,
            Entity::Account => 2,
            Entity::Person => 3,
            Entity::Post => 4,
            Entity::Feed => 5,
            Entity::Page => 6,
            Entity::Comment => 7,
        }
    }
}

pub struct ChangeHub {
    versions: [AtomicU64; ENTITY_COUNT],
    global: AtomicU64,
    tx: watch::Sender<u64>,
}

impl ChangeHub {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(0);
        Self {
            versions: std::array::from_fn(|_| AtomicU64::new(0)),
            global: AtomicU64::new(0),
            tx,
        }
    }

    /// Publishes a committed write. A save that touched nothing must not
    /// call this; idempotent re-imports rely on versions staying put.
    pub fn publish(&self, touched: &[Entity]) {
        if touched.is_empty() {
            return;
        }
        for entity in touched {
            self.versions[entity.index()].fetch_add(1, Ordering::Release);
        }
        let global = self.global.fetch_add(1, Ordering::Release) + 1;
        let _ = self.tx.send(global);
    }

    pub fn version(&self, entity: Entity) -> u64 {
        self.versions[entity.index()].load(Ordering::Acquire)
    }

    pub fn global_version(&self) -> u64 {
        self.global.load(Ordering::Acquire)
    }

    /// Receiver that wakes whenever any write commits.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.tx.subscribe()
    }
}

impl Default for ChangeHub {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn versions_move_only_for_touched_entities() {
        let hub = ChangeHub::new();
        assert_eq!(hub.version(Entity::Post), 0);

        hub.publish(&[Entity::Post, Entity::Page]);
        assert_eq!(hub.version(Entity::Post), 1);
        assert_eq!(hub.version(Entity::Page), 1);
        assert_eq!(hub.version(Entity::Comment), 0);
        assert_eq!(hub.global_version(), 1);
    }

    #[test]
    fn empty_publish_is_a_no_op() {
        let hub = ChangeHub::new();
        let rx = hub.subscribe();
        hub.publish(&[]);
        assert_eq!(hub.global_version(), 0);
        assert!(!rx.has_changed().unwrap());
    }

    #[tokio::test]
    async fn subscribers_wake_on_commit() {
        let hub = ChangeHub::new();
        let mut rx = hub.subscribe();
        hub.publish(&[Entity::Feed]);
        rx.changed().await.expect("sender alive");
        assert_eq!(*rx.borrow(), 1);
    }
}

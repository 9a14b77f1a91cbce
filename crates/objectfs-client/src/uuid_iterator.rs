//! Replica failover order
//!
//! A [`UuidIterator`] holds the service UUIDs that can serve one request
//! (the replicas of an object, or the instances of a service) together with
//! a cursor on the one to try next. Failing UUIDs are skipped in list order;
//! once every UUID has failed the list starts over from the first entry.

use objectfs_common::{Error, Result};
use parking_lot::Mutex;
use std::fmt;

#[derive(Clone, Debug, PartialEq, Eq)]
struct UuidItem {
    uuid: String,
    marked_as_failed: bool,
}

impl UuidItem {
    fn new(uuid: impl Into<String>) -> Self {
        Self {
            uuid: uuid.into(),
            marked_as_failed: false,
        }
    }
}

#[derive(Debug, Default)]
struct Inner {
    items: Vec<UuidItem>,
    /// Index into `items`, 0 while the list is empty
    current: usize,
}

impl Inner {
    fn position(&self, uuid: &str) -> Option<usize> {
        self.items.iter().position(|item| item.uuid == uuid)
    }

    fn reset(&mut self) {
        for item in &mut self.items {
            item.marked_as_failed = false;
        }
        self.current = 0;
    }
}

/// Ordered replica UUIDs with a failover cursor
#[derive(Debug, Default)]
pub struct UuidIterator {
    inner: Mutex<Inner>,
}

impl UuidIterator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an iterator over `uuids` with the cursor on the first one
    pub fn from_uuids<I, S>(uuids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            inner: Mutex::new(Inner {
                items: uuids.into_iter().map(UuidItem::new).collect(),
                current: 0,
            }),
        }
    }

    /// Append a UUID; the cursor does not move
    pub fn add_uuid(&self, uuid: impl Into<String>) {
        self.inner.lock().items.push(UuidItem::new(uuid));
    }

    /// UUID under the cursor
    pub fn get_uuid(&self) -> Result<String> {
        let inner = self.inner.lock();
        inner
            .items
            .get(inner.current)
            .map(|item| item.uuid.clone())
            .ok_or(Error::EmptyIterator)
    }

    /// Mark `uuid` as failed and move the cursor past it if it is current
    ///
    /// When every UUID is marked failed, all marks are cleared and the
    /// cursor returns to the first UUID. Unknown UUIDs are ignored.
    pub fn mark_uuid_as_failed(&self, uuid: &str) {
        let mut inner = self.inner.lock();
        let Some(index) = inner.position(uuid) else {
            return;
        };
        inner.items[index].marked_as_failed = true;

        if inner.items.iter().all(|item| item.marked_as_failed) {
            inner.reset();
            return;
        }

        if index == inner.current {
            let len = inner.items.len();
            let next = (1..len)
                .map(|step| (index + step) % len)
                .find(|&i| !inner.items[i].marked_as_failed);
            if let Some(next) = next {
                inner.current = next;
            }
        }
    }

    /// Move the cursor to `uuid`, appending it if it is not in the list
    pub fn set_current_uuid(&self, uuid: &str) {
        let mut inner = self.inner.lock();
        let index = if let Some(index) = inner.position(uuid) {
            index
        } else {
            inner.items.push(UuidItem::new(uuid));
            inner.items.len() - 1
        };
        inner.items[index].marked_as_failed = false;
        inner.current = index;
    }

    /// Remove all UUIDs
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.items.clear();
        inner.current = 0;
    }

    /// Replace the list with the single UUID `uuid`
    pub fn clear_and_add_uuid(&self, uuid: impl Into<String>) {
        let mut inner = self.inner.lock();
        inner.items.clear();
        inner.items.push(UuidItem::new(uuid));
        inner.current = 0;
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.lock().items.is_empty()
    }

    /// All UUIDs in list order
    #[must_use]
    pub fn uuids(&self) -> Vec<String> {
        self.inner
            .lock()
            .items
            .iter()
            .map(|item| item.uuid.clone())
            .collect()
    }

    /// UUIDs currently marked as failed, in list order
    #[must_use]
    pub fn failed_uuids(&self) -> Vec<String> {
        self.inner
            .lock()
            .items
            .iter()
            .filter(|item| item.marked_as_failed)
            .map(|item| item.uuid.clone())
            .collect()
    }

    #[must_use]
    pub fn is_failed(&self, uuid: &str) -> bool {
        self.inner
            .lock()
            .items
            .iter()
            .any(|item| item.uuid == uuid && item.marked_as_failed)
    }
}

impl fmt::Display for UuidIterator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        f.write_str("[")?;
        for (i, item) in inner.items.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            f.write_str(&item.uuid)?;
            if item.marked_as_failed {
                f.write_str("(failed)")?;
            }
        }
        f.write_str("]")
    }
}

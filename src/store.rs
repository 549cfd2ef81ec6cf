use std::collections::HashMap;
use std::sync::RwLock;

use tracing::info;

use crate::error::StoreError;
use crate::model::EpochRecord;

/// Logical cache contract for the epoch dataset.
///
/// Keyed by epoch string. The abstraction exists so the engine never touches
/// a storage backend directly: the composition root injects one
/// implementation and the pipeline/engine share it as `Arc<dyn EpochStore>`.
/// `StoreError::Unavailable` means the backend itself is unreachable, which
/// is a different condition from an empty store or a missing key.
pub trait EpochStore: Send + Sync {
    /// Insert every record whose epoch key is not already present.
    /// Returns the number actually inserted. Safe to call repeatedly:
    /// re-inserting an existing key is a no-op, not an overwrite.
    fn put_if_absent(&self, records: Vec<EpochRecord>) -> Result<usize, StoreError>;

    /// Exact-key point lookup.
    fn get(&self, epoch: &str) -> Result<Option<EpochRecord>, StoreError>;

    /// Full listing in insertion order, so paging is deterministic.
    fn list_all(&self) -> Result<Vec<EpochRecord>, StoreError>;

    fn len(&self) -> Result<usize, StoreError>;

    fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.len()? == 0)
    }
}

#[derive(Default)]
struct Inner {
    // Insertion order alongside the key map; the feed arrives time-sorted
    // and /epochs paging must preserve that order.
    order: Vec<String>,
    records: HashMap<String, EpochRecord>,
}

/// In-memory store used for the single-process deployment profile.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl EpochStore for MemoryStore {
    fn put_if_absent(&self, records: Vec<EpochRecord>) -> Result<usize, StoreError> {
        let mut inner = self
            .inner
            .write()
            .map_err(|_| StoreError::Unavailable("poisoned lock".into()))?;

        let before = inner.records.len();
        for record in records {
            if inner.records.contains_key(&record.epoch) {
                continue;
            }
            inner.order.push(record.epoch.clone());
            inner.records.insert(record.epoch.clone(), record);
        }
        let inserted = inner.records.len() - before;

        if inserted > 0 {
            info!(inserted, total = inner.records.len(), "stored state vectors");
        }
        Ok(inserted)
    }

    fn get(&self, epoch: &str) -> Result<Option<EpochRecord>, StoreError> {
        let inner = self
            .inner
            .read()
            .map_err(|_| StoreError::Unavailable("poisoned lock".into()))?;
        Ok(inner.records.get(epoch).cloned())
    }

    fn list_all(&self) -> Result<Vec<EpochRecord>, StoreError> {
        let inner = self
            .inner
            .read()
            .map_err(|_| StoreError::Unavailable("poisoned lock".into()))?;
        // Clone out under a short read guard; callers never hold the lock.
        Ok(inner
            .order
            .iter()
            .filter_map(|key| inner.records.get(key).cloned())
            .collect())
    }

    fn len(&self) -> Result<usize, StoreError> {
        let inner = self
            .inner
            .read()
            .map_err(|_| StoreError::Unavailable("poisoned lock".into()))?;
        Ok(inner.records.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::test_util::record;

    fn batch() -> Vec<EpochRecord> {
        vec![
            record("2025-001T12:00:00.000Z", "7.0", "3.0", "5.0"),
            record("2025-002T12:00:00.000Z", "5.0", "2.0", "4.0"),
            record("2025-003T12:00:00.000Z", "6.0", "2.0", "6.0"),
        ]
    }

    #[test]
    fn put_if_absent_is_idempotent() {
        let store = MemoryStore::new();
        assert_eq!(store.put_if_absent(batch()).unwrap(), 3);
        // Second identical batch inserts nothing and overwrites nothing.
        assert_eq!(store.put_if_absent(batch()).unwrap(), 0);
        assert_eq!(store.len().unwrap(), 3);
    }

    #[test]
    fn duplicate_key_inside_one_batch_keeps_first() {
        let store = MemoryStore::new();
        let mut records = batch();
        records.push(record("2025-001T12:00:00.000Z", "9.9", "9.9", "9.9"));
        assert_eq!(store.put_if_absent(records).unwrap(), 3);

        let kept = store.get("2025-001T12:00:00.000Z").unwrap().unwrap();
        assert_eq!(kept.x_dot.value, "7.0");
    }

    #[test]
    fn listing_preserves_insertion_order() {
        let store = MemoryStore::new();
        store.put_if_absent(batch()).unwrap();
        let epochs: Vec<_> = store
            .list_all()
            .unwrap()
            .into_iter()
            .map(|r| r.epoch)
            .collect();
        assert_eq!(
            epochs,
            vec![
                "2025-001T12:00:00.000Z",
                "2025-002T12:00:00.000Z",
                "2025-003T12:00:00.000Z"
            ]
        );
    }

    #[test]
    fn get_missing_key_is_none_not_error() {
        let store = MemoryStore::new();
        store.put_if_absent(batch()).unwrap();
        assert_eq!(store.get("nonexistent").unwrap(), None);
    }
}

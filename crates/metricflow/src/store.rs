//! Sharded in-memory store backing the save stage.

use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Number of shards records are routed across.
pub const SHARD_COUNT: usize = 4;

/// In-memory record store with timestamp-derived keys.
///
/// Records are routed to one of [`SHARD_COUNT`] shards by their timestamp.
/// Keys derive from a monotonically-increasing timestamp: `item:<millis>`
/// for the first record of a millisecond, with a sequence suffix when a
/// *different* payload lands in the same millisecond. Re-saving an identical
/// payload overwrites the existing record, which keeps the save stage
/// idempotent under retry.
#[derive(Debug, Default)]
pub struct ShardedStore {
    shards: [Mutex<BTreeMap<String, Value>>; SHARD_COUNT],
}

impl ShardedStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn shard(&self, timestamp_millis: u64) -> MutexGuard<'_, BTreeMap<String, Value>> {
        let index = (timestamp_millis % SHARD_COUNT as u64) as usize;
        self.shards[index]
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Persists `value` under a key derived from `timestamp_millis` and
    /// returns that key.
    ///
    /// Identical payloads overwrite in place; distinct payloads colliding on
    /// the same millisecond get the next free sequence suffix.
    pub fn insert(&self, timestamp_millis: u64, value: &Value) -> String {
        let mut records = self.shard(timestamp_millis);
        let base = format!("item:{timestamp_millis}");
        let mut key = base.clone();
        let mut sequence = 0u64;
        loop {
            match records.get(&key) {
                Some(existing) if existing != value => {
                    sequence += 1;
                    key = format!("{base}:{sequence}");
                }
                _ => {
                    records.insert(key.clone(), value.clone());
                    return key;
                }
            }
        }
    }

    /// Returns the record stored under `key`, if any.
    pub fn get(&self, key: &str) -> Option<Value> {
        self.shards.iter().find_map(|shard| {
            shard
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .get(key)
                .cloned()
        })
    }

    /// Returns all records, ordered by key within each shard.
    pub fn records(&self) -> Vec<(String, Value)> {
        let mut all: Vec<(String, Value)> = self
            .shards
            .iter()
            .flat_map(|shard| {
                shard
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .iter()
                    .map(|(key, value)| (key.clone(), value.clone()))
                    .collect::<Vec<_>>()
            })
            .collect();
        all.sort_by(|a, b| a.0.cmp(&b.0));
        all
    }

    /// Returns the number of stored records.
    pub fn len(&self) -> usize {
        self.shards
            .iter()
            .map(|shard| shard.lock().unwrap_or_else(PoisonError::into_inner).len())
            .sum()
    }

    /// Returns `true` if no records are stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_insert_and_get() {
        let store = ShardedStore::new();
        let key = store.insert(1_000, &json!({"name": "Tani"}));
        assert_eq!(key, "item:1000");
        assert_eq!(store.get(&key), Some(json!({"name": "Tani"})));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_identical_payload_overwrites() {
        let store = ShardedStore::new();
        let first = store.insert(1_000, &json!({"score": 42}));
        let second = store.insert(1_000, &json!({"score": 42}));
        assert_eq!(first, second);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_distinct_payloads_get_distinct_keys() {
        let store = ShardedStore::new();
        let first = store.insert(1_000, &json!({"score": 1}));
        let second = store.insert(1_000, &json!({"score": 2}));
        let third = store.insert(1_000, &json!({"score": 3}));
        assert_eq!(first, "item:1000");
        assert_eq!(second, "item:1000:1");
        assert_eq!(third, "item:1000:2");
        assert_eq!(store.len(), 3);

        // re-saving the middle payload still overwrites its own record
        assert_eq!(store.insert(1_000, &json!({"score": 2})), "item:1000:1");
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn test_records_are_routed_across_shards() {
        let store = ShardedStore::new();
        for timestamp in 0..SHARD_COUNT as u64 {
            store.insert(timestamp, &json!({"t": timestamp}));
        }
        for (index, shard) in store.shards.iter().enumerate() {
            let records = shard.lock().unwrap_or_else(PoisonError::into_inner);
            assert_eq!(records.len(), 1, "shard {index} should hold one record");
        }
    }

    #[test]
    fn test_keys_are_monotonic() {
        let store = ShardedStore::new();
        let earlier = store.insert(1_000, &json!({"a": 1}));
        let later = store.insert(2_000, &json!({"b": 2}));
        assert!(earlier < later);
    }
}

//! In-memory backend
//!
//! [`MemStore`] keeps everything in a `BTreeMap` behind a
//! `parking_lot::RwLock`, so scans come out in key order for free. It is
//! the reference leaf backend: wrappers compose over it in tests and it
//! backs ephemeral deployments.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;

use mosaic_core::{
    naive_query_apply, BasicBatch, Batch, BatchingStore, Entry, Error, Key, PersistentStore, Query,
    Result, Results, Store,
};

/// Thread-safe in-memory store over an ordered map.
///
/// Cloning is cheap and clones share the same underlying map.
#[derive(Debug, Clone, Default)]
pub struct MemStore {
    data: Arc<RwLock<BTreeMap<Key, Vec<u8>>>>,
}

impl MemStore {
    /// Create an empty store.
    pub fn new() -> MemStore {
        MemStore::default()
    }

    /// Number of keys currently stored.
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    /// Whether the store holds no keys.
    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }
}

impl Store for MemStore {
    fn put(&self, key: &Key, value: Vec<u8>) -> Result<()> {
        self.data.write().insert(key.clone(), value);
        Ok(())
    }

    fn get(&self, key: &Key) -> Result<Vec<u8>> {
        self.data
            .read()
            .get(key)
            .cloned()
            .ok_or_else(|| Error::NotFound(key.clone()))
    }

    fn has(&self, key: &Key) -> Result<bool> {
        Ok(self.data.read().contains_key(key))
    }

    fn get_size(&self, key: &Key) -> Result<usize> {
        self.data
            .read()
            .get(key)
            .map(Vec::len)
            .ok_or_else(|| Error::NotFound(key.clone()))
    }

    fn delete(&self, key: &Key) -> Result<()> {
        self.data.write().remove(key);
        Ok(())
    }

    fn sync(&self, _prefix: &Key) -> Result<()> {
        Ok(())
    }

    fn query(&self, query: Query) -> Result<Results> {
        // Snapshot the matching entries under the read lock; the returned
        // stream owns its data and never touches the map again.
        let entries: Vec<Entry> = {
            let data = self.data.read();
            data.iter()
                .map(|(k, v)| Entry {
                    key: k.clone(),
                    value: (!query.keys_only).then(|| v.clone()),
                    expiration: None,
                    size: query.returns_sizes.then(|| v.len()),
                })
                .collect()
        };
        // The map iterates in ascending key order, so orderless queries
        // come out sorted anyway.
        Ok(naive_query_apply(
            query.clone(),
            Results::from_entries(query, entries),
        ))
    }

    fn close(&self) -> Result<()> {
        Ok(())
    }
}

impl BatchingStore for MemStore {
    fn batch(&self) -> Result<Box<dyn Batch>> {
        Ok(Box::new(BasicBatch::new(self.clone())))
    }
}

impl PersistentStore for MemStore {
    fn disk_usage(&self) -> Result<u64> {
        let data = self.data.read();
        let total = data
            .iter()
            .map(|(k, v)| (k.as_bytes().len() + v.len()) as u64)
            .sum();
        Ok(total)
    }
}

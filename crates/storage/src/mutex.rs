//! Coarse locking wrapper
//!
//! [`MutexStore`] serializes access to a child that is not itself
//! thread-safe: writes take the exclusive lock, reads the shared one.
//! Query results are materialized under the lock so the stream handed back
//! does not hold it.

use parking_lot::RwLock;

use mosaic_core::{Key, Query, Result, Results, Store};

/// Wraps a child store behind a reader-writer lock.
pub struct MutexStore<S> {
    child: RwLock<S>,
}

impl<S: Store> MutexStore<S> {
    /// Wrap `child`.
    pub fn new(child: S) -> MutexStore<S> {
        MutexStore {
            child: RwLock::new(child),
        }
    }
}

impl<S: Store> Store for MutexStore<S> {
    fn put(&self, key: &Key, value: Vec<u8>) -> Result<()> {
        self.child.write().put(key, value)
    }

    fn get(&self, key: &Key) -> Result<Vec<u8>> {
        self.child.read().get(key)
    }

    fn has(&self, key: &Key) -> Result<bool> {
        self.child.read().has(key)
    }

    fn get_size(&self, key: &Key) -> Result<usize> {
        self.child.read().get_size(key)
    }

    fn delete(&self, key: &Key) -> Result<()> {
        self.child.write().delete(key)
    }

    fn sync(&self, prefix: &Key) -> Result<()> {
        self.child.write().sync(prefix)
    }

    fn query(&self, query: Query) -> Result<Results> {
        let guard = self.child.read();
        let results = guard.query(query.clone())?;
        let entries = results.rest()?;
        Ok(Results::from_entries(query, entries))
    }

    fn close(&self) -> Result<()> {
        self.child.write().close()
    }
}

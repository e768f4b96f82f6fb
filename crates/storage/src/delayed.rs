//! Latency injection
//!
//! [`DelayedStore`] sleeps for a fixed duration before every operation.
//! Useful in tests that need a slow backend: pile it under a mount or an
//! autobatcher and observe how the composition behaves when one child
//! lags.

use std::time::Duration;

use mosaic_core::{Key, Query, Result, Results, Store};

/// A store that adds a fixed delay to every operation on its child.
pub struct DelayedStore<S> {
    child: S,
    delay: Duration,
}

impl<S: Store> DelayedStore<S> {
    /// Wrap `child`, sleeping `delay` before each operation.
    pub fn new(child: S, delay: Duration) -> DelayedStore<S> {
        DelayedStore { child, delay }
    }

    fn wait(&self) {
        std::thread::sleep(self.delay);
    }
}

impl<S: Store> Store for DelayedStore<S> {
    fn put(&self, key: &Key, value: Vec<u8>) -> Result<()> {
        self.wait();
        self.child.put(key, value)
    }

    fn get(&self, key: &Key) -> Result<Vec<u8>> {
        self.wait();
        self.child.get(key)
    }

    fn has(&self, key: &Key) -> Result<bool> {
        self.wait();
        self.child.has(key)
    }

    fn get_size(&self, key: &Key) -> Result<usize> {
        self.wait();
        self.child.get_size(key)
    }

    fn delete(&self, key: &Key) -> Result<()> {
        self.wait();
        self.child.delete(key)
    }

    fn sync(&self, prefix: &Key) -> Result<()> {
        self.wait();
        self.child.sync(prefix)
    }

    fn query(&self, query: Query) -> Result<Results> {
        self.wait();
        self.child.query(query)
    }

    fn close(&self) -> Result<()> {
        self.wait();
        self.child.close()
    }
}

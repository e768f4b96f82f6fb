//! Automatic write batching
//!
//! [`AutoBatchStore`] buffers puts and deletes in memory and flushes them
//! through the child's batch interface once the buffer reaches a
//! threshold. Reads consult the buffer first, so callers always see their
//! own writes. Durability is only as good as the last flush; `sync`,
//! `query` and `close` all flush before touching the child.

use std::collections::HashMap;

use parking_lot::Mutex;
use tracing::debug;

use mosaic_core::{Batch, BatchingStore, Error, Key, Query, Result, Results, Store};

enum PendingOp {
    Put(Vec<u8>),
    Delete,
}

/// Buffers writes and flushes them in batches of `max_pending`.
///
/// Operations on the same key coalesce in the buffer; only the latest
/// survives to the flush.
pub struct AutoBatchStore<S: BatchingStore> {
    child: S,
    max_pending: usize,
    pending: Mutex<HashMap<String, (Key, PendingOp)>>,
}

impl<S: BatchingStore> AutoBatchStore<S> {
    /// Wrap `child`, flushing whenever `max_pending` writes accumulate.
    pub fn new(child: S, max_pending: usize) -> AutoBatchStore<S> {
        AutoBatchStore {
            child,
            max_pending,
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// The wrapped store.
    pub fn child(&self) -> &S {
        &self.child
    }

    /// Write every buffered operation through a child batch.
    pub fn flush(&self) -> Result<()> {
        let mut pending = self.pending.lock();
        self.flush_locked(&mut pending)
    }

    // The buffer is cleared only once the child commit succeeds, so a
    // failed flush keeps every buffered write intact for retry.
    fn flush_locked(&self, pending: &mut HashMap<String, (Key, PendingOp)>) -> Result<()> {
        if pending.is_empty() {
            return Ok(());
        }
        debug!(ops = pending.len(), "flushing buffered writes");
        let mut batch = self.child.batch()?;
        for (key, op) in pending.values() {
            match op {
                PendingOp::Put(value) => batch.put(key, value.clone())?,
                PendingOp::Delete => batch.delete(key)?,
            }
        }
        batch.commit()?;
        pending.clear();
        Ok(())
    }
}

impl<S: BatchingStore> Store for AutoBatchStore<S> {
    fn put(&self, key: &Key, value: Vec<u8>) -> Result<()> {
        let mut pending = self.pending.lock();
        pending.insert(key.to_string(), (key.clone(), PendingOp::Put(value)));
        if pending.len() >= self.max_pending {
            self.flush_locked(&mut pending)
        } else {
            Ok(())
        }
    }

    fn get(&self, key: &Key) -> Result<Vec<u8>> {
        {
            let pending = self.pending.lock();
            match pending.get(&key.to_string()) {
                Some((_, PendingOp::Put(value))) => return Ok(value.clone()),
                Some((_, PendingOp::Delete)) => return Err(Error::NotFound(key.clone())),
                None => {}
            }
        }
        self.child.get(key)
    }

    fn has(&self, key: &Key) -> Result<bool> {
        {
            let pending = self.pending.lock();
            match pending.get(&key.to_string()) {
                Some((_, PendingOp::Put(_))) => return Ok(true),
                Some((_, PendingOp::Delete)) => return Ok(false),
                None => {}
            }
        }
        self.child.has(key)
    }

    fn get_size(&self, key: &Key) -> Result<usize> {
        {
            let pending = self.pending.lock();
            match pending.get(&key.to_string()) {
                Some((_, PendingOp::Put(value))) => return Ok(value.len()),
                Some((_, PendingOp::Delete)) => return Err(Error::NotFound(key.clone())),
                None => {}
            }
        }
        self.child.get_size(key)
    }

    /// A delete buffers like a put; the child sees it at the next flush,
    /// even for keys the child never held.
    fn delete(&self, key: &Key) -> Result<()> {
        let mut pending = self.pending.lock();
        pending.insert(key.to_string(), (key.clone(), PendingOp::Delete));
        if pending.len() >= self.max_pending {
            self.flush_locked(&mut pending)
        } else {
            Ok(())
        }
    }

    /// Flushes only the buffered writes at or under `prefix`, then syncs
    /// the child. Writes outside the subtree stay buffered.
    fn sync(&self, prefix: &Key) -> Result<()> {
        {
            let mut pending = self.pending.lock();
            let scoped: Vec<String> = pending
                .iter()
                .filter(|(_, (key, _))| key == prefix || prefix.is_ancestor_of(key))
                .map(|(s, _)| s.clone())
                .collect();
            if !scoped.is_empty() {
                debug!(ops = scoped.len(), prefix = %prefix, "flushing subtree");
                let mut batch = self.child.batch()?;
                for s in &scoped {
                    if let Some((key, op)) = pending.get(s) {
                        match op {
                            PendingOp::Put(value) => batch.put(key, value.clone())?,
                            PendingOp::Delete => batch.delete(key)?,
                        }
                    }
                }
                batch.commit()?;
                // Drop the flushed subset only after the commit lands.
                for s in &scoped {
                    pending.remove(s);
                }
            }
        }
        self.child.sync(prefix)
    }

    /// Flushes everything first; scanning the buffer alongside a live
    /// child stream is not worth the complexity.
    fn query(&self, query: Query) -> Result<Results> {
        self.flush()?;
        self.child.query(query)
    }

    fn close(&self) -> Result<()> {
        self.flush()?;
        self.child.close()
    }
}

impl<S: BatchingStore> BatchingStore for AutoBatchStore<S> {
    /// Explicit batches bypass the buffer and go straight to the child.
    fn batch(&self) -> Result<Box<dyn Batch>> {
        self.child.batch()
    }
}

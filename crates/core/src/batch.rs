//! Batched writes
//!
//! A [`Batch`] accumulates put/delete operations and commits them to a
//! target store as one unit. [`BasicBatch`] is the fallback for stores with
//! no underlying transactional support: it buffers the last operation per
//! key (keyed by the key's string form) and replays the set on commit.

use std::collections::HashMap;

use crate::error::Result;
use crate::key::Key;
use crate::traits::Store;

/// An accumulator of pending writes committed as one unit.
///
/// Nothing reaches the target store until [`Batch::commit`]. Repeated
/// operations on the same key collapse: the last write wins.
pub trait Batch: Send {
    /// Record a put.
    fn put(&mut self, key: &Key, value: Vec<u8>) -> Result<()>;

    /// Record a delete.
    fn delete(&mut self, key: &Key) -> Result<()>;

    /// Apply all recorded operations to the target store.
    fn commit(&mut self) -> Result<()>;
}

enum BatchOp {
    Put(Vec<u8>),
    Delete,
}

/// Buffering batch for stores without native transactional support.
///
/// Commit replays operations one by one and stops at the first failure, so
/// atomicity is best-effort only. Operations that were not applied remain
/// queued and a later commit retries them.
pub struct BasicBatch<S: Store> {
    ops: HashMap<String, (Key, BatchOp)>,
    target: S,
}

impl<S: Store> BasicBatch<S> {
    /// Create an empty batch against `target`.
    pub fn new(target: S) -> BasicBatch<S> {
        BasicBatch {
            ops: HashMap::new(),
            target,
        }
    }
}

impl<S: Store> Batch for BasicBatch<S> {
    fn put(&mut self, key: &Key, value: Vec<u8>) -> Result<()> {
        self.ops
            .insert(key.to_string(), (key.clone(), BatchOp::Put(value)));
        Ok(())
    }

    fn delete(&mut self, key: &Key) -> Result<()> {
        self.ops.insert(key.to_string(), (key.clone(), BatchOp::Delete));
        Ok(())
    }

    // Ops leave the set only once applied, so a failed commit can be
    // retried without losing the writes that had not reached the target.
    fn commit(&mut self) -> Result<()> {
        let keys: Vec<String> = self.ops.keys().cloned().collect();
        for k in keys {
            if let Some((key, op)) = self.ops.get(&k) {
                match op {
                    BatchOp::Put(value) => self.target.put(key, value.clone())?,
                    BatchOp::Delete => self.target.delete(key)?,
                }
            }
            self.ops.remove(&k);
        }
        Ok(())
    }
}

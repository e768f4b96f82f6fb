//! Store contract
//!
//! [`Store`] is the uniform key/value capability set every leaf backend and
//! composing wrapper implements. Extended capabilities (batching,
//! maintenance, disk accounting) are separate traits a store advertises
//! statically; composition points take them explicitly instead of
//! inspecting types at runtime.

use crate::batch::Batch;
use crate::error::Result;
use crate::key::Key;
use crate::query::Query;
use crate::results::Results;

/// Uniform key/value contract.
///
/// All methods must be safe to call concurrently from multiple threads
/// (requires `Send + Sync`). A store works with exactly one [`Key`] variant;
/// callers must not mix path and bytes keys on the same store.
pub trait Store: Send + Sync {
    /// Store the value under the key, replacing any previous value.
    fn put(&self, key: &Key, value: Vec<u8>) -> Result<()>;

    /// Retrieve the value stored under the key.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`](crate::Error::NotFound) when absent.
    fn get(&self, key: &Key) -> Result<Vec<u8>>;

    /// Whether a value exists under the key.
    fn has(&self, key: &Key) -> Result<bool> {
        match self.get(key) {
            Ok(_) => Ok(true),
            Err(err) if err.is_not_found() => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// Size in bytes of the value stored under the key.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`](crate::Error::NotFound) when absent.
    fn get_size(&self, key: &Key) -> Result<usize> {
        self.get(key).map(|v| v.len())
    }

    /// Remove the value stored under the key. Removing an absent key is
    /// not an error.
    fn delete(&self, key: &Key) -> Result<()>;

    /// Guarantee that writes under `prefix` (and `prefix` itself) are
    /// durably applied. Stores with no write buffering may no-op.
    fn sync(&self, prefix: &Key) -> Result<()>;

    /// Search the store. Ownership of the returned stream's resources
    /// passes to the caller until closed.
    fn query(&self, query: Query) -> Result<Results>;

    /// Release the store's resources.
    fn close(&self) -> Result<()>;
}

/// Capability: grouped writes committed as one unit.
pub trait BatchingStore: Store {
    /// Open a new batch session against this store.
    fn batch(&self) -> Result<Box<dyn Batch>>;
}

/// Capability: internal consistency verification.
pub trait CheckedStore: Store {
    /// Verify the store's integrity.
    fn check(&self) -> Result<()>;
}

/// Capability: repair of recoverable corruption.
pub trait ScrubbedStore: Store {
    /// Repair what can be repaired.
    fn scrub(&self) -> Result<()>;
}

/// Capability: reclamation of unused space.
pub trait GcStore: Store {
    /// Collect garbage.
    fn collect_garbage(&self) -> Result<()>;
}

/// Capability: disk accounting for persistent stores.
pub trait PersistentStore: Store {
    /// Space used on disk, in bytes.
    fn disk_usage(&self) -> Result<u64>;
}

impl<S: Store + ?Sized> Store for std::sync::Arc<S> {
    fn put(&self, key: &Key, value: Vec<u8>) -> Result<()> {
        (**self).put(key, value)
    }

    fn get(&self, key: &Key) -> Result<Vec<u8>> {
        (**self).get(key)
    }

    fn has(&self, key: &Key) -> Result<bool> {
        (**self).has(key)
    }

    fn get_size(&self, key: &Key) -> Result<usize> {
        (**self).get_size(key)
    }

    fn delete(&self, key: &Key) -> Result<()> {
        (**self).delete(key)
    }

    fn sync(&self, prefix: &Key) -> Result<()> {
        (**self).sync(prefix)
    }

    fn query(&self, query: Query) -> Result<Results> {
        (**self).query(query)
    }

    fn close(&self) -> Result<()> {
        (**self).close()
    }
}

//! Lazy activation
//!
//! [`LazyStore`] defers constructing its child until the first operation
//! needs it, and can deactivate (tear the child down) and reactivate on
//! demand. Activation runs at most once per active period even under
//! concurrent first use; operations in flight hold a shared lock, so
//! deactivation waits for them to drain.

use parking_lot::{RwLock, RwLockUpgradableReadGuard};
use tracing::debug;

use mosaic_core::{Error, Key, Query, Result, Results, Store};

/// Builds, inspects or tears down the optional child store slot.
pub type Action = Box<dyn Fn(&mut Option<Box<dyn Store>>) -> Result<()> + Send + Sync>;

struct LazyState {
    child: Option<Box<dyn Store>>,
    active: bool,
    closed: bool,
}

/// A store that materializes its child on first use.
///
/// The lifecycle is driven by four caller-supplied actions: `init` runs
/// once at construction, `activate` populates the child slot, `deactivate`
/// releases it, and `close` runs at shutdown.
pub struct LazyStore {
    state: RwLock<LazyState>,
    activate: Action,
    deactivate: Action,
    close: Action,
}

impl LazyStore {
    /// Create the store, running `init` once on the child slot. The store
    /// starts active if `init` populated the slot, inactive otherwise.
    pub fn new(
        init: Action,
        activate: Action,
        deactivate: Action,
        close: Action,
    ) -> Result<LazyStore> {
        let mut child = None;
        init(&mut child)?;
        let active = child.is_some();
        Ok(LazyStore {
            state: RwLock::new(LazyState {
                child,
                active,
                closed: false,
            }),
            activate,
            deactivate,
            close,
        })
    }

    /// Run `op` against the child, activating first if needed.
    ///
    /// The fast path takes only a shared lock. On the slow path the
    /// upgradable lock serializes racing activators; the winner runs the
    /// activation once and the rest observe `active` already set.
    fn with_child<T>(&self, op: impl FnOnce(&dyn Store) -> Result<T>) -> Result<T> {
        {
            let state = self.state.read();
            if state.closed {
                return Err(Error::Closed);
            }
            if state.active {
                if let Some(child) = state.child.as_deref() {
                    return op(child);
                }
            }
        }

        let mut state = self.state.upgradable_read();
        if state.closed {
            return Err(Error::Closed);
        }
        if !state.active {
            let mut write = RwLockUpgradableReadGuard::upgrade(state);
            debug!("activating child store");
            (self.activate)(&mut write.child)?;
            write.active = true;
            state = parking_lot::RwLockWriteGuard::downgrade_to_upgradable(write);
        }
        let read = RwLockUpgradableReadGuard::downgrade(state);
        match read.child.as_deref() {
            Some(child) => op(child),
            None => Err(Error::Store("activation produced no store".into())),
        }
    }

    /// Force activation without performing an operation.
    pub fn activate(&self) -> Result<()> {
        self.with_child(|_| Ok(()))
    }

    /// Whether the child is currently materialized.
    pub fn is_active(&self) -> bool {
        self.state.read().active
    }

    /// Tear the child down. Idempotent; the next operation reactivates.
    pub fn deactivate(&self) -> Result<()> {
        let mut state = self.state.write();
        if state.closed {
            return Err(Error::Closed);
        }
        if !state.active {
            return Ok(());
        }
        debug!("deactivating child store");
        (self.deactivate)(&mut state.child)?;
        state.active = false;
        Ok(())
    }
}

impl Store for LazyStore {
    fn put(&self, key: &Key, value: Vec<u8>) -> Result<()> {
        self.with_child(|c| c.put(key, value.clone()))
    }

    fn get(&self, key: &Key) -> Result<Vec<u8>> {
        self.with_child(|c| c.get(key))
    }

    fn has(&self, key: &Key) -> Result<bool> {
        self.with_child(|c| c.has(key))
    }

    fn get_size(&self, key: &Key) -> Result<usize> {
        self.with_child(|c| c.get_size(key))
    }

    fn delete(&self, key: &Key) -> Result<()> {
        self.with_child(|c| c.delete(key))
    }

    fn sync(&self, prefix: &Key) -> Result<()> {
        self.with_child(|c| c.sync(prefix))
    }

    fn query(&self, query: Query) -> Result<Results> {
        self.with_child(|c| c.query(query.clone()))
    }

    /// Terminal: runs the close action and rejects everything afterwards
    /// with [`Error::Closed`]. Closing twice is fine.
    fn close(&self) -> Result<()> {
        let mut state = self.state.write();
        if state.closed {
            return Ok(());
        }
        debug!("closing lazy store");
        (self.close)(&mut state.child)?;
        state.active = false;
        state.closed = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mem::MemStore;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn release() -> Action {
        Box::new(|slot| {
            *slot = None;
            Ok(())
        })
    }

    fn counting_lazy(activations: Arc<AtomicUsize>) -> LazyStore {
        LazyStore::new(
            Box::new(|_| Ok(())),
            Box::new(move |slot| {
                activations.fetch_add(1, Ordering::SeqCst);
                *slot = Some(Box::new(MemStore::new()));
                Ok(())
            }),
            release(),
            release(),
        )
        .unwrap()
    }

    #[test]
    fn test_activates_on_first_use() {
        let n = Arc::new(AtomicUsize::new(0));
        let lazy = counting_lazy(n.clone());
        assert!(!lazy.is_active());
        assert_eq!(n.load(Ordering::SeqCst), 0);
        lazy.put(&Key::path("/a"), b"v".to_vec()).unwrap();
        assert!(lazy.is_active());
        assert_eq!(n.load(Ordering::SeqCst), 1);
        // Further ops reuse the child.
        assert_eq!(lazy.get(&Key::path("/a")).unwrap(), b"v");
        assert_eq!(n.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_init_can_start_active() {
        let lazy = LazyStore::new(
            Box::new(|slot| {
                *slot = Some(Box::new(MemStore::new()));
                Ok(())
            }),
            Box::new(|_| Err(Error::Store("activate should not run".into()))),
            release(),
            release(),
        )
        .unwrap();
        assert!(lazy.is_active());
        lazy.put(&Key::path("/a"), b"v".to_vec()).unwrap();
    }

    #[test]
    fn test_explicit_activate() {
        let n = Arc::new(AtomicUsize::new(0));
        let lazy = counting_lazy(n.clone());
        lazy.activate().unwrap();
        assert!(lazy.is_active());
        lazy.activate().unwrap();
        assert_eq!(n.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_deactivate_then_reactivate() {
        let n = Arc::new(AtomicUsize::new(0));
        let lazy = counting_lazy(n.clone());
        lazy.put(&Key::path("/a"), b"v".to_vec()).unwrap();
        lazy.deactivate().unwrap();
        assert!(!lazy.is_active());
        // Deactivating again is a no-op.
        lazy.deactivate().unwrap();
        // The fresh child starts empty.
        assert!(!lazy.has(&Key::path("/a")).unwrap());
        assert_eq!(n.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_concurrent_first_use_activates_once() {
        let n = Arc::new(AtomicUsize::new(0));
        let lazy = Arc::new(counting_lazy(n.clone()));
        let mut handles = Vec::new();
        for i in 0..8 {
            let lazy = lazy.clone();
            handles.push(std::thread::spawn(move || {
                lazy.put(&Key::path(&format!("/{i}")), b"v".to_vec()).unwrap();
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(n.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_close_is_terminal() {
        let closes = Arc::new(AtomicUsize::new(0));
        let counter = closes.clone();
        let lazy = LazyStore::new(
            Box::new(|_| Ok(())),
            Box::new(|slot| {
                *slot = Some(Box::new(MemStore::new()));
                Ok(())
            }),
            release(),
            Box::new(move |slot| {
                counter.fetch_add(1, Ordering::SeqCst);
                *slot = None;
                Ok(())
            }),
        )
        .unwrap();
        lazy.put(&Key::path("/a"), b"v".to_vec()).unwrap();
        lazy.close().unwrap();
        assert!(matches!(lazy.get(&Key::path("/a")), Err(Error::Closed)));
        assert!(matches!(lazy.deactivate(), Err(Error::Closed)));
        assert!(matches!(lazy.activate(), Err(Error::Closed)));
        // Closing twice runs the close action only once.
        lazy.close().unwrap();
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_activation_failure_propagates_and_retries() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = attempts.clone();
        let lazy = LazyStore::new(
            Box::new(|_| Ok(())),
            Box::new(move |slot| {
                if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                    return Err(Error::Store("backend offline".into()));
                }
                *slot = Some(Box::new(MemStore::new()));
                Ok(())
            }),
            release(),
            release(),
        )
        .unwrap();
        assert!(lazy.get(&Key::path("/a")).is_err());
        assert!(!lazy.is_active());
        // The next use retries the activation.
        lazy.put(&Key::path("/a"), b"v".to_vec()).unwrap();
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }
}

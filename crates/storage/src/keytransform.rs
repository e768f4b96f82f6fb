//! Key-space remapping
//!
//! [`TransformStore`] wraps a child store behind an invertible key mapping:
//! keys are converted on the way in and inverted on the way out, so callers
//! see one key space while the child sees another. [`PrefixTransform`] is
//! the common case, pushing the whole key space under a namespace prefix;
//! see [`crate::namespace`] for the convenience constructor.

use std::sync::Arc;

use mosaic_core::{
    naive_query_apply, Batch, BatchingStore, EntrySource, Entry, Key, Query, Result, Results, Store,
};

/// An invertible key mapping.
///
/// `invert(convert(k))` must equal `k` for every key the caller uses, and
/// the mapping must preserve the ancestor relation so prefix queries can be
/// pushed down to the child.
pub trait KeyTransform: Send + Sync {
    /// Map a caller key to the child's key space.
    fn convert(&self, key: &Key) -> Key;

    /// Map a child key back to the caller's key space.
    fn invert(&self, key: &Key) -> Key;
}

/// A transform assembled from a pair of closures.
#[derive(Clone)]
pub struct TransformPair {
    /// Forward mapping.
    pub convert: Arc<dyn Fn(&Key) -> Key + Send + Sync>,
    /// Inverse mapping.
    pub invert: Arc<dyn Fn(&Key) -> Key + Send + Sync>,
}

impl KeyTransform for TransformPair {
    fn convert(&self, key: &Key) -> Key {
        (self.convert)(key)
    }

    fn invert(&self, key: &Key) -> Key {
        (self.invert)(key)
    }
}

/// Adds or removes a fixed prefix.
///
/// Inverting a key that does not live under the prefix panics: that key
/// cannot have been produced by this transform, and mapping it anywhere
/// would hide data inconsistency.
#[derive(Debug, Clone)]
pub struct PrefixTransform {
    /// The namespace prefix to prepend.
    pub prefix: Key,
}

impl KeyTransform for PrefixTransform {
    fn convert(&self, key: &Key) -> Key {
        self.prefix.child(key)
    }

    fn invert(&self, key: &Key) -> Key {
        if self.prefix.is_root() {
            return key.clone();
        }
        if !self.prefix.is_ancestor_of(key) {
            panic!("expected prefix {} not found in {key}", self.prefix);
        }
        key.trim_prefix(&self.prefix)
    }
}

/// A store whose key space is remapped through a [`KeyTransform`].
pub struct TransformStore<S> {
    child: S,
    transform: Arc<dyn KeyTransform>,
}

impl<S: Store> TransformStore<S> {
    /// Wrap `child` behind `transform`.
    pub fn new(child: S, transform: Arc<dyn KeyTransform>) -> TransformStore<S> {
        TransformStore { child, transform }
    }

    /// The wrapped store.
    pub fn child(&self) -> &S {
        &self.child
    }
}

impl<S: Store> Store for TransformStore<S> {
    fn put(&self, key: &Key, value: Vec<u8>) -> Result<()> {
        self.child.put(&self.transform.convert(key), value)
    }

    fn get(&self, key: &Key) -> Result<Vec<u8>> {
        self.child.get(&self.transform.convert(key))
    }

    fn has(&self, key: &Key) -> Result<bool> {
        self.child.has(&self.transform.convert(key))
    }

    fn get_size(&self, key: &Key) -> Result<usize> {
        self.child.get_size(&self.transform.convert(key))
    }

    fn delete(&self, key: &Key) -> Result<()> {
        self.child.delete(&self.transform.convert(key))
    }

    fn sync(&self, prefix: &Key) -> Result<()> {
        self.child.sync(&self.transform.convert(prefix))
    }

    fn query(&self, query: Query) -> Result<Results> {
        // Push only the converted prefix and the field flags down to the
        // child; filters and orders reference caller keys, so they run
        // after inversion.
        let prefix = query.prefix.clone().unwrap_or_else(Key::root);
        let child_query = Query {
            prefix: Some(self.transform.convert(&prefix)),
            keys_only: query.keys_only,
            returns_sizes: query.returns_sizes,
            return_expirations: query.return_expirations,
            ..Query::default()
        };
        let child_results = self.child.query(child_query)?;
        let inverted = Results::from_source(
            query.clone(),
            InvertSource {
                inner: child_results,
                transform: self.transform.clone(),
            },
        );
        let rest = Query {
            prefix: None,
            ..query
        };
        Ok(naive_query_apply(rest, inverted))
    }

    fn close(&self) -> Result<()> {
        self.child.close()
    }
}

struct InvertSource {
    inner: Results,
    transform: Arc<dyn KeyTransform>,
}

impl EntrySource for InvertSource {
    fn next_entry(&mut self) -> Option<Result<Entry>> {
        match self.inner.next_entry() {
            Some(Ok(mut entry)) => {
                entry.key = self.transform.invert(&entry.key);
                Some(Ok(entry))
            }
            other => other,
        }
    }

    fn close_source(&mut self) -> Result<()> {
        self.inner.close()
    }
}

impl<S: BatchingStore> BatchingStore for TransformStore<S> {
    fn batch(&self) -> Result<Box<dyn Batch>> {
        Ok(Box::new(TransformBatch {
            inner: self.child.batch()?,
            transform: self.transform.clone(),
        }))
    }
}

struct TransformBatch {
    inner: Box<dyn Batch>,
    transform: Arc<dyn KeyTransform>,
}

impl Batch for TransformBatch {
    fn put(&mut self, key: &Key, value: Vec<u8>) -> Result<()> {
        self.inner.put(&self.transform.convert(key), value)
    }

    fn delete(&mut self, key: &Key) -> Result<()> {
        self.inner.delete(&self.transform.convert(key))
    }

    fn commit(&mut self) -> Result<()> {
        self.inner.commit()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mem::MemStore;

    fn prefixed(prefix: &str) -> (TransformStore<MemStore>, MemStore) {
        let child = MemStore::new();
        let store = TransformStore::new(
            child.clone(),
            Arc::new(PrefixTransform { prefix: Key::path(prefix) }),
        );
        (store, child)
    }

    #[test]
    fn test_keys_land_under_prefix() {
        let (store, child) = prefixed("/ns");
        store.put(&Key::path("/a"), b"v".to_vec()).unwrap();
        assert_eq!(child.get(&Key::path("/ns/a")).unwrap(), b"v");
        assert_eq!(store.get(&Key::path("/a")).unwrap(), b"v");
        assert!(!child.has(&Key::path("/a")).unwrap());
    }

    #[test]
    fn test_query_inverts_keys() {
        let (store, _child) = prefixed("/ns");
        for k in ["/a", "/b/c"] {
            store.put(&Key::path(k), b"v".to_vec()).unwrap();
        }
        let keys = store.query(Query::default()).unwrap().rest_keys().unwrap();
        assert_eq!(keys, vec![Key::path("/a"), Key::path("/b/c")]);

        let keys = store
            .query(Query::with_prefix(Key::path("/b")))
            .unwrap()
            .rest_keys()
            .unwrap();
        assert_eq!(keys, vec![Key::path("/b/c")]);
    }

    #[test]
    fn test_pagination_applies_after_inversion() {
        let (store, _child) = prefixed("/ns");
        for k in ["/a", "/b", "/c"] {
            store.put(&Key::path(k), b"v".to_vec()).unwrap();
        }
        let q = Query {
            offset: 1,
            limit: 1,
            orders: vec![mosaic_core::Order::ByKey],
            ..Query::default()
        };
        let keys = store.query(q).unwrap().rest_keys().unwrap();
        assert_eq!(keys, vec![Key::path("/b")]);
    }

    #[test]
    fn test_batch_converts_keys() {
        let (store, child) = prefixed("/ns");
        let mut b = store.batch().unwrap();
        b.put(&Key::path("/a"), b"v".to_vec()).unwrap();
        b.commit().unwrap();
        assert!(child.has(&Key::path("/ns/a")).unwrap());
    }

    #[test]
    #[should_panic(expected = "expected prefix")]
    fn test_invert_outside_prefix_panics() {
        let t = PrefixTransform { prefix: Key::path("/ns") };
        let _ = t.invert(&Key::path("/other/a"));
    }

    #[test]
    fn test_transform_pair_roundtrip() {
        let pair = TransformPair {
            convert: Arc::new(|k: &Key| Key::path("/wrapped").child(k)),
            invert: Arc::new(|k: &Key| k.trim_prefix(&Key::path("/wrapped"))),
        };
        let k = Key::path("/x/y");
        assert_eq!(pair.invert(&pair.convert(&k)), k);
    }

    proptest::proptest! {
        #[test]
        fn prop_prefix_transform_invertible(
            prefix in "[a-z]{1,4}(/[a-z]{1,4}){0,2}",
            key in "[a-z]{1,4}(/[a-z]{1,4}){0,2}",
        ) {
            let t = PrefixTransform { prefix: Key::path(&prefix) };
            let k = Key::path(&key);
            proptest::prop_assert_eq!(t.invert(&t.convert(&k)), k);
        }
    }
}

//! Namespace wrapper
//!
//! Prefixes every key of a wrapped store, e.g. a store wrapped under
//! `/app` stores caller key `/a/b` at `/app/a/b`.

use std::sync::Arc;

use mosaic_core::{Key, Store};

use crate::keytransform::{PrefixTransform, TransformStore};

/// Wrap `child` so that all of its keys live under `prefix`.
pub fn wrap<S: Store>(prefix: Key, child: S) -> TransformStore<S> {
    TransformStore::new(child, Arc::new(PrefixTransform { prefix }))
}

//! Mosaic - composable key/value storage layer
//!
//! Mosaic models storage as a small `Store` contract plus wrappers that
//! compose over it: mount tables routing a shared key space across
//! independent backends, namespaces remapping keys, automatic write
//! batching, and lazy activation.
//!
//! # Quick Start
//!
//! ```
//! use mosaic::{Key, MemStore, Store};
//!
//! let store = MemStore::new();
//! store.put(&Key::path("/users/123"), b"alice".to_vec())?;
//! let value = store.get(&Key::path("/users/123"))?;
//! assert_eq!(value, b"alice");
//! # mosaic::Result::Ok(())
//! ```
//!
//! # Architecture
//!
//! The `mosaic-core` crate holds the vocabulary ([`Key`], [`Query`],
//! [`Results`], the [`Store`] trait family and errors); `mosaic-storage`
//! holds the backends and wrappers. This facade re-exports both.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub use mosaic_core::*;
pub use mosaic_storage::{
    namespace, Action, AutoBatchStore, DelayedStore, KeyTransform, LazyStore, MemStore, Mount,
    MountStore, MountedStore, MutexStore, PrefixTransform, TransformPair, TransformStore,
};

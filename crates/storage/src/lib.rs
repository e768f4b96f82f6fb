//! Storage backends and composition wrappers for mosaic.
//!
//! This crate provides the concrete stores that implement the
//! [`mosaic_core::Store`] contract:
//!
//! - [`MemStore`]: ordered in-memory backend
//! - [`MountStore`]: composite routing over prefix-mounted children
//! - [`TransformStore`] / [`namespace`]: key-space remapping
//! - [`AutoBatchStore`]: threshold-flushed write buffering
//! - [`LazyStore`]: on-demand child activation
//! - [`MutexStore`], [`DelayedStore`]: locking and latency shims
//!
//! Wrappers compose freely since every one of them is itself a `Store`.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod autobatch;
pub mod delayed;
pub mod keytransform;
pub mod lazy;
pub mod mem;
pub mod mount;
pub mod mutex;
pub mod namespace;

pub use autobatch::AutoBatchStore;
pub use delayed::DelayedStore;
pub use keytransform::{KeyTransform, PrefixTransform, TransformPair, TransformStore};
pub use lazy::{Action, LazyStore};
pub use mem::MemStore;
pub use mount::{Mount, MountStore, MountedStore};
pub use mutex::MutexStore;

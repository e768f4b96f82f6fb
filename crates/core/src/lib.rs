//! Core types and traits for mosaic
//!
//! This crate defines the foundational vocabulary of the storage layer:
//! - Key: immutable hierarchical or flat identifier with total ordering
//!   and prefix relations
//! - Query/Filter/Order: declarative request model
//! - Results: lazy, closable result streams
//! - Naive evaluator: reference query semantics over arbitrary streams
//! - Store and capability traits: the contract every backend satisfies
//! - Batch: grouped writes committed as one unit
//! - Error: error type hierarchy with recoverable aggregation

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod batch;
pub mod error;
pub mod key;
pub mod naive;
pub mod query;
pub mod results;
pub mod traits;

// Re-export commonly used types and traits
pub use batch::{BasicBatch, Batch};
pub use error::{AggregateError, Error, Result};
pub use key::{compare, join, Key, KeyType};
pub use naive::{
    naive_filter, naive_limit, naive_offset, naive_order, naive_prefix, naive_query_apply,
};
pub use query::{
    compare_with_orders, sort_entries, CompareOp, Entry, Filter, FilterFn, Order, OrderFn, Query,
};
pub use results::{EntrySource, ResultBuilder, Results};
pub use traits::{
    BatchingStore, CheckedStore, GcStore, PersistentStore, ScrubbedStore, Store,
};

//! Error types for mosaic stores
//!
//! One taxonomy shared by every store and wrapper. We use `thiserror` for
//! automatic `Display` and `Error` trait implementations.
//!
//! Fan-out operations (mount sync/close/maintenance, composite batch commit)
//! never stop early: each per-store failure is tagged with the mount prefix
//! it came from and the whole set is surfaced as one [`AggregateError`] whose
//! causes remain individually recoverable.

use std::fmt;

use thiserror::Error;

use crate::key::Key;

/// Result type alias for mosaic operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for mosaic stores.
#[derive(Debug, Error)]
pub enum Error {
    /// Key absent from the store. Surfaced by get/get_size, never by delete.
    #[error("key not found: {0}")]
    NotFound(Key),

    /// Write routed to a key no mounted store covers.
    #[error("no store mounted for key: {0}")]
    NoMount(Key),

    /// Batch requested on a store without batch support.
    #[error("batching not supported")]
    BatchUnsupported,

    /// Operation on a store that has been closed.
    #[error("store closed")]
    Closed,

    /// A failure attributed to the store mounted at `prefix`.
    #[error("store at {prefix}: {source}")]
    Mount {
        /// The mount prefix identifying the failing store.
        prefix: String,
        /// The underlying failure.
        #[source]
        source: Box<Error>,
    },

    /// Multiple per-store failures from one fan-out operation.
    #[error(transparent)]
    Aggregate(AggregateError),

    /// I/O error from a leaf backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Backend-specific failure that has no structured mapping.
    #[error("store error: {0}")]
    Store(String),
}

impl Error {
    /// Whether this error is a key-absence condition.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }

    /// Tag `err` with the mount prefix it came from.
    pub fn at_mount(prefix: &Key, err: Error) -> Error {
        Error::Mount {
            prefix: prefix.to_string(),
            source: Box::new(err),
        }
    }

    /// Combine per-store failures from a fan-out operation.
    ///
    /// Returns `None` for an empty set, the error itself for a single
    /// failure, and an [`AggregateError`] otherwise.
    pub fn aggregate(mut errors: Vec<Error>) -> Option<Error> {
        match errors.len() {
            0 => None,
            1 => errors.pop(),
            _ => Some(Error::Aggregate(AggregateError { errors })),
        }
    }

    /// Turn an aggregated failure set into a `Result`.
    pub fn aggregate_result(errors: Vec<Error>) -> Result<()> {
        match Error::aggregate(errors) {
            None => Ok(()),
            Some(err) => Err(err),
        }
    }
}

/// A set of failures collected by a fan-out operation.
///
/// The individual causes stay recoverable through [`AggregateError::causes`];
/// `Display` joins their messages.
#[derive(Debug)]
pub struct AggregateError {
    errors: Vec<Error>,
}

impl AggregateError {
    /// The underlying failures, in the order the stores were visited.
    pub fn causes(&self) -> &[Error] {
        &self.errors
    }
}

impl fmt::Display for AggregateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} errors occurred: ", self.errors.len())?;
        for (i, err) in self.errors.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{err}")?;
        }
        Ok(())
    }
}

impl std::error::Error for AggregateError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_display() {
        let err = Error::NotFound(Key::path("/a/b"));
        assert!(err.to_string().contains("key not found"));
        assert!(err.to_string().contains("/a/b"));
        assert!(err.is_not_found());
    }

    #[test]
    fn test_mount_tag_preserves_source() {
        let err = Error::at_mount(&Key::path("/foo"), Error::Closed);
        assert!(err.to_string().contains("/foo"));
        assert!(err.to_string().contains("store closed"));
        match err {
            Error::Mount { prefix, source } => {
                assert_eq!(prefix, "/foo");
                assert!(matches!(*source, Error::Closed));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_aggregate_empty_and_single() {
        assert!(Error::aggregate(vec![]).is_none());
        let single = Error::aggregate(vec![Error::Closed]).unwrap();
        assert!(matches!(single, Error::Closed));
    }

    #[test]
    fn test_aggregate_recovers_causes() {
        let err = Error::aggregate(vec![
            Error::at_mount(&Key::path("/a"), Error::Closed),
            Error::at_mount(&Key::path("/b"), Error::BatchUnsupported),
        ])
        .unwrap();
        match err {
            Error::Aggregate(agg) => {
                assert_eq!(agg.causes().len(), 2);
                assert!(agg.to_string().contains("/a"));
                assert!(agg.to_string().contains("/b"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}

//! Lazy result streams
//!
//! A [`Results`] is a forward-only, single-pass, finite sequence of query
//! entries with an explicit close operation. The contract every constructor
//! satisfies:
//!
//! - iteration is lazy and never restarts;
//! - once the stream yields an error, iteration stops permanently;
//! - [`Results::close`] is idempotent and must run exactly once, either by
//!   the consumer, by a draining helper such as [`Results::rest`], or by the
//!   `Drop` guard.
//!
//! Streams can be built from a static entry collection, from any hand-rolled
//! [`EntrySource`], or from a push-style producer through [`ResultBuilder`];
//! the three are observably equivalent to the consumer.

use std::sync::mpsc::{sync_channel, Receiver, SyncSender};

use crate::error::Result;
use crate::query::{Entry, Query};

/// Producer side of a result stream: a `next`/`close` pair.
///
/// `next_entry` returns `None` when the sequence is exhausted. After an
/// `Err` item the wrapping [`Results`] never calls `next_entry` again.
pub trait EntrySource: Send {
    /// Pull the next entry.
    fn next_entry(&mut self) -> Option<Result<Entry>>;

    /// Release underlying resources. Called at most once by [`Results`].
    fn close_source(&mut self) -> Result<()> {
        Ok(())
    }
}

/// A lazy, closable stream of query entries.
///
/// The issuing query call transfers ownership of the stream's resources to
/// the caller until closed. Iterate via [`Iterator`] or [`Results::next_entry`].
pub struct Results {
    query: Query,
    source: Box<dyn EntrySource>,
    done: bool,
    closed: bool,
}

impl Results {
    /// Stream over a hand-rolled source.
    pub fn from_source(query: Query, source: impl EntrySource + 'static) -> Results {
        Results {
            query,
            source: Box::new(source),
            done: false,
            closed: false,
        }
    }

    /// Stream over a static entry collection.
    pub fn from_entries(query: Query, entries: Vec<Entry>) -> Results {
        Results::from_source(query, VecSource { iter: entries.into_iter() })
    }

    /// The query this stream answers.
    pub fn query(&self) -> &Query {
        &self.query
    }

    /// Pull the next entry; `None` once exhausted, closed, or after an
    /// error has been yielded.
    pub fn next_entry(&mut self) -> Option<Result<Entry>> {
        if self.done || self.closed {
            return None;
        }
        match self.source.next_entry() {
            Some(Ok(entry)) => Some(Ok(entry)),
            Some(Err(err)) => {
                self.done = true;
                Some(Err(err))
            }
            None => {
                self.done = true;
                None
            }
        }
    }

    /// Release the stream's resources. Safe to call multiple times.
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.source.close_source()
    }

    /// Drain the stream to completion and close it, returning all entries
    /// or the first error encountered.
    pub fn rest(mut self) -> Result<Vec<Entry>> {
        let mut out = Vec::new();
        let mut failure = None;
        while let Some(item) = self.next_entry() {
            match item {
                Ok(entry) => out.push(entry),
                Err(err) => {
                    failure = Some(err);
                    break;
                }
            }
        }
        let close_result = self.close();
        match failure {
            Some(err) => Err(err),
            None => {
                close_result?;
                Ok(out)
            }
        }
    }

    /// Drain to completion, returning only the keys.
    pub fn rest_keys(self) -> Result<Vec<crate::key::Key>> {
        Ok(self.rest()?.into_iter().map(|e| e.key).collect())
    }
}

impl Iterator for Results {
    type Item = Result<Entry>;

    fn next(&mut self) -> Option<Result<Entry>> {
        self.next_entry()
    }
}

impl Drop for Results {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

impl std::fmt::Debug for Results {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Results")
            .field("query", &self.query)
            .field("done", &self.done)
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

// A Results can itself feed another stream, which is how the naive
// combinators stack.
impl EntrySource for Results {
    fn next_entry(&mut self) -> Option<Result<Entry>> {
        Results::next_entry(self)
    }

    fn close_source(&mut self) -> Result<()> {
        self.close()
    }
}

struct VecSource {
    iter: std::vec::IntoIter<Entry>,
}

impl EntrySource for VecSource {
    fn next_entry(&mut self) -> Option<Result<Entry>> {
        self.iter.next().map(Ok)
    }
}

/// Push side of an asynchronous producer feeding a bounded queue.
///
/// Dropping the builder ends the stream; [`ResultBuilder::send`] returns
/// `false` once the consumer has closed its end.
pub struct ResultBuilder {
    tx: SyncSender<Result<Entry>>,
}

impl ResultBuilder {
    /// Create a builder and the stream it feeds. `capacity` bounds the
    /// number of in-flight entries between producer and consumer.
    pub fn new(query: Query, capacity: usize) -> (ResultBuilder, Results) {
        let (tx, rx) = sync_channel(capacity.max(1));
        let results = Results::from_source(query, ChannelSource { rx: Some(rx) });
        (ResultBuilder { tx }, results)
    }

    /// Push one item, blocking while the queue is full. Returns `false`
    /// when the consuming stream has been closed.
    pub fn send(&self, item: Result<Entry>) -> bool {
        self.tx.send(item).is_ok()
    }
}

struct ChannelSource {
    rx: Option<Receiver<Result<Entry>>>,
}

impl EntrySource for ChannelSource {
    fn next_entry(&mut self) -> Option<Result<Entry>> {
        // A recv error means every producer hung up: end of stream.
        self.rx.as_ref().and_then(|rx| rx.recv().ok())
    }

    fn close_source(&mut self) -> Result<()> {
        // Dropping the receiver unblocks producers; their sends fail.
        self.rx = None;
        Ok(())
    }
}

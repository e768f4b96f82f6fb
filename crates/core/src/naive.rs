//! Naive query evaluation
//!
//! Reference implementation of the query semantics over an arbitrary entry
//! stream: prefix scoping, then filters, then orders, then offset, then
//! limit. Backends without native indexing run their raw scans through
//! [`naive_query_apply`]; tests use it as the correctness oracle for
//! composite stores.
//!
//! Every combinator is lazy except ordering, which must materialize the
//! stream. When materialization hits an error, the sorted entries collected
//! so far are yielded followed by that error, preserving the error-terminal
//! contract.

use crate::error::{Error, Result};
use crate::key::Key;
use crate::query::{sort_entries, Entry, Filter, Order, Query};
use crate::results::{EntrySource, Results};

/// Lazily drop entries that fail the filter.
pub fn naive_filter(results: Results, filter: Filter) -> Results {
    let query = results.query().clone();
    Results::from_source(query, FilterSource { inner: results, filter })
}

struct FilterSource {
    inner: Results,
    filter: Filter,
}

impl EntrySource for FilterSource {
    fn next_entry(&mut self) -> Option<Result<Entry>> {
        loop {
            match self.inner.next_entry() {
                Some(Ok(entry)) if !self.filter.matches(&entry) => continue,
                other => return other,
            }
        }
    }

    fn close_source(&mut self) -> Result<()> {
        self.inner.close()
    }
}

/// Scope the stream to strict descendants of `prefix`. The root prefix
/// passes everything through.
pub fn naive_prefix(results: Results, prefix: Key) -> Results {
    if prefix.is_root() {
        return results;
    }
    naive_filter(results, Filter::KeyPrefix(prefix))
}

/// Materialize and stable-sort the stream under the order cascade. With no
/// orders the stream is returned untouched.
pub fn naive_order(mut results: Results, orders: Vec<Order>) -> Results {
    if orders.is_empty() {
        return results;
    }
    let query = results.query().clone();
    let mut entries = Vec::new();
    let mut failure: Option<Error> = None;
    while let Some(item) = results.next_entry() {
        match item {
            Ok(entry) => entries.push(entry),
            Err(err) => {
                failure = Some(err);
                break;
            }
        }
    }
    if let Err(err) = results.close() {
        failure.get_or_insert(err);
    }
    sort_entries(&orders, &mut entries);
    Results::from_source(
        query,
        SortedSource { entries: entries.into_iter(), trailing: failure },
    )
}

struct SortedSource {
    entries: std::vec::IntoIter<Entry>,
    trailing: Option<Error>,
}

impl EntrySource for SortedSource {
    fn next_entry(&mut self) -> Option<Result<Entry>> {
        match self.entries.next() {
            Some(entry) => Some(Ok(entry)),
            None => self.trailing.take().map(Err),
        }
    }
}

/// Lazily skip the first `offset` entries.
pub fn naive_offset(results: Results, offset: usize) -> Results {
    let query = results.query().clone();
    Results::from_source(query, OffsetSource { inner: results, remaining: offset })
}

struct OffsetSource {
    inner: Results,
    remaining: usize,
}

impl EntrySource for OffsetSource {
    fn next_entry(&mut self) -> Option<Result<Entry>> {
        while self.remaining > 0 {
            match self.inner.next_entry() {
                Some(Ok(_)) => self.remaining -= 1,
                other => return other,
            }
        }
        self.inner.next_entry()
    }

    fn close_source(&mut self) -> Result<()> {
        self.inner.close()
    }
}

/// Lazily stop after `limit` entries; `0` means unlimited.
pub fn naive_limit(results: Results, limit: usize) -> Results {
    let query = results.query().clone();
    Results::from_source(query, LimitSource { inner: results, remaining: limit, unlimited: limit == 0 })
}

struct LimitSource {
    inner: Results,
    remaining: usize,
    unlimited: bool,
}

impl EntrySource for LimitSource {
    fn next_entry(&mut self) -> Option<Result<Entry>> {
        if self.unlimited {
            return self.inner.next_entry();
        }
        if self.remaining == 0 {
            return None;
        }
        let item = self.inner.next_entry();
        if matches!(item, Some(Ok(_))) {
            self.remaining -= 1;
        }
        item
    }

    fn close_source(&mut self) -> Result<()> {
        self.inner.close()
    }
}

/// Apply a whole query to an arbitrary, possibly unordered entry stream:
/// prefix → filters → orders → offset → limit, in that fixed order.
pub fn naive_query_apply(query: Query, results: Results) -> Results {
    let mut out = results;
    if let Some(prefix) = query.prefix {
        out = naive_prefix(out, prefix);
    }
    for filter in query.filters {
        out = naive_filter(out, filter);
    }
    out = naive_order(out, query.orders);
    if query.offset > 0 {
        out = naive_offset(out, query.offset);
    }
    if query.limit > 0 {
        out = naive_limit(out, query.limit);
    }
    out
}

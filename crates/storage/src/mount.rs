//! Mount composite store
//!
//! [`MountStore`] presents many independently-owned stores as one key
//! space. Each child is mounted at a prefix; a key lives in the store with
//! the most specific prefix that is an ancestor of (or equal to) the key.
//! Given stores mounted at `/`, `/foo` and `/foo/bar`:
//!
//! - `/foo/bar/baz` lives under `/foo/bar`
//! - `/foo/baz` lives under `/foo`
//! - `/foobar`, `/baz` live under `/`
//!
//! A more specific mount masks keys the less specific store may hold under
//! that prefix. Without a root mount, keys outside every mount read as
//! absent; writing one fails with `NoMount`.
//!
//! Queries fan out to every mount intersecting the query prefix and merge
//! the per-store streams through a priority queue keyed by the query's
//! order cascade, producing one globally-ordered stream without ever
//! buffering more than one pending entry per mount.

use std::collections::{BinaryHeap, HashMap};
use std::sync::Arc;

use tracing::warn;

use mosaic_core::{
    compare_with_orders, Batch, BatchingStore, CheckedStore, Entry, EntrySource, Error, GcStore,
    Key, Order, PersistentStore, Query, Result, Results, ScrubbedStore, Store,
};

type BatchFn = Arc<dyn Fn() -> Result<Box<dyn Batch>> + Send + Sync>;
type MaintFn = Arc<dyn Fn() -> Result<()> + Send + Sync>;
type UsageFn = Arc<dyn Fn() -> Result<u64> + Send + Sync>;

/// A store handle plus the optional capabilities it advertises.
///
/// Capabilities are bound at composition time; the mount never inspects a
/// store's type at runtime. A capability left unset is treated as
/// unsupported.
#[derive(Clone)]
pub struct MountedStore {
    store: Arc<dyn Store>,
    batch: Option<BatchFn>,
    check: Option<MaintFn>,
    scrub: Option<MaintFn>,
    gc: Option<MaintFn>,
    usage: Option<UsageFn>,
}

impl MountedStore {
    /// A plain store with no extended capabilities.
    pub fn new(store: Arc<dyn Store>) -> MountedStore {
        MountedStore {
            store,
            batch: None,
            check: None,
            scrub: None,
            gc: None,
            usage: None,
        }
    }

    /// A store that advertises batching, wired from its
    /// [`BatchingStore`] implementation.
    pub fn batching<S: BatchingStore + 'static>(store: Arc<S>) -> MountedStore {
        let handle = store.clone();
        MountedStore::new(store).with_batching(move || handle.batch())
    }

    /// Advertise batch support.
    pub fn with_batching(
        mut self,
        f: impl Fn() -> Result<Box<dyn Batch>> + Send + Sync + 'static,
    ) -> MountedStore {
        self.batch = Some(Arc::new(f));
        self
    }

    /// Advertise integrity checking.
    pub fn with_check(mut self, f: impl Fn() -> Result<()> + Send + Sync + 'static) -> MountedStore {
        self.check = Some(Arc::new(f));
        self
    }

    /// Advertise scrubbing.
    pub fn with_scrub(mut self, f: impl Fn() -> Result<()> + Send + Sync + 'static) -> MountedStore {
        self.scrub = Some(Arc::new(f));
        self
    }

    /// Advertise garbage collection.
    pub fn with_gc(mut self, f: impl Fn() -> Result<()> + Send + Sync + 'static) -> MountedStore {
        self.gc = Some(Arc::new(f));
        self
    }

    /// Advertise disk accounting.
    pub fn with_disk_usage(
        mut self,
        f: impl Fn() -> Result<u64> + Send + Sync + 'static,
    ) -> MountedStore {
        self.usage = Some(Arc::new(f));
        self
    }
}

/// One (prefix, store) binding.
#[derive(Clone)]
pub struct Mount {
    /// The key-space prefix this store owns.
    pub prefix: Key,
    /// The mounted store and its capabilities.
    pub store: MountedStore,
}

impl Mount {
    /// Mount `store` at `prefix`.
    pub fn new(prefix: Key, store: MountedStore) -> Mount {
        Mount { prefix, store }
    }
}

/// Composite store routing operations across mounted children.
///
/// The mount table is sorted most-specific-first at construction and is
/// immutable afterwards, so routing lookups need no locking.
pub struct MountStore {
    mounts: Arc<Vec<Mount>>,
}

impl MountStore {
    /// Build a composite from the given mounts. Order does not matter;
    /// mounts are applied most specific to least specific.
    pub fn new(mut mounts: Vec<Mount>) -> MountStore {
        mounts.sort_by(|a, b| b.prefix.to_string().cmp(&a.prefix.to_string()));
        MountStore {
            mounts: Arc::new(mounts),
        }
    }

    /// The store owning `key`: the mount whose prefix is the most specific
    /// ancestor-or-equal of the key, along with the residual key to present
    /// to it.
    fn lookup(&self, key: &Key) -> Option<(&Mount, Key)> {
        self.mounts
            .iter()
            .find(|m| m.prefix == *key || m.prefix.is_ancestor_of(key))
            .map(|m| (m, key.trim_prefix(&m.prefix)))
    }

    /// Every mount whose subtree intersects `key`: mounts fully contained
    /// inside the key's subtree (residual is the root) plus the single
    /// containing mount (residual is the trimmed suffix). The scan stops at
    /// the containing mount, since less specific mounts cannot hold keys
    /// under a more specific prefix. Only full path components match, so
    /// `/ba` does not pick up a mount at `/bar`.
    fn lookup_all(&self, key: &Key) -> Vec<(&Mount, Key)> {
        let mut out = Vec::new();
        for m in self.mounts.iter() {
            if m.prefix.is_descendant_of(key) {
                out.push((m, Key::root()));
            } else if m.prefix == *key || m.prefix.is_ancestor_of(key) {
                out.push((m, key.trim_prefix(&m.prefix)));
                break;
            }
        }
        out
    }
}

impl Store for MountStore {
    /// Routes to the owning mount; fails with
    /// [`Error::NoMount`] when no mount covers the key.
    fn put(&self, key: &Key, value: Vec<u8>) -> Result<()> {
        match self.lookup(key) {
            Some((m, rest)) => m.store.store.put(&rest, value),
            None => Err(Error::NoMount(key.clone())),
        }
    }

    /// An uncovered key reads as absent rather than as an error.
    fn get(&self, key: &Key) -> Result<Vec<u8>> {
        match self.lookup(key) {
            Some((m, rest)) => m.store.store.get(&rest),
            None => Err(Error::NotFound(key.clone())),
        }
    }

    fn has(&self, key: &Key) -> Result<bool> {
        match self.lookup(key) {
            Some((m, rest)) => m.store.store.has(&rest),
            None => Ok(false),
        }
    }

    fn get_size(&self, key: &Key) -> Result<usize> {
        match self.lookup(key) {
            Some((m, rest)) => m.store.store.get_size(&rest),
            None => Err(Error::NotFound(key.clone())),
        }
    }

    /// Deleting an uncovered key is a no-op.
    fn delete(&self, key: &Key) -> Result<()> {
        match self.lookup(key) {
            Some((m, rest)) => m.store.store.delete(&rest),
            None => Ok(()),
        }
    }

    /// Syncs every mount whose subtree intersects `prefix`, never visiting
    /// mounts outside it. Per-mount failures aggregate; every mount is
    /// attempted.
    fn sync(&self, prefix: &Key) -> Result<()> {
        let mut errors = Vec::new();
        for (m, rest) in self.lookup_all(&prefix.clean()) {
            if let Err(err) = m.store.store.sync(&rest) {
                warn!(mount = %m.prefix, error = %err, "sync failed");
                errors.push(Error::at_mount(&m.prefix, err));
            }
        }
        Error::aggregate_result(errors)
    }

    /// Fans out to the mounts intersecting the query prefix and merges
    /// their individually-ordered streams into one globally-ordered
    /// stream. Filters, offset and limit apply after the merge; orders are
    /// not re-applied because the merge already preserves them.
    fn query(&self, query: Query) -> Result<Results> {
        let template = Query {
            orders: query.orders.clone(),
            keys_only: query.keys_only,
            returns_sizes: query.returns_sizes,
            return_expirations: query.return_expirations,
            ..Query::default()
        };
        let prefix = query.prefix.clone().unwrap_or_else(Key::root).clean();

        // Open every sub-stream up front; on failure, close the ones
        // already opened before propagating.
        let mut subs: Vec<(Key, Results)> = Vec::new();
        for (m, rest) in self.lookup_all(&prefix) {
            let sub_query = Query {
                prefix: Some(rest),
                orders: template.orders.clone(),
                ..template.clone()
            };
            match m.store.store.query(sub_query) {
                Ok(results) => subs.push((m.prefix.clone(), results)),
                Err(err) => {
                    for (_, mut open) in subs {
                        let _ = open.close();
                    }
                    return Err(err);
                }
            }
        }

        let orders = Arc::new(query.orders.clone());
        let mut merge = MergeSource {
            orders: orders.clone(),
            heap: BinaryHeap::new(),
            pending_error: None,
        };
        for (mount_prefix, results) in subs {
            merge.add_stream(mount_prefix, results);
        }

        let mut out = Results::from_source(query.clone(), merge);
        // A key stored exactly at a mount prefix comes back equal to the
        // query prefix; re-applying the prefix filter on the remapped keys
        // keeps the stream strict-descendants-only.
        out = mosaic_core::naive_prefix(out, prefix);
        for filter in query.filters {
            out = mosaic_core::naive_filter(out, filter);
        }
        if query.offset > 0 {
            out = mosaic_core::naive_offset(out, query.offset);
        }
        if query.limit > 0 {
            out = mosaic_core::naive_limit(out, query.limit);
        }
        Ok(out)
    }

    /// Closes every mounted store, aggregating failures.
    fn close(&self) -> Result<()> {
        let mut errors = Vec::new();
        for m in self.mounts.iter() {
            if let Err(err) = m.store.store.close() {
                errors.push(Error::at_mount(&m.prefix, err));
            }
        }
        Error::aggregate_result(errors)
    }
}

impl BatchingStore for MountStore {
    /// A batch session lazily opening one child batch per mount touched.
    fn batch(&self) -> Result<Box<dyn Batch>> {
        Ok(Box::new(MountBatch {
            mounts: self.mounts.clone(),
            sessions: HashMap::new(),
        }))
    }
}

impl CheckedStore for MountStore {
    /// Checks every mount advertising the capability; failures aggregate
    /// and never short-circuit remaining mounts.
    fn check(&self) -> Result<()> {
        self.fan_out(|m| m.store.check.as_deref())
    }
}

impl ScrubbedStore for MountStore {
    fn scrub(&self) -> Result<()> {
        self.fan_out(|m| m.store.scrub.as_deref())
    }
}

impl GcStore for MountStore {
    fn collect_garbage(&self) -> Result<()> {
        self.fan_out(|m| m.store.gc.as_deref())
    }
}

impl PersistentStore for MountStore {
    /// Sums usage over mounts that account for it; mounts that fail still
    /// contribute their error without stopping the sweep.
    fn disk_usage(&self) -> Result<u64> {
        let mut total = 0u64;
        let mut errors = Vec::new();
        for m in self.mounts.iter() {
            if let Some(usage) = &m.store.usage {
                match usage() {
                    Ok(n) => total += n,
                    Err(err) => errors.push(Error::at_mount(&m.prefix, err)),
                }
            }
        }
        match Error::aggregate(errors) {
            None => Ok(total),
            Some(err) => Err(err),
        }
    }
}

impl MountStore {
    fn fan_out(
        &self,
        capability: impl Fn(&Mount) -> Option<&(dyn Fn() -> Result<()> + Send + Sync)>,
    ) -> Result<()> {
        let mut errors = Vec::new();
        for m in self.mounts.iter() {
            if let Some(f) = capability(m) {
                if let Err(err) = f() {
                    warn!(mount = %m.prefix, error = %err, "maintenance failed");
                    errors.push(Error::at_mount(&m.prefix, err));
                }
            }
        }
        Error::aggregate_result(errors)
    }
}

/// One per-mount cursor in the merge queue, holding the mount's next
/// pending entry with its key already remapped to the global key space.
struct MergeCursor {
    mount_prefix: Key,
    orders: Arc<Vec<Order>>,
    next: Entry,
    results: Results,
}

impl PartialEq for MergeCursor {
    fn eq(&self, other: &MergeCursor) -> bool {
        self.cmp(other) == std::cmp::Ordering::Equal
    }
}

impl Eq for MergeCursor {}

impl PartialOrd for MergeCursor {
    fn partial_cmp(&self, other: &MergeCursor) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for MergeCursor {
    // BinaryHeap is a max-heap; reversing puts the smallest entry on top.
    fn cmp(&self, other: &MergeCursor) -> std::cmp::Ordering {
        compare_with_orders(&self.orders, &self.next, &other.next).reverse()
    }
}

/// External k-way merge of individually-ordered sub-streams. At most one
/// pending entry per mount is held at a time; advancing pops the queue
/// head, pulls that mount's next entry, and re-inserts while entries
/// remain.
struct MergeSource {
    orders: Arc<Vec<Order>>,
    heap: BinaryHeap<MergeCursor>,
    pending_error: Option<Error>,
}

impl MergeSource {
    fn add_stream(&mut self, mount_prefix: Key, mut results: Results) {
        match results.next_entry() {
            Some(Ok(mut entry)) => {
                entry.key = mount_prefix.child(&entry.key);
                self.heap.push(MergeCursor {
                    mount_prefix,
                    orders: self.orders.clone(),
                    next: entry,
                    results,
                });
            }
            Some(Err(err)) => {
                let _ = results.close();
                self.record_error(err);
            }
            None => {
                if let Err(err) = results.close() {
                    self.record_error(err);
                }
            }
        }
    }

    fn record_error(&mut self, err: Error) {
        if self.pending_error.is_none() {
            self.pending_error = Some(err);
        }
    }
}

impl EntrySource for MergeSource {
    fn next_entry(&mut self) -> Option<Result<Entry>> {
        if let Some(err) = self.pending_error.take() {
            return Some(Err(err));
        }
        let cursor = self.heap.pop()?;
        let MergeCursor {
            mount_prefix,
            next: entry,
            results,
            ..
        } = cursor;
        self.add_stream(mount_prefix, results);
        Some(Ok(entry))
    }

    fn close_source(&mut self) -> Result<()> {
        let mut errors = Vec::new();
        for cursor in self.heap.drain() {
            let mut results = cursor.results;
            if let Err(err) = results.close() {
                errors.push(Error::at_mount(&cursor.mount_prefix, err));
            }
        }
        Error::aggregate_result(errors)
    }
}

/// A batch session over a composite store.
///
/// Child batches are created lazily, one per mount, the first time a key
/// routes there. Sessions are private to their creator and must not be
/// shared.
struct MountBatch {
    mounts: Arc<Vec<Mount>>,
    sessions: HashMap<String, Box<dyn Batch>>,
}

impl MountBatch {
    fn lookup(&self, key: &Key) -> Option<(Mount, Key)> {
        self.mounts
            .iter()
            .find(|m| m.prefix == *key || m.prefix.is_ancestor_of(key))
            .map(|m| (m.clone(), key.trim_prefix(&m.prefix)))
    }

    fn batch_for(&mut self, key: &Key) -> Result<(&mut Box<dyn Batch>, Key)> {
        let (mount, rest) = self.lookup(key).ok_or_else(|| Error::NoMount(key.clone()))?;
        let slot = self.sessions.entry(mount.prefix.to_string());
        let batch = match slot {
            std::collections::hash_map::Entry::Occupied(o) => o.into_mut(),
            std::collections::hash_map::Entry::Vacant(v) => {
                let open = mount.store.batch.as_ref().ok_or(Error::BatchUnsupported)?;
                v.insert(open()?)
            }
        };
        Ok((batch, rest))
    }
}

impl Batch for MountBatch {
    fn put(&mut self, key: &Key, value: Vec<u8>) -> Result<()> {
        let (batch, rest) = self.batch_for(key)?;
        batch.put(&rest, value)
    }

    fn delete(&mut self, key: &Key) -> Result<()> {
        let (batch, rest) = self.batch_for(key)?;
        batch.delete(&rest)
    }

    /// Commits every opened child batch, aggregating failures; every child
    /// is attempted.
    fn commit(&mut self) -> Result<()> {
        let mut errors = Vec::new();
        for (prefix, batch) in self.sessions.iter_mut() {
            if let Err(err) = batch.commit() {
                errors.push(Error::at_mount(&Key::path(prefix.as_str()), err));
            }
        }
        Error::aggregate_result(errors)
    }
}

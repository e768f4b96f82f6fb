//! Declarative query model
//!
//! A [`Query`] describes what subset of a store's key space to return and
//! how to shape it: an optional prefix to scope the scan, filters applied as
//! a conjunction, a multi-key order cascade, offset/limit pagination, and
//! flags controlling which entry fields are populated.
//!
//! Evaluation semantics live in [`crate::naive`]; this module only defines
//! the request vocabulary and the comparators it implies.

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;
use std::time::SystemTime;

use crate::key::Key;

/// A single query result: a key plus whichever fields the query requested.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// The entry's key.
    pub key: Key,
    /// The value; `None` for key-only queries.
    pub value: Option<Vec<u8>>,
    /// Expiration of the entry, when the backend tracks one and the query
    /// asked for it.
    pub expiration: Option<SystemTime>,
    /// Size of the value in bytes, when requested. Always equals the value
    /// length when the value is present.
    pub size: Option<usize>,
}

impl Entry {
    /// An entry carrying a value, with the size derived from it.
    pub fn new(key: Key, value: Vec<u8>) -> Entry {
        let size = value.len();
        Entry {
            key,
            value: Some(value),
            expiration: None,
            size: Some(size),
        }
    }

    /// A key-only entry.
    pub fn key_only(key: Key) -> Entry {
        Entry {
            key,
            value: None,
            expiration: None,
            size: None,
        }
    }
}

/// Comparison operator used by key and value filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    /// `<`
    Less,
    /// `<=`
    LessOrEqual,
    /// `==`
    Equal,
    /// `!=`
    NotEqual,
    /// `>=`
    GreaterOrEqual,
    /// `>`
    Greater,
}

impl CompareOp {
    fn admits(self, ord: Ordering) -> bool {
        match self {
            CompareOp::Less => ord == Ordering::Less,
            CompareOp::LessOrEqual => ord != Ordering::Greater,
            CompareOp::Equal => ord == Ordering::Equal,
            CompareOp::NotEqual => ord != Ordering::Equal,
            CompareOp::GreaterOrEqual => ord != Ordering::Less,
            CompareOp::Greater => ord == Ordering::Greater,
        }
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CompareOp::Less => "<",
            CompareOp::LessOrEqual => "<=",
            CompareOp::Equal => "==",
            CompareOp::NotEqual => "!=",
            CompareOp::GreaterOrEqual => ">=",
            CompareOp::Greater => ">",
        })
    }
}

/// Caller-supplied predicate over an entry.
pub type FilterFn = Arc<dyn Fn(&Entry) -> bool + Send + Sync>;

/// Caller-supplied comparator over two entries.
pub type OrderFn = Arc<dyn Fn(&Entry, &Entry) -> Ordering + Send + Sync>;

/// An entry predicate. Filters listed on a query are applied as a
/// conjunction before ordering and pagination.
#[derive(Clone)]
pub enum Filter {
    /// Compare the entry key against a reference key using key ordering.
    KeyCompare {
        /// The comparison to admit.
        op: CompareOp,
        /// The reference key.
        key: Key,
    },
    /// Admit entries whose key is a strict descendant of the given prefix.
    KeyPrefix(Key),
    /// Compare the entry value byte-wise against a reference value. A
    /// key-only entry compares as the empty value.
    ValueCompare {
        /// The comparison to admit.
        op: CompareOp,
        /// The reference value.
        value: Vec<u8>,
    },
    /// Open predicate capability for caller-supplied logic. Given a
    /// key-only entry, the predicate may only consult the key.
    Custom(FilterFn),
}

impl Filter {
    /// Whether the entry passes this filter.
    pub fn matches(&self, entry: &Entry) -> bool {
        match self {
            Filter::KeyCompare { op, key } => op.admits(entry.key.cmp(key)),
            Filter::KeyPrefix(prefix) => entry.key.is_descendant_of(prefix),
            Filter::ValueCompare { op, value } => {
                let v = entry.value.as_deref().unwrap_or(&[]);
                op.admits(v.cmp(value.as_slice()))
            }
            Filter::Custom(f) => f(entry),
        }
    }
}

impl fmt::Debug for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Filter::KeyCompare { op, key } => {
                f.debug_struct("KeyCompare").field("op", op).field("key", key).finish()
            }
            Filter::KeyPrefix(key) => f.debug_tuple("KeyPrefix").field(key).finish(),
            Filter::ValueCompare { op, value } => f
                .debug_struct("ValueCompare")
                .field("op", op)
                .field("value", value)
                .finish(),
            Filter::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Filter::KeyCompare { op, key } => write!(f, "KEY {op} \"{key}\""),
            Filter::KeyPrefix(key) => write!(f, "PREFIX(\"{key}\")"),
            Filter::ValueCompare { op, value } => {
                write!(f, "VALUE {op} \"{}\"", String::from_utf8_lossy(value))
            }
            Filter::Custom(_) => f.write_str("FILTER"),
        }
    }
}

/// One comparator in a query's order cascade.
#[derive(Clone)]
pub enum Order {
    /// Ascending by key.
    ByKey,
    /// Descending by key.
    ByKeyDescending,
    /// Ascending by value, byte-wise. Key-only entries compare as empty.
    ByValue,
    /// Open comparator capability for caller-supplied logic.
    Custom(OrderFn),
}

impl Order {
    /// Compare two entries under this order.
    pub fn compare(&self, a: &Entry, b: &Entry) -> Ordering {
        match self {
            Order::ByKey => a.key.cmp(&b.key),
            Order::ByKeyDescending => b.key.cmp(&a.key),
            Order::ByValue => {
                let av = a.value.as_deref().unwrap_or(&[]);
                let bv = b.value.as_deref().unwrap_or(&[]);
                av.cmp(bv)
            }
            Order::Custom(f) => f(a, b),
        }
    }
}

impl fmt::Debug for Order {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Order::ByKey => f.write_str("ByKey"),
            Order::ByKeyDescending => f.write_str("ByKeyDescending"),
            Order::ByValue => f.write_str("ByValue"),
            Order::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

impl fmt::Display for Order {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Order::ByKey => f.write_str("KEY"),
            Order::ByKeyDescending => f.write_str("desc(KEY)"),
            Order::ByValue => f.write_str("VALUE"),
            Order::Custom(_) => f.write_str("FN"),
        }
    }
}

/// Lexicographic cascade over the listed orders, with a final ascending
/// key comparison breaking any remaining tie. With no orders this is plain
/// key order, so merged streams stay deterministic.
pub fn compare_with_orders(orders: &[Order], a: &Entry, b: &Entry) -> Ordering {
    for order in orders {
        match order.compare(a, b) {
            Ordering::Equal => continue,
            other => return other,
        }
    }
    a.key.cmp(&b.key)
}

/// Stable sort of entries under an order cascade.
pub fn sort_entries(orders: &[Order], entries: &mut [Entry]) {
    entries.sort_by(|a, b| compare_with_orders(orders, a, b));
}

/// A declarative request against a store's key space.
///
/// Evaluation applies, in fixed order: prefix scoping, then filters (as a
/// conjunction), then orders, then offset, then limit. Offset and limit
/// operate on the post-order sequence.
#[derive(Debug, Clone, Default)]
pub struct Query {
    /// Scope results to strict descendants of this key. `None` (or the
    /// root) scans everything.
    pub prefix: Option<Key>,
    /// Predicates applied as a conjunction.
    pub filters: Vec<Filter>,
    /// Order cascade; earlier orders break ties using later ones.
    pub orders: Vec<Order>,
    /// Number of post-order entries to skip.
    pub offset: usize,
    /// Maximum entries to return; `0` means unlimited.
    pub limit: usize,
    /// Return keys without values.
    pub keys_only: bool,
    /// Populate [`Entry::size`].
    pub returns_sizes: bool,
    /// Populate [`Entry::expiration`] where the backend tracks it.
    pub return_expirations: bool,
}

impl Query {
    /// A query scoped to the given prefix with all other fields default.
    pub fn with_prefix(prefix: Key) -> Query {
        Query {
            prefix: Some(prefix),
            ..Query::default()
        }
    }
}

impl fmt::Display for Query {
    /// Canonical diagnostic rendering, e.g.
    /// `SELECT keys,vals FROM "/foo" FILTER [...] ORDER [...] OFFSET 8 LIMIT 8`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SELECT keys")?;
        if !self.keys_only {
            f.write_str(",vals")?;
        }
        if self.return_expirations {
            f.write_str(",exps")?;
        }
        if let Some(prefix) = &self.prefix {
            if !prefix.is_root() {
                write!(f, " FROM \"{prefix}\"")?;
            }
        }
        if !self.filters.is_empty() {
            f.write_str(" FILTER [")?;
            for (i, filter) in self.filters.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{filter}")?;
            }
            f.write_str("]")?;
        }
        if !self.orders.is_empty() {
            f.write_str(" ORDER [")?;
            for (i, order) in self.orders.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{order}")?;
            }
            f.write_str("]")?;
        }
        if self.offset > 0 {
            write!(f, " OFFSET {}", self.offset)?;
        }
        if self.limit > 0 {
            write!(f, " LIMIT {}", self.limit)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(key: &str, value: &[u8]) -> Entry {
        Entry::new(Key::path(key), value.to_vec())
    }

    #[test]
    fn test_key_compare_filter() {
        let filter = Filter::KeyCompare {
            op: CompareOp::Greater,
            key: Key::path("/b"),
        };
        assert!(filter.matches(&entry("/c", b"")));
        assert!(!filter.matches(&entry("/b", b"")));
        assert!(!filter.matches(&entry("/a", b"")));
    }

    #[test]
    fn test_key_prefix_filter_is_strict() {
        let filter = Filter::KeyPrefix(Key::path("/a"));
        assert!(filter.matches(&entry("/a/b", b"")));
        assert!(!filter.matches(&entry("/a", b"")));
        assert!(!filter.matches(&entry("/ab", b"")));
    }

    #[test]
    fn test_value_compare_filter() {
        let filter = Filter::ValueCompare {
            op: CompareOp::Equal,
            value: b"v".to_vec(),
        };
        assert!(filter.matches(&entry("/a", b"v")));
        assert!(!filter.matches(&entry("/a", b"w")));
        // Key-only entries compare as the empty value.
        assert!(!filter.matches(&Entry::key_only(Key::path("/a"))));
    }

    #[test]
    fn test_custom_filter() {
        let filter = Filter::Custom(Arc::new(|e: &Entry| e.key.name() == "b"));
        assert!(filter.matches(&entry("/a/b", b"")));
        assert!(!filter.matches(&entry("/a/c", b"")));
    }

    #[test]
    fn test_order_cascade_with_key_tiebreak() {
        let a = entry("/a", b"2");
        let b = entry("/b", b"1");
        let c = entry("/c", b"1");
        let orders = vec![Order::ByValue];
        assert_eq!(compare_with_orders(&orders, &a, &b), Ordering::Greater);
        // Equal values fall back to ascending key.
        assert_eq!(compare_with_orders(&orders, &b, &c), Ordering::Less);
        // No orders at all is plain key order.
        assert_eq!(compare_with_orders(&[], &a, &b), Ordering::Less);
    }

    #[test]
    fn test_sort_entries_multi_order() {
        let mut entries = vec![entry("/b", b"1"), entry("/a", b"2"), entry("/c", b"1")];
        sort_entries(&[Order::ByValue, Order::ByKeyDescending], &mut entries);
        let keys: Vec<String> = entries.iter().map(|e| e.key.to_string()).collect();
        assert_eq!(keys, vec!["/c", "/b", "/a"]);
    }

    #[test]
    fn test_query_display_grammar() {
        let mut q = Query::default();
        assert_eq!(q.to_string(), "SELECT keys,vals");

        q.offset = 10;
        q.limit = 10;
        assert_eq!(q.to_string(), "SELECT keys,vals OFFSET 10 LIMIT 10");

        q.orders = vec![Order::ByValue, Order::ByKey];
        assert_eq!(q.to_string(), "SELECT keys,vals ORDER [VALUE, KEY] OFFSET 10 LIMIT 10");

        q.filters = vec![
            Filter::KeyCompare { op: CompareOp::Greater, key: Key::path("/foo/bar") },
            Filter::KeyCompare { op: CompareOp::Less, key: Key::path("/foo/bar") },
        ];
        assert_eq!(
            q.to_string(),
            "SELECT keys,vals FILTER [KEY > \"/foo/bar\", KEY < \"/foo/bar\"] ORDER [VALUE, KEY] OFFSET 10 LIMIT 10"
        );

        q.prefix = Some(Key::path("/foo"));
        assert_eq!(
            q.to_string(),
            "SELECT keys,vals FROM \"/foo\" FILTER [KEY > \"/foo/bar\", KEY < \"/foo/bar\"] ORDER [VALUE, KEY] OFFSET 10 LIMIT 10"
        );

        q.return_expirations = true;
        assert_eq!(
            q.to_string(),
            "SELECT keys,vals,exps FROM \"/foo\" FILTER [KEY > \"/foo/bar\", KEY < \"/foo/bar\"] ORDER [VALUE, KEY] OFFSET 10 LIMIT 10"
        );

        q.keys_only = true;
        assert_eq!(
            q.to_string(),
            "SELECT keys,exps FROM \"/foo\" FILTER [KEY > \"/foo/bar\", KEY < \"/foo/bar\"] ORDER [VALUE, KEY] OFFSET 10 LIMIT 10"
        );

        q.return_expirations = false;
        assert_eq!(
            q.to_string(),
            "SELECT keys FROM \"/foo\" FILTER [KEY > \"/foo/bar\", KEY < \"/foo/bar\"] ORDER [VALUE, KEY] OFFSET 10 LIMIT 10"
        );
    }
}

//! Hierarchical and flat keys
//!
//! A [`Key`] is the immutable identifier of an object in a key space. Two
//! variants exist:
//!
//! - [`Key::Path`]: a normalized, slash-separated path (`/a/b/c`). Path keys
//!   are hierarchical: every segment is a namespace, so keys can be deemed
//!   children or ancestors of other keys:
//!
//!   ```text
//!   /comedy
//!   /comedy/montypython
//!   ```
//!
//!   The last segment may embed object information as `type:name`:
//!
//!   ```text
//!   /comedy/montypython/actor:johncleese
//!   ```
//!
//! - [`Key::Bytes`]: an opaque byte string. Bytes keys support only
//!   prefix/suffix/concatenation relations and order by raw byte comparison.
//!
//! Keys are value types: cheap to clone, never mutated after construction.
//! Mixing the two variants in one operation is a programmer error and panics;
//! a store works with exactly one key variant.

use std::cmp::Ordering;
use std::fmt;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Discriminates the two key representations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyType {
    /// Slash-separated hierarchical key.
    Path,
    /// Opaque byte-string key.
    Bytes,
}

/// Immutable key with total ordering and prefix relations.
///
/// Construct path keys through [`Key::path`] (which normalizes) and bytes
/// keys through [`Key::bytes`]. The `Path` payload is always in canonical
/// form: leading `/`, no empty, `.` or `..` segments, no trailing slash
/// (the root is `/`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Key {
    /// Normalized hierarchical key, e.g. `/a/b/c`.
    Path(String),
    /// Flat key ordered by raw byte comparison.
    Bytes(Vec<u8>),
}

impl Key {
    /// Create a path key, normalizing the input.
    ///
    /// ```
    /// use mosaic_core::Key;
    /// assert_eq!(Key::path("a/b//c/").to_string(), "/a/b/c");
    /// assert_eq!(Key::path("/a/../b").to_string(), "/b");
    /// ```
    pub fn path(s: impl AsRef<str>) -> Key {
        Key::Path(clean_path(s.as_ref()))
    }

    /// Create a bytes key.
    pub fn bytes(b: impl Into<Vec<u8>>) -> Key {
        Key::Bytes(b.into())
    }

    /// The root path key, `/`.
    pub fn root() -> Key {
        Key::Path("/".to_string())
    }

    /// Build a path key out of namespace segments.
    pub fn with_namespaces<I, S>(namespaces: I) -> Key
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut s = String::new();
        for ns in namespaces {
            s.push('/');
            s.push_str(ns.as_ref());
        }
        Key::path(s)
    }

    /// A random path key with a uuid-derived name segment.
    pub fn random() -> Key {
        Key::Path(format!("/{}", uuid::Uuid::new_v4().simple()))
    }

    /// Which representation this key uses.
    pub fn key_type(&self) -> KeyType {
        match self {
            Key::Path(_) => KeyType::Path,
            Key::Bytes(_) => KeyType::Bytes,
        }
    }

    /// The raw bytes of the key.
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Key::Path(s) => s.as_bytes(),
            Key::Bytes(b) => b,
        }
    }

    /// Whether this key is the path root `/` or the empty bytes key.
    pub fn is_root(&self) -> bool {
        match self {
            Key::Path(s) => s == "/",
            Key::Bytes(b) => b.is_empty(),
        }
    }

    /// Renormalize a possibly-unclean key. Idempotent; bytes keys are
    /// returned unchanged.
    pub fn clean(&self) -> Key {
        match self {
            Key::Path(s) => Key::path(s),
            Key::Bytes(_) => self.clone(),
        }
    }

    /// Concatenate `other` under this key.
    ///
    /// For path keys the child lives under the parent's namespace:
    /// `/a`.child(`/b`) is `/a/b`. For bytes keys this is plain byte
    /// concatenation.
    ///
    /// # Panics
    ///
    /// Panics when the variants differ.
    pub fn child(&self, other: &Key) -> Key {
        match (self, other) {
            (Key::Path(a), Key::Path(b)) => {
                if a == "/" {
                    other.clone()
                } else if b == "/" {
                    self.clone()
                } else {
                    Key::Path(format!("{a}{b}"))
                }
            }
            (Key::Bytes(a), Key::Bytes(b)) => {
                let mut out = Vec::with_capacity(a.len() + b.len());
                out.extend_from_slice(a);
                out.extend_from_slice(b);
                Key::Bytes(out)
            }
            _ => variant_mismatch(self, other),
        }
    }

    /// Append a string segment to a path key, normalizing the result.
    ///
    /// # Panics
    ///
    /// Panics on bytes keys.
    pub fn child_str(&self, s: &str) -> Key {
        match self {
            Key::Path(p) => Key::path(format!("{p}/{s}")),
            Key::Bytes(_) => path_only(self, "child_str"),
        }
    }

    /// Append raw bytes to a bytes key.
    ///
    /// # Panics
    ///
    /// Panics on path keys.
    pub fn child_bytes(&self, b: &[u8]) -> Key {
        match self {
            Key::Bytes(a) => {
                let mut out = Vec::with_capacity(a.len() + b.len());
                out.extend_from_slice(a);
                out.extend_from_slice(b);
                Key::Bytes(out)
            }
            Key::Path(_) => bytes_only(self, "child_bytes"),
        }
    }

    /// The parent of a path key; the root is its own parent.
    ///
    /// # Panics
    ///
    /// Panics on bytes keys, which have no segment structure.
    pub fn parent(&self) -> Key {
        match self {
            Key::Path(s) => match s.rfind('/') {
                Some(0) | None => Key::root(),
                Some(idx) => Key::Path(s[..idx].to_string()),
            },
            Key::Bytes(_) => path_only(self, "parent"),
        }
    }

    /// Strict prefix relation: `true` when `other` lives below this key.
    /// Never true for equal keys. Path keys match on whole segments only,
    /// so `/ba` is not an ancestor of `/bar`.
    ///
    /// # Panics
    ///
    /// Panics when the variants differ.
    pub fn is_ancestor_of(&self, other: &Key) -> bool {
        match (self, other) {
            (Key::Path(p), Key::Path(c)) => {
                if p == "/" {
                    c.len() > 1
                } else {
                    c.len() > p.len()
                        && c.starts_with(p.as_str())
                        && c.as_bytes()[p.len()] == b'/'
                }
            }
            (Key::Bytes(p), Key::Bytes(c)) => c.len() > p.len() && c.starts_with(p),
            _ => variant_mismatch(self, other),
        }
    }

    /// Strict inverse of [`Key::is_ancestor_of`]. Irreflexive.
    pub fn is_descendant_of(&self, other: &Key) -> bool {
        other.is_ancestor_of(self)
    }

    /// Non-strict raw prefix relation (a key has itself as a prefix).
    ///
    /// # Panics
    ///
    /// Panics when the variants differ.
    pub fn has_prefix(&self, prefix: &Key) -> bool {
        match (self, prefix) {
            (Key::Path(s), Key::Path(p)) => s.starts_with(p.as_str()),
            (Key::Bytes(s), Key::Bytes(p)) => s.starts_with(p.as_slice()),
            _ => variant_mismatch(self, prefix),
        }
    }

    /// Non-strict raw suffix relation (a key has itself as a suffix).
    ///
    /// # Panics
    ///
    /// Panics when the variants differ.
    pub fn has_suffix(&self, suffix: &Key) -> bool {
        match (self, suffix) {
            (Key::Path(s), Key::Path(p)) => s.ends_with(p.as_str()),
            (Key::Bytes(s), Key::Bytes(p)) => s.ends_with(p.as_slice()),
            _ => variant_mismatch(self, suffix),
        }
    }

    /// This key without the given leading prefix, renormalized for path
    /// keys. Returned unchanged when the prefix does not match.
    pub fn trim_prefix(&self, prefix: &Key) -> Key {
        match (self, prefix) {
            (Key::Path(s), Key::Path(p)) => match s.strip_prefix(p.as_str()) {
                Some(rest) => Key::path(rest),
                None => self.clone(),
            },
            (Key::Bytes(s), Key::Bytes(p)) => match s.strip_prefix(p.as_slice()) {
                Some(rest) => Key::Bytes(rest.to_vec()),
                None => self.clone(),
            },
            _ => variant_mismatch(self, prefix),
        }
    }

    /// This key without the given trailing suffix, renormalized for path
    /// keys. Returned unchanged when the suffix does not match.
    pub fn trim_suffix(&self, suffix: &Key) -> Key {
        match (self, suffix) {
            (Key::Path(s), Key::Path(p)) => match s.strip_suffix(p.as_str()) {
                Some(rest) => Key::path(rest),
                None => self.clone(),
            },
            (Key::Bytes(s), Key::Bytes(p)) => match s.strip_suffix(p.as_slice()) {
                Some(rest) => Key::Bytes(rest.to_vec()),
                None => self.clone(),
            },
            _ => variant_mismatch(self, suffix),
        }
    }

    /// The namespace segments of a path key; empty for the root.
    ///
    /// # Panics
    ///
    /// Panics on bytes keys.
    pub fn namespaces(&self) -> Vec<&str> {
        match self {
            Key::Path(s) => {
                if s == "/" {
                    Vec::new()
                } else {
                    s[1..].split('/').collect()
                }
            }
            Key::Bytes(_) => path_only(self, "namespaces"),
        }
    }

    /// The last (most specific) namespace segment; empty for the root.
    pub fn base_namespace(&self) -> &str {
        self.namespaces().last().copied().unwrap_or("")
    }

    /// The `type` portion of the last segment's `type:name` form, i.e.
    /// everything before the last colon (empty when there is no colon).
    pub fn type_tag(&self) -> &str {
        namespace_type(self.base_namespace())
    }

    /// The `name` portion of the last segment's `type:name` form, i.e.
    /// everything after the last colon (the whole segment otherwise).
    pub fn name(&self) -> &str {
        namespace_name(self.base_namespace())
    }

    /// Append `:instance` to the key, e.g. `/actor`.instance(`cleese`) is
    /// `/actor:cleese`.
    ///
    /// # Panics
    ///
    /// Panics on bytes keys.
    pub fn instance(&self, instance: &str) -> Key {
        match self {
            Key::Path(s) => Key::path(format!("{s}:{instance}")),
            Key::Bytes(_) => path_only(self, "instance"),
        }
    }

    /// The "path" of this key: the parent joined with the type of the last
    /// segment, e.g. `/comedy/actor:cleese`.path() is `/comedy/actor`.
    ///
    /// # Panics
    ///
    /// Panics on bytes keys.
    pub fn path_key(&self) -> Key {
        match self {
            Key::Path(_) => {
                let parent = self.parent();
                let ty = namespace_type(self.base_namespace());
                Key::path(format!("{parent}/{ty}"))
            }
            Key::Bytes(_) => path_only(self, "path_key"),
        }
    }

    /// A path key with the namespace segments reversed.
    ///
    /// # Panics
    ///
    /// Panics on bytes keys.
    pub fn reverse(&self) -> Key {
        match self {
            Key::Path(_) => {
                let mut ns = self.namespaces();
                ns.reverse();
                Key::with_namespaces(ns)
            }
            Key::Bytes(_) => path_only(self, "reverse"),
        }
    }
}

/// Total order comparison, `Ordering::Less` when `a` sorts before `b`.
///
/// # Panics
///
/// Panics when the key variants differ.
pub fn compare(a: &Key, b: &Key) -> Ordering {
    a.cmp(b)
}

/// Join a slice of keys into one by repeated [`Key::child`]; the empty
/// slice joins to the root path key.
pub fn join(keys: &[Key]) -> Key {
    match keys.split_first() {
        None => Key::root(),
        Some((first, rest)) => rest.iter().fold(first.clone(), |acc, k| acc.child(k)),
    }
}

impl Ord for Key {
    fn cmp(&self, other: &Key) -> Ordering {
        match (self, other) {
            (Key::Path(a), Key::Path(b)) => a.cmp(b),
            (Key::Bytes(a), Key::Bytes(b)) => a.cmp(b),
            _ => variant_mismatch(self, other),
        }
    }
}

impl PartialOrd for Key {
    fn partial_cmp(&self, other: &Key) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Path(s) => f.write_str(s),
            Key::Bytes(b) => f.write_str(&String::from_utf8_lossy(b)),
        }
    }
}

impl Serialize for Key {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Key::Path(s) => serializer.serialize_str(s),
            Key::Bytes(b) => serializer.serialize_bytes(b),
        }
    }
}

impl<'de> Deserialize<'de> for Key {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Key, D::Error> {
        struct KeyVisitor;

        impl<'de> Visitor<'de> for KeyVisitor {
            type Value = Key;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a key string or byte sequence")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Key, E> {
                Ok(Key::path(v))
            }

            fn visit_bytes<E: de::Error>(self, v: &[u8]) -> Result<Key, E> {
                Ok(Key::bytes(v))
            }

            fn visit_seq<A: de::SeqAccess<'de>>(self, mut seq: A) -> Result<Key, A::Error> {
                let mut out = Vec::new();
                while let Some(b) = seq.next_element::<u8>()? {
                    out.push(b);
                }
                Ok(Key::Bytes(out))
            }
        }

        deserializer.deserialize_any(KeyVisitor)
    }
}

/// Lexically normalize a path: leading slash, no empty, `.` or `..`
/// segments, no trailing slash.
fn clean_path(s: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for seg in s.split('/') {
        match seg {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            seg => segments.push(seg),
        }
    }
    let mut out = String::with_capacity(s.len() + 1);
    if segments.is_empty() {
        out.push('/');
        return out;
    }
    for seg in segments {
        out.push('/');
        out.push_str(seg);
    }
    out
}

fn namespace_type(ns: &str) -> &str {
    match ns.rfind(':') {
        Some(idx) => &ns[..idx],
        None => "",
    }
}

fn namespace_name(ns: &str) -> &str {
    match ns.rfind(':') {
        Some(idx) => &ns[idx + 1..],
        None => ns,
    }
}

#[cold]
fn variant_mismatch(a: &Key, b: &Key) -> ! {
    panic!("key variant mismatch: {a:?} vs {b:?}");
}

#[cold]
fn path_only(k: &Key, op: &str) -> ! {
    panic!("{op} requires a path key, got {k:?}");
}

#[cold]
fn bytes_only(k: &Key, op: &str) -> ! {
    panic!("{op} requires a bytes key, got {k:?}");
}

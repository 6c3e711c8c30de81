//! Hierarchical cache key normalisation.
//!
//! Keys are path-shaped (`namespace/segment/segment`). Normalisation makes the
//! same logical key always hash to the same stored key, and gives prefix
//! deletes a well-defined boundary: `a/b` covers `a/b` and everything under
//! `a/b/`, but never `a/bc`.

use std::fmt;

const SEPARATOR: char = '/';

/// Suffix for the companion lock record stored next to a key.
pub(crate) const LOCK_SUFFIX: &str = "_lock";

/// A normalized, path-safe cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Build a key from a namespace and a (possibly path-shaped) key string.
    ///
    /// Both parts are split on `/`; every piece is trimmed and empty or
    /// whitespace-only pieces are dropped before joining with `/`.
    pub fn new(namespace: &str, key: &str) -> Self {
        Self::from_segments(namespace, key.split(SEPARATOR))
    }

    /// Build a key from a namespace and ordered path segments.
    ///
    /// Segments may themselves contain separators; they are flattened into
    /// the same normal form as [`CacheKey::new`].
    pub fn from_segments<I, S>(namespace: &str, segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut normalized = String::new();
        let pieces = namespace
            .split(SEPARATOR)
            .map(str::to_owned)
            .chain(segments.into_iter().flat_map(|segment| {
                segment
                    .as_ref()
                    .split(SEPARATOR)
                    .map(str::to_owned)
                    .collect::<Vec<_>>()
            }));

        for piece in pieces {
            let piece = piece.trim();
            if piece.is_empty() {
                continue;
            }
            if !normalized.is_empty() {
                normalized.push(SEPARATOR);
            }
            normalized.push_str(piece);
        }

        Self(normalized)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The sibling key under which the advisory lock marker is stored.
    pub fn lock_key(&self) -> String {
        format!("{}{}", self.0, LOCK_SUFFIX)
    }

    /// Whether this key logically covers `other`: the key itself or any key
    /// nested under it.
    pub fn is_prefix_of(&self, other: &str) -> bool {
        other == self.0
            || other
                .strip_prefix(&self.0)
                .is_some_and(|rest| rest.starts_with(SEPARATOR))
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CacheKey {
    fn from(key: &str) -> Self {
        Self::new("", key)
    }
}

impl From<String> for CacheKey {
    fn from(key: String) -> Self {
        Self::new("", &key)
    }
}

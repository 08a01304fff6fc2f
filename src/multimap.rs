//! Key → set-of-values mapping with idempotent insertion
//!
//! Used for the grow-only schema bookkeeping: known schema bodies per
//! namespace, downloaded URLs per namespace, and pending imports
//! collected during compilation.

use std::collections::{HashMap, HashSet};
use std::hash::Hash;

/// A mapping from key to a set of values.
///
/// Inserting an existing (key, value) pair is a no-op, which is what
/// makes schema re-commits and overlapping import closures idempotent.
#[derive(Debug, Clone)]
pub struct MultiMap<K, V> {
    inner: HashMap<K, HashSet<V>>,
}

impl<K: Eq + Hash, V: Eq + Hash> MultiMap<K, V> {
    /// Create an empty map
    pub fn new() -> Self {
        Self {
            inner: HashMap::new(),
        }
    }

    /// Insert a value under a key; returns true if the pair was new
    pub fn insert(&mut self, key: K, value: V) -> bool {
        self.inner.entry(key).or_default().insert(value)
    }

    /// Whether any value is recorded under the key
    pub fn contains_key(&self, key: &K) -> bool {
        self.inner.contains_key(key)
    }

    /// Whether the exact (key, value) pair is recorded
    pub fn contains(&self, key: &K, value: &V) -> bool {
        self.inner.get(key).is_some_and(|set| set.contains(value))
    }

    /// The value set recorded under a key
    pub fn get(&self, key: &K) -> Option<&HashSet<V>> {
        self.inner.get(key)
    }

    /// Number of keys
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Whether the map has no keys
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Iterate over (key, value-set) entries
    pub fn iter(&self) -> impl Iterator<Item = (&K, &HashSet<V>)> {
        self.inner.iter()
    }

    /// Merge another map into this one
    pub fn extend(&mut self, other: MultiMap<K, V>) {
        for (key, values) in other.inner {
            self.inner.entry(key).or_default().extend(values);
        }
    }
}

impl<K: Eq + Hash, V: Eq + Hash> Default for MultiMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_idempotent() {
        let mut map: MultiMap<String, String> = MultiMap::new();
        assert!(map.insert("ns".to_string(), "url".to_string()));
        assert!(!map.insert("ns".to_string(), "url".to_string()));
        assert_eq!(map.get(&"ns".to_string()).unwrap().len(), 1);
    }

    #[test]
    fn test_multiple_values_per_key() {
        let mut map: MultiMap<&str, &str> = MultiMap::new();
        map.insert("ns", "a");
        map.insert("ns", "b");
        assert_eq!(map.get(&"ns").unwrap().len(), 2);
        assert!(map.contains(&"ns", &"a"));
        assert!(!map.contains(&"ns", &"c"));
    }

    #[test]
    fn test_extend() {
        let mut a: MultiMap<&str, &str> = MultiMap::new();
        a.insert("x", "1");
        let mut b: MultiMap<&str, &str> = MultiMap::new();
        b.insert("x", "2");
        b.insert("y", "3");
        a.extend(b);
        assert_eq!(a.len(), 2);
        assert_eq!(a.get(&"x").unwrap().len(), 2);
    }
}

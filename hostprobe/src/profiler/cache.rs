//! Per-profiler memo of repeated lookups.

use std::collections::HashMap;

use crate::transport::Row;

/// Exact parameters of a cached lookup.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Lookup {
    /// First row of a query.
    Value(String),
    /// Subkeys below a registry path.
    RegistryKeys(String),
    /// Values at a registry path.
    RegistryValues(String),
}

#[derive(Debug, Clone)]
enum Entry {
    Row(Option<Row>),
    Keys(Vec<String>),
    Values(Row),
}

/// Lookup results memoised for the life of a profiler.
#[derive(Debug, Default)]
pub struct LookupCache {
    entries: HashMap<Lookup, Entry>,
    hits: u64,
    misses: u64,
}

impl LookupCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached first row of `query`. The outer `None` means not cached.
    pub fn value(&mut self, query: &str) -> Option<Option<Row>> {
        match self.lookup(&Lookup::Value(query.to_string()))? {
            Entry::Row(row) => Some(row),
            _ => None,
        }
    }

    pub fn store_value(&mut self, query: &str, row: Option<Row>) {
        self.entries.insert(Lookup::Value(query.to_string()), Entry::Row(row));
    }

    pub fn registry_keys(&mut self, path: &str) -> Option<Vec<String>> {
        match self.lookup(&Lookup::RegistryKeys(path.to_string()))? {
            Entry::Keys(keys) => Some(keys),
            _ => None,
        }
    }

    pub fn store_registry_keys(&mut self, path: &str, keys: Vec<String>) {
        self.entries
            .insert(Lookup::RegistryKeys(path.to_string()), Entry::Keys(keys));
    }

    pub fn registry_values(&mut self, path: &str) -> Option<Row> {
        match self.lookup(&Lookup::RegistryValues(path.to_string()))? {
            Entry::Values(values) => Some(values),
            _ => None,
        }
    }

    pub fn store_registry_values(&mut self, path: &str, values: Row) {
        self.entries
            .insert(Lookup::RegistryValues(path.to_string()), Entry::Values(values));
    }

    /// Number of lookups answered from the cache.
    pub fn hits(&self) -> u64 {
        self.hits
    }

    /// Number of lookups that had to go to the session.
    pub fn misses(&self) -> u64 {
        self.misses
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn lookup(&mut self, key: &Lookup) -> Option<Entry> {
        match self.entries.get(key) {
            Some(entry) => {
                self.hits += 1;
                Some(entry.clone())
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::row;

    #[test]
    fn test_hit_and_miss_counters() {
        let mut cache = LookupCache::new();
        assert_eq!(cache.value("SELECT Name FROM Win32_Account"), None);

        cache.store_value("SELECT Name FROM Win32_Account", Some(row(&[("Name", "admin")])));
        let cached = cache.value("SELECT Name FROM Win32_Account").unwrap().unwrap();
        assert_eq!(cached["Name"], "admin");

        assert_eq!(cache.hits(), 1);
        assert_eq!(cache.misses(), 1);
    }

    #[test]
    fn test_negative_results_are_cached() {
        let mut cache = LookupCache::new();
        cache.store_value("q", None);
        assert_eq!(cache.value("q"), Some(None));
    }

    #[test]
    fn test_keys_are_distinct_per_lookup_kind() {
        let mut cache = LookupCache::new();
        cache.store_registry_keys(r"SOFTWARE\X", vec!["a".to_string()]);

        assert!(cache.registry_values(r"SOFTWARE\X").is_none());
        assert_eq!(cache.registry_keys(r"SOFTWARE\X"), Some(vec!["a".to_string()]));
        assert_eq!(cache.len(), 1);
    }
}

use crate::models::{Attribute, Dataset, Fact, Form, Function, Metric, Report, Table};
use rustc_hash::FxHashMap;
use serde::Serialize;
use std::collections::BTreeMap;
use std::hash::Hash;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::trace;

/// One bounded LRU store. Values are handed out as clones.
#[derive(Debug)]
pub struct Namespace<K, V> {
    name: &'static str,
    capacity: usize,
    entries: FxHashMap<K, (V, u64)>,
    /// last-use stamp -> key, oldest first
    recency: BTreeMap<u64, K>,
    clock: u64,
    hits: u64,
    misses: u64,
    evictions: u64,
}

impl<K, V> Namespace<K, V>
where
    K: Eq + Hash + Clone + std::fmt::Debug,
    V: Clone,
{
    pub fn new(name: &'static str, capacity: usize) -> Self {
        Self {
            name,
            capacity: capacity.max(1),
            entries: FxHashMap::default(),
            recency: BTreeMap::new(),
            clock: 0,
            hits: 0,
            misses: 0,
            evictions: 0,
        }
    }

    fn touch(&mut self, key: &K) {
        self.clock += 1;
        let stamp = self.clock;
        if let Some((_, last)) = self.entries.get_mut(key) {
            self.recency.remove(&*last);
            *last = stamp;
            self.recency.insert(stamp, key.clone());
        }
    }

    pub fn get(&mut self, key: &K) -> Option<V> {
        if self.entries.contains_key(key) {
            self.hits += 1;
            self.touch(key);
            self.entries.get(key).map(|(v, _)| v.clone())
        } else {
            self.misses += 1;
            None
        }
    }

    pub fn contains(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    pub fn insert(&mut self, key: K, value: V) {
        if let Some((slot, _)) = self.entries.get_mut(&key) {
            *slot = value;
            self.touch(&key);
            return;
        }
        if self.entries.len() >= self.capacity {
            if let Some((_, oldest)) = self.recency.pop_first() {
                trace!(namespace = self.name, key = ?oldest, "Evicting");
                self.entries.remove(&oldest);
                self.evictions += 1;
            }
        }
        self.clock += 1;
        self.recency.insert(self.clock, key.clone());
        self.entries.insert(key, (value, self.clock));
    }

    /// Returns the cached value, running `factory` only on a miss.
    pub fn get_or_compute<F>(&mut self, key: K, factory: F) -> V
    where
        F: FnOnce() -> V,
    {
        if let Some(v) = self.get(&key) {
            return v;
        }
        let value = factory();
        self.insert(key, value.clone());
        value
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn misses(&self) -> u64 {
        self.misses
    }

    pub fn evictions(&self) -> u64 {
        self.evictions
    }

    pub fn counters(&self) -> NamespaceCounters {
        NamespaceCounters {
            hits: self.hits,
            misses: self.misses,
            evictions: self.evictions,
            entries: self.entries.len() as u64,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct NamespaceCounters {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub entries: u64,
}

impl std::ops::AddAssign for NamespaceCounters {
    fn add_assign(&mut self, rhs: Self) {
        self.hits += rhs.hits;
        self.misses += rhs.misses;
        self.evictions += rhs.evictions;
        self.entries += rhs.entries;
    }
}

/// Per-extractor memoization, one namespace per entity type.
///
/// Attributes are keyed by `(dataset id, bound name)` since the same attribute
/// can be bound under different names; their forms are keyed by attribute id
/// so the form/table walk still happens once per attribute.
#[derive(Debug)]
pub struct ObjectCache {
    pub files: Namespace<PathBuf, Arc<str>>,
    pub reports: Namespace<String, Report>,
    pub datasets: Namespace<String, Dataset>,
    pub attributes: Namespace<(String, String), Attribute>,
    pub forms: Namespace<String, Vec<Form>>,
    pub metrics: Namespace<String, Metric>,
    pub facts: Namespace<String, Fact>,
    pub functions: Namespace<(String, String), Function>,
    pub tables: Namespace<String, Table>,
}

impl ObjectCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            files: Namespace::new("files", capacity),
            reports: Namespace::new("reports", capacity),
            datasets: Namespace::new("datasets", capacity),
            attributes: Namespace::new("attributes", capacity),
            forms: Namespace::new("forms", capacity),
            metrics: Namespace::new("metrics", capacity),
            facts: Namespace::new("facts", capacity),
            functions: Namespace::new("functions", capacity),
            tables: Namespace::new("tables", capacity),
        }
    }

    pub fn totals(&self) -> NamespaceCounters {
        let mut total = NamespaceCounters::default();
        for counters in [
            self.files.counters(),
            self.reports.counters(),
            self.datasets.counters(),
            self.attributes.counters(),
            self.forms.counters(),
            self.metrics.counters(),
            self.facts.counters(),
            self.functions.counters(),
            self.tables.counters(),
        ] {
            total += counters;
        }
        total
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn factory_runs_once_per_key() {
        let mut ns: Namespace<String, u32> = Namespace::new("t", 10);
        let calls = Cell::new(0);
        for _ in 0..4 {
            let v = ns.get_or_compute("a".to_string(), || {
                calls.set(calls.get() + 1);
                7
            });
            assert_eq!(v, 7);
        }
        assert_eq!(calls.get(), 1);
        assert_eq!(ns.hits(), 3);
        assert_eq!(ns.misses(), 1);
    }

    #[test]
    fn least_recently_used_is_evicted() {
        let mut ns: Namespace<u32, u32> = Namespace::new("t", 2);
        ns.insert(1, 10);
        ns.insert(2, 20);
        assert_eq!(ns.get(&1), Some(10));
        ns.insert(3, 30);
        assert!(ns.contains(&1));
        assert!(!ns.contains(&2));
        assert!(ns.contains(&3));
        assert_eq!(ns.evictions(), 1);
        assert_eq!(ns.len(), 2);
    }

    #[test]
    fn reinsert_updates_without_eviction() {
        let mut ns: Namespace<u32, u32> = Namespace::new("t", 2);
        ns.insert(1, 10);
        ns.insert(2, 20);
        ns.insert(1, 11);
        assert_eq!(ns.evictions(), 0);
        assert_eq!(ns.get(&1), Some(11));
    }

    #[test]
    fn zero_capacity_is_clamped() {
        let mut ns: Namespace<u32, u32> = Namespace::new("t", 0);
        ns.insert(1, 1);
        assert_eq!(ns.get(&1), Some(1));
    }

    #[test]
    fn totals_sum_namespaces() {
        let mut cache = ObjectCache::new(8);
        cache.tables.insert(
            "T1".into(),
            Table {
                id: "T1".into(),
                name: "FT_SALES".into(),
                location: "t.html".into(),
            },
        );
        cache.tables.get(&"T1".to_string());
        cache.metrics.get(&"M1".to_string());
        let totals = cache.totals();
        assert_eq!(totals.hits, 1);
        assert_eq!(totals.misses, 1);
        assert_eq!(totals.entries, 1);
    }
}

use std::collections::{BTreeMap, HashMap};

use crate::prober::ProbeResult;

struct CacheEntry {
    result: ProbeResult,
    tick: u64,
}

/// Bounded least-recently-used map from target URL to its prior probe result.
///
/// Recency is tracked with a monotonic tick per access: `entries` carries the
/// values, `recency` orders live keys oldest-first so eviction pops the least
/// recently accessed entry. A capacity of zero disables caching entirely.
pub struct LruResultCache {
    capacity: usize,
    tick: u64,
    entries: HashMap<String, CacheEntry>,
    recency: BTreeMap<u64, String>,
}

impl LruResultCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            tick: 0,
            entries: HashMap::new(),
            recency: BTreeMap::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn next_tick(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }

    /// Looks up a prior result and refreshes its recency.
    pub fn get(&mut self, target: &str) -> Option<ProbeResult> {
        if self.capacity == 0 {
            return None;
        }
        let tick = self.next_tick();
        let entry = self.entries.get_mut(target)?;
        self.recency.remove(&entry.tick);
        entry.tick = tick;
        self.recency.insert(tick, target.to_string());
        Some(entry.result.clone())
    }

    /// Inserts a result, evicting the least-recently-used entry first when at
    /// capacity.
    pub fn put(&mut self, target: &str, result: ProbeResult) {
        if self.capacity == 0 {
            return;
        }
        if let Some(existing) = self.entries.get(target) {
            self.recency.remove(&existing.tick);
        } else if self.entries.len() >= self.capacity {
            if let Some((_, evicted)) = self.recency.pop_first() {
                self.entries.remove(&evicted);
            }
        }
        let tick = self.next_tick();
        self.recency.insert(tick, target.to_string());
        self.entries.insert(
            target.to_string(),
            CacheEntry { result, tick },
        );
    }

    #[cfg(test)]
    fn contains(&self, target: &str) -> bool {
        self.entries.contains_key(target)
    }
}

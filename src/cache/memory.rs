use super::vector::ContextVector;
use crate::reward::CacheKey;
use std::collections::{BTreeMap, HashMap};

/// Bounded map that evicts the least-recently-accessed entry.
///
/// Every `get` and `insert` stamps the entry with a fresh tick; the
/// `recency` index orders keys by their last stamp so the eviction victim is
/// always its first element.
#[derive(Debug)]
pub struct LruTier {
    capacity: usize,
    tick: u64,
    entries: HashMap<CacheKey, (ContextVector, u64)>,
    recency: BTreeMap<u64, CacheKey>,
}

impl LruTier {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            tick: 0,
            entries: HashMap::with_capacity(capacity),
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

    pub fn contains(&self, key: &CacheKey) -> bool {
        self.entries.contains_key(key)
    }

    /// Look up without changing recency.
    pub fn peek(&self, key: &CacheKey) -> Option<ContextVector> {
        self.entries.get(key).map(|(vector, _)| vector.clone())
    }

    /// Look up and mark as most recently accessed.
    pub fn get(&mut self, key: &CacheKey) -> Option<ContextVector> {
        let next = self.next_tick();
        let (vector, stamp) = self.entries.get_mut(key)?;
        self.recency.remove(stamp);
        *stamp = next;
        self.recency.insert(next, key.clone());
        Some(vector.clone())
    }

    /// Insert or refresh; returns the evicted key, if any.
    pub fn insert(&mut self, key: CacheKey, vector: ContextVector) -> Option<CacheKey> {
        if self.capacity == 0 {
            return None;
        }
        let next = self.next_tick();
        if let Some((_, old_stamp)) = self.entries.get(&key) {
            self.recency.remove(old_stamp);
        }

        let mut evicted = None;
        if !self.entries.contains_key(&key) && self.entries.len() >= self.capacity {
            evicted = self.evict_oldest();
        }

        self.recency.insert(next, key.clone());
        self.entries.insert(key, (vector, next));
        evicted
    }

    pub fn remove(&mut self, key: &CacheKey) -> Option<ContextVector> {
        let (vector, stamp) = self.entries.remove(key)?;
        self.recency.remove(&stamp);
        Some(vector)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.recency.clear();
    }

    fn evict_oldest(&mut self) -> Option<CacheKey> {
        let (_, key) = self.recency.pop_first()?;
        self.entries.remove(&key);
        Some(key)
    }

    fn next_tick(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }
}

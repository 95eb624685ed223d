use std::collections::HashMap;
use std::hash::Hash;

/// Fill-once memoisation map.
///
/// Holds at most `capacity` entries. Once full, new keys are rejected;
/// nothing is ever evicted.
#[derive(Debug, Clone)]
pub struct BoundedCache<K, V> {
    entries: HashMap<K, V>,
    capacity: usize,
}

impl<K: Eq + Hash, V> BoundedCache<K, V> {
    pub fn new(capacity: usize) -> Self {
        BoundedCache {
            entries: HashMap::new(),
            capacity,
        }
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        self.entries.get(key)
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    /// Store `value` under `key`.
    ///
    /// Returns `false` (and drops the value) when the key is new and the
    /// cache is full. Existing keys are always overwritten.
    pub fn insert(&mut self, key: K, value: V) -> bool {
        if !self.entries.contains_key(&key) && self.is_full() {
            return false;
        }
        self.entries.insert(key, value);
        true
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.entries.len() >= self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Change the capacity. Shrinking below the current size empties the cache.
    pub fn set_capacity(&mut self, capacity: usize) {
        if capacity < self.entries.len() {
            self.entries.clear();
        }
        self.capacity = capacity;
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Hashable photon energy, compared bit for bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EnergyKey(u64);

impl From<f64> for EnergyKey {
    fn from(energy: f64) -> Self {
        // fold -0.0 onto 0.0
        EnergyKey((energy + 0.0).to_bits())
    }
}

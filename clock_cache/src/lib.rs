//! A bounded key/value cache with CLOCK (second chance) eviction.
//!
//! Capacity is expressed as a total *weight* chosen by the caller on every insert, usually the
//! approximate size of the entry in bytes, rather than as a number of entries. The number of
//! resident entries therefore varies with the size of what is stored.
//!
//! # Usage
//!
//! ```
//! use clock_cache::ClockCache;
//!
//! let cache = ClockCache::new(10);
//! cache.insert("a", 1, 4);
//! cache.insert("b", 2, 4);
//!
//! // reading `a` gives it a second chance
//! assert_eq!(cache.get(&"a"), Some(1));
//!
//! // no room for `c`: the hand clears the used bit of `a` and evicts `b`
//! cache.insert("c", 3, 4);
//! assert_eq!(cache.get(&"b"), None);
//! assert_eq!(cache.get(&"a"), Some(1));
//! assert_eq!(cache.get(&"c"), Some(3));
//! assert_eq!(cache.weight(), 8);
//! ```
//!
//! # Internals
//!
//! Entries live in a vector of slots that is walked as a ring by the clock hand. Every slot
//! carries a used bit which is set on a hit. When an insert needs room the hand sweeps the ring:
//! a slot with its used bit set has the bit cleared and is skipped, the first slot found with
//! the bit already clear is evicted. Freed slots are recycled by later inserts. A hash index
//! maps keys to slots for O(1) lookups.
//!
//! The slot ring, the used bits, the index and the hand form one unit of state guarded by a
//! single mutex. Lookups mutate the used bits so reads take the same lock as writes.
use std::{collections::HashMap, hash::Hash};

use parking_lot::Mutex;
use tracing::trace;

/// A concurrency-safe cache bounded by the sum of its entries' weights.
#[derive(Debug)]
pub struct ClockCache<K, V> {
    max_weight: u64,
    state: Mutex<ClockState<K, V>>,
}

impl<K, V> ClockCache<K, V>
where
    K: Clone + Eq + Hash,
    V: Clone,
{
    /// Create an empty cache that holds at most `max_weight` worth of entries.
    pub fn new(max_weight: u64) -> Self {
        Self {
            max_weight,
            state: Mutex::new(ClockState::default()),
        }
    }

    /// Look up `key`, marking its slot as recently used on a hit.
    pub fn get(&self, key: &K) -> Option<V> {
        let mut state = self.state.lock();
        let pos = *state.index.get(key)?;
        let slot = state.slots.get_mut(pos)?.as_mut()?;
        slot.used = true;
        Some(slot.value.clone())
    }

    /// Insert `value` under `key`, accounting `weight` against the capacity.
    ///
    /// An existing entry for `key` is replaced. Entries are evicted until the new one fits. An
    /// entry heavier than the whole cache is not stored at all, and any previous value for its
    /// key is dropped.
    pub fn insert(&self, key: K, value: V, weight: u64) {
        let mut state = self.state.lock();
        let used = state.remove(&key).is_some_and(|slot| slot.used);

        if weight > self.max_weight {
            trace!(
                weight,
                max_weight = self.max_weight,
                "rejecting cache entry heavier than the cache capacity"
            );
            return;
        }

        let mut evicted = 0_usize;
        while state.weight.saturating_add(weight) > self.max_weight {
            if state.evict_one().is_none() {
                break;
            }
            evicted += 1;
        }
        if evicted > 0 {
            trace!(
                evicted,
                resident = state.index.len(),
                weight = state.weight,
                "evicted cache entries"
            );
        }

        state.place(Slot {
            key,
            value,
            weight,
            used,
        });
    }

    /// Number of resident entries.
    pub fn len(&self) -> usize {
        self.state.lock().index.len()
    }

    /// Returns `true` if nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sum of the weights of all resident entries.
    pub fn weight(&self) -> u64 {
        self.state.lock().weight
    }

    /// The capacity this cache was created with.
    pub fn max_weight(&self) -> u64 {
        self.max_weight
    }
}

#[derive(Debug)]
struct Slot<K, V> {
    key: K,
    value: V,
    weight: u64,
    used: bool,
}

#[derive(Debug)]
struct ClockState<K, V> {
    index: HashMap<K, usize>,
    slots: Vec<Option<Slot<K, V>>>,
    /// Vacant positions in `slots`, reused before the ring grows.
    free: Vec<usize>,
    hand: usize,
    weight: u64,
}

impl<K, V> Default for ClockState<K, V> {
    fn default() -> Self {
        Self {
            index: HashMap::new(),
            slots: Vec::new(),
            free: Vec::new(),
            hand: 0,
            weight: 0,
        }
    }
}

impl<K, V> ClockState<K, V>
where
    K: Clone + Eq + Hash,
{
    fn remove(&mut self, key: &K) -> Option<Slot<K, V>> {
        let pos = self.index.remove(key)?;
        let slot = self.slots.get_mut(pos)?.take()?;
        self.free.push(pos);
        self.weight -= slot.weight;
        Some(slot)
    }

    fn place(&mut self, slot: Slot<K, V>) {
        let key = slot.key.clone();
        self.weight += slot.weight;

        let pos = match self.free.pop() {
            Some(pos) => {
                self.slots[pos] = Some(slot);
                pos
            }
            None => {
                self.slots.push(Some(slot));
                self.slots.len() - 1
            }
        };
        self.index.insert(key, pos);
    }

    /// Advance the hand until an entry without a second chance is found and evict it, returning
    /// the weight freed. Returns `None` only when the cache is empty.
    fn evict_one(&mut self) -> Option<u64> {
        if self.index.is_empty() {
            return None;
        }

        // Terminates within two sweeps: the first clears every used bit it passes.
        loop {
            if self.hand >= self.slots.len() {
                self.hand = 0;
            }
            let pos = self.hand;
            self.hand += 1;

            match self.slots[pos].as_mut() {
                None => continue,
                Some(slot) if slot.used => {
                    slot.used = false;
                    continue;
                }
                Some(_) => {}
            }

            let slot = self.slots[pos].take()?;
            self.index.remove(&slot.key);
            self.free.push(pos);
            self.weight -= slot.weight;
            return Some(slot.weight);
        }
    }
}

//! Bounded key-only recency list.
//!
//! Holds history records for blocks that are no longer resident. Built from
//! an [`IntrusiveList`] plus a key index.
//!
//! ```text
//!   index: FxHashMap<K, SlotId>        list: IntrusiveList<K>
//!                                      head ─► [A] ◄──► [B] ◄──► [C] ◄── tail
//!                                         MRU                       LRU
//! ```
//!
//! ## Behavior
//! - `record(k)`: moves `k` to MRU; when full, drops the LRU key and returns it
//! - `pop_lru()`: drops and returns the LRU key
//! - `remove(k)`: deletes `k` from list and index
//!
//! Callers that keep their own per-key records use the returned keys to erase
//! them, so a record never outlives its history entry.
use std::hash::Hash;

use rustc_hash::FxHashMap;

use crate::ds::intrusive_list::IntrusiveList;
use crate::ds::prealloc;
use crate::ds::slot_arena::SlotId;

#[derive(Debug)]
pub struct GhostList<K> {
    list: IntrusiveList<K>,
    index: FxHashMap<K, SlotId>,
    capacity: usize,
}

impl<K> GhostList<K>
where
    K: Eq + Hash + Clone,
{
    pub fn new(capacity: usize) -> Self {
        let reserve = prealloc(capacity);
        Self {
            list: IntrusiveList::with_capacity(reserve),
            index: FxHashMap::with_capacity_and_hasher(reserve, Default::default()),
            capacity,
        }
    }

    pub fn len(&self) -> usize {
        self.list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    pub fn contains(&self, key: &K) -> bool {
        self.index.contains_key(key)
    }

    /// Records `key` as most recently seen.
    ///
    /// Returns the key dropped from the LRU end to stay within capacity. With
    /// zero capacity the key itself is returned untracked.
    pub fn record(&mut self, key: K) -> Option<K> {
        if self.capacity == 0 {
            return Some(key);
        }

        if let Some(&id) = self.index.get(&key) {
            self.list.move_to_front(id);
            return None;
        }

        let dropped = if self.list.len() >= self.capacity {
            self.pop_lru()
        } else {
            None
        };

        let id = self.list.push_front(key.clone());
        self.index.insert(key, id);
        dropped
    }

    /// Removes and returns the least recently recorded key.
    pub fn pop_lru(&mut self) -> Option<K> {
        let key = self.list.pop_back()?;
        self.index.remove(&key);
        Some(key)
    }

    /// Removes `key`; returns `true` if it was present.
    pub fn remove(&mut self, key: &K) -> bool {
        match self.index.remove(key) {
            Some(id) => {
                self.list.remove(id);
                true
            },
            None => false,
        }
    }

    /// Iterates keys from MRU to LRU.
    pub fn iter(&self) -> impl Iterator<Item = &K> {
        self.list.iter()
    }

    #[cfg(any(test, debug_assertions))]
    pub fn debug_validate_invariants(&self) {
        self.list.debug_validate_invariants();
        assert_eq!(self.list.len(), self.index.len());
        assert!(self.list.len() <= self.capacity);
        for (key, &id) in &self.index {
            assert!(self.list.get(id) == Some(key), "index points at wrong node");
        }
    }
}

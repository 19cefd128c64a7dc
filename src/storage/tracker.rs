//! Expiry Tracker
//!
//! Keeps the set of keys that currently carry a finite TTL, in a form that
//! supports cheap uniform sampling: a dense vector for indexing plus a
//! key→position map for O(1) membership and removal.
//!
//! Removal swaps the last key into the freed slot. Sampling never depends on
//! the order of the vector, only on it being dense.

use bytes::Bytes;
use rand::Rng;
use std::collections::{HashMap, HashSet};

#[derive(Debug, Default)]
pub struct ExpiryTracker {
    keys: Vec<Bytes>,
    positions: HashMap<Bytes, usize>,
}

impl ExpiryTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts tracking `key`. Tracking an already tracked key is a no-op.
    pub fn add_key(&mut self, key: &Bytes) {
        if self.positions.contains_key(key) {
            return;
        }
        self.positions.insert(key.clone(), self.keys.len());
        self.keys.push(key.clone());
    }

    /// Stops tracking `key`. Untracked keys are ignored.
    pub fn remove_key(&mut self, key: &[u8]) {
        let Some(index) = self.positions.remove(key) else {
            return;
        };
        self.keys.swap_remove(index);
        if let Some(moved) = self.keys.get(index) {
            self.positions.insert(moved.clone(), index);
        }
    }

    pub fn contains(&self, key: &[u8]) -> bool {
        self.positions.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Picks up to `count` distinct tracked keys.
    ///
    /// Asking for at least as many keys as are tracked returns all of them.
    /// Otherwise each pick draws a random slot and, if that slot was already
    /// taken, probes forward (wrapping) to the next free one.
    pub fn select_keys(&self, count: usize) -> Vec<Bytes> {
        let size = self.keys.len();
        if count >= size {
            return self.keys.clone();
        }

        let mut rng = rand::rng();
        let mut chosen = HashSet::with_capacity(count);
        let mut selected = Vec::with_capacity(count);

        for _ in 0..count {
            let mut index = rng.random_range(0..size);
            while chosen.contains(&index) {
                index = (index + 1) % size;
            }
            chosen.insert(index);
            selected.push(self.keys[index].clone());
        }

        selected
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(i: usize) -> Bytes {
        Bytes::from(format!("key{}", i))
    }

    fn tracker_with(n: usize) -> ExpiryTracker {
        let mut tracker = ExpiryTracker::new();
        for i in 0..n {
            tracker.add_key(&key(i));
        }
        tracker
    }

    #[test]
    fn test_add_is_idempotent() {
        let mut tracker = ExpiryTracker::new();
        tracker.add_key(&key(1));
        tracker.add_key(&key(1));
        assert_eq!(tracker.len(), 1);
        assert!(tracker.contains(b"key1"));
    }

    #[test]
    fn test_remove_keeps_index_consistent() {
        let mut tracker = tracker_with(5);

        tracker.remove_key(b"key1");
        tracker.remove_key(b"key1");
        tracker.remove_key(b"missing");
        assert_eq!(tracker.len(), 4);
        assert!(!tracker.contains(b"key1"));

        // key4 was moved into slot 1; removing it must still work.
        tracker.remove_key(b"key4");
        assert_eq!(tracker.len(), 3);

        let mut rest = tracker.select_keys(10);
        rest.sort();
        assert_eq!(rest, vec![key(0), key(2), key(3)]);
    }

    #[test]
    fn test_select_all_when_count_covers_everything() {
        let tracker = tracker_with(3);
        assert_eq!(tracker.select_keys(3).len(), 3);
        assert_eq!(tracker.select_keys(20).len(), 3);
        assert!(ExpiryTracker::new().select_keys(20).is_empty());
    }

    #[test]
    fn test_select_sample_is_distinct() {
        let tracker = tracker_with(100);
        for _ in 0..50 {
            let sample = tracker.select_keys(20);
            assert_eq!(sample.len(), 20);
            let unique: HashSet<_> = sample.iter().collect();
            assert_eq!(unique.len(), 20);
            assert!(sample.iter().all(|k| tracker.contains(k)));
        }
    }

    #[test]
    fn test_select_nearly_everything() {
        let tracker = tracker_with(21);
        let unique: HashSet<_> = tracker.select_keys(20).into_iter().collect();
        assert_eq!(unique.len(), 20);
    }
}

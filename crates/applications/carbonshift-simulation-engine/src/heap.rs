//! Keyed binary min-heap
//!
//! Backs the queued (keyed by start time) and running (keyed by end time)
//! collections of the event scheduler. Items with equal keys pop in
//! insertion order so repeated runs visit events identically.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// Heap entry: orders by key, then by insertion sequence
#[derive(Debug)]
struct Entry<K, T> {
    key: K,
    seq: u64,
    item: T,
}

// BinaryHeap is a max-heap; reverse both comparisons to pop the smallest first
impl<K: Ord, T> Ord for Entry<K, T> {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .key
            .cmp(&self.key)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl<K: Ord, T> PartialOrd for Entry<K, T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<K: Ord, T> Eq for Entry<K, T> {}

impl<K: Ord, T> PartialEq for Entry<K, T> {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key && self.seq == other.seq
    }
}

/// Min-priority collection keyed by `K`
#[derive(Debug)]
pub struct MinHeap<K: Ord, T> {
    entries: BinaryHeap<Entry<K, T>>,
    next_seq: u64,
}

impl<K: Ord, T> MinHeap<K, T> {
    pub fn new() -> Self {
        MinHeap {
            entries: BinaryHeap::new(),
            next_seq: 0,
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        MinHeap {
            entries: BinaryHeap::with_capacity(capacity),
            next_seq: 0,
        }
    }

    pub fn push(&mut self, key: K, item: T) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.entries.push(Entry { key, seq, item });
    }

    /// Smallest key and its item, without removing them
    pub fn peek(&self) -> Option<(&K, &T)> {
        self.entries.peek().map(|e| (&e.key, &e.item))
    }

    pub fn peek_key(&self) -> Option<&K> {
        self.entries.peek().map(|e| &e.key)
    }

    /// Remove and return the item with the smallest key
    pub fn pop(&mut self) -> Option<(K, T)> {
        self.entries.pop().map(|e| (e.key, e.item))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Items in arbitrary order
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.entries.iter().map(|e| &e.item)
    }
}

impl<K: Ord, T> Default for MinHeap<K, T> {
    fn default() -> Self {
        Self::new()
    }
}

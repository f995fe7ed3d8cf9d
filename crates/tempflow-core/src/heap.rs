//! Binary min-heap for the k-way merge of per-edge interaction streams.
//!
//! Entries are `(key, tag)` pairs stored in a dense array, where `key` is the
//! timestamp of an edge's current interaction and `tag` identifies the stream.
//! Unlike `std::collections::BinaryHeap`, the root can be rewritten in place
//! and sifted down, which is the hot path when a stream is not yet exhausted.
//!
//! Ordering is by key, then by tag, so equal timestamps pop in ascending
//! tag order and a merge is fully deterministic.

use std::cmp::Ordering;

/// One heap entry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeapEntry {
    pub key: f64,
    pub tag: u32,
}

impl HeapEntry {
    fn cmp_key(&self, other: &HeapEntry) -> Ordering {
        self.key
            .total_cmp(&other.key)
            .then_with(|| self.tag.cmp(&other.tag))
    }
}

/// Min-heap keyed on a float with an integer tag.
#[derive(Debug, Clone, Default)]
pub struct MergeHeap {
    entries: Vec<HeapEntry>,
}

impl MergeHeap {
    pub fn new() -> Self {
        MergeHeap {
            entries: Vec::new(),
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        MergeHeap {
            entries: Vec::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the smallest entry without removing it.
    pub fn peek(&self) -> Option<HeapEntry> {
        self.entries.first().copied()
    }

    /// Appends an entry and sifts it up while it is smaller than its parent.
    pub fn insert(&mut self, key: f64, tag: u32) {
        self.entries.push(HeapEntry { key, tag });
        self.sift_up(self.entries.len() - 1);
    }

    /// Overwrites the root's key and sifts it down. The tag is kept.
    ///
    /// Does nothing on an empty heap.
    pub fn replace_top(&mut self, key: f64) {
        if let Some(root) = self.entries.first_mut() {
            root.key = key;
            self.sift_down(0);
        }
    }

    /// Removes and returns the root; the last entry takes its place.
    pub fn remove_top(&mut self) -> Option<HeapEntry> {
        if self.entries.is_empty() {
            return None;
        }
        let top = self.entries.swap_remove(0);
        if !self.entries.is_empty() {
            self.sift_down(0);
        }
        Some(top)
    }

    fn sift_up(&mut self, mut pos: usize) {
        while pos > 0 {
            let parent = (pos - 1) / 2;
            if self.entries[pos].cmp_key(&self.entries[parent]) == Ordering::Less {
                self.entries.swap(pos, parent);
                pos = parent;
            } else {
                break;
            }
        }
    }

    fn sift_down(&mut self, mut pos: usize) {
        let len = self.entries.len();
        loop {
            let left = 2 * pos + 1;
            if left >= len {
                break;
            }
            let right = left + 1;
            let smallest = if right < len
                && self.entries[right].cmp_key(&self.entries[left]) == Ordering::Less
            {
                right
            } else {
                left
            };
            if self.entries[smallest].cmp_key(&self.entries[pos]) == Ordering::Less {
                self.entries.swap(pos, smallest);
                pos = smallest;
            } else {
                break;
            }
        }
    }
}

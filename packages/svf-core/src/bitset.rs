//! Sparse bitset backing the `PointsTo` value (C1).
//!
//! Hybrid representation: a sorted `Vec<u32>` with a small unsorted
//! "pending" buffer for O(1) amortized insert, consolidated in batch
//! rather than sorted on every insert.
//!
//! Every mutating set operation that can grow the set reports whether
//! it did, so solvers can re-enqueue on change without recomputing a
//! diff afterwards (the "did-change" contract of spec.md §3 and §5:
//! "no update must be issued unless the predicate is honored,
//! otherwise the worklist fails to converge").
//!
//! # References
//! - Briggs & Torczon, "An Efficient Representation for Sparse Sets"
//! - Hardekopf & Lin, "The Ant and the Grasshopper" (PLDI 2007)

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

const PENDING_FLUSH_THRESHOLD: usize = 16;

/// An immutable-looking, mutably-built set of dense `u32` identifiers.
///
/// Despite the name this is not a bit-per-slot dense bitvector; it is
/// the sparse/hybrid scheme used throughout points-to analyses where
/// set sizes are usually small relative to the id universe.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PointsTo {
    elements: Vec<u32>,
    #[serde(skip)]
    pending: Vec<u32>,
    #[serde(skip)]
    dirty: bool,
}

impl PointsTo {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn singleton(elem: u32) -> Self {
        Self {
            elements: vec![elem],
            pending: Vec::new(),
            dirty: false,
        }
    }

    pub fn from_iter(iter: impl IntoIterator<Item = u32>) -> Self {
        let mut elements: Vec<u32> = iter.into_iter().collect();
        elements.sort_unstable();
        elements.dedup();
        Self {
            elements,
            pending: Vec::new(),
            dirty: false,
        }
    }

    fn consolidate(&mut self) {
        if !self.dirty {
            return;
        }
        self.pending.sort_unstable();
        self.pending.dedup();

        if self.elements.is_empty() {
            std::mem::swap(&mut self.elements, &mut self.pending);
        } else {
            let mut merged = Vec::with_capacity(self.elements.len() + self.pending.len());
            let (mut i, mut j) = (0, 0);
            while i < self.elements.len() && j < self.pending.len() {
                match self.elements[i].cmp(&self.pending[j]) {
                    Ordering::Less => {
                        merged.push(self.elements[i]);
                        i += 1;
                    }
                    Ordering::Greater => {
                        merged.push(self.pending[j]);
                        j += 1;
                    }
                    Ordering::Equal => {
                        merged.push(self.elements[i]);
                        i += 1;
                        j += 1;
                    }
                }
            }
            merged.extend_from_slice(&self.elements[i..]);
            merged.extend_from_slice(&self.pending[j..]);
            self.elements = merged;
            self.pending.clear();
        }
        self.dirty = false;
    }

    fn maybe_consolidate(&mut self) {
        if self.pending.len() >= PENDING_FLUSH_THRESHOLD {
            self.consolidate();
        }
    }

    /// Insert a single element. Returns `true` iff it was not already
    /// present (the did-change contract).
    #[inline]
    pub fn insert(&mut self, elem: u32) -> bool {
        if !self.dirty && self.elements.binary_search(&elem).is_ok() {
            return false;
        }
        if self.pending.contains(&elem) {
            return false;
        }
        self.pending.push(elem);
        self.dirty = true;
        self.maybe_consolidate();
        true
    }

    pub fn remove(&mut self, elem: u32) -> bool {
        self.consolidate();
        match self.elements.binary_search(&elem) {
            Ok(pos) => {
                self.elements.remove(pos);
                true
            }
            Err(_) => false,
        }
    }

    #[inline]
    pub fn contains(&self, elem: u32) -> bool {
        if self.pending.contains(&elem) {
            return true;
        }
        self.elements.binary_search(&elem).is_ok()
    }

    pub fn len(&self) -> usize {
        if !self.dirty {
            return self.elements.len();
        }
        let mut count = self.elements.len();
        for &p in &self.pending {
            if self.elements.binary_search(&p).is_err() {
                count += 1;
            }
        }
        count
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty() && self.pending.is_empty()
    }

    pub fn clear(&mut self) {
        self.elements.clear();
        self.pending.clear();
        self.dirty = false;
    }

    /// Iterate set bits in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        let pending_sorted = if self.dirty {
            let mut p = self.pending.clone();
            p.sort_unstable();
            p.dedup();
            p
        } else {
            Vec::new()
        };
        MergedIter {
            sorted: self.elements.iter().copied().peekable(),
            pending: pending_sorted.into_iter().peekable(),
        }
    }

    /// `self |= other`. Returns `true` iff `self` grew — the did-
    /// change contract solvers rely on to drive worklist re-enqueue.
    pub fn union_with(&mut self, other: &PointsTo) -> bool {
        if other.is_empty() {
            return false;
        }
        self.consolidate();
        let other_sorted = other.sorted_view();

        if self.elements.is_empty() {
            self.elements = other_sorted;
            return !self.elements.is_empty();
        }

        let before = self.elements.len();
        let mut merged = Vec::with_capacity(self.elements.len() + other_sorted.len());
        let (mut i, mut j) = (0, 0);
        while i < self.elements.len() && j < other_sorted.len() {
            match self.elements[i].cmp(&other_sorted[j]) {
                Ordering::Less => {
                    merged.push(self.elements[i]);
                    i += 1;
                }
                Ordering::Greater => {
                    merged.push(other_sorted[j]);
                    j += 1;
                }
                Ordering::Equal => {
                    merged.push(self.elements[i]);
                    i += 1;
                    j += 1;
                }
            }
        }
        merged.extend_from_slice(&self.elements[i..]);
        merged.extend_from_slice(&other_sorted[j..]);
        self.elements = merged;
        self.elements.len() != before
    }

    pub fn intersect_with(&mut self, other: &PointsTo) {
        self.consolidate();
        if self.elements.is_empty() {
            return;
        }
        let other_sorted = other.sorted_view();
        let mut result = Vec::new();
        let (mut i, mut j) = (0, 0);
        while i < self.elements.len() && j < other_sorted.len() {
            match self.elements[i].cmp(&other_sorted[j]) {
                Ordering::Less => i += 1,
                Ordering::Greater => j += 1,
                Ordering::Equal => {
                    result.push(self.elements[i]);
                    i += 1;
                    j += 1;
                }
            }
        }
        self.elements = result;
    }

    pub fn intersection(&self, other: &PointsTo) -> PointsTo {
        let mut r = self.clone();
        r.intersect_with(other);
        r
    }

    /// `self \= other` (set difference).
    pub fn difference_with(&mut self, other: &PointsTo) {
        self.consolidate();
        if self.elements.is_empty() || other.is_empty() {
            return;
        }
        let other_sorted = other.sorted_view();
        let mut result = Vec::with_capacity(self.elements.len());
        let mut j = 0;
        for &e in &self.elements {
            while j < other_sorted.len() && other_sorted[j] < e {
                j += 1;
            }
            if j >= other_sorted.len() || other_sorted[j] != e {
                result.push(e);
            } else {
                j += 1;
            }
        }
        self.elements = result;
    }

    pub fn difference(&self, other: &PointsTo) -> PointsTo {
        let mut r = self.clone();
        r.difference_with(other);
        r
    }

    pub fn intersects(&self, other: &PointsTo) -> bool {
        if self.is_empty() || other.is_empty() {
            return false;
        }
        for e in self.iter() {
            if other.contains(e) {
                return true;
            }
        }
        false
    }

    pub fn is_subset_of(&self, other: &PointsTo) -> bool {
        if self.len() > other.len() {
            return false;
        }
        self.iter().all(|e| other.contains(e))
    }

    fn sorted_view(&self) -> Vec<u32> {
        if !self.dirty {
            return self.elements.clone();
        }
        self.iter().collect()
    }
}

struct MergedIter<A: Iterator<Item = u32>, B: Iterator<Item = u32>> {
    sorted: std::iter::Peekable<A>,
    pending: std::iter::Peekable<B>,
}

impl<A: Iterator<Item = u32>, B: Iterator<Item = u32>> Iterator for MergedIter<A, B> {
    type Item = u32;

    fn next(&mut self) -> Option<u32> {
        match (self.sorted.peek(), self.pending.peek()) {
            (Some(&s), Some(&p)) => {
                if s < p {
                    self.sorted.next()
                } else if p < s {
                    self.pending.next()
                } else {
                    self.sorted.next();
                    self.pending.next()
                }
            }
            (Some(_), None) => self.sorted.next(),
            (None, Some(_)) => self.pending.next(),
            (None, None) => None,
        }
    }
}

impl FromIterator<u32> for PointsTo {
    fn from_iter<T: IntoIterator<Item = u32>>(iter: T) -> Self {
        PointsTo::from_iter(iter)
    }
}

impl Extend<u32> for PointsTo {
    fn extend<T: IntoIterator<Item = u32>>(&mut self, iter: T) {
        for e in iter {
            self.insert(e);
        }
    }
}

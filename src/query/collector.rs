//! Bounded top-K collection of scored documents

use crate::index::types::{DocId, SearchResult};
use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

/// Hard upper bound on results a single collector keeps
pub const COLLECTOR_CAPACITY: usize = 100;

#[derive(Debug, Clone, Copy)]
struct Scored(SearchResult);

impl PartialEq for Scored {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Scored {}

impl PartialOrd for Scored {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Scored {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.score.total_cmp(&other.0.score)
    }
}

/// Keeps the best `capacity` (doc_id, score) pairs seen so far.
///
/// Internally a min-heap on score, so the weakest kept hit is evicted first.
/// Order among equal scores is unspecified.
#[derive(Debug)]
pub struct TopK {
    capacity: usize,
    heap: BinaryHeap<Reverse<Scored>>,
}

impl TopK {
    /// Collector yielding at most `min(limit, COLLECTOR_CAPACITY)` hits
    pub fn new(limit: usize) -> Self {
        let capacity = limit.min(COLLECTOR_CAPACITY);
        Self {
            capacity,
            heap: BinaryHeap::with_capacity(capacity + 1),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Lowest score still kept, once the collector is full
    pub fn threshold(&self) -> Option<f32> {
        if self.heap.len() < self.capacity {
            None
        } else {
            self.heap.peek().map(|Reverse(s)| s.0.score)
        }
    }

    #[inline]
    pub fn push(&mut self, doc_id: DocId, score: f32) {
        if self.capacity == 0 || score.is_nan() {
            return;
        }
        if let Some(min) = self.threshold() {
            if score <= min {
                return;
            }
        }
        self.heap.push(Reverse(Scored(SearchResult { doc_id, score })));
        if self.heap.len() > self.capacity {
            self.heap.pop();
        }
    }

    /// Hits sorted by descending score
    pub fn into_sorted_vec(self) -> Vec<SearchResult> {
        // Ascending order of Reverse<Scored> is descending score
        self.heap
            .into_sorted_vec()
            .into_iter()
            .map(|Reverse(s)| s.0)
            .collect()
    }
}

impl Extend<SearchResult> for TopK {
    fn extend<T: IntoIterator<Item = SearchResult>>(&mut self, iter: T) {
        for hit in iter {
            self.push(hit.doc_id, hit.score);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keeps_best_sorted_descending() {
        let mut top = TopK::new(3);
        for (doc, score) in [(0, 1.0), (1, 5.0), (2, 3.0), (3, 4.0), (4, 0.5)] {
            top.push(doc, score);
        }
        let hits = top.into_sorted_vec();
        let docs: Vec<_> = hits.iter().map(|h| h.doc_id).collect();
        assert_eq!(docs, vec![1, 3, 2]);
    }

    #[test]
    fn test_capacity_is_capped() {
        let mut top = TopK::new(1000);
        assert_eq!(top.capacity(), COLLECTOR_CAPACITY);
        for i in 0..500 {
            top.push(i, i as f32);
        }
        let hits = top.into_sorted_vec();
        assert_eq!(hits.len(), COLLECTOR_CAPACITY);
        assert_eq!(hits[0].doc_id, 499);
    }

    #[test]
    fn test_zero_limit_collects_nothing() {
        let mut top = TopK::new(0);
        top.push(1, 10.0);
        assert!(top.into_sorted_vec().is_empty());
    }

    #[test]
    fn test_threshold_and_nan() {
        let mut top = TopK::new(2);
        top.push(0, f32::NAN);
        assert!(top.is_empty());
        top.push(1, 2.0);
        assert_eq!(top.threshold(), None);
        top.push(2, 1.0);
        assert_eq!(top.threshold(), Some(1.0));
        top.push(3, 0.5);
        assert_eq!(top.len(), 2);
    }

    #[test]
    fn test_extend_merges_result_sets() {
        let mut top = TopK::new(2);
        top.extend(vec![
            SearchResult { doc_id: 7, score: 1.0 },
            SearchResult { doc_id: 8, score: 3.0 },
            SearchResult { doc_id: 9, score: 2.0 },
        ]);
        let hits = top.into_sorted_vec();
        assert_eq!(hits[0].doc_id, 8);
        assert_eq!(hits[1].doc_id, 9);
    }
}

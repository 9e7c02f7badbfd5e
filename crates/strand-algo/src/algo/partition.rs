// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Dragonscale Team

//! Work partitioning of the dense node id space into contiguous batches.

use std::ops::Range;

/// Contiguous, half-open range of internal node ids handed to one worker.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NodeBatch {
    pub start: u32,
    pub end: u32,
}

impl NodeBatch {
    pub fn new(start: u32, end: u32) -> Self {
        debug_assert!(start <= end, "batch start {start} after end {end}");
        Self { start, end }
    }

    #[inline]
    pub fn len(&self) -> usize {
        (self.end - self.start) as usize
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    #[inline]
    pub fn contains(&self, node: u32) -> bool {
        (self.start..self.end).contains(&node)
    }

    /// Node ids of this batch in ascending order.
    #[inline]
    pub fn iter(&self) -> Range<u32> {
        self.start..self.end
    }
}

impl IntoIterator for NodeBatch {
    type Item = u32;
    type IntoIter = Range<u32>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Split `[0, node_count)` into ascending batches of at most `batch_size` nodes.
///
/// The last batch takes the remainder. A `batch_size` of zero is treated as one.
/// `node_count` must not exceed `u32::MAX`.
pub fn partition(node_count: usize, batch_size: usize) -> Vec<NodeBatch> {
    debug_assert!(u32::try_from(node_count).is_ok(), "{node_count} nodes exceed u32 ids");
    let batch_size = batch_size.max(1);
    let mut batches = Vec::with_capacity(node_count.div_ceil(batch_size));
    let mut start = 0usize;
    while start < node_count {
        let end = (start + batch_size).min(node_count);
        batches.push(NodeBatch::new(start as u32, end as u32));
        start = end;
    }
    batches
}

/// Batch size spreading `node_count` nodes evenly over `concurrency` workers,
/// but never below `min_batch_size`.
pub fn adjusted_batch_size(node_count: usize, concurrency: usize, min_batch_size: usize) -> usize {
    let per_worker = node_count.div_ceil(concurrency.max(1));
    per_worker.max(min_batch_size).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partition_covers_range() {
        let batches = partition(10, 3);
        assert_eq!(
            batches,
            vec![
                NodeBatch::new(0, 3),
                NodeBatch::new(3, 6),
                NodeBatch::new(6, 9),
                NodeBatch::new(9, 10),
            ]
        );
        assert_eq!(batches.iter().map(NodeBatch::len).sum::<usize>(), 10);
    }

    #[test]
    fn test_partition_exact_multiple() {
        let batches = partition(8, 4);
        assert_eq!(batches, vec![NodeBatch::new(0, 4), NodeBatch::new(4, 8)]);
    }

    #[test]
    fn test_partition_empty_and_zero_batch() {
        assert!(partition(0, 16).is_empty());
        assert_eq!(partition(3, 0).len(), 3);
    }

    #[test]
    fn test_partition_is_deterministic() {
        assert_eq!(partition(1_001, 37), partition(1_001, 37));
    }

    #[test]
    fn test_adjusted_batch_size() {
        assert_eq!(adjusted_batch_size(100, 4, 1), 25);
        assert_eq!(adjusted_batch_size(101, 4, 1), 26);
        assert_eq!(adjusted_batch_size(100, 4, 64), 64);
        assert_eq!(adjusted_batch_size(0, 4, 0), 1);
    }

    #[test]
    fn test_batch_iter() {
        let batch = NodeBatch::new(5, 8);
        assert_eq!(batch.into_iter().collect::<Vec<_>>(), vec![5, 6, 7]);
        assert!(batch.contains(7));
        assert!(!batch.contains(8));
    }
}

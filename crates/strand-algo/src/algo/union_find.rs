// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Dragonscale Team

//! Lock-free disjoint-set forest over internal node ids.
//!
//! Every node has a key, `(seed, index)` with unseeded nodes sorting after all
//! seeded ones. A parent link always points at a node with a strictly smaller
//! key, so concurrent unions and path compression can never close a cycle, and
//! the root of each set is the member with the smallest key. Without seeds
//! that is the smallest index in the set.
//!
//! Parent slots are `AtomicU32`; unions link a root with compare-and-swap and
//! retry from fresh roots on conflict.

use fxhash::FxHashMap;
use std::sync::atomic::{AtomicU32, Ordering};

/// Key of a node without a seed.
const UNSEEDED: u64 = u64::MAX;

/// Concurrent union-find with path compression.
#[derive(Debug)]
pub struct ConcurrentUnionFind {
    parents: Vec<AtomicU32>,
    /// Seed per node, `UNSEEDED` when absent. `None` when no seeding is used.
    seeds: Option<Vec<u64>>,
}

impl ConcurrentUnionFind {
    /// Every node starts as its own singleton set.
    ///
    /// `node_count` must not exceed `u32::MAX`.
    pub fn new(node_count: usize) -> Self {
        debug_assert!(u32::try_from(node_count).is_ok(), "{node_count} nodes exceed u32 ids");
        Self {
            parents: (0..node_count as u32).map(AtomicU32::new).collect(),
            seeds: None,
        }
    }

    /// Start from seeded sets: nodes sharing a seed are unioned up front and
    /// the lowest seed wins whenever two seeded sets merge.
    ///
    /// Seeds must be below `u64::MAX`.
    pub fn with_seeds(seeds: &[Option<u64>]) -> Self {
        let keys = seeds
            .iter()
            .map(|seed| match seed {
                Some(s) => {
                    debug_assert!(*s != UNSEEDED, "seed {s} is reserved");
                    *s
                }
                None => UNSEEDED,
            })
            .collect();
        let uf = Self {
            parents: (0..seeds.len() as u32).map(AtomicU32::new).collect(),
            seeds: Some(keys),
        };

        let mut first_with_seed: FxHashMap<u64, u32> = FxHashMap::default();
        for (node, seed) in seeds.iter().enumerate() {
            if let Some(seed) = seed {
                let node = node as u32;
                let first = *first_with_seed.entry(*seed).or_insert(node);
                uf.union(first, node);
            }
        }
        uf
    }

    /// Number of nodes.
    #[inline]
    pub fn len(&self) -> usize {
        self.parents.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.parents.is_empty()
    }

    /// Seed assigned to `node`, if seeding is used and the node has one.
    #[inline]
    pub fn seed_of(&self, node: u32) -> Option<u64> {
        self.seeds
            .as_ref()
            .map(|seeds| seeds[node as usize])
            .filter(|&seed| seed != UNSEEDED)
    }

    /// Whether `a` sorts before `b` and therefore survives as root.
    #[inline]
    fn precedes(&self, a: u32, b: u32) -> bool {
        match &self.seeds {
            Some(seeds) => (seeds[a as usize], a) < (seeds[b as usize], b),
            None => a < b,
        }
    }

    #[inline]
    fn parent(&self, node: u32) -> u32 {
        self.parents[node as usize].load(Ordering::Acquire)
    }

    #[inline]
    pub fn is_root(&self, node: u32) -> bool {
        self.parent(node) == node
    }

    /// Root of the set containing `node`.
    ///
    /// Every node visited on the way is re-pointed at the root found. A failed
    /// compare-and-swap means another thread already moved that slot closer to
    /// the root, so it is left alone.
    pub fn find(&self, node: u32) -> u32 {
        let mut root = node;
        loop {
            let parent = self.parent(root);
            if parent == root {
                break;
            }
            root = parent;
        }

        let mut current = node;
        while current != root {
            let parent = self.parent(current);
            if parent != root {
                let _ = self.parents[current as usize].compare_exchange(
                    parent,
                    root,
                    Ordering::AcqRel,
                    Ordering::Relaxed,
                );
            }
            current = parent;
        }
        root
    }

    /// Representative of `node` once all unions are done. Same as [`find`](Self::find).
    #[inline]
    pub fn set_id_of(&self, node: u32) -> u32 {
        self.find(node)
    }

    /// Merge the sets of `a` and `b`. Returns `false` if they were already one set.
    pub fn union(&self, a: u32, b: u32) -> bool {
        let mut winner = self.find(a);
        let mut loser = self.find(b);
        loop {
            if winner == loser {
                return false;
            }
            if self.precedes(loser, winner) {
                std::mem::swap(&mut winner, &mut loser);
            }
            match self.parents[loser as usize].compare_exchange(
                loser,
                winner,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return true,
                Err(_) => {
                    // `loser` got linked elsewhere meanwhile; retry from fresh roots
                    winner = self.find(winner);
                    loser = self.find(loser);
                }
            }
        }
    }

    /// Whether `a` and `b` are currently in the same set.
    pub fn same_set(&self, a: u32, b: u32) -> bool {
        self.find(a) == self.find(b)
    }

    /// Number of disjoint sets. Only meaningful once no union is in flight.
    pub fn component_count(&self) -> usize {
        (0..self.len() as u32).filter(|&n| self.is_root(n)).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rayon::prelude::*;

    #[test]
    fn test_singletons() {
        let uf = ConcurrentUnionFind::new(4);
        assert_eq!(uf.component_count(), 4);
        for n in 0..4 {
            assert_eq!(uf.find(n), n);
        }
    }

    #[test]
    fn test_union_reports_merge() {
        let uf = ConcurrentUnionFind::new(4);
        assert!(uf.union(0, 1));
        assert!(!uf.union(1, 0));
        assert!(uf.union(2, 3));
        assert!(uf.union(3, 1));
        assert!(!uf.union(0, 2));
        assert_eq!(uf.component_count(), 1);
    }

    #[test]
    fn test_smallest_index_is_root() {
        let uf = ConcurrentUnionFind::new(6);
        uf.union(5, 4);
        uf.union(4, 3);
        uf.union(3, 1);
        assert_eq!(uf.find(5), 1);
        assert_eq!(uf.find(0), 0);
        assert!(uf.is_root(1));
    }

    #[test]
    fn test_path_compression() {
        let uf = ConcurrentUnionFind::new(5);
        // Chain 4 -> 3 -> 2 -> 1 -> 0 built by linking roots directly.
        for n in (1..5).rev() {
            uf.parents[n as usize].store(n - 1, Ordering::Release);
        }
        assert_eq!(uf.find(4), 0);
        for n in 1..5 {
            assert_eq!(uf.parent(n), 0);
        }
    }

    #[test]
    fn test_find_is_idempotent() {
        let uf = ConcurrentUnionFind::new(100);
        for n in 1..100 {
            uf.union(n, (n * 7) % 13);
        }
        let first: Vec<u32> = (0..100).map(|n| uf.set_id_of(n)).collect();
        let second: Vec<u32> = (0..100).map(|n| uf.set_id_of(n)).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_seeds_preunion_and_lowest_wins() {
        let seeds = [Some(7), None, Some(7), Some(3), None];
        let uf = ConcurrentUnionFind::with_seeds(&seeds);
        assert!(uf.same_set(0, 2));
        assert_eq!(uf.component_count(), 4);

        uf.union(2, 3);
        let root = uf.find(0);
        assert_eq!(root, 3);
        assert_eq!(uf.seed_of(root), Some(3));

        // Seeded sets beat unseeded ones regardless of index.
        uf.union(1, 0);
        assert_eq!(uf.seed_of(uf.find(1)), Some(3));
        assert_eq!(uf.seed_of(4), None);
    }

    #[test]
    fn test_concurrent_chain_unions() {
        let n = 10_000u32;
        let uf = ConcurrentUnionFind::new(n as usize);
        (1..n).into_par_iter().for_each(|i| {
            uf.union(i, i - 1);
        });
        assert_eq!(uf.component_count(), 1);
        assert!((0..n).all(|i| uf.find(i) == 0));
    }

    #[test]
    fn test_concurrent_matches_sequential() {
        let n = 4_096u32;
        let pairs: Vec<(u32, u32)> = (0..n)
            .map(|i| (i, (i.wrapping_mul(2_654_435_761) >> 7) % n))
            .filter(|(a, b)| a % 3 == 0 || b % 5 == 0)
            .collect();

        let sequential = ConcurrentUnionFind::new(n as usize);
        for &(a, b) in &pairs {
            sequential.union(a, b);
        }

        let concurrent = ConcurrentUnionFind::new(n as usize);
        pairs.par_iter().for_each(|&(a, b)| {
            concurrent.union(a, b);
        });

        for i in 0..n {
            assert_eq!(sequential.find(i), concurrent.find(i));
        }
    }
}

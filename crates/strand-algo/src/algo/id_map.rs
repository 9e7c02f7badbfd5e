// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Dragonscale Team

//! Translation between the caller's node ids and the `u32` slots projections
//! index their arrays with.
//!
//! Slots are handed out in insertion order. While ids arrive in ascending
//! order the slot table alone answers reverse lookups by binary search, so the
//! hash index can be released once loading is done.

use fxhash::FxHashMap;
use strand_common::core::id::NodeId;
use tracing::{debug, warn};

/// How `NodeId -> slot` lookups are answered.
#[derive(Debug, Clone)]
enum SlotIndex {
    Hashed(FxHashMap<NodeId, u32>),
    /// Slot table is strictly ascending; binary search it.
    Sorted,
}

/// Node id to slot table with an optional hash index.
///
/// ```
/// use strand_algo::IdMap;
/// use strand_common::NodeId;
///
/// let mut id_map: IdMap = [NodeId::new(7), NodeId::new(42)].into_iter().collect();
/// id_map.compact();
///
/// assert_eq!(id_map.to_slot(NodeId::new(42)), Some(1));
/// assert_eq!(id_map.to_node(0), Some(NodeId::new(7)));
/// assert!(id_map.is_compacted());
/// ```
#[derive(Debug, Clone)]
pub struct IdMap {
    nodes: Vec<NodeId>,
    index: SlotIndex,
    ascending: bool,
}

impl IdMap {
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            nodes: Vec::with_capacity(capacity),
            index: SlotIndex::Hashed(FxHashMap::with_capacity_and_hasher(
                capacity,
                Default::default(),
            )),
            ascending: true,
        }
    }

    /// Slot of `node`, assigning the next free one on first sight.
    ///
    /// A compacted map keeps working: ids above the current maximum are
    /// appended, anything else rebuilds the hash index first.
    pub fn insert(&mut self, node: NodeId) -> u32 {
        if let Some(slot) = self.to_slot(node) {
            return slot;
        }
        let after_last = self.nodes.last().is_none_or(|last| *last < node);
        self.ascending &= after_last;

        let slot = self.nodes.len() as u32;
        if self.is_compacted() && !after_last {
            debug!(nodes = self.nodes.len(), "Rebuilding IdMap hash index");
            self.index = SlotIndex::Hashed(self.hashed());
        }
        if let SlotIndex::Hashed(map) = &mut self.index {
            map.insert(node, slot);
        }
        self.nodes.push(node);
        slot
    }

    fn hashed(&self) -> FxHashMap<NodeId, u32> {
        self.iter().map(|(slot, node)| (node, slot)).collect()
    }

    #[inline]
    pub fn to_slot(&self, node: NodeId) -> Option<u32> {
        match &self.index {
            SlotIndex::Hashed(map) => map.get(&node).copied(),
            SlotIndex::Sorted => self.nodes.binary_search(&node).ok().map(|i| i as u32),
        }
    }

    #[inline]
    pub fn to_node(&self, slot: u32) -> Option<NodeId> {
        self.nodes.get(slot as usize).copied()
    }

    /// Like [`IdMap::to_node`] for slots known to be in range.
    #[inline]
    pub fn to_node_unchecked(&self, slot: u32) -> NodeId {
        self.nodes[slot as usize]
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    #[inline]
    pub fn contains(&self, node: NodeId) -> bool {
        self.to_slot(node).is_some()
    }

    /// Whether slots follow id order.
    #[inline]
    pub fn is_sorted(&self) -> bool {
        self.ascending
    }

    #[inline]
    pub fn is_compacted(&self) -> bool {
        matches!(self.index, SlotIndex::Sorted)
    }

    /// Release the hash index when slots follow id order. Otherwise the index
    /// stays and a warning is logged.
    pub fn compact(&mut self) {
        if !self.ascending {
            warn!(
                nodes = self.nodes.len(),
                "IdMap ids are out of order; keeping the hash index"
            );
            return;
        }
        self.index = SlotIndex::Sorted;
    }

    /// `(slot, node)` pairs in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, NodeId)> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .map(|(slot, &node)| (slot as u32, node))
    }

    /// Approximate heap footprint in bytes.
    pub fn memory_size(&self) -> usize {
        let table = self.nodes.capacity() * std::mem::size_of::<NodeId>();
        let index = match &self.index {
            // key, value and one control byte per bucket
            SlotIndex::Hashed(map) => {
                map.capacity() * (std::mem::size_of::<NodeId>() + std::mem::size_of::<u32>() + 1)
            }
            SlotIndex::Sorted => 0,
        };
        table + index
    }
}

impl Default for IdMap {
    fn default() -> Self {
        Self::new()
    }
}

impl FromIterator<NodeId> for IdMap {
    fn from_iter<I: IntoIterator<Item = NodeId>>(iter: I) -> Self {
        let iter = iter.into_iter();
        let mut map = Self::with_capacity(iter.size_hint().0);
        for node in iter {
            map.insert(node);
        }
        map
    }
}

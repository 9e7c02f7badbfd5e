// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Dragonscale Team

//! Read contract for graphs consumed by algorithms.
//!
//! [`Graph`] is the minimal capability every algorithm needs: node count and
//! relationship traversal. Degree and existence checks have default
//! implementations in terms of traversal so test doubles only implement what
//! they exercise. Richer capabilities live in extension traits:
//!
//! - [`IdMapping`]: original id lookups
//! - [`WeightedGraph`]: relationship weights
//! - [`NodePropertyGraph`]: per-node numeric properties and schema
//! - [`RelationshipIntersect`]: common-neighbor enumeration
//!
//! All traversal takes a visitor returning `bool`: `true` to continue, `false`
//! to stop early.

use crate::algo::partition::{NodeBatch, partition};
use std::error::Error as StdError;
use strand_common::core::id::NodeId;
use strand_common::core::schema::{NodeSchema, NumberType};
use thiserror::Error;
use tracing::trace;

/// Traversal direction relative to stored relationships.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Direction {
    #[default]
    Outgoing,
    Incoming,
    /// Outgoing followed by incoming.
    Both,
}

/// Failure of the graph to satisfy a traversal request.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageFault {
    #[error("Direction {direction:?} was not loaded for this graph")]
    DirectionNotLoaded { direction: Direction },

    #[error("Node {node} is out of range for graph with {node_count} nodes")]
    NodeOutOfRange { node: u32, node_count: usize },

    #[error("Adjacency of node {node} is unavailable: {message}")]
    Corrupt {
        node: u32,
        message: String,
        #[source]
        source: Option<Box<dyn StdError + Send + Sync>>,
    },
}

impl StorageFault {
    /// Wrap an arbitrary cause raised while reading the adjacency of `node`.
    pub fn corrupt(node: u32, cause: impl Into<Box<dyn StdError + Send + Sync>>) -> Self {
        let cause = cause.into();
        Self::Corrupt {
            node,
            message: cause.to_string(),
            source: Some(cause),
        }
    }
}

/// Minimal read capability shared by every graph representation.
pub trait Graph: Sync {
    /// Number of nodes; internal ids are `0..node_count()`.
    fn node_count(&self) -> usize;

    /// Total stored relationships, if known.
    fn relationship_count(&self) -> Option<usize> {
        None
    }

    /// Call `visitor(node, neighbor)` for every neighbor of `node` in `direction`
    /// until the visitor returns `false`.
    fn for_each_relationship<F>(
        &self,
        node: u32,
        direction: Direction,
        visitor: F,
    ) -> Result<(), StorageFault>
    where
        F: FnMut(u32, u32) -> bool;

    /// Neighbor count of `node` in `direction`.
    ///
    /// `None` means the direction is unavailable, which is different from
    /// `Some(0)`.
    fn degree(&self, node: u32, direction: Direction) -> Option<u32> {
        let mut degree = 0u32;
        match self.for_each_relationship(node, direction, |_, _| {
            degree += 1;
            true
        }) {
            Ok(()) => Some(degree),
            Err(_) => None,
        }
    }

    /// Whether `target` is a neighbor of `source` in `direction`, or the
    /// fault that prevented the check.
    fn try_exists(&self, source: u32, target: u32, direction: Direction) -> Result<bool, StorageFault> {
        let mut found = false;
        self.for_each_relationship(source, direction, |_, neighbor| {
            found = neighbor == target;
            !found
        })?;
        Ok(found)
    }

    /// Whether `target` is a neighbor of `source` in `direction`.
    ///
    /// A storage fault reads as `false` and is logged at `trace`; use
    /// [`Graph::try_exists`] to tell the two apart.
    fn exists(&self, source: u32, target: u32, direction: Direction) -> bool {
        self.try_exists(source, target, direction)
            .unwrap_or_else(|fault| {
                trace!(source, target, ?direction, error = %fault, "Existence check failed");
                false
            })
    }

    /// Whether `node` is a valid internal id.
    #[inline]
    fn contains_node(&self, node: u32) -> bool {
        (node as usize) < self.node_count()
    }

    /// Visit nodes in ascending order until `predicate` returns `false`.
    ///
    /// Slots past `u32::MAX` are not addressable and never visited.
    fn for_each_node<F>(&self, mut predicate: F)
    where
        F: FnMut(u32) -> bool,
    {
        let end = u32::try_from(self.node_count()).unwrap_or(u32::MAX);
        for node in 0..end {
            if !predicate(node) {
                break;
            }
        }
    }

    /// Disjoint batches covering every node.
    fn batch_iterables(&self, batch_size: usize) -> Vec<NodeBatch> {
        partition(self.node_count(), batch_size)
    }
}

/// Mapping between original ids and internal slots.
pub trait IdMapping {
    fn to_internal(&self, node: NodeId) -> Option<u32>;

    fn to_original(&self, slot: u32) -> Option<NodeId>;

    fn contains(&self, node: NodeId) -> bool {
        self.to_internal(node).is_some()
    }
}

/// Graphs carrying one `f64` property per relationship.
pub trait WeightedGraph: Graph {
    fn has_relationship_weights(&self) -> bool;

    /// Like [`Graph::for_each_relationship`] with the relationship weight.
    ///
    /// `fallback` is passed when the graph carries no weights.
    fn for_each_weighted_relationship<F>(
        &self,
        node: u32,
        direction: Direction,
        fallback: f64,
        visitor: F,
    ) -> Result<(), StorageFault>
    where
        F: FnMut(u32, u32, f64) -> bool;

    /// Weight of the first stored `source -> target` relationship, or `fallback`.
    fn relationship_property(&self, source: u32, target: u32, fallback: f64) -> f64;
}

/// Single value of a numeric node property.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PropertyValue {
    Long(i64),
    Double(f64),
}

impl PropertyValue {
    pub fn number_type(&self) -> NumberType {
        match self {
            PropertyValue::Long(_) => NumberType::Integer,
            PropertyValue::Double(_) => NumberType::Floating,
        }
    }

    pub fn as_f64(&self) -> f64 {
        match *self {
            PropertyValue::Long(v) => v as f64,
            PropertyValue::Double(v) => v,
        }
    }
}

impl From<i64> for PropertyValue {
    fn from(v: i64) -> Self {
        PropertyValue::Long(v)
    }
}

impl From<f64> for PropertyValue {
    fn from(v: f64) -> Self {
        PropertyValue::Double(v)
    }
}

/// Dense column of a node property, indexed by slot. `None` marks a node
/// without the property.
#[derive(Clone, Debug, PartialEq)]
pub enum PropertyColumn {
    Long(Vec<Option<i64>>),
    Double(Vec<Option<f64>>),
}

impl PropertyColumn {
    pub fn len(&self) -> usize {
        match self {
            PropertyColumn::Long(v) => v.len(),
            PropertyColumn::Double(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn number_type(&self) -> NumberType {
        match self {
            PropertyColumn::Long(_) => NumberType::Integer,
            PropertyColumn::Double(_) => NumberType::Floating,
        }
    }

    #[inline]
    pub fn long_value(&self, slot: u32) -> Option<i64> {
        match self {
            PropertyColumn::Long(v) => v.get(slot as usize).copied().flatten(),
            PropertyColumn::Double(_) => None,
        }
    }

    #[inline]
    pub fn double_value(&self, slot: u32) -> Option<f64> {
        match self {
            PropertyColumn::Long(v) => v.get(slot as usize).copied().flatten().map(|x| x as f64),
            PropertyColumn::Double(v) => v.get(slot as usize).copied().flatten(),
        }
    }
}

/// Graphs carrying numeric node properties.
pub trait NodePropertyGraph {
    fn node_property(&self, key: &str) -> Option<&PropertyColumn>;

    fn available_node_properties(&self) -> Vec<&str>;

    fn node_schema(&self) -> &NodeSchema;
}

/// Common-neighbor enumeration built on early-stopping traversal.
pub trait RelationshipIntersect: Graph {
    /// Call `visitor(m)` for every `m` adjacent to both `a` and `b` in
    /// `direction`, until it returns `false`.
    ///
    /// Walks the smaller adjacency and looks up each neighbor on the other
    /// side with [`Graph::exists`]. Parallel relationships report a neighbor once per
    /// stored copy on the walked side.
    fn for_each_common_neighbor<F>(
        &self,
        a: u32,
        b: u32,
        direction: Direction,
        mut visitor: F,
    ) -> Result<(), StorageFault>
    where
        F: FnMut(u32) -> bool,
    {
        let degree_a = self
            .degree(a, direction)
            .ok_or(StorageFault::DirectionNotLoaded { direction })?;
        let degree_b = self
            .degree(b, direction)
            .ok_or(StorageFault::DirectionNotLoaded { direction })?;
        let (walk, other) = if degree_a <= degree_b { (a, b) } else { (b, a) };

        self.for_each_relationship(walk, direction, |_, m| {
            if m == other || !self.exists(other, m, direction) {
                return true;
            }
            visitor(m)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Star graph with only outgoing edges from node 0.
    struct Star {
        leaves: u32,
    }

    impl Graph for Star {
        fn node_count(&self) -> usize {
            self.leaves as usize + 1
        }

        fn for_each_relationship<F>(
            &self,
            node: u32,
            direction: Direction,
            mut visitor: F,
        ) -> Result<(), StorageFault>
        where
            F: FnMut(u32, u32) -> bool,
        {
            if direction != Direction::Outgoing {
                return Err(StorageFault::DirectionNotLoaded { direction });
            }
            if node == 0 {
                for leaf in 1..=self.leaves {
                    if !visitor(0, leaf) {
                        break;
                    }
                }
            }
            Ok(())
        }
    }

    #[test]
    fn test_default_degree_distinguishes_unavailable() {
        let star = Star { leaves: 3 };
        assert_eq!(star.degree(0, Direction::Outgoing), Some(3));
        assert_eq!(star.degree(1, Direction::Outgoing), Some(0));
        assert_eq!(star.degree(0, Direction::Incoming), None);
    }

    #[test]
    fn test_default_exists_stops_early() {
        let star = Star { leaves: 5 };
        assert!(star.exists(0, 2, Direction::Outgoing));
        assert!(!star.exists(2, 0, Direction::Outgoing));
        assert!(!star.exists(0, 2, Direction::Incoming));
    }

    #[test]
    fn test_try_exists_reports_fault() {
        let star = Star { leaves: 2 };
        assert!(matches!(star.try_exists(0, 1, Direction::Outgoing), Ok(true)));
        assert!(matches!(star.try_exists(1, 0, Direction::Outgoing), Ok(false)));
        assert!(matches!(
            star.try_exists(0, 1, Direction::Incoming),
            Err(StorageFault::DirectionNotLoaded {
                direction: Direction::Incoming
            })
        ));
    }

    #[test]
    fn test_for_each_node_stops() {
        let star = Star { leaves: 9 };
        let mut seen = Vec::new();
        star.for_each_node(|n| {
            seen.push(n);
            n < 3
        });
        assert_eq!(seen, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_batch_iterables_cover_nodes() {
        let star = Star { leaves: 9 };
        let batches = star.batch_iterables(4);
        assert_eq!(batches.len(), 3);
        assert_eq!(batches.last().map(|b| b.end), Some(10));
    }

    #[test]
    fn test_corrupt_keeps_cause() {
        let fault = StorageFault::corrupt(4, "disk on fire");
        let source = fault.source().expect("cause");
        assert_eq!(source.to_string(), "disk on fire");
        assert!(fault.to_string().contains("node 4"));
    }

    #[test]
    fn test_property_column_access() {
        let longs = PropertyColumn::Long(vec![Some(3), None]);
        assert_eq!(longs.long_value(0), Some(3));
        assert_eq!(longs.long_value(1), None);
        assert_eq!(longs.long_value(7), None);
        assert_eq!(longs.double_value(0), Some(3.0));

        let doubles = PropertyColumn::Double(vec![Some(0.5)]);
        assert_eq!(doubles.long_value(0), None);
        assert_eq!(doubles.number_type(), NumberType::Floating);
    }
}

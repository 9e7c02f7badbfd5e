// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Dragonscale Team

//! Graph Projection - Dense CSR representation for algorithm execution.
//!
//! A `GraphProjection` is a materialized, algorithm-optimized view of a graph.
//! It provides:
//! - Dense node indexing (0..V) for efficient array-based state
//! - CSR format for cache-friendly neighbor iteration
//! - Outgoing, incoming, both or undirected adjacency depending on the load
//! - Optional relationship weights
//! - Optional numeric node property columns
//!
//! Once built, a projection is immutable and is read concurrently without locks.

use crate::algo::IdMap;
use crate::algo::graph::{
    Direction, Graph, IdMapping, NodePropertyGraph, PropertyColumn, PropertyValue,
    RelationshipIntersect, StorageFault, WeightedGraph,
};
use anyhow::Result;
use fxhash::FxHashMap;
use strand_common::config::AlgorithmConfig;
use strand_common::core::id::NodeId;
use strand_common::core::schema::{ALL_NODES_LABEL, NodeSchema, NumberType};
use strand_common::StrandError;
use tracing::{debug, instrument};

/// Edge list for CSR construction: (source_slot, target_slot, weight).
type WeightedEdgeList = Vec<(u32, u32, f64)>;

/// Which adjacency lists a projection materializes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LoadDirection {
    /// Outgoing lists only.
    #[default]
    Outgoing,
    /// Incoming lists only.
    Incoming,
    /// Separate outgoing and incoming lists.
    Both,
    /// One symmetric list per node serving every direction.
    Undirected,
}

/// Configuration for building a graph projection.
#[derive(Debug, Clone)]
pub struct ProjectionConfig {
    /// Adjacency lists to build
    pub load_direction: LoadDirection,
    /// Weight stored for relationships added without one, when the projection is weighted
    pub default_weight: f64,
    /// Maximum nodes accepted by `build`
    pub max_nodes: usize,
    /// Maximum bytes of the built projection
    pub max_memory: usize,
}

impl Default for ProjectionConfig {
    fn default() -> Self {
        let limits = AlgorithmConfig::default();
        Self {
            load_direction: LoadDirection::default(),
            default_weight: 1.0,
            max_nodes: limits.max_vertices,
            max_memory: limits.max_projection_memory,
        }
    }
}

/// One direction of adjacency in CSR form.
#[derive(Debug, Clone)]
pub(crate) struct Adjacency {
    pub(crate) offsets: Vec<u32>, // [V+1] node slot -> edge start
    pub(crate) targets: Vec<u32>, // [E] neighbor slots
    pub(crate) weights: Option<Vec<f64>>,
}

impl Adjacency {
    fn empty(node_count: usize) -> Self {
        Self {
            offsets: vec![0; node_count + 1],
            targets: Vec::new(),
            weights: None,
        }
    }

    #[inline]
    fn range(&self, slot: u32) -> std::ops::Range<usize> {
        self.offsets[slot as usize] as usize..self.offsets[slot as usize + 1] as usize
    }

    #[inline]
    pub(crate) fn neighbors(&self, slot: u32) -> &[u32] {
        &self.targets[self.range(slot)]
    }

    #[inline]
    pub(crate) fn weights(&self, slot: u32) -> Option<&[f64]> {
        let range = self.range(slot);
        self.weights.as_ref().map(|w| &w[range])
    }

    #[inline]
    fn degree(&self, slot: u32) -> u32 {
        self.offsets[slot as usize + 1] - self.offsets[slot as usize]
    }

    fn memory_size(&self) -> usize {
        self.offsets.len() * 4
            + self.targets.len() * 4
            + self.weights.as_ref().map_or(0, |w| w.len() * 8)
    }
}

/// Dense CSR representation optimized for algorithm execution.
#[derive(Debug)]
pub struct GraphProjection {
    /// Number of nodes in the projection
    pub(crate) node_count: usize,

    /// Number of relationships as added to the builder (before mirroring)
    pub(crate) relationship_count: usize,

    pub(crate) load_direction: LoadDirection,

    /// Outgoing lists, or the symmetric lists of an undirected load
    pub(crate) outgoing: Option<Adjacency>,

    /// Incoming lists
    pub(crate) incoming: Option<Adjacency>,

    /// Identity mapping
    pub(crate) id_map: IdMap,

    pub(crate) node_properties: FxHashMap<String, PropertyColumn>,
    pub(crate) node_schema: NodeSchema,
}

impl GraphProjection {
    /// Number of nodes in the projection.
    #[inline]
    pub fn node_count(&self) -> usize {
        self.node_count
    }

    /// Number of stored adjacency entries across materialized lists.
    #[inline]
    pub fn edge_count(&self) -> usize {
        self.outgoing
            .as_ref()
            .or(self.incoming.as_ref())
            .map_or(0, |adj| adj.targets.len())
    }

    #[inline]
    pub fn load_direction(&self) -> LoadDirection {
        self.load_direction
    }

    /// Outgoing neighbors of a node (by slot); empty if not loaded.
    #[inline]
    pub fn out_neighbors(&self, slot: u32) -> &[u32] {
        self.outgoing
            .as_ref()
            .map(|adj| adj.neighbors(slot))
            .unwrap_or(&[])
    }

    /// Incoming neighbors of a node (by slot); empty if not loaded.
    #[inline]
    pub fn in_neighbors(&self, slot: u32) -> &[u32] {
        match self.load_direction {
            LoadDirection::Undirected => self.out_neighbors(slot),
            _ => self
                .incoming
                .as_ref()
                .map(|adj| adj.neighbors(slot))
                .unwrap_or(&[]),
        }
    }

    /// Check if weights are available.
    #[inline]
    pub fn has_weights(&self) -> bool {
        self.outgoing
            .as_ref()
            .or(self.incoming.as_ref())
            .is_some_and(|adj| adj.weights.is_some())
    }

    /// Map slot back to the original id.
    #[inline]
    pub fn to_node(&self, slot: u32) -> NodeId {
        self.id_map.to_node_unchecked(slot)
    }

    /// Map an original id to its slot.
    #[inline]
    pub fn to_slot(&self, node: NodeId) -> Option<u32> {
        self.id_map.to_slot(node)
    }

    /// Slot of `node`, failing when it is not part of the projection.
    pub fn require_slot(&self, node: NodeId) -> strand_common::Result<u32> {
        self.id_map.to_slot(node).ok_or(StrandError::NodeNotFound {
            node: node.as_u64(),
        })
    }

    /// Iterate over all nodes as (slot, original id).
    pub fn nodes(&self) -> impl Iterator<Item = (u32, NodeId)> + '_ {
        self.id_map.iter()
    }

    pub fn id_map(&self) -> &IdMap {
        &self.id_map
    }

    /// Memory usage in bytes.
    pub fn memory_size(&self) -> usize {
        let properties: usize = self
            .node_properties
            .values()
            .map(|col| col.len() * 16)
            .sum();
        self.outgoing.as_ref().map_or(0, Adjacency::memory_size)
            + self.incoming.as_ref().map_or(0, Adjacency::memory_size)
            + self.id_map.memory_size()
            + properties
    }

    /// Adjacency lists serving `direction`, in visiting order.
    fn lists(&self, direction: Direction) -> Result<[Option<&Adjacency>; 2], StorageFault> {
        let out = self.outgoing.as_ref();
        let inc = self.incoming.as_ref();
        let lists = match (self.load_direction, direction) {
            (LoadDirection::Undirected, _) => [out, None],
            (LoadDirection::Outgoing, Direction::Outgoing) => [out, None],
            (LoadDirection::Incoming, Direction::Incoming) => [inc, None],
            (LoadDirection::Both, Direction::Outgoing) => [out, None],
            (LoadDirection::Both, Direction::Incoming) => [inc, None],
            (LoadDirection::Both, Direction::Both) => [out, inc],
            _ => return Err(StorageFault::DirectionNotLoaded { direction }),
        };
        Ok(lists)
    }

    #[inline]
    fn check_node(&self, node: u32) -> Result<(), StorageFault> {
        if (node as usize) < self.node_count {
            Ok(())
        } else {
            Err(StorageFault::NodeOutOfRange {
                node,
                node_count: self.node_count,
            })
        }
    }
}

impl Graph for GraphProjection {
    #[inline]
    fn node_count(&self) -> usize {
        self.node_count
    }

    fn relationship_count(&self) -> Option<usize> {
        Some(self.relationship_count)
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
        self.check_node(node)?;
        for adj in self.lists(direction)?.into_iter().flatten() {
            for &target in adj.neighbors(node) {
                if !visitor(node, target) {
                    return Ok(());
                }
            }
        }
        Ok(())
    }

    fn degree(&self, node: u32, direction: Direction) -> Option<u32> {
        if !self.contains_node(node) {
            return None;
        }
        let lists = self.lists(direction).ok()?;
        Some(lists.into_iter().flatten().map(|adj| adj.degree(node)).sum())
    }

    fn try_exists(&self, source: u32, target: u32, direction: Direction) -> Result<bool, StorageFault> {
        self.check_node(source)?;
        Ok(self
            .lists(direction)?
            .into_iter()
            .flatten()
            .any(|adj| adj.neighbors(source).contains(&target)))
    }
}

impl WeightedGraph for GraphProjection {
    fn has_relationship_weights(&self) -> bool {
        self.has_weights()
    }

    fn for_each_weighted_relationship<F>(
        &self,
        node: u32,
        direction: Direction,
        fallback: f64,
        mut visitor: F,
    ) -> Result<(), StorageFault>
    where
        F: FnMut(u32, u32, f64) -> bool,
    {
        self.check_node(node)?;
        for adj in self.lists(direction)?.into_iter().flatten() {
            let targets = adj.neighbors(node);
            match adj.weights(node) {
                Some(weights) => {
                    for (&target, &weight) in targets.iter().zip(weights) {
                        if !visitor(node, target, weight) {
                            return Ok(());
                        }
                    }
                }
                None => {
                    for &target in targets {
                        if !visitor(node, target, fallback) {
                            return Ok(());
                        }
                    }
                }
            }
        }
        Ok(())
    }

    fn relationship_property(&self, source: u32, target: u32, fallback: f64) -> f64 {
        if !self.contains_node(source) || !self.contains_node(target) {
            return fallback;
        }
        // Outgoing-capable loads store source -> target under source,
        // incoming-only loads store it under target.
        let (adj, owner, wanted) = match (&self.outgoing, &self.incoming) {
            (Some(out), _) => (out, source, target),
            (None, Some(inc)) => (inc, target, source),
            (None, None) => return fallback,
        };
        let Some(weights) = adj.weights(owner) else {
            return fallback;
        };
        adj.neighbors(owner)
            .iter()
            .position(|&n| n == wanted)
            .map_or(fallback, |idx| weights[idx])
    }
}

impl IdMapping for GraphProjection {
    #[inline]
    fn to_internal(&self, node: NodeId) -> Option<u32> {
        self.id_map.to_slot(node)
    }

    #[inline]
    fn to_original(&self, slot: u32) -> Option<NodeId> {
        self.id_map.to_node(slot)
    }
}

impl NodePropertyGraph for GraphProjection {
    fn node_property(&self, key: &str) -> Option<&PropertyColumn> {
        self.node_properties.get(key)
    }

    fn available_node_properties(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.node_properties.keys().map(|k| k.as_str()).collect();
        keys.sort_unstable();
        keys
    }

    fn node_schema(&self) -> &NodeSchema {
        &self.node_schema
    }
}

impl RelationshipIntersect for GraphProjection {}

/// Builder for constructing a `GraphProjection` from loaded nodes and relationships.
///
/// Node ids are sorted and deduplicated before slots are assigned, so the
/// resulting id map is compacted. Relationships whose endpoints were never
/// added as nodes are skipped.
#[derive(Debug, Default)]
pub struct ProjectionBuilder {
    nodes: Vec<NodeId>,
    labels: FxHashMap<NodeId, String>,
    properties: Vec<(NodeId, String, PropertyValue)>,
    relationships: Vec<(NodeId, NodeId, Option<f64>)>,
    config: ProjectionConfig,
}

impl ProjectionBuilder {
    /// Create a new projection builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Take node and memory limits from the algorithm configuration.
    pub fn with_limits(mut self, limits: &AlgorithmConfig) -> Self {
        self.config.max_nodes = limits.max_vertices;
        self.config.max_memory = limits.max_projection_memory;
        self
    }

    /// Set which adjacency lists to build.
    pub fn load_direction(mut self, direction: LoadDirection) -> Self {
        self.config.load_direction = direction;
        self
    }

    /// Weight used for unweighted relationships in a weighted projection.
    pub fn default_weight(mut self, weight: f64) -> Self {
        self.config.default_weight = weight;
        self
    }

    /// Set the maximum number of nodes.
    pub fn max_nodes(mut self, max: usize) -> Self {
        self.config.max_nodes = max;
        self
    }

    /// Add a node without a label.
    pub fn node(mut self, id: impl Into<NodeId>) -> Self {
        self.nodes.push(id.into());
        self
    }

    /// Add many unlabeled nodes.
    pub fn nodes<I>(mut self, ids: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<NodeId>,
    {
        self.nodes.extend(ids.into_iter().map(Into::into));
        self
    }

    /// Add a node carrying `label` for the node schema.
    pub fn labeled_node(mut self, id: impl Into<NodeId>, label: &str) -> Self {
        let id = id.into();
        self.nodes.push(id);
        self.labels.insert(id, label.to_string());
        self
    }

    /// Set a numeric property on a node, adding the node if needed.
    pub fn node_property(
        mut self,
        id: impl Into<NodeId>,
        key: &str,
        value: impl Into<PropertyValue>,
    ) -> Self {
        let id = id.into();
        self.nodes.push(id);
        self.properties.push((id, key.to_string(), value.into()));
        self
    }

    /// Add a relationship without a weight.
    pub fn relationship(mut self, source: impl Into<NodeId>, target: impl Into<NodeId>) -> Self {
        self.relationships.push((source.into(), target.into(), None));
        self
    }

    /// Add many unweighted relationships.
    pub fn relationships<I, N>(mut self, pairs: I) -> Self
    where
        I: IntoIterator<Item = (N, N)>,
        N: Into<NodeId>,
    {
        self.relationships
            .extend(pairs.into_iter().map(|(s, t)| (s.into(), t.into(), None)));
        self
    }

    /// Add a relationship with a weight. Any weighted relationship makes the
    /// projection weighted.
    pub fn weighted_relationship(
        mut self,
        source: impl Into<NodeId>,
        target: impl Into<NodeId>,
        weight: f64,
    ) -> Self {
        self.relationships
            .push((source.into(), target.into(), Some(weight)));
        self
    }

    /// Build the projection.
    #[instrument(
        skip(self),
        fields(
            node_count = tracing::field::Empty,
            relationship_count = tracing::field::Empty,
            skipped = tracing::field::Empty
        )
    )]
    pub fn build(self) -> Result<GraphProjection> {
        let ProjectionBuilder {
            mut nodes,
            labels,
            properties,
            relationships,
            config,
        } = self;

        // 1. Sort and dedup so the IdMap can be compacted
        nodes.sort_unstable();
        nodes.dedup();
        if nodes.len() > config.max_nodes {
            return Err(StrandError::LimitExceeded {
                what: "node",
                limit: config.max_nodes,
            }
            .into());
        }

        let mut id_map = IdMap::with_capacity(nodes.len());
        for node in nodes {
            id_map.insert(node);
        }
        id_map.compact();
        let node_count = id_map.len();
        tracing::Span::current().record("node_count", node_count);

        // 2. Node properties and schema
        let (node_properties, node_schema) = build_properties(&id_map, &labels, properties);

        // 3. Map relationship endpoints
        let weighted = relationships.iter().any(|(_, _, w)| w.is_some());
        let mut edges: WeightedEdgeList = Vec::with_capacity(relationships.len());
        let mut skipped = 0usize;
        for (source, target, weight) in relationships {
            match (id_map.to_slot(source), id_map.to_slot(target)) {
                (Some(s), Some(t)) => edges.push((s, t, weight.unwrap_or(config.default_weight))),
                _ => skipped += 1,
            }
        }
        if skipped > 0 {
            debug!(skipped, "Skipped relationships with endpoints outside the projection");
        }
        tracing::Span::current().record("relationship_count", edges.len());
        tracing::Span::current().record("skipped", skipped);
        let relationship_count = edges.len();

        // 4. Build CSR lists for the load direction
        let (outgoing, incoming) = match config.load_direction {
            LoadDirection::Outgoing => (Some(build_csr(node_count, &edges, weighted)), None),
            LoadDirection::Incoming => {
                let reversed = reverse(&edges);
                (None, Some(build_csr(node_count, &reversed, weighted)))
            }
            LoadDirection::Both => {
                let reversed = reverse(&edges);
                (
                    Some(build_csr(node_count, &edges, weighted)),
                    Some(build_csr(node_count, &reversed, weighted)),
                )
            }
            LoadDirection::Undirected => {
                let mut symmetric = Vec::with_capacity(edges.len() * 2);
                for &(s, t, w) in &edges {
                    symmetric.push((s, t, w));
                    if s != t {
                        symmetric.push((t, s, w));
                    }
                }
                (Some(build_csr(node_count, &symmetric, weighted)), None)
            }
        };

        let projection = GraphProjection {
            node_count,
            relationship_count,
            load_direction: config.load_direction,
            outgoing,
            incoming,
            id_map,
            node_properties,
            node_schema,
        };

        let size = projection.memory_size();
        if size > config.max_memory {
            return Err(StrandError::LimitExceeded {
                what: "memory",
                limit: config.max_memory,
            }
            .into());
        }

        debug!(
            nodes = node_count,
            relationships = relationship_count,
            size_bytes = size,
            "Built graph projection"
        );
        Ok(projection)
    }
}

fn reverse(edges: &[(u32, u32, f64)]) -> WeightedEdgeList {
    edges.iter().map(|&(s, t, w)| (t, s, w)).collect()
}

/// Dense property columns plus the node schema describing them.
fn build_properties(
    id_map: &IdMap,
    labels: &FxHashMap<NodeId, String>,
    properties: Vec<(NodeId, String, PropertyValue)>,
) -> (FxHashMap<String, PropertyColumn>, NodeSchema) {
    let node_count = id_map.len();
    let label_of = |node: &NodeId| labels.get(node).map_or(ALL_NODES_LABEL, |l| l.as_str());

    let mut schema = NodeSchema::new();
    for (_, node) in id_map.iter() {
        schema.add_label_without_properties(label_of(&node));
    }

    // A column is integral unless any of its values is a float.
    let mut column_types: FxHashMap<&str, NumberType> = FxHashMap::default();
    for (node, key, value) in &properties {
        schema.add_property_for_label(label_of(node), key, value.number_type());
        column_types
            .entry(key.as_str())
            .and_modify(|ty| *ty = ty.widen(value.number_type()))
            .or_insert(value.number_type());
    }

    let mut columns: FxHashMap<String, PropertyColumn> = column_types
        .into_iter()
        .map(|(key, ty)| {
            let column = match ty {
                NumberType::Integer => PropertyColumn::Long(vec![None; node_count]),
                _ => PropertyColumn::Double(vec![None; node_count]),
            };
            (key.to_string(), column)
        })
        .collect();

    for (node, key, value) in &properties {
        let Some(slot) = id_map.to_slot(*node) else {
            continue;
        };
        match (columns.get_mut(key.as_str()), value) {
            (Some(PropertyColumn::Long(values)), PropertyValue::Long(v)) => {
                values[slot as usize] = Some(*v);
            }
            (Some(PropertyColumn::Double(values)), v) => {
                values[slot as usize] = Some(v.as_f64());
            }
            _ => {}
        }
    }

    (columns, schema)
}

/// Build CSR from edge list.
fn build_csr(node_count: usize, edges: &[(u32, u32, f64)], include_weights: bool) -> Adjacency {
    if node_count == 0 {
        return Adjacency::empty(0);
    }

    // Count degrees
    let mut degrees = vec![0u32; node_count];
    for &(src, _, _) in edges {
        degrees[src as usize] += 1;
    }

    // Build offsets (prefix sum)
    let mut offsets = vec![0u32; node_count + 1];
    for i in 0..node_count {
        offsets[i + 1] = offsets[i] + degrees[i];
    }

    // Fill neighbors
    let mut targets = vec![0u32; edges.len()];
    let mut weights = if include_weights {
        Some(vec![0.0; edges.len()])
    } else {
        None
    };
    let mut current = offsets.clone();

    for &(src, dst, w) in edges {
        let idx = current[src as usize] as usize;
        targets[idx] = dst;
        if let Some(ws) = &mut weights {
            ws[idx] = w;
        }
        current[src as usize] += 1;
    }

    Adjacency {
        offsets,
        targets,
        weights,
    }
}

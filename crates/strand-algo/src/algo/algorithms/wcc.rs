// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Dragonscale Team

//! Weakly Connected Components (WCC) Algorithm.
//!
//! Nodes are split into batches and handed to a fixed pool of workers. Each
//! worker walks the relationships of its nodes and unions both endpoints in a
//! shared lock-free union-find. Once every batch is done a single pass reads
//! the settled root of every node.
//!
//! Component ids:
//! - unseeded runs use the smallest internal id in the component
//! - seeded runs use the lowest seed in the component, and
//!   `max_seed + 1 + root` for components without any seed

use crate::algo::GraphProjection;
use crate::algo::algorithms::Algorithm;
use crate::algo::graph::{
    Direction, Graph, IdMapping, NodePropertyGraph, PropertyColumn, StorageFault, WeightedGraph,
};
use crate::algo::parallel::{PanicPayload, WorkerFault, run_batches};
use crate::algo::partition::{NodeBatch, adjusted_batch_size};
use crate::algo::union_find::ConcurrentUnionFind;
use fxhash::FxHashMap;
use serde_json::{Value, json};
use std::error::Error as StdError;
use strand_common::config::AlgorithmConfig;
use strand_common::core::id::NodeId;
use thiserror::Error;
use tracing::{Span, debug, info, instrument, warn};

/// Weight passed for relationships of graphs without weights when a threshold is set.
const DEFAULT_WEIGHT: f64 = 1.0;

pub struct Wcc;

#[derive(Debug, Clone, PartialEq)]
pub struct WccConfig {
    /// Worker threads
    pub concurrency: usize,
    /// Lower bound on nodes per work batch
    pub batch_size: usize,
    /// Relationships followed from each node
    pub direction: Direction,
    /// Integer node property holding initial component ids
    pub seed_property: Option<String>,
    /// Follow only relationships whose weight is strictly greater
    pub threshold: Option<f64>,
    /// Drop rows of smaller components when reading results
    pub min_component_size: Option<usize>,
}

impl Default for WccConfig {
    fn default() -> Self {
        Self::from_algorithm_config(&AlgorithmConfig::default())
    }
}

impl WccConfig {
    pub fn from_algorithm_config(config: &AlgorithmConfig) -> Self {
        Self {
            concurrency: config.default_concurrency,
            batch_size: config.min_batch_size,
            direction: Direction::Outgoing,
            seed_property: None,
            threshold: None,
            min_component_size: None,
        }
    }

    /// Apply procedure-style arguments (`concurrency`, `batchSize`,
    /// `direction`, `seedProperty`, `threshold`, `minComponentSize`).
    ///
    /// Missing or `null` arguments keep the current value.
    pub fn with_args(mut self, args: &Value) -> Result<Self, WccError> {
        if let Some(n) = usize_arg(args, "concurrency")? {
            self.concurrency = n;
        }
        if let Some(n) = usize_arg(args, "batchSize")? {
            self.batch_size = n;
        }
        if let Some(n) = usize_arg(args, "minComponentSize")? {
            self.min_component_size = Some(n);
        }
        match args.get("direction") {
            None | Some(Value::Null) => {}
            Some(v) => {
                self.direction = match v.as_str().map(str::to_ascii_uppercase).as_deref() {
                    Some("OUTGOING") => Direction::Outgoing,
                    Some("INCOMING") => Direction::Incoming,
                    Some("BOTH") => Direction::Both,
                    _ => {
                        return Err(WccError::configuration(format!(
                            "direction must be one of OUTGOING, INCOMING, BOTH, got {v}"
                        )));
                    }
                };
            }
        }
        match args.get("seedProperty") {
            None | Some(Value::Null) => {}
            Some(Value::String(key)) => self.seed_property = Some(key.clone()),
            Some(v) => {
                return Err(WccError::configuration(format!(
                    "seedProperty must be a string, got {v}"
                )));
            }
        }
        match args.get("threshold") {
            None | Some(Value::Null) => {}
            Some(v) => {
                let threshold = v.as_f64().ok_or_else(|| {
                    WccError::configuration(format!("threshold must be a number, got {v}"))
                })?;
                self.threshold = Some(threshold);
            }
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), WccError> {
        if self.concurrency == 0 {
            return Err(WccError::configuration("concurrency must be at least 1"));
        }
        if self.batch_size == 0 {
            return Err(WccError::configuration("batch_size must be at least 1"));
        }
        if self.threshold.is_some_and(f64::is_nan) {
            return Err(WccError::configuration("threshold must not be NaN"));
        }
        if self.seed_property.as_deref() == Some("") {
            return Err(WccError::configuration("seed_property must not be empty"));
        }
        Ok(())
    }
}

fn usize_arg(args: &Value, key: &str) -> Result<Option<usize>, WccError> {
    match args.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v.as_u64().map(|n| Some(n as usize)).ok_or_else(|| {
            WccError::configuration(format!("{key} must be a non-negative integer, got {v}"))
        }),
    }
}

/// Lifecycle of a single run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WccState {
    /// Configuration accepted, union-find and batches allocated.
    Initialized,
    /// Workers are processing batches.
    Running,
    /// Every batch finished and components are settled.
    Completed,
    /// A worker fault was captured.
    Failed,
}

impl WccState {
    pub fn can_advance_to(self, next: WccState) -> bool {
        matches!(
            (self, next),
            (WccState::Initialized, WccState::Running)
                | (WccState::Running, WccState::Completed)
                | (WccState::Running, WccState::Failed)
        )
    }

    fn advance(&mut self, next: WccState) {
        debug_assert!(
            self.can_advance_to(next),
            "invalid WCC transition {self:?} -> {next:?}"
        );
        let from = *self;
        debug!(?from, to = ?next, "WCC state transition");
        *self = next;
    }
}

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum WccError {
    #[error("Invalid WCC configuration: {message}")]
    Configuration { message: String },

    #[error("Storage fault while processing nodes {}..{}", .batch.start, .batch.end)]
    Storage {
        batch: NodeBatch,
        #[source]
        source: StorageFault,
    },

    #[error("Worker failed on nodes {}..{}: {payload}", .batch.start, .batch.end)]
    Partition {
        batch: NodeBatch,
        #[source]
        payload: PanicPayload,
    },

    #[error("Worker pool unavailable: {message}")]
    Executor { message: String },
}

impl WccError {
    pub fn configuration(message: impl Into<String>) -> Self {
        WccError::Configuration {
            message: message.into(),
        }
    }

    /// Innermost error of the `source()` chain, `self` when there is none.
    pub fn root_cause(&self) -> &(dyn StdError + 'static) {
        let mut current: &(dyn StdError + 'static) = self;
        while let Some(next) = current.source() {
            current = next;
        }
        current
    }

    /// Batch that was being processed when the fault occurred.
    pub fn batch(&self) -> Option<NodeBatch> {
        match self {
            WccError::Storage { batch, .. } | WccError::Partition { batch, .. } => Some(*batch),
            _ => None,
        }
    }

    /// What the worker panicked with, for [`WccError::Partition`].
    pub fn panic_payload(&self) -> Option<&PanicPayload> {
        match self {
            WccError::Partition { payload, .. } => Some(payload),
            _ => None,
        }
    }
}

impl From<WorkerFault> for WccError {
    fn from(fault: WorkerFault) -> Self {
        match fault {
            WorkerFault::Panicked { batch, payload } => WccError::Partition { batch, payload },
            WorkerFault::Pool(e) => WccError::Executor {
                message: e.to_string(),
            },
        }
    }
}

/// Component id per internal node id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WccResult {
    components: Vec<u64>,
    component_count: usize,
    min_component_size: Option<usize>,
}

impl WccResult {
    /// Component of `slot`. Panics if `slot` is out of range.
    #[inline]
    pub fn component_of(&self, slot: u32) -> u64 {
        self.components[slot as usize]
    }

    pub fn components(&self) -> &[u64] {
        &self.components
    }

    pub fn component_count(&self) -> usize {
        self.component_count
    }

    pub fn node_count(&self) -> usize {
        self.components.len()
    }

    pub fn component_sizes(&self) -> FxHashMap<u64, usize> {
        let mut sizes = FxHashMap::default();
        for &component in &self.components {
            *sizes.entry(component).or_insert(0) += 1;
        }
        sizes
    }

    /// `(original id, component)` per node, skipping components smaller
    /// than `min_component_size`.
    pub fn rows<M>(&self, mapping: &M) -> Vec<(NodeId, u64)>
    where
        M: IdMapping + ?Sized,
    {
        let min_size = self.min_component_size.unwrap_or(0);
        let sizes = (min_size > 1).then(|| self.component_sizes());
        self.components
            .iter()
            .enumerate()
            .filter(|(_, component)| {
                sizes
                    .as_ref()
                    .is_none_or(|sizes| sizes.get(*component).copied().unwrap_or(0) >= min_size)
            })
            .filter_map(|(slot, &component)| {
                mapping
                    .to_original(slot as u32)
                    .map(|node| (node, component))
            })
            .collect()
    }

    /// Rows as `[{"nodeId": .., "componentId": ..}, ..]`.
    pub fn to_json<M>(&self, mapping: &M) -> Value
    where
        M: IdMapping + ?Sized,
    {
        Value::Array(
            self.rows(mapping)
                .into_iter()
                .map(|(node, component)| json!({ "nodeId": node.as_u64(), "componentId": component }))
                .collect(),
        )
    }
}

impl Wcc {
    /// Components of `graph` following every relationship in `config.direction`.
    ///
    /// Thresholds and seeds need weights and node properties; use
    /// [`Wcc::run_weighted`] for those.
    #[instrument(
        skip_all,
        fields(
            node_count = graph.node_count(),
            concurrency = config.concurrency,
            components = tracing::field::Empty
        )
    )]
    pub fn run_unweighted<G: Graph>(graph: &G, config: &WccConfig) -> Result<WccResult, WccError> {
        config.validate()?;
        slot_bound(graph)?;
        if config.threshold.is_some() {
            return Err(WccError::configuration(
                "threshold requires a graph with relationship weights",
            ));
        }
        if config.seed_property.is_some() {
            return Err(WccError::configuration(
                "seed_property requires a graph with node properties",
            ));
        }
        let direction = config.direction;
        execute(graph, config, None, |union_find, node| {
            graph.for_each_relationship(node, direction, |source, target| {
                union_find.union(source, target);
                true
            })
        })
    }

    /// Components of `graph` honoring `threshold` and `seed_property`.
    #[instrument(
        skip_all,
        fields(
            node_count = graph.node_count(),
            concurrency = config.concurrency,
            components = tracing::field::Empty
        )
    )]
    pub fn run_weighted<G>(graph: &G, config: &WccConfig) -> Result<WccResult, WccError>
    where
        G: WeightedGraph + NodePropertyGraph,
    {
        config.validate()?;
        slot_bound(graph)?;
        let seeds = match &config.seed_property {
            Some(key) => Some(read_seeds(graph, key)?),
            None => None,
        };
        let direction = config.direction;

        match config.threshold {
            Some(threshold) => {
                if !graph.has_relationship_weights() {
                    warn!(
                        threshold,
                        fallback = DEFAULT_WEIGHT,
                        "Threshold set on a graph without relationship weights"
                    );
                }
                execute(graph, config, seeds, |union_find, node| {
                    graph.for_each_weighted_relationship(
                        node,
                        direction,
                        DEFAULT_WEIGHT,
                        |source, target, weight| {
                            if weight > threshold {
                                union_find.union(source, target);
                            }
                            true
                        },
                    )
                })
            }
            None => execute(graph, config, seeds, |union_find, node| {
                graph.for_each_relationship(node, direction, |source, target| {
                    union_find.union(source, target);
                    true
                })
            }),
        }
    }
}

impl Algorithm for Wcc {
    type Config = WccConfig;
    type Result = std::result::Result<WccResult, WccError>;

    fn name() -> &'static str {
        "wcc"
    }

    fn run(graph: &GraphProjection, config: Self::Config) -> Self::Result {
        Wcc::run_weighted(graph, &config)
    }
}

/// Node count as a `u32` slot bound. Larger graphs cannot be addressed.
fn slot_bound<G: Graph + ?Sized>(graph: &G) -> Result<u32, WccError> {
    let node_count = graph.node_count();
    u32::try_from(node_count).map_err(|_| {
        WccError::configuration(format!(
            "graph has {node_count} nodes, more than the {} supported",
            u32::MAX
        ))
    })
}

/// Seed per node from an integer property. Nodes without a value stay unseeded.
fn read_seeds<G>(graph: &G, key: &str) -> Result<Vec<Option<u64>>, WccError>
where
    G: Graph + NodePropertyGraph + ?Sized,
{
    let column = graph.node_property(key).ok_or_else(|| {
        WccError::configuration(format!("seed property '{key}' does not exist"))
    })?;
    let PropertyColumn::Long(values) = column else {
        return Err(WccError::configuration(format!(
            "seed property '{key}' must be Integer, found {}",
            column.number_type().display_name()
        )));
    };

    (0..graph.node_count())
        .map(|slot| match values.get(slot).copied().flatten() {
            Some(seed) if seed < 0 => Err(WccError::configuration(format!(
                "seed property '{key}' has negative value {seed} on node {slot}"
            ))),
            Some(seed) => Ok(Some(seed as u64)),
            None => Ok(None),
        })
        .collect()
}

/// Shared run loop. `traverse` unions every followed relationship of one node.
fn execute<G, T>(
    graph: &G,
    config: &WccConfig,
    seeds: Option<Vec<Option<u64>>>,
    traverse: T,
) -> Result<WccResult, WccError>
where
    G: Graph + ?Sized,
    T: Fn(&ConcurrentUnionFind, u32) -> Result<(), StorageFault> + Sync,
{
    let slot_end = slot_bound(graph)?;
    let node_count = slot_end as usize;
    let (union_find, unseeded_offset) = match seeds {
        Some(seeds) => {
            let offset = seeds.iter().flatten().max().map_or(0, |max| max + 1);
            (ConcurrentUnionFind::with_seeds(&seeds), offset)
        }
        None => (ConcurrentUnionFind::new(node_count), 0),
    };
    let batch_size = adjusted_batch_size(node_count, config.concurrency, config.batch_size);
    let batches = graph.batch_iterables(batch_size);

    let mut state = WccState::Initialized;
    debug!(
        batches = batches.len(),
        batch_size,
        seeded = config.seed_property.is_some(),
        "WCC initialized"
    );

    state.advance(WccState::Running);
    let outcome = run_batches(config.concurrency, &batches, |batch| {
        for node in batch {
            traverse(&union_find, node).map_err(|source| WccError::Storage { batch, source })?;
        }
        Ok(())
    });
    if let Err(err) = outcome {
        state.advance(WccState::Failed);
        warn!(error = %err, "WCC failed");
        return Err(err);
    }

    let components: Vec<u64> = (0..slot_end)
        .map(|slot| {
            let root = union_find.set_id_of(slot);
            union_find
                .seed_of(root)
                .unwrap_or(unseeded_offset + root as u64)
        })
        .collect();
    let component_count = union_find.component_count();

    state.advance(WccState::Completed);
    Span::current().record("components", component_count);
    info!(node_count, component_count, "WCC completed");

    Ok(WccResult {
        components,
        component_count,
        min_component_size: config.min_component_size,
    })
}

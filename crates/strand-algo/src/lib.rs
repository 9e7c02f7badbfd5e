// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Dragonscale Team

pub mod algo;

pub use algo::algorithms::{Algorithm, Wcc, WccConfig, WccError, WccResult, WccState};
pub use algo::graph::{
    Direction, Graph, IdMapping, NodePropertyGraph, PropertyColumn, PropertyValue,
    RelationshipIntersect, StorageFault, WeightedGraph,
};
pub use algo::parallel::{BatchStats, FaultSlot, PanicPayload, WorkerFault, run_batches};
pub use algo::partition::{NodeBatch, adjusted_batch_size, partition};
pub use algo::projection::{GraphProjection, LoadDirection, ProjectionBuilder, ProjectionConfig};
pub use algo::union_find::ConcurrentUnionFind;
pub use algo::IdMap;

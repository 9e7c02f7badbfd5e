// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Dragonscale Team

//! Graph Algorithm Engine
//!
//! In-memory graph projections plus a parallel connected-components engine.
//!
//! # Architecture
//!
//! - **GraphProjection**: materialized dense CSR built by `ProjectionBuilder`.
//!   Node ids are mapped to dense slots by `IdMap`.
//! - **Capability traits** (`graph`): the read contract algorithms consume.
//!   Any type implementing `Graph` can be traversed, not only projections.
//! - **Execution**: `partition` splits slots into batches, `parallel` runs them
//!   on a fixed pool, `union_find` is the shared lock-free state.
//!
//! # Example
//!
//! ```
//! use strand_algo::algo::algorithms::{Algorithm, Wcc, WccConfig};
//! use strand_algo::ProjectionBuilder;
//!
//! let projection = ProjectionBuilder::new()
//!     .nodes([1u64, 2, 3])
//!     .relationship(1u64, 2u64)
//!     .build()?;
//!
//! let result = Wcc::run(&projection, WccConfig::default())?;
//! assert_eq!(result.component_count(), 2);
//! # Ok::<(), anyhow::Error>(())
//! ```

mod id_map;
pub mod projection;

pub mod algorithms;
pub mod graph;
pub mod parallel;
pub mod partition;
pub mod union_find;

pub use id_map::IdMap;
pub use projection::{GraphProjection, LoadDirection, ProjectionBuilder, ProjectionConfig};

#[cfg(test)]
pub mod test_utils;

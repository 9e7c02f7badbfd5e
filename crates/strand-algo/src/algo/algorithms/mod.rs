// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Dragonscale Team

//! Algorithms that run over a [`GraphProjection`].

use crate::algo::GraphProjection;

/// A graph algorithm runnable by name against a projection.
pub trait Algorithm: Send + Sync {
    type Config: Default + Clone + Send + 'static;
    /// Output of one run, usually a `Result` with the algorithm's own error.
    type Result: Send + 'static;

    /// Name the algorithm is registered under.
    fn name() -> &'static str;

    fn run(graph: &GraphProjection, config: Self::Config) -> Self::Result;
}

mod wcc;
pub use wcc::{Wcc, WccConfig, WccError, WccResult, WccState};

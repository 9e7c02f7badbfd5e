// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Dragonscale Team

pub mod api {
    pub mod error;
}

pub mod config;

pub mod core {
    pub mod id;
    pub mod schema;
}

// Re-exports for convenience
pub use api::error::{Result, StrandError};
pub use config::AlgorithmConfig;
pub use core::id::NodeId;
pub use core::schema::{NodeSchema, NumberType};

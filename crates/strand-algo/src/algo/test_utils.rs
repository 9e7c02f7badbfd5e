// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Dragonscale Team

use crate::algo::graph::{Direction, Graph, StorageFault};
use crate::algo::{GraphProjection, ProjectionBuilder};
use std::error::Error as StdError;
use std::panic;
use strand_common::core::id::NodeId;
use thiserror::Error;

pub fn build_test_graph(nodes: Vec<NodeId>, edges: Vec<(NodeId, NodeId)>) -> GraphProjection {
    ProjectionBuilder::new()
        .nodes(nodes)
        .relationships(edges)
        .build()
        .expect("test graph should build")
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("injected fault '{label}'")]
pub struct InjectedFault {
    pub label: &'static str,
}

/// Panic payload that is neither a string nor an error.
#[derive(Debug, PartialEq, Eq)]
pub struct TypedFault {
    pub label: &'static str,
}

enum Failure {
    Fault(&'static str),
    Panic,
    PanicTyped(&'static str),
    PanicError(&'static str),
}

/// Path graph `0 -> 1 -> .. -> n-1` whose traversal of one node fails.
pub struct FlakyGraph {
    node_count: usize,
    failing_node: u32,
    failure: Failure,
}

impl FlakyGraph {
    /// Fails with an [`InjectedFault`] carrying `label`.
    pub fn new(node_count: usize, failing_node: u32, label: &'static str) -> Self {
        Self {
            node_count,
            failing_node,
            failure: Failure::Fault(label),
        }
    }

    /// Panics instead of returning an error.
    pub fn panicking(node_count: usize, failing_node: u32) -> Self {
        Self {
            node_count,
            failing_node,
            failure: Failure::Panic,
        }
    }

    /// Panics with `fault` itself as the payload.
    pub fn panicking_with(node_count: usize, failing_node: u32, fault: TypedFault) -> Self {
        Self {
            node_count,
            failing_node,
            failure: Failure::PanicTyped(fault.label),
        }
    }

    /// Panics with `fault` boxed as `Box<dyn Error + Send + Sync>`.
    pub fn panicking_with_error(node_count: usize, failing_node: u32, fault: InjectedFault) -> Self {
        Self {
            node_count,
            failing_node,
            failure: Failure::PanicError(fault.label),
        }
    }
}

impl Graph for FlakyGraph {
    fn node_count(&self) -> usize {
        self.node_count
    }

    fn for_each_relationship<F>(
        &self,
        node: u32,
        _direction: Direction,
        mut visitor: F,
    ) -> Result<(), StorageFault>
    where
        F: FnMut(u32, u32) -> bool,
    {
        if node == self.failing_node {
            match self.failure {
                Failure::Fault(label) => {
                    return Err(StorageFault::corrupt(node, InjectedFault { label }));
                }
                Failure::Panic => panic!("injected panic at node {node}"),
                Failure::PanicTyped(label) => panic::panic_any(TypedFault { label }),
                Failure::PanicError(label) => {
                    let fault: Box<dyn StdError + Send + Sync> = Box::new(InjectedFault { label });
                    panic::panic_any(fault)
                }
            }
        }
        if (node as usize) + 1 < self.node_count {
            visitor(node, node + 1);
        }
        Ok(())
    }
}

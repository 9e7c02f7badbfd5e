// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Dragonscale Team

use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Original node identifier as assigned by the source data.
///
/// Original ids are sparse, non-negative 64-bit integers. Algorithms never
/// index arrays with them directly; they go through an identity map that
/// assigns each present id a dense slot.
#[derive(Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(u64);

impl NodeId {
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl From<u64> for NodeId {
    fn from(val: u64) -> Self {
        Self(val)
    }
}

impl From<NodeId> for u64 {
    fn from(id: NodeId) -> Self {
        id.0
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", self.0)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for NodeId {
    type Err = anyhow::Error;

    /// Parses a decimal node id, optionally prefixed with `n`.
    fn from_str(s: &str) -> Result<Self> {
        let digits = s.strip_prefix('n').unwrap_or(s);
        digits
            .parse::<u64>()
            .map(Self)
            .map_err(|e| anyhow!("Invalid node id '{}': {}", s, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_node_id() {
        assert_eq!("42".parse::<NodeId>().unwrap(), NodeId::new(42));
        assert_eq!("n7".parse::<NodeId>().unwrap(), NodeId::new(7));
        assert!("-1".parse::<NodeId>().is_err());
        assert!("abc".parse::<NodeId>().is_err());
    }

    #[test]
    fn test_serde_is_transparent() {
        let json = serde_json::to_string(&NodeId::new(9)).unwrap();
        assert_eq!(json, "9");
        let back: NodeId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, NodeId::new(9));
    }

    #[test]
    fn test_ordering_follows_raw_value() {
        let mut ids = vec![NodeId::new(30), NodeId::new(2), NodeId::new(11)];
        ids.sort();
        assert_eq!(ids, vec![NodeId::new(2), NodeId::new(11), NodeId::new(30)]);
    }
}

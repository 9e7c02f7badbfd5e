// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Dragonscale Team

use thiserror::Error;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StrandError {
    /// Node id is not part of the loaded graph
    #[error("Node {node} not found in graph")]
    NodeNotFound { node: u64 },

    #[error("Projection exceeded {what} limit of {limit}")]
    LimitExceeded { what: &'static str, limit: usize },

    #[error("Argument '{arg}' is invalid: {message}")]
    InvalidArgument { arg: String, message: String },

    #[error("Configuration error: {0}")]
    Config(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl StrandError {
    pub fn invalid_argument(arg: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            arg: arg.into(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, StrandError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_argument_message() {
        let err = StrandError::invalid_argument("concurrency", "must be at least 1");
        assert_eq!(
            err.to_string(),
            "Argument 'concurrency' is invalid: must be at least 1"
        );
    }

    #[test]
    fn test_limit_message() {
        let err = StrandError::LimitExceeded {
            what: "node",
            limit: 10,
        };
        assert_eq!(err.to_string(), "Projection exceeded node limit of 10");
    }
}

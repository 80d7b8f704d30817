// Copyright 2025 the Trackwork Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Block partitioning rules.

/// Rules applied when discovering and validating blocks.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct BlockConfig {
    /// Shortest total member length a block may have.
    pub min_block_length: f64,
    /// Most members a block may have. Larger candidates are rejected, never truncated.
    pub max_members: usize,
    /// Prefix for names given to blocks created by bulk discovery.
    pub auto_name_prefix: String,
}

impl Default for BlockConfig {
    fn default() -> Self {
        Self {
            min_block_length: 12.0,
            max_members: 128,
            auto_name_prefix: "Block ".into(),
        }
    }
}

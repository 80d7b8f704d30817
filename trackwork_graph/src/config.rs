// Copyright 2025 the Trackwork Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Graph tolerances.

/// Tolerances applied by connect, split, and the abutting-endpoint searches.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct GraphConfig {
    /// Maximum distance between two endpoints that may be joined.
    pub connect_distance: f64,
    /// Maximum deviation, in degrees, from exactly opposing endpoint angles.
    pub connect_angle: f64,
    /// A split closer than this to an endpoint only disconnects that endpoint.
    pub min_split_length: f64,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            connect_distance: 0.1,
            connect_angle: 1.0,
            min_split_length: 0.1,
        }
    }
}

// Copyright 2025 the Trackwork Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Block errors.

use trackwork_graph::{ErrorClass, GraphError};

/// Why a candidate block was discarded.
///
/// Every rejection leaves the graph exactly as it was.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum Rejection {
    /// Nothing was selected.
    #[error("no tracks selected")]
    EmptySelection,
    /// Blocks must be named.
    #[error("block must have a name")]
    MissingName,
    /// The object is not a track (or no longer exists).
    #[error("T{0} is not a track")]
    NotTrack(u32),
    /// Walks start from a plain segment.
    #[error("T{0} is not a plain segment")]
    NotPlain(u32),
    /// The track already belongs to another block.
    #[error("T{track} already belongs to block T{block}")]
    Claimed {
        /// Persisted index of the track.
        track: u32,
        /// Persisted index of the owning block.
        block: u32,
    },
    /// The walk did not end in exactly two boundaries.
    #[error("found {0} block boundaries, need 2")]
    BoundaryCount(usize),
    /// Total length is below the configured minimum.
    #[error("block is too short: {length:.3} < {min:.3}")]
    TooShort {
        /// Total member length.
        length: f64,
        /// Configured minimum.
        min: f64,
    },
    /// More members than the configured cap.
    #[error("block has {count} tracks, at most {max} allowed")]
    TooManyMembers {
        /// Candidate member count.
        count: usize,
        /// Configured cap.
        max: usize,
    },
    /// The selection is not one connected run.
    #[error("selected tracks are not contiguous: {open_ends} open ends, {allowed} allowed")]
    Discontiguous {
        /// Open ends found.
        open_ends: usize,
        /// Open ends the selection may have.
        allowed: usize,
    },
    /// A member could not be measured.
    #[error("length of T{0} is unknown")]
    UnknownLength(u32),
}

impl Rejection {
    /// Classify the rejection.
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::TooManyMembers { .. } => ErrorClass::Resource,
            _ => ErrorClass::Structural,
        }
    }
}

/// Errors reported by block operations.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum BlockError {
    /// The candidate block did not validate.
    #[error(transparent)]
    Rejected(#[from] Rejection),
    /// The object is not a live block.
    #[error("T{0} is not a block")]
    NotABlock(u32),
    /// No block carries this name.
    #[error("no block named `{0}`")]
    UnknownBlock(String),
    /// Blocks accept only `OCCUPIED` and `UNOCCUPIED`.
    #[error("unknown block action `{0}`")]
    UnknownAction(String),
    /// A block violates its invariants.
    #[error("corrupt block: {0}")]
    Corrupt(String),
    /// The underlying graph operation failed.
    #[error(transparent)]
    Graph(#[from] GraphError),
}

impl BlockError {
    /// Classify the error.
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Rejected(r) => r.class(),
            Self::Corrupt(_) => ErrorClass::Invariant,
            Self::Graph(e) => e.class(),
            Self::NotABlock(_) | Self::UnknownBlock(_) | Self::UnknownAction(_) => {
                ErrorClass::Structural
            }
        }
    }

    /// True for errors that indicate a programming or data-corruption problem.
    pub fn is_fatal(&self) -> bool {
        self.class() == ErrorClass::Invariant
    }

    /// The rejection, if this is one.
    pub fn rejection(&self) -> Option<&Rejection> {
        match self {
            Self::Rejected(r) => Some(r),
            _ => None,
        }
    }
}

// Copyright 2025 the Trackwork Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Graph errors and their classification.

use crate::types::TrackId;

/// Broad class of an error, used by hosts to pick a reaction.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    /// Endpoints out of tolerance; nothing was mutated.
    Geometric,
    /// The request does not fit the graph's structure; nothing was mutated.
    Structural,
    /// The graph or a file is internally inconsistent. The current transaction must be
    /// rolled back and the host decides whether to continue.
    Invariant,
    /// A hard size limit was exceeded; nothing was mutated.
    Resource,
}

/// Errors reported by [`TrackGraph`](crate::TrackGraph) operations.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum GraphError {
    /// The id is stale or was never allocated.
    #[error("track {0:?} does not exist")]
    Missing(TrackId),
    /// No live object carries this persisted index.
    #[error("track T{0} does not exist")]
    MissingIndex(u32),
    /// A persisted index was requested twice.
    #[error("track index T{0} is already in use")]
    DuplicateIndex(u32),
    /// Endpoint index out of range.
    #[error("T{index} has no endpoint {endpoint}")]
    BadEndpoint {
        /// Persisted index of the object.
        index: u32,
        /// Requested endpoint.
        endpoint: u8,
    },
    /// Overlay objects never connect.
    #[error("T{0} is not a track")]
    NotTrack(u32),
    /// The operation requires a two-endpoint plain segment.
    #[error("T{0} is not a plain segment")]
    NotPlain(u32),
    /// The endpoint is already joined to something else.
    #[error("endpoint T{index}[{endpoint}] is already connected")]
    EndpointInUse {
        /// Persisted index of the object.
        index: u32,
        /// Endpoint index.
        endpoint: u8,
    },
    /// An endpoint cannot be joined to its own object.
    #[error("T{0} cannot be connected to itself")]
    SelfConnection(u32),
    /// Endpoints are too far apart or not facing each other.
    #[error("cannot connect T{a}[{ep_a}] to T{b}[{ep_b}]: d={distance:.3} a={angle:.3}")]
    OutOfTolerance {
        /// First object.
        a: u32,
        /// First endpoint.
        ep_a: u8,
        /// Second object.
        b: u32,
        /// Second endpoint.
        ep_b: u8,
        /// Distance between the endpoints.
        distance: f64,
        /// Normalized angle deviation in degrees.
        angle: f64,
    },
    /// The two endpoints named by a merge are not joined to each other.
    #[error("T{a}[{ep_a}] is not joined to T{b}[{ep_b}]")]
    NotJoined {
        /// First object.
        a: u32,
        /// First endpoint.
        ep_a: u8,
        /// Second object.
        b: u32,
        /// Second endpoint.
        ep_b: u8,
    },
    /// Disconnect was asked to separate endpoints that do not reference each other.
    #[error("tracks not connected: T{a}[{ep_a}] and T{b}[{ep_b}] do not reference each other")]
    NotMutual {
        /// First object.
        a: u32,
        /// First endpoint.
        ep_a: u8,
        /// Second object.
        b: u32,
        /// Second endpoint.
        ep_b: u8,
    },
    /// The geometry collaborator cannot cut the object at the requested point.
    #[error("T{0} cannot be split at this point")]
    SplitRejected(u32),
    /// The geometry collaborator reports the two objects as incompatible.
    #[error("T{a} and T{b} cannot be merged")]
    MergeRejected {
        /// Surviving object.
        a: u32,
        /// Absorbed object.
        b: u32,
    },
    /// The graph or a loaded file violates an invariant.
    #[error("corrupt layout: {0}")]
    Corrupt(String),
    /// A record could not be parsed.
    #[error("line {line}: {message}")]
    Parse {
        /// One-based line number.
        line: usize,
        /// What went wrong.
        message: String,
    },
}

impl GraphError {
    /// Classify the error.
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::OutOfTolerance { .. } => ErrorClass::Geometric,
            Self::NotMutual { .. } | Self::Corrupt(_) | Self::Parse { .. } => ErrorClass::Invariant,
            _ => ErrorClass::Structural,
        }
    }

    /// True for errors that indicate a programming or data-corruption problem.
    pub fn is_fatal(&self) -> bool {
        self.class() == ErrorClass::Invariant
    }
}

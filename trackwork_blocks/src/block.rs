// Copyright 2025 the Trackwork Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The block overlay payload.

use kurbo::{Point, Vec2};
use trackwork_graph::{EndpointRef, TrackGraph, TrackId};

/// Track graph whose overlay objects are blocks.
pub type BlockGraph = TrackGraph<Block>;

/// One end of a block, copied from the graph when the block was discovered.
///
/// The position and angle are those of the member's own endpoint, facing out of the
/// block. At a turnout that endpoint sits on the turnout's endpoint (within connect
/// tolerance) and faces the opposite way; `attached` names the turnout endpoint. A block's
/// own endpoints are never connected.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Boundary {
    /// Position.
    pub position: Point,
    /// Angle in degrees.
    pub angle: f64,
    /// The turnout (or foreign) endpoint beyond the boundary, or `None` at a dead end.
    pub attached: Option<EndpointRef>,
}

/// Overlay data of a block object.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Block {
    pub(crate) name: String,
    pub(crate) script: String,
    pub(crate) offset: Vec2,
    pub(crate) members: Vec<TrackId>,
    pub(crate) length: f64,
    pub(crate) attachments: Vec<Option<EndpointRef>>,
    pub(crate) occupied: bool,
}

impl Block {
    /// User-visible name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Associated script, possibly empty.
    pub fn script(&self) -> &str {
        &self.script
    }

    /// Offset of the on-screen description.
    pub fn offset(&self) -> Vec2 {
        self.offset
    }

    /// Set the offset of the on-screen description.
    pub fn set_offset(&mut self, offset: Vec2) {
        self.offset = offset;
    }

    /// Member tracks. Ownership stays with the graph; check liveness before use.
    pub fn members(&self) -> &[TrackId] {
        &self.members
    }

    /// Cached total member length.
    pub fn length(&self) -> f64 {
        self.length
    }

    /// What each boundary was attached to at discovery, in endpoint order.
    pub fn attachments(&self) -> &[Option<EndpointRef>] {
        &self.attachments
    }

    /// True when a train occupies the block.
    pub fn is_occupied(&self) -> bool {
        self.occupied
    }

    pub(crate) fn contains(&self, track: TrackId) -> bool {
        self.members.contains(&track)
    }
}

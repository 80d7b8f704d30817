// Copyright 2025 the Trackwork Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Public types for the track graph: identifiers, endpoints, flags, and kinds.

use kurbo::Point;

/// Identifier for a track object in the graph.
///
/// This is a small, copyable handle that stays stable across edits but becomes
/// invalid when the underlying slot is reused.
/// It consists of a slot index and a generation counter.
///
/// ## Semantics
///
/// - On create, a fresh slot is allocated with generation `1`.
/// - On delete, the slot is freed; any existing `TrackId` that pointed to that slot is now stale.
/// - On reuse of a freed slot, its generation is incremented, producing a new, distinct `TrackId`.
///
/// Stale ids never alias a different live object because the generation must match.
/// Use [`TrackGraph::is_alive`](crate::TrackGraph::is_alive) before trusting a stored id.
///
/// The persisted integer index of an object (the number written to layout files) is a
/// separate concept, see [`TrackObject::index`](crate::TrackObject::index).
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct TrackId(pub(crate) u32, pub(crate) u32);

impl TrackId {
    pub(crate) const fn new(idx: u32, generation: u32) -> Self {
        Self(idx, generation)
    }

    pub(crate) const fn idx(self) -> usize {
        self.0 as usize
    }
}

/// One endpoint of one track object.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct EndpointRef {
    /// Owning object.
    pub track: TrackId,
    /// Endpoint index within the owning object.
    pub endpoint: u8,
}

impl EndpointRef {
    /// Create an endpoint reference.
    pub const fn new(track: TrackId, endpoint: u8) -> Self {
        Self { track, endpoint }
    }
}

bitflags::bitflags! {
    /// Per-endpoint option flags.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
    pub struct EndpointOptions: u8 {
        /// The rails are electrically gapped at this endpoint.
        const GAPPED = 0b0000_0001;
    }
}

bitflags::bitflags! {
    /// Per-object flags.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
    pub struct TrackFlags: u8 {
        /// Object is visible.
        const VISIBLE          = 0b0000_0001;
        /// Object is part of the current selection.
        const SELECTED         = 0b0000_0010;
        /// Object cannot exist with a free endpoint (for example an easement joint);
        /// cascading deletes of a neighbour remove it too.
        const CANNOT_BE_ON_END = 0b0000_0100;
    }
}

impl Default for TrackFlags {
    fn default() -> Self {
        Self::VISIBLE
    }
}

/// Elevation mode of an endpoint.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ElevationMode {
    /// No elevation information.
    #[default]
    None,
    /// Height set explicitly by the user.
    Defined,
    /// Height derived from a connected endpoint.
    Computed,
    /// Height follows the grade of the surrounding track.
    Grade,
    /// Endpoint is excluded from elevation computations.
    Ignore,
    /// Named station; carries a defined height.
    Station,
}

/// Elevation descriptor owned by an endpoint.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Elevation {
    /// Mode.
    pub mode: ElevationMode,
    /// Height, meaningful for `Defined`, `Computed` and `Station`.
    pub height: f64,
    /// Station name for `Station`.
    pub station: Option<String>,
}

impl Elevation {
    /// A user-defined height.
    pub fn defined(height: f64) -> Self {
        Self {
            mode: ElevationMode::Defined,
            height,
            station: None,
        }
    }

    /// True when this endpoint dictates a height to its neighbour.
    pub fn is_source(&self) -> bool {
        matches!(self.mode, ElevationMode::Defined | ElevationMode::Station)
    }
}

/// A typed connection point on a track object.
///
/// Angles are in degrees, `0` pointing along `+y` and increasing clockwise, and face
/// outward from the object.
/// The connection is read-only here: it only changes through
/// [`TrackGraph::connect`](crate::TrackGraph::connect) and
/// [`TrackGraph::disconnect`](crate::TrackGraph::disconnect), which keep both sides in sync.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Endpoint {
    /// Position.
    pub position: Point,
    /// Outward-facing angle in degrees.
    pub angle: f64,
    /// Option flags.
    pub options: EndpointOptions,
    /// Elevation descriptor.
    pub elevation: Elevation,
    pub(crate) connection: Option<EndpointRef>,
}

impl Endpoint {
    /// An unconnected endpoint at `position` facing `angle`.
    pub fn new(position: Point, angle: f64) -> Self {
        Self {
            position,
            angle,
            ..Default::default()
        }
    }

    /// The endpoint this one is joined to, if any.
    pub fn connection(&self) -> Option<EndpointRef> {
        self.connection
    }

    /// True when joined to another endpoint.
    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    /// Copy of this endpoint with the connection dropped.
    pub fn detached(&self) -> Self {
        Self {
            connection: None,
            ..self.clone()
        }
    }
}

/// Variant tag of a track object.
///
/// `Plain` and `Turnout` are track and take part in connectivity; overlay objects
/// (such as blocks) carry a payload of type `X` and never connect.
#[derive(Clone, Debug, PartialEq)]
pub enum TrackKind<X> {
    /// Ordinary two-endpoint segment.
    Plain,
    /// Branch point with more than two endpoints.
    Turnout,
    /// Overlay object with its own payload.
    Overlay(X),
}

impl<X> TrackKind<X> {
    /// True for `Plain` and `Turnout`.
    pub fn is_track(&self) -> bool {
        !matches!(self, Self::Overlay(_))
    }

    /// True for `Plain`.
    pub fn is_plain(&self) -> bool {
        matches!(self, Self::Plain)
    }

    /// True for `Turnout`.
    pub fn is_turnout(&self) -> bool {
        matches!(self, Self::Turnout)
    }

    /// Overlay payload, if any.
    pub fn overlay(&self) -> Option<&X> {
        match self {
            Self::Overlay(x) => Some(x),
            _ => None,
        }
    }

    /// Mutable overlay payload, if any.
    pub fn overlay_mut(&mut self) -> Option<&mut X> {
        match self {
            Self::Overlay(x) => Some(x),
            _ => None,
        }
    }

    /// Short uppercase name used in records and messages.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Plain => "PLAIN",
            Self::Turnout => "TURNOUT",
            Self::Overlay(_) => "OVERLAY",
        }
    }
}

// Copyright 2025 the Trackwork Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Trackwork Graph: a Kurbo-native connectivity graph for model railway layouts.
//!
//! A layout is a set of track objects joined at typed endpoints.
//!
//! - Plain segments have two endpoints; turnouts have more and act as branch points.
//! - Overlay objects (such as blocks) live in the same arena and carry a payload, but never
//!   connect to anything.
//! - Adjacency is stored on both endpoints of a connection and every operation keeps the two
//!   sides in agreement.
//!
//! ## API overview
//!
//! - [`TrackGraph`]: the arena. Creation, lookup, connect/disconnect, delete with hooks.
//! - [`TrackId`]: generational handle; a stale id never aliases a newer object.
//! - [`Endpoint`], [`EndpointRef`]: connection points and references to them.
//! - [`Geometry`]: collaborator that measures and cuts objects. [`StraightGeometry`] handles
//!   straight segments.
//! - [`UndoLog`] and [`Transaction`]: scoped boundary for multi-step edits.
//! - [`file`]: line-oriented `TRACK` records.
//!
//! Key operations:
//! - [`TrackGraph::connect`] checks distance and facing against [`GraphConfig`] and mutates
//!   nothing on failure.
//! - [`TrackGraph::disconnect`] refuses pairs that do not reference each other with a
//!   fatal-class [`GraphError::NotMutual`].
//! - [`TrackGraph::next_across`] and [`TrackGraph::traverse`] walk along chains of track.
//! - [`TrackGraph::split`] and [`TrackGraph::merge`] cut and fuse plain segments.
//! - [`TrackGraph::delete`] optionally cascades and notifies a [`DeleteHook`].
//!
//! ## Errors
//!
//! Every [`GraphError`] has an [`ErrorClass`]. Geometric and structural errors are
//! recoverable and leave the graph as it was. Invariant errors mean the graph or a file is
//! inconsistent; nothing in this crate panics or exits on them, the host decides.
//!
//! ## Minimal usage
//!
//! ```
//! use kurbo::Point;
//! use trackwork_graph::{Endpoint, EndpointRef, StraightGeometry, Stop, TrackGraph, TrackKind};
//!
//! let mut graph = TrackGraph::<()>::new();
//! let a = graph.create_with(
//!     TrackKind::Plain,
//!     vec![
//!         Endpoint::new(Point::new(0.0, 0.0), 270.0),
//!         Endpoint::new(Point::new(5.0, 0.0), 90.0),
//!     ],
//! );
//! let b = graph.create_with(
//!     TrackKind::Plain,
//!     vec![
//!         Endpoint::new(Point::new(5.0, 0.0), 270.0),
//!         Endpoint::new(Point::new(12.0, 0.0), 90.0),
//!     ],
//! );
//!
//! graph.connect(a, 1, b, 0).unwrap();
//! assert_eq!(graph.peer(b, 0), Some(EndpointRef::new(a, 1)));
//!
//! let walk = graph.traverse(a, 1, 100.0, &StraightGeometry::default());
//! assert_eq!(walk.stop, Stop::DeadEnd);
//! assert_eq!(walk.consumed, 7.0);
//! ```

mod config;
mod edit;
mod error;
mod geometry;
mod graph;
mod traverse;
mod types;
mod undo;

pub mod file;

pub use config::GraphConfig;
pub use edit::SplitOutcome;
pub use error::{ErrorClass, GraphError};
pub use geometry::{Cut, Geometry, StraightGeometry, direction, normalize_angle, opposition};
pub use graph::{DeleteHook, TrackGraph, TrackObject};
pub use traverse::{Stop, Traversal};
pub use types::{
    Elevation, ElevationMode, Endpoint, EndpointOptions, EndpointRef, TrackFlags, TrackId,
    TrackKind,
};
pub use undo::{NoUndo, Transaction, UndoEvent, UndoJournal, UndoLog};

// Copyright 2025 the Trackwork Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Trackwork Blocks: partition a trackwork graph into named, non-overlapping blocks.
//!
//! A block is a contiguous run of plain track between turnouts (or dead ends), used for
//! occupancy detection. Blocks live in the graph as overlay objects whose payload is a
//! [`Block`]; every member track records the block as its owner.
//!
//! ## API overview
//!
//! - [`walk`] and [`select`]: find and validate a candidate run, from a seed or from an
//!   explicit selection.
//! - [`BlockPartitioner`]: create, reconcile, rename and delete blocks, and collect the
//!   [`Notice`]s raised when a block stops validating.
//! - [`Layout`]: editing facade that wraps each structural edit in an undo transaction and
//!   keeps the blocks it touches consistent.
//! - [`pubsub`]: the `OCCUPIED`/`UNOCCUPIED` contract with an external event bus.
//! - [`file`]: `BLOCK` records, reconciled against the graph on load.
//!
//! ## Invariants
//!
//! - A track belongs to at most one block.
//! - A block has exactly two boundaries and is at least
//!   [`BlockConfig::min_block_length`] long.
//! - Editing member track re-runs discovery; a block that no longer validates is deleted and
//!   its members released.
//!
//! ## Minimal usage
//!
//! ```
//! use kurbo::Point;
//! use trackwork_blocks::Layout;
//! use trackwork_graph::Endpoint;
//!
//! let mut layout = Layout::default();
//! let mut ids = Vec::new();
//! for i in 0..3 {
//!     let x = f64::from(i) * 5.0;
//!     ids.push(layout.add_track(
//!         false,
//!         vec![
//!             Endpoint::new(Point::new(x, 0.0), 270.0),
//!             Endpoint::new(Point::new(x + 5.0, 0.0), 90.0),
//!         ],
//!     ));
//! }
//! layout.connect(ids[0], 1, ids[1], 0).unwrap();
//! layout.connect(ids[1], 1, ids[2], 0).unwrap();
//!
//! let block = layout.create_block(ids[1], "Main", "").unwrap();
//! let b = layout.graph().overlay(block).unwrap();
//! assert_eq!(b.members().len(), 3);
//! assert_eq!(b.length(), 15.0);
//! ```

mod block;
mod config;
mod contiguity;
mod discover;
mod error;
mod layout;
mod partition;

pub mod file;
pub mod pubsub;

pub use block::{Block, BlockGraph, Boundary};
pub use config::BlockConfig;
pub use contiguity::{OpenEnds, open_ends, select};
pub use discover::{Discovery, walk};
pub use error::{BlockError, Rejection};
pub use layout::Layout;
pub use partition::{BlockPartitioner, Notice, Reconciled};

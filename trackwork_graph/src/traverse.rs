// Copyright 2025 the Trackwork Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Walking along chains of connected track.

use crate::geometry::Geometry;
use crate::graph::{TrackGraph, ep_u8};
use crate::types::{EndpointRef, TrackId};

/// Why a [`TrackGraph::traverse`] stopped.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Stop {
    /// The requested distance ran out inside the object `at` refers to.
    Exhausted,
    /// The next object is a turnout; `at` is the turnout endpoint that was reached.
    Turnout,
    /// The endpoint `at` has no connection.
    DeadEnd,
    /// The geometry collaborator could not measure the object `at` refers to.
    UnknownLength,
    /// The walk came back around to where it started.
    Loop,
}

/// Result of a [`TrackGraph::traverse`].
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Traversal {
    /// Distance covered.
    pub consumed: f64,
    /// Why the walk ended.
    pub stop: Stop,
    /// Where the walk ended.
    pub at: EndpointRef,
}

impl<X> TrackGraph<X> {
    /// The single neighbour reachable from `id` other than through `from_ep`.
    ///
    /// Returns `None` when zero or several endpoints other than `from_ep` are connected:
    /// the walk cannot continue unambiguously.
    pub fn next_across(&self, id: TrackId, from_ep: u8) -> Option<EndpointRef> {
        let object = self.get(id)?;
        let mut found = None;
        for (ep, e) in object.endpoints().iter().enumerate() {
            if ep_u8(ep) == from_ep {
                continue;
            }
            if let Some(peer) = e.connection() {
                if found.is_some() {
                    return None;
                }
                found = Some(peer);
            }
        }
        found
    }

    /// Walk out of `start` through endpoint `ep`, crossing two-endpoint objects until
    /// `remaining` is used up, a turnout or dead end is met, or a length is unknown.
    pub fn traverse<G>(&self, start: TrackId, ep: u8, remaining: f64, geometry: &G) -> Traversal
    where
        G: Geometry + ?Sized,
    {
        let mut consumed = 0.0;
        let mut at = EndpointRef::new(start, ep);
        loop {
            let Some(next) = self.peer(at.track, at.endpoint) else {
                return Traversal {
                    consumed,
                    stop: Stop::DeadEnd,
                    at,
                };
            };
            if next.track == start {
                return Traversal {
                    consumed,
                    stop: Stop::Loop,
                    at: next,
                };
            }
            let Some(object) = self.get(next.track) else {
                return Traversal {
                    consumed,
                    stop: Stop::DeadEnd,
                    at,
                };
            };
            if object.endpoints().len() != 2 {
                return Traversal {
                    consumed,
                    stop: Stop::Turnout,
                    at: next,
                };
            }
            let Some(length) = geometry.length(next.track, object.endpoints()) else {
                return Traversal {
                    consumed,
                    stop: Stop::UnknownLength,
                    at: next,
                };
            };
            if length > remaining - consumed {
                return Traversal {
                    consumed: remaining,
                    stop: Stop::Exhausted,
                    at: next,
                };
            }
            consumed += length;
            log::trace!("traverse T{} +{length}", object.index());
            at = EndpointRef::new(next.track, 1 - next.endpoint);
        }
    }
}

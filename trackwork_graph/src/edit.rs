// Copyright 2025 the Trackwork Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Structural edits built from the connect/disconnect primitives.

use kurbo::Point;

use crate::error::GraphError;
use crate::geometry::{Geometry, normalize_angle};
use crate::graph::{DeleteHook, TrackGraph, ep_u8};
use crate::types::{Elevation, Endpoint, EndpointOptions, EndpointRef, TrackId, TrackKind};

/// Outcome of [`TrackGraph::split`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SplitOutcome {
    /// The point was within `min_split_length` of an endpoint, which was disconnected.
    Disconnected {
        /// Endpoint of the split object that was freed.
        endpoint: u8,
        /// Its former peer, if it had one.
        peer: Option<EndpointRef>,
    },
    /// The object was cut in two.
    Split {
        /// The new piece, which took over endpoint 1 of the original.
        leftover: TrackId,
    },
}

impl<X> TrackGraph<X> {
    /// Cut a plain segment at the point nearest `at`.
    ///
    /// Near an endpoint this only frees that endpoint. Otherwise a new plain segment takes
    /// over endpoint 1 and its connection; the two halves stay joined unless `disconnect`.
    pub fn split<G>(
        &mut self,
        id: TrackId,
        at: Point,
        disconnect: bool,
        geometry: &G,
    ) -> Result<SplitOutcome, GraphError>
    where
        G: Geometry + ?Sized,
    {
        let object = self.require(id)?;
        let index = object.index();
        if !object.kind().is_plain() || object.endpoints().len() != 2 {
            return Err(GraphError::NotPlain(index));
        }
        let min = self.config.min_split_length;
        let near = object
            .endpoints()
            .iter()
            .position(|e| e.position.distance(at) <= min);
        if let Some(ep) = near {
            let ep = ep_u8(ep);
            let peer = self.peer(id, ep);
            if let Some(p) = peer {
                self.disconnect(id, ep, p.track, p.endpoint)?;
            }
            log::debug!("split T{index}: disconnected endpoint {ep}");
            return Ok(SplitOutcome::Disconnected { endpoint: ep, peer });
        }
        let cut = geometry
            .cut(id, object.endpoints(), at)
            .ok_or(GraphError::SplitRejected(index))?;

        let (layer, flags, owner) = (object.layer, object.flags, object.owner);
        let far = object.endpoints()[1].clone();
        let far_peer = far.connection();

        let leftover = self.create_with(
            TrackKind::Plain,
            vec![
                Endpoint::new(cut.position, normalize_angle(cut.angle + 180.0)),
                far.detached(),
            ],
        );
        if let Some(piece) = self.get_mut(leftover) {
            piece.layer = layer;
            piece.flags = flags;
            piece.owner = owner;
        }
        if let Some(p) = far_peer {
            self.unlink(EndpointRef::new(id, 1), p)?;
            self.link(EndpointRef::new(leftover, 1), p)?;
        }
        {
            let e = self.endpoint_mut(EndpointRef::new(id, 1))?;
            e.position = cut.position;
            e.angle = normalize_angle(cut.angle);
            e.options = EndpointOptions::empty();
            e.elevation = Elevation::default();
        }
        if let Some(o) = self.get_mut(id) {
            o.refresh_bounds();
        }
        if !disconnect {
            self.link(EndpointRef::new(id, 1), EndpointRef::new(leftover, 0))?;
        }
        log::debug!(
            "split T{index} at ({:.3}, {:.3}) into T{index} and T{}",
            cut.position.x,
            cut.position.y,
            self.index_of(leftover).unwrap_or_default()
        );
        Ok(SplitOutcome::Split { leftover })
    }

    /// Fuse plain segment `b` into `a` across the joint `a[ep_a]`/`b[ep_b]`.
    ///
    /// `a` takes over `b`'s far endpoint and its connection; `b` is then deleted through
    /// [`TrackGraph::delete`], so `hook` sees it.
    pub fn merge<G, H>(
        &mut self,
        a: TrackId,
        ep_a: u8,
        b: TrackId,
        ep_b: u8,
        geometry: &G,
        hook: &mut H,
    ) -> Result<(), GraphError>
    where
        G: Geometry + ?Sized,
        H: DeleteHook<X> + ?Sized,
    {
        let oa = self.require(a)?;
        let ob = self.require(b)?;
        let (ia, ib) = (oa.index(), ob.index());
        for o in [oa, ob] {
            if !o.kind().is_plain() || o.endpoints().len() != 2 {
                return Err(GraphError::NotPlain(o.index()));
            }
        }
        if a == b || self.peer(a, ep_a) != Some(EndpointRef::new(b, ep_b)) {
            return Err(GraphError::NotJoined {
                a: ia,
                ep_a,
                b: ib,
                ep_b,
            });
        }
        if !geometry.can_merge((a, oa.endpoints()), ep_a, (b, ob.endpoints()), ep_b) {
            return Err(GraphError::MergeRejected { a: ia, b: ib });
        }
        let far_b = 1 - ep_b;
        let far = ob.endpoints()[usize::from(far_b)].clone();
        let far_peer = far.connection();

        self.disconnect(a, ep_a, b, ep_b)?;
        if let Some(p) = far_peer {
            self.unlink(EndpointRef::new(b, far_b), p)?;
        }
        *self.endpoint_mut(EndpointRef::new(a, ep_a))? = far.detached();
        if let Some(o) = self.get_mut(a) {
            o.refresh_bounds();
        }
        if let Some(p) = far_peer {
            self.link(EndpointRef::new(a, ep_a), p)?;
        }
        self.delete(b, false, hook)?;
        log::debug!("merge T{ib} into T{ia}");
        Ok(())
    }

    /// Disconnect every joined pair whose endpoints drifted out of tolerance.
    ///
    /// Returns the number of pairs separated.
    pub fn loosen(&mut self) -> usize {
        let mut drifted = Vec::new();
        for (id, object) in self.iter() {
            for (ep, e) in object.endpoints().iter().enumerate() {
                let here = EndpointRef::new(id, ep_u8(ep));
                let Some(peer) = e.connection() else {
                    continue;
                };
                if here < peer
                    && self
                        .check_alignment(id, here.endpoint, peer.track, peer.endpoint)
                        .is_err()
                {
                    drifted.push((here, peer));
                }
            }
        }
        let mut count = 0;
        for (a, b) in drifted {
            if self
                .disconnect(a.track, a.endpoint, b.track, b.endpoint)
                .is_ok()
            {
                count += 1;
            }
        }
        if count > 0 {
            log::debug!("loosened {count} connections");
        }
        count
    }

    /// Join two endpoints if both are free and they abut within tolerance.
    ///
    /// Returns `false` without mutating anything otherwise.
    pub fn connect_abutting(&mut self, a: TrackId, i: u8, b: TrackId, j: u8) -> bool {
        self.connect(a, i, b, j).is_ok()
    }
}

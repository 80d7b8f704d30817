// Copyright 2025 the Trackwork Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Seeded discovery of the run of plain segments around a track.

use std::collections::BTreeSet;

use trackwork_graph::{EndpointRef, Geometry, TrackId};

use crate::block::{BlockGraph, Boundary};
use crate::config::BlockConfig;
use crate::error::Rejection;

/// A validated candidate block: the result of one discovery.
///
/// Each discovery builds its own value; nothing is shared between calls.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Discovery {
    /// Member tracks in discovery order.
    pub members: Vec<TrackId>,
    /// Sum of member lengths.
    pub length: f64,
    /// Boundary endpoints in discovery order.
    pub boundaries: Vec<Boundary>,
}

pub(crate) fn index(graph: &BlockGraph, id: TrackId) -> u32 {
    graph.index_of(id).unwrap_or_default()
}

pub(crate) fn measure<G>(graph: &BlockGraph, geometry: &G, id: TrackId) -> Result<f64, Rejection>
where
    G: Geometry + ?Sized,
{
    graph
        .get(id)
        .and_then(|o| geometry.length(id, o.endpoints()))
        .ok_or(Rejection::UnknownLength(index(graph, id)))
}

/// Tracks owned by a block other than `rebuilding` are off limits.
pub(crate) fn check_unclaimed(
    graph: &BlockGraph,
    track: TrackId,
    rebuilding: Option<TrackId>,
) -> Result<(), Rejection> {
    match graph.owner(track) {
        Some(block) if Some(block) != rebuilding => Err(Rejection::Claimed {
            track: index(graph, track),
            block: index(graph, block),
        }),
        _ => Ok(()),
    }
}

/// Walk the run of plain segments around `seed` and validate it.
///
/// The walk uses an explicit stack and never enters turnouts: a turnout neighbour, a
/// neighbour owned by another block, or a free endpoint ends that branch and becomes a
/// boundary. The result must have exactly two boundaries, at most `max_members` members
/// and at least `min_block_length` length. `rebuilding` names a block whose own members
/// may be walked over. A seed owned by another block is [`Rejection::Claimed`].
pub fn walk<G>(
    graph: &BlockGraph,
    geometry: &G,
    config: &BlockConfig,
    seed: TrackId,
    rebuilding: Option<TrackId>,
) -> Result<Discovery, Rejection>
where
    G: Geometry + ?Sized,
{
    let Some(object) = graph.get(seed) else {
        return Err(Rejection::NotTrack(0));
    };
    if !object.kind().is_track() {
        return Err(Rejection::NotTrack(object.index()));
    }
    if !object.kind().is_plain() || object.endpoints().len() != 2 {
        return Err(Rejection::NotPlain(object.index()));
    }
    check_unclaimed(graph, seed, rebuilding)?;

    let mut found = Discovery::default();
    let mut visited = BTreeSet::from([seed]);
    let mut stack = vec![seed];
    while let Some(id) = stack.pop() {
        if found.members.len() == config.max_members {
            return Err(Rejection::TooManyMembers {
                count: found.members.len() + 1,
                max: config.max_members,
            });
        }
        found.length += measure(graph, geometry, id)?;
        found.members.push(id);
        log::trace!("walk: T{} total {:.3}", index(graph, id), found.length);

        let Some(object) = graph.get(id) else {
            continue;
        };
        for (ep, e) in object.endpoints().iter().enumerate() {
            let boundary = |attached: Option<EndpointRef>| Boundary {
                position: e.position,
                angle: e.angle,
                attached,
            };
            let Some(peer) = e.connection() else {
                found.boundaries.push(boundary(None));
                continue;
            };
            if visited.contains(&peer.track) {
                continue;
            }
            let foreign = check_unclaimed(graph, peer.track, rebuilding).is_err();
            if !graph.is_plain(peer.track) || foreign {
                log::trace!("walk: boundary at T{} endpoint {ep}", index(graph, id));
                found.boundaries.push(boundary(Some(peer)));
                continue;
            }
            visited.insert(peer.track);
            stack.push(peer.track);
        }
    }

    validate(found, config)
}

fn validate(found: Discovery, config: &BlockConfig) -> Result<Discovery, Rejection> {
    if found.boundaries.len() != 2 {
        return Err(Rejection::BoundaryCount(found.boundaries.len()));
    }
    if found.length < config.min_block_length {
        return Err(Rejection::TooShort {
            length: found.length,
            min: config.min_block_length,
        });
    }
    Ok(found)
}

#[cfg(test)]
pub(crate) mod tests {
    use kurbo::Point;
    use trackwork_graph::{Endpoint, StraightGeometry, TrackKind, direction, normalize_angle};

    use super::*;
    use crate::block::Block;

    pub(crate) fn straight(g: &mut BlockGraph, a: (f64, f64), b: (f64, f64)) -> TrackId {
        let pa = Point::new(a.0, a.1);
        let pb = Point::new(b.0, b.1);
        let ang = direction(pa, pb);
        g.create_with(
            TrackKind::Plain,
            vec![
                Endpoint::new(pa, normalize_angle(ang + 180.0)),
                Endpoint::new(pb, ang),
            ],
        )
    }

    /// Three-way turnout whose first two legs run along +x from `at`.
    pub(crate) fn turnout(g: &mut BlockGraph, at: (f64, f64), facing_left: bool) -> TrackId {
        let (x, y) = at;
        let endpoints = if facing_left {
            // Leg 0 faces +x (towards the run), legs 1 and 2 face -x.
            vec![
                Endpoint::new(Point::new(x, y), 90.0),
                Endpoint::new(Point::new(x - 3.0, y), 270.0),
                Endpoint::new(Point::new(x - 3.0, y + 1.0), 280.0),
            ]
        } else {
            vec![
                Endpoint::new(Point::new(x, y), 270.0),
                Endpoint::new(Point::new(x + 3.0, y), 90.0),
                Endpoint::new(Point::new(x + 3.0, y + 1.0), 80.0),
            ]
        };
        g.create_with(TrackKind::Turnout, endpoints)
    }

    /// `n` segments of length `len` chained along +x from the origin.
    pub(crate) fn run(g: &mut BlockGraph, n: usize, len: f64) -> Vec<TrackId> {
        let mut ids: Vec<TrackId> = Vec::new();
        for i in 0..n {
            let x = len * i as f64;
            let id = straight(g, (x, 0.0), (x + len, 0.0));
            if let Some(&prev) = ids.last() {
                g.connect(prev, 1, id, 0).unwrap();
            }
            ids.push(id);
        }
        ids
    }

    /// Three segments of length 5 between two turnouts.
    pub(crate) fn between_turnouts(g: &mut BlockGraph) -> (Vec<TrackId>, TrackId, TrackId) {
        let ids = run(g, 3, 5.0);
        let left = turnout(g, (0.0, 0.0), true);
        let right = turnout(g, (15.0, 0.0), false);
        g.connect(left, 0, ids[0], 0).unwrap();
        g.connect(ids[2], 1, right, 0).unwrap();
        (ids, left, right)
    }

    /// A main line and a siding between two turnouts, 20 units end to end.
    ///
    /// Returns `(west, main, siding, east)`; only the two turnout throats are free.
    pub(crate) fn passing_loop(g: &mut BlockGraph) -> (TrackId, TrackId, TrackId, TrackId) {
        let west = turnout(g, (0.0, 0.0), false);
        let east = turnout(g, (20.0, 0.0), true);
        let main = straight(g, (3.0, 0.0), (17.0, 0.0));
        let siding = g.create_with(
            TrackKind::Plain,
            vec![
                Endpoint::new(Point::new(3.0, 1.0), 260.0),
                Endpoint::new(Point::new(17.0, 1.0), 100.0),
            ],
        );
        g.connect(west, 1, main, 0).unwrap();
        g.connect(main, 1, east, 1).unwrap();
        g.connect(west, 2, siding, 0).unwrap();
        g.connect(siding, 1, east, 2).unwrap();
        (west, main, siding, east)
    }

    fn config(min: f64) -> BlockConfig {
        BlockConfig {
            min_block_length: min,
            ..BlockConfig::default()
        }
    }

    #[test]
    fn run_between_turnouts() {
        let mut g = BlockGraph::new();
        let (ids, left, right) = between_turnouts(&mut g);
        let geo = StraightGeometry::default();
        let found = walk(&g, &geo, &config(10.0), ids[1], None).unwrap();
        let members: BTreeSet<_> = found.members.iter().copied().collect();
        assert_eq!(members, ids.iter().copied().collect());
        assert_eq!(found.members[0], ids[1], "seed comes first");
        assert!((found.length - 15.0).abs() < 1e-9);
        let attached: BTreeSet<_> = found.boundaries.iter().map(|b| b.attached).collect();
        assert_eq!(
            attached,
            BTreeSet::from([
                Some(EndpointRef::new(left, 0)),
                Some(EndpointRef::new(right, 0))
            ])
        );
        // Boundaries copy the member's endpoint, not the turnout's.
        let east = found
            .boundaries
            .iter()
            .find(|b| b.attached == Some(EndpointRef::new(right, 0)))
            .unwrap();
        assert_eq!(east.position, Point::new(15.0, 0.0));
        assert!((east.angle - 90.0).abs() < 1e-9);
        assert_eq!(g.endpoint_angle(right, 0), Some(270.0));
    }

    #[test]
    fn short_run_is_rejected() {
        let mut g = BlockGraph::new();
        let ids = run(&mut g, 2, 3.0);
        let geo = StraightGeometry::default();
        assert_eq!(
            walk(&g, &geo, &config(10.0), ids[0], None),
            Err(Rejection::TooShort {
                length: 6.0,
                min: 10.0
            })
        );
    }

    #[test]
    fn dead_ends_are_boundaries() {
        let mut g = BlockGraph::new();
        let ids = run(&mut g, 4, 5.0);
        let geo = StraightGeometry::default();
        let found = walk(&g, &geo, &config(10.0), ids[0], None).unwrap();
        assert_eq!(found.members.len(), 4);
        assert!(found.boundaries.iter().all(|b| b.attached.is_none()));
        assert_eq!(found.boundaries[0].position, Point::new(0.0, 0.0));
    }

    #[test]
    fn closed_loop_has_no_boundaries() {
        let mut g = BlockGraph::new();
        let a = straight(&mut g, (0.0, 0.0), (10.0, 0.0));
        let b = straight(&mut g, (10.0, 0.0), (10.0, 10.0));
        let c = straight(&mut g, (10.0, 10.0), (0.0, 10.0));
        let d = straight(&mut g, (0.0, 10.0), (0.0, 0.0));
        // Corners do not face each other; join them directly.
        g.set_endpoint(b, 0, Point::new(10.0, 0.0), 270.0).unwrap();
        g.set_endpoint(c, 0, Point::new(10.0, 10.0), 180.0).unwrap();
        g.set_endpoint(d, 0, Point::new(0.0, 10.0), 90.0).unwrap();
        g.set_endpoint(a, 0, Point::new(0.0, 0.0), 0.0).unwrap();
        g.connect(a, 1, b, 0).unwrap();
        g.connect(b, 1, c, 0).unwrap();
        g.connect(c, 1, d, 0).unwrap();
        g.connect(d, 1, a, 0).unwrap();
        let geo = StraightGeometry::default();
        assert_eq!(
            walk(&g, &geo, &config(1.0), a, None),
            Err(Rejection::BoundaryCount(0))
        );
    }

    #[test]
    fn member_cap_stops_the_walk() {
        let mut g = BlockGraph::new();
        let ids = run(&mut g, 130, 1.0);
        let geo = StraightGeometry::default();
        let err = walk(&g, &geo, &config(1.0), ids[60], None).unwrap_err();
        assert!(matches!(err, Rejection::TooManyMembers { max: 128, .. }));
    }

    #[test]
    fn claimed_neighbour_is_a_boundary() {
        let mut g = BlockGraph::new();
        let ids = run(&mut g, 3, 5.0);
        let other = g.create(TrackKind::Overlay(Block::default()), 2);
        g.set_owner(ids[2], Some(other)).unwrap();
        let geo = StraightGeometry::default();
        let found = walk(&g, &geo, &config(1.0), ids[0], None).unwrap();
        assert_eq!(found.members, vec![ids[0], ids[1]]);
        assert!(
            found
                .boundaries
                .iter()
                .any(|b| b.attached == Some(EndpointRef::new(ids[2], 0)))
        );
        // The owner itself walks over its member, and nobody else may start there.
        assert_eq!(
            walk(&g, &geo, &config(1.0), ids[0], Some(other))
                .unwrap()
                .members
                .len(),
            3
        );
        assert!(matches!(
            walk(&g, &geo, &config(1.0), ids[2], None),
            Err(Rejection::Claimed { .. })
        ));
    }

    #[test]
    fn turnout_seed_is_rejected() {
        let mut g = BlockGraph::new();
        let t = turnout(&mut g, (0.0, 0.0), false);
        let geo = StraightGeometry::default();
        assert!(matches!(
            walk(&g, &geo, &config(1.0), t, None),
            Err(Rejection::NotPlain(_))
        ));
    }
}

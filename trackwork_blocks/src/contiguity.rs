// Copyright 2025 the Trackwork Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Validation of explicit track selections.

use std::collections::BTreeSet;

use trackwork_graph::{Geometry, GraphConfig, TrackId, normalize_angle};

use crate::block::{BlockGraph, Boundary};
use crate::config::BlockConfig;
use crate::discover::{Discovery, check_unclaimed, index, measure};
use crate::error::Rejection;

/// Open ends of a set of tracks.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct OpenEnds {
    /// Endpoints not joined to another member, de-duplicated.
    pub ends: Vec<Boundary>,
    /// Open ends a single run may have: two, plus the extra legs of member turnouts.
    pub allowed: usize,
    /// Some member of a multi-member set has no member neighbour.
    pub isolated: bool,
}

impl OpenEnds {
    /// True when the members form one connected run.
    pub fn is_contiguous(&self) -> bool {
        !self.isolated && self.ends.len() <= self.allowed
    }
}

/// Classify every member endpoint that is not joined to another member.
///
/// Two open ends at the same place facing the same way count once.
pub fn open_ends(graph: &BlockGraph, members: &[TrackId], tolerance: &GraphConfig) -> OpenEnds {
    let set: BTreeSet<TrackId> = members.iter().copied().collect();
    let mut out = OpenEnds {
        allowed: 2,
        ..OpenEnds::default()
    };
    for &id in members {
        let Some(object) = graph.get(id) else {
            continue;
        };
        if object.kind().is_turnout() {
            out.allowed += object.endpoints().len().saturating_sub(2);
        }
        let mut joined = false;
        for e in object.endpoints() {
            let peer = e.connection();
            if peer.is_some_and(|p| set.contains(&p.track)) {
                joined = true;
                continue;
            }
            let duplicate = out.ends.iter().any(|b| {
                b.position.distance(e.position) < tolerance.connect_distance
                    && normalize_angle(e.angle - b.angle + tolerance.connect_angle / 2.0)
                        < tolerance.connect_angle
            });
            if !duplicate {
                out.ends.push(Boundary {
                    position: e.position,
                    angle: e.angle,
                    attached: peer,
                });
            }
        }
        if !joined && members.len() > 1 {
            out.isolated = true;
        }
    }
    out
}

/// Validate an explicit selection as a block.
///
/// The selection may include turnouts. It must not exceed `max_members`, must be one
/// contiguous run, must leave the block through exactly two open ends, and must meet
/// `min_block_length`. Member turnouts widen the contiguity budget only: a turnout whose
/// spare legs lead out of the selection adds boundaries and the selection is refused.
/// `rebuilding` names a block whose own members may be reused.
pub fn select<G>(
    graph: &BlockGraph,
    geometry: &G,
    config: &BlockConfig,
    selection: &[TrackId],
    rebuilding: Option<TrackId>,
) -> Result<Discovery, Rejection>
where
    G: Geometry + ?Sized,
{
    let mut members = Vec::with_capacity(selection.len());
    for &id in selection {
        if !members.contains(&id) {
            members.push(id);
        }
    }
    if members.is_empty() {
        return Err(Rejection::EmptySelection);
    }
    if members.len() > config.max_members {
        return Err(Rejection::TooManyMembers {
            count: members.len(),
            max: config.max_members,
        });
    }
    let mut length = 0.0;
    for &id in &members {
        if !graph.kind(id).is_some_and(|k| k.is_track()) {
            return Err(Rejection::NotTrack(index(graph, id)));
        }
        check_unclaimed(graph, id, rebuilding)?;
        length += measure(graph, geometry, id)?;
    }

    let open = open_ends(graph, &members, graph.config());
    if !open.is_contiguous() {
        log::debug!(
            "selection of {} tracks: {} open ends, {} allowed",
            members.len(),
            open.ends.len(),
            open.allowed
        );
        return Err(Rejection::Discontiguous {
            open_ends: open.ends.len(),
            allowed: open.allowed,
        });
    }
    if open.ends.len() != 2 {
        return Err(Rejection::BoundaryCount(open.ends.len()));
    }
    if length < config.min_block_length {
        return Err(Rejection::TooShort {
            length,
            min: config.min_block_length,
        });
    }
    Ok(Discovery {
        members,
        length,
        boundaries: open.ends,
    })
}

#[cfg(test)]
mod tests {
    use kurbo::Point;
    use trackwork_graph::{Endpoint, StraightGeometry, TrackKind};

    use super::*;
    use crate::discover::tests::{between_turnouts, passing_loop, run, straight};

    fn config(min: f64) -> BlockConfig {
        BlockConfig {
            min_block_length: min,
            ..BlockConfig::default()
        }
    }

    #[test]
    fn y_shape_is_discontiguous() {
        let mut g = BlockGraph::new();
        let a = straight(&mut g, (-5.0, 0.0), (0.0, 0.0));
        let b = straight(&mut g, (0.0, 0.0), (5.0, 0.0));
        let c = straight(&mut g, (0.0, 0.0), (4.0, 3.0));
        g.connect(a, 1, b, 0).unwrap();
        let geo = StraightGeometry::default();
        let err = select(&g, &geo, &config(1.0), &[a, b, c], None).unwrap_err();
        assert!(matches!(err, Rejection::Discontiguous { allowed: 2, .. }));
    }

    #[test]
    fn disjoint_groups_are_discontiguous() {
        let mut g = BlockGraph::new();
        let left = run(&mut g, 2, 5.0);
        let far = straight(&mut g, (50.0, 0.0), (55.0, 0.0));
        let far2 = straight(&mut g, (55.0, 0.0), (60.0, 0.0));
        g.connect(far, 1, far2, 0).unwrap();
        let geo = StraightGeometry::default();
        let err = select(&g, &geo, &config(1.0), &[left[0], left[1], far, far2], None)
            .unwrap_err();
        assert_eq!(
            err,
            Rejection::Discontiguous {
                open_ends: 4,
                allowed: 2
            }
        );
    }

    #[test]
    fn selection_cap_applies_first() {
        let mut g = BlockGraph::new();
        let ids = run(&mut g, 130, 1.0);
        let geo = StraightGeometry::default();
        assert_eq!(
            select(&g, &geo, &config(1.0), &ids, None),
            Err(Rejection::TooManyMembers {
                count: 130,
                max: 128
            })
        );
        assert!(select(&g, &geo, &config(1.0), &ids[..128], None).is_ok());
    }

    #[test]
    fn spare_turnout_legs_are_extra_boundaries() {
        let mut g = BlockGraph::new();
        let (ids, left, right) = between_turnouts(&mut g);
        let geo = StraightGeometry::default();
        let mut selection = ids.clone();
        selection.push(right);
        // Contiguous, but the two free legs of the right turnout leave the block.
        let open = open_ends(&g, &selection, g.config());
        assert_eq!(open.allowed, 3);
        assert!(open.is_contiguous());
        assert_eq!(
            select(&g, &geo, &config(10.0), &selection, None),
            Err(Rejection::BoundaryCount(3))
        );

        selection.push(left);
        assert_eq!(
            select(&g, &geo, &config(10.0), &selection, None),
            Err(Rejection::BoundaryCount(4))
        );
    }

    #[test]
    fn passing_loop_has_two_boundaries() {
        let mut g = BlockGraph::new();
        let (west, main, siding, east) = passing_loop(&mut g);
        let geo = StraightGeometry::default();
        let found = select(&g, &geo, &config(10.0), &[west, main, siding, east], None).unwrap();
        assert_eq!(found.boundaries.len(), 2);
        assert_eq!(open_ends(&g, &found.members, g.config()).allowed, 4);
        assert!((found.length - 34.0).abs() < 1e-9);
        assert!(found.boundaries.iter().all(|b| b.attached.is_none()));

        // Without the second turnout the loop is open on three ends.
        assert_eq!(
            select(&g, &geo, &config(10.0), &[west, main, siding], None),
            Err(Rejection::BoundaryCount(3))
        );
    }

    #[test]
    fn overlays_and_empty_selections() {
        let mut g = BlockGraph::new();
        let ids = run(&mut g, 3, 5.0);
        let geo = StraightGeometry::default();
        assert_eq!(
            select(&g, &geo, &config(1.0), &[], None),
            Err(Rejection::EmptySelection)
        );
        let o = g.create(TrackKind::Overlay(crate::Block::default()), 2);
        assert!(matches!(
            select(&g, &geo, &config(1.0), &[ids[0], o], None),
            Err(Rejection::NotTrack(_))
        ));
    }

    #[test]
    fn coincident_open_ends_count_once() {
        let mut g = BlockGraph::new();
        let a = straight(&mut g, (0.0, 0.0), (5.0, 0.0));
        let b = g.create_with(
            TrackKind::Plain,
            vec![
                Endpoint::new(Point::new(0.0, 0.0), 270.0),
                Endpoint::new(Point::new(5.0, 0.0), 90.0),
            ],
        );
        let open = open_ends(&g, &[a, b], g.config());
        assert_eq!(open.ends.len(), 2);
        assert!(open.isolated);
        assert!(!open.is_contiguous());
    }
}

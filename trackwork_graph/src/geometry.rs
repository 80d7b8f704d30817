// Copyright 2025 the Trackwork Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Geometry collaborator contract and angle helpers.
//!
//! The graph stores endpoint positions, angles and bounding boxes itself.
//! Everything that depends on the curve between the endpoints (length, where a cut
//! lands, whether two pieces fuse into one) is answered by a [`Geometry`] implementation
//! owned by the host. [`StraightGeometry`] covers straight segments and is what the
//! tests and demos use.

use kurbo::{Point, Vec2};

use crate::types::{Endpoint, TrackId};

/// Normalize an angle in degrees into `[0, 360)`.
pub fn normalize_angle(angle: f64) -> f64 {
    let a = angle % 360.0;
    if a < 0.0 { a + 360.0 } else { a }
}

/// Direction from `from` to `to` in degrees: `0` along `+y`, increasing clockwise.
pub fn direction(from: Point, to: Point) -> f64 {
    let d: Vec2 = to - from;
    normalize_angle(d.x.atan2(d.y).to_degrees())
}

/// Deviation in degrees of two outward angles from facing each other exactly.
///
/// Returns a value in `[0, 180]`; `0` means the endpoints oppose perfectly.
pub fn opposition(a: f64, b: f64) -> f64 {
    let d = normalize_angle(a - b + 180.0);
    if d > 180.0 { 360.0 - d } else { d }
}

/// Where a cut lands on a segment.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Cut {
    /// Position of the cut.
    pub position: Point,
    /// Direction of travel at the cut, heading from endpoint 0 towards endpoint 1.
    pub angle: f64,
}

/// Geometry collaborator consumed by the graph.
pub trait Geometry {
    /// Centerline length of the object, or `None` if it cannot be measured.
    fn length(&self, id: TrackId, endpoints: &[Endpoint]) -> Option<f64>;

    /// Locate a cut at the point of the object nearest `at`.
    ///
    /// Returns `None` when the object cannot be cut there.
    fn cut(&self, id: TrackId, endpoints: &[Endpoint], at: Point) -> Option<Cut>;

    /// True when `a` and `b`, joined at `ep_a`/`ep_b`, can be fused into one object.
    fn can_merge(
        &self,
        a: (TrackId, &[Endpoint]),
        ep_a: u8,
        b: (TrackId, &[Endpoint]),
        ep_b: u8,
    ) -> bool {
        let _ = (a, ep_a, b, ep_b);
        false
    }
}

/// Geometry for straight segments: the centerline runs from endpoint 0 to endpoint 1.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct StraightGeometry {
    /// Angular tolerance, in degrees, for collinearity when merging.
    pub angle_tolerance: f64,
}

impl Default for StraightGeometry {
    fn default() -> Self {
        Self {
            angle_tolerance: 1.0,
        }
    }
}

impl Geometry for StraightGeometry {
    fn length(&self, _id: TrackId, endpoints: &[Endpoint]) -> Option<f64> {
        match endpoints {
            [a, b, ..] => Some(a.position.distance(b.position)),
            _ => None,
        }
    }

    fn cut(&self, _id: TrackId, endpoints: &[Endpoint], at: Point) -> Option<Cut> {
        let [a, b] = endpoints else {
            return None;
        };
        let span = b.position - a.position;
        let len2 = span.hypot2();
        if len2 == 0.0 {
            return None;
        }
        let t = (at - a.position).dot(span) / len2;
        if t <= 0.0 || t >= 1.0 {
            return None;
        }
        Some(Cut {
            position: a.position + span * t,
            angle: direction(a.position, b.position),
        })
    }

    fn can_merge(
        &self,
        a: (TrackId, &[Endpoint]),
        ep_a: u8,
        b: (TrackId, &[Endpoint]),
        ep_b: u8,
    ) -> bool {
        if a.1.len() != 2 || b.1.len() != 2 || ep_a > 1 || ep_b > 1 {
            return false;
        }
        let far_a = &a.1[usize::from(1 - ep_a)];
        let far_b = &b.1[usize::from(1 - ep_b)];
        let near_a = &a.1[usize::from(ep_a)];
        // Collinear when both far ends oppose and the joint keeps the same heading.
        opposition(far_a.angle, far_b.angle) <= self.angle_tolerance
            && opposition(near_a.angle, far_a.angle) <= self.angle_tolerance
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ep(x: f64, y: f64, angle: f64) -> Endpoint {
        Endpoint::new(Point::new(x, y), angle)
    }

    #[test]
    fn directions_follow_compass_convention() {
        let o = Point::ORIGIN;
        assert!((direction(o, Point::new(0.0, 1.0)) - 0.0).abs() < 1e-9);
        assert!((direction(o, Point::new(1.0, 0.0)) - 90.0).abs() < 1e-9);
        assert!((direction(o, Point::new(0.0, -1.0)) - 180.0).abs() < 1e-9);
        assert!((direction(o, Point::new(-1.0, 0.0)) - 270.0).abs() < 1e-9);
    }

    #[test]
    fn normalize_wraps_both_ways() {
        assert_eq!(normalize_angle(370.0), 10.0);
        assert_eq!(normalize_angle(-90.0), 270.0);
        assert_eq!(normalize_angle(0.0), 0.0);
    }

    #[test]
    fn opposition_is_symmetric() {
        assert_eq!(opposition(90.0, 270.0), 0.0);
        assert!((opposition(90.5, 270.0) - 0.5).abs() < 1e-9);
        assert!((opposition(89.5, 270.0) - 0.5).abs() < 1e-9);
        assert_eq!(opposition(90.0, 90.0), 180.0);
    }

    #[test]
    fn straight_length_and_cut() {
        let g = StraightGeometry::default();
        let id = TrackId::new(0, 1);
        let eps = [ep(0.0, 0.0, 270.0), ep(10.0, 0.0, 90.0)];
        assert_eq!(g.length(id, &eps), Some(10.0));

        let cut = g.cut(id, &eps, Point::new(4.0, 3.0)).unwrap();
        assert_eq!(cut.position, Point::new(4.0, 0.0));
        assert!((cut.angle - 90.0).abs() < 1e-9);

        assert!(g.cut(id, &eps, Point::new(-1.0, 0.0)).is_none());
        assert!(g.cut(id, &eps, Point::new(10.0, 0.0)).is_none());
    }

    #[test]
    fn straight_merge_requires_collinear_pieces() {
        let g = StraightGeometry::default();
        let a = [ep(0.0, 0.0, 270.0), ep(5.0, 0.0, 90.0)];
        let b = [ep(5.0, 0.0, 270.0), ep(10.0, 0.0, 90.0)];
        let bent = [ep(5.0, 0.0, 270.0), ep(9.0, 3.0, 53.0)];
        let ia = TrackId::new(0, 1);
        let ib = TrackId::new(1, 1);
        assert!(g.can_merge((ia, &a), 1, (ib, &b), 0));
        assert!(!g.can_merge((ia, &a), 1, (ib, &bent), 0));
    }
}

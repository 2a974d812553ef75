// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Geometry helpers — corner angle cosines, distance from origin, point
// scaling, and radial corner ordering. Pure functions, no state.

use quadsight_core::{CoordSpace, Point};

/// Added under the square root so coincident points give 0 instead of NaN.
const COSINE_EPSILON: f64 = 1e-10;

/// Cosine of the angle at `pivot` between the rays towards `a` and `b`.
///
/// Symmetric in `a` and `b`. A right angle gives ~0, a straight line ~-1.
pub fn angle_cosine<S: CoordSpace>(a: Point<S>, b: Point<S>, pivot: Point<S>) -> f64 {
    let (dx1, dy1) = (a.x - pivot.x, a.y - pivot.y);
    let (dx2, dy2) = (b.x - pivot.x, b.y - pivot.y);
    (dx1 * dx2 + dy1 * dy2)
        / ((dx1 * dx1 + dy1 * dy1) * (dx2 * dx2 + dy2 * dy2) + COSINE_EPSILON).sqrt()
}

/// Euclidean distance of `p` from the origin of its space.
pub fn radial_distance<S: CoordSpace>(p: Point<S>) -> f64 {
    p.x.hypot(p.y)
}

/// Multiply each coordinate by its own factor, staying in the same space.
pub fn scale<S: CoordSpace>(p: Point<S>, fx: f64, fy: f64) -> Point<S> {
    Point::new(p.x * fx, p.y * fy)
}

/// Sort four corners by distance from the origin (stable on ties).
///
/// For an axis-aligned-ish quad this yields nearest corner, its two
/// neighbours, then the far corner, so the drawn path visits
/// `p0, p1, p3, p2`.
pub fn order_by_radial_distance<S: CoordSpace>(mut corners: [Point<S>; 4]) -> [Point<S>; 4] {
    corners.sort_by(|a, b| radial_distance(*a).total_cmp(&radial_distance(*b)));
    corners
}

#[cfg(test)]
mod tests {
    use super::*;
    use quadsight_core::{Display, Working};

    fn wp(x: f64, y: f64) -> Point<Working> {
        Point::new(x, y)
    }

    #[test]
    fn right_angle_has_zero_cosine() {
        let c = angle_cosine(wp(10.0, 0.0), wp(0.0, 10.0), wp(0.0, 0.0));
        assert!(c.abs() < 1e-9, "got {c}");
    }

    #[test]
    fn straight_line_has_cosine_minus_one() {
        let c = angle_cosine(wp(-5.0, 0.0), wp(5.0, 0.0), wp(0.0, 0.0));
        assert!((c + 1.0).abs() < 1e-9, "got {c}");
    }

    #[test]
    fn cosine_is_symmetric_in_the_rays() {
        let samples = [
            (wp(3.0, 7.0), wp(-2.0, 4.0), wp(1.0, 1.0)),
            (wp(100.0, 0.0), wp(90.0, 30.0), wp(0.0, 0.0)),
            (wp(-1.5, 2.5), wp(8.0, -3.0), wp(0.5, 0.5)),
        ];
        for (a, b, p) in samples {
            assert_eq!(angle_cosine(a, b, p), angle_cosine(b, a, p));
        }
    }

    #[test]
    fn coincident_points_do_not_produce_nan() {
        let p = wp(4.0, 4.0);
        let c = angle_cosine(p, p, p);
        assert!(c.is_finite());
        assert_eq!(c, 0.0);
    }

    #[test]
    fn radial_distance_matches_euclidean_distance() {
        assert!((radial_distance(wp(3.0, 4.0)) - 5.0).abs() < 1e-12);
        assert_eq!(radial_distance(wp(0.0, 0.0)), 0.0);
        // monotonic along a ray
        let mut last = 0.0;
        for i in 1..20 {
            let d = radial_distance(wp(i as f64 * 1.5, i as f64 * 0.5));
            assert!(d > last);
            last = d;
        }
    }

    #[test]
    fn scale_applies_each_axis_independently() {
        let p = scale(wp(2.0, 3.0), 1.5, 4.0);
        assert_eq!((p.x, p.y), (3.0, 12.0));
    }

    #[test]
    fn radial_ordering_of_unit_square() {
        let corners: [Point<Display>; 4] = [
            Point::new(10.0, 10.0),
            Point::new(0.0, 10.0),
            Point::new(10.0, 0.0),
            Point::new(0.0, 0.0),
        ];
        let ordered = order_by_radial_distance(corners);
        assert_eq!((ordered[0].x, ordered[0].y), (0.0, 0.0));
        assert_eq!((ordered[3].x, ordered[3].y), (10.0, 10.0));
        // ties keep input order
        assert_eq!((ordered[1].x, ordered[1].y), (0.0, 10.0));
        assert_eq!((ordered[2].x, ordered[2].y), (10.0, 0.0));
    }
}

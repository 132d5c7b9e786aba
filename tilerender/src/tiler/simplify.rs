//! Douglas–Peucker vertex importance.
//!
//! Instead of simplifying once per zoom, every vertex is tagged with the
//! squared distance at which it stops mattering. A query at a given
//! tolerance then keeps exactly the vertices whose importance exceeds it.

use super::index::ProjectedPoint;

/// Tags each vertex with its squared-distance importance.
///
/// Endpoints are always kept (`f64::INFINITY`). Interior vertices that are
/// insignificant at `sq_tolerance` stay at `0.0`. A vertex's importance is
/// capped at its parent's so that filtering at any tolerance yields the
/// same result as running Douglas–Peucker at that tolerance.
pub(crate) fn mark_importance(points: &mut [ProjectedPoint], sq_tolerance: f64) {
    let n = points.len();
    if n == 0 {
        return;
    }
    points[0].importance = f64::INFINITY;
    points[n - 1].importance = f64::INFINITY;
    if n < 3 {
        return;
    }

    let mut stack = vec![(0usize, n - 1, f64::INFINITY)];
    while let Some((first, last, cap)) = stack.pop() {
        let mut max_sq_dist = sq_tolerance;
        let mut split = None;

        for i in (first + 1)..last {
            let d = sq_segment_distance(&points[i], &points[first], &points[last]);
            if d > max_sq_dist {
                max_sq_dist = d;
                split = Some(i);
            }
        }

        if let Some(i) = split {
            let importance = max_sq_dist.min(cap);
            points[i].importance = importance;
            stack.push((first, i, importance));
            stack.push((i, last, importance));
        }
    }
}

/// Squared distance from `p` to the segment `a`–`b`.
fn sq_segment_distance(p: &ProjectedPoint, a: &ProjectedPoint, b: &ProjectedPoint) -> f64 {
    let (mut x, mut y) = (a.x, a.y);
    let dx = b.x - x;
    let dy = b.y - y;

    if dx != 0.0 || dy != 0.0 {
        let t = ((p.x - x) * dx + (p.y - y) * dy) / (dx * dx + dy * dy);
        if t > 1.0 {
            x = b.x;
            y = b.y;
        } else if t > 0.0 {
            x += dx * t;
            y += dy * t;
        }
    }

    let dx = p.x - x;
    let dy = p.y - y;
    dx * dx + dy * dy
}

#[cfg(test)]
mod tests {
    use super::*;

    fn points(coords: &[(f64, f64)]) -> Vec<ProjectedPoint> {
        coords
            .iter()
            .map(|&(x, y)| ProjectedPoint::new(x, y))
            .collect()
    }

    #[test]
    fn test_endpoints_always_kept() {
        let mut pts = points(&[(0.0, 0.0), (1.0, 0.0)]);
        mark_importance(&mut pts, 0.5);
        assert!(pts.iter().all(|p| p.importance.is_infinite()));
    }

    #[test]
    fn test_collinear_interior_is_insignificant() {
        let mut pts = points(&[(0.0, 0.0), (0.5, 0.0), (1.0, 0.0)]);
        mark_importance(&mut pts, 0.0);
        assert_eq!(pts[1].importance, 0.0);
    }

    #[test]
    fn test_importance_is_squared_distance() {
        let mut pts = points(&[(0.0, 0.0), (0.5, 0.2), (1.0, 0.0)]);
        mark_importance(&mut pts, 0.0);
        assert!((pts[1].importance - 0.04).abs() < 1e-12);
    }

    #[test]
    fn test_child_importance_capped_by_parent() {
        // The spike at index 3 is far more significant than index 1, but
        // index 2 (dropped before index 3 is considered) must not exceed it.
        let mut pts = points(&[(0.0, 0.0), (1.0, 0.1), (2.0, 0.0), (3.0, 5.0), (4.0, 0.0)]);
        mark_importance(&mut pts, 0.0);
        for i in 1..4 {
            assert!(pts[i].importance <= pts[3].importance);
        }
    }

    #[test]
    fn test_sq_segment_distance_clamps_to_endpoints() {
        let a = ProjectedPoint::new(0.0, 0.0);
        let b = ProjectedPoint::new(1.0, 0.0);
        let beyond = ProjectedPoint::new(2.0, 0.0);
        assert_eq!(sq_segment_distance(&beyond, &a, &b), 1.0);
        let degenerate = sq_segment_distance(&beyond, &a, &a);
        assert_eq!(degenerate, 4.0);
    }
}

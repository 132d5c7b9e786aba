//! Axis-aligned clipping of lines and rings in projected space.

use crate::coord::TileBounds;

pub(crate) type Coord = (f64, f64);

#[derive(Clone, Copy)]
enum Axis {
    X,
    Y,
}

impl Axis {
    #[inline]
    fn of(self, p: Coord) -> f64 {
        match self {
            Axis::X => p.0,
            Axis::Y => p.1,
        }
    }

    /// Point on `a`–`b` where this axis equals `k`.
    #[inline]
    fn intersect(self, a: Coord, b: Coord, k: f64) -> Coord {
        match self {
            Axis::X => {
                let t = (k - a.0) / (b.0 - a.0);
                (k, a.1 + (b.1 - a.1) * t)
            }
            Axis::Y => {
                let t = (k - a.1) / (b.1 - a.1);
                (a.0 + (b.0 - a.0) * t, k)
            }
        }
    }
}

/// Clips a polyline to `bounds`, splitting it wherever it leaves and
/// re-enters. Parts with fewer than two points are dropped.
pub(crate) fn clip_line(points: &[Coord], bounds: &TileBounds) -> Vec<Vec<Coord>> {
    clip_line_axis(points, bounds.min_x, bounds.max_x, Axis::X)
        .into_iter()
        .flat_map(|part| clip_line_axis(&part, bounds.min_y, bounds.max_y, Axis::Y))
        .collect()
}

fn clip_line_axis(points: &[Coord], k1: f64, k2: f64, axis: Axis) -> Vec<Vec<Coord>> {
    let mut parts = Vec::new();
    if points.len() < 2 {
        return parts;
    }
    let mut slice: Vec<Coord> = Vec::new();

    let finish = |slice: &mut Vec<Coord>, parts: &mut Vec<Vec<Coord>>| {
        if slice.len() >= 2 {
            parts.push(std::mem::take(slice));
        } else {
            slice.clear();
        }
    };

    for pair in points.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        let ak = axis.of(a);
        let bk = axis.of(b);

        if ak < k1 {
            if bk > k2 {
                slice.push(axis.intersect(a, b, k1));
                slice.push(axis.intersect(a, b, k2));
                finish(&mut slice, &mut parts);
            } else if bk >= k1 {
                slice.push(axis.intersect(a, b, k1));
            }
        } else if ak > k2 {
            if bk < k1 {
                slice.push(axis.intersect(a, b, k2));
                slice.push(axis.intersect(a, b, k1));
                finish(&mut slice, &mut parts);
            } else if bk <= k2 {
                slice.push(axis.intersect(a, b, k2));
            }
        } else {
            slice.push(a);
            if bk < k1 {
                slice.push(axis.intersect(a, b, k1));
                finish(&mut slice, &mut parts);
            } else if bk > k2 {
                slice.push(axis.intersect(a, b, k2));
                finish(&mut slice, &mut parts);
            }
        }
    }

    if let Some(&last) = points.last() {
        let lk = axis.of(last);
        if lk >= k1 && lk <= k2 {
            slice.push(last);
        }
    }
    finish(&mut slice, &mut parts);

    parts
}

/// Clips an open ring (no repeated closing vertex) to `bounds` with
/// Sutherland–Hodgman. The result is open as well and may be empty.
pub(crate) fn clip_ring(points: &[Coord], bounds: &TileBounds) -> Vec<Coord> {
    let ring = clip_ring_plane(points, Axis::X, bounds.min_x, true);
    let ring = clip_ring_plane(&ring, Axis::X, bounds.max_x, false);
    let ring = clip_ring_plane(&ring, Axis::Y, bounds.min_y, true);
    clip_ring_plane(&ring, Axis::Y, bounds.max_y, false)
}

fn clip_ring_plane(points: &[Coord], axis: Axis, k: f64, keep_above: bool) -> Vec<Coord> {
    let n = points.len();
    let mut out = Vec::with_capacity(n + 2);
    if n == 0 {
        return out;
    }
    let inside = |p: Coord| {
        if keep_above {
            axis.of(p) >= k
        } else {
            axis.of(p) <= k
        }
    };

    for i in 0..n {
        let prev = points[(i + n - 1) % n];
        let cur = points[i];
        match (inside(prev), inside(cur)) {
            (true, true) => out.push(cur),
            (true, false) => out.push(axis.intersect(prev, cur, k)),
            (false, true) => {
                out.push(axis.intersect(prev, cur, k));
                out.push(cur);
            }
            (false, false) => {}
        }
    }
    out
}

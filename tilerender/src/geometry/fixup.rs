//! Polygon ring repair.
//!
//! Simplification and clipping can leave tile polygons with self-touching
//! or self-crossing rings and inconsistent winding. [`fixup_polygons`]
//! splits every ring into simple loops and re-orients them so that loops
//! derived from the outer ring have positive shoelace area in the y-down
//! tile space (clockwise on screen) and loops derived from holes have
//! negative area.

use std::collections::HashMap;

use super::{GeometryCollection, TilePoint};

type Vertex = (i64, i64);

/// Signed shoelace area of a ring in tile units.
///
/// The ring may be open or closed. Positive means clockwise on a y-down
/// screen, which is the orientation used for outer rings.
pub fn signed_area(ring: &[TilePoint]) -> f64 {
    let vertices: Vec<Vertex> = ring
        .iter()
        .map(|p| (i64::from(p.x), i64::from(p.y)))
        .collect();
    twice_area(&vertices) as f64 / 2.0
}

/// Whether a ring has no self-intersections, self-touching vertices or
/// overlapping edges.
pub fn is_simple(ring: &[TilePoint]) -> bool {
    let vertices = normalize(ring.iter().map(|p| (i64::from(p.x), i64::from(p.y))).collect());
    vertices.len() >= 3 && find_split(&vertices).is_none()
}

/// Repairs the rings of one polygon.
///
/// The first ring is treated as the outer ring, the rest as holes. Every
/// ring is split at its self-intersections into simple loops; loops with
/// no area are dropped. Returned rings are closed. If nothing of the outer
/// ring survives, the polygon is empty.
pub fn fixup_polygons(rings: GeometryCollection) -> GeometryCollection {
    let mut fixed = GeometryCollection::with_capacity(rings.len());

    for (index, ring) in rings.iter().enumerate() {
        let is_outer = index == 0;
        let start = fixed.len();

        for mut simple in split_into_simple_loops(ring) {
            let area = twice_area(&simple);
            if area == 0 {
                continue;
            }
            if (area > 0) != is_outer {
                simple.reverse();
            }
            fixed.push(close(&simple));
        }

        if is_outer && fixed.len() == start {
            return GeometryCollection::new();
        }
    }

    fixed
}

fn close(vertices: &[Vertex]) -> Vec<TilePoint> {
    let mut ring: Vec<TilePoint> = vertices.iter().map(|&v| to_tile_point(v)).collect();
    if let Some(first) = ring.first().copied() {
        ring.push(first);
    }
    ring
}

fn to_tile_point((x, y): Vertex) -> TilePoint {
    let clamp = |v: i64| v.clamp(i64::from(i16::MIN), i64::from(i16::MAX)) as i16;
    TilePoint::new(clamp(x), clamp(y))
}

fn twice_area(vertices: &[Vertex]) -> i64 {
    let n = vertices.len();
    if n < 3 {
        return 0;
    }
    (0..n)
        .map(|i| {
            let (x1, y1) = vertices[i];
            let (x2, y2) = vertices[(i + 1) % n];
            x1 * y2 - x2 * y1
        })
        .sum()
}

#[inline]
fn orient(a: Vertex, b: Vertex, c: Vertex) -> i64 {
    (b.0 - a.0) * (c.1 - a.1) - (b.1 - a.1) * (c.0 - a.0)
}

/// Drops consecutive duplicates, the closing vertex and collinear vertices
/// until the ring stops changing.
fn normalize(mut vertices: Vec<Vertex>) -> Vec<Vertex> {
    loop {
        let before = vertices.len();

        vertices.dedup();
        while vertices.len() > 1 && vertices.first() == vertices.last() {
            vertices.pop();
        }

        let n = vertices.len();
        if n >= 3 {
            let mut kept = Vec::with_capacity(n);
            for i in 0..n {
                let prev = vertices[(i + n - 1) % n];
                let next = vertices[(i + 1) % n];
                if orient(prev, vertices[i], next) != 0 {
                    kept.push(vertices[i]);
                }
            }
            vertices = kept;
        }

        if vertices.len() == before || vertices.len() < 3 {
            return vertices;
        }
    }
}

enum Split {
    /// Two non-consecutive vertices coincide.
    Vertex(usize, usize),
    /// Non-adjacent edges `i` and `j` meet at the given point.
    Edge(usize, usize, Vertex),
}

/// Finds the first repeated vertex, then sweeps edges by x-extent for a
/// crossing between non-adjacent edges.
fn find_split(vertices: &[Vertex]) -> Option<Split> {
    let n = vertices.len();

    let mut seen: HashMap<Vertex, usize> = HashMap::with_capacity(n);
    for (j, v) in vertices.iter().enumerate() {
        if let Some(&i) = seen.get(v) {
            return Some(Split::Vertex(i, j));
        }
        seen.insert(*v, j);
    }

    let edge = |i: usize| (vertices[i], vertices[(i + 1) % n]);
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_unstable_by_key(|&i| {
        let (a, b) = edge(i);
        a.0.min(b.0)
    });

    let mut active: Vec<usize> = Vec::new();
    for &i in &order {
        let (a, b) = edge(i);
        let min_x = a.0.min(b.0);
        active.retain(|&j| {
            let (c, d) = edge(j);
            c.0.max(d.0) >= min_x
        });

        let (min_y, max_y) = (a.1.min(b.1), a.1.max(b.1));
        for &j in &active {
            let (c, d) = edge(j);
            if c.1.max(d.1) < min_y || c.1.min(d.1) > max_y {
                continue;
            }
            let (lo, hi) = (i.min(j), i.max(j));
            if hi - lo == 1 || (lo == 0 && hi == n - 1) {
                continue;
            }
            if let Some(point) = intersect(edge(lo), edge(hi)) {
                return Some(Split::Edge(lo, hi, point));
            }
        }
        active.push(i);
    }

    None
}

fn on_segment(a: Vertex, b: Vertex, p: Vertex) -> bool {
    p.0 >= a.0.min(b.0) && p.0 <= a.0.max(b.0) && p.1 >= a.1.min(b.1) && p.1 <= a.1.max(b.1)
}

fn intersect((a, b): (Vertex, Vertex), (c, d): (Vertex, Vertex)) -> Option<Vertex> {
    let d1 = orient(a, b, c);
    let d2 = orient(a, b, d);
    let d3 = orient(c, d, a);
    let d4 = orient(c, d, b);

    if d1.signum() * d2.signum() < 0 && d3.signum() * d4.signum() < 0 {
        let t = d3 as f64 / (d3 - d4) as f64;
        let x = a.0 as f64 + t * (b.0 - a.0) as f64;
        let y = a.1 as f64 + t * (b.1 - a.1) as f64;
        return Some((x.round() as i64, y.round() as i64));
    }

    if d1 == 0 && on_segment(a, b, c) {
        return Some(c);
    }
    if d2 == 0 && on_segment(a, b, d) {
        return Some(d);
    }
    if d3 == 0 && on_segment(c, d, a) {
        return Some(a);
    }
    if d4 == 0 && on_segment(c, d, b) {
        return Some(b);
    }
    None
}

/// Splits one ring into simple loops. Each split strictly shrinks both
/// halves, so the work list always drains.
fn split_into_simple_loops(ring: &[TilePoint]) -> Vec<Vec<Vertex>> {
    let start: Vec<Vertex> = ring
        .iter()
        .map(|p| (i64::from(p.x), i64::from(p.y)))
        .collect();

    let mut pending = vec![start];
    let mut simple = Vec::new();

    while let Some(candidate) = pending.pop() {
        let vertices = normalize(candidate);
        if vertices.len() < 3 {
            continue;
        }
        let n = vertices.len();

        match find_split(&vertices) {
            None => simple.push(vertices),
            Some(Split::Vertex(i, j)) => {
                pending.push(vertices[i..j].to_vec());
                let mut rest = vertices[j..].to_vec();
                rest.extend_from_slice(&vertices[..i]);
                pending.push(rest);
            }
            Some(Split::Edge(i, j, point)) => {
                let mut first = vec![point];
                first.extend_from_slice(&vertices[i + 1..=j]);
                pending.push(first);

                let mut second = vec![point];
                second.extend_from_slice(&vertices[(j + 1).min(n)..]);
                second.extend_from_slice(&vertices[..=i]);
                pending.push(second);
            }
        }
    }

    simple
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ring(coords: &[(i16, i16)]) -> Vec<TilePoint> {
        coords.iter().map(|&(x, y)| TilePoint::new(x, y)).collect()
    }

    fn total_abs_area(rings: &GeometryCollection) -> f64 {
        rings.iter().map(|r| signed_area(r).abs()).sum()
    }

    #[test]
    fn test_signed_area_orientation() {
        // Clockwise on a y-down screen.
        let cw = ring(&[(0, 0), (10, 0), (10, 10), (0, 10), (0, 0)]);
        assert_eq!(signed_area(&cw), 100.0);
        let mut ccw = cw.clone();
        ccw.reverse();
        assert_eq!(signed_area(&ccw), -100.0);
    }

    #[test]
    fn test_valid_polygon_is_reoriented() {
        let outer = ring(&[(0, 0), (0, 100), (100, 100), (100, 0), (0, 0)]);
        let hole = ring(&[(20, 20), (80, 20), (80, 80), (20, 80), (20, 20)]);
        assert!(signed_area(&outer) < 0.0);
        assert!(signed_area(&hole) > 0.0);

        let fixed = fixup_polygons(vec![outer, hole]);

        assert_eq!(fixed.len(), 2);
        assert_eq!(signed_area(&fixed[0]), 10_000.0);
        assert_eq!(signed_area(&fixed[1]), -3_600.0);
        for r in &fixed {
            assert_eq!(r.first(), r.last(), "rings are closed");
        }
    }

    #[test]
    fn test_bowtie_outer_ring_is_split() {
        let bowtie = ring(&[(0, 0), (10, 10), (10, 0), (0, 10), (0, 0)]);
        assert!(!is_simple(&bowtie));

        let fixed = fixup_polygons(vec![bowtie]);

        assert_eq!(fixed.len(), 2);
        for r in &fixed {
            assert!(is_simple(r), "ring {:?} should be simple", r);
            assert!(signed_area(r) > 0.0, "outer loops wind positive");
        }
        assert!((total_abs_area(&fixed) - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_ring_touching_itself_at_vertex() {
        // Figure-eight through the shared vertex (10, 10).
        let eight = ring(&[
            (0, 0),
            (10, 0),
            (10, 10),
            (20, 10),
            (20, 20),
            (10, 20),
            (10, 10),
            (0, 10),
            (0, 0),
        ]);

        let fixed = fixup_polygons(vec![eight]);

        assert_eq!(fixed.len(), 2);
        assert!(fixed.iter().all(|r| is_simple(r) && signed_area(r) > 0.0));
        assert!((total_abs_area(&fixed) - 200.0).abs() < 1e-9);
    }

    #[test]
    fn test_degenerate_outer_ring_empties_polygon() {
        let line_like = ring(&[(0, 0), (5, 5), (10, 10), (0, 0)]);
        let hole = ring(&[(1, 1), (2, 1), (2, 2), (1, 1)]);
        assert!(fixup_polygons(vec![line_like, hole]).is_empty());
    }

    #[test]
    fn test_spike_is_removed() {
        // (10, 0) -> (15, 0) -> back to (10, 0) direction is a zero-area spike.
        let spiky = ring(&[(0, 0), (10, 0), (15, 0), (10, 0), (10, 10), (0, 10), (0, 0)]);
        let fixed = fixup_polygons(vec![spiky]);
        assert_eq!(fixed.len(), 1);
        assert!(is_simple(&fixed[0]));
        assert_eq!(signed_area(&fixed[0]), 100.0);
    }

    #[test]
    fn test_self_intersecting_hole_keeps_hole_winding() {
        let outer = ring(&[(0, 0), (100, 0), (100, 100), (0, 100), (0, 0)]);
        let hole = ring(&[(10, 10), (50, 50), (50, 10), (10, 50), (10, 10)]);
        let fixed = fixup_polygons(vec![outer, hole]);
        assert_eq!(fixed.len(), 3);
        assert!(signed_area(&fixed[0]) > 0.0);
        assert!(fixed[1..].iter().all(|r| signed_area(r) < 0.0 && is_simple(r)));
        let hole_area: f64 = fixed[1..].iter().map(|r| signed_area(r).abs()).sum();
        assert!((hole_area - 800.0).abs() < 1e-9);
    }

    #[test]
    fn test_large_ring_with_one_crossing() {
        // Dense circle whose last two vertices are swapped, crossing once.
        let n = 4000;
        let mut coords: Vec<(i16, i16)> = (0..n)
            .map(|k| {
                let angle = k as f64 / n as f64 * std::f64::consts::TAU;
                (
                    (12_000.0 * angle.cos()).round() as i16,
                    (12_000.0 * angle.sin()).round() as i16,
                )
            })
            .collect();
        coords.dedup();
        assert!(is_simple(&ring(&coords)));

        let len = coords.len();
        coords.swap(len - 1, len - 2);
        let crossed = ring(&coords);
        assert!(!is_simple(&crossed));

        let fixed = fixup_polygons(vec![crossed]);
        assert!(!fixed.is_empty());
        assert!(fixed.iter().all(|r| is_simple(r) && signed_area(r) > 0.0));
    }

    /// Exhaustive pairwise check, the reference for the sweep.
    fn has_split_by_pairs(vertices: &[Vertex]) -> bool {
        let n = vertices.len();
        for i in 0..n {
            for j in (i + 1)..n {
                if vertices[i] == vertices[j] {
                    return true;
                }
                if j - i == 1 || (i == 0 && j == n - 1) {
                    continue;
                }
                let edge_i = (vertices[i], vertices[(i + 1) % n]);
                let edge_j = (vertices[j], vertices[(j + 1) % n]);
                if intersect(edge_i, edge_j).is_some() {
                    return true;
                }
            }
        }
        false
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        /// Star-shaped ring: evenly spaced angles, random radii. Simple by
        /// construction, with a clockwise (positive) orientation.
        fn star_ring() -> impl Strategy<Value = Vec<TilePoint>> {
            prop::collection::vec(100.0..1000.0_f64, 3..24).prop_map(|radii| {
                let n = radii.len();
                let mut points: Vec<TilePoint> = radii
                    .iter()
                    .enumerate()
                    .map(|(k, r)| {
                        let angle = k as f64 / n as f64 * std::f64::consts::TAU;
                        TilePoint::new(
                            (2048.0 + r * angle.cos()).round() as i16,
                            (2048.0 + r * angle.sin()).round() as i16,
                        )
                    })
                    .collect();
                points.push(points[0]);
                points
            })
        }

        proptest! {
            #[test]
            fn test_simple_ring_area_is_preserved(outer in star_ring()) {
                let before = signed_area(&outer);
                prop_assert!(before > 0.0);

                let mut reversed = outer.clone();
                reversed.reverse();
                for input in [outer, reversed] {
                    let fixed = fixup_polygons(vec![input]);
                    prop_assert_eq!(fixed.len(), 1);
                    prop_assert!((signed_area(&fixed[0]) - before).abs() < 1e-9);
                }
            }

            #[test]
            fn test_sweep_matches_pairwise_search(
                coords in prop::collection::vec((-20i64..20, -20i64..20), 3..16)
            ) {
                prop_assert_eq!(find_split(&coords).is_some(), has_split_by_pairs(&coords));
            }

            #[test]
            fn test_fixed_rings_are_simple_and_wound(
                coords in prop::collection::vec((-50i16..50, -50i16..50), 3..10)
            ) {
                let mut outer = ring(&coords);
                outer.push(outer[0]);

                let fixed = fixup_polygons(vec![outer]);

                for r in &fixed {
                    prop_assert!(is_simple(r), "not simple: {:?}", r);
                    prop_assert!(signed_area(r) > 0.0, "bad winding: {:?}", r);
                    prop_assert_eq!(r.first(), r.last());
                }
            }

            #[test]
            fn test_fixup_is_idempotent_on_simple_input(
                w in 1i16..200,
                h in 1i16..200
            ) {
                let square = ring(&[(0, 0), (w, 0), (w, h), (0, h), (0, 0)]);
                let once = fixup_polygons(vec![square]);
                let twice = fixup_polygons(once.clone());
                prop_assert_eq!(once, twice);
            }
        }
    }
}

//! One-time simplification index over a shape set.

use std::time::Instant;

use rayon::prelude::*;
use tracing::info;

use super::simplify::mark_importance;
use crate::coord::{project, TileBounds};
use crate::geometry::{Coord, Geometry, Point, Polygon, PropertyMap, Shape};

/// A projected vertex with its Douglas–Peucker importance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct ProjectedPoint {
    pub x: f64,
    pub y: f64,
    pub importance: f64,
}

impl ProjectedPoint {
    pub(crate) fn new(x: f64, y: f64) -> Self {
        Self {
            x,
            y,
            importance: 0.0,
        }
    }
}

/// Projected geometry of one indexed feature.
#[derive(Debug, Clone)]
pub(crate) enum ProjectedGeometry {
    Points(Vec<ProjectedPoint>),
    Lines(Vec<Vec<ProjectedPoint>>),
    Polygons(Vec<Vec<Vec<ProjectedPoint>>>),
}

#[derive(Debug, Clone)]
pub(crate) struct ProjectedFeature {
    pub geometry: ProjectedGeometry,
    pub bounds: TileBounds,
    pub properties: PropertyMap,
}

/// Built index: every input shape projected, flattened and simplified.
///
/// Collections are flattened, so one shape may contribute several indexed
/// features. Shapes that degenerate entirely contribute none.
#[derive(Debug)]
pub struct TileIndex {
    pub(crate) features: Vec<ProjectedFeature>,
}

impl TileIndex {
    /// Builds the index in parallel over shapes.
    ///
    /// # Arguments
    ///
    /// * `shapes` - Input shapes in lon/lat degrees
    /// * `sq_tolerance` - Squared simplification tolerance at the deepest zoom
    pub(crate) fn build(shapes: &[Shape], sq_tolerance: f64) -> Self {
        let start = Instant::now();

        let features: Vec<ProjectedFeature> = shapes
            .par_iter()
            .flat_map_iter(|shape| {
                let mut out = Vec::new();
                collect(&shape.geometry, &shape.properties, sq_tolerance, &mut out);
                out
            })
            .collect();

        info!(
            shapes = shapes.len(),
            features = features.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Built tile index"
        );

        Self { features }
    }

    /// Number of indexed features.
    pub fn feature_count(&self) -> usize {
        self.features.len()
    }

    /// Whether the index holds nothing.
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

fn collect(
    geometry: &Geometry<f64>,
    properties: &PropertyMap,
    sq_tolerance: f64,
    out: &mut Vec<ProjectedFeature>,
) {
    let projected = match geometry {
        Geometry::Point(p) => ProjectedGeometry::Points(vec![project_point(p)]),
        Geometry::MultiPoint(points) => {
            ProjectedGeometry::Points(points.iter().map(project_point).collect())
        }
        Geometry::Line(line) => ProjectedGeometry::Lines(
            project_line(&[line.start, line.end], sq_tolerance)
                .into_iter()
                .collect(),
        ),
        Geometry::LineString(line) => {
            ProjectedGeometry::Lines(project_line(&line.0, sq_tolerance).into_iter().collect())
        }
        Geometry::MultiLineString(lines) => ProjectedGeometry::Lines(
            lines
                .iter()
                .filter_map(|line| project_line(&line.0, sq_tolerance))
                .collect(),
        ),
        Geometry::Polygon(polygon) => ProjectedGeometry::Polygons(
            project_polygon(polygon, sq_tolerance).into_iter().collect(),
        ),
        Geometry::MultiPolygon(polygons) => ProjectedGeometry::Polygons(
            polygons
                .iter()
                .filter_map(|polygon| project_polygon(polygon, sq_tolerance))
                .collect(),
        ),
        Geometry::Rect(rect) => ProjectedGeometry::Polygons(
            project_polygon(&rect.to_polygon(), sq_tolerance)
                .into_iter()
                .collect(),
        ),
        Geometry::Triangle(triangle) => ProjectedGeometry::Polygons(
            project_polygon(&triangle.to_polygon(), sq_tolerance)
                .into_iter()
                .collect(),
        ),
        Geometry::GeometryCollection(members) => {
            for member in members {
                collect(member, properties, sq_tolerance, out);
            }
            return;
        }
    };

    if let Some(bounds) = bounds_of(&projected) {
        out.push(ProjectedFeature {
            geometry: projected,
            bounds,
            properties: properties.clone(),
        });
    }
}

fn project_point(p: &Point<f64>) -> ProjectedPoint {
    let (x, y) = project(p.x(), p.y());
    let mut point = ProjectedPoint::new(x, y);
    point.importance = f64::INFINITY;
    point
}

/// Projects and simplifies a vertex run, dropping vertices that never
/// matter at the deepest zoom.
fn project_run(coords: &[Coord<f64>], sq_tolerance: f64) -> Vec<ProjectedPoint> {
    let mut points: Vec<ProjectedPoint> = coords
        .iter()
        .map(|p| {
            let (x, y) = project(p.x, p.y);
            ProjectedPoint::new(x, y)
        })
        .collect();
    mark_importance(&mut points, sq_tolerance);
    points.retain(|p| p.importance > sq_tolerance);
    points
}

fn project_line(line: &[Coord<f64>], sq_tolerance: f64) -> Option<Vec<ProjectedPoint>> {
    let points = project_run(line, sq_tolerance);
    (points.len() >= 2).then_some(points)
}

/// A polygon whose outer ring collapses is dropped; collapsed holes are
/// skipped individually.
fn project_polygon(polygon: &Polygon<f64>, sq_tolerance: f64) -> Option<Vec<Vec<ProjectedPoint>>> {
    let rings = std::iter::once(polygon.exterior()).chain(polygon.interiors());
    let mut out = Vec::with_capacity(1 + polygon.interiors().len());
    for (i, ring) in rings.enumerate() {
        let points = project_run(&ring.0, sq_tolerance);
        if points.len() < 4 {
            if i == 0 {
                return None;
            }
            continue;
        }
        out.push(points);
    }
    (!out.is_empty()).then_some(out)
}

fn bounds_of(geometry: &ProjectedGeometry) -> Option<TileBounds> {
    let mut bounds: Option<TileBounds> = None;
    let mut extend = |p: &ProjectedPoint| {
        let b = bounds.get_or_insert(TileBounds {
            min_x: p.x,
            min_y: p.y,
            max_x: p.x,
            max_y: p.y,
        });
        b.min_x = b.min_x.min(p.x);
        b.min_y = b.min_y.min(p.y);
        b.max_x = b.max_x.max(p.x);
        b.max_y = b.max_y.max(p.y);
    };

    match geometry {
        ProjectedGeometry::Points(points) => points.iter().for_each(&mut extend),
        ProjectedGeometry::Lines(lines) => lines.iter().flatten().for_each(&mut extend),
        ProjectedGeometry::Polygons(polygons) => polygons
            .iter()
            .flatten()
            .flatten()
            .for_each(&mut extend),
    }
    bounds
}

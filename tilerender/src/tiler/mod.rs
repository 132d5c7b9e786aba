//! Geometry tiler
//!
//! Slices a fixed set of input shapes into per-tile features in the integer
//! [`EXTENT`] space. The simplification index is built exactly once per
//! shape set; afterwards every tile query is a pure function of the index.
//!
//! # Lifecycle
//!
//! ```text
//! GeometryTiler::new ──► Unbuilt ──ensure_built()──► Built
//!                                         ▲
//!                          get_tile() ────┘ (builds on first use)
//! ```
//!
//! # Example
//!
//! ```ignore
//! use tilerender::coord::CanonicalTileId;
//! use tilerender::geometry::Shape;
//! use tilerender::tiler::{GeometryTiler, TilerOptions};
//!
//! let shapes = vec![Shape::line(&[(-10.0, 0.0), (10.0, 5.0)])];
//! let tiler = GeometryTiler::new(shapes, TilerOptions::default().with_max_zoom(14))?;
//! let features = tiler.get_tile(CanonicalTileId::new(0, 0, 0)?)?;
//! ```

mod clip;
mod index;
mod simplify;

pub use index::TileIndex;

use std::sync::OnceLock;

use thiserror::Error;
use tracing::debug;

use crate::coord::{CanonicalTileId, TileBounds, EXTENT, MAX_ZOOM};
use crate::geometry::{GeometryCollection, GeometryCoordinates, PropertyMap, Shape, TilePoint};
use clip::Coord;
use index::{ProjectedGeometry, ProjectedPoint};

/// Default tile buffer, in extent units.
pub const DEFAULT_BUFFER: u32 = 255;

/// Default simplification tolerance, in extent units.
pub const DEFAULT_TOLERANCE: f64 = 4.0;

/// Default deepest zoom served by a tiler.
pub const DEFAULT_MAX_ZOOM: u8 = 18;

/// Errors from building or querying a tiler.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum TilerError {
    #[error("Invalid tiler options: {0}")]
    InvalidOptions(String),

    #[error("Zoom {zoom} exceeds tiler max zoom {max_zoom}")]
    ZoomOutOfRange { zoom: u8, max_zoom: u8 },
}

/// Tiler configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TilerOptions {
    /// Deepest zoom that may be queried.
    pub max_zoom: u8,
    /// Tile edge length in local units.
    pub extent: u32,
    /// Extra margin around each tile, in local units.
    pub buffer: u32,
    /// Simplification tolerance in local units.
    pub base_tolerance: f64,
}

impl Default for TilerOptions {
    fn default() -> Self {
        Self {
            max_zoom: DEFAULT_MAX_ZOOM,
            extent: EXTENT,
            buffer: DEFAULT_BUFFER,
            base_tolerance: DEFAULT_TOLERANCE,
        }
    }
}

impl TilerOptions {
    /// Returns a copy with a different max zoom.
    pub fn with_max_zoom(mut self, max_zoom: u8) -> Self {
        self.max_zoom = max_zoom;
        self
    }

    /// Returns a copy with a different buffer.
    pub fn with_buffer(mut self, buffer: u32) -> Self {
        self.buffer = buffer;
        self
    }

    /// Returns a copy with a different base tolerance.
    pub fn with_tolerance(mut self, base_tolerance: f64) -> Self {
        self.base_tolerance = base_tolerance;
        self
    }

    /// Checks that tiles produced with these options fit in `i16`.
    pub fn validate(&self) -> Result<(), TilerError> {
        if self.max_zoom > MAX_ZOOM {
            return Err(TilerError::InvalidOptions(format!(
                "max_zoom {} exceeds {}",
                self.max_zoom, MAX_ZOOM
            )));
        }
        let fits = self
            .extent
            .checked_add(self.buffer)
            .is_some_and(|edge| edge <= i16::MAX as u32);
        if self.extent == 0 || !fits {
            return Err(TilerError::InvalidOptions(format!(
                "extent {} with buffer {} does not fit 16-bit coordinates",
                self.extent, self.buffer
            )));
        }
        if !self.base_tolerance.is_finite() || self.base_tolerance < 0.0 {
            return Err(TilerError::InvalidOptions(format!(
                "tolerance {} must be a non-negative number",
                self.base_tolerance
            )));
        }
        Ok(())
    }

    /// Tolerance at `zoom` in unit-square distance:
    /// `base_tolerance / ((2^zoom) * extent)`.
    pub fn tolerance_at(&self, zoom: u8) -> f64 {
        self.base_tolerance / ((1u64 << zoom) as f64 * self.extent as f64)
    }

    /// Tolerance used for the one-time index build.
    pub fn max_zoom_tolerance(&self) -> f64 {
        self.tolerance_at(self.max_zoom)
    }
}

/// Build state of the simplification index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexState {
    Unbuilt,
    Built,
}

/// Clipped geometry of one feature in tile-local coordinates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TileGeometry {
    Points(Vec<TilePoint>),
    /// One entry per line part.
    Lines(GeometryCollection),
    /// One entry per polygon, each an outer ring followed by holes.
    Polygons(Vec<GeometryCollection>),
}

/// A feature returned by [`GeometryTiler::get_tile`].
#[derive(Debug, Clone, PartialEq)]
pub struct TiledFeature {
    pub geometry: TileGeometry,
    pub properties: PropertyMap,
}

/// Lazily indexed shape set answering per-tile queries.
///
/// The tiler is `Sync`; concurrent first queries build the index once.
pub struct GeometryTiler {
    shapes: Vec<Shape>,
    options: TilerOptions,
    index: OnceLock<TileIndex>,
}

impl GeometryTiler {
    /// Creates an unbuilt tiler.
    pub fn new(shapes: Vec<Shape>, options: TilerOptions) -> Result<Self, TilerError> {
        options.validate()?;
        Ok(Self {
            shapes,
            options,
            index: OnceLock::new(),
        })
    }

    pub fn options(&self) -> &TilerOptions {
        &self.options
    }

    pub fn shapes(&self) -> &[Shape] {
        &self.shapes
    }

    pub fn state(&self) -> IndexState {
        if self.index.get().is_some() {
            IndexState::Built
        } else {
            IndexState::Unbuilt
        }
    }

    /// Builds the index if it has not been built yet and returns it.
    pub fn ensure_built(&self) -> &TileIndex {
        self.index.get_or_init(|| {
            let tolerance = self.options.max_zoom_tolerance();
            TileIndex::build(&self.shapes, tolerance * tolerance)
        })
    }

    /// Returns the features visible in `tile`, clipped to its buffered
    /// bounds and transformed into local integer coordinates.
    ///
    /// # Errors
    ///
    /// Returns [`TilerError::ZoomOutOfRange`] if `tile.z` exceeds the
    /// configured max zoom.
    pub fn get_tile(&self, tile: CanonicalTileId) -> Result<Vec<TiledFeature>, TilerError> {
        if tile.z > self.options.max_zoom {
            return Err(TilerError::ZoomOutOfRange {
                zoom: tile.z,
                max_zoom: self.options.max_zoom,
            });
        }

        let index = self.ensure_built();
        let transform = LocalTransform::new(tile, self.options.extent);
        let buffer = self.options.buffer as f64 / self.options.extent as f64;
        let bounds = tile.bounds().expand(buffer / transform.scale);
        let tolerance = self.options.tolerance_at(tile.z);
        let sq_tolerance = tolerance * tolerance;

        let features: Vec<TiledFeature> = index
            .features
            .iter()
            .filter(|feature| feature.bounds.intersects(&bounds))
            .filter_map(|feature| {
                slice(&feature.geometry, &bounds, sq_tolerance, &transform).map(|geometry| {
                    TiledFeature {
                        geometry,
                        properties: feature.properties.clone(),
                    }
                })
            })
            .collect();

        debug!(tile = %tile, features = features.len(), "Sliced tile");
        Ok(features)
    }
}

impl std::fmt::Debug for GeometryTiler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeometryTiler")
            .field("shapes", &self.shapes.len())
            .field("options", &self.options)
            .field("state", &self.state())
            .finish()
    }
}

/// Unit-square to tile-local coordinate mapping.
struct LocalTransform {
    scale: f64,
    tx: f64,
    ty: f64,
    extent: f64,
}

impl LocalTransform {
    fn new(tile: CanonicalTileId, extent: u32) -> Self {
        Self {
            scale: tile.dim() as f64,
            tx: tile.x as f64,
            ty: tile.y as f64,
            extent: extent as f64,
        }
    }

    fn apply(&self, (x, y): Coord) -> TilePoint {
        let lx = ((x * self.scale - self.tx) * self.extent).round();
        let ly = ((y * self.scale - self.ty) * self.extent).round();
        TilePoint::new(
            lx.clamp(i16::MIN as f64, i16::MAX as f64) as i16,
            ly.clamp(i16::MIN as f64, i16::MAX as f64) as i16,
        )
    }

    /// Transforms a run and drops consecutive duplicates created by rounding.
    fn apply_run(&self, run: &[Coord]) -> GeometryCoordinates {
        let mut out: GeometryCoordinates = Vec::with_capacity(run.len());
        for &c in run {
            let p = self.apply(c);
            if out.last() != Some(&p) {
                out.push(p);
            }
        }
        out
    }
}

fn significant(run: &[ProjectedPoint], sq_tolerance: f64) -> Vec<Coord> {
    run.iter()
        .filter(|p| p.importance > sq_tolerance)
        .map(|p| (p.x, p.y))
        .collect()
}

fn slice(
    geometry: &ProjectedGeometry,
    bounds: &TileBounds,
    sq_tolerance: f64,
    transform: &LocalTransform,
) -> Option<TileGeometry> {
    match geometry {
        ProjectedGeometry::Points(points) => {
            let points: Vec<TilePoint> = points
                .iter()
                .filter(|p| bounds.contains(p.x, p.y))
                .map(|p| transform.apply((p.x, p.y)))
                .collect();
            (!points.is_empty()).then_some(TileGeometry::Points(points))
        }
        ProjectedGeometry::Lines(lines) => {
            let parts: GeometryCollection = lines
                .iter()
                .flat_map(|line| clip::clip_line(&significant(line, sq_tolerance), bounds))
                .map(|part| transform.apply_run(&part))
                .filter(|part| part.len() >= 2)
                .collect();
            (!parts.is_empty()).then_some(TileGeometry::Lines(parts))
        }
        ProjectedGeometry::Polygons(polygons) => {
            let polygons: Vec<GeometryCollection> = polygons
                .iter()
                .filter_map(|rings| slice_polygon(rings, bounds, sq_tolerance, transform))
                .collect();
            (!polygons.is_empty()).then_some(TileGeometry::Polygons(polygons))
        }
    }
}

fn slice_polygon(
    rings: &[Vec<ProjectedPoint>],
    bounds: &TileBounds,
    sq_tolerance: f64,
    transform: &LocalTransform,
) -> Option<GeometryCollection> {
    let mut out = GeometryCollection::with_capacity(rings.len());
    for (i, ring) in rings.iter().enumerate() {
        let mut open = significant(ring, sq_tolerance);
        if open.len() > 1 && open.first() == open.last() {
            open.pop();
        }

        let clipped = clip::clip_ring(&open, bounds);
        let mut local = transform.apply_run(&clipped);
        if local.len() > 1 && local.first() == local.last() {
            local.pop();
        }
        if let Some(&first) = local.first() {
            local.push(first);
        }

        if local.len() < 4 {
            if i == 0 {
                return None;
            }
            continue;
        }
        out.push(local);
    }
    Some(out)
}

//! Shape annotations: shapes tiled on demand into a dedicated layer.

use tracing::trace;

use super::{TileData, TileFeature, TileLayer};
use crate::coord::CanonicalTileId;
use crate::geometry::{fixup_polygons, FeatureType, Shape};
use crate::tiler::{GeometryTiler, TileGeometry, TilerError, TilerOptions};

/// Identifier of a shape annotation.
pub type AnnotationId = u64;

/// Prefix of every shape annotation layer name.
pub const SHAPE_LAYER_PREFIX: &str = "annotations.shape.";

/// One annotation backed by its own tiler.
///
/// Every annotation writes into a layer named
/// `annotations.shape.<id>`, so annotations never share layers.
#[derive(Debug)]
pub struct ShapeAnnotation {
    id: AnnotationId,
    layer_id: String,
    tiler: GeometryTiler,
}

impl ShapeAnnotation {
    /// Creates an annotation for a single shape.
    ///
    /// # Arguments
    ///
    /// * `id` - Annotation identifier, unique within a store
    /// * `shape` - Geometry in lon/lat degrees
    /// * `max_zoom` - Deepest zoom at which the shape is tiled
    pub fn new(id: AnnotationId, shape: Shape, max_zoom: u8) -> Result<Self, TilerError> {
        Self::with_options(
            id,
            vec![shape],
            TilerOptions::default().with_max_zoom(max_zoom),
        )
    }

    /// Creates an annotation over several shapes with explicit options.
    pub fn with_options(
        id: AnnotationId,
        shapes: Vec<Shape>,
        options: TilerOptions,
    ) -> Result<Self, TilerError> {
        Ok(Self {
            id,
            layer_id: format!("{}{}", SHAPE_LAYER_PREFIX, id),
            tiler: GeometryTiler::new(shapes, options)?,
        })
    }

    pub fn id(&self) -> AnnotationId {
        self.id
    }

    pub fn max_zoom(&self) -> u8 {
        self.tiler.options().max_zoom
    }

    pub fn layer_id(&self) -> &str {
        &self.layer_id
    }

    pub fn tiler(&self) -> &GeometryTiler {
        &self.tiler
    }

    /// Adds this annotation's features for `tile` to `data`.
    ///
    /// Nothing is added when the tile holds none of the shapes. Polygon
    /// rings pass through [`fixup_polygons`] and each polygon becomes its
    /// own feature. Lines and points are stored as sliced.
    pub fn update_tile_data(
        &self,
        tile: CanonicalTileId,
        data: &mut TileData,
    ) -> Result<(), TilerError> {
        let sliced = self.tiler.get_tile(tile)?;

        let mut features = Vec::new();
        for feature in sliced {
            match feature.geometry {
                TileGeometry::Points(points) => features.push(
                    TileFeature::new(FeatureType::Point, vec![points])
                        .with_properties(feature.properties),
                ),
                TileGeometry::Lines(parts) => features.push(
                    TileFeature::new(FeatureType::LineString, parts)
                        .with_properties(feature.properties),
                ),
                TileGeometry::Polygons(polygons) => {
                    for rings in polygons {
                        let rings = fixup_polygons(rings);
                        if rings.is_empty() {
                            continue;
                        }
                        features.push(
                            TileFeature::new(FeatureType::Polygon, rings)
                                .with_properties(feature.properties.clone()),
                        );
                    }
                }
            }
        }

        if features.is_empty() {
            trace!(annotation = self.id, tile = %tile, "No features in tile");
            return Ok(());
        }

        let layer = data
            .layers
            .entry(self.layer_id.clone())
            .or_insert_with(|| TileLayer::new(self.layer_id.clone()));
        for feature in features {
            layer.push(feature);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{is_simple, signed_area};

    fn tile(z: u8, x: u32, y: u32) -> CanonicalTileId {
        CanonicalTileId::new(z, x, y).unwrap()
    }

    #[test]
    fn test_layer_id_format() {
        let annotation = ShapeAnnotation::new(7, Shape::line(&[(0.0, 0.0), (1.0, 1.0)]), 10).unwrap();
        assert_eq!(annotation.layer_id(), "annotations.shape.7");
        assert_eq!(annotation.max_zoom(), 10);
    }

    #[test]
    fn test_empty_tile_creates_no_layer() {
        let annotation =
            ShapeAnnotation::new(1, Shape::line(&[(-170.0, 10.0), (-160.0, 20.0)]), 4).unwrap();
        let mut data = TileData::new();
        annotation.update_tile_data(tile(1, 1, 1), &mut data).unwrap();
        assert_eq!(data.layer_count(), 0);
    }

    #[test]
    fn test_line_becomes_line_feature() {
        let annotation =
            ShapeAnnotation::new(2, Shape::line(&[(-10.0, 0.0), (10.0, 5.0)]), 4).unwrap();
        let mut data = TileData::new();
        annotation.update_tile_data(tile(0, 0, 0), &mut data).unwrap();

        let layer = data.layer("annotations.shape.2").unwrap();
        assert_eq!(layer.len(), 1);
        assert_eq!(layer.features[0].feature_type, FeatureType::LineString);
        assert_eq!(layer.features[0].geometry.len(), 1);
    }

    #[test]
    fn test_polygon_rings_are_fixed_up() {
        // Both rings wound the wrong way round for y-down tile space.
        let shape = Shape::polygon(&[
            &[(-40.0, -40.0), (40.0, -40.0), (40.0, 40.0), (-40.0, 40.0)],
            &[(-10.0, -10.0), (-10.0, 10.0), (10.0, 10.0), (10.0, -10.0)],
        ]);
        let annotation = ShapeAnnotation::new(3, shape, 4).unwrap();
        let mut data = TileData::new();
        annotation.update_tile_data(tile(0, 0, 0), &mut data).unwrap();

        let feature = &data.layer("annotations.shape.3").unwrap().features[0];
        assert_eq!(feature.feature_type, FeatureType::Polygon);
        assert_eq!(feature.geometry.len(), 2);
        assert!(signed_area(&feature.geometry[0]) > 0.0);
        assert!(signed_area(&feature.geometry[1]) < 0.0);
        assert!(feature.geometry.iter().all(|ring| is_simple(ring)));
    }

    #[test]
    fn test_multipolygon_yields_one_feature_per_polygon() {
        use crate::geometry::{Geometry, LineString, MultiPolygon, Polygon};
        let square = |x0: f64, y0: f64| {
            let ring = vec![(x0, y0), (x0 + 10.0, y0), (x0 + 10.0, y0 + 10.0), (x0, y0 + 10.0)];
            Polygon::new(LineString::from(ring), vec![])
        };
        let shape = Shape::new(Geometry::MultiPolygon(MultiPolygon::new(vec![
            square(0.0, 0.0),
            square(50.0, 0.0),
        ])));
        let annotation = ShapeAnnotation::new(4, shape, 2).unwrap();
        let mut data = TileData::new();
        annotation.update_tile_data(tile(0, 0, 0), &mut data).unwrap();
        assert_eq!(data.layer("annotations.shape.4").unwrap().len(), 2);
    }

    #[test]
    fn test_zoom_beyond_max_is_error() {
        let annotation = ShapeAnnotation::new(5, Shape::line(&[(0.0, 0.0), (1.0, 1.0)]), 2).unwrap();
        let mut data = TileData::new();
        assert!(annotation.update_tile_data(tile(3, 0, 0), &mut data).is_err());
    }
}

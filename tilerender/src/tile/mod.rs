//! Per-tile feature data
//!
//! [`TileData`] maps layer names to [`TileLayer`]s for one
//! [`CanonicalTileId`](crate::coord::CanonicalTileId). Layers hold typed
//! features in the integer [`EXTENT`](crate::coord::EXTENT) space.
//!
//! Shape annotations fill tile data on demand through
//! [`ShapeAnnotation::update_tile_data`], and [`TileFeatureStore`] caches
//! the result per tile until the shape set changes.
//!
//! A tile with nothing to draw has **no** layers. A layer is never created
//! empty.

mod annotation;
mod store;

pub use annotation::{AnnotationId, ShapeAnnotation, SHAPE_LAYER_PREFIX};
pub use store::{StoreConfig, StoreError, StoreStats, TileFeatureStore, DEFAULT_TILE_CACHE_CAPACITY};

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::geometry::{FeatureType, GeometryCollection, PropertyMap};

/// A classified geometry in tile-local coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct TileFeature {
    pub feature_type: FeatureType,
    pub geometry: GeometryCollection,
    pub properties: PropertyMap,
}

impl TileFeature {
    pub fn new(feature_type: FeatureType, geometry: GeometryCollection) -> Self {
        Self {
            feature_type,
            geometry,
            properties: PropertyMap::new(),
        }
    }

    pub fn with_properties(mut self, properties: PropertyMap) -> Self {
        self.properties = properties;
        self
    }
}

/// Named, ordered sequence of features for one tile.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TileLayer {
    pub name: String,
    pub features: Vec<Arc<TileFeature>>,
}

impl TileLayer {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            features: Vec::new(),
        }
    }

    /// Appends a feature.
    ///
    /// # Panics
    ///
    /// Panics on an [`FeatureType::Unknown`] feature. Only classified
    /// geometry may reach a tile.
    pub fn push(&mut self, feature: TileFeature) {
        assert!(
            feature.feature_type != FeatureType::Unknown,
            "unclassified feature in layer {}",
            self.name
        );
        self.features.push(Arc::new(feature));
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

/// All layers of one tile, ordered by name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TileData {
    pub layers: BTreeMap<String, TileLayer>,
}

impl TileData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn layer(&self, name: &str) -> Option<&TileLayer> {
        self.layers.get(name)
    }

    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Total features across layers.
    pub fn feature_count(&self) -> usize {
        self.layers.values().map(TileLayer::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::TilePoint;

    #[test]
    fn test_layer_push() {
        let mut layer = TileLayer::new("roads");
        layer.push(TileFeature::new(
            FeatureType::LineString,
            vec![vec![TilePoint::new(0, 0), TilePoint::new(10, 10)]],
        ));
        assert_eq!(layer.len(), 1);
    }

    #[test]
    #[should_panic(expected = "unclassified feature")]
    fn test_unknown_feature_panics() {
        let mut layer = TileLayer::new("broken");
        layer.push(TileFeature::new(FeatureType::Unknown, vec![]));
    }

    #[test]
    fn test_feature_count_across_layers() {
        let mut data = TileData::new();
        for name in ["a", "b"] {
            let mut layer = TileLayer::new(name);
            layer.push(TileFeature::new(FeatureType::Point, vec![vec![TilePoint::new(1, 1)]]));
            data.layers.insert(name.to_string(), layer);
        }
        assert_eq!(data.layer_count(), 2);
        assert_eq!(data.feature_count(), 2);
        assert!(data.layer("a").is_some());
        assert!(data.layer("c").is_none());
    }
}

//! Geometry primitives shared by the tiler, the feature store and buckets.
//!
//! Input shapes are [`geo_types`] geometries in longitude/latitude
//! degrees. Tile-local geometry uses `i16` coordinates in the fixed
//! [`EXTENT`](crate::coord::EXTENT) space and is stored as a
//! [`GeometryCollection`]: a list of rings (or line parts).

mod fixup;

pub use fixup::{fixup_polygons, is_simple, signed_area};

use std::collections::BTreeMap;

pub use geo_types::{
    Coord, Geometry, LineString, MultiLineString, MultiPoint, MultiPolygon, Point, Polygon,
};

/// Tile-local point in the integer extent space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TilePoint {
    pub x: i16,
    pub y: i16,
}

impl TilePoint {
    #[inline]
    pub const fn new(x: i16, y: i16) -> Self {
        Self { x, y }
    }
}

/// One ring or line part in tile-local coordinates.
pub type GeometryCoordinates = Vec<TilePoint>;

/// All rings or parts of one tile feature.
pub type GeometryCollection = Vec<GeometryCoordinates>;

/// Render classification of a feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum FeatureType {
    Unknown = 0,
    Point = 1,
    LineString = 2,
    Polygon = 3,
}

impl FeatureType {
    /// Classifies a geometry. Collections have no single render type.
    pub fn of<T: geo_types::CoordNum>(geometry: &Geometry<T>) -> Self {
        match geometry {
            Geometry::Point(_) | Geometry::MultiPoint(_) => FeatureType::Point,
            Geometry::Line(_) | Geometry::LineString(_) | Geometry::MultiLineString(_) => {
                FeatureType::LineString
            }
            Geometry::Polygon(_)
            | Geometry::MultiPolygon(_)
            | Geometry::Rect(_)
            | Geometry::Triangle(_) => FeatureType::Polygon,
            Geometry::GeometryCollection(_) => FeatureType::Unknown,
        }
    }
}

/// Value stored in a feature's property bag.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Double(f64),
    String(String),
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        PropertyValue::String(value.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        PropertyValue::String(value)
    }
}

impl From<f64> for PropertyValue {
    fn from(value: f64) -> Self {
        PropertyValue::Double(value)
    }
}

impl From<i64> for PropertyValue {
    fn from(value: i64) -> Self {
        PropertyValue::Int(value)
    }
}

impl From<bool> for PropertyValue {
    fn from(value: bool) -> Self {
        PropertyValue::Bool(value)
    }
}

/// Property bag of a feature, ordered by key.
pub type PropertyMap = BTreeMap<String, PropertyValue>;

/// An input shape: geometry in lon/lat degrees plus properties.
#[derive(Debug, Clone, PartialEq)]
pub struct Shape {
    pub geometry: Geometry<f64>,
    pub properties: PropertyMap,
}

impl Shape {
    /// Creates a shape without properties.
    pub fn new(geometry: Geometry<f64>) -> Self {
        Self {
            geometry,
            properties: PropertyMap::new(),
        }
    }

    /// Adds a property, replacing any previous value for `key`.
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Convenience constructor for a line through `(lon, lat)` pairs.
    pub fn line(coords: &[(f64, f64)]) -> Self {
        Self::new(Geometry::LineString(LineString::from(coords.to_vec())))
    }

    /// Convenience constructor for a polygon from `(lon, lat)` rings,
    /// outer ring first.
    ///
    /// Rings are closed if the caller left them open.
    pub fn polygon(rings: &[&[(f64, f64)]]) -> Self {
        let mut rings = rings.iter().map(|ring| LineString::from(ring.to_vec()));
        let exterior = rings.next().unwrap_or_else(|| LineString::new(Vec::new()));
        Self::new(Geometry::Polygon(Polygon::new(exterior, rings.collect())))
    }
}

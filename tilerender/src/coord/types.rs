//! Tile identifier types and coordinate constants.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Maximum latitude representable in Web Mercator.
pub const MAX_LAT: f64 = 85.051_128_779_806_6;

/// Minimum latitude representable in Web Mercator.
pub const MIN_LAT: f64 = -MAX_LAT;

/// Minimum longitude.
pub const MIN_LON: f64 = -180.0;

/// Maximum longitude.
pub const MAX_LON: f64 = 180.0;

/// Minimum zoom level.
pub const MIN_ZOOM: u8 = 0;

/// Maximum zoom level addressable by a [`CanonicalTileId`].
///
/// At zoom 25 a tile edge of [`EXTENT`] units still fits in the `u64`
/// world resolution used by the tiler.
pub const MAX_ZOOM: u8 = 25;

/// Local integer resolution along one tile edge.
pub const EXTENT: u32 = 4096;

/// Errors produced when building or parsing tile coordinates.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoordError {
    /// Latitude outside the Web Mercator range.
    #[error("Invalid latitude: {0} (must be between {MIN_LAT} and {MAX_LAT})")]
    InvalidLatitude(f64),

    /// Longitude outside -180..=180.
    #[error("Invalid longitude: {0} (must be between -180 and 180)")]
    InvalidLongitude(f64),

    /// Zoom above [`MAX_ZOOM`].
    #[error("Invalid zoom level: {0} (must be between {MIN_ZOOM} and {MAX_ZOOM})")]
    InvalidZoom(u8),

    /// Column or row outside the grid for the zoom level.
    #[error("Tile {x}/{y} is outside the {dim}x{dim} grid at zoom {z}")]
    OutOfRange { z: u8, x: u32, y: u32, dim: u64 },

    /// Text could not be parsed as `z/x/y`.
    #[error("Cannot parse tile id from '{0}' (expected z/x/y)")]
    Parse(String),
}

/// Address of one tile in the quad-tree tiling scheme.
///
/// Both `x` (column, increasing eastward) and `y` (row, increasing
/// southward) lie in `0..2^z`.
///
/// # Example
///
/// ```
/// use tilerender::coord::CanonicalTileId;
///
/// let id = CanonicalTileId::new(2, 1, 3).unwrap();
/// assert_eq!(id.to_string(), "2/1/3");
/// assert_eq!(id.parent(), Some(CanonicalTileId::new(1, 0, 1).unwrap()));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CanonicalTileId {
    /// Zoom level.
    pub z: u8,
    /// Column.
    pub x: u32,
    /// Row.
    pub y: u32,
}

impl CanonicalTileId {
    /// Creates a tile id, validating zoom and grid bounds.
    pub fn new(z: u8, x: u32, y: u32) -> Result<Self, CoordError> {
        if z > MAX_ZOOM {
            return Err(CoordError::InvalidZoom(z));
        }
        let dim = 1u64 << z;
        if u64::from(x) >= dim || u64::from(y) >= dim {
            return Err(CoordError::OutOfRange { z, x, y, dim });
        }
        Ok(Self { z, x, y })
    }

    /// Number of tiles along one edge of the grid at this zoom.
    #[inline]
    pub fn dim(&self) -> u64 {
        1u64 << self.z
    }

    /// Returns the tile one zoom level up, or `None` at zoom 0.
    pub fn parent(&self) -> Option<Self> {
        if self.z == 0 {
            return None;
        }
        Some(Self {
            z: self.z - 1,
            x: self.x >> 1,
            y: self.y >> 1,
        })
    }

    /// Returns the four tiles one zoom level down, or `None` at [`MAX_ZOOM`].
    ///
    /// Order is north-west, north-east, south-west, south-east.
    pub fn children(&self) -> Option<[Self; 4]> {
        if self.z >= MAX_ZOOM {
            return None;
        }
        let (z, x, y) = (self.z + 1, self.x * 2, self.y * 2);
        Some([
            Self { z, x, y },
            Self { z, x: x + 1, y },
            Self { z, x, y: y + 1 },
            Self { z, x: x + 1, y: y + 1 },
        ])
    }

    /// Bounds of this tile in the unit Web Mercator square.
    pub fn bounds(&self) -> TileBounds {
        let n = self.dim() as f64;
        TileBounds {
            min_x: self.x as f64 / n,
            min_y: self.y as f64 / n,
            max_x: (self.x as f64 + 1.0) / n,
            max_y: (self.y as f64 + 1.0) / n,
        }
    }
}

impl fmt::Display for CanonicalTileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.z, self.x, self.y)
    }
}

impl FromStr for CanonicalTileId {
    type Err = CoordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parse_err = || CoordError::Parse(s.to_string());
        let mut parts = s.trim().split('/');
        let z = parts
            .next()
            .and_then(|p| p.parse::<u8>().ok())
            .ok_or_else(parse_err)?;
        let x = parts
            .next()
            .and_then(|p| p.parse::<u32>().ok())
            .ok_or_else(parse_err)?;
        let y = parts
            .next()
            .and_then(|p| p.parse::<u32>().ok())
            .ok_or_else(parse_err)?;
        if parts.next().is_some() {
            return Err(parse_err());
        }
        Self::new(z, x, y)
    }
}

/// Axis-aligned bounds in the unit Web Mercator square (`0.0..=1.0`, y down).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TileBounds {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl TileBounds {
    /// Grows the bounds by `amount` on every side.
    pub fn expand(&self, amount: f64) -> Self {
        Self {
            min_x: self.min_x - amount,
            min_y: self.min_y - amount,
            max_x: self.max_x + amount,
            max_y: self.max_y + amount,
        }
    }

    /// Whether two bounds overlap (touching edges count).
    pub fn intersects(&self, other: &TileBounds) -> bool {
        self.min_x <= other.max_x
            && other.min_x <= self.max_x
            && self.min_y <= other.max_y
            && other.min_y <= self.max_y
    }

    /// Whether the point lies inside or on the edge of the bounds.
    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.min_x && x <= self.max_x && y >= self.min_y && y <= self.max_y
    }

    /// Edge length along x.
    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_rejects_out_of_grid() {
        assert!(CanonicalTileId::new(0, 0, 0).is_ok());
        assert!(matches!(
            CanonicalTileId::new(0, 1, 0),
            Err(CoordError::OutOfRange { .. })
        ));
        assert!(matches!(
            CanonicalTileId::new(3, 2, 8),
            Err(CoordError::OutOfRange { .. })
        ));
        assert!(matches!(
            CanonicalTileId::new(MAX_ZOOM + 1, 0, 0),
            Err(CoordError::InvalidZoom(_))
        ));
    }

    #[test]
    fn test_parent_and_children() {
        let tile = CanonicalTileId::new(3, 5, 2).unwrap();
        let children = tile.children().unwrap();
        for child in children {
            assert_eq!(child.parent(), Some(tile));
        }
        assert_eq!(CanonicalTileId::new(0, 0, 0).unwrap().parent(), None);
    }

    #[test]
    fn test_bounds_cover_unit_square_at_zoom_zero() {
        let b = CanonicalTileId::new(0, 0, 0).unwrap().bounds();
        assert_eq!((b.min_x, b.min_y, b.max_x, b.max_y), (0.0, 0.0, 1.0, 1.0));
    }

    #[test]
    fn test_parse_roundtrip() {
        let id: CanonicalTileId = "12/654/1583".parse().unwrap();
        assert_eq!(id, CanonicalTileId::new(12, 654, 1583).unwrap());
        assert_eq!(id.to_string(), "12/654/1583");
        assert!("1/2".parse::<CanonicalTileId>().is_err());
        assert!("1/0/0/4".parse::<CanonicalTileId>().is_err());
        assert!("a/b/c".parse::<CanonicalTileId>().is_err());
    }

    #[test]
    fn test_bounds_intersection() {
        let a = TileBounds { min_x: 0.0, min_y: 0.0, max_x: 0.5, max_y: 0.5 };
        let b = TileBounds { min_x: 0.5, min_y: 0.5, max_x: 1.0, max_y: 1.0 };
        let c = TileBounds { min_x: 0.6, min_y: 0.0, max_x: 1.0, max_y: 0.4 };
        assert!(a.intersects(&b));
        assert!(!a.intersects(&c));
        assert!(a.expand(0.2).intersects(&c));
    }
}

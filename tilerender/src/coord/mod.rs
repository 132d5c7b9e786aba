//! Coordinate conversion module
//!
//! Provides conversions between geographic coordinates (longitude/latitude),
//! the unit Web Mercator square used by the tiler, and canonical tile ids.

mod types;

pub use types::{
    CanonicalTileId, CoordError, TileBounds, EXTENT, MAX_LAT, MAX_LON, MAX_ZOOM, MIN_LAT,
    MIN_LON, MIN_ZOOM,
};

use std::f64::consts::PI;

/// Projects longitude/latitude (degrees) into the unit Web Mercator square.
///
/// `x` grows eastward from 0 at -180°, `y` grows southward from 0 at the
/// northern limit. Latitudes beyond the Mercator limit are clamped.
#[inline]
pub fn project(lon: f64, lat: f64) -> (f64, f64) {
    let lat = lat.clamp(MIN_LAT, MAX_LAT);
    let x = lon / 360.0 + 0.5;
    let sin = (lat * PI / 180.0).sin();
    let y = 0.5 - 0.25 * ((1.0 + sin) / (1.0 - sin)).ln() / PI;
    (x, y.clamp(0.0, 1.0))
}

/// Inverse of [`project`]: unit Web Mercator to longitude/latitude degrees.
#[inline]
pub fn unproject(x: f64, y: f64) -> (f64, f64) {
    let lon = (x - 0.5) * 360.0;
    let lat = (PI * (1.0 - 2.0 * y)).sinh().atan() * 180.0 / PI;
    (lon, lat)
}

/// Converts geographic coordinates to the tile containing them.
///
/// # Arguments
///
/// * `lat` - Latitude in degrees (-85.05112878 to 85.05112878)
/// * `lon` - Longitude in degrees (-180.0 to 180.0)
/// * `zoom` - Zoom level (0 to 25)
#[inline]
pub fn to_tile_id(lat: f64, lon: f64, zoom: u8) -> Result<CanonicalTileId, CoordError> {
    if !(MIN_LAT..=MAX_LAT).contains(&lat) {
        return Err(CoordError::InvalidLatitude(lat));
    }
    if !(MIN_LON..=MAX_LON).contains(&lon) {
        return Err(CoordError::InvalidLongitude(lon));
    }
    if zoom > MAX_ZOOM {
        return Err(CoordError::InvalidZoom(zoom));
    }

    let n = (1u64 << zoom) as f64;
    let (x, y) = project(lon, lat);
    let max = (1u64 << zoom) - 1;
    let col = ((x * n) as u64).min(max) as u32;
    let row = ((y * n) as u64).min(max) as u32;

    CanonicalTileId::new(zoom, col, row)
}

/// Returns the longitude/latitude of a tile's north-west corner.
#[inline]
pub fn tile_to_lon_lat(tile: &CanonicalTileId) -> (f64, f64) {
    let bounds = tile.bounds();
    unproject(bounds.min_x, bounds.min_y)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_project_origin_is_center() {
        let (x, y) = project(0.0, 0.0);
        assert!((x - 0.5).abs() < 1e-12);
        assert!((y - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_project_clamps_poles() {
        let (_, north) = project(0.0, 90.0);
        let (_, south) = project(0.0, -90.0);
        assert!(north.abs() < 1e-9);
        assert!((south - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_new_york_city_at_zoom_16() {
        // New York City: 40.7128°N, 74.0060°W
        let tile = to_tile_id(40.7128, -74.0060, 16).unwrap();
        assert_eq!(tile.y, 24640);
        assert_eq!(tile.x, 19295);
        assert_eq!(tile.z, 16);
    }

    #[test]
    fn test_invalid_latitude() {
        let result = to_tile_id(90.0, 0.0, 10);
        assert!(matches!(result, Err(CoordError::InvalidLatitude(_))));
    }

    #[test]
    fn test_east_edge_stays_in_grid() {
        let tile = to_tile_id(0.0, 180.0, 3).unwrap();
        assert_eq!(tile.x, 7);
    }

    #[test]
    fn test_tile_to_lon_lat_northwest_corner() {
        let tile = CanonicalTileId::new(16, 19295, 24640).unwrap();
        let (lon, lat) = tile_to_lon_lat(&tile);
        assert!((lat - 40.713).abs() < 0.01, "Latitude should be close to 40.713");
        assert!((lon - (-74.007)).abs() < 0.01, "Longitude should be close to -74.007");
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn test_project_unproject_roundtrip(
                lon in -180.0..180.0_f64,
                lat in -85.0..85.0_f64
            ) {
                let (x, y) = project(lon, lat);
                let (lon2, lat2) = unproject(x, y);
                prop_assert!((lon - lon2).abs() < 1e-9, "lon {} -> {}", lon, lon2);
                prop_assert!((lat - lat2).abs() < 1e-9, "lat {} -> {}", lat, lat2);
            }

            #[test]
            fn test_tile_contains_projected_point(
                lon in -179.9..179.9_f64,
                lat in -85.0..85.0_f64,
                zoom in 0u8..=18
            ) {
                let tile = to_tile_id(lat, lon, zoom)?;
                let (x, y) = project(lon, lat);
                prop_assert!(tile.bounds().contains(x, y));
            }
        }
    }
}

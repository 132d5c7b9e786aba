//! Integration tests for the tile-to-frame flow.
//!
//! These tests verify the complete path from input shapes to GPU commands:
//! - Shapes → feature store → tile layers
//! - Tile layers → buckets → painter passes
//! - Encoded imagery → raster bucket → translucent pass
//!
//! Run with: `cargo test --test render_integration`

use std::io::Cursor;

use image::{ImageFormat, Rgba, RgbaImage};

use tilerender::coord::CanonicalTileId;
use tilerender::geometry::{FeatureType, Shape};
use tilerender::renderer::{
    build_bucket, Color, FillPaintProperties, FrameParams, GlCommand, LinePaintProperties,
    Painter, Primitive, RasterBucket, RasterPaintProperties, RecordingContext, RenderTile,
    StateChange, StyleLayer, Uniform,
};
use tilerender::tile::{StoreConfig, TileData, TileFeatureStore};

// ============================================================================
// Helpers
// ============================================================================

fn tile(z: u8, x: u32, y: u32) -> CanonicalTileId {
    CanonicalTileId::new(z, x, y).unwrap()
}

/// A lake and a road crossing it near null island.
fn populated_store() -> TileFeatureStore {
    let store = TileFeatureStore::new(StoreConfig::default());
    store
        .add_shape(
            1,
            Shape::polygon(&[&[(-20.0, -20.0), (20.0, -20.0), (20.0, 20.0), (-20.0, 20.0)]]),
            10,
        )
        .unwrap();
    store
        .add_shape(2, Shape::line(&[(-30.0, 0.0), (30.0, 5.0)]), 10)
        .unwrap();
    store
}

/// Builds a render tile with one bucket per style layer that has data.
fn render_tile(id: CanonicalTileId, data: &TileData, layers: &[StyleLayer]) -> RenderTile {
    let mut render = RenderTile::fullscreen(id);
    for layer in layers {
        let Some(source) = layer.source_layer.as_deref().and_then(|s| data.layer(s)) else {
            continue;
        };
        if let Some(bucket) = build_bucket(layer, source) {
            render.buckets.insert(layer.id.clone(), bucket);
        }
    }
    render
}

fn style_layers() -> Vec<StyleLayer> {
    vec![
        StyleLayer::fill(
            "lake",
            "annotations.shape.1",
            FillPaintProperties {
                color: Color::new(0.2, 0.4, 0.8, 1.0),
                opacity: 1.0,
                outline_color: Some(Color::new(0.0, 0.0, 0.5, 1.0)),
            },
        ),
        StyleLayer::line(
            "road",
            "annotations.shape.2",
            LinePaintProperties {
                width: 2.0,
                ..Default::default()
            },
        ),
    ]
}

fn encoded_png(width: u32, height: u32) -> Vec<u8> {
    let mut png = Vec::new();
    RgbaImage::from_pixel(width, height, Rgba([200, 100, 50, 255]))
        .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
        .unwrap();
    png
}

// ============================================================================
// Integration Tests
// ============================================================================

#[test]
fn test_store_produces_typed_layers() {
    let store = populated_store();
    let data = store.get_tile(tile(0, 0, 0)).unwrap();

    assert_eq!(data.layer_count(), 2);
    let lake = data.layer("annotations.shape.1").unwrap();
    assert!(lake
        .features
        .iter()
        .all(|f| f.feature_type == FeatureType::Polygon));
    let road = data.layer("annotations.shape.2").unwrap();
    assert_eq!(road.features[0].feature_type, FeatureType::LineString);

    // Far corner of the world: no layers at all.
    let empty = store.get_tile(tile(4, 0, 0)).unwrap();
    assert!(empty.is_empty());
}

#[test]
fn test_store_tiles_are_stable_across_queries() {
    let store = populated_store();
    let first = store.get_tile(tile(3, 4, 3)).unwrap();
    let second = store.get_tile(tile(3, 4, 3)).unwrap();
    assert_eq!(*first, *second);
    assert_eq!(store.stats().hits, 1);
}

#[test]
fn test_vector_frame() {
    let store = populated_store();
    let layers = style_layers();
    let data = store.get_tile(tile(0, 0, 0)).unwrap();

    let mut ctx = RecordingContext::new();
    let mut painter = Painter::new(&mut ctx).unwrap();
    let mut tiles = vec![render_tile(tile(0, 0, 0), &data, &layers)];
    assert_eq!(tiles[0].buckets.len(), 2);

    ctx.take_commands();
    let stats = painter
        .render_frame(&mut ctx, &FrameParams::default(), &mut tiles, &layers)
        .unwrap();

    assert_eq!(stats.uploads, 2);
    assert_eq!(stats.clip_masks, 1);
    assert_eq!(stats.draw_calls as usize, ctx.draw_calls());

    let commands = ctx.commands();
    let fans = commands
        .iter()
        .filter(|c| matches!(c, GlCommand::DrawArrays { primitive: Primitive::TriangleFan, .. }))
        .count();
    assert!(fans >= 1);

    let line_width = commands
        .iter()
        .position(|c| *c == GlCommand::State(StateChange::LineWidth(2.0)))
        .unwrap();
    let last_draw = commands.iter().rposition(GlCommand::is_draw).unwrap();
    assert!(line_width < last_draw);
    assert!(matches!(
        commands[last_draw],
        GlCommand::DrawElements { primitive: Primitive::Lines, .. }
    ));
}

#[test]
fn test_store_update_rebuilds_buckets() {
    let store = populated_store();
    let layers = style_layers();
    let before = store.get_tile(tile(0, 0, 0)).unwrap();

    assert!(store.remove(2));
    let after = store.get_tile(tile(0, 0, 0)).unwrap();
    assert_eq!(before.layer_count(), 2);
    assert_eq!(after.layer_count(), 1);

    let render = render_tile(tile(0, 0, 0), &after, &layers);
    assert!(render.buckets.contains_key("lake"));
    assert!(!render.buckets.contains_key("road"));
}

#[test]
fn test_raster_frame_from_encoded_image() {
    let mut ctx = RecordingContext::new();
    let mut painter = Painter::new(&mut ctx).unwrap();

    let bucket = RasterBucket::from_encoded(&encoded_png(16, 16)).unwrap();
    let mut tiles = vec![RenderTile::fullscreen(tile(0, 0, 0)).with_bucket("imagery", Box::new(bucket))];
    let layers = [StyleLayer::raster(
        "imagery",
        RasterPaintProperties {
            saturation: 0.0,
            contrast: 0.0,
            hue_rotate: 0.0,
            ..Default::default()
        },
    )];

    let stats = painter
        .render_frame(&mut ctx, &FrameParams::default(), &mut tiles, &layers)
        .unwrap();
    assert_eq!(stats.uploads, 1);
    assert_eq!(ctx.live_textures(), 1);

    let commands = ctx.commands();
    let find = |name: &str| {
        commands.iter().find_map(|c| match c {
            GlCommand::Uniform { name: n, value, .. } if *n == name => Some(*value),
            _ => None,
        })
    };
    assert_eq!(find("u_saturation_factor"), Some(Uniform::Float(0.0)));
    assert_eq!(find("u_contrast_factor"), Some(Uniform::Float(1.0)));
    assert_eq!(find("u_spin_weights"), Some(Uniform::Vec3([1.0, 0.0, 0.0])));

    // Second frame: nothing to upload, same draw.
    let again = painter
        .render_frame(&mut ctx, &FrameParams::default(), &mut tiles, &layers)
        .unwrap();
    assert_eq!(again.uploads, 0);
    assert_eq!(again.draw_calls, stats.draw_calls);

    for tile in &mut tiles {
        tile.release(&mut ctx);
    }
    painter.release(&mut ctx);
    assert_eq!(ctx.live_textures(), 0);
    assert_eq!(ctx.live_buffers(), 0);
    assert_eq!(ctx.live_programs(), 0);
}

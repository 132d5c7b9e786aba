//! Buckets and the frame painter
//!
//! Turns tile data into GPU buffers ([`bucket`]) and draws them pass by
//! pass ([`Painter`]). The graphics API itself sits behind
//! [`GraphicsContext`]; [`RecordingContext`] implements it without a GPU.
//!
//! # Example
//!
//! ```
//! use tilerender::coord::CanonicalTileId;
//! use tilerender::renderer::{
//!     FrameParams, Painter, RasterBucket, RasterPaintProperties, RecordingContext, RenderTile,
//!     StyleLayer,
//! };
//!
//! let mut ctx = RecordingContext::new();
//! let mut painter = Painter::new(&mut ctx).unwrap();
//!
//! let image = image::RgbaImage::new(256, 256);
//! let mut tiles = vec![RenderTile::fullscreen(CanonicalTileId::new(0, 0, 0).unwrap())
//!     .with_bucket("imagery", Box::new(RasterBucket::from_rgba(image)))];
//! let layers = [StyleLayer::raster("imagery", RasterPaintProperties::default())];
//!
//! let stats = painter
//!     .render_frame(&mut ctx, &FrameParams::default(), &mut tiles, &layers)
//!     .unwrap();
//! assert_eq!(stats.uploads, 1);
//! ```

pub mod bucket;
mod gl;
mod paint;
mod painter;
mod recording;
mod shaders;
mod state;

pub use bucket::{build_bucket, Bucket, DrawOutcome, FanGroup, FillBucket, LineBucket, RasterBucket};
pub use gl::{
    AttributeType, BufferId, BufferTarget, Clear, ColorMask, CompareFunc, GraphicsContext,
    Primitive, ProgramId, StateChange, StencilFunc, StencilOp, StencilOps, TextureId, Uniform,
    VertexAttribute, VertexLayout, POSITION_LAYOUT, RASTER_LAYOUT,
};
pub use paint::{
    contrast_factor, saturation_factor, spin_weights, Color, FillPaintProperties, LayerPaint,
    LinePaintProperties, RasterPaintProperties, StyleLayer,
};
pub use painter::{
    extent_matrix, FramePhase, FrameParams, FrameStats, Painter, RenderTile, DEPTH_EPSILON,
    MAX_CLIP_TILES, NUM_SUBLAYERS,
};
pub use recording::{GlCommand, RecordingContext};
pub use shaders::{Shader, ShaderKind, ShaderSet, OVERDRAW_DEFINE};
pub use state::{PipelineState, StateValue, DEFAULT_STENCIL_FUNC, DEFAULT_STENCIL_OPS};

use thiserror::Error;

/// Drawing stage a bucket participates in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RenderPass {
    Opaque,
    Translucent,
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum RenderError {
    #[error("Shader {name} failed to compile: {message}")]
    ShaderCompile { name: String, message: String },

    #[error("Invalid frame phase transition {from:?} -> {to:?}")]
    PassOrder { from: FramePhase, to: FramePhase },

    #[error("Layer {layer} cannot be drawn by a {bucket} bucket")]
    LayerMismatch { layer: String, bucket: &'static str },

    #[error("{0} tiles exceed the {max} stencil clip ids", max = MAX_CLIP_TILES)]
    TooManyTiles(usize),

    #[error("Invalid image data: {0}")]
    InvalidImage(String),
}

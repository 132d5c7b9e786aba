//! Frame painter
//!
//! Sequences GPU state, shader selection and draws for one frame:
//!
//! ```text
//! Idle ──► Opaque (layers top to bottom) ──► Translucent (bottom to top) ──► Idle
//! ```
//!
//! Before the passes each tile's clip id is written into the stencil
//! buffer. Clipped buckets only draw where the stencil holds their tile's
//! id. Each layer gets its own slice of the depth range, split into
//! [`NUM_SUBLAYERS`] sublayers, so co-planar tile layers never z-fight.

use std::collections::BTreeMap;
use std::fmt;

use tracing::{debug, trace};

use super::bucket::{Bucket, DrawOutcome, FillGeometry};
use super::gl::{
    short_bytes, BufferId, BufferTarget, Clear, ColorMask, CompareFunc, GraphicsContext,
    Primitive, StencilFunc, StencilOp, StencilOps, TextureId, Uniform, POSITION_LAYOUT,
    RASTER_LAYOUT,
};
use super::paint::{
    contrast_factor, saturation_factor, spin_weights, Color, FillPaintProperties,
    LinePaintProperties, RasterPaintProperties, StyleLayer,
};
use super::shaders::{ShaderKind, ShaderSet};
use super::state::{PipelineState, DEFAULT_STENCIL_OPS};
use super::{RenderError, RenderPass};
use crate::coord::{CanonicalTileId, EXTENT};

/// Depth sublayers per style layer.
pub const NUM_SUBLAYERS: usize = 3;

/// Smallest depth step, `1 / 2^16`.
pub const DEPTH_EPSILON: f32 = 1.0 / (1 << 16) as f32;

/// Tiles per frame. Clip ids use the low seven stencil bits.
pub const MAX_CLIP_TILES: usize = 127;

/// Stencil bit toggled by the even-odd fill technique.
const FILL_STENCIL_BIT: u8 = 0x80;
const CLIP_MASK: u8 = 0x7F;

/// Texture coordinate of the far raster quad edge.
const RASTER_TEXTURE_MAX: i16 = i16::MAX;

/// Where the painter is within a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FramePhase {
    Idle,
    Opaque,
    Translucent,
}

impl FramePhase {
    fn pass(&self) -> Option<RenderPass> {
        match self {
            FramePhase::Idle => None,
            FramePhase::Opaque => Some(RenderPass::Opaque),
            FramePhase::Translucent => Some(RenderPass::Translucent),
        }
    }
}

/// Per-frame switches, passed explicitly to every frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameParams {
    /// Bind the overdraw-inspector shader variants.
    pub overdraw: bool,
    /// Visualize tile clip regions after the passes.
    pub debug_clip: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub frame: u64,
    pub uploads: u32,
    pub draw_calls: u32,
    /// Buckets that had nothing to draw.
    pub skipped_empty: u32,
    /// Buckets that belong to the other pass.
    pub skipped: u32,
    pub clip_masks: u32,
    pub state_changes: u64,
}

/// One tile as drawn this frame: its transform and its buckets keyed by
/// style layer id.
pub struct RenderTile {
    pub id: CanonicalTileId,
    /// Column-major transform from tile extent to clip space.
    pub matrix: [f32; 16],
    pub buckets: BTreeMap<String, Box<dyn Bucket>>,
    clip_id: u8,
}

impl RenderTile {
    pub fn new(id: CanonicalTileId, matrix: [f32; 16]) -> Self {
        Self {
            id,
            matrix,
            buckets: BTreeMap::new(),
            clip_id: 0,
        }
    }

    /// Tile covering the whole viewport.
    pub fn fullscreen(id: CanonicalTileId) -> Self {
        Self::new(id, extent_matrix())
    }

    pub fn with_bucket(mut self, layer_id: impl Into<String>, bucket: Box<dyn Bucket>) -> Self {
        self.buckets.insert(layer_id.into(), bucket);
        self
    }

    /// Stencil id assigned by the last frame, 0 before the first.
    pub fn clip_id(&self) -> u8 {
        self.clip_id
    }

    /// Releases the GPU objects of every bucket.
    pub fn release(&mut self, ctx: &mut dyn GraphicsContext) {
        for bucket in self.buckets.values_mut() {
            bucket.release(ctx);
        }
    }
}

impl fmt::Debug for RenderTile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderTile")
            .field("id", &self.id)
            .field("clip_id", &self.clip_id)
            .field("buckets", &self.buckets.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Maps `[0, EXTENT]` with y down onto clip space.
pub fn extent_matrix() -> [f32; 16] {
    let scale = 2.0 / EXTENT as f32;
    [
        scale, 0.0, 0.0, 0.0, //
        0.0, -scale, 0.0, 0.0, //
        0.0, 0.0, 1.0, 0.0, //
        -1.0, 1.0, 0.0, 1.0,
    ]
}

#[derive(Debug)]
pub struct Painter {
    shaders: ShaderSet,
    state: PipelineState,
    tile_quad: BufferId,
    raster_quad: BufferId,
    phase: FramePhase,
    params: FrameParams,
    current_layer: usize,
    depth_range_size: f32,
    /// Whether the bucket being drawn is confined to its tile's clip id.
    clipping: bool,
    frame: u64,
}

impl Painter {
    /// Compiles shaders and creates the shared quad buffers.
    pub fn new(ctx: &mut dyn GraphicsContext) -> Result<Self, RenderError> {
        let shaders = ShaderSet::compile(ctx)?;
        let extent = EXTENT as i16;
        let tile_quad = ctx.create_buffer(
            BufferTarget::Vertex,
            &short_bytes(&[[0, 0], [extent, 0], [0, extent], [extent, extent]]),
        );
        let max = RASTER_TEXTURE_MAX;
        let raster_quad = ctx.create_buffer(
            BufferTarget::Vertex,
            &short_bytes(&[
                [0, 0, 0, 0],
                [extent, 0, max, 0],
                [0, extent, 0, max],
                [extent, extent, max, max],
            ]),
        );
        debug!(programs = shaders.len(), "Painter initialized");
        Ok(Self {
            shaders,
            state: PipelineState::new(),
            tile_quad,
            raster_quad,
            phase: FramePhase::Idle,
            params: FrameParams::default(),
            current_layer: 0,
            depth_range_size: 1.0,
            clipping: false,
            frame: 0,
        })
    }

    pub fn shaders(&self) -> &ShaderSet {
        &self.shaders
    }

    pub fn phase(&self) -> FramePhase {
        self.phase
    }

    /// Frames rendered so far.
    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Forgets tracked GPU state, e.g. after something else drew with the
    /// same context.
    pub fn invalidate_state(&mut self) {
        self.state.invalidate();
    }

    /// Deletes the painter's programs and buffers.
    pub fn release(self, ctx: &mut dyn GraphicsContext) {
        self.shaders.release(ctx);
        ctx.delete_buffer(self.tile_quad);
        ctx.delete_buffer(self.raster_quad);
    }

    /// Renders one frame of `layers` over `tiles`.
    ///
    /// `layers` is ordered bottom to top. Pending bucket uploads happen
    /// first. Buckets without data are skipped silently.
    ///
    /// # Errors
    ///
    /// - [`RenderError::TooManyTiles`] if the tiles do not fit the stencil
    ///   clip ids.
    /// - [`RenderError::LayerMismatch`] if a bucket is keyed under a layer
    ///   of another kind.
    /// - [`RenderError::PassOrder`] if a frame starts while another is
    ///   in progress.
    pub fn render_frame(
        &mut self,
        ctx: &mut dyn GraphicsContext,
        params: &FrameParams,
        tiles: &mut [RenderTile],
        layers: &[StyleLayer],
    ) -> Result<FrameStats, RenderError> {
        if tiles.len() > MAX_CLIP_TILES {
            return Err(RenderError::TooManyTiles(tiles.len()));
        }
        let applied_before = self.state.applied();
        self.frame += 1;
        self.params = *params;
        let mut stats = FrameStats {
            frame: self.frame,
            ..Default::default()
        };

        let result = self.paint(ctx, tiles, layers, &mut stats);
        if result.is_err() {
            self.phase = FramePhase::Idle;
        }
        result?;

        stats.state_changes = self.state.applied() - applied_before;
        debug!(
            frame = stats.frame,
            tiles = tiles.len(),
            layers = layers.len(),
            draw_calls = stats.draw_calls,
            uploads = stats.uploads,
            "Frame rendered"
        );
        Ok(stats)
    }

    fn paint(
        &mut self,
        ctx: &mut dyn GraphicsContext,
        tiles: &mut [RenderTile],
        layers: &[StyleLayer],
        stats: &mut FrameStats,
    ) -> Result<(), RenderError> {
        if self.phase != FramePhase::Idle {
            return Err(RenderError::PassOrder {
                from: self.phase,
                to: FramePhase::Opaque,
            });
        }

        for (i, tile) in tiles.iter_mut().enumerate() {
            tile.clip_id = (i + 1) as u8;
            for bucket in tile.buckets.values_mut() {
                if bucket.needs_upload() {
                    bucket.upload(ctx)?;
                    stats.uploads += 1;
                }
            }
        }

        self.clear(ctx);
        self.depth_range_size =
            1.0 - ((layers.len() + 2) * NUM_SUBLAYERS) as f32 * DEPTH_EPSILON;
        self.draw_clipping_masks(ctx, tiles, stats);

        self.transition(ctx, FramePhase::Opaque)?;
        for (index, layer) in layers.iter().enumerate().rev() {
            self.current_layer = layers.len() - 1 - index;
            self.render_layer(ctx, RenderPass::Opaque, layer, tiles, stats)?;
        }

        self.transition(ctx, FramePhase::Translucent)?;
        for (index, layer) in layers.iter().enumerate() {
            self.current_layer = layers.len() - 1 - index;
            self.render_layer(ctx, RenderPass::Translucent, layer, tiles, stats)?;
        }

        if self.params.debug_clip {
            self.draw_debug_clip(ctx, tiles, stats);
        }
        self.transition(ctx, FramePhase::Idle)
    }

    /// Moves to the next frame phase.
    pub(crate) fn transition(
        &mut self,
        ctx: &mut dyn GraphicsContext,
        to: FramePhase,
    ) -> Result<(), RenderError> {
        let valid = matches!(
            (self.phase, to),
            (FramePhase::Idle, FramePhase::Opaque)
                | (FramePhase::Opaque, FramePhase::Translucent)
                | (FramePhase::Translucent, FramePhase::Idle)
        );
        if !valid {
            return Err(RenderError::PassOrder {
                from: self.phase,
                to,
            });
        }
        trace!(from = ?self.phase, to = ?to, "Frame phase");
        self.phase = to;
        if let Some(pass) = to.pass() {
            let blend = pass == RenderPass::Translucent || self.params.overdraw;
            self.state.blend(ctx, blend);
        }
        Ok(())
    }

    fn clear(&mut self, ctx: &mut dyn GraphicsContext) {
        self.state.color_mask(ctx, ColorMask::ALL);
        self.state.depth_mask(ctx, true);
        self.state.stencil_mask(ctx, 0xFF);
        ctx.clear(Clear {
            color: Some([0.0, 0.0, 0.0, 0.0]),
            depth: Some(1.0),
            stencil: Some(0),
        });
    }

    fn render_layer(
        &mut self,
        ctx: &mut dyn GraphicsContext,
        pass: RenderPass,
        layer: &StyleLayer,
        tiles: &[RenderTile],
        stats: &mut FrameStats,
    ) -> Result<(), RenderError> {
        if !layer.visible {
            return Ok(());
        }
        for tile in tiles {
            let Some(bucket) = tile.buckets.get(&layer.id) else {
                continue;
            };
            if !bucket.has_data() {
                if pass == RenderPass::Opaque {
                    stats.skipped_empty += 1;
                }
                continue;
            }
            if bucket.render_pass(layer) != pass {
                stats.skipped += 1;
                continue;
            }
            self.clipping = bucket.needs_clipping();
            match bucket.render(self, ctx, layer, tile)? {
                DrawOutcome::Drawn(calls) => stats.draw_calls += calls,
                DrawOutcome::Skipped => stats.skipped += 1,
            }
        }
        Ok(())
    }

    /// Writes each tile's clip id into the stencil buffer.
    pub fn draw_clipping_masks(
        &mut self,
        ctx: &mut dyn GraphicsContext,
        tiles: &[RenderTile],
        stats: &mut FrameStats,
    ) {
        if tiles.is_empty() {
            return;
        }
        let program = self.shaders.select(ShaderKind::Plain, false).program;
        self.state.program(ctx, program);
        self.state.stencil_test(ctx, true);
        self.state.depth_test(ctx, false);
        self.state.depth_mask(ctx, false);
        self.state.color_mask(ctx, ColorMask::NONE);
        self.state.stencil_mask(ctx, 0xFF);
        self.state.stencil_op(
            ctx,
            StencilOps {
                fail: StencilOp::Keep,
                depth_fail: StencilOp::Keep,
                pass: StencilOp::Replace,
            },
        );
        ctx.bind_vertex_buffer(self.tile_quad, &POSITION_LAYOUT);

        for tile in tiles {
            self.state.stencil_func(
                ctx,
                StencilFunc {
                    func: CompareFunc::Always,
                    reference: tile.clip_id,
                    mask: 0xFF,
                },
            );
            ctx.set_uniform(program, "u_matrix", Uniform::Mat4(tile.matrix));
            ctx.draw_arrays(Primitive::TriangleStrip, 0, 4);
            stats.clip_masks += 1;
            stats.draw_calls += 1;
        }
        self.state.color_mask(ctx, ColorMask::ALL);
    }

    fn draw_debug_clip(
        &mut self,
        ctx: &mut dyn GraphicsContext,
        tiles: &[RenderTile],
        stats: &mut FrameStats,
    ) {
        let program = self.shaders.select(ShaderKind::Plain, false).program;
        self.state.program(ctx, program);
        self.state.stencil_test(ctx, true);
        self.state.stencil_mask(ctx, 0x00);
        self.state.stencil_op(ctx, DEFAULT_STENCIL_OPS);
        self.state.depth_test(ctx, false);
        self.state.blend(ctx, true);
        self.state.color_mask(ctx, ColorMask::ALL);
        ctx.bind_vertex_buffer(self.tile_quad, &POSITION_LAYOUT);

        for tile in tiles {
            self.clip_stencil(ctx, tile);
            let shade = tile.clip_id as f32 / MAX_CLIP_TILES as f32;
            let color = Color::new(shade, shade, shade, 0.5).premultiplied(1.0);
            ctx.set_uniform(program, "u_matrix", Uniform::Mat4(tile.matrix));
            ctx.set_uniform(program, "u_color", Uniform::Vec4(color));
            ctx.draw_arrays(Primitive::TriangleStrip, 0, 4);
            stats.draw_calls += 1;
        }
    }

    /// Depth range for sublayer `n` of the current layer.
    pub fn depth_range_for(&self, n: usize) -> [f32; 2] {
        let near = ((1 + self.current_layer) * NUM_SUBLAYERS + n) as f32 * DEPTH_EPSILON;
        [near, near + self.depth_range_size]
    }

    fn set_depth_sublayer(&mut self, ctx: &mut dyn GraphicsContext, n: usize) {
        let range = self.depth_range_for(n);
        self.state.depth_range(ctx, range);
    }

    /// Stencil reference and mask of the current bucket's clip region.
    /// Unclipped buckets match every stencil value.
    fn clip_region(&self, tile: &RenderTile) -> (u8, u8) {
        if self.clipping {
            (tile.clip_id, CLIP_MASK)
        } else {
            (0, 0)
        }
    }

    /// Tests the stencil against `tile`'s clip id for clipped buckets,
    /// disables it otherwise.
    fn clip_draw(&mut self, ctx: &mut dyn GraphicsContext, tile: &RenderTile) {
        self.state.stencil_test(ctx, self.clipping);
        if self.clipping {
            self.clip_stencil(ctx, tile);
        }
    }

    /// Restricts draws to `tile`'s clip region.
    fn clip_stencil(&mut self, ctx: &mut dyn GraphicsContext, tile: &RenderTile) {
        self.state.stencil_func(
            ctx,
            StencilFunc {
                func: CompareFunc::Equal,
                reference: tile.clip_id,
                mask: CLIP_MASK,
            },
        );
    }

    pub(crate) fn render_raster(
        &mut self,
        ctx: &mut dyn GraphicsContext,
        tile: &RenderTile,
        paint: &RasterPaintProperties,
        texture: TextureId,
    ) -> DrawOutcome {
        if self.phase != FramePhase::Translucent {
            return DrawOutcome::Skipped;
        }
        let program = self.shaders.select(ShaderKind::Raster, self.params.overdraw).program;
        self.state.program(ctx, program);

        ctx.set_uniform(program, "u_matrix", Uniform::Mat4(tile.matrix));
        ctx.set_uniform(program, "u_buffer", Uniform::Float(0.0));
        ctx.set_uniform(program, "u_opacity", Uniform::Float(paint.opacity));
        ctx.set_uniform(program, "u_brightness_low", Uniform::Float(paint.brightness_min));
        ctx.set_uniform(program, "u_brightness_high", Uniform::Float(paint.brightness_max));
        ctx.set_uniform(
            program,
            "u_saturation_factor",
            Uniform::Float(saturation_factor(paint.saturation)),
        );
        ctx.set_uniform(
            program,
            "u_contrast_factor",
            Uniform::Float(contrast_factor(paint.contrast)),
        );
        ctx.set_uniform(
            program,
            "u_spin_weights",
            Uniform::Vec3(spin_weights(paint.hue_rotate)),
        );

        self.clip_draw(ctx, tile);
        ctx.set_uniform(program, "u_image", Uniform::Int(0));
        self.state.active_texture(ctx, 0);
        ctx.bind_texture(0, texture);

        self.state.reset_depth_func(ctx);
        self.state.depth_test(ctx, true);
        self.state.depth_mask(ctx, false);
        self.set_depth_sublayer(ctx, 0);

        ctx.bind_vertex_buffer(self.raster_quad, &RASTER_LAYOUT);
        ctx.draw_arrays(Primitive::TriangleStrip, 0, 4);
        DrawOutcome::Drawn(1)
    }

    /// Even-odd stencil fill: fans toggle the fill bit, a tile quad then
    /// colors and clears every pixel with the bit set.
    pub(crate) fn render_fill(
        &mut self,
        ctx: &mut dyn GraphicsContext,
        tile: &RenderTile,
        paint: &FillPaintProperties,
        geometry: &FillGeometry<'_>,
    ) -> DrawOutcome {
        let Some(pass) = self.phase.pass() else {
            return DrawOutcome::Skipped;
        };
        let overdraw = self.params.overdraw;
        let program = self.shaders.select(ShaderKind::Plain, overdraw).program;
        self.state.program(ctx, program);
        ctx.set_uniform(program, "u_matrix", Uniform::Mat4(tile.matrix));

        let (clip_ref, clip_mask) = self.clip_region(tile);
        self.state.stencil_test(ctx, true);
        self.state.color_mask(ctx, ColorMask::NONE);
        self.state.depth_test(ctx, false);
        self.state.depth_mask(ctx, false);
        self.state.stencil_mask(ctx, FILL_STENCIL_BIT);
        self.state.stencil_func(
            ctx,
            StencilFunc {
                func: CompareFunc::Equal,
                reference: clip_ref,
                mask: clip_mask,
            },
        );
        self.state.stencil_op(
            ctx,
            StencilOps {
                fail: StencilOp::Keep,
                depth_fail: StencilOp::Keep,
                pass: StencilOp::Invert,
            },
        );
        ctx.bind_vertex_buffer(geometry.vertex, &POSITION_LAYOUT);
        for group in geometry.groups {
            ctx.draw_arrays(Primitive::TriangleFan, group.first, group.count);
        }
        let mut calls = geometry.groups.len() as u32;

        self.state.color_mask(ctx, ColorMask::ALL);
        self.state.stencil_func(
            ctx,
            StencilFunc {
                func: CompareFunc::Equal,
                reference: FILL_STENCIL_BIT | clip_ref,
                mask: FILL_STENCIL_BIT | clip_mask,
            },
        );
        self.state.stencil_op(
            ctx,
            StencilOps {
                fail: StencilOp::Keep,
                depth_fail: StencilOp::Keep,
                pass: StencilOp::Zero,
            },
        );
        self.state.reset_depth_func(ctx);
        self.state.depth_test(ctx, true);
        self.state.depth_mask(ctx, pass == RenderPass::Opaque);
        self.set_depth_sublayer(ctx, 1);
        ctx.set_uniform(
            program,
            "u_color",
            Uniform::Vec4(paint.color.premultiplied(paint.opacity)),
        );
        ctx.bind_vertex_buffer(self.tile_quad, &POSITION_LAYOUT);
        ctx.draw_arrays(Primitive::TriangleStrip, 0, 4);
        calls += 1;

        if let (Some(color), Some((index, count))) = (paint.outline_color, geometry.outline) {
            let program = self.shaders.select(ShaderKind::Outline, overdraw).program;
            self.state.program(ctx, program);
            ctx.set_uniform(program, "u_matrix", Uniform::Mat4(tile.matrix));
            ctx.set_uniform(
                program,
                "u_color",
                Uniform::Vec4(color.premultiplied(paint.opacity)),
            );
            self.state.stencil_mask(ctx, 0x00);
            self.clip_draw(ctx, tile);
            self.state.stencil_op(ctx, DEFAULT_STENCIL_OPS);
            self.set_depth_sublayer(ctx, 2);
            self.state.line_width(ctx, 1.0);
            ctx.bind_vertex_buffer(geometry.vertex, &POSITION_LAYOUT);
            ctx.bind_index_buffer(index);
            ctx.draw_elements(Primitive::Lines, 0, count);
            calls += 1;
        }
        DrawOutcome::Drawn(calls)
    }

    pub(crate) fn render_line(
        &mut self,
        ctx: &mut dyn GraphicsContext,
        tile: &RenderTile,
        paint: &LinePaintProperties,
        vertex: BufferId,
        (index, count): (BufferId, u32),
    ) -> DrawOutcome {
        if self.phase.pass().is_none() {
            return DrawOutcome::Skipped;
        }
        let program = self.shaders.select(ShaderKind::Line, self.params.overdraw).program;
        self.state.program(ctx, program);
        ctx.set_uniform(program, "u_matrix", Uniform::Mat4(tile.matrix));
        ctx.set_uniform(
            program,
            "u_color",
            Uniform::Vec4(paint.color.premultiplied(paint.opacity)),
        );

        self.state.stencil_mask(ctx, 0x00);
        self.clip_draw(ctx, tile);
        self.state.stencil_op(ctx, DEFAULT_STENCIL_OPS);
        self.state.color_mask(ctx, ColorMask::ALL);
        self.state.reset_depth_func(ctx);
        self.state.depth_test(ctx, true);
        self.state.depth_mask(ctx, false);
        self.set_depth_sublayer(ctx, 0);
        self.state.line_width(ctx, paint.width);

        ctx.bind_vertex_buffer(vertex, &POSITION_LAYOUT);
        ctx.bind_index_buffer(index);
        ctx.draw_elements(Primitive::Lines, 0, count);
        DrawOutcome::Drawn(1)
    }
}

use tracing::trace;

use super::{Bucket, DrawOutcome};
use crate::geometry::{FeatureType, GeometryCoordinates, TilePoint};
use crate::renderer::gl::{index_bytes, short_bytes, BufferId, BufferTarget, GraphicsContext};
use crate::renderer::paint::{LayerPaint, StyleLayer};
use crate::renderer::painter::{Painter, RenderTile};
use crate::renderer::{RenderError, RenderPass};
use crate::tile::TileLayer;

/// A run of vertices drawn as one triangle fan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FanGroup {
    pub first: u32,
    pub count: u32,
}

/// Uploaded fill geometry handed to the painter.
#[derive(Debug, Clone, Copy)]
pub(crate) struct FillGeometry<'a> {
    pub vertex: BufferId,
    pub groups: &'a [FanGroup],
    /// Outline index buffer and its index count.
    pub outline: Option<(BufferId, u32)>,
}

#[derive(Debug, Clone, Copy)]
struct FillBuffers {
    vertex: BufferId,
    outline: Option<BufferId>,
}

/// Polygon features of one tile layer.
///
/// Every ring becomes its own fan; even-odd stencil inversion resolves
/// holes and overlaps when drawn.
#[derive(Debug, Default)]
pub struct FillBucket {
    vertices: Vec<[i16; 2]>,
    groups: Vec<FanGroup>,
    outline: Vec<u32>,
    buffers: Option<FillBuffers>,
}

/// Ring without its closing point.
fn open_ring(ring: &GeometryCoordinates) -> &[TilePoint] {
    match (ring.first(), ring.last()) {
        (Some(first), Some(last)) if ring.len() > 1 && first == last => &ring[..ring.len() - 1],
        _ => ring,
    }
}

impl FillBucket {
    pub fn from_layer(layer: &TileLayer) -> Self {
        let mut bucket = Self::default();
        for feature in &layer.features {
            if feature.feature_type != FeatureType::Polygon {
                continue;
            }
            for ring in &feature.geometry {
                bucket.add_ring(open_ring(ring));
            }
        }
        trace!(
            layer = %layer.name,
            vertices = bucket.vertices.len(),
            rings = bucket.groups.len(),
            "Built fill bucket"
        );
        bucket
    }

    fn add_ring(&mut self, ring: &[TilePoint]) {
        if ring.len() < 3 {
            return;
        }
        let first = self.vertices.len() as u32;
        let count = ring.len() as u32;
        self.vertices.extend(ring.iter().map(|p| [p.x, p.y]));
        self.groups.push(FanGroup { first, count });
        for i in 0..count {
            self.outline.push(first + i);
            self.outline.push(first + (i + 1) % count);
        }
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn groups(&self) -> &[FanGroup] {
        &self.groups
    }

    pub fn outline_indices(&self) -> &[u32] {
        &self.outline
    }
}

impl Bucket for FillBucket {
    fn upload(&mut self, ctx: &mut dyn GraphicsContext) -> Result<(), RenderError> {
        if !self.needs_upload() {
            return Ok(());
        }
        let vertex = ctx.create_buffer(BufferTarget::Vertex, &short_bytes(&self.vertices));
        let outline = (!self.outline.is_empty())
            .then(|| ctx.create_buffer(BufferTarget::Index, &index_bytes(&self.outline)));
        self.buffers = Some(FillBuffers { vertex, outline });
        Ok(())
    }

    fn needs_upload(&self) -> bool {
        self.has_data() && self.buffers.is_none()
    }

    fn has_data(&self) -> bool {
        !self.groups.is_empty()
    }

    fn needs_clipping(&self) -> bool {
        true
    }

    fn render_pass(&self, layer: &StyleLayer) -> RenderPass {
        match &layer.paint {
            LayerPaint::Fill(paint) if paint.is_opaque() => RenderPass::Opaque,
            _ => RenderPass::Translucent,
        }
    }

    fn render(
        &self,
        painter: &mut Painter,
        ctx: &mut dyn GraphicsContext,
        layer: &StyleLayer,
        tile: &RenderTile,
    ) -> Result<DrawOutcome, RenderError> {
        let LayerPaint::Fill(paint) = &layer.paint else {
            return Err(RenderError::LayerMismatch {
                layer: layer.id.clone(),
                bucket: "fill",
            });
        };
        let Some(buffers) = self.buffers.filter(|_| self.has_data()) else {
            return Ok(DrawOutcome::Skipped);
        };
        let geometry = FillGeometry {
            vertex: buffers.vertex,
            groups: &self.groups,
            outline: buffers.outline.map(|b| (b, self.outline.len() as u32)),
        };
        Ok(painter.render_fill(ctx, tile, paint, &geometry))
    }

    fn release(&mut self, ctx: &mut dyn GraphicsContext) {
        if let Some(buffers) = self.buffers.take() {
            ctx.delete_buffer(buffers.vertex);
            if let Some(outline) = buffers.outline {
                ctx.delete_buffer(outline);
            }
        }
    }
}

use tracing::trace;

use super::{Bucket, DrawOutcome};
use crate::geometry::FeatureType;
use crate::renderer::gl::{index_bytes, short_bytes, BufferId, BufferTarget, GraphicsContext};
use crate::renderer::paint::{LayerPaint, StyleLayer};
use crate::renderer::painter::{Painter, RenderTile};
use crate::renderer::{RenderError, RenderPass};
use crate::tile::TileLayer;

/// Line features as segment pairs.
#[derive(Debug, Default)]
pub struct LineBucket {
    vertices: Vec<[i16; 2]>,
    indices: Vec<u32>,
    buffers: Option<(BufferId, BufferId)>,
}

impl LineBucket {
    pub fn from_layer(layer: &TileLayer) -> Self {
        let mut bucket = Self::default();
        let lines = layer
            .features
            .iter()
            .filter(|f| f.feature_type == FeatureType::LineString)
            .flat_map(|f| f.geometry.iter())
            .filter(|line| line.len() >= 2);

        for line in lines {
            let first = bucket.vertices.len() as u32;
            bucket.vertices.extend(line.iter().map(|p| [p.x, p.y]));
            for i in 1..line.len() as u32 {
                bucket.indices.push(first + i - 1);
                bucket.indices.push(first + i);
            }
        }
        trace!(layer = %layer.name, segments = bucket.segment_count(), "Built line bucket");
        bucket
    }

    pub fn segment_count(&self) -> usize {
        self.indices.len() / 2
    }

    pub fn indices(&self) -> &[u32] {
        &self.indices
    }
}

impl Bucket for LineBucket {
    fn upload(&mut self, ctx: &mut dyn GraphicsContext) -> Result<(), RenderError> {
        if !self.needs_upload() {
            return Ok(());
        }
        let vertex = ctx.create_buffer(BufferTarget::Vertex, &short_bytes(&self.vertices));
        let index = ctx.create_buffer(BufferTarget::Index, &index_bytes(&self.indices));
        self.buffers = Some((vertex, index));
        Ok(())
    }

    fn needs_upload(&self) -> bool {
        self.has_data() && self.buffers.is_none()
    }

    fn has_data(&self) -> bool {
        !self.indices.is_empty()
    }

    fn needs_clipping(&self) -> bool {
        true
    }

    fn render_pass(&self, _layer: &StyleLayer) -> RenderPass {
        RenderPass::Translucent
    }

    fn render(
        &self,
        painter: &mut Painter,
        ctx: &mut dyn GraphicsContext,
        layer: &StyleLayer,
        tile: &RenderTile,
    ) -> Result<DrawOutcome, RenderError> {
        let LayerPaint::Line(paint) = &layer.paint else {
            return Err(RenderError::LayerMismatch {
                layer: layer.id.clone(),
                bucket: "line",
            });
        };
        match self.buffers {
            Some((vertex, index)) if self.has_data() => Ok(painter.render_line(
                ctx,
                tile,
                paint,
                vertex,
                (index, self.indices.len() as u32),
            )),
            _ => Ok(DrawOutcome::Skipped),
        }
    }

    fn release(&mut self, ctx: &mut dyn GraphicsContext) {
        if let Some((vertex, index)) = self.buffers.take() {
            ctx.delete_buffer(vertex);
            ctx.delete_buffer(index);
        }
    }
}

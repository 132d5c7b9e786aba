//! GPU-ready packaging of one tile layer.
//!
//! A bucket owns its CPU-side vertex data and, after [`Bucket::upload`],
//! the GPU buffers built from it. Drawing is delegated back to the
//! [`Painter`], which owns the pipeline state.

mod fill;
mod line;
mod raster;

pub use fill::{FanGroup, FillBucket};
pub(crate) use fill::FillGeometry;
pub use line::LineBucket;
pub use raster::RasterBucket;

use std::fmt::Debug;

use super::gl::GraphicsContext;
use super::paint::{LayerPaint, StyleLayer};
use super::painter::{Painter, RenderTile};
use super::{RenderError, RenderPass};
use crate::tile::TileLayer;

/// Result of one bucket draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawOutcome {
    /// Number of draw calls issued.
    Drawn(u32),
    /// Nothing to draw in the current pass.
    Skipped,
}

pub trait Bucket: Debug {
    /// Transfers pending CPU data to the GPU. A no-op when the current
    /// data version is already uploaded.
    fn upload(&mut self, ctx: &mut dyn GraphicsContext) -> Result<(), RenderError>;

    fn needs_upload(&self) -> bool;

    fn has_data(&self) -> bool;

    /// Whether draws must be constrained to the tile's stencil region.
    fn needs_clipping(&self) -> bool;

    /// Pass this bucket draws in for `layer`.
    fn render_pass(&self, layer: &StyleLayer) -> RenderPass;

    fn render(
        &self,
        painter: &mut Painter,
        ctx: &mut dyn GraphicsContext,
        layer: &StyleLayer,
        tile: &RenderTile,
    ) -> Result<DrawOutcome, RenderError>;

    /// Deletes uploaded GPU objects. The bucket can be uploaded again.
    fn release(&mut self, ctx: &mut dyn GraphicsContext);
}

/// Builds the vector bucket `layer` needs from a tile layer.
///
/// Returns `None` for raster layers, which get their bucket from decoded
/// image data, and when the tile layer holds nothing the style draws.
pub fn build_bucket(layer: &StyleLayer, tile_layer: &TileLayer) -> Option<Box<dyn Bucket>> {
    let bucket: Box<dyn Bucket> = match layer.paint {
        LayerPaint::Raster(_) => return None,
        LayerPaint::Fill(_) => Box::new(FillBucket::from_layer(tile_layer)),
        LayerPaint::Line(_) => Box::new(LineBucket::from_layer(tile_layer)),
    };
    bucket.has_data().then_some(bucket)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{FeatureType, TilePoint};
    use crate::renderer::paint::{FillPaintProperties, LinePaintProperties, RasterPaintProperties};
    use crate::tile::TileFeature;

    fn line_layer() -> TileLayer {
        let mut layer = TileLayer::new("roads");
        layer.push(TileFeature::new(
            FeatureType::LineString,
            vec![vec![TilePoint::new(0, 0), TilePoint::new(100, 100)]],
        ));
        layer
    }

    #[test]
    fn test_build_line_bucket() {
        let style = StyleLayer::line("roads", "roads", LinePaintProperties::default());
        let bucket = build_bucket(&style, &line_layer()).unwrap();
        assert!(bucket.has_data());
        assert!(bucket.needs_clipping());
    }

    #[test]
    fn test_fill_bucket_without_polygons_is_not_built() {
        let style = StyleLayer::fill("water", "roads", FillPaintProperties::default());
        assert!(build_bucket(&style, &line_layer()).is_none());
    }

    #[test]
    fn test_raster_layer_has_no_vector_bucket() {
        let style = StyleLayer::raster("imagery", RasterPaintProperties::default());
        assert!(build_bucket(&style, &line_layer()).is_none());
    }
}

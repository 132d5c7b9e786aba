use image::{Rgba, RgbaImage};
use tracing::trace;

use super::{Bucket, DrawOutcome};
use crate::renderer::gl::{GraphicsContext, TextureId};
use crate::renderer::paint::{LayerPaint, StyleLayer};
use crate::renderer::painter::{Painter, RenderTile};
use crate::renderer::{RenderError, RenderPass};

/// Raster imagery for one tile, held as premultiplied RGBA.
#[derive(Debug)]
pub struct RasterBucket {
    image: RgbaImage,
    version: u64,
    uploaded: Option<(u64, TextureId)>,
}

fn premultiply(image: &mut RgbaImage) {
    for Rgba([r, g, b, a]) in image.pixels_mut() {
        let alpha = *a as u16;
        for c in [r, g, b] {
            *c = ((*c as u16 * alpha + 127) / 255) as u8;
        }
    }
}

impl RasterBucket {
    /// Wraps straight-alpha pixels, premultiplying them.
    pub fn from_rgba(mut image: RgbaImage) -> Self {
        premultiply(&mut image);
        Self::from_premultiplied(image)
    }

    pub fn from_premultiplied(image: RgbaImage) -> Self {
        Self {
            image,
            version: 1,
            uploaded: None,
        }
    }

    /// Decodes PNG, JPEG or WebP data.
    pub fn from_encoded(bytes: &[u8]) -> Result<Self, RenderError> {
        let image = image::load_from_memory(bytes)
            .map_err(|e| RenderError::InvalidImage(e.to_string()))?;
        Ok(Self::from_rgba(image.to_rgba8()))
    }

    /// Replaces the image. The next upload sends the new pixels.
    pub fn set_image(&mut self, mut image: RgbaImage) {
        premultiply(&mut image);
        self.image = image;
        self.version += 1;
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    pub fn texture(&self) -> Option<TextureId> {
        self.uploaded.map(|(_, texture)| texture)
    }
}

impl Bucket for RasterBucket {
    fn upload(&mut self, ctx: &mut dyn GraphicsContext) -> Result<(), RenderError> {
        if !self.needs_upload() {
            return Ok(());
        }
        if let Some((_, old)) = self.uploaded.take() {
            ctx.delete_texture(old);
        }
        let (width, height) = self.image.dimensions();
        let texture = ctx.create_texture(width, height, self.image.as_raw());
        trace!(width, height, version = self.version, "Uploaded raster texture");
        self.uploaded = Some((self.version, texture));
        Ok(())
    }

    fn needs_upload(&self) -> bool {
        self.has_data() && self.uploaded.map(|(v, _)| v) != Some(self.version)
    }

    fn has_data(&self) -> bool {
        self.image.width() > 0 && self.image.height() > 0
    }

    fn needs_clipping(&self) -> bool {
        false
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
        let LayerPaint::Raster(paint) = &layer.paint else {
            return Err(RenderError::LayerMismatch {
                layer: layer.id.clone(),
                bucket: "raster",
            });
        };
        match self.texture() {
            Some(texture) if self.has_data() => {
                Ok(painter.render_raster(ctx, tile, paint, texture))
            }
            _ => Ok(DrawOutcome::Skipped),
        }
    }

    fn release(&mut self, ctx: &mut dyn GraphicsContext) {
        if let Some((_, texture)) = self.uploaded.take() {
            ctx.delete_texture(texture);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::RecordingContext;
    use std::io::Cursor;

    #[test]
    fn test_premultiplies_on_construction() {
        let bucket = RasterBucket::from_rgba(RgbaImage::from_pixel(1, 1, Rgba([255, 100, 0, 128])));
        assert_eq!(bucket.image().get_pixel(0, 0), &Rgba([128, 50, 0, 128]));
    }

    #[test]
    fn test_uploads_once_per_version() {
        let mut ctx = RecordingContext::new();
        let mut bucket = RasterBucket::from_rgba(RgbaImage::new(4, 4));
        assert!(bucket.needs_upload());

        bucket.upload(&mut ctx).unwrap();
        bucket.upload(&mut ctx).unwrap();
        assert!(!bucket.needs_upload());
        assert_eq!(ctx.live_textures(), 1);
        let first = bucket.texture().unwrap();

        bucket.set_image(RgbaImage::new(8, 8));
        assert!(bucket.needs_upload());
        bucket.upload(&mut ctx).unwrap();
        assert_eq!(ctx.live_textures(), 1);
        assert_ne!(bucket.texture(), Some(first));

        bucket.release(&mut ctx);
        assert_eq!(ctx.live_textures(), 0);
        assert!(bucket.needs_upload());
    }

    #[test]
    fn test_empty_image_has_no_data() {
        let mut ctx = RecordingContext::new();
        let mut bucket = RasterBucket::from_rgba(RgbaImage::new(0, 0));
        assert!(!bucket.has_data());
        assert!(!bucket.needs_upload());
        bucket.upload(&mut ctx).unwrap();
        assert_eq!(ctx.live_textures(), 0);
    }

    #[test]
    fn test_decodes_png() {
        let mut png = Vec::new();
        RgbaImage::from_pixel(2, 3, Rgba([10, 20, 30, 255]))
            .write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)
            .unwrap();
        let bucket = RasterBucket::from_encoded(&png).unwrap();
        assert_eq!(bucket.image().dimensions(), (2, 3));
        assert!(!bucket.needs_clipping());
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(matches!(
            RasterBucket::from_encoded(b"not an image"),
            Err(RenderError::InvalidImage(_))
        ));
    }
}

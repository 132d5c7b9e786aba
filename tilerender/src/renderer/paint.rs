//! Paint properties and the numeric remapping applied before they reach a
//! shader.

/// Maps raster saturation in `[-1, 1]` to the shader factor.
///
/// Positive values use `1 - 1/(1.001 - s)` so `s = 1` stays finite;
/// desaturation is linear.
pub fn saturation_factor(saturation: f32) -> f32 {
    if saturation > 0.0 {
        (1.0 - 1.0 / (1.001 - saturation as f64)) as f32
    } else {
        -saturation
    }
}

/// Maps raster contrast in `[-1, 1)` to the shader factor.
pub fn contrast_factor(contrast: f32) -> f32 {
    if contrast > 0.0 {
        1.0 / (1.0 - contrast)
    } else {
        1.0 + contrast
    }
}

/// Channel mixing weights for a hue rotation of `degrees` around the gray
/// axis.
pub fn spin_weights(degrees: f32) -> [f32; 3] {
    let radians = (degrees as f64).to_radians();
    let (s, c) = radians.sin_cos();
    let sqrt3 = 3f64.sqrt();
    [
        ((2.0 * c + 1.0) / 3.0) as f32,
        ((-sqrt3 * s - c + 1.0) / 3.0) as f32,
        ((sqrt3 * s - c + 1.0) / 3.0) as f32,
    ]
}

/// Straight-alpha RGBA color, components in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const BLACK: Color = Color::new(0.0, 0.0, 0.0, 1.0);
    pub const TRANSPARENT: Color = Color::new(0.0, 0.0, 0.0, 0.0);

    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// Premultiplied components scaled by `opacity`, as the shaders expect.
    pub fn premultiplied(&self, opacity: f32) -> [f32; 4] {
        let a = self.a * opacity;
        [self.r * a, self.g * a, self.b * a, a]
    }
}

impl Default for Color {
    fn default() -> Self {
        Color::BLACK
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RasterPaintProperties {
    pub opacity: f32,
    pub brightness_min: f32,
    pub brightness_max: f32,
    pub saturation: f32,
    pub contrast: f32,
    /// Degrees.
    pub hue_rotate: f32,
}

impl Default for RasterPaintProperties {
    fn default() -> Self {
        Self {
            opacity: 1.0,
            brightness_min: 0.0,
            brightness_max: 1.0,
            saturation: 0.0,
            contrast: 0.0,
            hue_rotate: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FillPaintProperties {
    pub color: Color,
    pub opacity: f32,
    pub outline_color: Option<Color>,
}

impl FillPaintProperties {
    /// True when the fill can be drawn without blending.
    pub fn is_opaque(&self) -> bool {
        self.opacity >= 1.0 && self.color.a >= 1.0
    }
}

impl Default for FillPaintProperties {
    fn default() -> Self {
        Self {
            color: Color::BLACK,
            opacity: 1.0,
            outline_color: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinePaintProperties {
    pub color: Color,
    pub opacity: f32,
    pub width: f32,
}

impl Default for LinePaintProperties {
    fn default() -> Self {
        Self {
            color: Color::BLACK,
            opacity: 1.0,
            width: 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LayerPaint {
    Raster(RasterPaintProperties),
    Fill(FillPaintProperties),
    Line(LinePaintProperties),
}

impl LayerPaint {
    pub fn kind(&self) -> &'static str {
        match self {
            LayerPaint::Raster(_) => "raster",
            LayerPaint::Fill(_) => "fill",
            LayerPaint::Line(_) => "line",
        }
    }
}

/// One style layer, as supplied by the style engine.
///
/// Buckets are looked up per tile by `id`.
#[derive(Debug, Clone, PartialEq)]
pub struct StyleLayer {
    pub id: String,
    /// Tile layer the features come from. Unused for raster layers.
    pub source_layer: Option<String>,
    pub paint: LayerPaint,
    pub visible: bool,
}

impl StyleLayer {
    pub fn raster(id: impl Into<String>, paint: RasterPaintProperties) -> Self {
        Self {
            id: id.into(),
            source_layer: None,
            paint: LayerPaint::Raster(paint),
            visible: true,
        }
    }

    pub fn fill(
        id: impl Into<String>,
        source_layer: impl Into<String>,
        paint: FillPaintProperties,
    ) -> Self {
        Self {
            id: id.into(),
            source_layer: Some(source_layer.into()),
            paint: LayerPaint::Fill(paint),
            visible: true,
        }
    }

    pub fn line(
        id: impl Into<String>,
        source_layer: impl Into<String>,
        paint: LinePaintProperties,
    ) -> Self {
        Self {
            id: id.into(),
            source_layer: Some(source_layer.into()),
            paint: LayerPaint::Line(paint),
            visible: true,
        }
    }

    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }
}

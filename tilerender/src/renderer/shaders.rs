//! Shader programs, compiled once per painter.
//!
//! Each kind has a normal and an overdraw-inspector variant. The overdraw
//! variant is the same source with `OVERDRAW_INSPECTOR` defined, which
//! makes the fragment stage emit a constant low-alpha color so stacked
//! draws show up as brighter regions.

use super::gl::{GraphicsContext, ProgramId};
use super::RenderError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderKind {
    Raster,
    /// Solid fill.
    Plain,
    Outline,
    Line,
}

impl ShaderKind {
    pub const ALL: [ShaderKind; 4] = [
        ShaderKind::Raster,
        ShaderKind::Plain,
        ShaderKind::Outline,
        ShaderKind::Line,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ShaderKind::Raster => "raster",
            ShaderKind::Plain => "fill",
            ShaderKind::Outline => "outline",
            ShaderKind::Line => "line",
        }
    }

    fn sources(&self) -> (&'static str, &'static str) {
        match self {
            ShaderKind::Raster => (RASTER_VERTEX, RASTER_FRAGMENT),
            ShaderKind::Plain => (FILL_VERTEX, FILL_FRAGMENT),
            ShaderKind::Outline => (FILL_VERTEX, FILL_FRAGMENT),
            ShaderKind::Line => (FILL_VERTEX, FILL_FRAGMENT),
        }
    }

    fn slot(&self, overdraw: bool) -> usize {
        let base = match self {
            ShaderKind::Raster => 0,
            ShaderKind::Plain => 2,
            ShaderKind::Outline => 4,
            ShaderKind::Line => 6,
        };
        base + usize::from(overdraw)
    }
}

pub const OVERDRAW_DEFINE: &str = "#define OVERDRAW_INSPECTOR\n";

const FILL_VERTEX: &str = r#"
attribute vec2 a_pos;
uniform mat4 u_matrix;
void main() {
    gl_Position = u_matrix * vec4(a_pos, 0, 1);
}
"#;

const FILL_FRAGMENT: &str = r#"
uniform vec4 u_color;
void main() {
#ifdef OVERDRAW_INSPECTOR
    gl_FragColor = vec4(1.0) / 8.0;
#else
    gl_FragColor = u_color;
#endif
}
"#;

const RASTER_VERTEX: &str = r#"
attribute vec2 a_pos;
attribute vec2 a_texture_pos;
uniform mat4 u_matrix;
uniform float u_buffer;
varying vec2 v_pos;
void main() {
    gl_Position = u_matrix * vec4(a_pos, 0, 1);
    v_pos = (a_texture_pos / 32767.0 - 0.5) / (u_buffer + 1.0) + 0.5;
}
"#;

const RASTER_FRAGMENT: &str = r#"
uniform sampler2D u_image;
uniform float u_opacity;
uniform float u_brightness_low;
uniform float u_brightness_high;
uniform float u_saturation_factor;
uniform float u_contrast_factor;
uniform vec3 u_spin_weights;
varying vec2 v_pos;
void main() {
    vec4 color = texture2D(u_image, v_pos);
    vec3 rgb = color.rgb;
    rgb = vec3(
        dot(rgb, u_spin_weights.xyz),
        dot(rgb, u_spin_weights.zxy),
        dot(rgb, u_spin_weights.yzx));
    float average = (color.r + color.g + color.b) / 3.0;
    rgb += (average - rgb) * u_saturation_factor;
    rgb = (rgb - 0.5) * u_contrast_factor + 0.5;
    vec3 high = vec3(u_brightness_high);
    vec3 low = vec3(u_brightness_low);
    gl_FragColor = vec4(mix(high, low, rgb), color.a) * u_opacity;
#ifdef OVERDRAW_INSPECTOR
    gl_FragColor = vec4(1.0);
#endif
}
"#;

/// A linked program and what it was built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Shader {
    pub kind: ShaderKind,
    pub overdraw: bool,
    pub program: ProgramId,
}

/// All programs the painter uses.
#[derive(Debug, Clone)]
pub struct ShaderSet {
    shaders: Vec<Shader>,
}

impl ShaderSet {
    /// Compiles every kind in both variants.
    ///
    /// On failure the programs compiled so far are deleted again.
    pub fn compile(ctx: &mut dyn GraphicsContext) -> Result<Self, RenderError> {
        let mut shaders = Vec::with_capacity(ShaderKind::ALL.len() * 2);
        for kind in ShaderKind::ALL {
            for overdraw in [false, true] {
                let (vertex, fragment) = kind.sources();
                let fragment = if overdraw {
                    format!("{}{}", OVERDRAW_DEFINE, fragment)
                } else {
                    fragment.to_string()
                };
                match ctx.create_program(kind.name(), vertex, &fragment) {
                    Ok(program) => shaders.push(Shader {
                        kind,
                        overdraw,
                        program,
                    }),
                    Err(e) => {
                        for shader in &shaders {
                            ctx.delete_program(shader.program);
                        }
                        return Err(e);
                    }
                }
            }
        }
        shaders.sort_by_key(|s| s.kind.slot(s.overdraw));
        Ok(Self { shaders })
    }

    /// Returns the variant to bind for `kind`.
    pub fn select(&self, kind: ShaderKind, overdraw: bool) -> &Shader {
        &self.shaders[kind.slot(overdraw)]
    }

    pub fn len(&self) -> usize {
        self.shaders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shaders.is_empty()
    }

    pub fn release(&self, ctx: &mut dyn GraphicsContext) {
        for shader in &self.shaders {
            ctx.delete_program(shader.program);
        }
    }
}

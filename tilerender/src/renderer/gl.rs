//! Graphics API seam.
//!
//! The painter decides *what* state to set and *when*; a
//! [`GraphicsContext`] implementation decides how that maps onto a real
//! API. [`RecordingContext`](super::RecordingContext) implements it
//! headlessly.

use super::RenderError;

/// Handle of a linked shader program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProgramId(pub u32);

/// Handle of a vertex or index buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferId(pub u32);

/// Handle of a 2D RGBA texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureId(pub u32);

/// Value pushed into a shader uniform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Uniform {
    Int(i32),
    Float(f32),
    Vec2([f32; 2]),
    Vec3([f32; 3]),
    Vec4([f32; 4]),
    Mat4([f32; 16]),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareFunc {
    Never,
    Less,
    Equal,
    LessEqual,
    Greater,
    NotEqual,
    GreaterEqual,
    Always,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StencilOp {
    Keep,
    Zero,
    Replace,
    Increment,
    Decrement,
    Invert,
}

/// Stencil comparison: passes when `(ref & mask) <func> (stencil & mask)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StencilFunc {
    pub func: CompareFunc,
    pub reference: u8,
    pub mask: u8,
}

/// Actions for stencil-fail, depth-fail and pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StencilOps {
    pub fail: StencilOp,
    pub depth_fail: StencilOp,
    pub pass: StencilOp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColorMask {
    pub r: bool,
    pub g: bool,
    pub b: bool,
    pub a: bool,
}

impl ColorMask {
    pub const ALL: ColorMask = ColorMask {
        r: true,
        g: true,
        b: true,
        a: true,
    };
    pub const NONE: ColorMask = ColorMask {
        r: false,
        g: false,
        b: false,
        a: false,
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Primitive {
    Lines,
    LineStrip,
    Triangles,
    TriangleStrip,
    TriangleFan,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferTarget {
    Vertex,
    Index,
}

/// Component type of a vertex attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeType {
    Short,
    Float,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexAttribute {
    pub name: &'static str,
    pub components: u8,
    pub kind: AttributeType,
    pub offset: u32,
}

/// Interleaved vertex layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexLayout {
    pub attributes: &'static [VertexAttribute],
    pub stride: u32,
}

/// `a_pos` as two shorts.
pub const POSITION_LAYOUT: VertexLayout = VertexLayout {
    attributes: &[VertexAttribute {
        name: "a_pos",
        components: 2,
        kind: AttributeType::Short,
        offset: 0,
    }],
    stride: 4,
};

/// `a_pos` and `a_texture_pos`, two shorts each.
pub const RASTER_LAYOUT: VertexLayout = VertexLayout {
    attributes: &[
        VertexAttribute {
            name: "a_pos",
            components: 2,
            kind: AttributeType::Short,
            offset: 0,
        },
        VertexAttribute {
            name: "a_texture_pos",
            components: 2,
            kind: AttributeType::Short,
            offset: 4,
        },
    ],
    stride: 8,
};

/// A fixed-function state assignment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StateChange {
    Program(ProgramId),
    StencilTest(bool),
    StencilFunc(StencilFunc),
    StencilOp(StencilOps),
    StencilMask(u8),
    DepthTest(bool),
    DepthMask(bool),
    DepthFunc(CompareFunc),
    DepthRange([f32; 2]),
    Blend(bool),
    ColorMask(ColorMask),
    ActiveTexture(u32),
    LineWidth(f32),
}

/// Buffers to clear, with the value to clear each to.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Clear {
    pub color: Option<[f32; 4]>,
    pub depth: Option<f32>,
    pub stencil: Option<u8>,
}

/// GPU operations used by the painter and buckets.
///
/// All calls happen on the render thread; implementations need not be
/// `Send`.
pub trait GraphicsContext {
    /// Compiles and links a program.
    ///
    /// # Errors
    ///
    /// [`RenderError::ShaderCompile`] if either stage fails.
    fn create_program(
        &mut self,
        name: &str,
        vertex: &str,
        fragment: &str,
    ) -> Result<ProgramId, RenderError>;

    fn delete_program(&mut self, program: ProgramId);

    fn create_buffer(&mut self, target: BufferTarget, data: &[u8]) -> BufferId;

    fn delete_buffer(&mut self, buffer: BufferId);

    /// Uploads premultiplied RGBA8 pixels.
    fn create_texture(&mut self, width: u32, height: u32, pixels: &[u8]) -> TextureId;

    fn delete_texture(&mut self, texture: TextureId);

    fn bind_texture(&mut self, unit: u32, texture: TextureId);

    fn set_uniform(&mut self, program: ProgramId, name: &'static str, value: Uniform);

    fn apply(&mut self, change: StateChange);

    fn clear(&mut self, clear: Clear);

    fn bind_vertex_buffer(&mut self, buffer: BufferId, layout: &VertexLayout);

    fn bind_index_buffer(&mut self, buffer: BufferId);

    fn draw_arrays(&mut self, primitive: Primitive, first: u32, count: u32);

    /// Draws `count` `u32` indices starting at index `offset`.
    fn draw_elements(&mut self, primitive: Primitive, offset: u32, count: u32);
}

/// Little-endian bytes of `i16` vertex data.
pub(crate) fn short_bytes<const N: usize>(vertices: &[[i16; N]]) -> Vec<u8> {
    vertices
        .iter()
        .flat_map(|v| v.iter().flat_map(|c| c.to_le_bytes()))
        .collect()
}

/// Little-endian bytes of `u32` indices.
pub(crate) fn index_bytes(indices: &[u32]) -> Vec<u8> {
    indices.iter().flat_map(|i| i.to_le_bytes()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_bytes_little_endian() {
        assert_eq!(short_bytes(&[[1i16, -1]]), vec![1, 0, 0xFF, 0xFF]);
    }

    #[test]
    fn test_index_bytes() {
        assert_eq!(index_bytes(&[1, 256]), vec![1, 0, 0, 0, 0, 1, 0, 0]);
    }

    #[test]
    fn test_raster_layout_stride_covers_attributes() {
        let last = RASTER_LAYOUT.attributes.last().unwrap();
        assert_eq!(last.offset + last.components as u32 * 2, RASTER_LAYOUT.stride);
    }
}

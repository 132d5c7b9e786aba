//! Headless [`GraphicsContext`] that records every call.

use std::collections::BTreeSet;

use super::gl::{
    BufferId, BufferTarget, Clear, GraphicsContext, Primitive, ProgramId, StateChange,
    TextureId, Uniform, VertexLayout,
};
use super::RenderError;

/// One recorded call.
#[derive(Debug, Clone, PartialEq)]
pub enum GlCommand {
    CreateProgram { program: ProgramId, name: String },
    DeleteProgram(ProgramId),
    CreateBuffer { buffer: BufferId, target: BufferTarget, len: usize },
    DeleteBuffer(BufferId),
    CreateTexture { texture: TextureId, width: u32, height: u32 },
    DeleteTexture(TextureId),
    BindTexture { unit: u32, texture: TextureId },
    Uniform { program: ProgramId, name: &'static str, value: Uniform },
    State(StateChange),
    Clear(Clear),
    BindVertexBuffer { buffer: BufferId, layout: VertexLayout },
    BindIndexBuffer(BufferId),
    DrawArrays { primitive: Primitive, first: u32, count: u32 },
    DrawElements { primitive: Primitive, offset: u32, count: u32 },
}

impl GlCommand {
    pub fn is_draw(&self) -> bool {
        matches!(self, GlCommand::DrawArrays { .. } | GlCommand::DrawElements { .. })
    }
}

/// Records calls and tracks live GPU objects.
///
/// Useful for headless rendering checks and for asserting exact state
/// sequences in tests.
#[derive(Debug, Default)]
pub struct RecordingContext {
    commands: Vec<GlCommand>,
    next_id: u32,
    programs: BTreeSet<ProgramId>,
    buffers: BTreeSet<BufferId>,
    textures: BTreeSet<TextureId>,
    failing_shader: Option<String>,
}

impl RecordingContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `create_program` fail for the named shader.
    pub fn fail_shader(mut self, name: impl Into<String>) -> Self {
        self.failing_shader = Some(name.into());
        self
    }

    pub fn commands(&self) -> &[GlCommand] {
        &self.commands
    }

    /// Drains the recorded commands, keeping object tracking intact.
    pub fn take_commands(&mut self) -> Vec<GlCommand> {
        std::mem::take(&mut self.commands)
    }

    pub fn draw_calls(&self) -> usize {
        self.commands.iter().filter(|c| c.is_draw()).count()
    }

    pub fn live_programs(&self) -> usize {
        self.programs.len()
    }

    pub fn live_buffers(&self) -> usize {
        self.buffers.len()
    }

    pub fn live_textures(&self) -> usize {
        self.textures.len()
    }

    fn next(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }
}

impl GraphicsContext for RecordingContext {
    fn create_program(
        &mut self,
        name: &str,
        _vertex: &str,
        _fragment: &str,
    ) -> Result<ProgramId, RenderError> {
        if self.failing_shader.as_deref() == Some(name) {
            return Err(RenderError::ShaderCompile {
                name: name.to_string(),
                message: "compilation disabled for this shader".to_string(),
            });
        }
        let program = ProgramId(self.next());
        self.programs.insert(program);
        self.commands.push(GlCommand::CreateProgram {
            program,
            name: name.to_string(),
        });
        Ok(program)
    }

    fn delete_program(&mut self, program: ProgramId) {
        self.programs.remove(&program);
        self.commands.push(GlCommand::DeleteProgram(program));
    }

    fn create_buffer(&mut self, target: BufferTarget, data: &[u8]) -> BufferId {
        let buffer = BufferId(self.next());
        self.buffers.insert(buffer);
        self.commands.push(GlCommand::CreateBuffer {
            buffer,
            target,
            len: data.len(),
        });
        buffer
    }

    fn delete_buffer(&mut self, buffer: BufferId) {
        self.buffers.remove(&buffer);
        self.commands.push(GlCommand::DeleteBuffer(buffer));
    }

    fn create_texture(&mut self, width: u32, height: u32, _pixels: &[u8]) -> TextureId {
        let texture = TextureId(self.next());
        self.textures.insert(texture);
        self.commands.push(GlCommand::CreateTexture {
            texture,
            width,
            height,
        });
        texture
    }

    fn delete_texture(&mut self, texture: TextureId) {
        self.textures.remove(&texture);
        self.commands.push(GlCommand::DeleteTexture(texture));
    }

    fn bind_texture(&mut self, unit: u32, texture: TextureId) {
        self.commands.push(GlCommand::BindTexture { unit, texture });
    }

    fn set_uniform(&mut self, program: ProgramId, name: &'static str, value: Uniform) {
        self.commands.push(GlCommand::Uniform {
            program,
            name,
            value,
        });
    }

    fn apply(&mut self, change: StateChange) {
        self.commands.push(GlCommand::State(change));
    }

    fn clear(&mut self, clear: Clear) {
        self.commands.push(GlCommand::Clear(clear));
    }

    fn bind_vertex_buffer(&mut self, buffer: BufferId, layout: &VertexLayout) {
        self.commands.push(GlCommand::BindVertexBuffer {
            buffer,
            layout: *layout,
        });
    }

    fn bind_index_buffer(&mut self, buffer: BufferId) {
        self.commands.push(GlCommand::BindIndexBuffer(buffer));
    }

    fn draw_arrays(&mut self, primitive: Primitive, first: u32, count: u32) {
        self.commands.push(GlCommand::DrawArrays {
            primitive,
            first,
            count,
        });
    }

    fn draw_elements(&mut self, primitive: Primitive, offset: u32, count: u32) {
        self.commands.push(GlCommand::DrawElements {
            primitive,
            offset,
            count,
        });
    }
}

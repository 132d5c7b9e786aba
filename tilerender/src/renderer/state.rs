//! Change-tracked pipeline state.
//!
//! Every setter forwards to the [`GraphicsContext`] only when the value
//! differs from what was last applied. Unknown state (after
//! [`PipelineState::invalidate`]) always forwards.

use super::gl::{
    ColorMask, CompareFunc, GraphicsContext, ProgramId, StateChange, StencilFunc, StencilOp,
    StencilOps,
};

/// A tracked value with a default to reset to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StateValue<T> {
    current: Option<T>,
    default: T,
}

impl<T: Copy + PartialEq> StateValue<T> {
    pub const fn new(default: T) -> Self {
        Self {
            current: None,
            default,
        }
    }

    /// Last applied value, `None` if unknown.
    pub fn get(&self) -> Option<T> {
        self.current
    }

    pub fn default_value(&self) -> T {
        self.default
    }

    /// Records `value`, returning whether it changed.
    fn set(&mut self, value: T) -> bool {
        if self.current == Some(value) {
            false
        } else {
            self.current = Some(value);
            true
        }
    }

    fn invalidate(&mut self) {
        self.current = None;
    }
}

pub const DEFAULT_STENCIL_FUNC: StencilFunc = StencilFunc {
    func: CompareFunc::Always,
    reference: 0,
    mask: 0xFF,
};

pub const DEFAULT_STENCIL_OPS: StencilOps = StencilOps {
    fail: StencilOp::Keep,
    depth_fail: StencilOp::Keep,
    pass: StencilOp::Keep,
};

/// Fixed-function state the painter sets.
#[derive(Debug, Clone)]
pub struct PipelineState {
    program: StateValue<Option<ProgramId>>,
    stencil_test: StateValue<bool>,
    stencil_func: StateValue<StencilFunc>,
    stencil_op: StateValue<StencilOps>,
    stencil_mask: StateValue<u8>,
    depth_test: StateValue<bool>,
    depth_mask: StateValue<bool>,
    depth_func: StateValue<CompareFunc>,
    depth_range: StateValue<[f32; 2]>,
    blend: StateValue<bool>,
    color_mask: StateValue<ColorMask>,
    active_texture: StateValue<u32>,
    line_width: StateValue<f32>,
    applied: u64,
}

impl Default for PipelineState {
    fn default() -> Self {
        Self {
            program: StateValue::new(None),
            stencil_test: StateValue::new(false),
            stencil_func: StateValue::new(DEFAULT_STENCIL_FUNC),
            stencil_op: StateValue::new(DEFAULT_STENCIL_OPS),
            stencil_mask: StateValue::new(0xFF),
            depth_test: StateValue::new(false),
            depth_mask: StateValue::new(true),
            depth_func: StateValue::new(CompareFunc::LessEqual),
            depth_range: StateValue::new([0.0, 1.0]),
            blend: StateValue::new(true),
            color_mask: StateValue::new(ColorMask::ALL),
            active_texture: StateValue::new(0),
            line_width: StateValue::new(1.0),
            applied: 0,
        }
    }
}

fn update<T: Copy + PartialEq>(
    value: &mut StateValue<T>,
    next: T,
    applied: &mut u64,
    ctx: &mut dyn GraphicsContext,
    change: impl FnOnce(T) -> StateChange,
) {
    if value.set(next) {
        *applied += 1;
        ctx.apply(change(next));
    }
}

impl PipelineState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of state changes forwarded so far.
    pub fn applied(&self) -> u64 {
        self.applied
    }

    /// Forgets all tracked values, e.g. after another user touched the
    /// context.
    pub fn invalidate(&mut self) {
        self.program.invalidate();
        self.stencil_test.invalidate();
        self.stencil_func.invalidate();
        self.stencil_op.invalidate();
        self.stencil_mask.invalidate();
        self.depth_test.invalidate();
        self.depth_mask.invalidate();
        self.depth_func.invalidate();
        self.depth_range.invalidate();
        self.blend.invalidate();
        self.color_mask.invalidate();
        self.active_texture.invalidate();
        self.line_width.invalidate();
    }

    pub fn current_program(&self) -> Option<ProgramId> {
        self.program.get().flatten()
    }

    pub fn program(&mut self, ctx: &mut dyn GraphicsContext, program: ProgramId) {
        update(&mut self.program, Some(program), &mut self.applied, ctx, |_| {
            StateChange::Program(program)
        });
    }

    pub fn stencil_test(&mut self, ctx: &mut dyn GraphicsContext, enabled: bool) {
        update(&mut self.stencil_test, enabled, &mut self.applied, ctx, StateChange::StencilTest);
    }

    pub fn stencil_func(&mut self, ctx: &mut dyn GraphicsContext, func: StencilFunc) {
        update(&mut self.stencil_func, func, &mut self.applied, ctx, StateChange::StencilFunc);
    }

    pub fn stencil_op(&mut self, ctx: &mut dyn GraphicsContext, ops: StencilOps) {
        update(&mut self.stencil_op, ops, &mut self.applied, ctx, StateChange::StencilOp);
    }

    pub fn stencil_mask(&mut self, ctx: &mut dyn GraphicsContext, mask: u8) {
        update(&mut self.stencil_mask, mask, &mut self.applied, ctx, StateChange::StencilMask);
    }

    pub fn depth_test(&mut self, ctx: &mut dyn GraphicsContext, enabled: bool) {
        update(&mut self.depth_test, enabled, &mut self.applied, ctx, StateChange::DepthTest);
    }

    pub fn depth_mask(&mut self, ctx: &mut dyn GraphicsContext, enabled: bool) {
        update(&mut self.depth_mask, enabled, &mut self.applied, ctx, StateChange::DepthMask);
    }

    pub fn depth_func(&mut self, ctx: &mut dyn GraphicsContext, func: CompareFunc) {
        update(&mut self.depth_func, func, &mut self.applied, ctx, StateChange::DepthFunc);
    }

    /// Restores the default depth function (`LessEqual`).
    pub fn reset_depth_func(&mut self, ctx: &mut dyn GraphicsContext) {
        let default = self.depth_func.default_value();
        self.depth_func(ctx, default);
    }

    pub fn depth_range(&mut self, ctx: &mut dyn GraphicsContext, range: [f32; 2]) {
        update(&mut self.depth_range, range, &mut self.applied, ctx, StateChange::DepthRange);
    }

    pub fn blend(&mut self, ctx: &mut dyn GraphicsContext, enabled: bool) {
        update(&mut self.blend, enabled, &mut self.applied, ctx, StateChange::Blend);
    }

    pub fn color_mask(&mut self, ctx: &mut dyn GraphicsContext, mask: ColorMask) {
        update(&mut self.color_mask, mask, &mut self.applied, ctx, StateChange::ColorMask);
    }

    pub fn active_texture(&mut self, ctx: &mut dyn GraphicsContext, unit: u32) {
        update(&mut self.active_texture, unit, &mut self.applied, ctx, StateChange::ActiveTexture);
    }

    pub fn line_width(&mut self, ctx: &mut dyn GraphicsContext, width: f32) {
        update(&mut self.line_width, width, &mut self.applied, ctx, StateChange::LineWidth);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::{GlCommand, RecordingContext};

    fn state_changes(ctx: &RecordingContext) -> Vec<StateChange> {
        ctx.commands()
            .iter()
            .filter_map(|c| match c {
                GlCommand::State(change) => Some(*change),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_redundant_changes_are_suppressed() {
        let mut ctx = RecordingContext::new();
        let mut state = PipelineState::new();

        state.depth_test(&mut ctx, true);
        state.depth_test(&mut ctx, true);
        state.depth_test(&mut ctx, false);

        assert_eq!(
            state_changes(&ctx),
            vec![StateChange::DepthTest(true), StateChange::DepthTest(false)]
        );
        assert_eq!(state.applied(), 2);
    }

    #[test]
    fn test_unknown_state_always_forwards() {
        let mut ctx = RecordingContext::new();
        let mut state = PipelineState::new();

        // Matches the default, but the real value is unknown until set.
        state.stencil_test(&mut ctx, false);
        assert_eq!(state_changes(&ctx), vec![StateChange::StencilTest(false)]);

        state.invalidate();
        state.stencil_test(&mut ctx, false);
        assert_eq!(state_changes(&ctx).len(), 2);
    }

    #[test]
    fn test_reset_depth_func() {
        let mut ctx = RecordingContext::new();
        let mut state = PipelineState::new();

        state.depth_func(&mut ctx, CompareFunc::Always);
        state.reset_depth_func(&mut ctx);
        assert_eq!(
            state_changes(&ctx),
            vec![
                StateChange::DepthFunc(CompareFunc::Always),
                StateChange::DepthFunc(CompareFunc::LessEqual)
            ]
        );
    }

    #[test]
    fn test_program_tracking() {
        let mut ctx = RecordingContext::new();
        let mut state = PipelineState::new();
        assert_eq!(state.current_program(), None);

        state.program(&mut ctx, ProgramId(3));
        state.program(&mut ctx, ProgramId(3));
        assert_eq!(state.current_program(), Some(ProgramId(3)));
        assert_eq!(state.applied(), 1);
    }
}

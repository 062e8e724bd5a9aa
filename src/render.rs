use crate::{
    compile::{DrawOp, MoviePlan, ops_for_frame},
    core::{Canvas, FrameIndex},
    error::ChalklineResult,
};

#[derive(Clone, Debug)]
pub struct FrameRgba {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
    pub premultiplied: bool,
}

/// The seam between scene plans and a concrete drawing engine.
///
/// A backend receives one frame at a time: `begin_frame` clears the target,
/// `draw` executes ops in rendering order, `end_frame` reads pixels back.
/// Keeping the contract this small lets tests substitute a recording backend
/// and keeps the rest of the pipeline engine-agnostic.
pub trait RenderBackend {
    fn begin_frame(&mut self, canvas: Canvas) -> ChalklineResult<()>;
    fn draw(&mut self, op: &DrawOp) -> ChalklineResult<()>;
    fn end_frame(&mut self) -> ChalklineResult<FrameRgba>;
}

/// Resolve and draw a single frame of `plan` through `backend`.
pub fn render_frame(
    plan: &MoviePlan,
    frame: FrameIndex,
    backend: &mut dyn RenderBackend,
) -> ChalklineResult<FrameRgba> {
    backend.begin_frame(plan.canvas)?;
    for op in ops_for_frame(plan, frame) {
        backend.draw(&op)?;
    }
    backend.end_frame()
}

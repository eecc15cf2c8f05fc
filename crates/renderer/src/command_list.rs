//! Recorded draw commands and their resolution into self-contained draw calls.

use crate::commands::{
    ClearOp, DrawCommands, Primitive, ProgramId, RenderTarget, StencilState, TargetId, Uniform,
    UniformBlock, UniformValue, Viewport,
};
use crate::error::RenderError;
use crate::framebuffer::FrameBufferDesc;
use crate::shaders::ShaderSource;
use std::collections::HashMap;

/// One recorded [`DrawCommands`] call.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    CompileProgram(ProgramId),
    InitFrameBuffer { target: TargetId, desc: FrameBufferDesc },
    BindTarget(RenderTarget),
    SetViewport(Viewport),
    Clear(ClearOp),
    BindProgram(ProgramId),
    SetUniform(Uniform, UniformValue),
    BindTexture { slot: u32, target: TargetId },
    SetStencil(StencilState),
    BindVertices(Vec<f32>),
    DrawArrays { primitive: Primitive, first: u32, count: u32 },
    DrawIndexed { primitive: Primitive, indices: Vec<u16> },
}

/// Which vertices a draw consumes.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawRange {
    Arrays { first: u32, count: u32 },
    Indexed(Vec<u16>),
}

/// A draw with every piece of state it depends on captured.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawCall {
    pub target: RenderTarget,
    pub viewport: Option<Viewport>,
    pub program: ProgramId,
    pub uniforms: UniformBlock,
    pub stencil: StencilState,
    pub texture: Option<TargetId>,
    /// Index into [`Replay::streams`].
    pub stream: usize,
    pub primitive: Primitive,
    pub range: DrawRange,
}

impl DrawCall {
    pub fn uniform(&self, uniform: Uniform) -> &[f32] {
        self.uniforms.get(uniform)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FrameEvent {
    InitFrameBuffer { target: TargetId, desc: FrameBufferDesc },
    Clear { target: RenderTarget, op: ClearOp },
    Draw(DrawCall),
}

/// A command list resolved into events, in submission order.
#[derive(Debug)]
pub struct Replay<'a> {
    pub events: Vec<FrameEvent>,
    pub streams: Vec<&'a [f32]>,
}

impl Replay<'_> {
    pub fn draws(&self) -> impl Iterator<Item = &DrawCall> {
        self.events.iter().filter_map(|e| match e {
            FrameEvent::Draw(draw) => Some(draw),
            _ => None,
        })
    }
}

/// Records [`DrawCommands`] calls for later inspection or replay.
#[derive(Debug)]
pub struct CommandList {
    commands: Vec<Command>,
    compiler_available: bool,
    failing_programs: Vec<ProgramId>,
}

impl Default for CommandList {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandList {
    pub fn new() -> Self {
        Self {
            commands: Vec::new(),
            compiler_available: true,
            failing_programs: Vec::new(),
        }
    }

    /// A recorder that reports no shader compiler.
    pub fn without_shader_compiler() -> Self {
        Self { compiler_available: false, ..Self::new() }
    }

    /// A recorder whose `compile_program` fails for `program`.
    pub fn failing_program(mut self, program: ProgramId) -> Self {
        self.failing_programs.push(program);
        self
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn clear_commands(&mut self) {
        self.commands.clear();
    }

    /// Resolve commands into events, tracking bound state the way a GPU driver would.
    ///
    /// Draws issued before any program or vertex stream is bound are dropped
    /// with a warning.
    pub fn replay(&self) -> Replay<'_> {
        let mut events = Vec::new();
        let mut streams: Vec<&[f32]> = Vec::new();

        let mut target = RenderTarget::Surface;
        let mut viewport = None;
        let mut program = None;
        let mut uniforms: HashMap<ProgramId, UniformBlock> = HashMap::new();
        let mut stencil = StencilState::DISABLED;
        let mut texture = None;
        let mut stream = None;

        for command in &self.commands {
            match command {
                Command::CompileProgram(_) => {}
                Command::InitFrameBuffer { target, desc } => {
                    events.push(FrameEvent::InitFrameBuffer { target: *target, desc: *desc });
                }
                Command::BindTarget(t) => {
                    target = *t;
                    viewport = None;
                }
                Command::SetViewport(v) => viewport = Some(*v),
                Command::Clear(op) => events.push(FrameEvent::Clear { target, op: *op }),
                Command::BindProgram(p) => program = Some(*p),
                Command::SetUniform(uniform, value) => match program {
                    // Uniforms are per-program state, as with GL program objects.
                    Some(p) => uniforms.entry(p).or_default().set(*uniform, *value),
                    None => log::warn!("Uniform {:?} set with no program bound", uniform),
                },
                Command::BindTexture { slot, target } => {
                    if *slot == 0 {
                        texture = Some(*target);
                    } else {
                        log::warn!("Texture slot {} is not supported", slot);
                    }
                }
                Command::SetStencil(state) => stencil = *state,
                Command::BindVertices(data) => {
                    streams.push(data.as_slice());
                    stream = Some(streams.len() - 1);
                }
                Command::DrawArrays { primitive, first, count } => {
                    push_draw(
                        &mut events,
                        (target, viewport, program, stream, stencil, texture),
                        &uniforms,
                        *primitive,
                        DrawRange::Arrays { first: *first, count: *count },
                    );
                }
                Command::DrawIndexed { primitive, indices } => {
                    push_draw(
                        &mut events,
                        (target, viewport, program, stream, stencil, texture),
                        &uniforms,
                        *primitive,
                        DrawRange::Indexed(indices.clone()),
                    );
                }
            }
        }

        Replay { events, streams }
    }
}

type BoundState = (
    RenderTarget,
    Option<Viewport>,
    Option<ProgramId>,
    Option<usize>,
    StencilState,
    Option<TargetId>,
);

fn push_draw(
    events: &mut Vec<FrameEvent>,
    (target, viewport, program, stream, stencil, texture): BoundState,
    uniforms: &HashMap<ProgramId, UniformBlock>,
    primitive: Primitive,
    range: DrawRange,
) {
    let (Some(program), Some(stream)) = (program, stream) else {
        log::warn!("Dropping {:?} draw: no program or vertex stream bound", primitive);
        return;
    };
    events.push(FrameEvent::Draw(DrawCall {
        target,
        viewport,
        program,
        uniforms: uniforms.get(&program).copied().unwrap_or_default(),
        stencil,
        texture,
        stream,
        primitive,
        range,
    }));
}

impl DrawCommands for CommandList {
    fn shader_compiler_available(&self) -> bool {
        self.compiler_available
    }

    fn compile_program(&mut self, program: ProgramId, source: &ShaderSource) -> Result<(), RenderError> {
        if !self.compiler_available {
            return Err(RenderError::ShaderCompilerUnavailable);
        }
        if self.failing_programs.contains(&program) || source.is_empty() {
            return Err(RenderError::ShaderCompilation {
                program,
                message: "rejected by recorder".to_string(),
            });
        }
        self.commands.push(Command::CompileProgram(program));
        Ok(())
    }

    fn init_frame_buffer(&mut self, target: TargetId, desc: FrameBufferDesc) {
        self.commands.push(Command::InitFrameBuffer { target, desc });
    }

    fn bind_target(&mut self, target: RenderTarget) {
        self.commands.push(Command::BindTarget(target));
    }

    fn set_viewport(&mut self, viewport: Viewport) {
        self.commands.push(Command::SetViewport(viewport));
    }

    fn clear(&mut self, op: ClearOp) {
        self.commands.push(Command::Clear(op));
    }

    fn bind_program(&mut self, program: ProgramId) {
        self.commands.push(Command::BindProgram(program));
    }

    fn set_uniform(&mut self, uniform: Uniform, value: UniformValue) {
        self.commands.push(Command::SetUniform(uniform, value));
    }

    fn bind_texture(&mut self, slot: u32, target: TargetId) {
        self.commands.push(Command::BindTexture { slot, target });
    }

    fn set_stencil_state(&mut self, state: StencilState) {
        self.commands.push(Command::SetStencil(state));
    }

    fn bind_vertices(&mut self, vertices: &[f32]) {
        self.commands.push(Command::BindVertices(vertices.to_vec()));
    }

    fn draw_arrays(&mut self, primitive: Primitive, first: u32, count: u32) {
        self.commands.push(Command::DrawArrays { primitive, first, count });
    }

    fn draw_indexed(&mut self, primitive: Primitive, indices: &[u16]) {
        self.commands.push(Command::DrawIndexed { primitive, indices: indices.to_vec() });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replay_captures_state_per_draw() {
        let mut cmds = CommandList::new();
        cmds.bind_target(RenderTarget::Offscreen(TargetId(0)));
        cmds.set_viewport(Viewport::full(10, 10));
        cmds.bind_program(ProgramId::Plane);
        cmds.set_uniform(Uniform::Color, UniformValue::Vec4([1.0, 0.0, 0.0, 1.0]));
        cmds.bind_vertices(&[0.0; 9]);
        cmds.set_stencil_state(StencilState::replace(1));
        cmds.draw_arrays(Primitive::TriangleFan, 0, 3);
        cmds.set_uniform(Uniform::Color, UniformValue::Vec4([0.0, 0.0, 0.0, 1.0]));
        cmds.draw_indexed(Primitive::Lines, &[0, 1, 1, 2]);

        let replay = cmds.replay();
        let draws: Vec<_> = replay.draws().collect();
        assert_eq!(draws.len(), 2);
        assert_eq!(draws[0].uniform(Uniform::Color), &[1.0, 0.0, 0.0, 1.0]);
        assert_eq!(draws[1].uniform(Uniform::Color), &[0.0, 0.0, 0.0, 1.0]);
        assert_eq!(draws[0].stencil, StencilState::replace(1));
        assert_eq!(draws[1].range, DrawRange::Indexed(vec![0, 1, 1, 2]));
        assert_eq!(draws[0].viewport, Some(Viewport::full(10, 10)));
        assert_eq!(replay.streams[draws[0].stream].len(), 9);
    }

    #[test]
    fn uniforms_persist_per_program() {
        let mut cmds = CommandList::new();
        cmds.bind_vertices(&[0.0; 4]);
        cmds.bind_program(ProgramId::Copy);
        cmds.set_uniform(Uniform::Brightness, UniformValue::Float(0.5));
        cmds.bind_program(ProgramId::Fill);
        cmds.draw_arrays(Primitive::TriangleStrip, 0, 4);
        cmds.bind_program(ProgramId::Copy);
        cmds.draw_arrays(Primitive::TriangleStrip, 0, 4);

        let replay = cmds.replay();
        let draws: Vec<_> = replay.draws().collect();
        assert_eq!(draws[0].uniform(Uniform::Brightness), &[1.0]);
        assert_eq!(draws[1].uniform(Uniform::Brightness), &[0.5]);
    }

    #[test]
    fn draw_without_program_is_dropped() {
        let mut cmds = CommandList::new();
        cmds.bind_vertices(&[0.0; 4]);
        cmds.draw_arrays(Primitive::Points, 0, 1);
        assert_eq!(cmds.replay().draws().count(), 0);
    }

    #[test]
    fn binding_a_target_resets_viewport() {
        let mut cmds = CommandList::new();
        cmds.set_viewport(Viewport::full(5, 5));
        cmds.bind_target(RenderTarget::Surface);
        cmds.clear(ClearOp::color([0.0; 4]));
        cmds.bind_program(ProgramId::Fill);
        cmds.bind_vertices(&[0.0; 20]);
        cmds.draw_arrays(Primitive::TriangleStrip, 0, 4);
        let replay = cmds.replay();
        assert!(matches!(
            replay.events[0],
            FrameEvent::Clear { target: RenderTarget::Surface, .. }
        ));
        assert_eq!(replay.draws().next().map(|d| d.viewport), Some(None));
    }

    #[test]
    fn compile_respects_configured_failures() {
        let source = ShaderSource::new("vs", "fs");
        let mut ok = CommandList::new();
        assert!(ok.compile_program(ProgramId::Fill, &source).is_ok());

        let mut failing = CommandList::new().failing_program(ProgramId::Cloud);
        assert!(matches!(
            failing.compile_program(ProgramId::Cloud, &source),
            Err(RenderError::ShaderCompilation { program: ProgramId::Cloud, .. })
        ));

        let mut none = CommandList::without_shader_compiler();
        assert!(!none.shader_compiler_available());
        assert!(matches!(
            none.compile_program(ProgramId::Fill, &source),
            Err(RenderError::ShaderCompilerUnavailable)
        ));
    }
}

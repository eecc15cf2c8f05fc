//! Immediate-mode draw-command interface.
//!
//! Scene layers talk to the GPU only through [`DrawCommands`]. The interface
//! mirrors a small slice of classic immediate-mode graphics state: a bound
//! program, a uniform block, a stencil state, one sampled texture and one
//! interleaved vertex stream. Implementations either record the calls
//! ([`crate::CommandList`]) or replay them on a real device
//! ([`crate::WgpuBackend`]).

use crate::error::RenderError;
use crate::shaders::ShaderSource;
use bytemuck::{Pod, Zeroable};

/// Logical shader programs used by the scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ProgramId {
    /// Per-vertex colored full-screen gradient.
    Fill,
    /// Offscreen-to-surface blit with brightness.
    Copy,
    /// Cloud point sprites.
    Cloud,
    /// Wave bands sampling the wave texture.
    Wave,
    /// Disk sprites that synthesize the wave texture.
    WavePoint,
    /// Paper plane hull and outline.
    Plane,
}

impl ProgramId {
    pub const ALL: [ProgramId; 6] = [
        ProgramId::Fill,
        ProgramId::Copy,
        ProgramId::Cloud,
        ProgramId::Wave,
        ProgramId::WavePoint,
        ProgramId::Plane,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ProgramId::Fill => "fill",
            ProgramId::Copy => "copy",
            ProgramId::Cloud => "cloud",
            ProgramId::Wave => "wave",
            ProgramId::WavePoint => "wave_point",
            ProgramId::Plane => "plane",
        }
    }

    /// Floats per vertex in the interleaved stream this program consumes.
    pub fn vertex_stride(self) -> usize {
        match self {
            ProgramId::Fill => 5,
            ProgramId::Copy | ProgramId::Wave | ProgramId::WavePoint => 2,
            ProgramId::Cloud => 5,
            ProgramId::Plane => 3,
        }
    }

    /// Programs that sample the texture bound to slot 0.
    pub fn samples_texture(self) -> bool {
        matches!(self, ProgramId::Copy | ProgramId::Wave)
    }

    /// Programs whose vertices are expanded into point sprites.
    pub fn draws_points(self) -> bool {
        matches!(self, ProgramId::Cloud | ProgramId::WavePoint)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Primitive {
    Points,
    Lines,
    TriangleStrip,
    TriangleFan,
}

/// Handle of an offscreen frame buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TargetId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RenderTarget {
    /// The visible surface.
    Surface,
    Offscreen(TargetId),
}

/// Pixel rectangle with a bottom-left origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Viewport {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub fn full(width: u32, height: u32) -> Self {
        Self { x: 0, y: 0, width, height }
    }
}

/// Which aspects of the bound target to clear, and to what.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ClearOp {
    pub color: Option<[f32; 4]>,
    pub depth: Option<f32>,
    pub stencil: Option<u32>,
}

impl ClearOp {
    pub fn color(color: [f32; 4]) -> Self {
        Self { color: Some(color), ..Default::default() }
    }

    /// Depth to 1.0 and stencil to 0, color untouched.
    pub fn depth_stencil() -> Self {
        Self { color: None, depth: Some(1.0), stencil: Some(0) }
    }
}

/// Named slots in the shared uniform block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Uniform {
    /// Projection or model-view-projection matrix.
    Matrix,
    Color,
    /// Horizontal world offset added to every vertex.
    XOffset,
    /// Pixels added to every point sprite size.
    PointSizeOffset,
    /// Point size for programs without a per-vertex size.
    PointSize,
    Brightness,
    /// Texture-space offset of sampled geometry.
    PositionOffset,
    /// Texture repeats across the drawn quad.
    TextureSize,
    /// How strongly the per-point color weight shades the output (0..1).
    Shade,
}

impl Uniform {
    /// Float offset and length inside [`UniformBlock::data`].
    pub fn slot(self) -> (usize, usize) {
        match self {
            Uniform::Matrix => (0, 16),
            Uniform::Color => (16, 4),
            Uniform::XOffset => (20, 1),
            Uniform::PointSizeOffset => (21, 1),
            Uniform::PointSize => (22, 1),
            Uniform::Brightness => (23, 1),
            Uniform::PositionOffset => (24, 2),
            Uniform::TextureSize => (26, 2),
            Uniform::Shade => (28, 1),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue {
    Float(f32),
    Vec2([f32; 2]),
    Vec4([f32; 4]),
    Mat4([f32; 16]),
}

impl UniformValue {
    pub fn as_slice(&self) -> &[f32] {
        match self {
            UniformValue::Float(v) => std::slice::from_ref(v),
            UniformValue::Vec2(v) => v,
            UniformValue::Vec4(v) => v,
            UniformValue::Mat4(v) => v,
        }
    }
}

/// CPU copy of the uniform block every program reads (must match `Uniforms` in the WGSL sources).
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct UniformBlock {
    pub data: [f32; 32],
}

impl Default for UniformBlock {
    fn default() -> Self {
        let mut block = Self::zeroed();
        block.set(Uniform::Matrix, UniformValue::Mat4(glam::Mat4::IDENTITY.to_cols_array()));
        block.set(Uniform::Color, UniformValue::Vec4([1.0; 4]));
        block.set(Uniform::Brightness, UniformValue::Float(1.0));
        block.set(Uniform::TextureSize, UniformValue::Vec2([1.0, 1.0]));
        block
    }
}

impl UniformBlock {
    /// Offset of the viewport size the backend fills in before each draw.
    pub const VIEWPORT_SLOT: usize = 30;

    pub fn set(&mut self, uniform: Uniform, value: UniformValue) {
        let (offset, len) = uniform.slot();
        let values = value.as_slice();
        debug_assert_eq!(values.len(), len, "uniform {:?} has {} components", uniform, len);
        let n = values.len().min(len);
        self.data[offset..offset + n].copy_from_slice(&values[..n]);
    }

    pub fn get(&self, uniform: Uniform) -> &[f32] {
        let (offset, len) = uniform.slot();
        &self.data[offset..offset + len]
    }

    pub fn set_viewport_size(&mut self, width: u32, height: u32) {
        self.data[Self::VIEWPORT_SLOT] = width as f32;
        self.data[Self::VIEWPORT_SLOT + 1] = height as f32;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StencilFunc {
    Always,
    Equal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StencilOp {
    Keep,
    Replace,
    IncrementClamp,
}

impl StencilOp {
    fn apply(self, stored: u8, reference: u32) -> u8 {
        match self {
            StencilOp::Keep => stored,
            StencilOp::Replace => reference as u8,
            StencilOp::IncrementClamp => stored.saturating_add(1),
        }
    }
}

/// Stencil test and update, GL style: `func(reference, stored)` gates the fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StencilState {
    pub enabled: bool,
    pub func: StencilFunc,
    pub reference: u32,
    pub fail: StencilOp,
    pub depth_fail: StencilOp,
    pub pass: StencilOp,
}

impl Default for StencilState {
    fn default() -> Self {
        Self::DISABLED
    }
}

impl StencilState {
    pub const DISABLED: StencilState = StencilState {
        enabled: false,
        func: StencilFunc::Always,
        reference: 0,
        fail: StencilOp::Keep,
        depth_fail: StencilOp::Keep,
        pass: StencilOp::Keep,
    };

    /// Always pass and write `reference` into every covered pixel.
    pub const fn replace(reference: u32) -> Self {
        StencilState {
            enabled: true,
            func: StencilFunc::Always,
            reference,
            fail: StencilOp::Replace,
            depth_fail: StencilOp::Replace,
            pass: StencilOp::Replace,
        }
    }

    /// Pass only where the mask still equals `reference`, then increment it.
    pub const fn increment_where(reference: u32) -> Self {
        StencilState {
            enabled: true,
            func: StencilFunc::Equal,
            reference,
            fail: StencilOp::Keep,
            depth_fail: StencilOp::IncrementClamp,
            pass: StencilOp::IncrementClamp,
        }
    }

    /// Whether a fragment over a pixel holding `stored` is written.
    pub fn passes(&self, stored: u8) -> bool {
        if !self.enabled {
            return true;
        }
        match self.func {
            StencilFunc::Always => true,
            StencilFunc::Equal => stored as u32 == self.reference,
        }
    }

    /// Stencil value after a fragment is tested against `stored` (no depth test in play).
    pub fn update(&self, stored: u8) -> u8 {
        if !self.enabled {
            return stored;
        }
        if self.passes(stored) {
            self.pass.apply(stored, self.reference)
        } else {
            self.fail.apply(stored, self.reference)
        }
    }
}

/// Minimal immediate-mode graphics interface the scene layers draw through.
pub trait DrawCommands {
    /// Whether programs can be compiled on this device at all.
    fn shader_compiler_available(&self) -> bool;

    /// Compile and register a program. Called once per program at surface creation.
    fn compile_program(&mut self, program: ProgramId, source: &ShaderSource) -> Result<(), RenderError>;

    /// Allocate (or reallocate) the storage behind an offscreen target.
    fn init_frame_buffer(&mut self, target: TargetId, desc: crate::FrameBufferDesc);

    fn bind_target(&mut self, target: RenderTarget);

    fn set_viewport(&mut self, viewport: Viewport);

    fn clear(&mut self, op: ClearOp);

    fn bind_program(&mut self, program: ProgramId);

    fn set_uniform(&mut self, uniform: Uniform, value: UniformValue);

    /// Sample the color attachment of `target` through texture `slot`.
    fn bind_texture(&mut self, slot: u32, target: TargetId);

    fn set_stencil_state(&mut self, state: StencilState);

    /// Bind an interleaved vertex stream laid out for the bound program.
    fn bind_vertices(&mut self, vertices: &[f32]);

    /// Draw `count` vertices of the bound stream starting at `first`.
    fn draw_arrays(&mut self, primitive: Primitive, first: u32, count: u32);

    /// Draw vertices of the bound stream selected by `indices`.
    fn draw_indexed(&mut self, primitive: Primitive, indices: &[u16]);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_slots_do_not_overlap() {
        let mut used = [false; 32];
        let all = [
            Uniform::Matrix,
            Uniform::Color,
            Uniform::XOffset,
            Uniform::PointSizeOffset,
            Uniform::PointSize,
            Uniform::Brightness,
            Uniform::PositionOffset,
            Uniform::TextureSize,
            Uniform::Shade,
        ];
        for uniform in all {
            let (offset, len) = uniform.slot();
            for slot in &mut used[offset..offset + len] {
                assert!(!*slot, "{:?} overlaps another uniform", uniform);
                *slot = true;
            }
        }
        assert!(!used[UniformBlock::VIEWPORT_SLOT]);
        assert!(!used[UniformBlock::VIEWPORT_SLOT + 1]);
    }

    #[test]
    fn uniform_block_set_and_get() {
        let mut block = UniformBlock::default();
        block.set(Uniform::PositionOffset, UniformValue::Vec2([0.25, -0.5]));
        block.set(Uniform::XOffset, UniformValue::Float(3.0));
        assert_eq!(block.get(Uniform::PositionOffset), &[0.25, -0.5]);
        assert_eq!(block.get(Uniform::XOffset), &[3.0]);
        assert_eq!(block.get(Uniform::Brightness), &[1.0]);
        assert_eq!(std::mem::size_of::<UniformBlock>(), 128);
    }

    #[test]
    fn increment_where_colors_each_pixel_once() {
        let state = StencilState::increment_where(0);
        let mut stored = 0u8;
        assert!(state.passes(stored));
        stored = state.update(stored);
        assert_eq!(stored, 1);
        assert!(!state.passes(stored));
        assert_eq!(state.update(stored), 1);
    }

    #[test]
    fn replace_marks_pixels_for_later_layers() {
        let mark = StencilState::replace(1);
        let stored = mark.update(0);
        assert_eq!(stored, 1);
        assert!(!StencilState::increment_where(0).passes(stored));
        assert!(StencilState::DISABLED.passes(stored));
        assert_eq!(StencilState::DISABLED.update(stored), stored);
    }
}

//! Two parallax wave bands along the bottom of the scene.
//!
//! A small disk texture is synthesized once per resize. Each frame it is
//! tiled across the bottom quarter of the target twice, with sinusoidal
//! offsets, to form a back and a front band.

use engine_core::{periodic_sin, ColorScheme};
use renderer::{
    ClearOp, DrawCommands, FrameBuffer, FrameBufferDesc, Primitive, ProgramId, ScreenVertex, StencilState,
    TargetId, TextureWrap, Uniform, UniformValue, Viewport,
};

use crate::color_uniform;

/// Texture side is `min(width, height) / WAVE_SIZE_DIVISOR`.
const WAVE_SIZE_DIVISOR: u32 = 5;
/// Outer disk diameter exceeds the texture by this many pixels.
const DISK_BORDER: f32 = 3.0;
const OUTLINE_BRIGHTNESS: f32 = 0.6;
const FILL_BRIGHTNESS: f32 = 0.0;
/// Cleared texels read as "no wave".
const EMPTY_TEXEL: [f32; 4] = [1.0, 0.0, 0.0, 1.0];

/// Period (ms), amplitude and bias of one wave offset component.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WaveMotion {
    pub period_ms: f64,
    pub amplitude: f32,
    pub bias: f32,
}

impl WaveMotion {
    pub fn at(&self, elapsed_ms: f64) -> f32 {
        periodic_sin(elapsed_ms, self.period_ms, self.amplitude) + self.bias
    }
}

/// Phase/frequency pair of one band.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WaveLayer {
    pub x: WaveMotion,
    pub y: WaveMotion,
}

impl WaveLayer {
    /// Texture-space offset at `elapsed_ms`, shifted by the scroll offset.
    pub fn offset(&self, elapsed_ms: f64, scroll_offset: f32) -> [f32; 2] {
        [self.x.at(elapsed_ms) + scroll_offset, self.y.at(elapsed_ms)]
    }
}

pub const BACK_LAYER: WaveLayer = WaveLayer {
    x: WaveMotion { period_ms: 2000.0, amplitude: 0.2, bias: 0.2 },
    y: WaveMotion { period_ms: 5000.0, amplitude: 0.2, bias: -0.2 },
};

pub const FRONT_LAYER: WaveLayer = WaveLayer {
    x: WaveMotion { period_ms: 2345.0, amplitude: 0.2, bias: 0.2 },
    y: WaveMotion { period_ms: 5234.0, amplitude: 0.2, bias: -0.4 },
};

pub struct WaveTextureGenerator {
    texture: FrameBuffer,
    target_width: u32,
    target_height: u32,
    wave_size: u32,
}

impl WaveTextureGenerator {
    pub fn new(texture: TargetId) -> Self {
        Self {
            texture: FrameBuffer::new(texture),
            target_width: 0,
            target_height: 0,
            wave_size: 0,
        }
    }

    /// Re-synthesize the disk texture for a target of `width` x `height`.
    pub fn on_resize(&mut self, cmds: &mut impl DrawCommands, width: u32, height: u32) {
        self.target_width = width;
        self.target_height = height;
        self.wave_size = (width.min(height) / WAVE_SIZE_DIVISOR).max(1);

        let desc = FrameBufferDesc::new(self.wave_size, self.wave_size)
            .with_stencil()
            .with_wrap(TextureWrap::RepeatHorizontal);
        self.texture.init(cmds, desc);
        log::debug!("Wave texture {}px for {}x{}", self.wave_size, width, height);

        self.texture.bind(cmds);
        cmds.clear(ClearOp {
            stencil: Some(0),
            ..ClearOp::color(EMPTY_TEXEL)
        });

        // One disk centered on the bottom edge; only its upper half lands in the texture.
        cmds.bind_program(ProgramId::WavePoint);
        cmds.bind_vertices(&[0.0, -1.0]);
        cmds.set_stencil_state(StencilState::DISABLED);
        cmds.set_uniform(Uniform::Brightness, UniformValue::Float(OUTLINE_BRIGHTNESS));
        cmds.set_uniform(Uniform::PointSize, UniformValue::Float(self.wave_size as f32 + DISK_BORDER));
        cmds.draw_arrays(Primitive::Points, 0, 1);

        cmds.set_stencil_state(StencilState::replace(1));
        cmds.set_uniform(Uniform::Brightness, UniformValue::Float(FILL_BRIGHTNESS));
        cmds.set_uniform(Uniform::PointSize, UniformValue::Float(self.wave_size as f32));
        cmds.draw_arrays(Primitive::Points, 0, 1);
        cmds.set_stencil_state(StencilState::DISABLED);
    }

    /// Draw the back band, then the front band, into the currently bound target.
    pub fn draw(&self, cmds: &mut impl DrawCommands, elapsed_ms: f64, scroll_offset: f32, colors: &ColorScheme) {
        if !self.texture.is_initialized() {
            return;
        }
        let band_height = self.target_height / 4;
        let wave_size = self.wave_size as f32;

        cmds.set_viewport(Viewport::full(self.target_width, band_height));
        cmds.set_stencil_state(StencilState::DISABLED);
        cmds.bind_program(ProgramId::Wave);
        self.texture.bind_texture(cmds, 0);
        cmds.bind_vertices(bytemuck::cast_slice(&ScreenVertex::QUAD));
        cmds.set_uniform(
            Uniform::TextureSize,
            UniformValue::Vec2([self.target_width as f32 / wave_size, band_height as f32 / wave_size]),
        );

        for (layer, color) in [(BACK_LAYER, colors.wave_back), (FRONT_LAYER, colors.wave_front)] {
            cmds.set_uniform(Uniform::PositionOffset, UniformValue::Vec2(layer.offset(elapsed_ms, scroll_offset)));
            cmds.set_uniform(Uniform::Color, color_uniform(color));
            cmds.draw_arrays(Primitive::TriangleStrip, 0, 4);
        }

        cmds.set_viewport(Viewport::full(self.target_width, self.target_height));
    }

    pub fn wave_size(&self) -> u32 {
        self.wave_size
    }

    pub fn texture(&self) -> &FrameBuffer {
        &self.texture
    }
}

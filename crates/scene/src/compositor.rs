//! Frame orchestration: offscreen scene, layer order, and the final blit.

use engine_core::SceneConfig;
use renderer::{
    ClearOp, DrawCommands, FrameBuffer, FrameBufferDesc, Primitive, ProgramId, RenderError, RenderTarget,
    ScreenVertex, ShaderLibrary, StencilState, TargetId, Uniform, UniformValue, Viewport,
};

use crate::clouds::CloudField;
use crate::plane::PlaneAnimator;
use crate::waves::WaveTextureGenerator;

const SCENE_TARGET: TargetId = TargetId(0);
const WAVE_TARGET: TargetId = TargetId(1);

/// Lifecycle of the compositor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompositorState {
    /// No surface yet.
    Uninitialized,
    /// Programs could not be compiled; every frame is skipped.
    Unavailable,
    /// Programs compiled, surface size unknown.
    SurfaceReady,
    /// Size known, layout pending.
    Sized,
    Rendering,
}

/// Receives the one-time "rendering unavailable" notice.
pub trait Notifier {
    fn rendering_unavailable(&mut self, error: &RenderError);
}

impl<F: FnMut(&RenderError)> Notifier for F {
    fn rendering_unavailable(&mut self, error: &RenderError) {
        self(error)
    }
}

pub struct SceneCompositor {
    state: CompositorState,
    config: SceneConfig,
    scene: FrameBuffer,
    waves: WaveTextureGenerator,
    clouds: CloudField,
    plane: PlaneAnimator,
    surface_size: Option<(u32, u32)>,
    layout_dirty: bool,
    scroll_fraction: f32,
    notifier: Option<Box<dyn Notifier>>,
    notified: bool,
}

impl SceneCompositor {
    pub fn new(config: SceneConfig) -> Self {
        Self::with_clouds(config, CloudField::default())
    }

    /// Compositor driving a caller-supplied cloud field (seeded in tests).
    pub fn with_clouds(config: SceneConfig, clouds: CloudField) -> Self {
        Self {
            state: CompositorState::Uninitialized,
            config,
            scene: FrameBuffer::new(SCENE_TARGET),
            waves: WaveTextureGenerator::new(WAVE_TARGET),
            clouds,
            plane: PlaneAnimator::new(),
            surface_size: None,
            layout_dirty: false,
            scroll_fraction: 0.0,
            notifier: None,
            notified: false,
        }
    }

    pub fn with_notifier(mut self, notifier: impl Notifier + 'static) -> Self {
        self.notifier = Some(Box::new(notifier));
        self
    }

    /// Compile every program for a fresh surface.
    ///
    /// On failure the compositor becomes `Unavailable`, the notifier is told
    /// once, and the error is returned to the host.
    pub fn surface_created(&mut self, cmds: &mut impl DrawCommands, library: &ShaderLibrary) -> Result<(), RenderError> {
        match compile_all(cmds, library) {
            Ok(()) => {
                log::info!("Compiled {} shader programs", library.len());
                // GPU storage does not survive a new surface.
                self.scene = FrameBuffer::new(SCENE_TARGET);
                self.waves = WaveTextureGenerator::new(WAVE_TARGET);
                match self.surface_size {
                    Some(_) => {
                        self.state = CompositorState::Sized;
                        self.layout_dirty = true;
                    }
                    None => self.state = CompositorState::SurfaceReady,
                }
                Ok(())
            }
            Err(error) => {
                log::error!("Rendering unavailable: {}", error);
                self.state = CompositorState::Unavailable;
                if !self.notified {
                    self.notified = true;
                    if let Some(notifier) = self.notifier.as_mut() {
                        notifier.rendering_unavailable(&error);
                    }
                }
                Err(error)
            }
        }
    }

    /// Record new surface dimensions; the layout is rebuilt at the next frame.
    pub fn resize(&mut self, width: u32, height: u32) {
        log::info!("Surface resized to {}x{}", width, height);
        self.surface_size = Some((width.max(1), height.max(1)));
        self.layout_dirty = true;
        if matches!(self.state, CompositorState::SurfaceReady | CompositorState::Rendering) {
            self.state = CompositorState::Sized;
        }
    }

    /// Replace quality, brightness and colors; takes effect at the next frame.
    pub fn set_config(&mut self, config: SceneConfig) {
        self.config = config;
        self.layout_dirty = true;
        if self.state == CompositorState::Rendering {
            self.state = CompositorState::Sized;
        }
    }

    /// Horizontal scroll position in `[0, 1]`. Last write wins.
    pub fn set_scroll_fraction(&mut self, fraction: f32) {
        self.scroll_fraction = if fraction.is_nan() { 0.0 } else { fraction.clamp(0.0, 1.0) };
    }

    /// Scroll position in world units: fraction times the near-plane width.
    pub fn scroll_offset(&self) -> f32 {
        self.scroll_fraction * self.clouds.scroll_range()
    }

    /// Draw one frame. Does nothing until the surface is ready and sized.
    pub fn render_frame(&mut self, cmds: &mut impl DrawCommands, elapsed_seconds: f64) {
        if !matches!(self.state, CompositorState::Sized | CompositorState::Rendering) {
            return;
        }
        let Some((surface_width, surface_height)) = self.surface_size else {
            return;
        };
        if self.layout_dirty {
            self.layout(cmds, surface_width, surface_height);
        }

        let elapsed_ms = elapsed_seconds * 1000.0;
        let scroll_offset = self.scroll_offset();
        let colors = self.config.colors;
        self.clouds.set_scroll_offset(scroll_offset);
        self.clouds.update(elapsed_seconds);

        self.scene.bind(cmds);
        cmds.clear(ClearOp::depth_stencil());
        cmds.set_stencil_state(StencilState::DISABLED);

        cmds.bind_program(ProgramId::Fill);
        cmds.bind_vertices(&gradient(colors.background_top, colors.background_bottom));
        cmds.draw_arrays(Primitive::TriangleStrip, 0, 4);

        self.waves.draw(cmds, elapsed_ms, scroll_offset, &colors);
        self.plane.draw(cmds, elapsed_ms, &colors);
        self.clouds.draw(cmds, &colors);

        cmds.bind_target(RenderTarget::Surface);
        cmds.set_viewport(Viewport::full(surface_width, surface_height));
        cmds.set_stencil_state(StencilState::DISABLED);
        cmds.bind_program(ProgramId::Copy);
        self.scene.bind_texture(cmds, 0);
        cmds.set_uniform(Uniform::Brightness, UniformValue::Float(self.config.brightness));
        cmds.bind_vertices(bytemuck::cast_slice(&ScreenVertex::QUAD));
        cmds.draw_arrays(Primitive::TriangleStrip, 0, 4);

        self.state = CompositorState::Rendering;
    }

    fn layout(&mut self, cmds: &mut impl DrawCommands, surface_width: u32, surface_height: u32) {
        let (width, height) = self.config.quality.scaled_size(surface_width, surface_height);
        log::info!(
            "Scene layout {}x{} ({:?} quality, surface {}x{})",
            width,
            height,
            self.config.quality,
            surface_width,
            surface_height
        );
        self.scene.init(cmds, FrameBufferDesc::new(width, height).with_depth_stencil());
        self.waves.on_resize(cmds, width, height);
        self.clouds.resize(width, height);
        self.plane.resize(width, height);
        self.layout_dirty = false;
    }

    pub fn state(&self) -> CompositorState {
        self.state
    }

    pub fn config(&self) -> &SceneConfig {
        &self.config
    }

    /// Offscreen scene size, once laid out.
    pub fn scene_size(&self) -> Option<(u32, u32)> {
        self.scene.desc().map(|d| (d.width, d.height))
    }

    pub fn clouds(&self) -> &CloudField {
        &self.clouds
    }
}

fn compile_all(cmds: &mut impl DrawCommands, library: &ShaderLibrary) -> Result<(), RenderError> {
    if !cmds.shader_compiler_available() {
        return Err(RenderError::ShaderCompilerUnavailable);
    }
    for program in ProgramId::ALL {
        cmds.compile_program(program, library.get(program)?)?;
    }
    Ok(())
}

/// Full-screen strip, top vertices in `top`, bottom vertices in `bottom`.
fn gradient(top: engine_core::Rgb, bottom: engine_core::Rgb) -> [f32; 20] {
    let [tr, tg, tb] = top;
    let [br, bg, bb] = bottom;
    [
        -1.0, 1.0, tr, tg, tb, //
        -1.0, -1.0, br, bg, bb, //
        1.0, 1.0, tr, tg, tb, //
        1.0, -1.0, br, bg, bb,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clouds::{CLOUD_COUNT, POINTS_PER_CLOUD};
    use engine_core::Quality;
    use renderer::{Command, CommandList, FrameEvent, ShaderSource};
    use std::cell::Cell;
    use std::rc::Rc;

    fn compositor() -> SceneCompositor {
        SceneCompositor::with_clouds(
            SceneConfig::default(),
            CloudField::with_seed(CLOUD_COUNT, POINTS_PER_CLOUD, 42),
        )
    }

    fn ready(cmds: &mut CommandList) -> SceneCompositor {
        let mut compositor = compositor();
        compositor
            .surface_created(cmds, &ShaderLibrary::builtin())
            .expect("compiles");
        compositor.resize(800, 480);
        compositor
    }

    #[test]
    fn medium_quality_halves_the_scene() {
        let mut cmds = CommandList::new();
        let mut compositor = ready(&mut cmds);
        assert_eq!(compositor.config().quality, Quality::Medium);
        compositor.render_frame(&mut cmds, 0.0);
        assert_eq!(compositor.scene_size(), Some((400, 240)));
        assert_eq!(compositor.state(), CompositorState::Rendering);
    }

    #[test]
    fn state_machine_walks_to_rendering() {
        let mut cmds = CommandList::new();
        let mut compositor = compositor();
        assert_eq!(compositor.state(), CompositorState::Uninitialized);
        compositor.render_frame(&mut cmds, 0.0);
        assert!(cmds.is_empty());

        compositor.surface_created(&mut cmds, &ShaderLibrary::builtin()).expect("compiles");
        assert_eq!(compositor.state(), CompositorState::SurfaceReady);
        compositor.resize(800, 480);
        assert_eq!(compositor.state(), CompositorState::Sized);
        compositor.render_frame(&mut cmds, 0.016);
        assert_eq!(compositor.state(), CompositorState::Rendering);
    }

    #[test]
    fn frame_runs_layers_in_order() {
        let mut cmds = CommandList::new();
        let mut compositor = ready(&mut cmds);
        compositor.render_frame(&mut cmds, 0.0);
        cmds.clear_commands();
        compositor.render_frame(&mut cmds, 0.016);

        let replay = cmds.replay();
        let clear = replay.events.iter().find_map(|e| match e {
            FrameEvent::Clear { target, op } => Some((*target, *op)),
            _ => None,
        });
        assert_eq!(clear, Some((RenderTarget::Offscreen(SCENE_TARGET), ClearOp::depth_stencil())));

        let programs: Vec<ProgramId> = replay.draws().map(|d| d.program).collect();
        let mut expected = vec![ProgramId::Fill, ProgramId::Wave, ProgramId::Wave, ProgramId::Plane, ProgramId::Plane];
        expected.extend(std::iter::repeat(ProgramId::Cloud).take(CLOUD_COUNT * 2));
        expected.push(ProgramId::Copy);
        assert_eq!(programs, expected);

        let blit = replay.draws().last().expect("blit");
        assert_eq!(blit.target, RenderTarget::Surface);
        assert_eq!(blit.viewport, Some(Viewport::full(800, 480)));
        assert_eq!(blit.texture, Some(SCENE_TARGET));
        assert_eq!(blit.uniform(Uniform::Brightness), &[1.0]);
        assert!(replay
            .draws()
            .filter(|d| d.program != ProgramId::Copy)
            .all(|d| d.target == RenderTarget::Offscreen(SCENE_TARGET)));
    }

    #[test]
    fn layout_only_happens_when_dirty() {
        let mut cmds = CommandList::new();
        let mut compositor = ready(&mut cmds);
        compositor.render_frame(&mut cmds, 0.0);
        cmds.clear_commands();
        compositor.render_frame(&mut cmds, 0.016);
        assert!(!cmds.commands().iter().any(|c| matches!(c, Command::InitFrameBuffer { .. })));

        compositor.resize(600, 600);
        compositor.render_frame(&mut cmds, 0.032);
        assert_eq!(compositor.scene_size(), Some((300, 300)));
    }

    #[test]
    fn quality_change_relayouts() {
        let mut cmds = CommandList::new();
        let mut compositor = ready(&mut cmds);
        compositor.render_frame(&mut cmds, 0.0);
        compositor.set_config(SceneConfig { quality: Quality::Low, ..SceneConfig::default() });
        compositor.render_frame(&mut cmds, 0.016);
        assert_eq!(compositor.scene_size(), Some((266, 160)));
    }

    #[test]
    fn scroll_offset_scales_by_near_width() {
        let mut cmds = CommandList::new();
        let mut compositor = ready(&mut cmds);
        compositor.render_frame(&mut cmds, 0.0);
        let near_width = compositor.clouds().scroll_range();
        compositor.set_scroll_fraction(0.5);
        assert!((compositor.scroll_offset() - 0.5 * near_width).abs() < 1e-6);

        compositor.set_scroll_fraction(3.0);
        assert_eq!(compositor.scroll_offset(), near_width);
        compositor.set_scroll_fraction(-1.0);
        assert_eq!(compositor.scroll_offset(), 0.0);
        compositor.set_scroll_fraction(f32::NAN);
        assert_eq!(compositor.scroll_offset(), 0.0);
    }

    #[test]
    fn scroll_offset_reaches_waves_and_clouds() {
        let mut cmds = CommandList::new();
        let mut compositor = ready(&mut cmds);
        compositor.set_scroll_fraction(0.5);
        compositor.render_frame(&mut cmds, 0.0);
        let shift = 0.5 * compositor.clouds().scroll_range();
        assert!(shift > 0.0);

        let replay = cmds.replay();
        let waves: Vec<_> = replay.draws().filter(|d| d.program == ProgramId::Wave).collect();
        assert_eq!(waves.len(), 2);
        for wave in waves {
            // Both bands carry a 0.2 bias and no sinusoid at t = 0.
            assert!((wave.uniform(Uniform::PositionOffset)[0] - (0.2 + shift)).abs() < 1e-5);
        }

        let clouds: Vec<_> = replay.draws().filter(|d| d.program == ProgramId::Cloud).collect();
        assert_eq!(clouds.len(), compositor.clouds().clouds().len() * 2);
        for (pair, cloud) in clouds.chunks(2).zip(compositor.clouds().clouds()) {
            for draw in pair {
                assert!((draw.uniform(Uniform::XOffset)[0] - (cloud.offset - shift)).abs() < 1e-5);
            }
        }
    }

    #[test]
    fn wave_synthesis_stays_offscreen() {
        let mut cmds = CommandList::new();
        let mut compositor = ready(&mut cmds);
        compositor.render_frame(&mut cmds, 0.0);

        let replay = cmds.replay();
        let synthesis: Vec<_> = replay.draws().filter(|d| d.program == ProgramId::WavePoint).collect();
        assert_eq!(synthesis.len(), 2);
        assert!(synthesis.iter().all(|d| d.target == RenderTarget::Offscreen(WAVE_TARGET)));
        let on_surface: Vec<ProgramId> = replay
            .draws()
            .filter(|d| d.target == RenderTarget::Surface)
            .map(|d| d.program)
            .collect();
        assert_eq!(on_surface, vec![ProgramId::Copy]);
    }

    #[test]
    fn brightness_reaches_blit() {
        let mut cmds = CommandList::new();
        let mut compositor = ready(&mut cmds);
        compositor.set_config(SceneConfig { brightness: 1.2, ..SceneConfig::default() });
        compositor.render_frame(&mut cmds, 0.0);
        let replay = cmds.replay();
        let blit = replay.draws().last().expect("blit");
        assert_eq!(blit.uniform(Uniform::Brightness), &[1.2]);
    }

    #[test]
    fn missing_compiler_notifies_once() {
        let notices = Rc::new(Cell::new(0));
        let counter = notices.clone();
        let mut compositor = compositor().with_notifier(move |_: &RenderError| counter.set(counter.get() + 1));
        let mut cmds = CommandList::without_shader_compiler();

        let first = compositor.surface_created(&mut cmds, &ShaderLibrary::builtin());
        assert!(matches!(first, Err(RenderError::ShaderCompilerUnavailable)));
        assert_eq!(compositor.state(), CompositorState::Unavailable);
        assert!(compositor.surface_created(&mut cmds, &ShaderLibrary::builtin()).is_err());
        assert_eq!(notices.get(), 1);

        compositor.resize(800, 480);
        compositor.render_frame(&mut cmds, 0.0);
        assert!(cmds.is_empty());
        assert_eq!(compositor.state(), CompositorState::Unavailable);
    }

    #[test]
    fn failed_program_makes_rendering_unavailable() {
        let mut compositor = compositor();
        let mut cmds = CommandList::new().failing_program(ProgramId::Wave);
        let result = compositor.surface_created(&mut cmds, &ShaderLibrary::builtin());
        assert!(matches!(result, Err(RenderError::ShaderCompilation { program: ProgramId::Wave, .. })));
        assert_eq!(compositor.state(), CompositorState::Unavailable);
    }

    #[test]
    fn missing_source_is_reported() {
        let mut library = ShaderLibrary::new();
        library.insert(ProgramId::Fill, ShaderSource::new("vs", "fs"));
        let mut compositor = compositor();
        let mut cmds = CommandList::new();
        let result = compositor.surface_created(&mut cmds, &library);
        assert!(matches!(result, Err(RenderError::MissingShader(ProgramId::Copy))));
    }

    #[test]
    fn gradient_puts_top_color_on_top() {
        let strip = gradient([1.0, 0.0, 0.0], [0.0, 0.0, 1.0]);
        assert_eq!(&strip[0..5], &[-1.0, 1.0, 1.0, 0.0, 0.0]);
        assert_eq!(&strip[5..10], &[-1.0, -1.0, 0.0, 0.0, 1.0]);
    }
}

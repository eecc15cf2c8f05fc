//! Per-window wallpaper state: GPU backend, compositor and clock.

use anyhow::Result;
use engine_core::FrameClock;
use renderer::{RenderError, ShaderLibrary, WgpuBackend};
use scene::{CompositorState, SceneCompositor};
use std::sync::Arc;
use winit::event::WindowEvent;
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::Window;

use crate::config::WallpaperConfig;

pub struct WallpaperState {
    backend: WgpuBackend,
    compositor: SceneCompositor,
    shaders: ShaderLibrary,
    clock: FrameClock,
    pub running: bool,
}

impl WallpaperState {
    pub async fn new(window: Arc<Window>, config: &WallpaperConfig) -> Result<Self> {
        let mut backend = WgpuBackend::new(window.clone(), config.vsync).await?;
        let notify_window = window.clone();
        let mut compositor = SceneCompositor::new(config.scene_config()).with_notifier(move |_: &RenderError| {
            notify_window.set_title("Flier (rendering unavailable)");
        });

        let shaders = ShaderLibrary::builtin();
        // The compositor keeps the window alive in the Unavailable state.
        if let Err(e) = compositor.surface_created(&mut backend, &shaders) {
            log::error!("Continuing without rendering: {}", e);
        }
        let (width, height) = backend.surface_size();
        compositor.resize(width, height);

        Ok(Self {
            backend,
            compositor,
            shaders,
            clock: FrameClock::new(),
            running: true,
        })
    }

    pub fn window(&self) -> &Window {
        &self.backend.window
    }

    /// Handle a window event. Returns true if the app should exit.
    pub fn handle_window_event(&mut self, event: WindowEvent) -> bool {
        match event {
            WindowEvent::CloseRequested => {
                self.running = false;
                true
            }
            WindowEvent::Resized(size) => {
                self.backend.resize(size);
                let (width, height) = self.backend.surface_size();
                self.compositor.resize(width, height);
                false
            }
            WindowEvent::CursorMoved { position, .. } => {
                let (width, _) = self.backend.surface_size();
                self.compositor.set_scroll_fraction((position.x / width.max(1) as f64) as f32);
                false
            }
            WindowEvent::KeyboardInput { event, .. } if event.state.is_pressed() => {
                match event.physical_key {
                    PhysicalKey::Code(KeyCode::Escape) => {
                        self.running = false;
                        true
                    }
                    PhysicalKey::Code(KeyCode::F5) => {
                        self.reload_config();
                        false
                    }
                    _ => false,
                }
            }
            WindowEvent::RedrawRequested => {
                self.render();
                self.window().request_redraw();
                false
            }
            _ => false,
        }
    }

    /// Re-read `flier.ron`; the new scene settings apply from the next frame.
    fn reload_config(&mut self) {
        let config = WallpaperConfig::load();
        log::info!("Reloaded preferences ({} entries)", config.preferences.len());
        self.compositor.set_config(config.scene_config());
    }

    /// Retry program compilation, e.g. after the GPU came back.
    pub fn recreate_surface(&mut self) {
        if let Err(e) = self.compositor.surface_created(&mut self.backend, &self.shaders) {
            log::error!("Continuing without rendering: {}", e);
        }
    }

    fn render(&mut self) {
        if self.compositor.state() == CompositorState::Unavailable {
            return;
        }
        let elapsed = self.clock.tick();
        self.compositor.render_frame(&mut self.backend, elapsed);
        if let Err(e) = self.backend.submit_frame() {
            log::error!("Render error: {}", e);
        }
        if self.clock.frame_count() % 600 == 0 {
            log::debug!("{:.1} fps", self.clock.fps());
        }
    }
}

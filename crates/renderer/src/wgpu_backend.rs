//! wgpu implementation of [`DrawCommands`].
//!
//! Calls are recorded into a [`CommandList`] during the frame and replayed in
//! [`WgpuBackend::submit_frame`]: vertex streams, indices and per-draw uniform
//! blocks are uploaded first, then the draws are encoded into one render pass
//! per (target, clear) run. Program compilation and frame buffer allocation
//! happen immediately.

use crate::command_list::{CommandList, DrawCall, DrawRange, FrameEvent};
use crate::commands::{
    ClearOp, DrawCommands, Primitive, ProgramId, RenderTarget, StencilState, TargetId, Uniform,
    UniformValue, Viewport,
};
use crate::error::RenderError;
use crate::framebuffer::{FrameBufferDesc, TextureWrap};
use crate::pipeline::{
    create_program_pipeline, create_texture_bind_group_layout, create_uniform_bind_group_layout,
    topology_for, PipelineKey, ProgramModules, DEPTH_STENCIL_FORMAT, OFFSCREEN_FORMAT, UNIFORM_STRIDE,
};
use crate::shaders::ShaderSource;
use std::collections::HashMap;
use std::ops::Range;
use std::sync::Arc;
use winit::window::Window;

/// Vertices emitted per point sprite.
const SPRITE_VERTICES: u32 = 6;

/// GPU storage behind one offscreen target.
struct OffscreenTarget {
    desc: FrameBufferDesc,
    color_view: wgpu::TextureView,
    depth_view: Option<wgpu::TextureView>,
    bind_group: wgpu::BindGroup,
}

enum DrawKind {
    Vertices { vertices: Range<u32>, instances: Range<u32> },
    Indexed { indices: Range<u32> },
}

/// A draw with its buffers uploaded and its pipeline resolved.
struct PreparedDraw {
    pipeline: PipelineKey,
    /// x, y, width, height in wgpu's top-left convention.
    viewport: [f32; 4],
    uniform_offset: u32,
    texture: Option<TargetId>,
    stencil_reference: u32,
    vertex_bytes: Range<wgpu::BufferAddress>,
    kind: DrawKind,
}

struct PassPlan {
    target: RenderTarget,
    clear: ClearOp,
    draws: Vec<PreparedDraw>,
}

/// Growable GPU buffer rewritten once per frame.
struct StreamBuffer {
    buffer: wgpu::Buffer,
    capacity: wgpu::BufferAddress,
    usage: wgpu::BufferUsages,
    label: &'static str,
}

impl StreamBuffer {
    fn new(device: &wgpu::Device, label: &'static str, usage: wgpu::BufferUsages, capacity: u64) -> Self {
        let usage = usage | wgpu::BufferUsages::COPY_DST;
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size: capacity,
            usage,
            mapped_at_creation: false,
        });
        Self { buffer, capacity, usage, label }
    }

    /// Grow to hold `needed` bytes. Returns true if the buffer was replaced.
    fn reserve(&mut self, device: &wgpu::Device, needed: u64) -> bool {
        if needed <= self.capacity {
            return false;
        }
        let capacity = needed.next_power_of_two();
        log::debug!("Growing {} to {} bytes", self.label, capacity);
        *self = Self::new(device, self.label, self.usage, capacity);
        true
    }
}

/// Renders recorded draw commands to a window surface.
pub struct WgpuBackend {
    pub surface: wgpu::Surface<'static>,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub config: wgpu::SurfaceConfiguration,
    pub size: winit::dpi::PhysicalSize<u32>,
    pub window: Arc<Window>,

    uniform_layout: wgpu::BindGroupLayout,
    texture_layout: wgpu::BindGroupLayout,
    uniform_bind_group: wgpu::BindGroup,

    programs: HashMap<ProgramId, ProgramModules>,
    pipelines: HashMap<PipelineKey, wgpu::RenderPipeline>,
    targets: HashMap<TargetId, OffscreenTarget>,

    uniforms: StreamBuffer,
    vertices: StreamBuffer,
    indices: StreamBuffer,

    recorder: CommandList,
}

impl WgpuBackend {
    /// Create a backend presenting to `window`.
    pub async fn new(window: Arc<Window>, vsync: bool) -> Result<Self, RenderError> {
        let size = window.inner_size();

        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let surface = instance.create_surface(window.clone())?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::LowPower,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .ok_or(RenderError::NoAdapter)?;

        log::info!("Using GPU: {:?}", adapter.get_info().name);

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("Flier Device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::downlevel_defaults().using_resolution(adapter.limits()),
                    memory_hints: wgpu::MemoryHints::MemoryUsage,
                },
                None,
            )
            .await?;

        // The offscreen scene holds final display values, so present without sRGB encoding.
        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .find(|f| !f.is_srgb())
            .or_else(|| surface_caps.formats.first())
            .copied()
            .ok_or(RenderError::UnsupportedSurface)?;

        let present_mode = if vsync {
            surface_caps
                .present_modes
                .iter()
                .find(|m| matches!(m, wgpu::PresentMode::Mailbox))
                .copied()
                .unwrap_or(wgpu::PresentMode::AutoVsync)
        } else {
            wgpu::PresentMode::AutoNoVsync
        };

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode,
            alpha_mode: surface_caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        let uniform_layout = create_uniform_bind_group_layout(&device);
        let texture_layout = create_texture_bind_group_layout(&device);

        let uniforms = StreamBuffer::new(&device, "Uniform Ring", wgpu::BufferUsages::UNIFORM, UNIFORM_STRIDE * 64);
        let vertices = StreamBuffer::new(&device, "Vertex Stream", wgpu::BufferUsages::VERTEX, 16 * 1024);
        let indices = StreamBuffer::new(&device, "Index Stream", wgpu::BufferUsages::INDEX, 4 * 1024);
        let uniform_bind_group = create_uniform_bind_group(&device, &uniform_layout, &uniforms.buffer);

        Ok(Self {
            surface,
            device,
            queue,
            config,
            size,
            window,
            uniform_layout,
            texture_layout,
            uniform_bind_group,
            programs: HashMap::new(),
            pipelines: HashMap::new(),
            targets: HashMap::new(),
            uniforms,
            vertices,
            indices,
            recorder: CommandList::new(),
        })
    }

    /// Handle window resize.
    pub fn resize(&mut self, new_size: winit::dpi::PhysicalSize<u32>) {
        if new_size.width > 0 && new_size.height > 0 {
            self.size = new_size;
            self.config.width = new_size.width;
            self.config.height = new_size.height;
            self.surface.configure(&self.device, &self.config);
        }
    }

    pub fn surface_size(&self) -> (u32, u32) {
        (self.config.width, self.config.height)
    }

    /// Replay everything recorded since the last submit and present the result.
    ///
    /// Without a surface texture only the surface passes are dropped: offscreen
    /// work still runs, so one-time texture synthesis is never lost. A lost or
    /// outdated surface is reconfigured; any other surface error is returned
    /// after the offscreen passes are submitted.
    pub fn submit_frame(&mut self) -> Result<(), RenderError> {
        let recording = std::mem::take(&mut self.recorder);

        let (output, surface_error) = match self.surface.get_current_texture() {
            Ok(output) => (Some(output), None),
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                log::warn!("Surface lost or outdated, reconfiguring");
                self.surface.configure(&self.device, &self.config);
                (None, None)
            }
            Err(e) => (None, Some(e)),
        };

        let replay = recording.replay();
        let mut passes = self.prepare(&replay.events, &replay.streams);
        if output.is_none() {
            retain_offscreen_passes(&mut passes);
        }

        let surface_view = output
            .as_ref()
            .map(|output| output.texture.create_view(&wgpu::TextureViewDescriptor::default()));
        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Frame Encoder"),
        });

        for pass in &passes {
            let (color_view, depth_view) = match pass.target {
                RenderTarget::Surface => match &surface_view {
                    Some(view) => (view, None),
                    None => continue,
                },
                RenderTarget::Offscreen(id) => match self.targets.get(&id) {
                    Some(target) => (&target.color_view, target.depth_view.as_ref()),
                    None => continue,
                },
            };

            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Scene Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: color_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: match pass.clear.color {
                            Some([r, g, b, a]) => wgpu::LoadOp::Clear(wgpu::Color {
                                r: r as f64,
                                g: g as f64,
                                b: b as f64,
                                a: a as f64,
                            }),
                            None => wgpu::LoadOp::Load,
                        },
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: depth_view.map(|view| wgpu::RenderPassDepthStencilAttachment {
                    view,
                    depth_ops: Some(wgpu::Operations {
                        load: pass.clear.depth.map_or(wgpu::LoadOp::Load, wgpu::LoadOp::Clear),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: Some(wgpu::Operations {
                        load: pass.clear.stencil.map_or(wgpu::LoadOp::Load, wgpu::LoadOp::Clear),
                        store: wgpu::StoreOp::Store,
                    }),
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            for draw in &pass.draws {
                let Some(pipeline) = self.pipelines.get(&draw.pipeline) else {
                    continue;
                };
                let [x, y, width, height] = draw.viewport;
                render_pass.set_pipeline(pipeline);
                render_pass.set_viewport(x, y, width, height, 0.0, 1.0);
                render_pass.set_stencil_reference(draw.stencil_reference);
                render_pass.set_bind_group(0, &self.uniform_bind_group, &[draw.uniform_offset]);
                if let Some(target) = draw.texture.and_then(|id| self.targets.get(&id)) {
                    render_pass.set_bind_group(1, &target.bind_group, &[]);
                }
                render_pass.set_vertex_buffer(0, self.vertices.buffer.slice(draw.vertex_bytes.clone()));
                match &draw.kind {
                    DrawKind::Vertices { vertices, instances } => {
                        render_pass.draw(vertices.clone(), instances.clone());
                    }
                    DrawKind::Indexed { indices } => {
                        render_pass.set_index_buffer(self.indices.buffer.slice(..), wgpu::IndexFormat::Uint32);
                        render_pass.draw_indexed(indices.clone(), 0, 0..1);
                    }
                }
            }
        }

        self.queue.submit(Some(encoder.finish()));
        if let Some(output) = output {
            output.present();
        }
        match surface_error {
            Some(e) => Err(e.into()),
            None => Ok(()),
        }
    }

    /// Upload the frame's data, build missing pipelines and group draws into passes.
    fn prepare(&mut self, events: &[FrameEvent], streams: &[&[f32]]) -> Vec<PassPlan> {
        let mut stream_offsets = Vec::with_capacity(streams.len());
        let mut vertex_data: Vec<f32> = Vec::new();
        for stream in streams {
            stream_offsets.push((vertex_data.len() * std::mem::size_of::<f32>()) as wgpu::BufferAddress);
            vertex_data.extend_from_slice(stream);
        }

        let mut index_data: Vec<u32> = Vec::new();
        let mut uniform_data: Vec<u8> = Vec::new();
        let mut passes: Vec<PassPlan> = Vec::new();

        for event in events {
            match event {
                FrameEvent::InitFrameBuffer { .. } => {}
                FrameEvent::Clear { target, op } => match passes.last_mut() {
                    Some(pass) if pass.target == *target && pass.draws.is_empty() => {
                        merge_clear(&mut pass.clear, op);
                    }
                    _ => passes.push(PassPlan { target: *target, clear: *op, draws: Vec::new() }),
                },
                FrameEvent::Draw(call) => {
                    let stream = streams.get(call.stream).copied().unwrap_or_default();
                    let vertex_start = stream_offsets.get(call.stream).copied().unwrap_or_default();
                    let Some(draw) = self.prepare_draw(call, stream, vertex_start, &mut index_data, &mut uniform_data)
                    else {
                        continue;
                    };
                    match passes.last_mut() {
                        Some(pass) if pass.target == call.target => pass.draws.push(draw),
                        _ => passes.push(PassPlan {
                            target: call.target,
                            clear: ClearOp::default(),
                            draws: vec![draw],
                        }),
                    }
                }
            }
        }

        if self.uniforms.reserve(&self.device, uniform_data.len() as u64) {
            self.uniform_bind_group =
                create_uniform_bind_group(&self.device, &self.uniform_layout, &self.uniforms.buffer);
        }
        self.vertices.reserve(&self.device, (vertex_data.len() * std::mem::size_of::<f32>()) as u64);
        self.indices.reserve(&self.device, (index_data.len() * std::mem::size_of::<u32>()) as u64);

        if !uniform_data.is_empty() {
            self.queue.write_buffer(&self.uniforms.buffer, 0, &uniform_data);
        }
        if !vertex_data.is_empty() {
            self.queue.write_buffer(&self.vertices.buffer, 0, bytemuck::cast_slice(&vertex_data));
        }
        if !index_data.is_empty() {
            self.queue.write_buffer(&self.indices.buffer, 0, bytemuck::cast_slice(&index_data));
        }

        passes
    }

    fn prepare_draw(
        &mut self,
        call: &DrawCall,
        stream: &[f32],
        vertex_start: wgpu::BufferAddress,
        index_data: &mut Vec<u32>,
        uniform_data: &mut Vec<u8>,
    ) -> Option<PreparedDraw> {
        let (target_width, target_height, color_format, depth_stencil) = match call.target {
            RenderTarget::Surface => (self.config.width, self.config.height, self.config.format, false),
            RenderTarget::Offscreen(id) => match self.targets.get(&id) {
                Some(target) => (
                    target.desc.width,
                    target.desc.height,
                    OFFSCREEN_FORMAT,
                    target.desc.has_depth_stencil(),
                ),
                None => {
                    log::warn!("Draw into unallocated target {:?}", id);
                    return None;
                }
            },
        };

        if stream.is_empty() {
            log::warn!("Dropping {} draw with an empty vertex stream", call.program.name());
            return None;
        }
        if call.program.samples_texture() && !call.texture.is_some_and(|id| self.targets.contains_key(&id)) {
            log::warn!("Dropping {} draw: no texture bound", call.program.name());
            return None;
        }

        let kind = match draw_kind(call.program, call.primitive, &call.range, index_data) {
            Some(kind) => kind,
            None => {
                log::warn!("{:?} draw is not supported by program {}", call.primitive, call.program.name());
                return None;
            }
        };

        let key = PipelineKey {
            program: call.program,
            topology: topology_for(call.program, call.primitive),
            stencil: if depth_stencil { call.stencil } else { StencilState::DISABLED },
            color_format,
            depth_stencil,
        };
        if !self.ensure_pipeline(&key) {
            return None;
        }

        let viewport = call.viewport.unwrap_or(Viewport::full(target_width, target_height));
        let flipped = flip_viewport(viewport, target_width, target_height)?;

        let mut uniforms = call.uniforms;
        uniforms.set_viewport_size(viewport.width.max(1), viewport.height.max(1));
        let uniform_offset = uniform_data.len() as u32;
        uniform_data.extend_from_slice(bytemuck::bytes_of(&uniforms));
        uniform_data.resize(uniform_offset as usize + UNIFORM_STRIDE as usize, 0);

        let stream_bytes = (stream.len() * std::mem::size_of::<f32>()) as wgpu::BufferAddress;
        Some(PreparedDraw {
            pipeline: key,
            viewport: flipped,
            uniform_offset,
            texture: call.texture.filter(|_| call.program.samples_texture()),
            stencil_reference: call.stencil.reference,
            vertex_bytes: vertex_start..vertex_start + stream_bytes,
            kind,
        })
    }

    /// Build the pipeline for `key` if it is not cached yet. False if the program was never compiled.
    fn ensure_pipeline(&mut self, key: &PipelineKey) -> bool {
        if self.pipelines.contains_key(key) {
            return true;
        }
        let Some(modules) = self.programs.get(&key.program) else {
            log::warn!("Program {} has not been compiled", key.program.name());
            return false;
        };
        log::debug!("Creating pipeline {:?}", key);
        let pipeline =
            create_program_pipeline(&self.device, key, modules, &self.uniform_layout, &self.texture_layout);
        self.pipelines.insert(*key, pipeline);
        true
    }

    fn create_target(&self, desc: FrameBufferDesc) -> OffscreenTarget {
        let size = wgpu::Extent3d {
            width: desc.width,
            height: desc.height,
            depth_or_array_layers: 1,
        };
        let color = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Offscreen Color"),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: OFFSCREEN_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        let color_view = color.create_view(&wgpu::TextureViewDescriptor::default());

        let depth_view = desc.has_depth_stencil().then(|| {
            self.device
                .create_texture(&wgpu::TextureDescriptor {
                    label: Some("Offscreen Depth Stencil"),
                    size,
                    mip_level_count: 1,
                    sample_count: 1,
                    dimension: wgpu::TextureDimension::D2,
                    format: DEPTH_STENCIL_FORMAT,
                    usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
                    view_formats: &[],
                })
                .create_view(&wgpu::TextureViewDescriptor::default())
        });

        let sampler = self.device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Offscreen Sampler"),
            address_mode_u: match desc.wrap {
                TextureWrap::Clamp => wgpu::AddressMode::ClampToEdge,
                TextureWrap::RepeatHorizontal => wgpu::AddressMode::Repeat,
            },
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Offscreen Texture Bind Group"),
            layout: &self.texture_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&color_view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&sampler),
                },
            ],
        });

        OffscreenTarget { desc, color_view, depth_view, bind_group }
    }
}

fn create_uniform_bind_group(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    buffer: &wgpu::Buffer,
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("Uniform Bind Group"),
        layout,
        entries: &[wgpu::BindGroupEntry {
            binding: 0,
            resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                buffer,
                offset: 0,
                size: wgpu::BufferSize::new(std::mem::size_of::<crate::commands::UniformBlock>() as u64),
            }),
        }],
    })
}

/// Keep only passes that render into offscreen targets.
fn retain_offscreen_passes(passes: &mut Vec<PassPlan>) {
    let dropped = passes.iter().filter(|p| p.target == RenderTarget::Surface).count();
    if dropped > 0 {
        log::debug!("Dropping {} surface pass(es) for this frame", dropped);
    }
    passes.retain(|p| p.target != RenderTarget::Surface);
}

/// Later clears of the same pass override earlier ones aspect by aspect.
fn merge_clear(into: &mut ClearOp, op: &ClearOp) {
    into.color = op.color.or(into.color);
    into.depth = op.depth.or(into.depth);
    into.stencil = op.stencil.or(into.stencil);
}

/// Translate a draw range into vertex/instance ranges, appending indices when needed.
fn draw_kind(program: ProgramId, primitive: Primitive, range: &DrawRange, index_data: &mut Vec<u32>) -> Option<DrawKind> {
    if program.draws_points() {
        // Sprites read their stream per instance; indexed sprites would need a gather pass.
        return match range {
            DrawRange::Arrays { first, count } => Some(DrawKind::Vertices {
                vertices: 0..SPRITE_VERTICES,
                instances: *first..first + count,
            }),
            DrawRange::Indexed(_) => None,
        };
    }

    match (primitive, range) {
        (Primitive::TriangleFan, DrawRange::Arrays { first, count }) => {
            let fan: Vec<u32> = (*first..first + count).collect();
            Some(push_indices(index_data, &fan_to_triangles(&fan)))
        }
        (Primitive::TriangleFan, DrawRange::Indexed(indices)) => {
            let fan: Vec<u32> = indices.iter().map(|&i| i as u32).collect();
            Some(push_indices(index_data, &fan_to_triangles(&fan)))
        }
        (_, DrawRange::Arrays { first, count }) => Some(DrawKind::Vertices {
            vertices: *first..first + count,
            instances: 0..1,
        }),
        (_, DrawRange::Indexed(indices)) => {
            let widened: Vec<u32> = indices.iter().map(|&i| i as u32).collect();
            Some(push_indices(index_data, &widened))
        }
    }
}

fn push_indices(index_data: &mut Vec<u32>, indices: &[u32]) -> DrawKind {
    let start = index_data.len() as u32;
    index_data.extend_from_slice(indices);
    DrawKind::Indexed { indices: start..start + indices.len() as u32 }
}

/// Triangle-list indices covering the fan `indices` (pivot first).
pub fn fan_to_triangles(indices: &[u32]) -> Vec<u32> {
    let Some((&pivot, rim)) = indices.split_first() else {
        return Vec::new();
    };
    rim.windows(2).flat_map(|edge| [pivot, edge[0], edge[1]]).collect()
}

/// Convert a bottom-left viewport into wgpu's top-left convention, clipped to
/// the target. `None` when nothing of it lies inside the target.
pub fn flip_viewport(viewport: Viewport, target_width: u32, target_height: u32) -> Option<[f32; 4]> {
    let x = viewport.x.min(target_width);
    let width = viewport.width.min(target_width - x);
    let bottom = viewport.y.min(target_height);
    let height = viewport.height.min(target_height - bottom);
    if width == 0 || height == 0 {
        return None;
    }
    let top = target_height - (bottom + height);
    Some([x as f32, top as f32, width as f32, height as f32])
}

impl DrawCommands for WgpuBackend {
    fn shader_compiler_available(&self) -> bool {
        true
    }

    fn compile_program(&mut self, program: ProgramId, source: &ShaderSource) -> Result<(), RenderError> {
        if source.is_empty() {
            return Err(RenderError::ShaderCompilation {
                program,
                message: "empty shader source".to_string(),
            });
        }

        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let vertex = self.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(&format!("{} vertex", program.name())),
            source: wgpu::ShaderSource::Wgsl(source.vertex.clone()),
        });
        let fragment = self.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(&format!("{} fragment", program.name())),
            source: wgpu::ShaderSource::Wgsl(source.fragment.clone()),
        });
        if let Some(error) = pollster::block_on(self.device.pop_error_scope()) {
            return Err(RenderError::ShaderCompilation {
                program,
                message: error.to_string(),
            });
        }

        log::debug!("Compiled program {}", program.name());
        self.pipelines.retain(|key, _| key.program != program);
        self.programs.insert(program, ProgramModules { vertex, fragment });
        Ok(())
    }

    fn init_frame_buffer(&mut self, target: TargetId, desc: FrameBufferDesc) {
        let offscreen = self.create_target(desc);
        self.targets.insert(target, offscreen);
    }

    fn bind_target(&mut self, target: RenderTarget) {
        self.recorder.bind_target(target);
    }

    fn set_viewport(&mut self, viewport: Viewport) {
        self.recorder.set_viewport(viewport);
    }

    fn clear(&mut self, op: ClearOp) {
        self.recorder.clear(op);
    }

    fn bind_program(&mut self, program: ProgramId) {
        self.recorder.bind_program(program);
    }

    fn set_uniform(&mut self, uniform: Uniform, value: UniformValue) {
        self.recorder.set_uniform(uniform, value);
    }

    fn bind_texture(&mut self, slot: u32, target: TargetId) {
        self.recorder.bind_texture(slot, target);
    }

    fn set_stencil_state(&mut self, state: StencilState) {
        self.recorder.set_stencil_state(state);
    }

    fn bind_vertices(&mut self, vertices: &[f32]) {
        self.recorder.bind_vertices(vertices);
    }

    fn draw_arrays(&mut self, primitive: Primitive, first: u32, count: u32) {
        if count > 0 {
            self.recorder.draw_arrays(primitive, first, count);
        }
    }

    fn draw_indexed(&mut self, primitive: Primitive, indices: &[u16]) {
        if !indices.is_empty() {
            self.recorder.draw_indexed(primitive, indices);
        }
    }
}

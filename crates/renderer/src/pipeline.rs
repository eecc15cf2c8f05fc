//! Bind group layouts and render pipeline creation for the scene programs.

use crate::commands::{Primitive, ProgramId, StencilFunc, StencilOp, StencilState, UniformBlock};
use crate::vertex;

/// Color format of offscreen targets.
pub const OFFSCREEN_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;
/// Format of the combined depth/stencil attachment.
pub const DEPTH_STENCIL_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth24PlusStencil8;
/// Byte stride between uniform blocks in the per-frame ring.
pub const UNIFORM_STRIDE: wgpu::BufferAddress = 256;

/// Compiled vertex and fragment modules of one program.
pub struct ProgramModules {
    pub vertex: wgpu::ShaderModule,
    pub fragment: wgpu::ShaderModule,
}

/// Everything a pipeline depends on besides the program source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PipelineKey {
    pub program: ProgramId,
    pub topology: wgpu::PrimitiveTopology,
    pub stencil: StencilState,
    pub color_format: wgpu::TextureFormat,
    pub depth_stencil: bool,
}

/// Topology a (program, primitive) pair is rasterized with.
///
/// Sprite programs expand each point into two triangles; fans are
/// re-indexed into triangle lists.
pub fn topology_for(program: ProgramId, primitive: Primitive) -> wgpu::PrimitiveTopology {
    if program.draws_points() {
        return wgpu::PrimitiveTopology::TriangleList;
    }
    match primitive {
        Primitive::Points => wgpu::PrimitiveTopology::PointList,
        Primitive::Lines => wgpu::PrimitiveTopology::LineList,
        Primitive::TriangleStrip => wgpu::PrimitiveTopology::TriangleStrip,
        Primitive::TriangleFan => wgpu::PrimitiveTopology::TriangleList,
    }
}

/// Shared uniform block at group 0, addressed with a dynamic offset per draw.
pub fn create_uniform_bind_group_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("Uniform Bind Group Layout"),
        entries: &[wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: true,
                min_binding_size: wgpu::BufferSize::new(std::mem::size_of::<UniformBlock>() as u64),
            },
            count: None,
        }],
    })
}

/// Sampled offscreen color texture at group 1.
pub fn create_texture_bind_group_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("Texture Bind Group Layout"),
        entries: &[
            wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    multisampled: false,
                    view_dimension: wgpu::TextureViewDimension::D2,
                    sample_type: wgpu::TextureSampleType::Float { filterable: true },
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 1,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                count: None,
            },
        ],
    })
}

fn compare_function(func: StencilFunc) -> wgpu::CompareFunction {
    match func {
        StencilFunc::Always => wgpu::CompareFunction::Always,
        StencilFunc::Equal => wgpu::CompareFunction::Equal,
    }
}

fn stencil_operation(op: StencilOp) -> wgpu::StencilOperation {
    match op {
        StencilOp::Keep => wgpu::StencilOperation::Keep,
        StencilOp::Replace => wgpu::StencilOperation::Replace,
        StencilOp::IncrementClamp => wgpu::StencilOperation::IncrementClamp,
    }
}

/// Stencil configuration of a pipeline. Disabled states neither test nor write.
pub fn stencil_descriptor(state: &StencilState) -> wgpu::StencilState {
    if !state.enabled {
        return wgpu::StencilState::default();
    }
    let face = wgpu::StencilFaceState {
        compare: compare_function(state.func),
        fail_op: stencil_operation(state.fail),
        depth_fail_op: stencil_operation(state.depth_fail),
        pass_op: stencil_operation(state.pass),
    };
    wgpu::StencilState {
        front: face,
        back: face,
        read_mask: 0xff,
        write_mask: 0xff,
    }
}

/// Build the pipeline for `key`. Depth testing is never used; the depth
/// attachment only carries the stencil mask.
pub fn create_program_pipeline(
    device: &wgpu::Device,
    key: &PipelineKey,
    modules: &ProgramModules,
    uniform_layout: &wgpu::BindGroupLayout,
    texture_layout: &wgpu::BindGroupLayout,
) -> wgpu::RenderPipeline {
    let bind_group_layouts: &[&wgpu::BindGroupLayout] = if key.program.samples_texture() {
        &[uniform_layout, texture_layout]
    } else {
        &[uniform_layout]
    };
    let label = format!("{} Pipeline", key.program.name());

    let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some(&label),
        bind_group_layouts,
        push_constant_ranges: &[],
    });

    let strip_index_format = match key.topology {
        wgpu::PrimitiveTopology::TriangleStrip | wgpu::PrimitiveTopology::LineStrip => {
            Some(wgpu::IndexFormat::Uint32)
        }
        _ => None,
    };

    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(&label),
        layout: Some(&layout),
        vertex: wgpu::VertexState {
            module: &modules.vertex,
            entry_point: Some("vs_main"),
            buffers: &[vertex::layout_for(key.program)],
            compilation_options: Default::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module: &modules.fragment,
            entry_point: Some("fs_main"),
            targets: &[Some(wgpu::ColorTargetState {
                format: key.color_format,
                blend: Some(wgpu::BlendState::REPLACE),
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: Default::default(),
        }),
        primitive: wgpu::PrimitiveState {
            topology: key.topology,
            strip_index_format,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: None,
            polygon_mode: wgpu::PolygonMode::Fill,
            unclipped_depth: false,
            conservative: false,
        },
        depth_stencil: key.depth_stencil.then(|| wgpu::DepthStencilState {
            format: DEPTH_STENCIL_FORMAT,
            depth_write_enabled: false,
            depth_compare: wgpu::CompareFunction::Always,
            stencil: stencil_descriptor(&key.stencil),
            bias: wgpu::DepthBiasState::default(),
        }),
        multisample: wgpu::MultisampleState::default(),
        multiview: None,
        cache: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sprites_and_fans_become_triangle_lists() {
        assert_eq!(
            topology_for(ProgramId::Cloud, Primitive::Points),
            wgpu::PrimitiveTopology::TriangleList
        );
        assert_eq!(
            topology_for(ProgramId::Plane, Primitive::TriangleFan),
            wgpu::PrimitiveTopology::TriangleList
        );
        assert_eq!(topology_for(ProgramId::Plane, Primitive::Lines), wgpu::PrimitiveTopology::LineList);
        assert_eq!(
            topology_for(ProgramId::Fill, Primitive::TriangleStrip),
            wgpu::PrimitiveTopology::TriangleStrip
        );
    }

    #[test]
    fn stencil_states_map_to_wgpu() {
        let mark = stencil_descriptor(&StencilState::replace(1));
        assert_eq!(mark.front.compare, wgpu::CompareFunction::Always);
        assert_eq!(mark.front.pass_op, wgpu::StencilOperation::Replace);

        let once = stencil_descriptor(&StencilState::increment_where(0));
        assert_eq!(once.front.compare, wgpu::CompareFunction::Equal);
        assert_eq!(once.front.fail_op, wgpu::StencilOperation::Keep);
        assert_eq!(once.back.pass_op, wgpu::StencilOperation::IncrementClamp);

        let off = stencil_descriptor(&StencilState::DISABLED);
        assert!(!off.is_enabled());
    }

    #[test]
    fn uniform_block_fits_ring_stride() {
        assert!(std::mem::size_of::<UniformBlock>() as u64 <= UNIFORM_STRIDE);
    }
}

//! Vertex types and layouts for the scene programs.
//!
//! Every scene stream is a flat `&[f32]`; these types describe how each
//! program interprets it and give the matching wgpu buffer layout.

use crate::commands::ProgramId;
use bytemuck::{Pod, Zeroable};

/// Background gradient vertex: clip-space position and color.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct FillVertex {
    pub position: [f32; 2],
    pub color: [f32; 3],
}

impl FillVertex {
    pub fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<FillVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 0,
                    format: wgpu::VertexFormat::Float32x2,
                },
                wgpu::VertexAttribute {
                    offset: std::mem::size_of::<[f32; 2]>() as wgpu::BufferAddress,
                    shader_location: 1,
                    format: wgpu::VertexFormat::Float32x3,
                },
            ],
        }
    }
}

/// Bare clip-space position (blit quad, wave quad, wave disk centers).
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct ScreenVertex {
    pub position: [f32; 2],
}

impl ScreenVertex {
    /// Full-screen quad as a triangle strip.
    pub const QUAD: [ScreenVertex; 4] = [
        ScreenVertex { position: [-1.0, 1.0] },
        ScreenVertex { position: [-1.0, -1.0] },
        ScreenVertex { position: [1.0, 1.0] },
        ScreenVertex { position: [1.0, -1.0] },
    ];

    pub fn layout(step_mode: wgpu::VertexStepMode) -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<ScreenVertex>() as wgpu::BufferAddress,
            step_mode,
            attributes: &[wgpu::VertexAttribute {
                offset: 0,
                shader_location: 0,
                format: wgpu::VertexFormat::Float32x2,
            }],
        }
    }
}

/// One cloud particle. Drawn as an instanced screen-aligned disk.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct PointVertex {
    pub position: [f32; 3],
    /// Sprite diameter in pixels.
    pub size: f32,
    /// Color multiplier used by the outline pass.
    pub weight: f32,
}

impl PointVertex {
    pub fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<PointVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Instance,
            attributes: &[
                // Position
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 0,
                    format: wgpu::VertexFormat::Float32x3,
                },
                // Size
                wgpu::VertexAttribute {
                    offset: std::mem::size_of::<[f32; 3]>() as wgpu::BufferAddress,
                    shader_location: 1,
                    format: wgpu::VertexFormat::Float32,
                },
                // Weight
                wgpu::VertexAttribute {
                    offset: std::mem::size_of::<[f32; 4]>() as wgpu::BufferAddress,
                    shader_location: 2,
                    format: wgpu::VertexFormat::Float32,
                },
            ],
        }
    }
}

/// Paper plane hull vertex in model space.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct PlaneVertex {
    pub position: [f32; 3],
}

impl PlaneVertex {
    pub fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<PlaneVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[wgpu::VertexAttribute {
                offset: 0,
                shader_location: 0,
                format: wgpu::VertexFormat::Float32x3,
            }],
        }
    }
}

/// Buffer layout the given program reads its stream with.
pub fn layout_for(program: ProgramId) -> wgpu::VertexBufferLayout<'static> {
    match program {
        ProgramId::Fill => FillVertex::layout(),
        ProgramId::Copy | ProgramId::Wave => ScreenVertex::layout(wgpu::VertexStepMode::Vertex),
        ProgramId::WavePoint => ScreenVertex::layout(wgpu::VertexStepMode::Instance),
        ProgramId::Cloud => PointVertex::layout(),
        ProgramId::Plane => PlaneVertex::layout(),
    }
}

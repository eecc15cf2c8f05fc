//! Errors surfaced by the rendering layer.

use crate::commands::ProgramId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("GPU shader compiler is not available")]
    ShaderCompilerUnavailable,

    #[error("no shader source registered for program `{}`", .0.name())]
    MissingShader(ProgramId),

    #[error("shader program `{}` failed to compile: {message}", .program.name())]
    ShaderCompilation { program: ProgramId, message: String },

    #[error("failed to find a suitable GPU adapter")]
    NoAdapter,

    #[error("surface reports no supported texture format")]
    UnsupportedSurface,

    #[error("failed to create surface: {0}")]
    CreateSurface(#[from] wgpu::CreateSurfaceError),

    #[error("failed to request device: {0}")]
    RequestDevice(#[from] wgpu::RequestDeviceError),

    #[error("surface error: {0}")]
    Surface(#[from] wgpu::SurfaceError),
}

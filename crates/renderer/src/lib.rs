//! Rendering layer for Flier: the draw-command seam, its recorder, and the wgpu backend.

pub mod command_list;
pub mod commands;
pub mod error;
pub mod framebuffer;
pub mod pipeline;
pub mod shaders;
pub mod vertex;
pub mod wgpu_backend;

pub use command_list::*;
pub use commands::*;
pub use error::*;
pub use framebuffer::*;
pub use shaders::*;
pub use vertex::*;
pub use wgpu_backend::WgpuBackend;

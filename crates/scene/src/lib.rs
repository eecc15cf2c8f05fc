//! Scene layers of the Flier wallpaper and the compositor that stacks them.
//!
//! Everything here talks to the GPU only through [`renderer::DrawCommands`],
//! so the whole scene runs unchanged against a recording [`renderer::CommandList`].

pub mod clouds;
pub mod compositor;
pub mod plane;
pub mod waves;

pub use clouds::*;
pub use compositor::*;
pub use plane::*;
pub use waves::*;

use engine_core::Rgb;
use renderer::UniformValue;

/// Opaque color uniform from a scheme color.
pub(crate) fn color_uniform([r, g, b]: Rgb) -> UniformValue {
    UniformValue::Vec4([r, g, b, 1.0])
}

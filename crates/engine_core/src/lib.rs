//! Core types shared by the Flier scene crates.
//!
//! This crate provides the foundational pieces every layer of the wallpaper uses:
//! - View frustum math (projection, unprojection, reference rectangles)
//! - Frame timing
//! - Scene configuration and preference parsing

pub mod config;
pub mod time;
pub mod viewport;

pub use config::*;
pub use time::*;
pub use viewport::*;

// Re-export commonly used types
pub use glam::{Mat4, Vec3, Vec4};

//! Shader source lookup.
//!
//! Programs are resolved once, when the surface is created.
//! After that the library is read-only.

use crate::commands::ProgramId;
use crate::error::RenderError;
use std::borrow::Cow;
use std::collections::BTreeMap;

/// Vertex and fragment source of one program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderSource {
    pub vertex: Cow<'static, str>,
    pub fragment: Cow<'static, str>,
}

impl ShaderSource {
    pub fn new(vertex: impl Into<Cow<'static, str>>, fragment: impl Into<Cow<'static, str>>) -> Self {
        Self { vertex: vertex.into(), fragment: fragment.into() }
    }

    pub fn is_empty(&self) -> bool {
        self.vertex.trim().is_empty() || self.fragment.trim().is_empty()
    }
}

/// Mapping from program to source text.
#[derive(Debug, Clone, Default)]
pub struct ShaderLibrary {
    sources: BTreeMap<ProgramId, ShaderSource>,
}

impl ShaderLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// WGSL sources shipped with this crate, for every program.
    pub fn builtin() -> Self {
        let mut library = Self::new();
        library.insert(
            ProgramId::Fill,
            ShaderSource::new(include_str!("shaders/fill.vert.wgsl"), include_str!("shaders/fill.frag.wgsl")),
        );
        library.insert(
            ProgramId::Copy,
            ShaderSource::new(include_str!("shaders/copy.vert.wgsl"), include_str!("shaders/copy.frag.wgsl")),
        );
        library.insert(
            ProgramId::Cloud,
            ShaderSource::new(include_str!("shaders/cloud.vert.wgsl"), include_str!("shaders/cloud.frag.wgsl")),
        );
        library.insert(
            ProgramId::Wave,
            ShaderSource::new(include_str!("shaders/wave.vert.wgsl"), include_str!("shaders/wave.frag.wgsl")),
        );
        library.insert(
            ProgramId::WavePoint,
            ShaderSource::new(
                include_str!("shaders/wave_point.vert.wgsl"),
                include_str!("shaders/wave_point.frag.wgsl"),
            ),
        );
        library.insert(
            ProgramId::Plane,
            ShaderSource::new(include_str!("shaders/plane.vert.wgsl"), include_str!("shaders/plane.frag.wgsl")),
        );
        library
    }

    pub fn insert(&mut self, program: ProgramId, source: ShaderSource) -> &mut Self {
        self.sources.insert(program, source);
        self
    }

    pub fn get(&self, program: ProgramId) -> Result<&ShaderSource, RenderError> {
        self.sources.get(&program).ok_or(RenderError::MissingShader(program))
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_covers_every_program() {
        let library = ShaderLibrary::builtin();
        assert_eq!(library.len(), ProgramId::ALL.len());
        for program in ProgramId::ALL {
            let source = library.get(program).expect("builtin source");
            assert!(!source.is_empty());
            assert!(source.vertex.contains("fn vs_main"), "{} vertex entry", program.name());
            assert!(source.fragment.contains("fn fs_main"), "{} fragment entry", program.name());
        }
    }

    #[test]
    fn missing_program_is_an_error() {
        let mut library = ShaderLibrary::new();
        library.insert(ProgramId::Fill, ShaderSource::new("a", "b"));
        assert!(library.get(ProgramId::Fill).is_ok());
        assert!(matches!(library.get(ProgramId::Copy), Err(RenderError::MissingShader(ProgramId::Copy))));
    }
}

//! Offscreen render targets.

use crate::commands::{DrawCommands, RenderTarget, TargetId, Viewport};

/// How the color attachment is addressed when sampled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TextureWrap {
    #[default]
    Clamp,
    /// Repeat horizontally, clamp vertically.
    RepeatHorizontal,
}

/// Storage requested for an offscreen target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameBufferDesc {
    pub width: u32,
    pub height: u32,
    pub depth: bool,
    pub stencil: bool,
    pub wrap: TextureWrap,
}

impl FrameBufferDesc {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width: width.max(1),
            height: height.max(1),
            depth: false,
            stencil: false,
            wrap: TextureWrap::Clamp,
        }
    }

    pub fn with_depth_stencil(mut self) -> Self {
        self.depth = true;
        self.stencil = true;
        self
    }

    pub fn with_stencil(mut self) -> Self {
        self.stencil = true;
        self
    }

    pub fn with_wrap(mut self, wrap: TextureWrap) -> Self {
        self.wrap = wrap;
        self
    }

    pub fn has_depth_stencil(&self) -> bool {
        self.depth || self.stencil
    }
}

/// An offscreen target with one color texture and optional depth/stencil storage.
///
/// The handle is stable for the life of the frame buffer; `init` only
/// reallocates storage when the requested description actually changes.
#[derive(Debug)]
pub struct FrameBuffer {
    id: TargetId,
    desc: Option<FrameBufferDesc>,
}

impl FrameBuffer {
    pub fn new(id: TargetId) -> Self {
        Self { id, desc: None }
    }

    /// (Re)allocate storage. Returns true if anything was reallocated.
    pub fn init(&mut self, cmds: &mut impl DrawCommands, desc: FrameBufferDesc) -> bool {
        if self.desc == Some(desc) {
            return false;
        }
        log::debug!("Frame buffer {:?} -> {}x{}", self.id, desc.width, desc.height);
        cmds.init_frame_buffer(self.id, desc);
        self.desc = Some(desc);
        true
    }

    /// Make this the render target with a full-size viewport.
    pub fn bind(&self, cmds: &mut impl DrawCommands) {
        cmds.bind_target(RenderTarget::Offscreen(self.id));
        cmds.set_viewport(Viewport::full(self.width(), self.height()));
    }

    /// Sample this target's color texture through `slot`.
    pub fn bind_texture(&self, cmds: &mut impl DrawCommands, slot: u32) {
        cmds.bind_texture(slot, self.id);
    }

    pub fn desc(&self) -> Option<FrameBufferDesc> {
        self.desc
    }

    pub fn is_initialized(&self) -> bool {
        self.desc.is_some()
    }

    pub fn width(&self) -> u32 {
        self.desc.map_or(0, |d| d.width)
    }

    pub fn height(&self) -> u32 {
        self.desc.map_or(0, |d| d.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command_list::{Command, CommandList};

    #[test]
    fn init_skips_identical_descriptions() {
        let mut cmds = CommandList::new();
        let mut fbo = FrameBuffer::new(TargetId(3));
        let desc = FrameBufferDesc::new(400, 240).with_depth_stencil();
        assert!(fbo.init(&mut cmds, desc));
        assert!(!fbo.init(&mut cmds, desc));
        assert!(fbo.init(&mut cmds, FrameBufferDesc::new(200, 120).with_depth_stencil()));
        let inits = cmds
            .commands()
            .iter()
            .filter(|c| matches!(c, Command::InitFrameBuffer { .. }))
            .count();
        assert_eq!(inits, 2);
        assert_eq!((fbo.width(), fbo.height()), (200, 120));
        assert!(fbo.desc().is_some_and(|d| d.stencil));
    }

    #[test]
    fn bind_sets_full_viewport() {
        let mut cmds = CommandList::new();
        let mut fbo = FrameBuffer::new(TargetId(1));
        fbo.init(&mut cmds, FrameBufferDesc::new(64, 32));
        cmds.clear_commands();
        fbo.bind(&mut cmds);
        assert_eq!(
            cmds.commands(),
            &[
                Command::BindTarget(RenderTarget::Offscreen(TargetId(1))),
                Command::SetViewport(Viewport::full(64, 32)),
            ]
        );
    }

    #[test]
    fn zero_sized_requests_are_clamped() {
        let desc = FrameBufferDesc::new(0, 0);
        assert_eq!((desc.width, desc.height), (1, 1));
    }
}

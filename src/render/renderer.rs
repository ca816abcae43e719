//! Renderer component: what instruction assembly and the render thread
//! need to know about how a node draws.

use crate::graphics::{fx_hash_key, PipelineCreateInfo};

/// How the renderer blends with the framebuffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BlendMode {
    /// Blend when the node's color carries transparency.
    #[default]
    Auto,
    /// Always blend.
    On,
    /// Never blend.
    Off,
}

/// Render-queue classification for one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpacityType {
    /// No blending; drawn in the opaque queue.
    Opaque,
    /// Fully transparent; contributes nothing and is skipped.
    Transparent,
    /// Blended; drawn back-to-front after the opaque queue.
    Translucent,
}

/// Renderer attached to a scene node.
pub struct Renderer {
    pub blend_mode: BlendMode,
    /// Offset added to the owning node's depth index, interleaving this
    /// renderer between sibling depth bands.
    pub depth_index: i32,
    /// Full pipeline state; hashed once on creation for cache lookups.
    pipeline_info: PipelineCreateInfo,
    pipeline_hash: u64,
}

impl Renderer {
    #[must_use]
    pub fn new(pipeline_info: PipelineCreateInfo) -> Self {
        let pipeline_hash = fx_hash_key(&pipeline_info);
        Self {
            blend_mode: BlendMode::Auto,
            depth_index: 0,
            pipeline_info,
            pipeline_hash,
        }
    }

    #[inline]
    #[must_use]
    pub fn pipeline_info(&self) -> &PipelineCreateInfo {
        &self.pipeline_info
    }

    #[inline]
    #[must_use]
    pub fn pipeline_hash(&self) -> u64 {
        self.pipeline_hash
    }

    /// Classifies the renderer for queue placement given the owning node's
    /// world alpha.
    #[must_use]
    pub fn opacity_type(&self, node_alpha: f32) -> OpacityType {
        if node_alpha <= 0.0 {
            return OpacityType::Transparent;
        }
        match self.blend_mode {
            BlendMode::Off => OpacityType::Opaque,
            BlendMode::On => OpacityType::Translucent,
            BlendMode::Auto => {
                if node_alpha >= 1.0 {
                    OpacityType::Opaque
                } else {
                    OpacityType::Translucent
                }
            }
        }
    }
}

impl Default for Renderer {
    fn default() -> Self {
        Self::new(PipelineCreateInfo::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opacity_classification() {
        let renderer = Renderer::default();
        assert_eq!(renderer.opacity_type(1.0), OpacityType::Opaque);
        assert_eq!(renderer.opacity_type(0.5), OpacityType::Translucent);
        assert_eq!(renderer.opacity_type(0.0), OpacityType::Transparent);

        let mut forced = Renderer::default();
        forced.blend_mode = BlendMode::On;
        assert_eq!(forced.opacity_type(1.0), OpacityType::Translucent);
        assert_eq!(forced.opacity_type(0.0), OpacityType::Transparent);
    }
}

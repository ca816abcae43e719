//! Camera component: projection setup plus a per-frame view matrix derived
//! from the owning node's world transform.

use glam::Mat4;

use crate::common::{BufferIndex, DoubleBuffered};

/// Camera attached to a node.
pub struct Camera {
    projection: Mat4,
    view: DoubleBuffered<Mat4>,
    /// Set when the view matrix changed during the last update; the
    /// instruction processor uses this to decide render-list reuse.
    view_updated: bool,
}

impl Camera {
    /// Creates a camera with the given projection matrix.
    #[must_use]
    pub fn new(projection: Mat4) -> Self {
        Self {
            projection,
            view: DoubleBuffered::new(Mat4::IDENTITY),
            view_updated: true,
        }
    }

    /// Orthographic UI camera looking down -Z with the origin at the top
    /// left, the common case for 2D scenes.
    #[must_use]
    pub fn orthographic(width: f32, height: f32) -> Self {
        Self::new(Mat4::orthographic_rh(0.0, width, height, 0.0, -1.0, 1.0))
    }

    /// Perspective camera; `fov_y` in radians.
    #[must_use]
    pub fn perspective(fov_y: f32, aspect: f32, near: f32, far: f32) -> Self {
        Self::new(Mat4::perspective_rh(fov_y, aspect, near, far))
    }

    #[inline]
    #[must_use]
    pub fn projection(&self) -> Mat4 {
        self.projection
    }

    pub fn set_projection(&mut self, projection: Mat4) {
        self.projection = projection;
        self.view_updated = true;
    }

    #[inline]
    #[must_use]
    pub fn view(&self, buffer: BufferIndex) -> Mat4 {
        self.view.get(buffer)
    }

    /// Recomputes the view matrix from the owning node's world matrix.
    /// Called by the transform pass each frame.
    pub(crate) fn update_view(&mut self, buffer: BufferIndex, node_world: Mat4) {
        let view = node_world.inverse();
        self.view_updated = view != self.view.get(buffer);
        self.view.set(buffer, view);
    }

    /// True if the last update changed the view matrix.
    #[inline]
    #[must_use]
    pub fn view_updated(&self) -> bool {
        self.view_updated
    }
}

//! Perspective frustum for the cloud layer and the reference rectangles derived from it.

use glam::{Mat4, Vec4};

/// Near clipping distance shared by every depth computation.
pub const Z_NEAR: f32 = 1.0;
/// Far clipping distance shared by every depth computation.
pub const Z_FAR: f32 = 6.0;

/// Axis-aligned rectangle in world space. Y points up, so `top > bottom`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

impl Rect {
    pub fn new(left: f32, top: f32, right: f32, bottom: f32) -> Self {
        Self { left, top, right, bottom }
    }

    pub fn width(&self) -> f32 {
        self.right - self.left
    }

    pub fn height(&self) -> f32 {
        self.top - self.bottom
    }

    /// Component-wise linear interpolation towards `other`.
    pub fn lerp(&self, other: &Rect, t: f32) -> Rect {
        let mix = |a: f32, b: f32| a + t * (b - a);
        Rect {
            left: mix(self.left, other.left),
            top: mix(self.top, other.top),
            right: mix(self.right, other.right),
            bottom: mix(self.bottom, other.bottom),
        }
    }

    /// True when `other` lies inside this rectangle, allowing `epsilon` of slack.
    pub fn contains(&self, other: &Rect, epsilon: f32) -> bool {
        other.left >= self.left - epsilon
            && other.right <= self.right + epsilon
            && other.top <= self.top + epsilon
            && other.bottom >= self.bottom - epsilon
    }
}

/// Projection plus the visible world rectangles at the near and far planes.
///
/// Any rectangle at an intermediate depth is the linear interpolation of
/// `rect_near` and `rect_far` by the normalized depth `t`.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewFrustum {
    pub z_near: f32,
    pub z_far: f32,
    pub projection: Mat4,
    pub rect_near: Rect,
    pub rect_far: Rect,
}

impl ViewFrustum {
    /// Normalized depth of an eye-space `z` (negative in front of the camera), clamped to `[0, 1]`.
    pub fn depth_factor(&self, z: f32) -> f32 {
        ((-z - self.z_near) / (self.z_far - self.z_near)).clamp(0.0, 1.0)
    }

    /// Visible rectangle at normalized depth `t`.
    pub fn rect_at(&self, t: f32) -> Rect {
        self.rect_near.lerp(&self.rect_far, t.clamp(0.0, 1.0))
    }

    /// Copy with both reference rectangles extended to the right by `amount`.
    pub fn widened_right(&self, amount: f32) -> ViewFrustum {
        let mut widened = self.clone();
        widened.rect_near.right += amount;
        widened.rect_far.right += amount;
        widened
    }
}

/// Turns surface pixel dimensions into the cloud layer's projection and reference rectangles.
#[derive(Debug, Clone, Copy)]
pub struct ViewportProjector {
    z_near: f32,
    z_far: f32,
}

impl Default for ViewportProjector {
    fn default() -> Self {
        Self::new(Z_NEAR, Z_FAR)
    }
}

impl ViewportProjector {
    pub fn new(z_near: f32, z_far: f32) -> Self {
        Self { z_near, z_far }
    }

    /// Symmetric perspective frustum: horizontal half-extent 1, vertical half-extent `height / width`.
    pub fn compute_projection(&self, width: u32, height: u32) -> Mat4 {
        let aspect = height.max(1) as f32 / width.max(1) as f32;
        frustum_gl(-1.0, 1.0, -aspect, aspect, self.z_near, self.z_far)
    }

    /// Projection plus the two unprojected reference rectangles.
    pub fn frustum(&self, width: u32, height: u32) -> ViewFrustum {
        let projection = self.compute_projection(width, height);
        let inverse = projection.inverse();
        ViewFrustum {
            z_near: self.z_near,
            z_far: self.z_far,
            projection,
            rect_near: unproject(&inverse, -1.0),
            rect_far: unproject(&inverse, 1.0),
        }
    }
}

/// Visible world rectangle at NDC depth `depth_ndc` (-1 = near plane, 1 = far plane).
pub fn unproject(inv_projection: &Mat4, depth_ndc: f32) -> Rect {
    let top_left = *inv_projection * Vec4::new(-1.0, 1.0, depth_ndc, 1.0);
    let bottom_right = *inv_projection * Vec4::new(1.0, -1.0, depth_ndc, 1.0);
    Rect {
        left: top_left.x / top_left.w,
        top: top_left.y / top_left.w,
        right: bottom_right.x / bottom_right.w,
        bottom: bottom_right.y / bottom_right.w,
    }
}

/// OpenGL-convention frustum matrix (NDC depth in `[-1, 1]`), column major.
fn frustum_gl(left: f32, right: f32, bottom: f32, top: f32, near: f32, far: f32) -> Mat4 {
    let width = right - left;
    let height = top - bottom;
    let depth = far - near;
    Mat4::from_cols(
        Vec4::new(2.0 * near / width, 0.0, 0.0, 0.0),
        Vec4::new(0.0, 2.0 * near / height, 0.0, 0.0),
        Vec4::new((right + left) / width, (top + bottom) / height, -(far + near) / depth, -1.0),
        Vec4::new(0.0, 0.0, -2.0 * far * near / depth, 0.0),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    fn project(projection: &Mat4, point: Vec3) -> Vec3 {
        let clip = *projection * point.extend(1.0);
        clip.truncate() / clip.w
    }

    #[test]
    fn near_rect_matches_frustum_extents() {
        let frustum = ViewportProjector::default().frustum(800, 480);
        let aspect = 480.0 / 800.0;
        assert!((frustum.rect_near.left + 1.0).abs() < 1e-5);
        assert!((frustum.rect_near.right - 1.0).abs() < 1e-5);
        assert!((frustum.rect_near.top - aspect).abs() < 1e-5);
        assert!((frustum.rect_near.bottom + aspect).abs() < 1e-5);
        // Far plane is Z_FAR / Z_NEAR times wider.
        assert!((frustum.rect_far.width() - 12.0).abs() < 1e-3);
    }

    #[test]
    fn reference_rects_reproject_to_ndc_corners() {
        for (w, h) in [(800, 480), (480, 800), (1, 1), (1920, 1080)] {
            let frustum = ViewportProjector::default().frustum(w, h);
            let cases = [
                (frustum.rect_near, -frustum.z_near, -1.0),
                (frustum.rect_far, -frustum.z_far, 1.0),
            ];
            for (rect, z, ndc_z) in cases {
                let top_left = project(&frustum.projection, Vec3::new(rect.left, rect.top, z));
                let bottom_right = project(&frustum.projection, Vec3::new(rect.right, rect.bottom, z));
                assert!((top_left - Vec3::new(-1.0, 1.0, ndc_z)).abs().max_element() < 1e-4);
                assert!((bottom_right - Vec3::new(1.0, -1.0, ndc_z)).abs().max_element() < 1e-4);
            }
        }
    }

    #[test]
    fn depth_factor_spans_near_to_far_and_clamps() {
        let frustum = ViewportProjector::default().frustum(800, 480);
        assert_eq!(frustum.depth_factor(-Z_NEAR), 0.0);
        assert_eq!(frustum.depth_factor(-Z_FAR), 1.0);
        assert!((frustum.depth_factor(-3.5) - 0.5).abs() < 1e-6);
        assert_eq!(frustum.depth_factor(0.0), 0.0);
        assert_eq!(frustum.depth_factor(-100.0), 1.0);
    }

    #[test]
    fn intermediate_rect_nests_between_references() {
        let frustum = ViewportProjector::default().frustum(640, 960);
        let outer = frustum.rect_far;
        for step in 0..=10 {
            let rect = frustum.rect_at(step as f32 / 10.0);
            assert!(outer.contains(&rect, 1e-4));
            assert!(rect.contains(&frustum.rect_near, 1e-4));
        }
    }

    #[test]
    fn widened_right_keeps_left_edges() {
        let frustum = ViewportProjector::default().frustum(800, 480);
        let widened = frustum.widened_right(2.0);
        assert_eq!(widened.rect_near.left, frustum.rect_near.left);
        assert!((widened.rect_near.right - frustum.rect_near.right - 2.0).abs() < 1e-6);
        assert!((widened.rect_far.right - frustum.rect_far.right - 2.0).abs() < 1e-6);
    }
}

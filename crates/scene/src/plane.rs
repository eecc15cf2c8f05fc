//! Tumbling paper plane.

use engine_core::{periodic_sin, ColorScheme};
use glam::{Mat4, Vec3};
use renderer::{DrawCommands, Primitive, ProgramId, StencilState, Uniform, UniformValue};

use crate::color_uniform;

const HALF_WIDTH: f32 = 1.0;
const HALF_HEIGHT: f32 = 0.3;
const HALF_LENGTH: f32 = 1.2;
const BEND: f32 = 0.3;

/// Hull vertices; index 0 is the nose and the fan pivot.
pub const HULL: [[f32; 3]; 6] = [
    [0.0, HALF_HEIGHT, -HALF_LENGTH],
    [HALF_WIDTH, HALF_HEIGHT, HALF_LENGTH],
    [BEND, HALF_HEIGHT, HALF_LENGTH],
    [0.0, -HALF_HEIGHT, HALF_LENGTH],
    [-BEND, HALF_HEIGHT, HALF_LENGTH],
    [-HALF_WIDTH, HALF_HEIGHT, HALF_LENGTH],
];

/// Outline edges over the hull vertices.
pub const OUTLINE: [u16; 18] = [0, 1, 0, 2, 0, 3, 0, 4, 0, 5, 1, 2, 2, 3, 3, 4, 4, 5];

const PITCH_PERIOD_MS: f64 = 4000.0;
const ROLL_PERIOD_MS: f64 = 6234.0;
const SWING_DEGREES: f32 = 10.0;
/// One full yaw turn every 10.8 s (30 ms per degree).
const YAW_PERIOD_MS: f64 = 10800.0;
const YAW_MS_PER_DEGREE: f64 = 30.0;
const SCALE_PERIOD_MS: f64 = 8345.0;
const SCALE_BASE: f32 = 0.75;
const SCALE_SWING: f32 = 0.25;
const OFFSET: Vec3 = Vec3::new(2.0, 0.5, 0.0);
const EYE: Vec3 = Vec3::new(0.0, 1.0, 5.0);

/// Pose angles in degrees and the uniform scale at one instant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlanePose {
    pub pitch: f32,
    pub yaw: f32,
    pub roll: f32,
    pub scale: f32,
}

impl PlanePose {
    pub fn at(elapsed_ms: f64) -> Self {
        Self {
            pitch: periodic_sin(elapsed_ms, PITCH_PERIOD_MS, SWING_DEGREES),
            yaw: (elapsed_ms.rem_euclid(YAW_PERIOD_MS) / YAW_MS_PER_DEGREE) as f32,
            roll: periodic_sin(elapsed_ms, ROLL_PERIOD_MS, SWING_DEGREES),
            scale: SCALE_BASE + periodic_sin(elapsed_ms, SCALE_PERIOD_MS, SCALE_SWING),
        }
    }

    /// Rotations about the origin, then the offset out to the flight position, then scale.
    pub fn model(&self) -> Mat4 {
        Mat4::from_rotation_x(self.pitch.to_radians())
            * Mat4::from_rotation_y(self.yaw.to_radians())
            * Mat4::from_rotation_z(self.roll.to_radians())
            * Mat4::from_translation(OFFSET)
            * Mat4::from_scale(Vec3::splat(self.scale))
    }
}

#[derive(Debug, Clone)]
pub struct PlaneAnimator {
    projection: Mat4,
    view: Mat4,
}

impl Default for PlaneAnimator {
    fn default() -> Self {
        Self::new()
    }
}

impl PlaneAnimator {
    pub fn new() -> Self {
        Self {
            projection: Mat4::IDENTITY,
            view: Mat4::look_at_rh(EYE, Vec3::ZERO, Vec3::Y),
        }
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        let aspect = height.max(1) as f32 / width.max(1) as f32;
        self.projection = Mat4::orthographic_rh_gl(-3.0, 3.0, -2.0 * aspect, 4.0 * aspect, 1.0, 21.0);
    }

    pub fn model_view_projection(&self, elapsed_ms: f64) -> Mat4 {
        self.projection * self.view * PlanePose::at(elapsed_ms).model()
    }

    /// Hull as a stencil-marking fan, then the outline edges.
    pub fn draw(&self, cmds: &mut impl DrawCommands, elapsed_ms: f64, colors: &ColorScheme) {
        cmds.bind_program(ProgramId::Plane);
        cmds.set_uniform(
            Uniform::Matrix,
            UniformValue::Mat4(self.model_view_projection(elapsed_ms).to_cols_array()),
        );
        cmds.bind_vertices(HULL.as_flattened());
        cmds.set_stencil_state(StencilState::replace(1));

        cmds.set_uniform(Uniform::Color, color_uniform(colors.plane_fill));
        cmds.draw_arrays(Primitive::TriangleFan, 0, HULL.len() as u32);

        cmds.set_uniform(Uniform::Color, color_uniform(colors.plane_outline));
        cmds.draw_indexed(Primitive::Lines, &OUTLINE);

        cmds.set_stencil_state(StencilState::DISABLED);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use renderer::{CommandList, DrawRange};

    #[test]
    fn pose_follows_periods() {
        let start = PlanePose::at(0.0);
        assert_eq!(start.pitch, 0.0);
        assert_eq!(start.yaw, 0.0);
        assert!((start.scale - 0.75).abs() < 1e-6);

        let quarter_pitch = PlanePose::at(1000.0);
        assert!((quarter_pitch.pitch - 10.0).abs() < 1e-4);
        assert!((quarter_pitch.yaw - 1000.0 / 30.0).abs() < 1e-3);

        // Yaw wraps after a full turn.
        let wrapped = PlanePose::at(10800.0 + 300.0);
        assert!((wrapped.yaw - 10.0).abs() < 1e-3);
    }

    #[test]
    fn scale_breathes_between_half_and_full() {
        for step in 0..100 {
            let scale = PlanePose::at(step as f64 * 97.0).scale;
            assert!((0.5 - 1e-6..=1.0 + 1e-6).contains(&scale));
        }
    }

    #[test]
    fn rest_pose_places_plane_at_offset() {
        let model = PlanePose { pitch: 0.0, yaw: 0.0, roll: 0.0, scale: 1.0 }.model();
        let nose = model.transform_point3(Vec3::from(HULL[0]));
        assert!((nose - Vec3::new(2.0, 0.8, -1.2)).length() < 1e-5);
    }

    #[test]
    fn flight_center_stays_in_view() {
        let mut plane = PlaneAnimator::new();
        plane.resize(400, 240);
        for step in 0..200 {
            let clip = plane.model_view_projection(step as f64 * 123.0) * glam::Vec4::W;
            let ndc = clip / clip.w;
            assert!(ndc.x.abs() <= 1.0 && ndc.y.abs() <= 1.0 && ndc.z.abs() <= 1.0, "{:?}", ndc);
        }
    }

    #[test]
    fn draw_marks_stencil_then_outlines() {
        let mut plane = PlaneAnimator::new();
        plane.resize(400, 240);
        let colors = ColorScheme::default();
        let mut cmds = CommandList::new();
        plane.draw(&mut cmds, 0.0, &colors);

        let replay = cmds.replay();
        let draws: Vec<_> = replay.draws().collect();
        assert_eq!(draws.len(), 2);
        assert_eq!(draws[0].primitive, Primitive::TriangleFan);
        assert_eq!(draws[0].range, DrawRange::Arrays { first: 0, count: 6 });
        assert_eq!(draws[0].stencil, StencilState::replace(1));
        assert_eq!(&draws[0].uniform(Uniform::Color)[..3], &colors.plane_fill);
        assert_eq!(draws[1].primitive, Primitive::Lines);
        assert_eq!(draws[1].range, DrawRange::Indexed(OUTLINE.to_vec()));
        assert_eq!(&draws[1].uniform(Uniform::Color)[..3], &colors.plane_outline);
        assert_eq!(replay.streams[draws[0].stream].len(), 18);
    }
}

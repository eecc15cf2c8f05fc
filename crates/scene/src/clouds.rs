//! Drifting cloud layer.
//!
//! Every cloud owns a fixed slot of point sprites inside one shared arena.
//! Clouds drift left at their own speed; once a cloud has scrolled past the
//! left edge of its view rectangle it is regenerated at a new depth and
//! re-enters from the right. The field is kept sorted farthest-first so the
//! shared stencil mask resolves overlaps the same way every frame.

use engine_core::{ColorScheme, Rect, ViewFrustum, ViewportProjector};
use rand::prelude::*;
use renderer::{DrawCommands, PointVertex, Primitive, ProgramId, StencilState, Uniform, UniformValue};

use crate::color_uniform;

pub const CLOUD_COUNT: usize = 10;
pub const POINTS_PER_CLOUD: usize = 10;

/// Cloud extents as a fraction of the view rectangle at its depth.
const CLOUD_EXTENT: f32 = 0.2;
/// Bottom of the vertical band clouds spawn in, relative to the rectangle top.
const BAND_BOTTOM: f32 = 0.25;
/// Drift speed range in world units per second.
const SPEED_MIN: f32 = 0.3;
const SPEED_MAX: f32 = 0.6;
/// Extra sprite diameter of the outline pass, in pixels.
const OUTLINE_GROWTH: f32 = 4.0;

/// One cloud: a view into the point arena plus its motion state.
#[derive(Debug, Clone, PartialEq)]
pub struct Cloud {
    start: usize,
    count: usize,
    /// Eye-space depth, in `[-z_far, -z_near]`.
    pub z: f32,
    /// Visible world rectangle at `z`, restricted to the cloud band.
    pub view_rect: Rect,
    pub width: f32,
    pub height: f32,
    /// Horizontal world offset of the cloud's local origin.
    pub offset: f32,
    pub speed: f32,
    /// Elapsed seconds at the last regeneration.
    pub recycled_at: f64,
}

impl Cloud {
    fn new(start: usize, count: usize) -> Self {
        Self {
            start,
            count,
            z: 0.0,
            view_rect: Rect::default(),
            width: 0.0,
            height: 0.0,
            offset: 0.0,
            speed: 0.0,
            recycled_at: 0.0,
        }
    }

    /// Index of the first point in the arena.
    pub fn start(&self) -> usize {
        self.start
    }

    pub fn count(&self) -> usize {
        self.count
    }

    /// Whether the cloud has drifted fully past the left edge.
    pub fn is_off_screen(&self) -> bool {
        self.offset + self.width * 3.0 < self.view_rect.left
    }
}

/// The whole cloud layer.
pub struct CloudField {
    clouds: Vec<Cloud>,
    points: Vec<PointVertex>,
    projector: ViewportProjector,
    frustum: Option<ViewFrustum>,
    /// Width of the unwidened near rectangle; one full scroll sweep.
    scroll_range: f32,
    scroll_offset: f32,
    max_point_size_near: f32,
    max_point_size_far: f32,
    last_update: Option<f64>,
    rng: StdRng,
}

impl Default for CloudField {
    fn default() -> Self {
        Self::new(CLOUD_COUNT, POINTS_PER_CLOUD)
    }
}

impl CloudField {
    pub fn new(cloud_count: usize, points_per_cloud: usize) -> Self {
        Self::with_rng(cloud_count, points_per_cloud, StdRng::from_entropy())
    }

    /// Deterministic field for reproducible layouts.
    pub fn with_seed(cloud_count: usize, points_per_cloud: usize, seed: u64) -> Self {
        Self::with_rng(cloud_count, points_per_cloud, StdRng::seed_from_u64(seed))
    }

    fn with_rng(cloud_count: usize, points_per_cloud: usize, rng: StdRng) -> Self {
        let clouds = (0..cloud_count)
            .map(|i| Cloud::new(i * points_per_cloud, points_per_cloud))
            .collect();
        Self {
            clouds,
            points: vec![PointVertex { position: [0.0; 3], size: 0.0, weight: 1.0 }; cloud_count * points_per_cloud],
            projector: ViewportProjector::default(),
            frustum: None,
            scroll_range: 0.0,
            scroll_offset: 0.0,
            max_point_size_near: 0.0,
            max_point_size_far: 0.0,
            last_update: None,
            rng,
        }
    }

    /// Re-derive the frustum for a new target size and regenerate every cloud.
    pub fn resize(&mut self, width: u32, height: u32) {
        let frustum = self.projector.frustum(width, height);
        self.scroll_range = frustum.rect_near.width();
        let frustum = frustum.widened_right(self.scroll_range);

        let min_side = width.min(height) as f32;
        self.max_point_size_near = min_side / 5.0;
        self.max_point_size_far = min_side / 10.0;

        log::debug!(
            "Cloud frustum {}x{}: near {:?}, far {:?}",
            width,
            height,
            frustum.rect_near,
            frustum.rect_far
        );

        let sizes = (self.max_point_size_near, self.max_point_size_far);
        let now = self.last_update.unwrap_or(0.0);
        for cloud in &mut self.clouds {
            regenerate(cloud, &mut self.points, &frustum, sizes, &mut self.rng);
            cloud.recycled_at = now;
            // Scatter across the whole range so the sky starts populated.
            cloud.offset = rand_between(&mut self.rng, cloud.view_rect.left, cloud.view_rect.right);
        }
        self.frustum = Some(frustum);
        self.last_update = None;
        self.sort();
    }

    /// Drift every cloud by the time since the previous update and recycle
    /// those that left the screen. Returns true if any cloud was recycled.
    pub fn update(&mut self, elapsed_seconds: f64) -> bool {
        let Some(frustum) = &self.frustum else {
            return false;
        };
        let delta = self
            .last_update
            .map_or(0.0, |last| (elapsed_seconds - last).max(0.0)) as f32;
        self.last_update = Some(elapsed_seconds);

        let sizes = (self.max_point_size_near, self.max_point_size_far);
        let mut recycled = false;
        for cloud in &mut self.clouds {
            cloud.offset -= delta * cloud.speed;
            if cloud.is_off_screen() {
                regenerate(cloud, &mut self.points, frustum, sizes, &mut self.rng);
                cloud.offset = cloud.view_rect.right + cloud.width;
                cloud.recycled_at = elapsed_seconds;
                recycled = true;
            }
        }
        if recycled {
            self.sort();
        }
        recycled
    }

    /// Two stencil-gated passes per cloud: fill, then a slightly larger outline.
    pub fn draw(&self, cmds: &mut impl DrawCommands, colors: &ColorScheme) {
        let Some(frustum) = &self.frustum else {
            return;
        };

        cmds.bind_program(ProgramId::Cloud);
        cmds.set_uniform(Uniform::Matrix, UniformValue::Mat4(frustum.projection.to_cols_array()));
        cmds.bind_vertices(self.arena());
        cmds.set_stencil_state(StencilState::increment_where(0));

        for cloud in &self.clouds {
            let (first, count) = (cloud.start as u32, cloud.count as u32);
            cmds.set_uniform(Uniform::XOffset, UniformValue::Float(cloud.offset - self.scroll_offset));

            cmds.set_uniform(Uniform::PointSizeOffset, UniformValue::Float(0.0));
            cmds.set_uniform(Uniform::Color, color_uniform(colors.cloud_fill));
            cmds.set_uniform(Uniform::Shade, UniformValue::Float(0.0));
            cmds.draw_arrays(Primitive::Points, first, count);

            cmds.set_uniform(Uniform::PointSizeOffset, UniformValue::Float(OUTLINE_GROWTH));
            cmds.set_uniform(Uniform::Color, color_uniform(colors.cloud_outline));
            cmds.set_uniform(Uniform::Shade, UniformValue::Float(1.0));
            cmds.draw_arrays(Primitive::Points, first, count);
        }

        cmds.set_stencil_state(StencilState::DISABLED);
    }

    /// World-space scroll shift subtracted from every cloud.
    pub fn set_scroll_offset(&mut self, offset: f32) {
        self.scroll_offset = offset;
    }

    /// World width of one full scroll sweep (the near rectangle width).
    pub fn scroll_range(&self) -> f32 {
        self.scroll_range
    }

    /// The point arena as the flat stream the cloud program reads.
    pub fn arena(&self) -> &[f32] {
        bytemuck::cast_slice(&self.points)
    }

    pub fn points(&self) -> &[PointVertex] {
        &self.points
    }

    pub fn clouds(&self) -> &[Cloud] {
        &self.clouds
    }

    pub fn frustum(&self) -> Option<&ViewFrustum> {
        self.frustum.as_ref()
    }

    /// Farthest first. The sort is stable, so equal depths keep their order.
    fn sort(&mut self) {
        self.clouds.sort_by(|a, b| a.z.total_cmp(&b.z));
    }
}

fn rand_between(rng: &mut StdRng, min: f32, max: f32) -> f32 {
    min + rng.gen::<f32>() * (max - min)
}

/// Pick a new depth, extents and speed for `cloud` and refill its arena slot.
fn regenerate(
    cloud: &mut Cloud,
    points: &mut [PointVertex],
    frustum: &ViewFrustum,
    (size_near, size_far): (f32, f32),
    rng: &mut StdRng,
) {
    cloud.z = rand_between(rng, -frustum.z_far, -frustum.z_near);
    let t = frustum.depth_factor(cloud.z);

    let mut rect = frustum.rect_at(t);
    rect.bottom = rect.top * BAND_BOTTOM;
    cloud.view_rect = rect;
    cloud.width = rect.width() * CLOUD_EXTENT;
    cloud.height = rect.height() * CLOUD_EXTENT;
    cloud.speed = rand_between(rng, SPEED_MIN, SPEED_MAX);

    let y = rand_between(rng, rect.bottom, rect.top - cloud.height);
    let point_size = size_near + t * (size_far - size_near);

    for point in &mut points[cloud.start..cloud.start + cloud.count] {
        *point = PointVertex {
            position: [
                rand_between(rng, 0.0, cloud.width),
                rand_between(rng, 0.0, cloud.height) + y,
                cloud.z,
            ],
            size: rand_between(rng, point_size / 2.0, point_size),
            weight: rand_between(rng, 0.5, 1.0),
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use renderer::{Command, CommandList};

    fn field() -> CloudField {
        let mut field = CloudField::with_seed(CLOUD_COUNT, POINTS_PER_CLOUD, 7);
        field.resize(400, 240);
        field
    }

    fn assert_sorted(field: &CloudField) {
        for pair in field.clouds().windows(2) {
            assert!(pair[0].z <= pair[1].z, "{} drawn before {}", pair[0].z, pair[1].z);
        }
    }

    #[test]
    fn arena_holds_five_floats_per_point() {
        let field = CloudField::default();
        assert_eq!(field.arena().len(), 10 * 10 * 5);
    }

    #[test]
    fn slots_are_permanent() {
        let mut field = field();
        let mut slots: Vec<_> = field.clouds().iter().map(|c| (c.start(), c.count())).collect();
        slots.sort();
        let expected: Vec<_> = (0..CLOUD_COUNT).map(|i| (i * POINTS_PER_CLOUD, POINTS_PER_CLOUD)).collect();
        assert_eq!(slots, expected);

        for frame in 0..2000 {
            field.update(frame as f64 * 0.1);
        }
        let mut after: Vec<_> = field.clouds().iter().map(|c| (c.start(), c.count())).collect();
        after.sort();
        assert_eq!(after, expected);
    }

    #[test]
    fn cloud_rects_nest_inside_reference_rects() {
        let field = field();
        let frustum = field.frustum().expect("resized");
        for cloud in field.clouds() {
            assert!((-frustum.z_far..=-frustum.z_near).contains(&cloud.z));
            let bounds = frustum.rect_at(frustum.depth_factor(cloud.z));
            assert!(bounds.contains(&cloud.view_rect, 1e-4), "{:?} outside {:?}", cloud.view_rect, bounds);
            assert!(frustum.rect_near.contains(&cloud.view_rect, 1e-4) || frustum.rect_far.contains(&cloud.view_rect, 1e-4));
        }
    }

    #[test]
    fn points_stay_inside_their_cloud() {
        let field = field();
        for cloud in field.clouds() {
            for point in &field.points()[cloud.start()..cloud.start() + cloud.count()] {
                let [x, y, z] = point.position;
                assert!((0.0..=cloud.width).contains(&x));
                assert!(y >= cloud.view_rect.bottom - 1e-4 && y <= cloud.view_rect.top + 1e-4);
                assert_eq!(z, cloud.z);
                assert!(point.size > 0.0 && point.size <= 240.0 / 5.0);
            }
        }
    }

    #[test]
    fn recycled_clouds_enter_from_the_right() {
        let mut field = field();
        let mut recycles = 0;
        let mut elapsed = 0.0;
        while recycles < 5 {
            elapsed += 0.25;
            assert!(elapsed < 600.0, "clouds never recycled");
            if field.update(elapsed) {
                recycles += 1;
                assert_sorted(&field);
                for cloud in field.clouds().iter().filter(|c| c.recycled_at == elapsed) {
                    assert!(cloud.offset >= cloud.view_rect.right);
                }
            }
        }
    }

    #[test]
    fn resize_sorts_farthest_first() {
        let field = field();
        assert_sorted(&field);
    }

    #[test]
    fn first_update_after_resize_does_not_move() {
        let mut field = field();
        let before: Vec<f32> = field.clouds().iter().map(|c| c.offset).collect();
        field.update(1234.0);
        let after: Vec<f32> = field.clouds().iter().map(|c| c.offset).collect();
        assert_eq!(before, after);

        field.update(1235.0);
        for (cloud, start) in field.clouds().iter().zip(&before) {
            if cloud.recycled_at < 1235.0 {
                assert!((start - cloud.offset - cloud.speed).abs() < 1e-4);
            }
        }
    }

    #[test]
    fn resize_stamps_every_cloud_as_recycled() {
        let mut field = field();
        field.update(10.0);
        field.update(12.5);
        field.resize(300, 500);
        assert!(field.clouds().iter().all(|c| c.recycled_at == 12.5));
    }

    #[test]
    fn update_before_resize_is_a_no_op() {
        let mut field = CloudField::with_seed(2, 2, 1);
        assert!(!field.update(10.0));
        let mut cmds = CommandList::new();
        field.draw(&mut cmds, &ColorScheme::default());
        assert!(cmds.is_empty());
    }

    #[test]
    fn draw_issues_fill_and_outline_per_cloud() {
        let mut field = field();
        field.set_scroll_offset(1.0);
        let mut cmds = CommandList::new();
        let colors = ColorScheme::default();
        field.draw(&mut cmds, &colors);

        let replay = cmds.replay();
        let draws: Vec<_> = replay.draws().collect();
        assert_eq!(draws.len(), CLOUD_COUNT * 2);
        for (pair, cloud) in draws.chunks(2).zip(field.clouds()) {
            let (fill, outline) = (pair[0], pair[1]);
            assert_eq!(fill.stencil, StencilState::increment_where(0));
            assert_eq!(fill.uniform(Uniform::PointSizeOffset), &[0.0]);
            assert_eq!(outline.uniform(Uniform::PointSizeOffset), &[OUTLINE_GROWTH]);
            assert_eq!(&fill.uniform(Uniform::Color)[..3], &colors.cloud_fill);
            assert_eq!(&outline.uniform(Uniform::Color)[..3], &colors.cloud_outline);
            assert_eq!(fill.uniform(Uniform::XOffset), &[cloud.offset - 1.0]);
            assert_eq!(
                fill.range,
                renderer::DrawRange::Arrays { first: cloud.start() as u32, count: cloud.count() as u32 }
            );
        }
        assert_eq!(cmds.commands().last(), Some(&Command::SetStencil(StencilState::DISABLED)));
    }

    #[test]
    fn scroll_range_is_near_rect_width() {
        let field = field();
        let frustum = field.frustum().expect("resized");
        assert!((field.scroll_range() - 2.0).abs() < 1e-4);
        assert!((frustum.rect_near.width() - 2.0 * field.scroll_range()).abs() < 1e-4);
    }
}

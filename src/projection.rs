//! World-to-screen projection for annotation labels.
//!
//! Projection works from the camera basis the same way for perspective and orthographic
//! cameras: camera-space `x`/`y` are normalized by depth (perspective only) and mapped onto
//! the viewport. Screen coordinates come out with the origin bottom-left and y growing up;
//! [`label_rect`] flips them into y-down drawing coordinates.

use bevy::prelude::*;

use crate::annotation::LabelStyle;

/// Camera basis and visible extents needed to project points
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewParams {
    pub position:      Vec3,
    pub forward:       Vec3,
    pub right:         Vec3,
    pub up:            Vec3,
    /// Perspective: `tan(hfov / 2)`. Orthographic: half the visible width.
    pub half_extent_x: f32,
    /// Perspective: `tan(vfov / 2)`. Orthographic: half the visible height.
    pub half_extent_y: f32,
    pub perspective:   bool,
    /// Logical viewport size in pixels
    pub viewport:      Vec2,
}

impl ViewParams {
    /// Builds view parameters from a camera. Returns `None` for custom projections or a
    /// degenerate viewport.
    pub fn from_camera(
        cam_global: &GlobalTransform,
        projection: &Projection,
        viewport: Vec2,
    ) -> Option<Self> {
        if viewport.x <= 0.0 || viewport.y <= 0.0 {
            return None;
        }

        let (half_extent_x, half_extent_y, perspective) = match projection {
            Projection::Perspective(perspective) => {
                let half_tan_vfov = (perspective.fov * 0.5).tan();
                let aspect_ratio = viewport.x / viewport.y;
                (half_tan_vfov * aspect_ratio, half_tan_vfov, true)
            },
            Projection::Orthographic(ortho) => {
                (ortho.area.width() * 0.5, ortho.area.height() * 0.5, false)
            },
            _ => return None,
        };

        let rotation = cam_global.rotation();
        Some(Self {
            position: cam_global.translation(),
            forward: rotation * Vec3::NEG_Z,
            right: rotation * Vec3::X,
            up: rotation * Vec3::Y,
            half_extent_x,
            half_extent_y,
            perspective,
            viewport,
        })
    }
}

/// A projected point. `screen` is only meaningful when [`Projected::is_valid`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Projected {
    /// Pixels from the bottom-left corner of the viewport, y up
    pub screen: Vec2,
    /// Distance along the camera's forward axis
    pub depth:  f32,
}

impl Projected {
    /// False when the point is at or behind the camera plane
    pub fn is_valid(&self) -> bool { self.depth > 0.0 }
}

/// Projects a world position into viewport pixels
pub fn world_to_screen(view: &ViewParams, world_pos: Vec3) -> Projected {
    let relative = world_pos - view.position;
    let depth = relative.dot(view.forward);
    let x = relative.dot(view.right);
    let y = relative.dot(view.up);

    let (norm_x, norm_y) = if view.perspective {
        let divisor = if depth.abs() < f32::EPSILON {
            f32::EPSILON
        } else {
            depth
        };
        (x / divisor, y / divisor)
    } else {
        (x, y)
    };

    let screen = Vec2::new(
        (norm_x / view.half_extent_x).mul_add(0.5, 0.5) * view.viewport.x,
        (norm_y / view.half_extent_y).mul_add(0.5, 0.5) * view.viewport.y,
    );

    Projected { screen, depth }
}

/// Rectangle for a label of `size`, centered horizontally on the projected point with its
/// bottom edge on it, in y-down output coordinates.
///
/// `viewport_height` is in render pixels; `screen_scale` maps render pixels to output
/// pixels on both axes.
pub fn label_rect(projected: &Projected, size: Vec2, screen_scale: f32, viewport_height: f32) -> Rect {
    let x = projected.screen.x.mul_add(screen_scale, -size.x * 0.5);
    let y = viewport_height.mul_add(screen_scale, -projected.screen.y.mul_add(screen_scale, size.y));
    Rect::from_corners(Vec2::new(x, y), Vec2::new(x + size.x, y + size.y))
}

// ============================================================================
// Render scale factor
// ============================================================================

/// Reports the renderer's internal and output resolution when supersampling is active
pub trait ScaleFactorSource: Send + Sync + 'static {
    fn is_active(&self) -> bool;
    fn input_width(&self) -> f32;
    fn output_width(&self) -> f32;
}

/// No upscaling, the factor stays at 1.0
#[derive(Debug, Clone, Copy, Default)]
pub struct NoUpscaling;

impl ScaleFactorSource for NoUpscaling {
    fn is_active(&self) -> bool { false }

    fn input_width(&self) -> f32 { 1.0 }

    fn output_width(&self) -> f32 { 1.0 }
}

/// Constant render and output widths
#[derive(Debug, Clone, Copy)]
pub struct FixedUpscaling {
    pub input_width:  f32,
    pub output_width: f32,
}

impl ScaleFactorSource for FixedUpscaling {
    fn is_active(&self) -> bool { true }

    fn input_width(&self) -> f32 { self.input_width }

    fn output_width(&self) -> f32 { self.output_width }
}

/// Cached ratio of output resolution to render resolution.
///
/// Querying the renderer is assumed to be expensive, so the factor is refreshed at most
/// once per cooldown and only while the source reports upscaling as active.
#[derive(Resource)]
pub struct ScreenScale {
    factor:          f32,
    next_check_secs: f32,
    source:          Box<dyn ScaleFactorSource>,
}

impl Default for ScreenScale {
    fn default() -> Self { Self::new(NoUpscaling) }
}

impl ScreenScale {
    pub fn new(source: impl ScaleFactorSource) -> Self {
        Self {
            factor:          1.0,
            next_check_secs: 0.0,
            source:          Box::new(source),
        }
    }

    /// Swaps the source and forces a refresh on the next query
    pub fn set_source(&mut self, source: impl ScaleFactorSource) {
        self.source = Box::new(source);
        self.factor = 1.0;
        self.next_check_secs = 0.0;
    }

    /// Last computed factor without refreshing
    pub const fn cached(&self) -> f32 { self.factor }

    /// Returns the factor, refreshing it from the source when the cooldown has elapsed
    pub fn current(&mut self, now_secs: f32, cooldown_secs: f32) -> f32 {
        if now_secs >= self.next_check_secs && self.source.is_active() {
            self.next_check_secs = now_secs + cooldown_secs;
            let input = self.source.input_width();
            if input > 0.0 {
                self.factor = self.source.output_width() / input;
            }
        }
        self.factor
    }
}

// ============================================================================
// Text measurement
// ============================================================================

/// Measures the block a label's text occupies at a style's font size
pub trait MeasureText: Send + Sync + 'static {
    fn measure(&self, text: &str, style: &LabelStyle) -> Vec2;
}

/// Fixed advance and line height per glyph, relative to font size
#[derive(Debug, Clone, Copy)]
pub struct ApproximateMeasure {
    pub advance_ratio:     f32,
    pub line_height_ratio: f32,
}

impl Default for ApproximateMeasure {
    fn default() -> Self {
        Self {
            advance_ratio:     0.55,
            line_height_ratio: 1.2,
        }
    }
}

impl MeasureText for ApproximateMeasure {
    fn measure(&self, text: &str, style: &LabelStyle) -> Vec2 {
        let columns = text.lines().map(|line| line.chars().count()).max().unwrap_or(0);
        let rows = text.lines().count().max(1);

        Vec2::new(
            (columns as f32 * style.font_size * self.advance_ratio) + style.padding * 2.0,
            (rows as f32 * style.font_size * self.line_height_ratio) + style.padding * 2.0,
        )
    }
}

/// The text measurer used by the draw pass
#[derive(Resource)]
pub struct LabelMeasurer(pub Box<dyn MeasureText>);

impl Default for LabelMeasurer {
    fn default() -> Self { Self(Box::new(ApproximateMeasure::default())) }
}

impl LabelMeasurer {
    pub fn new(measure: impl MeasureText) -> Self { Self(Box::new(measure)) }

    pub fn measure(&self, text: &str, style: &LabelStyle) -> Vec2 { self.0.measure(text, style) }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::AtomicUsize;
    use std::sync::atomic::Ordering;

    use super::*;

    const VIEWPORT: Vec2 = Vec2::new(1920.0, 1080.0);

    fn camera_at_origin() -> ViewParams {
        let projection = Projection::Perspective(PerspectiveProjection {
            fov: std::f32::consts::FRAC_PI_2,
            ..default()
        });
        ViewParams::from_camera(&GlobalTransform::IDENTITY, &projection, VIEWPORT)
            .expect("perspective projection is supported")
    }

    #[test]
    fn point_ahead_projects_to_center() {
        let view = camera_at_origin();
        let projected = world_to_screen(&view, Vec3::new(0.0, 0.0, -10.0));
        assert!(projected.is_valid());
        assert!((projected.screen - VIEWPORT * 0.5).length() < 0.01);
    }

    #[test]
    fn points_behind_or_at_camera_are_invalid() {
        let view = camera_at_origin();
        assert!(!world_to_screen(&view, Vec3::new(0.0, 0.0, 10.0)).is_valid());
        assert!(!world_to_screen(&view, Vec3::new(5.0, 2.0, 0.0)).is_valid());

        let turned = GlobalTransform::from(
            Transform::from_xyz(3.0, 1.0, 2.0).looking_at(Vec3::new(10.0, 1.0, 2.0), Vec3::Y),
        );
        let projection = Projection::Perspective(PerspectiveProjection::default());
        let view = ViewParams::from_camera(&turned, &projection, VIEWPORT)
            .expect("perspective projection is supported");
        assert!(!world_to_screen(&view, Vec3::new(-4.0, 1.0, 2.0)).is_valid());
        assert!(world_to_screen(&view, Vec3::new(12.0, 1.0, 2.0)).is_valid());
    }

    #[test]
    fn up_and_right_grow_screen_coordinates() {
        let view = camera_at_origin();
        let center = world_to_screen(&view, Vec3::new(0.0, 0.0, -10.0)).screen;
        let up_right = world_to_screen(&view, Vec3::new(1.0, 1.0, -10.0)).screen;
        assert!(up_right.x > center.x);
        assert!(up_right.y > center.y);
    }

    #[test]
    fn label_rect_is_centered_and_sits_on_the_point() {
        let projected = Projected {
            screen: Vec2::new(500.0, 300.0),
            depth:  5.0,
        };
        let rect = label_rect(&projected, Vec2::new(40.0, 20.0), 1.0, 1080.0);
        assert_eq!(rect.center().x, 500.0);
        // y-down: bottom edge at 1080 - 300
        assert_eq!(rect.max.y, 780.0);
        assert_eq!(rect.size(), Vec2::new(40.0, 20.0));

        let scaled = label_rect(&projected, Vec2::new(40.0, 20.0), 2.0, 1080.0);
        assert_eq!(scaled.center().x, 1000.0);
        assert_eq!(scaled.max.y, 1560.0);
    }

    #[test]
    fn upscaled_label_stays_on_the_point_vertically() {
        // 960x540 render target shown at 1920x1080
        let center = Projected {
            screen: Vec2::new(480.0, 270.0),
            depth:  5.0,
        };
        let rect = label_rect(&center, Vec2::new(40.0, 20.0), 2.0, 540.0);
        assert_eq!(rect.min, Vec2::new(940.0, 520.0));
        assert_eq!(rect.max, Vec2::new(980.0, 540.0));

        let top = Projected {
            screen: Vec2::new(480.0, 540.0),
            depth:  5.0,
        };
        assert_eq!(label_rect(&top, Vec2::new(40.0, 20.0), 2.0, 540.0).max.y, 0.0);
    }

    struct CountingSource {
        queries: Arc<AtomicUsize>,
    }

    impl ScaleFactorSource for CountingSource {
        fn is_active(&self) -> bool { true }

        fn input_width(&self) -> f32 {
            self.queries.fetch_add(1, Ordering::Relaxed);
            1280.0
        }

        fn output_width(&self) -> f32 { 2560.0 }
    }

    #[test]
    fn scale_factor_refreshes_once_per_cooldown() {
        let queries = Arc::new(AtomicUsize::new(0));
        let mut scale = ScreenScale::new(CountingSource {
            queries: Arc::clone(&queries),
        });

        assert_eq!(scale.current(0.0, 10.0), 2.0);
        assert_eq!(scale.current(5.0, 10.0), 2.0);
        assert_eq!(scale.current(9.9, 10.0), 2.0);
        assert_eq!(queries.load(Ordering::Relaxed), 1);

        scale.current(10.0, 10.0);
        assert_eq!(queries.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn inactive_source_keeps_unit_scale() {
        let mut scale = ScreenScale::default();
        assert_eq!(scale.current(100.0, 10.0), 1.0);

        scale.set_source(FixedUpscaling {
            input_width:  960.0,
            output_width: 1920.0,
        });
        assert_eq!(scale.current(100.0, 10.0), 2.0);
    }

    #[test]
    fn approximate_measure_scales_with_font_size() {
        let measure = ApproximateMeasure::default();
        let small = LabelStyle {
            padding: 0.0,
            ..LabelStyle::default()
        };
        let large = small.scaled(2.0);

        let small_size = measure.measure("!!", &small);
        let large_size = measure.measure("!!", &large);
        assert!((large_size.x - small_size.x * 2.0).abs() < 0.01);
        assert!(measure.measure("", &small).x.abs() < f32::EPSILON);
    }
}

//! World-anchored text labels and the registry that draws them.
//!
//! An [`Annotation`] lives on its own entity; the entity id is its identity. The
//! [`AnnotationRegistry`] holds the ordered set of annotations to draw and the shared
//! [`LabelStyle`]s they refer to. Each frame [`draw_annotations`] projects every enabled
//! annotation and fills [`AnnotationDrawList`] with the rectangles to draw.

use bevy::prelude::*;

use crate::components::IndicatorCamera;
use crate::config::ThreatIndicatorConfig;
use crate::projection::LabelMeasurer;
use crate::projection::ScreenScale;
use crate::projection::ViewParams;
use crate::projection::label_rect;
use crate::projection::world_to_screen;

const DEFAULT_FONT_SIZE: f32 = 20.0;
const DEFAULT_PADDING: f32 = 3.0;

// ============================================================================
// Styles
// ============================================================================

/// Where text sits inside its label rectangle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Reflect)]
pub enum LabelAlignment {
    UpperLeft,
    UpperCenter,
    #[default]
    MiddleLeft,
    MiddleCenter,
    LowerCenter,
}

/// Text color for each interaction state of a label
#[derive(Debug, Clone, Copy, PartialEq, Reflect)]
pub struct StateColors {
    pub normal:  Color,
    pub hover:   Color,
    pub active:  Color,
    pub focused: Color,
}

impl StateColors {
    pub const fn splat(color: Color) -> Self {
        Self {
            normal:  color,
            hover:   color,
            active:  color,
            focused: color,
        }
    }

    pub const fn set_all(&mut self, color: Color) { *self = Self::splat(color); }
}

/// Visual style shared by many annotations
#[derive(Debug, Clone, PartialEq, Reflect)]
pub struct LabelStyle {
    pub font_size: f32,
    pub alignment: LabelAlignment,
    pub colors:    StateColors,
    /// Space between the text and the label rectangle, in pixels
    pub padding:   f32,
}

impl Default for LabelStyle {
    fn default() -> Self {
        Self {
            font_size: DEFAULT_FONT_SIZE,
            alignment: LabelAlignment::MiddleLeft,
            colors:    StateColors::splat(Color::WHITE),
            padding:   DEFAULT_PADDING,
        }
    }
}

impl LabelStyle {
    pub fn with_font_size(mut self, font_size: f32) -> Self {
        self.font_size = font_size;
        self
    }

    pub const fn with_alignment(mut self, alignment: LabelAlignment) -> Self {
        self.alignment = alignment;
        self
    }

    /// Snapshot of this style with the font size multiplied by `scale`, rounded to whole
    /// points. The shared style is left untouched.
    pub fn scaled(&self, scale: f32) -> Self {
        Self {
            font_size: (self.font_size * scale).round(),
            ..self.clone()
        }
    }
}

/// Handle to a style stored in the [`AnnotationRegistry`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Reflect)]
pub struct StyleId(usize);

// ============================================================================
// Annotation
// ============================================================================

/// A label anchored to a world position
#[derive(Component, Reflect, Debug, Clone)]
#[reflect(Component)]
pub struct Annotation {
    pub world_position: Vec3,
    /// Drawn when non-empty
    pub text:           String,
    /// Drawn when `text` is empty. Owners rewrite it in place each frame.
    pub dynamic_text:   String,
    /// `None` uses the registry's default style
    pub style:          Option<StyleId>,
    pub scale:          f32,
    /// Disabled annotations stay registered but are not drawn
    pub enabled:        bool,
}

impl Annotation {
    pub fn new(world_position: Vec3, text: impl Into<String>) -> Self {
        Self {
            world_position,
            text: text.into(),
            dynamic_text: String::new(),
            style: None,
            scale: 1.0,
            enabled: true,
        }
    }

    pub fn with_style(mut self, style: StyleId) -> Self {
        self.style = Some(style);
        self
    }

    pub fn with_scale(mut self, scale: f32) -> Self {
        self.scale = scale;
        self
    }

    /// The text to draw this frame
    pub fn display_text(&self) -> &str {
        if self.text.is_empty() {
            &self.dynamic_text
        } else {
            &self.text
        }
    }
}

// ============================================================================
// Registry
// ============================================================================

/// One label to draw this frame, in y-down screen coordinates
#[derive(Debug, Clone, PartialEq)]
pub struct LabelDraw {
    pub annotation: Entity,
    pub text:       String,
    pub rect:       Rect,
    pub font_size:  f32,
    pub color:      Color,
    pub alignment:  LabelAlignment,
}

/// Labels produced by the latest draw pass
#[derive(Resource, Debug, Default)]
pub struct AnnotationDrawList {
    pub labels: Vec<LabelDraw>,
}

/// Ordered set of annotations to draw, plus the styles they share
#[derive(Resource, Debug, Default)]
pub struct AnnotationRegistry {
    labels:        Vec<Entity>,
    styles:        Vec<LabelStyle>,
    default_style: Option<StyleId>,
}

impl AnnotationRegistry {
    pub fn len(&self) -> usize { self.labels.len() }

    pub fn is_empty(&self) -> bool { self.labels.is_empty() }

    pub fn contains(&self, entity: Entity) -> bool { self.labels.contains(&entity) }

    pub fn iter(&self) -> impl Iterator<Item = Entity> + '_ { self.labels.iter().copied() }

    /// Adds an annotation. Returns false if it was already registered.
    pub fn register(&mut self, entity: Entity) -> bool {
        if self.contains(entity) {
            return false;
        }
        self.labels.push(entity);
        true
    }

    /// Removes an annotation. Returns false if it was not registered.
    pub fn unregister(&mut self, entity: Entity) -> bool {
        let Some(index) = self.labels.iter().position(|label| *label == entity) else {
            return false;
        };
        self.labels.remove(index);
        true
    }

    /// Drops every registered annotation. Styles survive so handles stay valid.
    pub fn clear(&mut self) {
        if !self.labels.is_empty() {
            debug!("AnnotationRegistry: clearing {} labels", self.labels.len());
        }
        self.labels.clear();
    }

    pub fn add_style(&mut self, style: LabelStyle) -> StyleId {
        self.styles.push(style);
        StyleId(self.styles.len() - 1)
    }

    pub fn style(&self, id: StyleId) -> Option<&LabelStyle> { self.styles.get(id.0) }

    pub fn style_mut(&mut self, id: StyleId) -> Option<&mut LabelStyle> { self.styles.get_mut(id.0) }

    /// The default style, created on first use
    pub fn default_style(&mut self) -> StyleId {
        if let Some(id) = self.default_style {
            return id;
        }
        let id = self.add_style(LabelStyle::default());
        self.default_style = Some(id);
        id
    }

    /// Resolves a style handle to a snapshot, falling back to the default style
    fn resolve_style(&self, id: Option<StyleId>) -> LabelStyle {
        id.or(self.default_style)
            .and_then(|id| self.style(id))
            .cloned()
            .unwrap_or_default()
    }

    /// Spawns and registers an annotation.
    ///
    /// `color` is written to every state of the style, which changes the color of every
    /// annotation sharing that style.
    pub fn create_label(
        &mut self,
        commands: &mut Commands,
        world_position: Vec3,
        text: impl Into<String>,
        style: Option<StyleId>,
        scale: f32,
        color: Color,
    ) -> Entity {
        let style = style.unwrap_or_else(|| self.default_style());
        match self.style_mut(style) {
            Some(shared) => shared.colors.set_all(color),
            None => warn!("AnnotationRegistry: unknown style {style:?}, label keeps default colors"),
        }

        let annotation = Annotation::new(world_position, text)
            .with_style(style)
            .with_scale(scale);
        let entity = commands.spawn((annotation, Name::new("Annotation"))).id();
        self.register(entity);
        entity
    }

    /// Projects every enabled annotation and appends what to draw to `out`.
    ///
    /// Annotations behind the camera, and entities that no longer resolve, are skipped.
    pub fn draw_all<'a>(
        &self,
        lookup: impl Fn(Entity) -> Option<&'a Annotation>,
        view: &ViewParams,
        screen_scale: f32,
        measurer: &LabelMeasurer,
        out: &mut Vec<LabelDraw>,
    ) {
        for entity in self.iter() {
            let Some(annotation) = lookup(entity) else {
                continue;
            };
            if !annotation.enabled {
                continue;
            }

            let projected = world_to_screen(view, annotation.world_position);
            if !projected.is_valid() {
                continue;
            }

            let text = annotation.display_text();
            let style = self.resolve_style(annotation.style).scaled(annotation.scale);
            let size = measurer.measure(text, &style);
            let rect = label_rect(&projected, size, screen_scale, view.viewport.y);

            out.push(LabelDraw {
                annotation: entity,
                text: text.to_owned(),
                rect,
                font_size: style.font_size,
                color: style.colors.normal,
                alignment: style.alignment,
            });
        }
    }
}

/// Per-frame draw pass. Leaves the draw list empty until an `IndicatorCamera` with a
/// known viewport size exists.
pub fn draw_annotations(
    registry: Res<AnnotationRegistry>,
    annotations: Query<&Annotation>,
    camera_query: Query<(&Camera, &GlobalTransform, &Projection), With<IndicatorCamera>>,
    config: Res<ThreatIndicatorConfig>,
    time: Res<Time>,
    measurer: Res<LabelMeasurer>,
    mut screen_scale: ResMut<ScreenScale>,
    mut draw_list: ResMut<AnnotationDrawList>,
) {
    draw_list.labels.clear();

    let Ok((camera, cam_global, projection)) = camera_query.single() else {
        return;
    };
    // Fall back to an explicit viewport while the render target is not yet known
    let Some(viewport) = camera.logical_viewport_size().or_else(|| {
        camera
            .viewport
            .as_ref()
            .map(|viewport| viewport.physical_size.as_vec2())
    }) else {
        return;
    };
    let Some(view) = ViewParams::from_camera(cam_global, projection, viewport) else {
        return;
    };

    let scale = screen_scale.current(time.elapsed_secs(), config.screen_scale_cooldown_secs());
    let annotations = &annotations;
    registry.draw_all(
        move |entity| annotations.get(entity).ok(),
        &view,
        scale,
        &measurer,
        &mut draw_list.labels,
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    const VIEWPORT: Vec2 = Vec2::new(1280.0, 720.0);

    fn view() -> ViewParams {
        let projection = Projection::Perspective(PerspectiveProjection::default());
        ViewParams::from_camera(&GlobalTransform::IDENTITY, &projection, VIEWPORT)
            .expect("perspective projection is supported")
    }

    fn draw(world: &World, registry: &AnnotationRegistry) -> Vec<LabelDraw> {
        draw_scaled(world, registry, 1.0)
    }

    fn draw_scaled(world: &World, registry: &AnnotationRegistry, screen_scale: f32) -> Vec<LabelDraw> {
        let mut out = Vec::new();
        registry.draw_all(
            move |entity| world.get::<Annotation>(entity),
            &view(),
            screen_scale,
            &LabelMeasurer::default(),
            &mut out,
        );
        out
    }

    #[test]
    fn register_and_unregister_are_idempotent() {
        let mut world = World::new();
        let label = world.spawn(Annotation::new(Vec3::ZERO, "a")).id();
        let stranger = world.spawn_empty().id();
        let mut registry = AnnotationRegistry::default();

        assert!(registry.register(label));
        assert!(!registry.register(label));
        assert_eq!(registry.len(), 1);

        assert!(!registry.unregister(stranger));
        assert_eq!(registry.len(), 1);

        assert!(registry.unregister(label));
        assert!(!registry.unregister(label));
        assert!(registry.is_empty());
    }

    #[test]
    fn create_label_recolors_the_shared_style() {
        let mut world = World::new();
        let mut registry = AnnotationRegistry::default();
        let shared = registry.add_style(LabelStyle::default());

        let mut commands = world.commands();
        let first = registry.create_label(
            &mut commands,
            Vec3::ZERO,
            "first",
            Some(shared),
            1.0,
            Color::srgb(1.0, 0.0, 0.0),
        );
        let second = registry.create_label(
            &mut commands,
            Vec3::ZERO,
            "second",
            Some(shared),
            1.0,
            Color::srgb(0.0, 1.0, 0.0),
        );
        world.flush();

        assert_eq!(registry.len(), 2);
        assert!(world.get::<Annotation>(first).is_some());
        assert_eq!(
            world.get::<Annotation>(second).and_then(|a| a.style),
            Some(shared)
        );
        let style = registry.style(shared).expect("style exists");
        assert_eq!(style.colors, StateColors::splat(Color::srgb(0.0, 1.0, 0.0)));
    }

    #[test]
    fn default_style_is_created_once() {
        let mut registry = AnnotationRegistry::default();
        let first = registry.default_style();
        let second = registry.default_style();
        assert_eq!(first, second);
        assert_eq!(
            registry.style(first).map(|s| s.alignment),
            Some(LabelAlignment::MiddleLeft)
        );
    }

    #[test]
    fn draw_skips_disabled_and_behind_camera() {
        let mut world = World::new();
        let mut registry = AnnotationRegistry::default();

        let visible = world
            .spawn(Annotation::new(Vec3::new(0.0, 0.0, -10.0), "visible"))
            .id();
        let mut hidden = Annotation::new(Vec3::new(0.0, 0.0, -10.0), "hidden");
        hidden.enabled = false;
        let hidden = world.spawn(hidden).id();
        let behind = world
            .spawn(Annotation::new(Vec3::new(0.0, 0.0, 10.0), "behind"))
            .id();

        for entity in [visible, hidden, behind] {
            registry.register(entity);
        }

        let drawn = draw(&world, &registry);
        assert_eq!(drawn.len(), 1);
        assert_eq!(drawn[0].annotation, visible);
        assert!(drawn.iter().all(|label| {
            world
                .get::<Annotation>(label.annotation)
                .is_some_and(|a| a.enabled)
        }));
    }

    #[test]
    fn empty_text_falls_back_to_dynamic_buffer() {
        let mut world = World::new();
        let mut registry = AnnotationRegistry::default();

        let mut annotation = Annotation::new(Vec3::new(0.0, 0.0, -5.0), "");
        annotation.dynamic_text.push_str("12m");
        let entity = world.spawn(annotation).id();
        registry.register(entity);

        let drawn = draw(&world, &registry);
        assert_eq!(drawn[0].text, "12m");
    }

    #[test]
    fn scale_is_applied_to_a_snapshot_of_the_style() {
        let mut world = World::new();
        let mut registry = AnnotationRegistry::default();
        let style = registry.add_style(LabelStyle::default().with_font_size(20.0));

        let entity = world
            .spawn(
                Annotation::new(Vec3::new(0.0, 0.0, -5.0), "!")
                    .with_style(style)
                    .with_scale(0.5),
            )
            .id();
        registry.register(entity);

        let drawn = draw(&world, &registry);
        assert_eq!(drawn[0].font_size, 10.0);
        assert_eq!(registry.style(style).map(|s| s.font_size), Some(20.0));
    }

    #[test]
    fn upscaled_draw_places_labels_in_output_pixels() {
        let mut world = World::new();
        let mut registry = AnnotationRegistry::default();
        let entity = world
            .spawn(Annotation::new(Vec3::new(0.0, 0.0, -10.0), "!"))
            .id();
        registry.register(entity);

        let native = draw(&world, &registry);
        let upscaled = draw_scaled(&world, &registry, 2.0);

        // Dead ahead projects to the viewport center at any scale
        let rect = native[0].rect;
        assert!((rect.center().x - VIEWPORT.x * 0.5).abs() < 1e-3);
        assert!((rect.max.y - VIEWPORT.y * 0.5).abs() < 1e-3);

        let rect = upscaled[0].rect;
        assert!((rect.center().x - VIEWPORT.x).abs() < 1e-3);
        assert!((rect.max.y - VIEWPORT.y).abs() < 1e-3);
        assert_eq!(rect.size(), native[0].rect.size());
    }

    #[test]
    fn stale_entities_are_skipped_and_clear_empties_the_set() {
        let mut world = World::new();
        let mut registry = AnnotationRegistry::default();

        let entity = world
            .spawn(Annotation::new(Vec3::new(0.0, 0.0, -5.0), "gone"))
            .id();
        registry.register(entity);
        world.despawn(entity);

        assert!(draw(&world, &registry).is_empty());

        registry.clear();
        assert!(registry.is_empty());
        assert!(!registry.unregister(entity));
    }
}

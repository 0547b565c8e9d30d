//! Per-threat tracker that keeps one indicator label in sync with its threat.

use bevy::camera::primitives::Aabb;
use bevy::prelude::*;

use crate::annotation::Annotation;
use crate::annotation::AnnotationRegistry;
use crate::annotation::StyleId;
use crate::components::IndicatorCamera;
use crate::config::ThreatIndicatorConfig;
use crate::manager::ThreatTrackerManager;
use crate::occlusion::Occluder;
use crate::occlusion::line_of_sight_blocked;
use crate::trail::ThreatTrail;
use crate::trail::TrailSettings;

/// Indicators are hidden at or beyond this distance from the viewpoint
pub const MAX_INDICATE_DISTANCE: f32 = 40.0;
/// Smallest distance scale, so labels at the edge of range stay readable
pub const MIN_SCALE: f32 = 0.2;

/// Label scale for a threat `distance` meters away
pub fn indicator_scale(distance: f32, size_multiplier: f32) -> f32 {
    let falloff = distance.clamp(0.0, MAX_INDICATE_DISTANCE) / MAX_INDICATE_DISTANCE;
    (1.0 - falloff).clamp(MIN_SCALE, 1.0) * size_multiplier
}

/// Whether a threat `distance` meters away gets an indicator. The occlusion check only
/// runs when the threat is in range and line of sight is required.
pub fn is_indicated(distance: f32, require_line_of_sight: bool, blocked: impl FnOnce() -> bool) -> bool {
    distance < MAX_INDICATE_DISTANCE && (!require_line_of_sight || !blocked())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Reflect)]
pub enum TrackerState {
    Tracking,
    Disposed,
}

/// Owns the indicator label, and optionally the trail, of one threat
#[derive(Debug)]
pub struct ThreatTracker {
    threat: Entity,
    label:  Entity,
    trail:  Option<Entity>,
    state:  TrackerState,
}

impl ThreatTracker {
    /// Creates the label (and trail, if enabled) for a threat at `position`
    pub fn spawn(
        commands: &mut Commands,
        registry: &mut AnnotationRegistry,
        threat: Entity,
        position: Vec3,
        style: StyleId,
        config: &ThreatIndicatorConfig,
    ) -> Self {
        let text = if config.show_distance {
            String::new()
        } else {
            config.indicator_text.clone()
        };
        let label = registry.create_label(
            commands,
            position,
            text,
            Some(style),
            1.0,
            config.color.to_color(),
        );

        let trail = config.trail_enabled.then(|| {
            commands
                .spawn((
                    ThreatTrail::new(TrailSettings::from_config(config)),
                    Name::new("Threat trail"),
                ))
                .id()
        });

        Self {
            threat,
            label,
            trail,
            state: TrackerState::Tracking,
        }
    }

    pub const fn threat(&self) -> Entity { self.threat }

    pub const fn label(&self) -> Entity { self.label }

    pub const fn trail(&self) -> Option<Entity> { self.trail }

    pub const fn state(&self) -> TrackerState { self.state }

    pub fn is_tracking(&self) -> bool { self.state == TrackerState::Tracking }

    /// Moves the label to `position` and recomputes its visibility, scale and text
    pub fn apply(
        &self,
        annotation: &mut Annotation,
        position: Vec3,
        viewpoint: Vec3,
        config: &ThreatIndicatorConfig,
        blocked: impl FnOnce() -> bool,
    ) {
        if !self.is_tracking() {
            return;
        }

        annotation.world_position = position;

        let distance = position.distance(viewpoint);
        annotation.enabled = is_indicated(distance, config.require_line_of_sight, blocked);
        annotation.scale = indicator_scale(distance, config.indicator_size());

        if config.show_distance {
            annotation.text.clear();
            annotation.dynamic_text.clear();
            annotation
                .dynamic_text
                .push_str(&format!("{} {distance:.0}m", config.indicator_text));
        } else if annotation.text.is_empty() {
            annotation.text.push_str(&config.indicator_text);
        }
    }

    /// Removes the label and trail. Safe to call more than once.
    pub fn dispose(&mut self, commands: &mut Commands, registry: &mut AnnotationRegistry) {
        if self.state == TrackerState::Disposed {
            return;
        }
        self.state = TrackerState::Disposed;

        registry.unregister(self.label);
        commands.entity(self.label).try_despawn();
        if let Some(trail) = self.trail.take() {
            commands.entity(trail).try_despawn();
        }
    }
}

/// Updates every live tracker from its threat's current position.
/// A label whose threat no longer resolves is hidden until the tracker is disposed.
pub fn update_threat_trackers(
    manager: Res<ThreatTrackerManager>,
    config: Res<ThreatIndicatorConfig>,
    time: Res<Time>,
    viewpoint_query: Query<&GlobalTransform, With<IndicatorCamera>>,
    transform_query: Query<&GlobalTransform>,
    occluder_query: Query<(&Occluder, &Aabb, &GlobalTransform)>,
    mut annotation_query: Query<&mut Annotation>,
    mut trail_query: Query<&mut ThreatTrail>,
) {
    let Ok(viewpoint) = viewpoint_query.single() else {
        return;
    };
    let viewpoint = viewpoint.translation();
    let now = time.elapsed_secs();

    for tracker in manager.trackers() {
        let Ok(mut annotation) = annotation_query.get_mut(tracker.label()) else {
            continue;
        };
        let Ok(threat_transform) = transform_query.get(tracker.threat()) else {
            annotation.enabled = false;
            continue;
        };

        let position = threat_transform.translation();
        tracker.apply(&mut annotation, position, viewpoint, &config, || {
            line_of_sight_blocked(
                viewpoint,
                position,
                occluder_query.iter(),
                config.occlusion_layers,
            )
        });

        let Some(trail_entity) = tracker.trail() else {
            continue;
        };
        if let Ok(mut trail) = trail_query.get_mut(trail_entity) {
            trail.record(position, now);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scale_never_grows_with_distance() {
        let mut previous = f32::INFINITY;
        for step in 0..=400 {
            let distance = step as f32 * 0.1;
            let scale = indicator_scale(distance, 1.0);
            assert!(scale <= previous, "scale grew at {distance}");
            previous = scale;
        }
    }

    #[test]
    fn scale_at_thirty_meters_is_a_quarter() {
        assert!((indicator_scale(30.0, 1.0) - 0.25).abs() < 1e-6);
        assert!((indicator_scale(30.0, 2.0) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn scale_is_floored_near_the_edge_of_range() {
        assert_eq!(indicator_scale(39.0, 1.0), MIN_SCALE);
        assert_eq!(indicator_scale(500.0, 1.0), MIN_SCALE);
        assert_eq!(indicator_scale(-5.0, 1.0), 1.0);
    }

    #[test]
    fn out_of_range_is_never_indicated() {
        assert!(!is_indicated(MAX_INDICATE_DISTANCE, false, || false));
        assert!(!is_indicated(55.0, true, || false));
    }

    #[test]
    fn blocked_line_of_sight_hides_in_range_threats() {
        assert!(!is_indicated(10.0, true, || true));
        assert!(is_indicated(10.0, true, || false));
        // Not required: the ray result is ignored
        assert!(is_indicated(10.0, false, || true));
    }

    #[test]
    fn occlusion_is_not_queried_out_of_range() {
        let mut queried = false;
        is_indicated(80.0, true, || {
            queried = true;
            true
        });
        assert!(!queried);
    }

    fn tracker_in(world: &mut World, config: &ThreatIndicatorConfig) -> (ThreatTracker, AnnotationRegistry) {
        let mut registry = AnnotationRegistry::default();
        let style = registry.default_style();
        let threat = world.spawn(GlobalTransform::default()).id();
        let mut commands = world.commands();
        let tracker =
            ThreatTracker::spawn(&mut commands, &mut registry, threat, Vec3::ZERO, style, config);
        world.flush();
        (tracker, registry)
    }

    #[test]
    fn apply_writes_position_visibility_and_scale() {
        let mut world = World::new();
        let config = ThreatIndicatorConfig {
            require_line_of_sight: false,
            ..default()
        };
        let (tracker, _registry) = tracker_in(&mut world, &config);

        let mut annotation = world
            .get::<Annotation>(tracker.label())
            .cloned()
            .expect("label spawned");
        let position = Vec3::new(0.0, 0.0, -30.0);
        tracker.apply(&mut annotation, position, Vec3::ZERO, &config, || true);

        assert_eq!(annotation.world_position, position);
        assert!(annotation.enabled);
        assert!((annotation.scale - 0.25).abs() < 1e-6);

        tracker.apply(
            &mut annotation,
            Vec3::new(0.0, 0.0, -45.0),
            Vec3::ZERO,
            &config,
            || false,
        );
        assert!(!annotation.enabled);
    }

    #[test]
    fn distance_text_is_written_into_the_dynamic_buffer() {
        let mut world = World::new();
        let config = ThreatIndicatorConfig {
            show_distance: true,
            require_line_of_sight: false,
            ..default()
        };
        let (tracker, _registry) = tracker_in(&mut world, &config);

        let mut annotation = world
            .get::<Annotation>(tracker.label())
            .cloned()
            .expect("label spawned");
        tracker.apply(&mut annotation, Vec3::new(12.0, 0.0, 0.0), Vec3::ZERO, &config, || false);

        assert!(annotation.text.is_empty());
        assert_eq!(annotation.display_text(), "! 12m");

        tracker.apply(&mut annotation, Vec3::new(5.0, 0.0, 0.0), Vec3::ZERO, &config, || false);
        assert_eq!(annotation.display_text(), "! 5m");
    }

    #[test]
    fn dispose_is_idempotent() {
        let mut world = World::new();
        let config = ThreatIndicatorConfig::default();
        let (mut tracker, mut registry) = tracker_in(&mut world, &config);
        let label = tracker.label();
        let trail = tracker.trail().expect("trail enabled by default");
        assert_eq!(registry.len(), 1);

        let mut commands = world.commands();
        tracker.dispose(&mut commands, &mut registry);
        tracker.dispose(&mut commands, &mut registry);
        world.flush();

        assert_eq!(tracker.state(), TrackerState::Disposed);
        assert!(registry.is_empty());
        assert!(world.get_entity(label).is_err());
        assert!(world.get_entity(trail).is_err());
    }
}

//! Fading trail left behind a tracked threat.

use std::collections::VecDeque;

use bevy::prelude::*;

use crate::config::ThreatIndicatorConfig;

/// Points closer than this to the previous sample are not recorded
const MIN_POINT_SPACING: f32 = 0.05;

/// Appearance of a trail, fixed when the trail is created
#[derive(Debug, Clone, Copy, PartialEq, Reflect)]
pub struct TrailSettings {
    pub width:         f32,
    pub color:         Color,
    pub casts_shadows: bool,
    /// Seconds a point stays visible before it has faded out
    pub lifetime_secs: f32,
}

impl TrailSettings {
    pub fn from_config(config: &ThreatIndicatorConfig) -> Self {
        Self {
            width:         config.trail_width(),
            color:         config.trail_color.to_color(),
            casts_shadows: config.trail_casts_shadows,
            lifetime_secs: config.trail_lifetime_secs(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Reflect)]
pub struct TrailPoint {
    pub position:      Vec3,
    pub recorded_secs: f32,
}

/// Recent positions of a threat, oldest first
#[derive(Component, Reflect, Debug, Clone)]
#[reflect(Component)]
pub struct ThreatTrail {
    settings: TrailSettings,
    points:   VecDeque<TrailPoint>,
}

impl ThreatTrail {
    pub const fn new(settings: TrailSettings) -> Self {
        Self {
            settings,
            points: VecDeque::new(),
        }
    }

    pub const fn settings(&self) -> &TrailSettings { &self.settings }

    pub fn points(&self) -> impl Iterator<Item = &TrailPoint> { self.points.iter() }

    pub fn len(&self) -> usize { self.points.len() }

    pub fn is_empty(&self) -> bool { self.points.is_empty() }

    /// Drops expired points, then samples `position` if it moved far enough
    pub fn record(&mut self, position: Vec3, now_secs: f32) {
        self.prune(now_secs);

        let moved = self
            .points
            .back()
            .is_none_or(|last| last.position.distance_squared(position) >= MIN_POINT_SPACING.powi(2));
        if moved {
            self.points.push_back(TrailPoint {
                position,
                recorded_secs: now_secs,
            });
        }
    }

    /// Drops points older than the trail's lifetime
    pub fn prune(&mut self, now_secs: f32) {
        let lifetime = self.settings.lifetime_secs;
        while self
            .points
            .front()
            .is_some_and(|point| now_secs - point.recorded_secs > lifetime)
        {
            self.points.pop_front();
        }
    }

    /// Opacity of a point, 1.0 when fresh down to 0.0 at the end of its lifetime
    pub fn fade(&self, point: &TrailPoint, now_secs: f32) -> f32 {
        if self.settings.lifetime_secs <= 0.0 {
            return 0.0;
        }
        (1.0 - (now_secs - point.recorded_secs) / self.settings.lifetime_secs).clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trail() -> ThreatTrail {
        ThreatTrail::new(TrailSettings {
            width:         0.05,
            color:         Color::WHITE,
            casts_shadows: false,
            lifetime_secs: 1.0,
        })
    }

    #[test]
    fn stationary_samples_are_not_duplicated() {
        let mut trail = trail();
        trail.record(Vec3::ZERO, 0.0);
        trail.record(Vec3::ZERO, 0.1);
        trail.record(Vec3::new(0.01, 0.0, 0.0), 0.2);
        assert_eq!(trail.len(), 1);

        trail.record(Vec3::new(1.0, 0.0, 0.0), 0.3);
        assert_eq!(trail.len(), 2);
    }

    #[test]
    fn expired_points_are_pruned() {
        let mut trail = trail();
        trail.record(Vec3::ZERO, 0.0);
        trail.record(Vec3::X, 0.5);
        trail.record(Vec3::Y, 1.2);

        let remaining: Vec<Vec3> = trail.points().map(|p| p.position).collect();
        assert_eq!(remaining, vec![Vec3::X, Vec3::Y]);

        trail.prune(3.0);
        assert!(trail.is_empty());
    }

    #[test]
    fn fade_goes_from_opaque_to_transparent() {
        let trail = trail();
        let point = TrailPoint {
            position:      Vec3::ZERO,
            recorded_secs: 2.0,
        };
        assert_eq!(trail.fade(&point, 2.0), 1.0);
        assert!((trail.fade(&point, 2.5) - 0.5).abs() < 1e-6);
        assert_eq!(trail.fade(&point, 4.0), 0.0);
    }

    #[test]
    fn settings_follow_config() {
        let config = ThreatIndicatorConfig {
            trail_width: 0.2,
            trail_casts_shadows: true,
            ..default()
        };
        let settings = TrailSettings::from_config(&config);
        assert_eq!(settings.width, 0.2);
        assert!(settings.casts_shadows);
        assert_eq!(settings.color, config.trail_color.to_color());
    }
}

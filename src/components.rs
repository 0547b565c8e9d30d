//! Marker components the host places in its world.

use bevy::prelude::*;

/// Marks the camera whose viewpoint drives distance, occlusion and projection.
#[derive(Component, Reflect, Debug, Default, Clone, Copy)]
#[reflect(Component)]
pub struct IndicatorCamera;

/// Marks the root entity of a world session.
///
/// Adding it starts a session (the plugin's attach point). Removing it, or despawning the
/// entity, ends the session: every tracker is disposed and the annotation registry is
/// cleared.
#[derive(Component, Reflect, Debug, Default, Clone, Copy)]
#[reflect(Component)]
pub struct ThreatSession;

/// Marks the entity that emits `ThreatThrown` events.
/// It may appear some frames after the session starts; the tracker manager keeps looking
/// until it exists.
#[derive(Component, Reflect, Debug, Default, Clone, Copy)]
#[reflect(Component)]
pub struct ThreatEventSource;

/// Tags observer entities spawned by the tracker manager, one per live subscription.
#[derive(Component, Debug, Clone, Copy)]
pub struct ThreatSubscription {
    /// The entity whose events the observer listens to
    pub watched: Entity,
}

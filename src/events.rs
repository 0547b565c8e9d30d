//! Events exchanged with the host.

use bevy::prelude::*;

// ============================================================================
// Consumed from the host
// ============================================================================

/// A threat was thrown. Triggered by the host on its `ThreatEventSource` entity.
#[derive(EntityEvent, Reflect)]
#[reflect(Event, FromReflect)]
pub struct ThreatThrown {
    #[event_target]
    pub source:   Entity,
    pub threat:   Entity,
    /// World position at the moment of the throw
    pub position: Vec3,
    pub velocity: Vec3,
}

impl ThreatThrown {
    pub const fn new(source: Entity, threat: Entity, position: Vec3, velocity: Vec3) -> Self {
        Self {
            source,
            threat,
            position,
            velocity,
        }
    }
}

/// A threat is about to be destroyed. Triggered by the host on the threat entity.
#[derive(EntityEvent, Reflect)]
#[reflect(Event, FromReflect)]
pub struct ThreatDestroyed {
    #[event_target]
    pub threat: Entity,
}

impl ThreatDestroyed {
    pub const fn new(threat: Entity) -> Self { Self { threat } }
}

// ============================================================================
// Tracking lifecycle
// ============================================================================

/// Fired when a tracker starts following a threat.
#[derive(EntityEvent, Reflect)]
#[reflect(Event, FromReflect)]
pub struct TrackingBegin {
    #[event_target]
    pub threat: Entity,
    pub label:  Entity,
}

/// Fired when a tracker is disposed by its threat's destroy event or by the threat being
/// despawned. Session teardown disposes trackers silently.
#[derive(EntityEvent, Reflect)]
#[reflect(Event, FromReflect)]
pub struct TrackingEnd {
    #[event_target]
    pub threat: Entity,
}

//! Tracker manager: turns throw/destroy events into tracker lifecycles.
//!
//! Subscriptions are observer entities tagged with [`ThreatSubscription`]. The throw
//! subscription watches the host's [`ThreatEventSource`] and is created at most once per
//! session. Each tracked threat gets its own destroy subscription. Every disposal path
//! despawns the matching observer, so no subscription outlives its session.

use std::collections::HashMap;

use bevy::prelude::*;

use crate::annotation::AnnotationRegistry;
use crate::annotation::LabelAlignment;
use crate::annotation::LabelStyle;
use crate::annotation::StyleId;
use crate::components::IndicatorCamera;
use crate::components::ThreatEventSource;
use crate::components::ThreatSession;
use crate::components::ThreatSubscription;
use crate::config::ThreatIndicatorConfig;
use crate::error::IndicatorError;
use crate::error::IndicatorResult;
use crate::events::ThreatDestroyed;
use crate::events::ThreatThrown;
use crate::events::TrackingBegin;
use crate::events::TrackingEnd;
use crate::tracker::ThreatTracker;

/// Throws farther than this from the viewpoint are never tracked
pub const MAX_TRACKING_DISTANCE: f32 = 125.0;
const MAX_TRACKING_DISTANCE_SQUARED: f32 = MAX_TRACKING_DISTANCE * MAX_TRACKING_DISTANCE;

/// State of the throw-event subscription
#[derive(Debug, Clone, Copy, PartialEq)]
enum Subscription {
    /// Looking for the event source; next lookup at `next_attempt_secs`
    Pending { next_attempt_secs: f32 },
    Subscribed { observer: Entity },
}

impl Default for Subscription {
    fn default() -> Self {
        Self::Pending {
            next_attempt_secs: 0.0,
        }
    }
}

#[derive(Debug)]
struct TrackedThreat {
    tracker:              ThreatTracker,
    destroy_subscription: Entity,
}

/// Owns one tracker per live tracked threat
#[derive(Resource, Debug, Default)]
pub struct ThreatTrackerManager {
    session:         Option<Entity>,
    subscription:    Subscription,
    tracked:         HashMap<Entity, TrackedThreat>,
    indicator_style: Option<StyleId>,
}

impl ThreatTrackerManager {
    pub const fn session(&self) -> Option<Entity> { self.session }

    pub const fn is_subscribed(&self) -> bool {
        matches!(self.subscription, Subscription::Subscribed { .. })
    }

    pub fn len(&self) -> usize { self.tracked.len() }

    pub fn is_empty(&self) -> bool { self.tracked.is_empty() }

    pub fn is_tracking(&self, threat: Entity) -> bool { self.tracked.contains_key(&threat) }

    pub fn tracker(&self, threat: Entity) -> Option<&ThreatTracker> {
        self.tracked.get(&threat).map(|tracked| &tracked.tracker)
    }

    pub fn trackers(&self) -> impl Iterator<Item = &ThreatTracker> {
        self.tracked.values().map(|tracked| &tracked.tracker)
    }

    /// Number of live event subscriptions owned by the manager
    pub fn subscription_count(&self) -> usize {
        usize::from(self.is_subscribed()) + self.tracked.len()
    }

    /// Starts a session rooted at `session`. Attaching the active session again is a no-op.
    pub fn begin_session(&mut self, session: Entity) -> IndicatorResult<()> {
        match self.session {
            Some(active) if active == session => Ok(()),
            Some(active) => Err(IndicatorError::session_already_active(active, session)),
            None => {
                self.session = Some(session);
                self.subscription = Subscription::default();
                info!("ThreatTrackerManager: session {session} started");
                Ok(())
            },
        }
    }

    fn retry_due(&self, now_secs: f32) -> bool {
        matches!(
            self.subscription,
            Subscription::Pending { next_attempt_secs } if now_secs >= next_attempt_secs
        )
    }

    fn subscribe(&mut self, commands: &mut Commands, source: Entity) {
        if self.is_subscribed() {
            return;
        }
        let observer = commands
            .spawn((
                Observer::new(on_threat_thrown).with_entity(source),
                ThreatSubscription { watched: source },
                Name::new("ThreatThrown subscription"),
            ))
            .id();
        self.subscription = Subscription::Subscribed { observer };
        info!("ThreatTrackerManager: subscribed to throw events from {source}");
    }

    /// The style shared by every indicator label, created on first use
    fn indicator_style(
        &mut self,
        registry: &mut AnnotationRegistry,
        config: &ThreatIndicatorConfig,
    ) -> StyleId {
        let style = *self.indicator_style.get_or_insert_with(|| {
            registry.add_style(LabelStyle::default().with_alignment(LabelAlignment::MiddleCenter))
        });
        if let Some(shared) = registry.style_mut(style) {
            shared.font_size = config.font_size();
        }
        style
    }

    /// Creates a tracker for `threat` and returns its label, or `None` if it is already tracked.
    pub fn start_tracking(
        &mut self,
        commands: &mut Commands,
        registry: &mut AnnotationRegistry,
        config: &ThreatIndicatorConfig,
        threat: Entity,
        position: Vec3,
    ) -> Option<Entity> {
        if self.is_tracking(threat) {
            return None;
        }

        let destroy_subscription = commands
            .spawn((
                Observer::new(on_threat_destroyed).with_entity(threat),
                ThreatSubscription { watched: threat },
                Name::new("ThreatDestroyed subscription"),
            ))
            .id();

        let style = self.indicator_style(registry, config);
        let tracker = ThreatTracker::spawn(commands, registry, threat, position, style, config);
        let label = tracker.label();

        self.tracked.insert(
            threat,
            TrackedThreat {
                tracker,
                destroy_subscription,
            },
        );
        Some(label)
    }

    /// Disposes the tracker for `threat`. Returns false if it was not tracked.
    pub fn stop_tracking(
        &mut self,
        commands: &mut Commands,
        registry: &mut AnnotationRegistry,
        threat: Entity,
    ) -> bool {
        let Some(mut tracked) = self.tracked.remove(&threat) else {
            return false;
        };
        commands.entity(tracked.destroy_subscription).try_despawn();
        tracked.tracker.dispose(commands, registry);
        true
    }

    /// Drops every subscription and tracker and ends the session.
    /// Returns the number of trackers disposed.
    pub fn teardown(&mut self, commands: &mut Commands, registry: &mut AnnotationRegistry) -> usize {
        if let Subscription::Subscribed { observer } = self.subscription {
            commands.entity(observer).try_despawn();
        }
        self.subscription = Subscription::default();

        let disposed = self.tracked.len();
        for (_, mut tracked) in self.tracked.drain() {
            commands.entity(tracked.destroy_subscription).try_despawn();
            tracked.tracker.dispose(commands, registry);
        }

        self.session = None;
        disposed
    }
}

// ============================================================================
// Systems
// ============================================================================

/// Looks for the throw event source until it is found, then subscribes once.
pub fn subscribe_to_threat_source(
    mut commands: Commands,
    mut manager: ResMut<ThreatTrackerManager>,
    config: Res<ThreatIndicatorConfig>,
    time: Res<Time>,
    source_query: Query<Entity, With<ThreatEventSource>>,
) {
    if manager.session.is_none() || manager.is_subscribed() {
        return;
    }

    let now = time.elapsed_secs();
    if !manager.retry_due(now) {
        return;
    }

    match source_query.iter().next() {
        Some(source) => manager.subscribe(&mut commands, source),
        None => {
            debug!("ThreatTrackerManager: no throw event source yet, retrying");
            manager.subscription = Subscription::Pending {
                next_attempt_secs: now + config.subscribe_retry_secs(),
            };
        },
    }
}

// ============================================================================
// Observers
// ============================================================================

/// Observer for `ThreatThrown` - starts tracking qualifying throws
pub fn on_threat_thrown(
    thrown: On<ThreatThrown>,
    mut commands: Commands,
    mut manager: ResMut<ThreatTrackerManager>,
    mut registry: ResMut<AnnotationRegistry>,
    config: Res<ThreatIndicatorConfig>,
    viewpoint_query: Query<&GlobalTransform, With<IndicatorCamera>>,
    transform_query: Query<&GlobalTransform>,
) {
    let threat = thrown.threat;
    let position = thrown.position;

    if !config.enabled {
        return;
    }

    if transform_query.get(threat).is_err() {
        debug!("ThreatThrown: threat {threat} has no transform, ignoring");
        return;
    }

    let Ok(viewpoint) = viewpoint_query.single() else {
        debug!("ThreatThrown: no indicator camera, ignoring {threat}");
        return;
    };

    let distance_squared = position.distance_squared(viewpoint.translation());
    if distance_squared > MAX_TRACKING_DISTANCE_SQUARED {
        return;
    }

    let Some(label) =
        manager.start_tracking(&mut commands, &mut registry, &config, threat, position)
    else {
        return;
    };

    debug!(
        "ThreatThrown: tracking {threat} at {:.1}m, velocity={:.1?}",
        distance_squared.sqrt(),
        thrown.velocity
    );
    commands.trigger(TrackingBegin { threat, label });
}

/// Observer for `ThreatDestroyed` - disposes the threat's tracker
pub fn on_threat_destroyed(
    destroyed: On<ThreatDestroyed>,
    mut commands: Commands,
    mut manager: ResMut<ThreatTrackerManager>,
    mut registry: ResMut<AnnotationRegistry>,
) {
    let threat = destroyed.threat;
    if manager.stop_tracking(&mut commands, &mut registry, threat) {
        commands.trigger(TrackingEnd { threat });
    }
}

/// Observer that disposes the tracker of a threat the host despawned without a destroy
/// event. Entity-scoped subscriptions on the threat go away with it, so this one is global.
pub fn on_threat_despawned(
    despawn: On<Despawn, GlobalTransform>,
    mut commands: Commands,
    mut manager: ResMut<ThreatTrackerManager>,
    mut registry: ResMut<AnnotationRegistry>,
) {
    let threat = despawn.entity;
    if !manager.is_tracking(threat) {
        return;
    }
    if manager.stop_tracking(&mut commands, &mut registry, threat) {
        debug!("ThreatTrackerManager: {threat} despawned while tracked");
        commands.trigger(TrackingEnd { threat });
    }
}

/// Observer that starts a session when `ThreatSession` is added. Rejected attaches are
/// logged and otherwise ignored.
pub fn on_session_attach(add: On<Add, ThreatSession>, mut manager: ResMut<ThreatTrackerManager>) {
    if let Err(error) = manager.begin_session(add.entity) {
        error!("ThreatTrackerManager: {error}");
    }
}

/// Observer that tears everything down when the active session's `ThreatSession` goes away.
/// Another `ThreatSession` still in the world, rejected earlier, takes over.
pub fn on_session_detach(
    remove: On<Remove, ThreatSession>,
    mut commands: Commands,
    mut manager: ResMut<ThreatTrackerManager>,
    mut registry: ResMut<AnnotationRegistry>,
    session_query: Query<Entity, With<ThreatSession>>,
) {
    let session = remove.entity;
    if manager.session() != Some(session) {
        return;
    }

    let disposed = manager.teardown(&mut commands, &mut registry);
    registry.clear();
    info!("ThreatTrackerManager: session {session} ended, disposed {disposed} trackers");

    // The removed marker is still visible to queries while its observers run
    let Some(next) = session_query.iter().find(|&entity| entity != session) else {
        return;
    };
    if let Err(error) = manager.begin_session(next) {
        error!("ThreatTrackerManager: {error}");
    }
}

// bevy_threat_indicator
// Screen-space indicators for thrown threats:
// - World-anchored text labels drawn through a shared registry
// - Per-threat trackers with distance scaling and line-of-sight occlusion
// - Optional fading trails behind tracked threats

use bevy::prelude::*;

mod annotation;
mod components;
mod config;
mod error;
mod events;
mod manager;
mod occlusion;
pub mod prelude;
mod projection;
mod tracker;
mod trail;
#[cfg(feature = "visualization")]
mod visualization;

// Public API - Events
pub use events::ThreatDestroyed;
pub use events::ThreatThrown;
pub use events::TrackingBegin;
pub use events::TrackingEnd;

// Public API - Components (for spawning and querying)
pub use annotation::Annotation;
pub use components::IndicatorCamera;
pub use components::ThreatEventSource;
pub use components::ThreatSession;
pub use components::ThreatSubscription;
pub use occlusion::Occluder;
pub use trail::ThreatTrail;

// Public API - Annotation types
pub use annotation::AnnotationDrawList;
pub use annotation::AnnotationRegistry;
pub use annotation::LabelAlignment;
pub use annotation::LabelDraw;
pub use annotation::LabelStyle;
pub use annotation::StateColors;
pub use annotation::StyleId;

// Public API - Tracking
pub use manager::MAX_TRACKING_DISTANCE;
pub use manager::ThreatTrackerManager;
pub use tracker::MAX_INDICATE_DISTANCE;
pub use tracker::MIN_SCALE;
pub use tracker::ThreatTracker;
pub use tracker::TrackerState;
pub use tracker::indicator_scale;
pub use trail::TrailPoint;
pub use trail::TrailSettings;

// Public API - Configuration resources
pub use config::ConfigOption;
pub use config::FloatRange;
pub use config::IndicatorColor;
pub use config::OptionKind;
pub use config::ThreatIndicatorConfig;
pub use occlusion::OcclusionLayers;

// Public API - Projection and measurement seams
pub use projection::ApproximateMeasure;
pub use projection::FixedUpscaling;
pub use projection::LabelMeasurer;
pub use projection::MeasureText;
pub use projection::NoUpscaling;
pub use projection::Projected;
pub use projection::ScaleFactorSource;
pub use projection::ScreenScale;
pub use projection::ViewParams;
pub use projection::label_rect;
pub use projection::world_to_screen;

// Public API - Utility functions
pub use occlusion::line_of_sight_blocked;
pub use occlusion::segment_hits_box;

// Public API - Errors
pub use error::IndicatorError;
pub use error::IndicatorResult;

// Public API - Plugins
#[cfg(feature = "visualization")]
pub use visualization::ThreatVisualizationPlugin;

// Internal - used by plugin, not for external use
use annotation::draw_annotations;
use config::report_invalid_config;
use manager::{on_session_attach, on_session_detach, on_threat_despawned, subscribe_to_threat_source};
use tracker::update_threat_trackers;

/// System sets for ordering against the indicator systems
#[derive(SystemSet, Debug, Clone, PartialEq, Eq, Hash)]
pub enum ThreatIndicatorSystems {
    /// Subscribes to the event source and updates trackers (`Update`)
    Track,
    /// Projects registered annotations into `AnnotationDrawList` (`PostUpdate`)
    Draw,
}

/// Plugin that adds threat tracking and annotation drawing
pub struct ThreatIndicatorPlugin;

impl Plugin for ThreatIndicatorPlugin {
    fn build(&self, app: &mut App) {
        app
            // Initialize resources
            .init_resource::<ThreatIndicatorConfig>()
            .init_resource::<AnnotationRegistry>()
            .init_resource::<AnnotationDrawList>()
            .init_resource::<ThreatTrackerManager>()
            .init_resource::<ScreenScale>()
            .init_resource::<LabelMeasurer>()
            // Session lifecycle
            .add_observer(on_session_attach)
            .add_observer(on_session_detach)
            .add_observer(on_threat_despawned)
            // Add systems
            .add_systems(
                Update,
                (
                    report_invalid_config,
                    subscribe_to_threat_source,
                    update_threat_trackers,
                )
                    .chain()
                    .in_set(ThreatIndicatorSystems::Track),
            )
            .add_systems(
                PostUpdate,
                draw_annotations.in_set(ThreatIndicatorSystems::Draw),
            );
    }
}

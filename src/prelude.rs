//! Convenient re-exports for common types and traits

pub use crate::Annotation;
pub use crate::AnnotationRegistry;
pub use crate::IndicatorCamera;
pub use crate::IndicatorColor;
pub use crate::Occluder;
pub use crate::OcclusionLayers;
pub use crate::ThreatDestroyed;
pub use crate::ThreatEventSource;
pub use crate::ThreatIndicatorConfig;
pub use crate::ThreatIndicatorPlugin;
pub use crate::ThreatIndicatorSystems;
pub use crate::ThreatSession;
pub use crate::ThreatThrown;
pub use crate::TrackingBegin;
pub use crate::TrackingEnd;
#[cfg(feature = "visualization")]
pub use crate::ThreatVisualizationPlugin;

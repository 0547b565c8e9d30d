//! Error types for indicator instrumentation and configuration.

use bevy::prelude::*;
use thiserror::Error;

/// Result type alias for indicator operations.
pub type IndicatorResult<T> = Result<T, IndicatorError>;

/// Errors raised at the plugin's boundaries. None of these ever propagate into the frame
/// loop; callers log them and carry on.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum IndicatorError {
    /// A second session root was attached while another session is still live.
    #[error("threat session {requested:?} rejected, session {active:?} is still active")]
    SessionAlreadyActive { active: Entity, requested: Entity },

    /// A configuration option is outside its accepted range.
    #[error("option `{option}` = {value} is outside [{min}, {max}]")]
    OutOfRange {
        option: &'static str,
        value:  f32,
        min:    f32,
        max:    f32,
    },
}

impl IndicatorError {
    #[must_use]
    pub const fn session_already_active(active: Entity, requested: Entity) -> Self {
        Self::SessionAlreadyActive { active, requested }
    }

    #[must_use]
    pub const fn out_of_range(option: &'static str, value: f32, min: f32, max: f32) -> Self {
        Self::OutOfRange {
            option,
            value,
            min,
            max,
        }
    }
}

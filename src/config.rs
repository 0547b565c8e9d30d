//! Configuration surface for the threat indicators.
//!
//! Every option is typed, has a default, and is described by an entry in
//! [`ThreatIndicatorConfig::OPTIONS`] so a host settings screen can list them. The plugin
//! only reads the resource. Out-of-range values are reported by
//! [`ThreatIndicatorConfig::validate`] and clamped by the accessors at read time.

use bevy::prelude::*;

use crate::error::IndicatorError;
use crate::occlusion::OcclusionLayers;

const GENERAL_SECTION: &str = "General";
const APPEARANCE_SECTION: &str = "Appearance";
const TRAIL_SECTION: &str = "Trail";
const ADVANCED_SECTION: &str = "Advanced";

/// Inclusive bounds for a float option
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FloatRange {
    pub min: f32,
    pub max: f32,
}

impl FloatRange {
    pub const fn new(min: f32, max: f32) -> Self { Self { min, max } }

    pub fn contains(&self, value: f32) -> bool { value >= self.min && value <= self.max }

    /// Clamps into range. NaN falls back to the lower bound.
    pub fn clamp(&self, value: f32) -> f32 {
        if value.is_nan() {
            return self.min;
        }
        value.clamp(self.min, self.max)
    }
}

pub const INDICATOR_SIZE_RANGE: FloatRange = FloatRange::new(0.1, 3.0);
pub const FONT_SIZE_RANGE: FloatRange = FloatRange::new(8.0, 96.0);
pub const TRAIL_WIDTH_RANGE: FloatRange = FloatRange::new(0.01, 0.5);
pub const TRAIL_LIFETIME_RANGE: FloatRange = FloatRange::new(0.1, 5.0);
pub const SCREEN_SCALE_COOLDOWN_RANGE: FloatRange = FloatRange::new(0.5, 60.0);
pub const SUBSCRIBE_RETRY_RANGE: FloatRange = FloatRange::new(0.05, 10.0);

/// Palette offered for indicator and trail colors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Reflect)]
pub enum IndicatorColor {
    #[default]
    Red,
    Orange,
    Yellow,
    Green,
    Cyan,
    Blue,
    Magenta,
    White,
}

impl IndicatorColor {
    pub const ALL: [Self; 8] = [
        Self::Red,
        Self::Orange,
        Self::Yellow,
        Self::Green,
        Self::Cyan,
        Self::Blue,
        Self::Magenta,
        Self::White,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            Self::Red => "Red",
            Self::Orange => "Orange",
            Self::Yellow => "Yellow",
            Self::Green => "Green",
            Self::Cyan => "Cyan",
            Self::Blue => "Blue",
            Self::Magenta => "Magenta",
            Self::White => "White",
        }
    }

    pub const fn to_color(self) -> Color {
        match self {
            Self::Red => Color::srgb(1.0, 0.0, 0.0),
            Self::Orange => Color::srgb(1.0, 0.5, 0.0),
            Self::Yellow => Color::srgb(1.0, 0.92, 0.016),
            Self::Green => Color::srgb(0.0, 1.0, 0.0),
            Self::Cyan => Color::srgb(0.0, 1.0, 1.0),
            Self::Blue => Color::srgb(0.0, 0.0, 1.0),
            Self::Magenta => Color::srgb(1.0, 0.0, 1.0),
            Self::White => Color::WHITE,
        }
    }
}

const COLOR_NAMES: [&str; 8] = [
    "Red", "Orange", "Yellow", "Green", "Cyan", "Blue", "Magenta", "White",
];

/// Type, default and bounds of one option
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OptionKind {
    Bool { default: bool },
    Float { default: f32, range: FloatRange },
    Choice {
        default: &'static str,
        choices: &'static [&'static str],
    },
    Text { default: &'static str },
    Layers { default: u32 },
}

/// Human-readable description of one option
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConfigOption {
    pub section:     &'static str,
    pub name:        &'static str,
    pub description: &'static str,
    pub kind:        OptionKind,
}

/// Runtime configuration for threat tracking and indicator appearance
#[derive(Resource, Reflect, Debug, Clone)]
#[reflect(Resource)]
pub struct ThreatIndicatorConfig {
    /// Master switch. New throws are ignored while off.
    pub enabled:                    bool,
    /// Hide indicators when level geometry blocks the line of sight
    pub require_line_of_sight:      bool,
    /// Multiplier on the distance-based indicator scale
    pub indicator_size:             f32,
    /// Base font size of the indicator style
    pub font_size:                  f32,
    pub color:                      IndicatorColor,
    pub indicator_text:             String,
    /// Append the distance in meters to the indicator text
    pub show_distance:              bool,
    /// Collision layers that block line of sight
    pub occlusion_layers:           OcclusionLayers,
    pub trail_enabled:              bool,
    pub trail_width:                f32,
    pub trail_lifetime_secs:        f32,
    pub trail_color:                IndicatorColor,
    pub trail_casts_shadows:        bool,
    /// Seconds between render scale factor refreshes
    pub screen_scale_cooldown_secs: f32,
    /// Seconds between attempts to find the throw event source
    pub subscribe_retry_secs:       f32,
}

impl Default for ThreatIndicatorConfig {
    fn default() -> Self {
        Self {
            enabled:                    true,
            require_line_of_sight:      true,
            indicator_size:             1.0,
            font_size:                  24.0,
            color:                      IndicatorColor::Red,
            indicator_text:             "!".to_string(),
            show_distance:              false,
            occlusion_layers:           OcclusionLayers::TERRAIN | OcclusionLayers::HIGH_DETAIL,
            trail_enabled:              true,
            trail_width:                0.05,
            trail_lifetime_secs:        0.6,
            trail_color:                IndicatorColor::Orange,
            trail_casts_shadows:        false,
            screen_scale_cooldown_secs: 10.0,
            subscribe_retry_secs:       0.5,
        }
    }
}

impl ThreatIndicatorConfig {
    pub const OPTIONS: &'static [ConfigOption] = &[
        ConfigOption {
            section:     GENERAL_SECTION,
            name:        "Enable Indicators",
            description: "Turns grenade indicators on or off.",
            kind:        OptionKind::Bool { default: true },
        },
        ConfigOption {
            section:     GENERAL_SECTION,
            name:        "Require Line of Sight",
            description: "Only show an indicator when no terrain or high detail geometry \
                          blocks the view to the grenade.",
            kind:        OptionKind::Bool { default: true },
        },
        ConfigOption {
            section:     APPEARANCE_SECTION,
            name:        "Indicator Size",
            description: "Multiplier applied to the indicator after distance scaling.",
            kind:        OptionKind::Float {
                default: 1.0,
                range:   INDICATOR_SIZE_RANGE,
            },
        },
        ConfigOption {
            section:     APPEARANCE_SECTION,
            name:        "Font Size",
            description: "Base font size of the indicator text before scaling.",
            kind:        OptionKind::Float {
                default: 24.0,
                range:   FONT_SIZE_RANGE,
            },
        },
        ConfigOption {
            section:     APPEARANCE_SECTION,
            name:        "Indicator Color",
            description: "Text color of the indicators.",
            kind:        OptionKind::Choice {
                default: "Red",
                choices: &COLOR_NAMES,
            },
        },
        ConfigOption {
            section:     APPEARANCE_SECTION,
            name:        "Indicator Text",
            description: "Text drawn above each grenade.",
            kind:        OptionKind::Text { default: "!" },
        },
        ConfigOption {
            section:     APPEARANCE_SECTION,
            name:        "Show Distance",
            description: "Append the distance to the grenade in meters.",
            kind:        OptionKind::Bool { default: false },
        },
        ConfigOption {
            section:     ADVANCED_SECTION,
            name:        "Occlusion Layers",
            description: "Collision layers that block line of sight.",
            kind:        OptionKind::Layers {
                default: OcclusionLayers::TERRAIN.bits() | OcclusionLayers::HIGH_DETAIL.bits(),
            },
        },
        ConfigOption {
            section:     TRAIL_SECTION,
            name:        "Enable Trail",
            description: "Draw a fading trail behind thrown grenades. Applies to new throws.",
            kind:        OptionKind::Bool { default: true },
        },
        ConfigOption {
            section:     TRAIL_SECTION,
            name:        "Trail Width",
            description: "Width of the trail in meters.",
            kind:        OptionKind::Float {
                default: 0.05,
                range:   TRAIL_WIDTH_RANGE,
            },
        },
        ConfigOption {
            section:     TRAIL_SECTION,
            name:        "Trail Time",
            description: "Seconds a trail segment stays visible before it fades out.",
            kind:        OptionKind::Float {
                default: 0.6,
                range:   TRAIL_LIFETIME_RANGE,
            },
        },
        ConfigOption {
            section:     TRAIL_SECTION,
            name:        "Trail Color",
            description: "Color of the trail.",
            kind:        OptionKind::Choice {
                default: "Orange",
                choices: &COLOR_NAMES,
            },
        },
        ConfigOption {
            section:     TRAIL_SECTION,
            name:        "Trail Casts Shadows",
            description: "Whether the trail casts shadows.",
            kind:        OptionKind::Bool { default: false },
        },
        ConfigOption {
            section:     ADVANCED_SECTION,
            name:        "Screen Scale Refresh",
            description: "Seconds between checks of the supersampling scale factor.",
            kind:        OptionKind::Float {
                default: 10.0,
                range:   SCREEN_SCALE_COOLDOWN_RANGE,
            },
        },
        ConfigOption {
            section:     ADVANCED_SECTION,
            name:        "Subscribe Retry",
            description: "Seconds between attempts to find the grenade event source.",
            kind:        OptionKind::Float {
                default: 0.5,
                range:   SUBSCRIBE_RETRY_RANGE,
            },
        },
    ];

    /// Looks up the description of an option by name
    pub fn option(name: &str) -> Option<&'static ConfigOption> {
        Self::OPTIONS.iter().find(|option| option.name == name)
    }

    /// Reports every float option outside its accepted range
    pub fn validate(&self) -> Vec<IndicatorError> {
        self.float_options()
            .into_iter()
            .filter(|(_, value, range)| !range.contains(*value))
            .map(|(name, value, range)| {
                IndicatorError::out_of_range(name, value, range.min, range.max)
            })
            .collect()
    }

    fn float_options(&self) -> [(&'static str, f32, FloatRange); 6] {
        [
            ("Indicator Size", self.indicator_size, INDICATOR_SIZE_RANGE),
            ("Font Size", self.font_size, FONT_SIZE_RANGE),
            ("Trail Width", self.trail_width, TRAIL_WIDTH_RANGE),
            ("Trail Time", self.trail_lifetime_secs, TRAIL_LIFETIME_RANGE),
            (
                "Screen Scale Refresh",
                self.screen_scale_cooldown_secs,
                SCREEN_SCALE_COOLDOWN_RANGE,
            ),
            (
                "Subscribe Retry",
                self.subscribe_retry_secs,
                SUBSCRIBE_RETRY_RANGE,
            ),
        ]
    }

    pub fn indicator_size(&self) -> f32 { INDICATOR_SIZE_RANGE.clamp(self.indicator_size) }

    pub fn font_size(&self) -> f32 { FONT_SIZE_RANGE.clamp(self.font_size) }

    pub fn trail_width(&self) -> f32 { TRAIL_WIDTH_RANGE.clamp(self.trail_width) }

    pub fn trail_lifetime_secs(&self) -> f32 {
        TRAIL_LIFETIME_RANGE.clamp(self.trail_lifetime_secs)
    }

    pub fn screen_scale_cooldown_secs(&self) -> f32 {
        SCREEN_SCALE_COOLDOWN_RANGE.clamp(self.screen_scale_cooldown_secs)
    }

    pub fn subscribe_retry_secs(&self) -> f32 {
        SUBSCRIBE_RETRY_RANGE.clamp(self.subscribe_retry_secs)
    }
}

/// Logs out-of-range options whenever the config resource changes
pub fn report_invalid_config(config: Res<ThreatIndicatorConfig>) {
    if !config.is_changed() {
        return;
    }
    for error in config.validate() {
        warn!("ThreatIndicatorConfig: {error}, clamping");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(ThreatIndicatorConfig::default().validate().is_empty());
    }

    #[test]
    fn defaults_match_option_table() {
        let config = ThreatIndicatorConfig::default();
        let Some(OptionKind::Float { default, .. }) =
            ThreatIndicatorConfig::option("Indicator Size").map(|o| o.kind)
        else {
            panic!("Indicator Size should be a float option");
        };
        assert_eq!(default, config.indicator_size);

        let Some(OptionKind::Choice { default, choices }) =
            ThreatIndicatorConfig::option("Indicator Color").map(|o| o.kind)
        else {
            panic!("Indicator Color should be a choice option");
        };
        assert_eq!(default, config.color.name());
        assert_eq!(choices.len(), IndicatorColor::ALL.len());
    }

    #[test]
    fn out_of_range_values_are_reported_and_clamped() {
        let config = ThreatIndicatorConfig {
            indicator_size: 12.0,
            trail_width: -1.0,
            ..default()
        };

        let errors = config.validate();
        assert_eq!(errors.len(), 2);
        assert!(errors.contains(&IndicatorError::out_of_range(
            "Indicator Size",
            12.0,
            INDICATOR_SIZE_RANGE.min,
            INDICATOR_SIZE_RANGE.max,
        )));

        assert_eq!(config.indicator_size(), INDICATOR_SIZE_RANGE.max);
        assert_eq!(config.trail_width(), TRAIL_WIDTH_RANGE.min);
    }

    #[test]
    fn nan_clamps_to_lower_bound() {
        assert_eq!(FONT_SIZE_RANGE.clamp(f32::NAN), FONT_SIZE_RANGE.min);
    }
}

//! Control configuration. Every component receives its section by reference at
//! construction; nothing reads configuration from global state.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::events::{CommandKind, DirectionZone};

/// Blink history holds five timestamps, so at most four intervals can be checked.
pub const MAX_CONFIRMATION_INTERVALS: usize = 4;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config validation error: {0}")]
    Validation(String),
    #[error("Config parse error: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

fn invalid(message: impl Into<String>) -> ConfigError {
    ConfigError::Validation(message.into())
}

fn require_positive(name: &str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(invalid(format!("{name} must be a positive number, got {value}")))
    }
}

fn require_non_negative(name: &str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(invalid(format!("{name} must not be negative, got {value}")))
    }
}

fn require_unit(name: &str, value: f64) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(invalid(format!("{name} must lie in [0, 1], got {value}")))
    }
}

/// Position filter tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FilterConfig {
    /// false falls back to a moving average over `smoothing_frames`.
    pub use_kalman: bool,
    pub process_variance: f64,
    pub measurement_variance: f64,
    pub smoothing_frames: usize,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            use_kalman: true,
            process_variance: 1e-5,
            measurement_variance: 1e-1,
            smoothing_frames: 3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BlinkConfig {
    /// Eye aspect ratio below which the eyes count as closed.
    pub ear_threshold: f64,
    pub min_consecutive_closed_frames: u32,
    pub double_blink_window_s: f64,
    pub long_blink_time_s: f64,
    pub eyes_closed_sleep_time_s: f64,
}

impl Default for BlinkConfig {
    fn default() -> Self {
        Self {
            ear_threshold: 0.21,
            min_consecutive_closed_frames: 2,
            double_blink_window_s: 0.6,
            long_blink_time_s: 3.0,
            eyes_closed_sleep_time_s: 5.0,
        }
    }
}

/// Canvas size and normalized threshold bands.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DirectionConfig {
    pub canvas_width: f64,
    pub canvas_height: f64,
    pub left_threshold: f64,
    pub right_threshold: f64,
    pub up_threshold: f64,
    pub down_threshold: f64,
}

impl Default for DirectionConfig {
    fn default() -> Self {
        Self {
            canvas_width: 1920.0,
            canvas_height: 1080.0,
            left_threshold: 0.35,
            right_threshold: 0.65,
            up_threshold: 0.30,
            down_threshold: 0.70,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IntentConfig {
    pub enabled: bool,
    pub window_capacity: usize,
    pub intentional_gaze_duration_s: f64,
    /// Fraction of `intentional_gaze_duration_s` accepted when movement is slow.
    pub relaxed_duration_ratio: f64,
    /// Radius used by the intentionality check.
    pub dwell_radius: f64,
    /// Radius used when scoring direction commands.
    pub confidence_radius: f64,
    /// Mean displacement per sample below which movement is deliberate.
    pub velocity_slow: f64,
    /// Mean displacement per sample above which movement is a rapid glance.
    pub velocity_fast: f64,
    pub base_confidence: f64,
    pub high_confidence: f64,
    pub medium_confidence: f64,
    pub low_confidence: f64,
    pub high_confidence_duration_s: f64,
    pub medium_confidence_duration_s: f64,
}

impl Default for IntentConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            window_capacity: 30,
            intentional_gaze_duration_s: 1.0,
            relaxed_duration_ratio: 0.5,
            dwell_radius: 50.0,
            confidence_radius: 100.0,
            velocity_slow: 10.0,
            velocity_fast: 100.0,
            base_confidence: 0.5,
            high_confidence: 0.9,
            medium_confidence: 0.7,
            low_confidence: 0.4,
            high_confidence_duration_s: 0.3,
            medium_confidence_duration_s: 0.13,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DwellConfig {
    pub enabled: bool,
    pub dwell_time_s: f64,
    pub click_radius: f64,
    /// Multiplier on `dwell_time_s` after which a dwell fires without intent.
    pub unintentional_extension: f64,
}

impl Default for DwellConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dwell_time_s: 1.2,
            click_radius: 25.0,
            unintentional_extension: 1.5,
        }
    }
}

/// Named multi-step gesture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SequencePattern {
    pub command: CommandKind,
    pub zones: Vec<DirectionZone>,
}

impl SequencePattern {
    pub fn new(command: CommandKind, zones: Vec<DirectionZone>) -> Self {
        Self { command, zones }
    }
}

fn default_patterns() -> Vec<SequencePattern> {
    use DirectionZone::{Down, Left, Right, Up};
    vec![
        SequencePattern::new(CommandKind::CallNurse, vec![Left, Right, Left]),
        SequencePattern::new(CommandKind::AdjustBed, vec![Up, Down, Up]),
        SequencePattern::new(CommandKind::EmergencyAlert, vec![Right, Left, Right]),
    ]
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SequenceConfig {
    pub enabled: bool,
    pub direction_hold_time_s: f64,
    pub sequence_timeout_s: f64,
    pub patterns: Vec<SequencePattern>,
}

impl Default for SequenceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            direction_hold_time_s: 0.3,
            sequence_timeout_s: 3.0,
            patterns: default_patterns(),
        }
    }
}

impl SequenceConfig {
    pub fn longest_pattern(&self) -> usize {
        self.patterns
            .iter()
            .map(|pattern| pattern.zones.len())
            .max()
            .unwrap_or(0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GateConfig {
    pub gesture_cooldown_s: f64,
    pub command_cooldown_s: f64,
    pub min_confidence: f64,
    /// When set, emissions are logged and recorded but never forwarded to the sink.
    pub simulation_mode: bool,
    pub log_capacity: usize,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            gesture_cooldown_s: 0.4,
            command_cooldown_s: 0.6,
            min_confidence: 0.5,
            simulation_mode: true,
            log_capacity: 500,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FeatureFlags {
    /// Cardinal direction commands.
    pub basic_controls: bool,
    /// Diagonal commands and blink clicks.
    pub advanced_controls: bool,
    /// Long blink, sleep mode and care sequences.
    pub assistive_controls: bool,
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self {
            basic_controls: true,
            advanced_controls: true,
            assistive_controls: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConfirmationConfig {
    pub required: bool,
    /// Maximum interval (seconds) between consecutive confirming blinks.
    pub blink_pattern: Vec<f64>,
    pub timeout_s: f64,
}

impl Default for ConfirmationConfig {
    fn default() -> Self {
        Self {
            required: false,
            blink_pattern: vec![0.2, 0.5],
            timeout_s: 5.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct ControlConfig {
    pub filter: FilterConfig,
    pub blink: BlinkConfig,
    pub direction: DirectionConfig,
    pub intent: IntentConfig,
    pub dwell: DwellConfig,
    pub sequence: SequenceConfig,
    pub gate: GateConfig,
    pub features: FeatureFlags,
    pub confirmation: ConfirmationConfig,
}

impl ControlConfig {
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: ControlConfig = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    /// Rejects any value the pipeline cannot run with. Nothing is clamped.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.filter.validate()?;
        self.blink.validate()?;
        self.direction.validate()?;
        self.intent.validate()?;
        self.dwell.validate()?;
        self.sequence.validate()?;
        self.gate.validate()?;
        self.confirmation.validate()?;
        Ok(())
    }
}

impl FilterConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        require_positive("filter.processVariance", self.process_variance)?;
        require_positive("filter.measurementVariance", self.measurement_variance)?;
        if self.smoothing_frames == 0 {
            return Err(invalid("filter.smoothingFrames must be at least 1"));
        }
        Ok(())
    }
}

impl BlinkConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        require_positive("blink.earThreshold", self.ear_threshold)?;
        if self.min_consecutive_closed_frames == 0 {
            return Err(invalid("blink.minConsecutiveClosedFrames must be at least 1"));
        }
        require_positive("blink.doubleBlinkWindowS", self.double_blink_window_s)?;
        require_positive("blink.longBlinkTimeS", self.long_blink_time_s)?;
        require_positive("blink.eyesClosedSleepTimeS", self.eyes_closed_sleep_time_s)?;
        if self.eyes_closed_sleep_time_s <= self.long_blink_time_s {
            return Err(invalid(
                "blink.eyesClosedSleepTimeS must be greater than blink.longBlinkTimeS",
            ));
        }
        Ok(())
    }
}

impl DirectionConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        require_positive("direction.canvasWidth", self.canvas_width)?;
        require_positive("direction.canvasHeight", self.canvas_height)?;
        require_unit("direction.leftThreshold", self.left_threshold)?;
        require_unit("direction.rightThreshold", self.right_threshold)?;
        require_unit("direction.upThreshold", self.up_threshold)?;
        require_unit("direction.downThreshold", self.down_threshold)?;
        if self.left_threshold >= self.right_threshold {
            return Err(invalid(
                "direction.leftThreshold must be below direction.rightThreshold",
            ));
        }
        if self.up_threshold >= self.down_threshold {
            return Err(invalid(
                "direction.upThreshold must be below direction.downThreshold",
            ));
        }
        Ok(())
    }
}

impl IntentConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.window_capacity < 2 {
            return Err(invalid("intent.windowCapacity must hold at least 2 samples"));
        }
        require_positive(
            "intent.intentionalGazeDurationS",
            self.intentional_gaze_duration_s,
        )?;
        require_unit("intent.relaxedDurationRatio", self.relaxed_duration_ratio)?;
        require_positive("intent.dwellRadius", self.dwell_radius)?;
        require_positive("intent.confidenceRadius", self.confidence_radius)?;
        require_positive("intent.velocitySlow", self.velocity_slow)?;
        require_positive("intent.velocityFast", self.velocity_fast)?;
        if self.velocity_slow >= self.velocity_fast {
            return Err(invalid("intent.velocitySlow must be below intent.velocityFast"));
        }
        for (name, value) in [
            ("intent.baseConfidence", self.base_confidence),
            ("intent.highConfidence", self.high_confidence),
            ("intent.mediumConfidence", self.medium_confidence),
            ("intent.lowConfidence", self.low_confidence),
        ] {
            require_unit(name, value)?;
        }
        require_non_negative(
            "intent.highConfidenceDurationS",
            self.high_confidence_duration_s,
        )?;
        require_non_negative(
            "intent.mediumConfidenceDurationS",
            self.medium_confidence_duration_s,
        )?;
        Ok(())
    }
}

impl DwellConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        require_positive("dwell.dwellTimeS", self.dwell_time_s)?;
        require_positive("dwell.clickRadius", self.click_radius)?;
        if !self.unintentional_extension.is_finite() || self.unintentional_extension < 1.0 {
            return Err(invalid("dwell.unintentionalExtension must be at least 1.0"));
        }
        Ok(())
    }
}

impl SequenceConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        require_positive("sequence.directionHoldTimeS", self.direction_hold_time_s)?;
        require_positive("sequence.sequenceTimeoutS", self.sequence_timeout_s)?;

        let mut commands = HashSet::new();
        let mut zone_sequences = HashSet::new();
        for pattern in &self.patterns {
            let name = pattern.command.as_str();
            if pattern.zones.is_empty() {
                return Err(invalid(format!("sequence pattern {name} has no zones")));
            }
            if pattern.zones.contains(&DirectionZone::Center) {
                return Err(invalid(format!(
                    "sequence pattern {name} contains CENTER, which is never buffered"
                )));
            }
            if pattern.zones.windows(2).any(|pair| pair[0] == pair[1]) {
                return Err(invalid(format!(
                    "sequence pattern {name} repeats a zone back to back and can never match"
                )));
            }
            if !commands.insert(pattern.command) {
                return Err(invalid(format!("duplicate sequence pattern for {name}")));
            }
            if !zone_sequences.insert(pattern.zones.clone()) {
                return Err(invalid(format!(
                    "sequence pattern {name} reuses the zones of another pattern"
                )));
            }
        }
        Ok(())
    }
}

impl GateConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        require_non_negative("gate.gestureCooldownS", self.gesture_cooldown_s)?;
        require_non_negative("gate.commandCooldownS", self.command_cooldown_s)?;
        require_unit("gate.minConfidence", self.min_confidence)?;
        if self.log_capacity == 0 {
            return Err(invalid("gate.logCapacity must be at least 1"));
        }
        Ok(())
    }
}

impl ConfirmationConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.blink_pattern.is_empty() || self.blink_pattern.len() > MAX_CONFIRMATION_INTERVALS
        {
            return Err(invalid(format!(
                "confirmation.blinkPattern must have 1..={MAX_CONFIRMATION_INTERVALS} intervals"
            )));
        }
        for interval in &self.blink_pattern {
            require_positive("confirmation.blinkPattern entry", *interval)?;
        }
        require_positive("confirmation.timeoutS", self.timeout_s)?;
        Ok(())
    }
}

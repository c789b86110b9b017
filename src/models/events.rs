//! Gaze samples, direction zones and command events shared by every stage.
//! Session files use schemaVersion: 1.

use serde::{Deserialize, Serialize};

pub const SCHEMA_VERSION: u32 = 1;

/// One smoothed or raw gaze point in logical canvas coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GazeSample {
    pub x: f64,
    pub y: f64,
    /// Seconds on the capture clock.
    pub t: f64,
}

impl GazeSample {
    pub fn new(x: f64, y: f64, t: f64) -> Self {
        Self { x, y, t }
    }

    pub fn distance_to(&self, x: f64, y: f64) -> f64 {
        (self.x - x).hypot(self.y - y)
    }
}

/// Measurements produced by the landmark collaborator for a detected subject.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Detection {
    pub x: f64,
    pub y: f64,
    /// Mean eye aspect ratio of both eyes; the blink machine thresholds it.
    pub eye_aspect_ratio: f64,
}

/// One captured frame. `detection` is `None` when no subject was found.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GazeFrame {
    pub t: f64,
    #[serde(default)]
    pub detection: Option<Detection>,
}

impl GazeFrame {
    pub fn detected(t: f64, x: f64, y: f64, eye_aspect_ratio: f64) -> Self {
        Self {
            t,
            detection: Some(Detection {
                x,
                y,
                eye_aspect_ratio,
            }),
        }
    }

    pub fn missing(t: f64) -> Self {
        Self { t, detection: None }
    }
}

/// Quantized gaze region relative to the display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DirectionZone {
    Center,
    Up,
    Down,
    Left,
    Right,
    UpLeft,
    UpRight,
    DownLeft,
    DownRight,
}

impl DirectionZone {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Center => "CENTER",
            Self::Up => "UP",
            Self::Down => "DOWN",
            Self::Left => "LEFT",
            Self::Right => "RIGHT",
            Self::UpLeft => "UP_LEFT",
            Self::UpRight => "UP_RIGHT",
            Self::DownLeft => "DOWN_LEFT",
            Self::DownRight => "DOWN_RIGHT",
        }
    }

    pub fn is_diagonal(&self) -> bool {
        matches!(
            self,
            Self::UpLeft | Self::UpRight | Self::DownLeft | Self::DownRight
        )
    }
}

/// Closed set of commands handed to the execution collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommandKind {
    Up,
    Down,
    Left,
    Right,
    ScrollUp,
    ScrollDown,
    Click,
    DoubleClick,
    VolumeUp,
    BrightnessUp,
    Back,
    Home,
    EmergencyAlert,
    CallNurse,
    AdjustBed,
    SleepMode,
}

impl CommandKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Up => "UP",
            Self::Down => "DOWN",
            Self::Left => "LEFT",
            Self::Right => "RIGHT",
            Self::ScrollUp => "SCROLL_UP",
            Self::ScrollDown => "SCROLL_DOWN",
            Self::Click => "CLICK",
            Self::DoubleClick => "DOUBLE_CLICK",
            Self::VolumeUp => "VOLUME_UP",
            Self::BrightnessUp => "BRIGHTNESS_UP",
            Self::Back => "BACK",
            Self::Home => "HOME",
            Self::EmergencyAlert => "EMERGENCY_ALERT",
            Self::CallNurse => "CALL_NURSE",
            Self::AdjustBed => "ADJUST_BED",
            Self::SleepMode => "SLEEP_MODE",
        }
    }

    /// Care-related commands that may require blink confirmation.
    pub fn is_assistive(&self) -> bool {
        matches!(
            self,
            Self::EmergencyAlert | Self::CallNurse | Self::AdjustBed | Self::SleepMode
        )
    }
}

/// Minimum re-trigger interval category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CooldownClass {
    Gesture,
    Command,
}

/// Pipeline stage that produced a candidate command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CommandSource {
    Blink,
    Dwell,
    Sequence,
    Direction,
    Confirmation,
}

impl CommandSource {
    pub fn cooldown_class(&self) -> CooldownClass {
        match self {
            Self::Direction => CooldownClass::Gesture,
            Self::Blink | Self::Dwell | Self::Sequence | Self::Confirmation => {
                CooldownClass::Command
            }
        }
    }

    /// Direction commands are the only candidates dropped for low confidence.
    pub fn is_confidence_gated(&self) -> bool {
        matches!(self, Self::Direction)
    }
}

/// Candidate or emitted command.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandEvent {
    pub kind: CommandKind,
    /// In [0, 1].
    pub confidence: f64,
    /// Sample timestamp (seconds) of the frame that produced it.
    pub t: f64,
    pub source: CommandSource,
}

impl CommandEvent {
    pub fn new(kind: CommandKind, confidence: f64, t: f64, source: CommandSource) -> Self {
        Self {
            kind,
            confidence: confidence.clamp(0.0, 1.0),
            t,
            source,
        }
    }

    pub fn cooldown_class(&self) -> CooldownClass {
        self.source.cooldown_class()
    }
}

/// Root container of a recorded session file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionFile {
    pub schema_version: u32,
    pub session_id: String,
    /// Logical canvas the gaze coordinates were mapped into.
    pub canvas_width: f64,
    pub canvas_height: f64,
    pub frames: Vec<GazeFrame>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_command_kinds_in_screaming_snake_case() {
        let event = CommandEvent::new(CommandKind::CallNurse, 1.0, 2.5, CommandSource::Sequence);
        let json = serde_json::to_string(&event).expect("serialize command");

        assert!(json.contains("\"CALL_NURSE\""));
        assert!(json.contains("\"source\":\"sequence\""));
    }

    #[test]
    fn command_confidence_is_clamped() {
        let event = CommandEvent::new(CommandKind::Click, 1.7, 0.0, CommandSource::Dwell);
        assert_eq!(event.confidence, 1.0);
    }

    #[test]
    fn direction_commands_use_gesture_cooldown() {
        assert_eq!(
            CommandSource::Direction.cooldown_class(),
            CooldownClass::Gesture
        );
        assert_eq!(CommandSource::Blink.cooldown_class(), CooldownClass::Command);
        assert_eq!(CommandSource::Dwell.cooldown_class(), CooldownClass::Command);
        assert_eq!(
            CommandSource::Sequence.cooldown_class(),
            CooldownClass::Command
        );
    }

    #[test]
    fn zone_names_match_serialized_form() {
        for zone in [
            DirectionZone::Center,
            DirectionZone::UpLeft,
            DirectionZone::DownRight,
        ] {
            let json = serde_json::to_string(&zone).expect("serialize zone");
            assert_eq!(json, format!("\"{}\"", zone.as_str()));
        }
    }

    #[test]
    fn deserializes_frames_without_detection() {
        let raw = r#"{
            "schemaVersion": 1,
            "sessionId": "s-1",
            "canvasWidth": 1920.0,
            "canvasHeight": 1080.0,
            "frames": [
                {"t": 0.0, "detection": {"x": 10.0, "y": 20.0, "eyeAspectRatio": 0.3}},
                {"t": 0.033}
            ]
        }"#;

        let session: SessionFile = serde_json::from_str(raw).expect("deserialize session");
        assert_eq!(session.frames.len(), 2);
        assert!(session.frames[0].detection.is_some());
        assert!(session.frames[1].detection.is_none());
    }
}

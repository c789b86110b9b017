use crate::models::config::{DirectionConfig, FeatureFlags};
use crate::models::events::{CommandKind, DirectionZone};

/// Quantizes canvas positions into nine zones. Stateless.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DirectionClassifier {
    canvas_width: f64,
    canvas_height: f64,
    left: f64,
    right: f64,
    up: f64,
    down: f64,
}

impl DirectionClassifier {
    pub fn new(config: &DirectionConfig) -> Self {
        Self {
            canvas_width: config.canvas_width,
            canvas_height: config.canvas_height,
            left: config.left_threshold,
            right: config.right_threshold,
            up: config.up_threshold,
            down: config.down_threshold,
        }
    }

    pub fn classify(&self, x: f64, y: f64) -> DirectionZone {
        self.classify_normalized(x / self.canvas_width, y / self.canvas_height)
    }

    /// Diagonals win when both axes cross a band; CENTER when neither does.
    pub fn classify_normalized(&self, norm_x: f64, norm_y: f64) -> DirectionZone {
        let is_left = norm_x < self.left;
        let is_right = norm_x > self.right;
        let is_up = norm_y < self.up;
        let is_down = norm_y > self.down;

        match (is_up, is_down, is_left, is_right) {
            (true, _, true, _) => DirectionZone::UpLeft,
            (true, _, _, true) => DirectionZone::UpRight,
            (_, true, true, _) => DirectionZone::DownLeft,
            (_, true, _, true) => DirectionZone::DownRight,
            (true, _, _, _) => DirectionZone::Up,
            (_, true, _, _) => DirectionZone::Down,
            (_, _, true, _) => DirectionZone::Left,
            (_, _, _, true) => DirectionZone::Right,
            _ => DirectionZone::Center,
        }
    }
}

/// Basic command bound to a held zone, honoring the enabled control sets.
pub fn basic_command(zone: DirectionZone, features: &FeatureFlags) -> Option<CommandKind> {
    if !features.basic_controls {
        return None;
    }
    if zone.is_diagonal() && !features.advanced_controls {
        return None;
    }

    match zone {
        DirectionZone::UpLeft => Some(CommandKind::VolumeUp),
        DirectionZone::UpRight => Some(CommandKind::BrightnessUp),
        DirectionZone::DownLeft => Some(CommandKind::Back),
        DirectionZone::DownRight => Some(CommandKind::Home),
        DirectionZone::Up => Some(CommandKind::ScrollUp),
        DirectionZone::Down => Some(CommandKind::ScrollDown),
        DirectionZone::Left => Some(CommandKind::Left),
        DirectionZone::Right => Some(CommandKind::Right),
        DirectionZone::Center => None,
    }
}

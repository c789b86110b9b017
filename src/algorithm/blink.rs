//! Eyelid state machine: OPEN → CLOSING → CLOSED → OPEN.
//!
//! A closed run of at least `min_consecutive_closed_frames` that reopens is a
//! valid blink. Valid blinks are classified as:
//!
//! - single click, once the double-blink window passes with no second blink,
//! - double click, when a second blink lands inside the window,
//! - confirmation, when a command is awaiting it and the recent inter-blink
//!   intervals satisfy the configured pattern.
//!
//! Long blink and sleep trigger while the eyes are still closed, once per
//! closure episode. A triggered event is raised on every frame until the caller
//! acknowledges it, even if the eyes reopen in between.

use serde::Serialize;

use crate::algorithm::ring_buffer::RingBuffer;
use crate::models::config::{BlinkConfig, ConfigError};

const BLINK_HISTORY: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum EyelidPhase {
    Open,
    Closing,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum BlinkEvent {
    Click,
    DoubleClick,
    LongBlink,
    Sleep,
    Confirmed,
}

#[derive(Debug, Clone)]
pub struct BlinkStateMachine {
    config: BlinkConfig,
    eyes_closed: bool,
    consecutive_closed_frames: u32,
    closure_start: Option<f64>,
    eyes_closed_since: Option<f64>,
    last_valid_blink_time: Option<f64>,
    blink_count_in_window: u32,
    recent_blink_times: RingBuffer<f64>,
    /// First blink of a possible double, not yet classified.
    pending_single: Option<f64>,
    /// Latched per closure episode.
    long_blink_reached: bool,
    sleep_reached: bool,
    /// Raised until acknowledged.
    long_blink_pending: bool,
    sleep_pending: bool,
    confirmation_pattern: Option<Vec<f64>>,
}

impl BlinkStateMachine {
    pub fn new(config: &BlinkConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config: config.clone(),
            eyes_closed: false,
            consecutive_closed_frames: 0,
            closure_start: None,
            eyes_closed_since: None,
            last_valid_blink_time: None,
            blink_count_in_window: 0,
            recent_blink_times: RingBuffer::new(BLINK_HISTORY),
            pending_single: None,
            long_blink_reached: false,
            sleep_reached: false,
            long_blink_pending: false,
            sleep_pending: false,
            confirmation_pattern: None,
        })
    }

    /// Applies the EAR threshold and advances one frame.
    pub fn update(&mut self, eye_aspect_ratio: f64, t: f64) -> Vec<BlinkEvent> {
        self.update_closed(eye_aspect_ratio < self.config.ear_threshold, t)
    }

    pub fn update_closed(&mut self, closed: bool, t: f64) -> Vec<BlinkEvent> {
        let mut events = Vec::new();

        if let Some(first) = self.pending_single {
            if t - first > self.config.double_blink_window_s {
                self.pending_single = None;
                self.blink_count_in_window = 0;
                events.push(BlinkEvent::Click);
            }
        }

        self.eyes_closed = closed;
        if closed {
            self.on_closed(t);
        } else {
            self.on_open(t, &mut events);
        }

        if self.long_blink_pending {
            events.push(BlinkEvent::LongBlink);
        }
        if self.sleep_pending {
            events.push(BlinkEvent::Sleep);
        }
        events
    }

    /// Stops re-raising a long blink or sleep event once it has been acted on.
    /// Other events are raised once and need no acknowledgement.
    pub fn acknowledge(&mut self, event: BlinkEvent) {
        match event {
            BlinkEvent::LongBlink => self.long_blink_pending = false,
            BlinkEvent::Sleep => self.sleep_pending = false,
            BlinkEvent::Click | BlinkEvent::DoubleClick | BlinkEvent::Confirmed => {}
        }
    }

    /// Routes the next matching blink burst to `Confirmed` instead of clicks.
    pub fn await_confirmation(&mut self, pattern: &[f64]) {
        self.confirmation_pattern = Some(pattern.to_vec());
        self.pending_single = None;
        self.blink_count_in_window = 0;
    }

    pub fn cancel_confirmation(&mut self) {
        self.confirmation_pattern = None;
    }

    pub fn is_awaiting_confirmation(&self) -> bool {
        self.confirmation_pattern.is_some()
    }

    pub fn phase(&self) -> EyelidPhase {
        if !self.eyes_closed {
            EyelidPhase::Open
        } else if self.long_blink_reached
            || self.consecutive_closed_frames >= self.config.min_consecutive_closed_frames
        {
            EyelidPhase::Closed
        } else {
            EyelidPhase::Closing
        }
    }

    pub fn recent_blink_times(&self) -> impl Iterator<Item = f64> + '_ {
        self.recent_blink_times.iter().copied()
    }

    pub fn blink_count_in_window(&self) -> u32 {
        self.blink_count_in_window
    }

    pub fn last_valid_blink_time(&self) -> Option<f64> {
        self.last_valid_blink_time
    }

    /// True when the newest `pattern.len()` intervals are each within the
    /// matching pattern entry.
    pub fn matches_pattern(&self, pattern: &[f64]) -> bool {
        if pattern.is_empty() || self.recent_blink_times.len() < pattern.len() + 1 {
            return false;
        }

        let recent: Vec<f64> = self.recent_blink_times.tail(pattern.len() + 1).copied().collect();
        recent
            .windows(2)
            .zip(pattern)
            .all(|(pair, max_interval)| pair[1] - pair[0] <= *max_interval)
    }

    fn on_closed(&mut self, t: f64) {
        self.consecutive_closed_frames += 1;
        let closure_start = *self.closure_start.get_or_insert(t);
        let closed_since = *self.eyes_closed_since.get_or_insert(t);

        if !self.long_blink_reached && t - closure_start >= self.config.long_blink_time_s {
            log::debug!("long blink after {:.2}s", t - closure_start);
            self.long_blink_reached = true;
            self.long_blink_pending = true;
            self.consecutive_closed_frames = 0;
            self.closure_start = None;
        }

        if !self.sleep_reached && t - closed_since >= self.config.eyes_closed_sleep_time_s {
            log::debug!("eyes closed for {:.2}s", t - closed_since);
            self.sleep_reached = true;
            self.sleep_pending = true;
        }
    }

    fn on_open(&mut self, t: f64, events: &mut Vec<BlinkEvent>) {
        // A closure already consumed by a long blink never counts as a blink.
        if !self.long_blink_reached
            && self.consecutive_closed_frames >= self.config.min_consecutive_closed_frames
        {
            self.register_valid_blink(t, events);
        }

        self.consecutive_closed_frames = 0;
        self.closure_start = None;
        self.eyes_closed_since = None;
        self.long_blink_reached = false;
        self.sleep_reached = false;

        if let Some(last) = self.last_valid_blink_time {
            if t - last > self.config.double_blink_window_s && self.pending_single.is_none() {
                self.blink_count_in_window = 0;
            }
        }
    }

    fn register_valid_blink(&mut self, t: f64, events: &mut Vec<BlinkEvent>) {
        self.recent_blink_times.push(t);
        self.last_valid_blink_time = Some(t);
        self.blink_count_in_window += 1;

        if let Some(pattern) = self.confirmation_pattern.clone() {
            if self.matches_pattern(&pattern) {
                self.confirmation_pattern = None;
                self.blink_count_in_window = 0;
                events.push(BlinkEvent::Confirmed);
            }
            return;
        }

        match self.pending_single.take() {
            Some(first) if t - first <= self.config.double_blink_window_s => {
                self.blink_count_in_window = 0;
                events.push(BlinkEvent::DoubleClick);
            }
            _ => self.pending_single = Some(t),
        }
    }
}

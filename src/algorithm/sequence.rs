use crate::algorithm::ring_buffer::RingBuffer;
use crate::models::config::{ConfigError, SequenceConfig, SequencePattern};
use crate::models::events::{CommandEvent, CommandSource, DirectionZone};

#[derive(Debug, Clone, Copy, PartialEq)]
struct HeldZone {
    zone: DirectionZone,
    since: f64,
    /// Already appended during this continuous hold.
    consumed: bool,
}

/// Matches held direction zones against multi-step gesture patterns.
#[derive(Debug, Clone)]
pub struct SequenceRecognizer {
    patterns: Vec<SequencePattern>,
    hold_time_s: f64,
    timeout_s: f64,
    buffer: RingBuffer<DirectionZone>,
    /// When the first zone of the current attempt was appended. Eviction of
    /// old zones does not move it.
    started_at: Option<f64>,
    held: Option<HeldZone>,
}

impl SequenceRecognizer {
    pub fn new(config: &SequenceConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            patterns: config.patterns.clone(),
            hold_time_s: config.direction_hold_time_s,
            timeout_s: config.sequence_timeout_s,
            buffer: RingBuffer::new(config.longest_pattern()),
            started_at: None,
            held: None,
        })
    }

    /// Feeds the zone of one frame; returns the matched pattern's command.
    pub fn update(&mut self, zone: DirectionZone, t: f64) -> Option<CommandEvent> {
        self.expire(t);

        if zone == DirectionZone::Center {
            self.held = None;
            return None;
        }

        let held = match self.held {
            Some(held) if held.zone == zone => held,
            _ => HeldZone {
                zone,
                since: t,
                consumed: false,
            },
        };
        self.held = Some(held);

        if held.consumed || t - held.since < self.hold_time_s {
            return None;
        }
        self.held = Some(HeldZone {
            consumed: true,
            ..held
        });

        if self.buffer.last() == Some(&zone) {
            return None;
        }

        if self.started_at.is_none() {
            self.started_at = Some(t);
        }
        self.buffer.push(zone);
        log::debug!("sequence buffer: {:?}", self.buffer());
        self.match_patterns(t)
    }

    /// Clears the buffer once `sequence_timeout` has passed since the attempt
    /// started. Returns true when something was discarded.
    pub fn expire(&mut self, t: f64) -> bool {
        let Some(started_at) = self.started_at else {
            return false;
        };
        if t - started_at <= self.timeout_s {
            return false;
        }

        log::debug!(
            "sequence timed out with {} zone(s) buffered",
            self.buffer.len()
        );
        self.clear_buffer();
        true
    }

    pub fn buffer(&self) -> Vec<DirectionZone> {
        self.buffer.iter().copied().collect()
    }

    fn clear_buffer(&mut self) {
        self.buffer.clear();
        self.started_at = None;
    }

    fn match_patterns(&mut self, t: f64) -> Option<CommandEvent> {
        let buffered = self.buffer();
        let matched = self.patterns.iter().find(|pattern| {
            let length = pattern.zones.len();
            buffered.len() >= length && buffered[buffered.len() - length..] == pattern.zones[..]
        })?;

        let command = matched.command;
        self.clear_buffer();
        Some(CommandEvent::new(command, 1.0, t, CommandSource::Sequence))
    }
}

//! Command gate: the single arbitration point between every candidate
//! producer and the command-execution collaborator.
//!
//! Order of checks per candidate:
//!   1. confidence (direction commands only), dropped below `min_confidence`;
//!   2. cooldown of the candidate's class, suppressed while it runs;
//!   3. emission: ledger update, log, dispatch (live mode only).
//!
//! The gate keeps no queue. A rejected candidate is gone unless its producer
//! resubmits it on a later frame.

use serde::Serialize;

use crate::commands::sink::CommandSink;
use crate::models::config::{ConfigError, GateConfig};
use crate::models::events::{CommandEvent, CooldownClass};
use crate::telemetry::command_log::CommandLog;

// ─── Cooldown ledger ─────────────────────────────────────────────────────────

/// Last emission time per cooldown class, in sample seconds.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CooldownLedger {
    pub last_gesture_time: Option<f64>,
    pub last_command_time: Option<f64>,
}

impl CooldownLedger {
    pub fn last(&self, class: CooldownClass) -> Option<f64> {
        match class {
            CooldownClass::Gesture => self.last_gesture_time,
            CooldownClass::Command => self.last_command_time,
        }
    }

    fn mark(&mut self, class: CooldownClass, t: f64) {
        match class {
            CooldownClass::Gesture => self.last_gesture_time = Some(t),
            CooldownClass::Command => self.last_command_time = Some(t),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum GateDecision {
    Emitted,
    SuppressedCooldown,
    DroppedLowConfidence,
}

// ─── Gate ────────────────────────────────────────────────────────────────────

pub struct CommandGate {
    config: GateConfig,
    ledger: CooldownLedger,
    log: CommandLog,
    sink: Option<Box<dyn CommandSink>>,
}

impl CommandGate {
    pub fn new(config: &GateConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config: config.clone(),
            ledger: CooldownLedger::default(),
            log: CommandLog::new(config.log_capacity),
            sink: None,
        })
    }

    pub fn with_sink(mut self, sink: Box<dyn CommandSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn set_sink(&mut self, sink: Box<dyn CommandSink>) {
        self.sink = Some(sink);
    }

    pub fn set_simulation_mode(&mut self, enabled: bool) {
        self.config.simulation_mode = enabled;
    }

    pub fn is_simulation(&self) -> bool {
        self.config.simulation_mode
    }

    pub fn ledger(&self) -> CooldownLedger {
        self.ledger
    }

    pub fn log(&self) -> &CommandLog {
        &self.log
    }

    fn cooldown_for(&self, class: CooldownClass) -> f64 {
        match class {
            CooldownClass::Gesture => self.config.gesture_cooldown_s,
            CooldownClass::Command => self.config.command_cooldown_s,
        }
    }

    pub fn submit(&mut self, event: CommandEvent) -> GateDecision {
        if event.source.is_confidence_gated() && event.confidence < self.config.min_confidence {
            log::debug!(
                "[{:.3}] dropped {} (confidence {:.2} < {:.2})",
                event.t,
                event.kind.as_str(),
                event.confidence,
                self.config.min_confidence
            );
            return GateDecision::DroppedLowConfidence;
        }

        let class = event.cooldown_class();
        if let Some(last) = self.ledger.last(class) {
            let cooldown = self.cooldown_for(class);
            if event.t - last < cooldown {
                log::debug!(
                    "[{:.3}] suppressed {} ({:?} cooldown, {:.3}s since last)",
                    event.t,
                    event.kind.as_str(),
                    class,
                    event.t - last
                );
                return GateDecision::SuppressedCooldown;
            }
        }

        self.ledger.mark(class, event.t);
        log::info!(
            "[{:.3}] command {} confidence={:.2} source={:?}{}",
            event.t,
            event.kind.as_str(),
            event.confidence,
            event.source,
            if self.config.simulation_mode { " (simulated)" } else { "" }
        );

        let mut dispatched = false;
        if !self.config.simulation_mode {
            if let Some(sink) = self.sink.as_mut() {
                match sink.execute(&event) {
                    Ok(()) => dispatched = true,
                    Err(e) => log::warn!("Failed to execute {}: {}", event.kind.as_str(), e),
                }
            }
        }

        self.log.record(&event, dispatched);
        GateDecision::Emitted
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::models::events::{CommandKind, CommandSource};

    #[derive(Clone, Default)]
    struct SharedSink {
        executed: Rc<RefCell<Vec<CommandEvent>>>,
        fail: bool,
    }

    impl CommandSink for SharedSink {
        fn execute(&mut self, event: &CommandEvent) -> Result<(), String> {
            if self.fail {
                return Err("injector unavailable".to_string());
            }
            self.executed.borrow_mut().push(*event);
            Ok(())
        }
    }

    fn live_config() -> GateConfig {
        GateConfig {
            simulation_mode: false,
            ..GateConfig::default()
        }
    }

    fn gate() -> CommandGate {
        CommandGate::new(&live_config()).expect("gate config")
    }

    fn dwell_click(t: f64) -> CommandEvent {
        CommandEvent::new(CommandKind::Click, 1.0, t, CommandSource::Dwell)
    }

    fn direction(kind: CommandKind, confidence: f64, t: f64) -> CommandEvent {
        CommandEvent::new(kind, confidence, t, CommandSource::Direction)
    }

    #[test]
    fn dwell_clicks_inside_command_cooldown_emit_once() {
        let mut gate = gate();
        assert_eq!(gate.submit(dwell_click(1.0)), GateDecision::Emitted);
        assert_eq!(gate.submit(dwell_click(1.1)), GateDecision::SuppressedCooldown);
        assert_eq!(gate.log().len(), 1);
    }

    #[test]
    fn cooldown_expires_after_configured_interval() {
        let mut gate = gate();
        gate.submit(dwell_click(1.0));
        assert_eq!(gate.submit(dwell_click(1.6)), GateDecision::Emitted);
    }

    #[test]
    fn classes_have_independent_cooldowns() {
        let mut gate = gate();
        assert_eq!(gate.submit(dwell_click(1.0)), GateDecision::Emitted);
        assert_eq!(
            gate.submit(direction(CommandKind::ScrollUp, 0.9, 1.05)),
            GateDecision::Emitted
        );
        assert_eq!(
            gate.submit(direction(CommandKind::ScrollUp, 0.9, 1.3)),
            GateDecision::SuppressedCooldown
        );
        assert_eq!(
            gate.submit(direction(CommandKind::ScrollUp, 0.9, 1.5)),
            GateDecision::Emitted
        );
    }

    #[test]
    fn low_confidence_direction_is_dropped_without_consuming_cooldown() {
        let mut gate = gate();
        assert_eq!(
            gate.submit(direction(CommandKind::Left, 0.4, 1.0)),
            GateDecision::DroppedLowConfidence
        );
        assert_eq!(gate.ledger().last_gesture_time, None);
        assert_eq!(
            gate.submit(direction(CommandKind::Left, 0.7, 1.1)),
            GateDecision::Emitted
        );
    }

    #[test]
    fn non_direction_sources_ignore_confidence_floor() {
        let mut gate = gate();
        let low = CommandEvent::new(CommandKind::Click, 0.1, 0.0, CommandSource::Blink);
        assert_eq!(gate.submit(low), GateDecision::Emitted);
    }

    #[test]
    fn live_mode_forwards_to_sink() {
        let sink = SharedSink::default();
        let executed = sink.executed.clone();
        let mut gate = gate().with_sink(Box::new(sink));

        gate.submit(dwell_click(0.0));
        gate.submit(dwell_click(0.1));

        assert_eq!(executed.borrow().len(), 1);
        assert!(gate.log().last().expect("logged").dispatched);
    }

    #[test]
    fn simulation_mode_records_but_does_not_dispatch() {
        let sink = SharedSink::default();
        let executed = sink.executed.clone();
        let mut gate = CommandGate::new(&GateConfig::default())
            .expect("gate config")
            .with_sink(Box::new(sink));

        assert!(gate.is_simulation());
        assert_eq!(gate.submit(dwell_click(0.0)), GateDecision::Emitted);
        assert!(executed.borrow().is_empty());
        assert!(!gate.log().last().expect("logged").dispatched);
    }

    #[test]
    fn sink_failure_still_counts_as_emitted() {
        let sink = SharedSink {
            fail: true,
            ..SharedSink::default()
        };
        let mut gate = gate().with_sink(Box::new(sink));

        assert_eq!(gate.submit(dwell_click(0.0)), GateDecision::Emitted);
        assert_eq!(gate.submit(dwell_click(0.2)), GateDecision::SuppressedCooldown);
        assert!(!gate.log().last().expect("logged").dispatched);
    }
}

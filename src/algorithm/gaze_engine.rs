//! Per-frame entry point wiring every pipeline stage.
//!
//! One frame is processed completely before the next is accepted:
//!
//!   blink → smoother → intent window → direction → sequence → dwell →
//!   direction command → gate
//!
//! The engine performs no locking; hosts must serialize calls.

use std::time::Instant;

use serde::Serialize;

use crate::algorithm::blink::{BlinkEvent, BlinkStateMachine, EyelidPhase};
use crate::algorithm::direction::{basic_command, DirectionClassifier};
use crate::algorithm::dwell::DwellDetector;
use crate::algorithm::gaze_smoothing::GazeSmoother;
use crate::algorithm::intent::{IntentFeatures, IntentScorer};
use crate::algorithm::sequence::SequenceRecognizer;
use crate::commands::gate::{CommandGate, GateDecision};
use crate::commands::sink::CommandSink;
use crate::models::config::{ConfigError, ConfirmationConfig, ControlConfig, FeatureFlags};
use crate::models::events::{
    CommandEvent, CommandKind, CommandSource, Detection, DirectionZone, GazeFrame, GazeSample,
};
use crate::telemetry::command_log::CommandLog;
use crate::telemetry::performance::{PerformanceMonitor, PerformanceStats};

/// Everything the pipeline derived from one frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameOutcome {
    pub t: f64,
    pub filtered: Option<(f64, f64)>,
    pub velocity: Option<(f64, f64)>,
    pub zone: Option<DirectionZone>,
    pub direction_confidence: Option<f64>,
    pub features: Option<IntentFeatures>,
    pub blink_events: Vec<BlinkEvent>,
    pub emitted: Vec<CommandEvent>,
    pub dwell_progress: f64,
    pub awaiting_confirmation: Option<CommandKind>,
}

impl FrameOutcome {
    fn empty(t: f64) -> Self {
        Self {
            t,
            filtered: None,
            velocity: None,
            zone: None,
            direction_confidence: None,
            features: None,
            blink_events: Vec::new(),
            emitted: Vec::new(),
            dwell_progress: 0.0,
            awaiting_confirmation: None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct StagedCommand {
    kind: CommandKind,
    staged_at: f64,
    /// Set once the blink pattern matched; resubmitted until the gate emits it.
    confirmed: bool,
}

pub struct GazeEngine {
    features: FeatureFlags,
    confirmation: ConfirmationConfig,
    dwell_enabled: bool,
    sequence_enabled: bool,
    smoother: GazeSmoother,
    blink: BlinkStateMachine,
    classifier: DirectionClassifier,
    intent: IntentScorer,
    dwell: DwellDetector,
    sequence: SequenceRecognizer,
    gate: CommandGate,
    performance: PerformanceMonitor,
    staged: Option<StagedCommand>,
}

impl GazeEngine {
    pub fn new(config: &ControlConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let classifier = DirectionClassifier::new(&config.direction);

        Ok(Self {
            features: config.features.clone(),
            confirmation: config.confirmation.clone(),
            dwell_enabled: config.dwell.enabled,
            sequence_enabled: config.sequence.enabled,
            smoother: GazeSmoother::from_config(&config.filter)?,
            blink: BlinkStateMachine::new(&config.blink)?,
            classifier,
            intent: IntentScorer::new(&config.intent, classifier)?,
            dwell: DwellDetector::new(&config.dwell)?,
            sequence: SequenceRecognizer::new(&config.sequence)?,
            gate: CommandGate::new(&config.gate)?,
            performance: PerformanceMonitor::new(),
            staged: None,
        })
    }

    pub fn with_sink(mut self, sink: Box<dyn CommandSink>) -> Self {
        self.gate.set_sink(sink);
        self
    }

    pub fn set_simulation_mode(&mut self, enabled: bool) {
        self.gate.set_simulation_mode(enabled);
    }

    pub fn command_log(&self) -> &CommandLog {
        self.gate.log()
    }

    pub fn performance_stats(&self) -> PerformanceStats {
        self.performance.stats()
    }

    pub fn blink_phase(&self) -> EyelidPhase {
        self.blink.phase()
    }

    pub fn staged_command(&self) -> Option<CommandKind> {
        self.staged.map(|staged| staged.kind)
    }

    pub fn process_frame(&mut self, frame: &GazeFrame) -> FrameOutcome {
        let started = Instant::now();
        let t = frame.t;
        let mut outcome = FrameOutcome::empty(t);

        self.expire_staged(t);

        match frame.detection {
            Some(detection) => self.process_detection(t, &detection, &mut outcome),
            // Stateful detectors keep their state; only timeouts advance.
            None => {
                self.sequence.expire(t);
            }
        }

        outcome.dwell_progress = self.dwell.progress(t);
        outcome.awaiting_confirmation = self.staged_command();
        self.performance.record(t, started.elapsed());
        outcome
    }

    fn process_detection(&mut self, t: f64, detection: &Detection, outcome: &mut FrameOutcome) {
        let mut candidates = Vec::new();

        let blink_events = self.blink.update(detection.eye_aspect_ratio, t);
        for event in &blink_events {
            match self.blink_candidate(*event, t) {
                Some(candidate) => candidates.push(candidate),
                // Nothing to submit, so nothing to wait for.
                None => self.blink.acknowledge(*event),
            }
        }
        outcome.blink_events = blink_events;

        if let Some(staged) = self.staged.filter(|staged| staged.confirmed) {
            candidates.push(CommandEvent::new(
                staged.kind,
                1.0,
                t,
                CommandSource::Confirmation,
            ));
        }

        match self.smoother.update(detection.x, detection.y) {
            Ok((x, y)) => self.process_position(x, y, t, &mut candidates, outcome),
            Err(e) => log::warn!("[{:.3}] gaze sample skipped: {}", t, e),
        }

        // Long blink, sleep and confirmed commands stay pending while suppressed.
        for candidate in candidates {
            if self.gate.submit(candidate) != GateDecision::Emitted {
                continue;
            }
            match (candidate.source, candidate.kind) {
                (CommandSource::Blink, CommandKind::EmergencyAlert) => {
                    self.blink.acknowledge(BlinkEvent::LongBlink)
                }
                (CommandSource::Blink, CommandKind::SleepMode) => {
                    self.blink.acknowledge(BlinkEvent::Sleep)
                }
                (CommandSource::Confirmation, _) => self.staged = None,
                _ => {}
            }
            outcome.emitted.push(candidate);
        }
    }

    fn process_position(
        &mut self,
        x: f64,
        y: f64,
        t: f64,
        candidates: &mut Vec<CommandEvent>,
        outcome: &mut FrameOutcome,
    ) {
        self.intent.add_sample(GazeSample::new(x, y, t));
        let zone = self.classifier.classify(x, y);
        let confidence = self.intent.direction_confidence(x, y);

        let mut sequence_matched = false;
        if self.sequence_enabled && self.features.assistive_controls {
            if let Some(event) = self.sequence.update(zone, t) {
                sequence_matched = true;
                if self.confirmation.required && event.kind.is_assistive() {
                    self.stage(event);
                } else {
                    candidates.push(event);
                }
            }
        }

        if self.dwell_enabled {
            let anchor = self.dwell.anchor_position();
            let intent = self.intent.is_enabled().then_some(&self.intent);
            if self.dwell.update(x, y, t, intent) {
                let dwell_confidence = match (intent, anchor) {
                    (Some(scorer), Some((ax, ay))) => scorer.direction_confidence(ax, ay),
                    _ => 1.0,
                };
                candidates.push(CommandEvent::new(
                    CommandKind::Click,
                    dwell_confidence,
                    t,
                    CommandSource::Dwell,
                ));
            }
        }

        if !sequence_matched {
            if let Some(kind) = basic_command(zone, &self.features) {
                candidates.push(CommandEvent::new(kind, confidence, t, CommandSource::Direction));
            }
        }

        // Pattern feature: is the gaze still on the newest sequence step?
        let last_step = self.sequence.buffer().last().copied();
        let pattern = last_step.as_ref().map(std::slice::from_ref);
        outcome.filtered = Some((x, y));
        outcome.velocity = Some(self.smoother.get_velocity());
        outcome.zone = Some(zone);
        outcome.direction_confidence = Some(confidence);
        outcome.features = Some(self.intent.features(x, y, pattern));
    }

    fn blink_candidate(&mut self, event: BlinkEvent, t: f64) -> Option<CommandEvent> {
        let advanced = self.features.advanced_controls;
        let assistive = self.features.assistive_controls;
        let blink = |kind| CommandEvent::new(kind, 1.0, t, CommandSource::Blink);

        match event {
            BlinkEvent::Click => advanced.then(|| blink(CommandKind::Click)),
            BlinkEvent::DoubleClick => advanced.then(|| blink(CommandKind::DoubleClick)),
            BlinkEvent::LongBlink => assistive.then(|| blink(CommandKind::EmergencyAlert)),
            BlinkEvent::Sleep => assistive.then(|| blink(CommandKind::SleepMode)),
            BlinkEvent::Confirmed => {
                if let Some(staged) = self.staged.as_mut() {
                    log::info!("[{:.3}] {} confirmed", t, staged.kind.as_str());
                    staged.confirmed = true;
                }
                None
            }
        }
    }

    fn stage(&mut self, event: CommandEvent) {
        if let Some(previous) = self.staged {
            if previous.confirmed {
                log::warn!(
                    "[{:.3}] confirmed {} replaced before release",
                    event.t,
                    previous.kind.as_str()
                );
            } else {
                log::debug!("replacing staged {}", previous.kind.as_str());
            }
        }
        log::info!(
            "[{:.3}] {} awaiting blink confirmation",
            event.t,
            event.kind.as_str()
        );
        self.staged = Some(StagedCommand {
            kind: event.kind,
            staged_at: event.t,
            confirmed: false,
        });
        self.blink.await_confirmation(&self.confirmation.blink_pattern);
    }

    fn expire_staged(&mut self, t: f64) {
        let Some(staged) = self.staged else {
            return;
        };
        if !staged.confirmed && t - staged.staged_at > self.confirmation.timeout_s {
            log::info!(
                "[{:.3}] {} not confirmed within {:.1}s",
                t,
                staged.kind.as_str(),
                self.confirmation.timeout_s
            );
            self.staged = None;
            self.blink.cancel_confirmation();
        }
    }
}

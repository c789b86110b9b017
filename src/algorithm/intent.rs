//! Intent scoring: deliberate gaze vs. incidental glances.
//!
//! Four features are computed over a rolling window of smoothed samples:
//!
//! - duration: time spent within a radius of a target point,
//! - velocity: mean per-sample displacement,
//! - pattern: whether the newest entries classify to a given zone sequence,
//! - timing consistency: `1 / (1 + variance)` of the inter-sample gaps.
//!
//! The decision policies below deliberately use fixed bands. The exact values
//! live in `IntentConfig`.

use serde::Serialize;

use crate::algorithm::direction::DirectionClassifier;
use crate::algorithm::ring_buffer::RingBuffer;
use crate::models::config::{ConfigError, IntentConfig};
use crate::models::events::{DirectionZone, GazeSample};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IntentFeatures {
    pub duration_s: f64,
    pub velocity: f64,
    pub pattern_match: bool,
    pub timing_consistency: f64,
}

#[derive(Debug, Clone)]
pub struct IntentScorer {
    window: RingBuffer<GazeSample>,
    config: IntentConfig,
    classifier: DirectionClassifier,
}

impl IntentScorer {
    pub fn new(config: &IntentConfig, classifier: DirectionClassifier) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            window: RingBuffer::new(config.window_capacity),
            config: config.clone(),
            classifier,
        })
    }

    pub fn add_sample(&mut self, sample: GazeSample) {
        self.window.push(sample);
    }

    pub fn len(&self) -> usize {
        self.window.len()
    }

    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    fn consecutive_pairs(&self) -> impl Iterator<Item = (&GazeSample, &GazeSample)> + '_ {
        self.window.iter().zip(self.window.iter().skip(1))
    }

    /// Sum of inter-sample gaps whose later sample lies within `radius` of the target.
    pub fn duration_at(&self, x: f64, y: f64, radius: f64) -> f64 {
        if self.window.len() < 2 {
            return 0.0;
        }

        self.consecutive_pairs()
            .filter(|(_, current)| current.distance_to(x, y) <= radius)
            .map(|(previous, current)| current.t - previous.t)
            .sum()
    }

    /// Mean displacement per sample across the window.
    pub fn movement_intensity(&self) -> f64 {
        if self.window.len() < 2 {
            return 0.0;
        }

        let (total, count) = self
            .consecutive_pairs()
            .fold((0.0, 0usize), |(total, count), (previous, current)| {
                (total + current.distance_to(previous.x, previous.y), count + 1)
            });
        total / count as f64
    }

    /// True when the newest `pattern.len()` samples classify exactly to `pattern`.
    pub fn matches_pattern(&self, pattern: &[DirectionZone]) -> bool {
        if pattern.is_empty() || self.window.len() < pattern.len() {
            return false;
        }

        self.window
            .tail(pattern.len())
            .map(|sample| self.classifier.classify(sample.x, sample.y))
            .eq(pattern.iter().copied())
    }

    /// 0 with fewer than three samples, otherwise `1 / (1 + var(gaps))`.
    pub fn timing_consistency(&self) -> f64 {
        if self.window.len() < 3 {
            return 0.0;
        }

        let gaps = || self.consecutive_pairs().map(|(prev, curr)| curr.t - prev.t);
        let count = (self.window.len() - 1) as f64;
        let mean = gaps().sum::<f64>() / count;
        let variance = gaps().map(|gap| (gap - mean).powi(2)).sum::<f64>() / count;
        1.0 / (1.0 + variance)
    }

    /// Strict duration rule OR relaxed duration with slow movement.
    pub fn is_intentional(&self, x: f64, y: f64) -> bool {
        let duration = self.duration_at(x, y, self.config.dwell_radius);
        let threshold = self.config.intentional_gaze_duration_s;

        let is_long_duration = duration >= threshold;
        let is_deliberate = self.movement_intensity() < self.config.velocity_slow;
        is_long_duration
            || (duration > threshold * self.config.relaxed_duration_ratio && is_deliberate)
    }

    /// Banded confidence for a direction command issued at `(x, y)`.
    pub fn direction_confidence(&self, x: f64, y: f64) -> f64 {
        if !self.config.enabled {
            return self.config.base_confidence;
        }

        let velocity = self.movement_intensity();
        let duration = self.duration_at(x, y, self.config.confidence_radius);

        if velocity < self.config.velocity_slow
            && duration > self.config.high_confidence_duration_s
        {
            self.config.high_confidence
        } else if velocity < self.config.velocity_fast
            && duration > self.config.medium_confidence_duration_s
        {
            self.config.medium_confidence
        } else {
            self.config.low_confidence
        }
    }

    pub fn features(&self, x: f64, y: f64, pattern: Option<&[DirectionZone]>) -> IntentFeatures {
        IntentFeatures {
            duration_s: self.duration_at(x, y, self.config.dwell_radius),
            velocity: self.movement_intensity(),
            pattern_match: pattern.is_some_and(|zones| self.matches_pattern(zones)),
            timing_consistency: self.timing_consistency(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::config::DirectionConfig;

    fn scorer() -> IntentScorer {
        let classifier = DirectionClassifier::new(&DirectionConfig {
            canvas_width: 1000.0,
            canvas_height: 1000.0,
            ..DirectionConfig::default()
        });
        IntentScorer::new(&IntentConfig::default(), classifier).expect("intent config")
    }

    fn feed(scorer: &mut IntentScorer, points: &[(f64, f64)], dt: f64) {
        for (index, (x, y)) in points.iter().enumerate() {
            scorer.add_sample(GazeSample::new(*x, *y, index as f64 * dt));
        }
    }

    #[test]
    fn window_never_exceeds_capacity() {
        let mut scorer = scorer();
        for step in 0..100 {
            scorer.add_sample(GazeSample::new(0.0, 0.0, step as f64));
        }
        assert_eq!(scorer.len(), IntentConfig::default().window_capacity);
    }

    #[test]
    fn duration_counts_only_samples_inside_radius() {
        let mut scorer = scorer();
        feed(
            &mut scorer,
            &[(0.0, 0.0), (1.0, 0.0), (500.0, 500.0), (2.0, 0.0)],
            0.1,
        );

        let duration = scorer.duration_at(0.0, 0.0, 50.0);
        assert!((duration - 0.2).abs() < 1e-9, "duration = {duration}");
    }

    #[test]
    fn velocity_is_mean_displacement() {
        let mut scorer = scorer();
        feed(&mut scorer, &[(0.0, 0.0), (3.0, 4.0), (3.0, 14.0)], 0.1);
        assert!((scorer.movement_intensity() - 7.5).abs() < 1e-9);
    }

    #[test]
    fn timing_consistency_is_one_for_uniform_cadence() {
        let mut scorer = scorer();
        feed(&mut scorer, &[(0.0, 0.0); 10], 1.0 / 30.0);
        assert!((scorer.timing_consistency() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn timing_consistency_drops_with_irregular_gaps() {
        let mut scorer = scorer();
        for (x, t) in [(0.0, 0.0), (0.0, 1.0), (0.0, 4.0), (0.0, 5.0)] {
            scorer.add_sample(GazeSample::new(x, 0.0, t));
        }
        // gaps 1, 3, 1 -> variance 8/9
        let expected = 1.0 / (1.0 + 8.0 / 9.0);
        assert!((scorer.timing_consistency() - expected).abs() < 1e-9);
    }

    #[test]
    fn pattern_feature_matches_newest_entries() {
        let mut scorer = scorer();
        feed(
            &mut scorer,
            &[(500.0, 500.0), (100.0, 500.0), (900.0, 500.0), (100.0, 500.0)],
            0.1,
        );

        use DirectionZone::{Left, Right};
        assert!(scorer.matches_pattern(&[Left, Right, Left]));
        assert!(!scorer.matches_pattern(&[Right, Left, Right]));
        assert!(!scorer.matches_pattern(&[]));
    }

    #[test]
    fn long_steady_gaze_is_intentional() {
        let mut scorer = scorer();
        feed(&mut scorer, &[(500.0, 500.0); 30], 0.05);
        // 29 gaps * 0.05 = 1.45 s
        assert!(scorer.is_intentional(500.0, 500.0));
    }

    #[test]
    fn relaxed_rule_accepts_brief_slow_gaze() {
        let mut scorer = scorer();
        feed(&mut scorer, &[(500.0, 500.0); 8], 0.1);
        // 0.7 s: below 1.0 s but above half of it, and nearly motionless
        assert!(scorer.is_intentional(500.0, 500.0));
    }

    #[test]
    fn brief_fast_gaze_is_not_intentional() {
        let mut scorer = scorer();
        let points: Vec<(f64, f64)> = (0..8)
            .map(|step| if step % 2 == 0 { (500.0, 500.0) } else { (520.0, 500.0) })
            .collect();
        feed(&mut scorer, &points, 0.1);
        // within radius for 0.7 s but moving 20 px per sample
        assert!(!scorer.is_intentional(500.0, 500.0));
    }

    #[test]
    fn confidence_bands() {
        let mut steady = scorer();
        feed(&mut steady, &[(500.0, 500.0); 10], 0.1);
        assert_eq!(steady.direction_confidence(500.0, 500.0), 0.9);

        let mut moderate = scorer();
        let points: Vec<(f64, f64)> = (0..3)
            .map(|step| (500.0 + step as f64 * 20.0, 500.0))
            .collect();
        feed(&mut moderate, &points, 0.1);
        assert_eq!(moderate.direction_confidence(540.0, 500.0), 0.7);

        let mut rapid = scorer();
        feed(&mut rapid, &[(0.0, 0.0), (900.0, 900.0)], 0.1);
        assert_eq!(rapid.direction_confidence(900.0, 900.0), 0.4);
    }

    #[test]
    fn disabled_scorer_reports_base_confidence() {
        let classifier = DirectionClassifier::new(&DirectionConfig::default());
        let config = IntentConfig {
            enabled: false,
            ..IntentConfig::default()
        };
        let scorer = IntentScorer::new(&config, classifier).expect("intent config");
        assert_eq!(scorer.direction_confidence(0.0, 0.0), 0.5);
    }
}

use crate::algorithm::intent::IntentScorer;
use crate::models::config::{ConfigError, DwellConfig};

#[derive(Debug, Clone, Copy, PartialEq)]
struct DwellAnchor {
    x: f64,
    y: f64,
    started_at: f64,
}

/// Radius + time click trigger over the smoothed position.
///
/// The anchor exists exactly while a dwell timer is running.
#[derive(Debug, Clone)]
pub struct DwellDetector {
    config: DwellConfig,
    anchor: Option<DwellAnchor>,
}

impl DwellDetector {
    pub fn new(config: &DwellConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config: config.clone(),
            anchor: None,
        })
    }

    /// Returns true exactly once per qualifying dwell.
    ///
    /// With `intent` present the anchor must also pass the intentionality
    /// check; a dwell that never does still fires after
    /// `dwell_time * unintentional_extension`.
    pub fn update(&mut self, x: f64, y: f64, t: f64, intent: Option<&IntentScorer>) -> bool {
        let Some(anchor) = self.anchor else {
            self.start(x, y, t);
            return false;
        };

        if (x - anchor.x).hypot(y - anchor.y) > self.config.click_radius {
            self.start(x, y, t);
            return false;
        }

        let elapsed = t - anchor.started_at;
        if elapsed < self.config.dwell_time_s {
            return false;
        }

        if let Some(scorer) = intent {
            let extended = self.config.dwell_time_s * self.config.unintentional_extension;
            if !scorer.is_intentional(anchor.x, anchor.y) && elapsed < extended {
                return false;
            }
        }

        log::debug!(
            "dwell fired at ({:.1}, {:.1}) after {:.2}s",
            anchor.x,
            anchor.y,
            elapsed
        );
        self.anchor = None;
        true
    }

    /// Fraction of the base dwell time elapsed, 0 when no timer is running.
    pub fn progress(&self, t: f64) -> f64 {
        match self.anchor {
            Some(anchor) => ((t - anchor.started_at) / self.config.dwell_time_s).clamp(0.0, 1.0),
            None => 0.0,
        }
    }

    pub fn anchor_position(&self) -> Option<(f64, f64)> {
        self.anchor.map(|anchor| (anchor.x, anchor.y))
    }

    fn start(&mut self, x: f64, y: f64, t: f64) {
        self.anchor = Some(DwellAnchor {
            x,
            y,
            started_at: t,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithm::direction::DirectionClassifier;
    use crate::models::config::{DirectionConfig, IntentConfig};
    use crate::models::events::GazeSample;

    const DT: f64 = 1.0 / 30.0;

    fn detector() -> DwellDetector {
        DwellDetector::new(&DwellConfig {
            click_radius: 25.0,
            dwell_time_s: 1.2,
            ..DwellConfig::default()
        })
        .expect("dwell config")
    }

    fn count_fires(detector: &mut DwellDetector, samples: &[(f64, f64, f64)]) -> Vec<f64> {
        samples
            .iter()
            .filter(|(x, y, t)| detector.update(*x, *y, *t, None))
            .map(|(_, _, t)| *t)
            .collect()
    }

    fn steady(x: f64, y: f64, from: f64, to: f64) -> Vec<(f64, f64, f64)> {
        let steps = ((to - from) / DT).round() as usize;
        (0..=steps)
            .map(|step| (x, y, from + step as f64 * DT))
            .collect()
    }

    #[test]
    fn fires_once_after_dwell_time() {
        let mut detector = detector();
        let samples = steady(500.0, 500.0, 0.0, 1.3);

        let fires = count_fires(&mut detector, &samples);
        assert_eq!(fires.len(), 1);
        assert!(fires[0] >= 1.2);
    }

    #[test]
    fn drifting_beyond_radius_restarts_timer() {
        let mut detector = detector();
        let mut samples = steady(500.0, 500.0, 0.0, 0.6);
        samples.extend(steady(540.0, 500.0, 0.6 + DT, 2.0));

        let fires = count_fires(&mut detector, &samples);
        assert_eq!(fires.len(), 1);
        assert!(fires[0] >= 0.6 + DT + 1.2 - 1e-9, "fired at {}", fires[0]);
    }

    #[test]
    fn small_jitter_does_not_reanchor() {
        let mut detector = detector();
        let samples: Vec<(f64, f64, f64)> = (0..=40)
            .map(|step| {
                let jitter = if step % 2 == 0 { 2.0 } else { -2.0 };
                (500.0 + jitter, 500.0 - jitter, step as f64 * DT)
            })
            .collect();

        let fires = count_fires(&mut detector, &samples);
        assert_eq!(fires.len(), 1);
    }

    #[test]
    fn anchor_present_only_while_timing() {
        let mut detector = detector();
        assert_eq!(detector.anchor_position(), None);
        assert_eq!(detector.progress(0.0), 0.0);

        detector.update(10.0, 10.0, 0.0, None);
        assert_eq!(detector.anchor_position(), Some((10.0, 10.0)));
        assert!((detector.progress(0.6) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn unintentional_dwell_waits_for_extension() {
        let classifier = DirectionClassifier::new(&DirectionConfig::default());
        let mut scorer = IntentScorer::new(&IntentConfig::default(), classifier)
            .expect("intent config");
        let mut detector = detector();

        // The intent window only ever saw gaze far from the anchor.
        let mut fired_at = None;
        for step in 0..=60 {
            let t = step as f64 * DT;
            scorer.add_sample(GazeSample::new(900.0, 900.0, t));
            if detector.update(500.0, 500.0, t, Some(&scorer)) {
                fired_at = Some(t);
                break;
            }
        }

        let fired_at = fired_at.expect("dwell must eventually fire");
        assert!(fired_at >= 1.8 - 1e-9, "fired at {fired_at}");
    }
}

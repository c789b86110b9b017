//! Gaze position smoothing.
//!
//! `PositionFilter` is a constant-velocity Kalman filter over `[x, y, vx, vy]`
//! with unit timestep per sample; velocity is therefore "per sample", not per
//! second. `MovingAverageSmoother` is the lightweight fallback used when the
//! Kalman filter is disabled.

use nalgebra::{Matrix2, Matrix2x4, Matrix4, Vector2, Vector4};
use thiserror::Error;

use crate::algorithm::ring_buffer::RingBuffer;
use crate::models::config::{ConfigError, FilterConfig};

#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum FilterError {
    #[error("measurement is not finite: ({0}, {1})")]
    NonFiniteMeasurement(f64, f64),
    #[error("innovation covariance is not invertible")]
    SingularInnovation,
    #[error("filter update produced a non-finite state")]
    NonFiniteState,
}

/// Read-only snapshot of the filter internals.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FilterState {
    pub x: f64,
    pub y: f64,
    pub vx: f64,
    pub vy: f64,
    pub covariance: Matrix4<f64>,
    pub initialized: bool,
}

#[derive(Debug, Clone)]
pub struct PositionFilter {
    state: Vector4<f64>,
    covariance: Matrix4<f64>,
    transition: Matrix4<f64>,
    observation: Matrix2x4<f64>,
    process_noise: Matrix4<f64>,
    measurement_noise: Matrix2<f64>,
    initialized: bool,
}

impl PositionFilter {
    pub fn new(config: &FilterConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        #[rustfmt::skip]
        let transition = Matrix4::new(
            1.0, 0.0, 1.0, 0.0,
            0.0, 1.0, 0.0, 1.0,
            0.0, 0.0, 1.0, 0.0,
            0.0, 0.0, 0.0, 1.0,
        );
        #[rustfmt::skip]
        let observation = Matrix2x4::new(
            1.0, 0.0, 0.0, 0.0,
            0.0, 1.0, 0.0, 0.0,
        );
        Ok(Self {
            state: Vector4::zeros(),
            covariance: Matrix4::identity(),
            transition,
            observation,
            process_noise: Matrix4::identity() * config.process_variance,
            measurement_noise: Matrix2::identity() * config.measurement_variance,
            initialized: false,
        })
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Advances state one sample and inflates covariance by Q.
    pub fn predict(&mut self) -> (f64, f64) {
        let (state, covariance) = self.predicted();
        self.state = state;
        self.covariance = covariance;
        (self.state[0], self.state[1])
    }

    /// Folds one measurement in and returns the filtered position.
    ///
    /// The first call seeds the position directly (velocity zero) so there is
    /// no start-up lag. On any numerical failure the previous state is kept.
    pub fn update(&mut self, x: f64, y: f64) -> Result<(f64, f64), FilterError> {
        if !x.is_finite() || !y.is_finite() {
            return Err(FilterError::NonFiniteMeasurement(x, y));
        }

        if !self.initialized {
            self.state = Vector4::new(x, y, 0.0, 0.0);
            self.initialized = true;
            return Ok((x, y));
        }

        let (predicted_state, predicted_covariance) = self.predicted();
        let measurement = Vector2::new(x, y);
        let innovation = measurement - self.observation * predicted_state;
        let innovation_covariance = self.observation
            * predicted_covariance
            * self.observation.transpose()
            + self.measurement_noise;
        let inverse = innovation_covariance
            .try_inverse()
            .ok_or(FilterError::SingularInnovation)?;

        let gain = predicted_covariance * self.observation.transpose() * inverse;
        let corrected_state = predicted_state + gain * innovation;
        let corrected_covariance =
            (Matrix4::identity() - gain * self.observation) * predicted_covariance;
        // Re-symmetrize to keep rounding from drifting P off symmetric.
        let corrected_covariance =
            (corrected_covariance + corrected_covariance.transpose()) * 0.5;

        if !corrected_state.iter().all(|value| value.is_finite())
            || !corrected_covariance.iter().all(|value| value.is_finite())
        {
            return Err(FilterError::NonFiniteState);
        }

        self.state = corrected_state;
        self.covariance = corrected_covariance;
        Ok((self.state[0], self.state[1]))
    }

    pub fn get_velocity(&self) -> (f64, f64) {
        (self.state[2], self.state[3])
    }

    pub fn position(&self) -> (f64, f64) {
        (self.state[0], self.state[1])
    }

    pub fn state(&self) -> FilterState {
        FilterState {
            x: self.state[0],
            y: self.state[1],
            vx: self.state[2],
            vy: self.state[3],
            covariance: self.covariance,
            initialized: self.initialized,
        }
    }

    fn predicted(&self) -> (Vector4<f64>, Matrix4<f64>) {
        let state = self.transition * self.state;
        let covariance =
            self.transition * self.covariance * self.transition.transpose() + self.process_noise;
        (state, covariance)
    }
}

/// Streaming mean over the last N measurements.
#[derive(Debug, Clone)]
pub struct MovingAverageSmoother {
    history: RingBuffer<(f64, f64)>,
    previous: Option<(f64, f64)>,
    current: Option<(f64, f64)>,
}

impl MovingAverageSmoother {
    pub fn new(window: usize) -> Self {
        Self {
            history: RingBuffer::new(window),
            previous: None,
            current: None,
        }
    }

    pub fn update(&mut self, x: f64, y: f64) -> Result<(f64, f64), FilterError> {
        if !x.is_finite() || !y.is_finite() {
            return Err(FilterError::NonFiniteMeasurement(x, y));
        }

        self.history.push((x, y));
        let count = self.history.len() as f64;
        let (sum_x, sum_y) = self
            .history
            .iter()
            .fold((0.0, 0.0), |(sx, sy), (px, py)| (sx + px, sy + py));
        let smoothed = (sum_x / count, sum_y / count);

        self.previous = self.current;
        self.current = Some(smoothed);
        Ok(smoothed)
    }

    pub fn get_velocity(&self) -> (f64, f64) {
        match (self.previous, self.current) {
            (Some(prev), Some(curr)) => (curr.0 - prev.0, curr.1 - prev.1),
            _ => (0.0, 0.0),
        }
    }
}

/// Smoother selected by `FilterConfig::use_kalman`.
#[derive(Debug, Clone)]
pub enum GazeSmoother {
    Kalman(PositionFilter),
    MovingAverage(MovingAverageSmoother),
}

impl GazeSmoother {
    pub fn from_config(config: &FilterConfig) -> Result<Self, ConfigError> {
        if config.use_kalman {
            Ok(Self::Kalman(PositionFilter::new(config)?))
        } else {
            config.validate()?;
            Ok(Self::MovingAverage(MovingAverageSmoother::new(
                config.smoothing_frames,
            )))
        }
    }

    pub fn update(&mut self, x: f64, y: f64) -> Result<(f64, f64), FilterError> {
        match self {
            Self::Kalman(filter) => filter.update(x, y),
            Self::MovingAverage(smoother) => smoother.update(x, y),
        }
    }

    pub fn get_velocity(&self) -> (f64, f64) {
        match self {
            Self::Kalman(filter) => filter.get_velocity(),
            Self::MovingAverage(smoother) => smoother.get_velocity(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn default_filter() -> PositionFilter {
        PositionFilter::new(&FilterConfig::default()).expect("default filter config")
    }

    fn is_symmetric_psd(matrix: &Matrix4<f64>) -> bool {
        let symmetric = (matrix - matrix.transpose()).abs().max() < 1e-9;
        let eigenvalues = matrix.symmetric_eigenvalues();
        symmetric && eigenvalues.iter().all(|value| *value >= -1e-9)
    }

    #[test]
    fn first_update_returns_raw_measurement() {
        let mut filter = default_filter();
        let filtered = filter.update(412.5, 233.0).expect("first update");

        assert_eq!(filtered, (412.5, 233.0));
        assert_eq!(filter.get_velocity(), (0.0, 0.0));
        assert!(filter.is_initialized());
    }

    #[test]
    fn converges_to_constant_measurement() {
        let mut filter = default_filter();
        filter.update(0.0, 0.0).expect("seed");
        for _ in 0..300 {
            filter.update(100.0, 100.0).expect("update");
        }

        let (x, y) = filter.position();
        let (vx, vy) = filter.get_velocity();
        assert!((x - 100.0).abs() < 1e-3, "x = {x}");
        assert!((y - 100.0).abs() < 1e-3, "y = {y}");
        assert!(vx.abs() < 1e-3 && vy.abs() < 1e-3, "v = ({vx}, {vy})");
    }

    #[test]
    fn covariance_stays_symmetric_positive_semi_definite() {
        let mut filter = default_filter();
        let path = [(0.0, 0.0), (3.0, 1.0), (7.5, 2.0), (12.0, 4.0), (11.0, 9.0)];
        for _ in 0..20 {
            for (x, y) in path {
                filter.update(x, y).expect("update");
                assert!(is_symmetric_psd(&filter.state().covariance));
            }
        }
    }

    #[test]
    fn tracks_velocity_of_linear_motion() {
        let mut filter = default_filter();
        for step in 0..400 {
            let t = step as f64;
            filter.update(2.0 * t, -1.0 * t).expect("update");
        }

        let (vx, vy) = filter.get_velocity();
        assert!((vx - 2.0).abs() < 0.05, "vx = {vx}");
        assert!((vy + 1.0).abs() < 0.05, "vy = {vy}");
    }

    #[test]
    fn rejects_non_finite_measurement_and_keeps_state() {
        let mut filter = default_filter();
        filter.update(10.0, 10.0).expect("seed");
        filter.update(11.0, 10.0).expect("update");
        let before = filter.state();

        let result = filter.update(f64::NAN, 5.0);
        assert!(matches!(result, Err(FilterError::NonFiniteMeasurement(_, _))));
        assert_eq!(filter.state(), before);
    }

    #[test]
    fn predict_moves_position_by_velocity() {
        let mut filter = default_filter();
        filter.update(0.0, 0.0).expect("seed");
        for step in 1..200 {
            filter.update(step as f64, 0.0).expect("update");
        }
        let (x_before, _) = filter.position();
        let (vx, _) = filter.get_velocity();
        let (x_after, _) = filter.predict();

        assert!((x_after - (x_before + vx)).abs() < 1e-9);
    }

    #[test]
    fn moving_average_smooths_over_window() {
        let mut smoother = MovingAverageSmoother::new(3);
        smoother.update(0.0, 0.0).expect("update");
        smoother.update(3.0, 0.0).expect("update");
        let (x, _) = smoother.update(6.0, 0.0).expect("update");
        assert!((x - 3.0).abs() < 1e-9);

        let (x, _) = smoother.update(9.0, 0.0).expect("update");
        assert!((x - 6.0).abs() < 1e-9);
        assert_eq!(smoother.get_velocity(), (3.0, 0.0));
    }

    #[test]
    fn smoother_follows_use_kalman_flag() {
        let mut config = FilterConfig::default();
        assert!(matches!(
            GazeSmoother::from_config(&config),
            Ok(GazeSmoother::Kalman(_))
        ));

        config.use_kalman = false;
        assert!(matches!(
            GazeSmoother::from_config(&config),
            Ok(GazeSmoother::MovingAverage(_))
        ));
    }
}

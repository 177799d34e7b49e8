//! Scalar Kalman estimator
//!
//! Channel-agnostic one-state filter: the caller supplies the model increment
//! in `predict` and an independent measurement in `update`.

use serde::{Deserialize, Serialize};

use crate::config::KalmanSettings;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KalmanState {
    /// Estimate
    pub x: f64,
    /// Estimate covariance
    pub p: f64,
    /// Process noise
    pub q: f64,
    /// Measurement noise
    pub r: f64,
}

#[derive(Debug, Clone)]
pub struct ScalarKalman {
    state: KalmanState,
}

impl ScalarKalman {
    pub fn new(x: f64, p: f64, q: f64, r: f64) -> Self {
        Self { state: KalmanState { x, p, q, r } }
    }

    pub fn from_settings(x: f64, settings: &KalmanSettings) -> Self {
        Self::new(x, settings.initial_covariance, settings.process_noise, settings.measurement_noise)
    }

    /// x ← x + u, P ← P + Q
    pub fn predict(&mut self, u: f64) -> f64 {
        self.state.x += u;
        self.state.p += self.state.q;
        self.state.x
    }

    /// Fold in measurement `z` and return the corrected estimate.
    pub fn update(&mut self, z: f64) -> f64 {
        let s = &mut self.state;
        let denom = s.p + s.r;
        // Zero innovation covariance: nothing to weigh, keep the estimate
        if denom <= 0.0 || !denom.is_finite() {
            return s.x;
        }
        let k = s.p / denom;
        s.x += k * (z - s.x);
        s.p *= 1.0 - k;
        s.x
    }

    /// Restart at `x` with the initial covariance `p`, keeping the noise model.
    pub fn reset(&mut self, x: f64, p: f64) {
        self.state.x = x;
        self.state.p = p;
    }

    pub fn estimate(&self) -> f64 {
        self.state.x
    }

    pub fn state(&self) -> KalmanState {
        self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_noise_free_update_is_identity() {
        let mut kf = ScalarKalman::new(4.2, 0.0, 0.0, 0.0);
        let x = kf.update(4.2);
        assert_eq!(x, 4.2);
        assert_eq!(kf.state().p, 0.0);
    }

    #[test]
    fn test_matching_measurement_keeps_estimate() {
        let mut kf = ScalarKalman::new(3.0, 0.5, 0.0, 0.1);
        assert_eq!(kf.update(3.0), 3.0);
        assert!(kf.state().p < 0.5);
    }

    #[test]
    fn test_predict_then_update_pulls_towards_measurement() {
        let mut kf = ScalarKalman::new(4.0, 1e-2, 1e-6, 1e-4);
        kf.predict(-0.01);
        assert!((kf.estimate() - 3.99).abs() < 1e-12);
        let fused = kf.update(3.90);
        assert!(fused < 3.99 && fused > 3.90);
    }

    #[test]
    fn test_deterministic() {
        let run = || {
            let mut kf = ScalarKalman::new(1.0, 0.2, 0.01, 0.05);
            kf.predict(0.1);
            kf.update(1.3)
        };
        assert_eq!(run(), run());
    }
}

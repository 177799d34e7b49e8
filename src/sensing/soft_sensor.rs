//! Soft Sensor
//!
//! Decides whether a raw bath-temperature reading can be trusted and, when it
//! cannot, reconstructs it from the heat released by Si and C oxidation. The
//! last trusted value is carried through reconstructions so long outages stay
//! continuous.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::SoftSensorSettings;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrectionSource {
    #[default]
    None,
    MechanismInference,
    DefaultFallback,
}

/// One telemetry evaluation. Built fresh each time, never mutated.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SensorStatus {
    pub raw_value: Option<f64>,
    pub estimated_value: Option<f64>,
    pub is_valid: bool,
    pub confidence: f64,
    pub correction_source: CorrectionSource,
}

impl SensorStatus {
    /// A trusted reading.
    pub fn valid(value: f64) -> Self {
        Self {
            raw_value: Some(value),
            estimated_value: Some(value),
            is_valid: true,
            confidence: 1.0,
            correction_source: CorrectionSource::None,
        }
    }

    /// No reading at all; the consumer gets a labelled default.
    pub fn unavailable(fallback: f64, confidence: f64) -> Self {
        Self {
            raw_value: None,
            estimated_value: Some(fallback),
            is_valid: false,
            confidence: confidence.clamp(0.0, 1.0),
            correction_source: CorrectionSource::DefaultFallback,
        }
    }

    /// Best available value: the estimate, else the raw reading.
    pub fn value(&self) -> Option<f64> {
        self.estimated_value.or(self.raw_value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationReason {
    Normal,
    OutOfRange,
    RateExceeded,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TemperatureValidation {
    pub is_valid: bool,
    pub reason: ValidationReason,
    pub confidence: f64,
}

#[derive(Debug, Clone)]
pub struct SoftSensor {
    settings: SoftSensorSettings,
    last_valid_temp: Option<f64>,
}

impl SoftSensor {
    pub fn new(settings: SoftSensorSettings) -> Self {
        Self { settings, last_valid_temp: None }
    }

    pub fn last_valid(&self) -> Option<f64> {
        self.last_valid_temp
    }

    /// Forget the reference at the start of a run.
    pub fn reset(&mut self) {
        self.last_valid_temp = None;
    }

    /// Range check, then rate-of-change check against the last trusted value.
    pub fn validate_temperature(&self, raw: f64, dt_s: f64) -> TemperatureValidation {
        let s = &self.settings;
        if !raw.is_finite() || raw < s.temp_min || raw > s.temp_max {
            return TemperatureValidation { is_valid: false, reason: ValidationReason::OutOfRange, confidence: 0.0 };
        }
        if let Some(last) = self.last_valid_temp {
            if dt_s > 0.0 {
                let rate = (raw - last).abs() / (dt_s / 60.0);
                if rate > s.max_rate_c_per_min {
                    return TemperatureValidation {
                        is_valid: false,
                        reason: ValidationReason::RateExceeded,
                        confidence: s.rate_violation_confidence.clamp(0.0, 1.0),
                    };
                }
            }
        }
        TemperatureValidation { is_valid: true, reason: ValidationReason::Normal, confidence: 1.0 }
    }

    /// Heat-balance reconstruction. Rates are oxidation rates in %/min.
    pub fn estimate_temperature(&self, last_temp: f64, si_rate: f64, c_rate: f64, dt_s: f64) -> f64 {
        let s = &self.settings;
        let per_min = si_rate * s.si_heat + c_rate * s.c_heat - s.base_loss;
        last_temp + per_min * (dt_s / 60.0)
    }

    /// Evaluate one reading. Never fails: implausible readings come back as
    /// `is_valid = false` with a named correction source.
    pub fn process(&mut self, raw: f64, si_rate: f64, c_rate: f64, dt_s: f64) -> SensorStatus {
        let check = self.validate_temperature(raw, dt_s);
        let raw_value = raw.is_finite().then_some(raw);

        if check.is_valid {
            self.last_valid_temp = Some(raw);
            return SensorStatus::valid(raw);
        }

        match self.last_valid_temp {
            Some(last) => {
                let estimate = self.estimate_temperature(last, si_rate, c_rate, dt_s);
                debug!("Soft sensor: {:?} reading {:.1}, inferred {:.1}", check.reason, raw, estimate);
                self.last_valid_temp = Some(estimate);
                SensorStatus {
                    raw_value,
                    estimated_value: Some(estimate),
                    is_valid: false,
                    confidence: self.settings.inference_confidence.clamp(0.0, 1.0),
                    correction_source: CorrectionSource::MechanismInference,
                }
            }
            None => {
                debug!("Soft sensor: {:?} reading {:.1} with no reference, using default", check.reason, raw);
                SensorStatus {
                    raw_value,
                    estimated_value: Some(self.settings.default_temp),
                    is_valid: false,
                    confidence: self.settings.fallback_confidence.clamp(0.0, 1.0),
                    correction_source: CorrectionSource::DefaultFallback,
                }
            }
        }
    }
}

impl Default for SoftSensor {
    fn default() -> Self {
        Self::new(SoftSensorSettings::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stable_reading_is_trusted() {
        let mut sensor = SoftSensor::default();
        let status = sensor.process(1300.0, 0.1, 0.05, 1.0);
        assert!(status.is_valid);
        assert_eq!(status.estimated_value, Some(1300.0));
        assert_eq!(status.correction_source, CorrectionSource::None);
        assert_eq!(sensor.last_valid(), Some(1300.0));
    }

    #[test]
    fn test_out_of_range_is_reconstructed_from_reference() {
        let mut sensor = SoftSensor::default();
        sensor.process(1350.0, 0.0, 0.0, 1.0);

        assert_eq!(sensor.validate_temperature(5000.0, 1.0).confidence, 0.0);

        let status = sensor.process(5000.0, 0.6, 0.3, 60.0);
        // 1350 + (0.6*20 + 0.3*10 - 5) * 1 min
        assert!(!status.is_valid);
        assert_eq!(status.raw_value, Some(5000.0));
        assert_eq!(status.correction_source, CorrectionSource::MechanismInference);
        assert!((status.estimated_value.unwrap() - 1360.0).abs() < 1e-9);
        assert_eq!(status.confidence, 0.85);
        assert_eq!(sensor.last_valid(), status.estimated_value);
    }

    #[test]
    fn test_cold_start_falls_back_to_default() {
        let mut sensor = SoftSensor::default();
        let status = sensor.process(900.0, 0.1, 0.1, 1.0);
        assert!(!status.is_valid);
        assert_eq!(status.estimated_value, Some(1300.0));
        assert_eq!(status.correction_source, CorrectionSource::DefaultFallback);
        assert_eq!(status.confidence, 0.1);
        assert_eq!(sensor.last_valid(), None);
    }

    #[test]
    fn test_rate_violation_flags_spike() {
        let mut sensor = SoftSensor::default();
        sensor.process(1300.0, 0.0, 0.0, 1.0);
        // +40 °C in one second is 2400 °C/min
        let check = sensor.validate_temperature(1340.0, 1.0);
        assert_eq!(check.reason, ValidationReason::RateExceeded);
        assert_eq!(check.confidence, 0.2);
        let status = sensor.process(1340.0, 0.0, 0.0, 1.0);
        assert_eq!(status.correction_source, CorrectionSource::MechanismInference);
    }

    #[test]
    fn test_nan_reading_never_panics() {
        let mut sensor = SoftSensor::default();
        let status = sensor.process(f64::NAN, 0.0, 0.0, 1.0);
        assert_eq!(status.raw_value, None);
        assert!(status.estimated_value.is_some());
    }

    #[test]
    fn test_reset_clears_reference() {
        let mut sensor = SoftSensor::default();
        sensor.process(1300.0, 0.0, 0.0, 1.0);
        sensor.reset();
        assert_eq!(sensor.last_valid(), None);
    }
}

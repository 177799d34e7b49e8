//! Sensing
//!
//! Trust decisions on raw telemetry, mechanism-based reconstruction and
//! recursive fusion of model and measurement.

pub mod kalman;
pub mod offgas;
pub mod soft_sensor;

pub use kalman::{KalmanState, ScalarKalman};
pub use offgas::{derive_decarburization_rate, synthesize_offgas};
pub use soft_sensor::{CorrectionSource, SensorStatus, SoftSensor, TemperatureValidation, ValidationReason};

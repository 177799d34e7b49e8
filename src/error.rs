//! Error Taxonomy
//!
//! Typed failures surfaced by the core. Sensor implausibility never appears
//! here: the soft sensor absorbs it into `SensorStatus` metadata.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::control::SystemMode;

/// A calculation input outside its accepted range.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("invalid input `{field}` = {value} (expected {min}..={max})")]
pub struct ValidationError {
    pub field: &'static str,
    pub value: f64,
    pub min: f64,
    pub max: f64,
}

impl ValidationError {
    /// Check `value` against an inclusive range.
    pub fn check(field: &'static str, value: f64, min: f64, max: f64) -> Result<f64, Self> {
        if value.is_finite() && value >= min && value <= max {
            Ok(value)
        } else {
            Err(Self { field, value, min, max })
        }
    }
}

/// Mode-controller and actuation failures.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ControlError {
    #[error("mode switch too frequent, retry in {remaining:?}")]
    RateLimited { remaining: Duration },

    #[error("illegal state transition {from} -> {to}: production is only reachable from validation")]
    IllegalTransition { from: SystemMode, to: SystemMode },

    #[error("invalid credential for production mode (actor `{actor}`)")]
    PermissionDenied { actor: String },

    #[error("actuation backend not wired for `{command}` - SAFETY LOCK")]
    ActuationNotImplemented { command: &'static str },
}

/// Wire tag for a [`ControlError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlErrorKind {
    RateLimited,
    IllegalTransition,
    PermissionDenied,
    ActuationNotImplemented,
}

impl ControlError {
    pub fn kind(&self) -> ControlErrorKind {
        match self {
            ControlError::RateLimited { .. } => ControlErrorKind::RateLimited,
            ControlError::IllegalTransition { .. } => ControlErrorKind::IllegalTransition,
            ControlError::PermissionDenied { .. } => ControlErrorKind::PermissionDenied,
            ControlError::ActuationNotImplemented { .. } => ControlErrorKind::ActuationNotImplemented,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_check_bounds() {
        assert_eq!(ValidationError::check("t", 1300.0, 1100.0, 1600.0), Ok(1300.0));
        let err = ValidationError::check("t", 1700.0, 1100.0, 1600.0).unwrap_err();
        assert_eq!(err.field, "t");
        assert!(ValidationError::check("t", f64::NAN, 0.0, 1.0).is_err());
    }

    #[test]
    fn test_control_error_kind_serializes_snake_case() {
        let err = ControlError::PermissionDenied { actor: "x".into() };
        let tag = serde_json::to_value(err.kind()).unwrap();
        assert_eq!(tag, "permission_denied");
    }
}

//! Control
//!
//! Gates which telemetry source and which actuator external callers reach,
//! per operating mode.

pub mod mode;
pub mod safety;
pub mod strategies;

use serde::{Deserialize, Serialize};
use std::fmt;

pub use mode::{ModeController, ModeRecord, ModeSwitchRequest, ModeSwitchResponse};
pub use safety::{CooldownGate, CredentialCheck, SwitchGuard};
pub use strategies::{
    ActuationCommand, ActuationWriter, IntendedAction, ProductionWriter, ShadowWriter, SimulationReader,
    SimulationWriter, StrategyFactory, StrategyPair, StubTelemetry, TelemetryReader,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SystemMode {
    /// Closed loop on the twin
    Simulation,
    /// Shadow: real inputs, journaled outputs
    Validation,
    /// Real actuation
    Production,
}

impl fmt::Display for SystemMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SystemMode::Simulation => write!(f, "simulation"),
            SystemMode::Validation => write!(f, "validation"),
            SystemMode::Production => write!(f, "production"),
        }
    }
}

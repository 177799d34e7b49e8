//! Mode-bound Reader/Writer strategies
//!
//! Every mode binds one [`TelemetryReader`] and one [`ActuationWriter`]. The
//! simulation pair closes the loop on the twin; the validation writer only
//! journals intent; the production writer refuses until a real actuation
//! backend exists.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{error, info};

use super::SystemMode;
use crate::error::ControlError;
use crate::sensing::SensorStatus;
use crate::simulation::Simulator;

/// Telemetry source. Implementations may suspend on I/O; callers never hold
/// a controller lock across these calls.
#[async_trait]
pub trait TelemetryReader: Send + Sync {
    async fn get_temperature(&self) -> SensorStatus;
    /// Element → mass %
    async fn get_chemistry(&self) -> BTreeMap<String, f64>;
    /// Minutes since blow start
    async fn get_process_time(&self) -> f64;
    /// mm
    async fn get_lance_height(&self) -> f64;
    /// Nm³/min
    async fn get_oxygen_flow(&self) -> f64;
}

#[async_trait]
pub trait ActuationWriter: Send + Sync {
    async fn set_lance_height(&self, mm: f64) -> Result<bool, ControlError>;
    async fn set_oxygen_flow(&self, nm3_min: f64) -> Result<bool, ControlError>;
    async fn add_coolant(&self, material: &str, kg: f64) -> Result<bool, ControlError>;
    async fn emergency_stop(&self) -> Result<bool, ControlError>;
}

// --- Simulation: closed loop on the twin ---

pub struct SimulationReader {
    sim: Arc<Simulator>,
}

impl SimulationReader {
    pub fn new(sim: Arc<Simulator>) -> Self {
        Self { sim }
    }
}

#[async_trait]
impl TelemetryReader for SimulationReader {
    async fn get_temperature(&self) -> SensorStatus {
        self.sim.temperature()
    }

    async fn get_chemistry(&self) -> BTreeMap<String, f64> {
        let s = self.sim.state();
        BTreeMap::from([
            ("c".to_string(), s.c_pct),
            ("si".to_string(), s.si_pct),
            ("v".to_string(), s.v_pct),
            ("ti".to_string(), s.ti_pct),
            ("mn".to_string(), s.mn_pct),
        ])
    }

    async fn get_process_time(&self) -> f64 {
        self.sim.state().time_min
    }

    async fn get_lance_height(&self) -> f64 {
        self.sim.state().lance_height_mm
    }

    async fn get_oxygen_flow(&self) -> f64 {
        self.sim.state().oxygen_flow_nm3_min
    }
}

pub struct SimulationWriter {
    sim: Arc<Simulator>,
}

impl SimulationWriter {
    pub fn new(sim: Arc<Simulator>) -> Self {
        Self { sim }
    }
}

#[async_trait]
impl ActuationWriter for SimulationWriter {
    async fn set_lance_height(&self, mm: f64) -> Result<bool, ControlError> {
        Ok(self.sim.set_lance_height(mm))
    }

    async fn set_oxygen_flow(&self, nm3_min: f64) -> Result<bool, ControlError> {
        Ok(self.sim.set_oxygen_flow(nm3_min))
    }

    async fn add_coolant(&self, material: &str, kg: f64) -> Result<bool, ControlError> {
        Ok(self.sim.add_coolant(material, kg))
    }

    async fn emergency_stop(&self) -> Result<bool, ControlError> {
        self.sim.emergency_stop();
        Ok(true)
    }
}

// --- External telemetry placeholder ---

/// Stands in for plant telemetry until a real reader is injected. Every
/// reading is flagged invalid.
pub struct StubTelemetry {
    fallback_temp: f64,
}

impl StubTelemetry {
    pub fn new(fallback_temp: f64) -> Self {
        Self { fallback_temp }
    }
}

impl Default for StubTelemetry {
    fn default() -> Self {
        Self::new(1300.0)
    }
}

#[async_trait]
impl TelemetryReader for StubTelemetry {
    async fn get_temperature(&self) -> SensorStatus {
        SensorStatus::unavailable(self.fallback_temp, 0.0)
    }

    async fn get_chemistry(&self) -> BTreeMap<String, f64> {
        BTreeMap::new()
    }

    async fn get_process_time(&self) -> f64 {
        0.0
    }

    async fn get_lance_height(&self) -> f64 {
        0.0
    }

    async fn get_oxygen_flow(&self) -> f64 {
        0.0
    }
}

// --- Validation: shadow writer ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum ActuationCommand {
    SetLanceHeight { mm: f64 },
    SetOxygenFlow { nm3_min: f64 },
    AddCoolant { material: String, kg: f64 },
    EmergencyStop,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntendedAction {
    pub at: DateTime<Utc>,
    #[serde(flatten)]
    pub command: ActuationCommand,
}

/// Records what would have been sent. Holds no handle to any actuator.
#[derive(Default)]
pub struct ShadowWriter {
    journal: Mutex<Vec<IntendedAction>>,
}

impl ShadowWriter {
    pub fn new() -> Self {
        Self::default()
    }

    fn journal_lock(&self) -> MutexGuard<'_, Vec<IntendedAction>> {
        self.journal.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn journal(&self) -> Vec<IntendedAction> {
        self.journal_lock().clone()
    }

    fn record(&self, command: ActuationCommand) -> Result<bool, ControlError> {
        match &command {
            ActuationCommand::EmergencyStop => error!("[SHADOW] would trigger EMERGENCY STOP"),
            other => info!("[SHADOW] would send {:?}", other),
        }
        self.journal_lock().push(IntendedAction { at: Utc::now(), command });
        Ok(true)
    }
}

#[async_trait]
impl ActuationWriter for ShadowWriter {
    async fn set_lance_height(&self, mm: f64) -> Result<bool, ControlError> {
        self.record(ActuationCommand::SetLanceHeight { mm })
    }

    async fn set_oxygen_flow(&self, nm3_min: f64) -> Result<bool, ControlError> {
        self.record(ActuationCommand::SetOxygenFlow { nm3_min })
    }

    async fn add_coolant(&self, material: &str, kg: f64) -> Result<bool, ControlError> {
        self.record(ActuationCommand::AddCoolant { material: material.to_string(), kg })
    }

    async fn emergency_stop(&self) -> Result<bool, ControlError> {
        self.record(ActuationCommand::EmergencyStop)
    }
}

// --- Production: locked ---

/// Real actuation. No backend is wired, so every command is refused.
pub struct ProductionWriter;

impl ProductionWriter {
    fn locked(command: &'static str) -> Result<bool, ControlError> {
        error!("🔒 Production actuation `{}` refused: no backend wired", command);
        Err(ControlError::ActuationNotImplemented { command })
    }
}

#[async_trait]
impl ActuationWriter for ProductionWriter {
    async fn set_lance_height(&self, _mm: f64) -> Result<bool, ControlError> {
        Self::locked("set_lance_height")
    }

    async fn set_oxygen_flow(&self, _nm3_min: f64) -> Result<bool, ControlError> {
        Self::locked("set_oxygen_flow")
    }

    async fn add_coolant(&self, _material: &str, _kg: f64) -> Result<bool, ControlError> {
        Self::locked("add_coolant")
    }

    async fn emergency_stop(&self) -> Result<bool, ControlError> {
        Self::locked("emergency_stop")
    }
}

/// Reader and writer bound to one mode.
#[derive(Clone)]
pub struct StrategyPair {
    pub mode: SystemMode,
    pub reader: Arc<dyn TelemetryReader>,
    pub writer: Arc<dyn ActuationWriter>,
}

/// Builds the pair for a mode.
pub struct StrategyFactory {
    simulator: Arc<Simulator>,
    external: Arc<dyn TelemetryReader>,
    shadow: Arc<ShadowWriter>,
}

impl StrategyFactory {
    pub fn new(simulator: Arc<Simulator>, external: Arc<dyn TelemetryReader>) -> Self {
        Self {
            simulator,
            external,
            shadow: Arc::new(ShadowWriter::new()),
        }
    }

    pub fn pair_for(&self, mode: SystemMode) -> StrategyPair {
        let reader: Arc<dyn TelemetryReader> = match mode {
            SystemMode::Simulation => Arc::new(SimulationReader::new(self.simulator.clone())),
            SystemMode::Validation | SystemMode::Production => self.external.clone(),
        };
        let writer: Arc<dyn ActuationWriter> = match mode {
            SystemMode::Simulation => Arc::new(SimulationWriter::new(self.simulator.clone())),
            SystemMode::Validation => self.shadow.clone(),
            SystemMode::Production => Arc::new(ProductionWriter),
        };
        StrategyPair { mode, reader, writer }
    }

    pub fn shadow(&self) -> &ShadowWriter {
        &self.shadow
    }
}

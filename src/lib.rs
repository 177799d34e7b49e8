//! Vanadium Extraction Digital Twin
//!
//! Digital twin and safety-gated control core for a vanadium-extraction
//! converter:
//! - Oxidation kinetics, cross-checked against an equilibrium end state
//! - Soft sensing with mechanism-based reconstruction and Kalman fusion
//! - A real-time stepping loop broadcasting per-tick snapshots
//! - A Simulation → Validation → Production mode controller

pub mod config;
pub mod control;
pub mod error;
pub mod kinetics;
pub mod process;
pub mod sensing;
pub mod simulation;
pub mod utils;

// Re-exports for convenience
pub use config::Settings;
pub use control::{ModeController, SystemMode};
pub use error::{ControlError, ValidationError};
pub use simulation::{Simulator, Snapshot};

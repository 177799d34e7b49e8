//! Simulation
//!
//! The running twin: canonical process state, the periodic stepping loop and
//! snapshot fan-out to subscribers.

pub mod bus;
pub mod simulator;
pub mod snapshot;
pub mod state;

pub use bus::{SnapshotBus, Subscription};
pub use simulator::Simulator;
pub use snapshot::{Chemistry, LanceReading, ModelParams, Snapshot, TemperatureReading};
pub use state::{DiscreteSample, ProcessState};

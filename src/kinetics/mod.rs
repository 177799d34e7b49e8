//! Kinetics
//!
//! Oxidation kinetics of the dissolved elements, the equilibrium end-state
//! solver and the offline blow-path simulation built on top of both.

pub mod blow_path;
pub mod derivatives;
pub mod equilibrium;
pub mod params;

pub use blow_path::{simulate_blow_path, BlowPathInputs, BlowPathPoint, BlowPathResult, IronAnalysis, StartMode};
pub use derivatives::{derivatives, Derivatives, KineticInputs, MeltVector};
pub use equilibrium::{cross_validate, solve_equilibrium, Composition, EquilibriumInputs, EquilibriumResult, ModelDeviation};
pub use params::KineticParams;

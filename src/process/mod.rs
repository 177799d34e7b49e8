//! Process Models
//!
//! Two calibrations of the same converter practice live side by side: one
//! derived from thermodynamic data, one fitted to site operating rules. Both
//! sit behind [`ProcessModel`] and are chosen by [`ModelVariant`].

pub mod critical;
pub mod empirical;
pub mod thermodynamic;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;

use crate::config::PhysicsSettings;
use crate::error::ValidationError;
use crate::kinetics::{IronAnalysis, KineticParams};

pub use critical::{predict_critical_temperature, CriticalTemperature};
pub use empirical::SiteEmpiricalModel;
pub use thermodynamic::ThermodynamicModel;

/// Coolant must be in the vessel within this many minutes of blow start.
pub const COOLANT_ADD_WITHIN_MIN: f64 = 2.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelVariant {
    #[default]
    Thermodynamic,
    SiteEmpirical,
}

impl fmt::Display for ModelVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelVariant::Thermodynamic => write!(f, "thermodynamic"),
            ModelVariant::SiteEmpirical => write!(f, "site_empirical"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown model variant `{0}` (expected thermodynamic or site_empirical)")]
pub struct UnknownVariant(pub String);

impl FromStr for ModelVariant {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "thermodynamic" => Ok(ModelVariant::Thermodynamic),
            "site_empirical" | "empirical" => Ok(ModelVariant::SiteEmpirical),
            other => Err(UnknownVariant(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoolantType {
    SlagPellets,
    ReturnFines,
    PigIron,
    OxideScale,
    /// Exothermic additive used when the charge is short of heat
    Ferrosilicon,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThermalInputs {
    pub iron_temp_c: f64,
    pub si_pct: f64,
    pub is_one_can: bool,
}

impl ThermalInputs {
    pub fn validate(&self) -> Result<(), ValidationError> {
        ValidationError::check("iron_temp_c", self.iron_temp_c, 0.0, 2000.0)?;
        ValidationError::check("si_pct", self.si_pct, 0.0, 5.0)?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoolantRecommendation {
    pub coolant_type: CoolantType,
    pub kg_per_t: f64,
    pub add_within_min: f64,
    pub notes: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LanceMode {
    ConstantLow,
    LowHighLow,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LanceStep {
    pub start_min: f64,
    pub end_min: f64,
    pub lance_height_mm: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LanceProfile {
    pub mode: LanceMode,
    pub steps: Vec<LanceStep>,
    pub endgame_action: String,
}

impl LanceProfile {
    /// Height scheduled at `minute`, if the blow is still running.
    pub fn height_at(&self, minute: f64) -> Option<u32> {
        self.steps
            .iter()
            .find(|s| minute >= s.start_min && minute < s.end_min)
            .map(|s| s.lance_height_mm)
    }
}

/// Site lance table shared by both models: ignition low, process high by Si
/// band, end press low.
pub(crate) fn low_high_low(si_pct: f64) -> LanceProfile {
    let (process_mm, end_mm) = if si_pct < 0.15 {
        (1500, 1400)
    } else if si_pct <= 0.30 {
        (1400, 1300)
    } else {
        (1300, 1300)
    };
    LanceProfile {
        mode: LanceMode::LowHighLow,
        steps: vec![
            LanceStep { start_min: 0.0, end_min: 0.5, lance_height_mm: 1200 },
            LanceStep { start_min: 0.5, end_min: 5.5, lance_height_mm: process_mm },
            LanceStep { start_min: 5.5, end_min: 6.0, lance_height_mm: end_mm },
        ],
        endgame_action: format!("Press the lance to {} mm for the last 30 s to lower TFe in slag.", end_mm),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChargeInputs {
    pub iron_weight_t: f64,
    pub iron_temp_c: f64,
    pub analysis: IronAnalysis,
    pub is_one_can: bool,
    pub target_temp_c: f64,
    pub ladle_transport_min: f64,
    pub ladle_empty_min: f64,
}

impl ChargeInputs {
    pub fn new(iron_weight_t: f64, iron_temp_c: f64, analysis: IronAnalysis) -> Self {
        Self {
            iron_weight_t,
            iron_temp_c,
            analysis,
            is_one_can: true,
            target_temp_c: 1360.0,
            ladle_transport_min: 15.0,
            ladle_empty_min: 30.0,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        ValidationError::check("iron_weight_t", self.iron_weight_t, 50.0, 350.0)?;
        ValidationError::check("iron_temp_c", self.iron_temp_c, 1100.0, 1600.0)?;
        ValidationError::check("target_temp_c", self.target_temp_c, 1250.0, 1600.0)?;
        ValidationError::check("ladle_transport_min", self.ladle_transport_min, 0.0, f64::MAX)?;
        ValidationError::check("ladle_empty_min", self.ladle_empty_min, 0.0, f64::MAX)?;
        self.analysis.validate()
    }

    /// V/(Si+Ti); large when the denominator is empty.
    pub fn v_si_ti_ratio(&self) -> f64 {
        let sum = self.analysis.si + self.analysis.ti;
        if sum > 0.0 {
            self.analysis.v / sum
        } else {
            99.0
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RecipeItem {
    pub material: CoolantType,
    pub tonnes: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChargeRecipe {
    pub recipe: Vec<RecipeItem>,
    pub oxygen_total_m3: f64,
    pub slag_weight_t: f64,
    pub v_si_ti_ratio: f64,
    pub warnings: Vec<String>,
}

/// Oxidised masses (kg) of Si, V and C for a charge.
pub(crate) struct Oxidised {
    pub si_kg: f64,
    pub v_kg: f64,
    pub c_kg: f64,
}

impl Oxidised {
    pub fn of(inp: &ChargeInputs, physics: &PhysicsSettings) -> Self {
        let iron_kg = inp.iron_weight_t * 1000.0;
        Self {
            si_kg: iron_kg * inp.analysis.si / 100.0,
            v_kg: iron_kg * (inp.analysis.v - physics.target_v_residual).max(0.0) / 100.0,
            c_kg: iron_kg * (inp.analysis.c - physics.target_c_oxidation_start).max(0.0) / 100.0,
        }
    }

    pub fn oxygen_m3(&self, physics: &PhysicsSettings) -> f64 {
        self.si_kg * physics.oxy_coeff_si + self.v_kg * physics.oxy_coeff_v + self.c_kg * physics.oxy_coeff_c
    }

    /// Slag tonnes; one-can practice carries over blast-furnace slag.
    pub fn slag_t(&self, physics: &PhysicsSettings, one_can: bool) -> f64 {
        let slag = (physics.slag_coeff_si * self.si_kg + physics.slag_coeff_v * self.v_kg) / 1000.0;
        if one_can {
            slag * 1.1
        } else {
            slag
        }
    }
}

/// One calibration of the converter practice.
pub trait ProcessModel: Send + Sync {
    fn variant(&self) -> ModelVariant;

    /// Constants for the kinetic derivative engine.
    fn kinetic_params(&self) -> KineticParams;

    /// Heat (kJ) absorbed per kg of coolant charged.
    fn coolant_duty_kj_kg(&self) -> f64;

    fn recommend_coolant(&self, inp: &ThermalInputs) -> Result<CoolantRecommendation, ValidationError>;

    fn lance_profile(&self, si_pct: f64) -> LanceProfile;

    fn initial_charge(&self, inp: &ChargeInputs) -> Result<ChargeRecipe, ValidationError>;
}

/// Enum-keyed factory.
pub fn model_for(variant: ModelVariant, physics: &PhysicsSettings) -> Arc<dyn ProcessModel> {
    match variant {
        ModelVariant::Thermodynamic => Arc::new(ThermodynamicModel::new(physics.clone())),
        ModelVariant::SiteEmpirical => Arc::new(SiteEmpiricalModel::new(physics.clone())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn analysis() -> IronAnalysis {
        IronAnalysis { c: 4.2, si: 0.28, v: 0.28, ti: 0.1, p: 0.08, s: 0.03 }
    }

    #[test]
    fn test_variant_parse_and_display() {
        assert_eq!("site-empirical".parse::<ModelVariant>().unwrap(), ModelVariant::SiteEmpirical);
        assert_eq!(ModelVariant::SiteEmpirical.to_string(), "site_empirical");
        assert!("quantum".parse::<ModelVariant>().is_err());
    }

    #[test]
    fn test_factory_returns_requested_variant() {
        let physics = PhysicsSettings::default();
        for v in [ModelVariant::Thermodynamic, ModelVariant::SiteEmpirical] {
            assert_eq!(model_for(v, &physics).variant(), v);
        }
    }

    #[test]
    fn test_variants_differ_in_crossover() {
        let physics = PhysicsSettings::default();
        let a = model_for(ModelVariant::Thermodynamic, &physics).kinetic_params();
        let b = model_for(ModelVariant::SiteEmpirical, &physics).kinetic_params();
        assert_eq!(a.crossover_c, 1380.0);
        assert_eq!(b.crossover_c, 1360.0);
    }

    #[test]
    fn test_low_high_low_bands() {
        assert_eq!(low_high_low(0.10).height_at(2.0), Some(1500));
        assert_eq!(low_high_low(0.20).height_at(5.7), Some(1300));
        assert_eq!(low_high_low(0.40).height_at(0.2), Some(1200));
        assert_eq!(low_high_low(0.40).height_at(6.5), None);
    }

    #[test]
    fn test_charge_inputs_validation() {
        let mut inp = ChargeInputs::new(100.0, 1340.0, analysis());
        assert!(inp.validate().is_ok());
        inp.iron_weight_t = 20.0;
        assert_eq!(inp.validate().unwrap_err().field, "iron_weight_t");
    }

    #[test]
    fn test_oxygen_and_slag_balance() {
        let physics = PhysicsSettings::default();
        let mut inp = ChargeInputs::new(100.0, 1340.0, analysis());
        inp.is_one_can = false;
        let ox = Oxidised::of(&inp, &physics);
        // Si 280 kg, V 250 kg, C 700 kg
        assert!((ox.oxygen_m3(&physics) - (280.0 * 0.8 + 250.0 * 0.5 + 700.0 * 0.93)).abs() < 1e-6);
        assert!((ox.slag_t(&physics, false) - (2.14 * 280.0 + 1.79 * 250.0) / 1000.0).abs() < 1e-9);
    }
}

//! Thermodynamic process model
//!
//! Static charge model built on the four balances (heat, mass, oxygen, slag)
//! using standard oxidation enthalpies.

use tracing::debug;

use super::{
    low_high_low, ChargeInputs, ChargeRecipe, CoolantRecommendation, CoolantType, LanceProfile, ModelVariant,
    Oxidised, ProcessModel, RecipeItem, ThermalInputs, COOLANT_ADD_WITHIN_MIN,
};
use crate::config::PhysicsSettings;
use crate::error::ValidationError;
use crate::kinetics::KineticParams;

/// Ladle heat-loss coefficients, °C per √min
const K_TRANSPORT: f64 = 2.5;
const K_EMPTY: f64 = 3.0;
/// Specific heat used for the target end state, kJ/(kg·K)
const CP_TARGET: f64 = 0.85;
/// Ferrosilicon heat release, kJ/kg
const H_FESI: f64 = 25_000.0;
const V_ENRICHMENT_RATIO: f64 = 1.05;
const HIGH_SI: f64 = 0.25;
const LOW_SI: f64 = 0.22;

pub struct ThermodynamicModel {
    physics: PhysicsSettings,
}

impl ThermodynamicModel {
    pub fn new(physics: PhysicsSettings) -> Self {
        Self { physics }
    }

    /// Reaction heat released by one tonne of iron, kJ.
    fn reaction_heat_per_t(&self, si_pct: f64, v_pct: f64) -> f64 {
        let p = &self.physics;
        let si_kg = 10.0 * si_pct.max(0.0);
        let v_kg = 10.0 * (v_pct - p.target_v_residual).max(0.0);
        si_kg * p.h_si_oxidation + v_kg * p.h_v_oxidation
    }
}

impl ProcessModel for ThermodynamicModel {
    fn variant(&self) -> ModelVariant {
        ModelVariant::Thermodynamic
    }

    fn kinetic_params(&self) -> KineticParams {
        KineticParams::thermodynamic()
    }

    fn coolant_duty_kj_kg(&self) -> f64 {
        self.physics.h_coolant_melting
    }

    fn recommend_coolant(&self, inp: &ThermalInputs) -> Result<CoolantRecommendation, ValidationError> {
        inp.validate()?;
        let p = &self.physics;
        let mut notes = Vec::new();

        let boost = if inp.is_one_can { p.one_can_temp_boost } else { 0.0 };
        let sensible = 1000.0 * p.cp_hm * (inp.iron_temp_c + boost - p.temp_critical_v_c_switch);
        // Vanadium is assumed at a typical 0.28 % when only Si is known
        let surplus = (sensible + self.reaction_heat_per_t(inp.si_pct, 0.28)) * (1.0 - p.heat_loss_ratio);

        let (coolant_type, absorption) = if inp.si_pct < LOW_SI {
            notes.push("Low-Si iron: slag pellets are sufficient.".to_string());
            (CoolantType::SlagPellets, p.h_coolant_melting)
        } else {
            notes.push("High-Si iron: pig iron for stronger cooling.".to_string());
            (CoolantType::PigIron, p.h_pig_iron_absorption)
        };
        if surplus <= 0.0 {
            notes.push("No heat surplus: coolant not required.".to_string());
        }
        notes.push(format!("Add all coolant within {} min of blow start.", COOLANT_ADD_WITHIN_MIN));

        let kg_per_t = (surplus / absorption).max(0.0);
        Ok(CoolantRecommendation {
            coolant_type,
            kg_per_t: (kg_per_t * 10.0).round() / 10.0,
            add_within_min: COOLANT_ADD_WITHIN_MIN,
            notes,
        })
    }

    fn lance_profile(&self, si_pct: f64) -> LanceProfile {
        low_high_low(si_pct)
    }

    fn initial_charge(&self, inp: &ChargeInputs) -> Result<ChargeRecipe, ValidationError> {
        inp.validate()?;
        let p = &self.physics;
        let iron_kg = inp.iron_weight_t * 1000.0;

        // 1. Sensible heat in, after ladle losses
        let ladle_loss = K_TRANSPORT * inp.ladle_transport_min.sqrt() + K_EMPTY * inp.ladle_empty_min.sqrt();
        let t_eff = inp.iron_temp_c - ladle_loss + if inp.is_one_can { p.one_can_temp_boost } else { 0.0 };
        let q_in = iron_kg * p.cp_hm * t_eff;

        // 2. Reaction heat
        let ox = Oxidised::of(inp, p);
        let q_react = ox.si_kg * p.h_si_oxidation + ox.v_kg * p.h_v_oxidation + ox.c_kg * p.h_c_oxidation;

        // 3. Demand at target plus losses
        let q_target = iron_kg * CP_TARGET * inp.target_temp_c;
        let q_loss = q_target * p.heat_loss_ratio;
        let q_excess = q_in + q_react - q_target - q_loss;
        debug!("Charge balance: in={:.0} react={:.0} target={:.0} excess={:.0} kJ", q_in, q_react, q_target, q_excess);

        // 4. Coolant choice
        let ratio = inp.v_si_ti_ratio();
        let mut warnings = Vec::new();
        let mut recipe = Vec::new();
        let round2 = |x: f64| (x * 100.0).round() / 100.0;

        if ratio < V_ENRICHMENT_RATIO {
            warnings.push("Low V/(Si+Ti): enrichment is hard, use oxide scale and avoid slag pellets.".to_string());
            recipe.push(RecipeItem {
                material: CoolantType::OxideScale,
                tonnes: round2((q_excess / (p.h_oxide_scale_absorption * 1000.0)).max(0.0)),
            });
        } else if q_excess < 0.0 {
            warnings.push(format!(
                "Heat deficit of {:.1} MJ: reduce scrap, raise iron temperature or add chemical heat.",
                -q_excess / 1000.0
            ));
            recipe.push(RecipeItem {
                material: CoolantType::Ferrosilicon,
                tonnes: round2(-q_excess / (H_FESI * 1000.0)),
            });
        } else {
            if inp.analysis.si > HIGH_SI {
                warnings.push("High-Si iron: pig iron required to limit slopping.".to_string());
            }
            recipe.push(RecipeItem {
                material: CoolantType::PigIron,
                tonnes: round2(q_excess / (p.h_pig_iron_absorption * 1000.0)),
            });
        }

        // 5. Slag and oxygen
        if inp.is_one_can {
            warnings.push("One-can practice: slag estimate raised 10 % for carried-over BF slag.".to_string());
        }

        Ok(ChargeRecipe {
            recipe,
            oxygen_total_m3: (ox.oxygen_m3(p) * 10.0).round() / 10.0,
            slag_weight_t: round2(ox.slag_t(p, inp.is_one_can)),
            v_si_ti_ratio: (ratio * 1000.0).round() / 1000.0,
            warnings,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kinetics::IronAnalysis;

    fn model() -> ThermodynamicModel {
        ThermodynamicModel::new(PhysicsSettings::default())
    }

    fn analysis(si: f64, v: f64, ti: f64) -> IronAnalysis {
        IronAnalysis { c: 4.2, si, v, ti, p: 0.08, s: 0.03 }
    }

    #[test]
    fn test_hotter_iron_needs_more_coolant() {
        let m = model();
        let cold = m.recommend_coolant(&ThermalInputs { iron_temp_c: 1300.0, si_pct: 0.3, is_one_can: false }).unwrap();
        let hot = m.recommend_coolant(&ThermalInputs { iron_temp_c: 1360.0, si_pct: 0.3, is_one_can: false }).unwrap();
        assert!(hot.kg_per_t > cold.kg_per_t);
        assert_eq!(hot.coolant_type, CoolantType::PigIron);
        assert_eq!(hot.add_within_min, 2.5);
    }

    #[test]
    fn test_low_ratio_forces_oxide_scale() {
        // V/(Si+Ti) = 0.28 / 0.38
        let inp = ChargeInputs::new(100.0, 1340.0, analysis(0.28, 0.28, 0.1));
        let res = model().initial_charge(&inp).unwrap();
        assert_eq!(res.recipe[0].material, CoolantType::OxideScale);
        assert!(res.v_si_ti_ratio < 1.05);
        assert!(res.oxygen_total_m3 > 0.0);
    }

    #[test]
    fn test_cold_charge_calls_for_ferrosilicon() {
        let mut inp = ChargeInputs::new(100.0, 1150.0, analysis(0.1, 0.4, 0.05));
        inp.is_one_can = false;
        inp.target_temp_c = 1400.0;
        let res = model().initial_charge(&inp).unwrap();
        assert_eq!(res.recipe[0].material, CoolantType::Ferrosilicon);
        assert!(res.warnings.iter().any(|w| w.contains("deficit")));
    }

    #[test]
    fn test_one_can_raises_slag_estimate() {
        let mut inp = ChargeInputs::new(100.0, 1340.0, analysis(0.2, 0.4, 0.1));
        let with = model().initial_charge(&inp).unwrap();
        inp.is_one_can = false;
        let without = model().initial_charge(&inp).unwrap();
        assert!(with.slag_weight_t > without.slag_weight_t);
    }

    #[test]
    fn test_invalid_charge_rejected() {
        let inp = ChargeInputs::new(100.0, 1700.0, analysis(0.2, 0.4, 0.1));
        assert_eq!(model().initial_charge(&inp).unwrap_err().field, "iron_temp_c");
    }
}

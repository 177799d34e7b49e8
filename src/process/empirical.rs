//! Site-empirical process model
//!
//! Operating rules fitted to one plant: coolant per tonne keyed by iron
//! temperature, lance practice keyed by silicon.

use super::{
    low_high_low, ChargeInputs, ChargeRecipe, CoolantRecommendation, CoolantType, LanceMode, LanceProfile, LanceStep,
    ModelVariant, Oxidised, ProcessModel, RecipeItem, ThermalInputs, COOLANT_ADD_WITHIN_MIN,
};
use crate::config::PhysicsSettings;
use crate::error::ValidationError;
use crate::kinetics::KineticParams;

const BASE_TEMP_C: f64 = 1280.0;
const BASE_KG_PER_T: f64 = 8.0;
const KG_PER_T_PER_C: f64 = 0.6;
const ONE_CAN_KG_PER_T: f64 = 10.0;
const HIGH_SI_FACTOR: f64 = 1.5;
const LOW_SI: f64 = 0.22;
const CONSTANT_LOW_SI: f64 = 0.25;

pub struct SiteEmpiricalModel {
    physics: PhysicsSettings,
}

impl SiteEmpiricalModel {
    pub fn new(physics: PhysicsSettings) -> Self {
        Self { physics }
    }
}

impl ProcessModel for SiteEmpiricalModel {
    fn variant(&self) -> ModelVariant {
        ModelVariant::SiteEmpirical
    }

    fn kinetic_params(&self) -> KineticParams {
        let p = &self.physics;
        KineticParams::site_empirical(p.temp_critical_v_c_switch, p.oxy_coeff_si, p.oxy_coeff_v, p.oxy_coeff_c)
    }

    fn coolant_duty_kj_kg(&self) -> f64 {
        self.physics.h_coolant_melting
    }

    fn recommend_coolant(&self, inp: &ThermalInputs) -> Result<CoolantRecommendation, ValidationError> {
        inp.validate()?;
        let mut notes = Vec::new();
        let mut kg_per_t = BASE_KG_PER_T + (inp.iron_temp_c - BASE_TEMP_C).max(0.0) * KG_PER_T_PER_C;

        if inp.is_one_can {
            kg_per_t += ONE_CAN_KG_PER_T;
            notes.push(format!("One-can practice: base coolant raised by {} kg/t.", ONE_CAN_KG_PER_T));
        }

        let coolant_type = if inp.si_pct < LOW_SI {
            notes.push("Low-Si iron: slag pellets first (cost).".to_string());
            CoolantType::SlagPellets
        } else {
            kg_per_t *= HIGH_SI_FACTOR;
            notes.push("High-Si iron: return fines, about 1.5x the base amount.".to_string());
            CoolantType::ReturnFines
        };
        notes.push(format!("Add all coolant within {} min of blow start.", COOLANT_ADD_WITHIN_MIN));

        Ok(CoolantRecommendation {
            coolant_type,
            kg_per_t: (kg_per_t * 10.0).round() / 10.0,
            add_within_min: COOLANT_ADD_WITHIN_MIN,
            notes,
        })
    }

    fn lance_profile(&self, si_pct: f64) -> LanceProfile {
        if si_pct > CONSTANT_LOW_SI {
            LanceProfile {
                mode: LanceMode::ConstantLow,
                steps: vec![
                    LanceStep { start_min: 0.0, end_min: 5.5, lance_height_mm: 950 },
                    LanceStep { start_min: 5.5, end_min: 6.0, lance_height_mm: 900 },
                ],
                endgame_action: "Hold 950 mm through the blow, press to 900 mm for the last 30 s.".to_string(),
            }
        } else {
            low_high_low(si_pct)
        }
    }

    fn initial_charge(&self, inp: &ChargeInputs) -> Result<ChargeRecipe, ValidationError> {
        inp.validate()?;
        let p = &self.physics;
        let rec = self.recommend_coolant(&ThermalInputs {
            iron_temp_c: inp.iron_temp_c,
            si_pct: inp.analysis.si,
            is_one_can: inp.is_one_can,
        })?;
        let ox = Oxidised::of(inp, p);
        let round2 = |x: f64| (x * 100.0).round() / 100.0;

        Ok(ChargeRecipe {
            recipe: vec![RecipeItem {
                material: rec.coolant_type,
                tonnes: round2(rec.kg_per_t * inp.iron_weight_t / 1000.0),
            }],
            oxygen_total_m3: (ox.oxygen_m3(p) * 10.0).round() / 10.0,
            slag_weight_t: round2(ox.slag_t(p, inp.is_one_can)),
            v_si_ti_ratio: (inp.v_si_ti_ratio() * 1000.0).round() / 1000.0,
            warnings: rec.notes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kinetics::IronAnalysis;

    fn model() -> SiteEmpiricalModel {
        SiteEmpiricalModel::new(PhysicsSettings::default())
    }

    #[test]
    fn test_site_coolant_rule() {
        let rec = model()
            .recommend_coolant(&ThermalInputs { iron_temp_c: 1340.0, si_pct: 0.28, is_one_can: true })
            .unwrap();
        // (8 + 60*0.6 + 10) * 1.5
        assert_eq!(rec.kg_per_t, 81.0);
        assert_eq!(rec.coolant_type, CoolantType::ReturnFines);

        let rec = model()
            .recommend_coolant(&ThermalInputs { iron_temp_c: 1250.0, si_pct: 0.15, is_one_can: false })
            .unwrap();
        assert_eq!(rec.kg_per_t, 8.0);
        assert_eq!(rec.coolant_type, CoolantType::SlagPellets);
    }

    #[test]
    fn test_high_si_holds_low_lance() {
        let profile = model().lance_profile(0.35);
        assert_eq!(profile.mode, LanceMode::ConstantLow);
        assert_eq!(profile.height_at(3.0), Some(950));
        assert_eq!(profile.height_at(5.8), Some(900));
        assert_eq!(model().lance_profile(0.2).mode, LanceMode::LowHighLow);
    }

    #[test]
    fn test_charge_scales_with_iron_weight() {
        let analysis = IronAnalysis { c: 4.2, si: 0.28, v: 0.28, ti: 0.1, p: 0.08, s: 0.03 };
        let inp = ChargeInputs::new(200.0, 1340.0, analysis);
        let res = model().initial_charge(&inp).unwrap();
        assert_eq!(res.recipe[0].tonnes, 16.2);
    }
}

//! Kinetic constant sets
//!
//! Two calibrations exist for the same mechanism: one derived from
//! thermodynamic data and one fitted to a specific plant.

use serde::{Deserialize, Serialize};

/// Molar masses, kg/mol
pub const M_C: f64 = 0.01201;
pub const M_SI: f64 = 0.02809;
pub const M_V: f64 = 0.05094;
pub const M_TI: f64 = 0.04787;
pub const M_FE: f64 = 0.05585;

/// Ideal-gas molar volume at normal conditions, m³/mol
pub const MOLAR_VOLUME_M3: f64 = 0.0224;

/// Nm³/h of oxygen to mol/s.
pub fn oxygen_mol_per_s(flow_nm3_h: f64) -> f64 {
    (flow_nm3_h / 3600.0) / MOLAR_VOLUME_M3
}

/// Mol O2 consumed per mol of each element oxidised.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Stoichiometry {
    pub si: f64,
    pub ti: f64,
    pub v: f64,
    pub c: f64,
    pub fe: f64,
}

impl Stoichiometry {
    /// Si+O2, Ti+O2, 4V+3O2, 2C+O2, 2Fe+O2
    pub const REACTION: Self = Self { si: 1.0, ti: 1.0, v: 0.75, c: 0.5, fe: 0.5 };

    /// Derived from plant oxygen coefficients (m³ O2 per kg element).
    pub fn from_oxygen_coefficients(si_m3_kg: f64, v_m3_kg: f64, c_m3_kg: f64) -> Self {
        let per_mol = |m3_per_kg: f64, molar_mass: f64| m3_per_kg / MOLAR_VOLUME_M3 * molar_mass;
        Self {
            si: per_mol(si_m3_kg, M_SI),
            ti: 1.0,
            v: per_mol(v_m3_kg, M_V),
            c: per_mol(c_m3_kg, M_C),
            fe: 0.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KineticParams {
    /// First-order mass-transfer constants, 1/s
    pub k_si: f64,
    pub k_ti: f64,
    pub k_v: f64,
    pub k_c: f64,
    /// Background iron oxidation, %/s
    pub r_fe: f64,

    /// Crossover temperature (°C) and logistic width (°C)
    pub crossover_c: f64,
    pub crossover_width: f64,
    /// V factor = v_base - v_suppression·σ
    pub v_base: f64,
    pub v_suppression: f64,
    /// C factor = c_base + c_gain·σ
    pub c_base: f64,
    pub c_gain: f64,

    pub stoichiometry: Stoichiometry,

    /// Reaction enthalpies, J/kg of element
    pub h_si: f64,
    pub h_ti: f64,
    pub h_v: f64,
    pub h_c: f64,

    /// Specific heat of the bath, J/(kg·K)
    pub cp: f64,
    /// Constant ambient loss, W
    pub heat_loss_w: f64,
    /// Coolant sink is active for elapsed time below this, s
    pub coolant_window_s: f64,

    /// Slag yield per unit of parent consumed (mass ratios)
    pub yield_feo: f64,
    pub yield_v2o5: f64,
    pub yield_sio2: f64,
}

impl KineticParams {
    pub fn thermodynamic() -> Self {
        Self {
            k_si: 0.003,
            k_ti: 0.003,
            k_v: 0.002,
            k_c: 0.0005,
            r_fe: 0.001,
            crossover_c: 1380.0,
            crossover_width: 50.0,
            v_base: 1.5,
            v_suppression: 1.0,
            c_base: 0.1,
            c_gain: 5.0,
            stoichiometry: Stoichiometry::REACTION,
            h_si: 28_000_000.0,
            h_ti: 20_000_000.0,
            h_v: 16_000_000.0,
            h_c: 9_000_000.0,
            cp: 760.0,
            heat_loss_w: 200_000.0,
            coolant_window_s: 300.0,
            yield_feo: 1.286,
            yield_v2o5: 1.5,
            yield_sio2: 2.0,
        }
    }

    /// Plant-fitted constants (site rate ratio Si:V:C = 2.0:1.2:0.05). The V
    /// stoichiometry follows the site oxygen coefficients.
    pub fn site_empirical(crossover_c: f64, oxy_si: f64, oxy_v: f64, oxy_c: f64) -> Self {
        Self {
            k_si: 0.0033,
            k_ti: 0.0033,
            k_v: 0.002,
            k_c: 0.000083,
            crossover_c,
            stoichiometry: Stoichiometry::from_oxygen_coefficients(oxy_si, oxy_v, oxy_c),
            h_si: 27_620_000.0,
            h_v: 15_200_000.0,
            h_c: 9_280_000.0,
            cp: 800.0,
            ..Self::thermodynamic()
        }
    }
}

impl Default for KineticParams {
    fn default() -> Self {
        Self::thermodynamic()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_ordering() {
        for p in [KineticParams::thermodynamic(), KineticParams::site_empirical(1360.0, 0.8, 0.5, 0.93)] {
            assert!(p.k_si >= p.k_v);
            assert!((p.k_si - p.k_ti).abs() < 1e-12);
            assert!(p.k_v > p.k_c);
        }
    }

    #[test]
    fn test_site_stoichiometry_close_to_reaction() {
        let s = Stoichiometry::from_oxygen_coefficients(0.8, 0.5, 0.93);
        assert!((s.si - 1.0).abs() < 0.01);
        assert!((s.c - 0.5).abs() < 0.01);
        // site coefficient assumes V2O5 rather than V2O3
        assert!(s.v > 1.0);
    }
}

//! Thermodynamic equilibrium end state
//!
//! Oxygen is consumed strictly in affinity order Si → Ti → V → C → Fe, each
//! element exhausting the available oxygen before the next reacts. Used to
//! cross-check the kinetic trajectory; never gates control.

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::params::{Stoichiometry, MOLAR_VOLUME_M3, M_C, M_FE, M_SI, M_TI, M_V};

/// Reaction heats, kJ per mol of element
const H_SI: f64 = 858.0;
const H_TI: f64 = 944.0;
const H_V: f64 = 750.0;
const H_C: f64 = 110.0;
const H_FE: f64 = 272.0;

/// Share of reaction heat retained by the bath
const HEAT_RETENTION: f64 = 0.9;
/// Product specific heat, kJ/(kg·K)
const CP_PRODUCT: f64 = 0.82;

/// Kinetic vs equilibrium temperature gap that triggers a deviation warning, °C
pub const DEVIATION_THRESHOLD_C: f64 = 50.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Composition {
    pub c: f64,
    pub si: f64,
    pub v: f64,
    pub ti: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EquilibriumInputs {
    pub initial: Composition,
    pub initial_temp_c: f64,
    pub oxygen_flow_m3h: f64,
    pub duration_s: f64,
    pub bath_mass_kg: f64,
    pub coolant_kg: f64,
    /// kJ/kg to heat and melt the coolant
    pub coolant_duty_kj_kg: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquilibriumResult {
    pub final_temp_c: f64,
    pub final_analysis: Composition,
    /// Iron burnt to FeO once the dissolved elements are exhausted, kg
    pub fe_oxidised_kg: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelDeviation {
    pub kinetic_temp_c: f64,
    pub equilibrium_temp_c: f64,
    pub delta_c: f64,
    pub message: String,
}

/// React up to `available` mol of element against `oxygen`, returning mol reacted.
fn consume(available: &mut f64, oxygen: &mut f64, o2_per_mol: f64) -> f64 {
    if *oxygen <= 0.0 || *available <= 0.0 {
        return 0.0;
    }
    let reacted = available.min(*oxygen / o2_per_mol);
    *available -= reacted;
    *oxygen -= reacted * o2_per_mol;
    reacted
}

pub fn solve_equilibrium(inp: &EquilibriumInputs) -> EquilibriumResult {
    let mass = inp.bath_mass_kg;
    let st = Stoichiometry::REACTION;
    let to_mol = |pct: f64, molar: f64| mass * pct.max(0.0) / 100.0 / molar;
    let to_pct = |mol: f64, molar: f64| mol * molar / mass * 100.0;

    let mut si = to_mol(inp.initial.si, M_SI);
    let mut ti = to_mol(inp.initial.ti, M_TI);
    let mut v = to_mol(inp.initial.v, M_V);
    let mut c = to_mol(inp.initial.c, M_C);
    let mut fe = mass * (1.0 - (inp.initial.c + inp.initial.si + inp.initial.v + inp.initial.ti) / 100.0) / M_FE;

    let total_o2_m3 = inp.oxygen_flow_m3h.max(0.0) / 3600.0 * inp.duration_s.max(0.0);
    let mut oxygen = total_o2_m3 / MOLAR_VOLUME_M3;

    // Waterfall in affinity order
    let react_si = consume(&mut si, &mut oxygen, st.si);
    let react_ti = consume(&mut ti, &mut oxygen, st.ti);
    let react_v = consume(&mut v, &mut oxygen, st.v);
    let react_c = consume(&mut c, &mut oxygen, st.c);
    let react_fe = consume(&mut fe, &mut oxygen, st.fe);

    let reaction_kj = react_si * H_SI + react_ti * H_TI + react_v * H_V + react_c * H_C + react_fe * H_FE;

    // Coolant duty covers both heating and melting the coolant
    let coolant = inp.coolant_kg.max(0.0);
    let net_kj = reaction_kj * HEAT_RETENTION - coolant * inp.coolant_duty_kj_kg;
    let final_temp_c = inp.initial_temp_c + net_kj / ((mass + coolant) * CP_PRODUCT);

    EquilibriumResult {
        final_temp_c,
        final_analysis: Composition {
            c: to_pct(c, M_C),
            si: to_pct(si, M_SI),
            v: to_pct(v, M_V),
            ti: to_pct(ti, M_TI),
        },
        fe_oxidised_kg: react_fe * M_FE,
    }
}

/// Compare a kinetic end temperature with the equilibrium estimate.
pub fn cross_validate(kinetic_temp_c: f64, eq: &EquilibriumResult) -> Option<ModelDeviation> {
    let delta = kinetic_temp_c - eq.final_temp_c;
    if delta.abs() <= DEVIATION_THRESHOLD_C {
        return None;
    }
    let message = format!(
        "model deviation: kinetic {:.1}°C vs equilibrium {:.1}°C (Δ {:+.1}°C)",
        kinetic_temp_c, eq.final_temp_c, delta
    );
    warn!("{}", message);
    Some(ModelDeviation {
        kinetic_temp_c,
        equilibrium_temp_c: eq.final_temp_c,
        delta_c: delta,
        message,
    })
}

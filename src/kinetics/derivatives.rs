//! Kinetics Derivative Engine
//!
//! Competitive oxidation of Si/Ti/V/C under a shared oxygen supply, coupled to
//! the bath heat balance. Pure function of its inputs; callers clamp after
//! integrating.

use serde::{Deserialize, Serialize};

use super::params::{KineticParams, M_C, M_FE, M_SI, M_TI, M_V};

/// Bath composition (mass %) and temperature (°C).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MeltVector {
    pub c: f64,
    pub si: f64,
    pub v: f64,
    pub ti: f64,
    pub temp_c: f64,
    pub feo: f64,
    pub v2o5: f64,
    pub sio2: f64,
}

impl MeltVector {
    /// `self + rate * h`, component-wise.
    pub fn advanced(&self, rate: &MeltVector, h: f64) -> MeltVector {
        MeltVector {
            c: self.c + rate.c * h,
            si: self.si + rate.si * h,
            v: self.v + rate.v * h,
            ti: self.ti + rate.ti * h,
            temp_c: self.temp_c + rate.temp_c * h,
            feo: self.feo + rate.feo * h,
            v2o5: self.v2o5 + rate.v2o5 * h,
            sio2: self.sio2 + rate.sio2 * h,
        }
    }

    pub fn as_array(&self) -> [f64; 8] {
        [self.c, self.si, self.v, self.ti, self.temp_c, self.feo, self.v2o5, self.sio2]
    }

    pub fn is_finite(&self) -> bool {
        self.as_array().iter().all(|x| x.is_finite())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KineticInputs {
    pub bath_mass_kg: f64,
    /// Oxygen supplied, mol O2/s
    pub oxygen_mol_s: f64,
    /// Mass-transfer efficiency in (0, 1]
    pub stirring: f64,
    /// Time since start of blow, s (schedules the coolant sink)
    pub elapsed_s: f64,
    /// Coolant heat sink while inside the coolant window, W
    pub coolant_power_w: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Derivatives {
    /// Rates per second
    pub rates: MeltVector,
    pub oxygen_demand_mol_s: f64,
    pub oxygen_consumed_mol_s: f64,
    /// supply/demand when oxygen-limited, else 1
    pub supply_scale: f64,
    pub reaction_heat_w: f64,
}

fn logistic(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// Instantaneous rates for melt state `y`.
pub fn derivatives(y: &MeltVector, inp: &KineticInputs, p: &KineticParams) -> Derivatives {
    let stirring = if inp.stirring.is_finite() { inp.stirring.clamp(0.0, 1.0) } else { 0.0 };
    let mass = inp.bath_mass_kg;
    let st = p.stoichiometry;

    // 1. Raw first-order rates (%/s), temperature-switched for V and C
    let sigma = logistic((y.temp_c - p.crossover_c) / p.crossover_width);
    let r_si = p.k_si * stirring * y.si.max(0.0);
    let r_ti = p.k_ti * stirring * y.ti.max(0.0);
    let r_v = p.k_v * stirring * y.v.max(0.0) * (p.v_base - p.v_suppression * sigma);
    let r_c = p.k_c * stirring * y.c.max(0.0) * (p.c_base + p.c_gain * sigma);
    let r_fe = p.r_fe;

    // 2. Oxygen demand, mol O2/s
    let to_mol = |rate_pct: f64, molar: f64| rate_pct / 100.0 * mass / molar;
    let demand = [
        to_mol(r_si, M_SI) * st.si,
        to_mol(r_ti, M_TI) * st.ti,
        to_mol(r_v, M_V) * st.v,
        to_mol(r_c, M_C) * st.c,
        to_mol(r_fe, M_FE) * st.fe,
    ];
    let total_demand: f64 = demand.iter().sum();

    // 3. Oxygen conservation: every demand shares the same scale
    let supply = inp.oxygen_mol_s.max(0.0);
    let supply_scale = if total_demand > supply && total_demand > 0.0 {
        supply / total_demand
    } else {
        1.0
    };
    let [o2_si, o2_ti, o2_v, o2_c, o2_fe] = demand.map(|d| d * supply_scale);

    // 4. Composition rates, %/s
    let to_pct = |o2: f64, ratio: f64, molar: f64| -(o2 / ratio * molar) / mass * 100.0;
    let d_si = to_pct(o2_si, st.si, M_SI);
    let d_ti = to_pct(o2_ti, st.ti, M_TI);
    let d_v = to_pct(o2_v, st.v, M_V);
    let d_c = to_pct(o2_c, st.c, M_C);
    let d_fe = to_pct(o2_fe, st.fe, M_FE);

    // 5. Heat balance
    let reacted_kg = |d: f64| d.abs() / 100.0 * mass;
    let reaction_heat_w = reacted_kg(d_si) * p.h_si
        + reacted_kg(d_ti) * p.h_ti
        + reacted_kg(d_v) * p.h_v
        + reacted_kg(d_c) * p.h_c;
    let coolant_w = if inp.elapsed_s < p.coolant_window_s { inp.coolant_power_w } else { 0.0 };
    let net_heat = reaction_heat_w - p.heat_loss_w - coolant_w;
    let d_temp = net_heat / (mass * p.cp);

    Derivatives {
        rates: MeltVector {
            c: d_c,
            si: d_si,
            v: d_v,
            ti: d_ti,
            temp_c: d_temp,
            feo: d_fe.abs() * p.yield_feo,
            v2o5: d_v.abs() * p.yield_v2o5,
            sio2: d_si.abs() * p.yield_sio2,
        },
        oxygen_demand_mol_s: total_demand,
        oxygen_consumed_mol_s: o2_si + o2_ti + o2_v + o2_c + o2_fe,
        supply_scale,
        reaction_heat_w,
    }
}

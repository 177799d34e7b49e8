//! Kinetic blow-path simulation
//!
//! Integrates the derivative engine over a whole blow with classic RK4 and
//! cross-checks the end point against the equilibrium solver.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::derivatives::{derivatives, KineticInputs, MeltVector};
use super::equilibrium::{cross_validate, solve_equilibrium, Composition, EquilibriumInputs, EquilibriumResult, ModelDeviation};
use super::params::{oxygen_mol_per_s, KineticParams};
use crate::error::ValidationError;

/// Temperature at which the V→C crossover alert fires, °C
pub const TC_ALERT_C: f64 = 1360.0;
const STEP_S: f64 = 1.0;
const SAMPLE_EVERY_S: u32 = 10;

/// Substitutes used when the charge analysis is missing Si or Ti.
const SOFT_SENSED_SI: f64 = 0.22;
const SOFT_SENSED_TI: f64 = 0.12;
const MISSING_THRESHOLD: f64 = 0.01;

/// Hot-metal analysis, mass %.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IronAnalysis {
    pub c: f64,
    pub si: f64,
    pub v: f64,
    pub ti: f64,
    #[serde(default)]
    pub p: f64,
    #[serde(default)]
    pub s: f64,
}

impl IronAnalysis {
    pub fn validate(&self) -> Result<(), ValidationError> {
        ValidationError::check("analysis.c", self.c, 0.0, 10.0)?;
        ValidationError::check("analysis.si", self.si, 0.0, 5.0)?;
        ValidationError::check("analysis.v", self.v, 0.0, 5.0)?;
        ValidationError::check("analysis.ti", self.ti, 0.0, 5.0)?;
        ValidationError::check("analysis.p", self.p, 0.0, 2.0)?;
        ValidationError::check("analysis.s", self.s, 0.0, 2.0)?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlowPathInputs {
    pub initial_temp_c: f64,
    pub analysis: IronAnalysis,
    /// Total coolant charged, t
    #[serde(default)]
    pub coolant_t: f64,
    #[serde(default = "default_oxygen_flow")]
    pub oxygen_flow_m3h: f64,
    #[serde(default = "default_duration")]
    pub duration_s: u32,
    #[serde(default = "default_bath_mass")]
    pub bath_mass_t: f64,
    #[serde(default = "default_stirring")]
    pub stirring: f64,
}

fn default_oxygen_flow() -> f64 {
    22000.0
}
fn default_duration() -> u32 {
    360
}
fn default_bath_mass() -> f64 {
    100.0
}
fn default_stirring() -> f64 {
    1.0
}

impl BlowPathInputs {
    pub fn new(initial_temp_c: f64, analysis: IronAnalysis) -> Self {
        Self {
            initial_temp_c,
            analysis,
            coolant_t: 0.0,
            oxygen_flow_m3h: default_oxygen_flow(),
            duration_s: default_duration(),
            bath_mass_t: default_bath_mass(),
            stirring: default_stirring(),
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        ValidationError::check("initial_temp_c", self.initial_temp_c, 1100.0, 1600.0)?;
        self.analysis.validate()?;
        ValidationError::check("coolant_t", self.coolant_t, 0.0, 100.0)?;
        ValidationError::check("oxygen_flow_m3h", self.oxygen_flow_m3h, 1000.0, 60000.0)?;
        ValidationError::check("duration_s", self.duration_s as f64, 60.0, 3600.0)?;
        ValidationError::check("bath_mass_t", self.bath_mass_t, 50.0, 350.0)?;
        ValidationError::check("stirring", self.stirring, f64::MIN_POSITIVE, 1.0)?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StartMode {
    RealData,
    SoftSensing,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BlowPathPoint {
    pub time_s: u32,
    pub temp_c: f64,
    pub c_pct: f64,
    pub si_pct: f64,
    pub v_pct: f64,
    pub ti_pct: f64,
    pub feo_pct: f64,
    pub v2o5_pct: f64,
    pub sio2_pct: f64,
}

impl BlowPathPoint {
    fn at(time_s: u32, y: &MeltVector) -> Self {
        Self {
            time_s,
            temp_c: y.temp_c,
            c_pct: y.c.max(0.0),
            si_pct: y.si.max(0.0),
            v_pct: y.v.max(0.0),
            ti_pct: y.ti.max(0.0),
            feo_pct: y.feo.max(0.0),
            v2o5_pct: y.v2o5.max(0.0),
            sio2_pct: y.sio2.max(0.0),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlowPathResult {
    pub points: Vec<BlowPathPoint>,
    pub tc_crossover_s: Option<u32>,
    pub final_temp_c: f64,
    pub final_point: BlowPathPoint,
    pub proactive_advice: Option<String>,
    pub mode: StartMode,
    pub equilibrium: EquilibriumResult,
    pub deviation: Option<ModelDeviation>,
}

fn rk4_step(y: &MeltVector, t: f64, h: f64, inp: &KineticInputs, p: &KineticParams) -> MeltVector {
    let f = |state: &MeltVector, time: f64| {
        let at = KineticInputs { elapsed_s: time, ..*inp };
        derivatives(state, &at, p).rates
    };
    let k1 = f(y, t);
    let k2 = f(&y.advanced(&k1, h / 2.0), t + h / 2.0);
    let k3 = f(&y.advanced(&k2, h / 2.0), t + h / 2.0);
    let k4 = f(&y.advanced(&k3, h), t + h);

    // k1 + 2k2 + 2k3 + k4, applied over h/6
    let weighted = k1.advanced(&k2, 2.0).advanced(&k3, 2.0).advanced(&k4, 1.0);
    y.advanced(&weighted, h / 6.0)
}

/// Simulate a full blow. `coolant_duty_kj_kg` is the heating + melting duty
/// of the charged coolant.
pub fn simulate_blow_path(
    inp: &BlowPathInputs,
    params: &KineticParams,
    coolant_duty_kj_kg: f64,
) -> Result<BlowPathResult, ValidationError> {
    inp.validate()?;

    // 1. Soft-sensing fallback for missing analyses
    let mut mode = StartMode::RealData;
    let mut si = inp.analysis.si;
    let mut ti = inp.analysis.ti;
    if si < MISSING_THRESHOLD || ti < MISSING_THRESHOLD {
        mode = StartMode::SoftSensing;
        if si < MISSING_THRESHOLD {
            si = SOFT_SENSED_SI;
        }
        if ti < MISSING_THRESHOLD {
            ti = SOFT_SENSED_TI;
        }
        info!("Blow path: Si/Ti analysis missing, soft-sensed start Si={} Ti={}", si, ti);
    }

    let bath_mass_kg = inp.bath_mass_t * 1000.0;
    let coolant_kg = inp.coolant_t * 1000.0;
    let kinetic_inputs = KineticInputs {
        bath_mass_kg,
        oxygen_mol_s: oxygen_mol_per_s(inp.oxygen_flow_m3h),
        stirring: inp.stirring,
        elapsed_s: 0.0,
        coolant_power_w: coolant_kg * coolant_duty_kj_kg * 1000.0 / params.coolant_window_s,
    };

    let mut y = MeltVector {
        c: inp.analysis.c,
        si,
        v: inp.analysis.v,
        ti,
        temp_c: inp.initial_temp_c,
        feo: 5.0,
        v2o5: 0.0,
        sio2: 1.0,
    };

    // 2. Integrate
    let mut points = vec![BlowPathPoint::at(0, &y)];
    let mut tc_crossover_s = None;
    for step in 1..=inp.duration_s {
        let t = (step - 1) as f64 * STEP_S;
        y = rk4_step(&y, t, STEP_S, &kinetic_inputs, params);
        if step % SAMPLE_EVERY_S == 0 || step == inp.duration_s {
            let point = BlowPathPoint::at(step, &y);
            if tc_crossover_s.is_none() && point.temp_c >= TC_ALERT_C {
                tc_crossover_s = Some(step);
            }
            points.push(point);
        }
    }
    let final_point = BlowPathPoint::at(inp.duration_s, &y);

    let proactive_advice = tc_crossover_s.map(|s| {
        format!("Tc crossover predicted at {}s: prepare to raise the lance or add coolant to hold back carbon oxidation.", s)
    });

    // 3. Equilibrium cross-check
    let equilibrium = solve_equilibrium(&EquilibriumInputs {
        initial: Composition { c: inp.analysis.c, si, v: inp.analysis.v, ti },
        initial_temp_c: inp.initial_temp_c,
        oxygen_flow_m3h: inp.oxygen_flow_m3h,
        duration_s: inp.duration_s as f64,
        bath_mass_kg,
        coolant_kg,
        coolant_duty_kj_kg,
    });
    let deviation = cross_validate(final_point.temp_c, &equilibrium);

    debug!(
        "Blow path done: T={:.1} C={:.3} Si={:.3} V={:.3}",
        final_point.temp_c, final_point.c_pct, final_point.si_pct, final_point.v_pct
    );

    Ok(BlowPathResult {
        points,
        tc_crossover_s,
        final_temp_c: final_point.temp_c,
        final_point,
        proactive_advice,
        mode,
        equilibrium,
        deviation,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn analysis(si: f64, ti: f64) -> IronAnalysis {
        IronAnalysis { c: 4.2, si, v: 0.28, ti, p: 0.08, s: 0.03 }
    }

    #[test]
    fn test_exothermic_blow() {
        let mut inp = BlowPathInputs::new(1300.0, analysis(0.5, 0.1));
        inp.duration_s = 300;
        let res = simulate_blow_path(&inp, &KineticParams::thermodynamic(), 1400.0).unwrap();

        assert!(res.final_point.si_pct < 0.5);
        assert!(res.final_point.v_pct < 0.28);
        assert!(res.final_temp_c > 1300.0);
        assert_eq!(res.mode, StartMode::RealData);
        assert_eq!(res.points.len(), 31);
    }

    #[test]
    fn test_coolant_reduces_final_temperature() {
        let params = KineticParams::thermodynamic();
        let mut dry = BlowPathInputs::new(1350.0, analysis(0.5, 0.1));
        dry.duration_s = 300;
        let mut cooled = dry.clone();
        cooled.coolant_t = 10.0;

        let a = simulate_blow_path(&dry, &params, 1400.0).unwrap();
        let b = simulate_blow_path(&cooled, &params, 1400.0).unwrap();
        assert!(b.final_temp_c < a.final_temp_c);
    }

    #[test]
    fn test_coolant_moves_both_models_alike() {
        let params = KineticParams::thermodynamic();
        let dry = BlowPathInputs::new(1340.0, analysis(0.28, 0.1));
        let mut cooled = dry.clone();
        cooled.coolant_t = 5.0;

        let a = simulate_blow_path(&dry, &params, 1400.0).unwrap();
        let b = simulate_blow_path(&cooled, &params, 1400.0).unwrap();
        let kinetic_drop = a.final_temp_c - b.final_temp_c;
        let equilibrium_drop = a.equilibrium.final_temp_c - b.equilibrium.final_temp_c;
        assert!(kinetic_drop > 0.0 && equilibrium_drop > 0.0);
        assert!((kinetic_drop - equilibrium_drop).abs() < 40.0, "{kinetic_drop} vs {equilibrium_drop}");
    }

    #[test]
    fn test_missing_si_ti_is_soft_sensed() {
        let mut inp = BlowPathInputs::new(1350.0, analysis(0.0, 0.0));
        inp.duration_s = 300;
        let res = simulate_blow_path(&inp, &KineticParams::thermodynamic(), 1400.0).unwrap();
        assert_eq!(res.mode, StartMode::SoftSensing);
        assert!(res.final_point.si_pct < SOFT_SENSED_SI);
    }

    #[test]
    fn test_crossover_reported_when_temperature_passes_alert() {
        let mut inp = BlowPathInputs::new(1300.0, analysis(0.5, 0.1));
        inp.duration_s = 600;
        let res = simulate_blow_path(&inp, &KineticParams::thermodynamic(), 1400.0).unwrap();
        if res.final_temp_c > TC_ALERT_C {
            let at = res.tc_crossover_s.unwrap();
            assert!(at > 0);
            assert!(res.proactive_advice.is_some());
        }
    }

    #[test]
    fn test_out_of_range_inputs_rejected() {
        let mut inp = BlowPathInputs::new(1300.0, analysis(0.5, 0.1));
        inp.duration_s = 30;
        let err = simulate_blow_path(&inp, &KineticParams::thermodynamic(), 1400.0).unwrap_err();
        assert_eq!(err.field, "duration_s");

        let bad = BlowPathInputs::new(1300.0, IronAnalysis { c: 12.0, ..analysis(0.5, 0.1) });
        assert!(simulate_blow_path(&bad, &KineticParams::thermodynamic(), 1400.0).is_err());
    }
}

//! Canonical process state of the running heat.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::SimulationSettings;
use crate::kinetics::MeltVector;

pub const MIN_ELEMENT_PCT: f64 = 0.01;
pub const MIN_TEMP_C: f64 = 1000.0;
pub const MAX_TEMP_C: f64 = 2000.0;

/// One noisy sub-lance measurement, distinct from the model trace.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DiscreteSample {
    pub time_min: f64,
    pub temp_c: f64,
    pub c_pct: f64,
    pub v_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessState {
    pub time_min: f64,
    pub total_duration_min: f64,

    pub c_pct: f64,
    pub si_pct: f64,
    pub v_pct: f64,
    pub ti_pct: f64,
    pub mn_pct: f64,

    pub feo_pct: f64,
    pub v2o5_pct: f64,
    pub sio2_pct: f64,

    pub temp_c: f64,

    pub lance_height_mm: f64,
    /// Operator setpoint; the scripted lance schedule yields to it
    pub lance_override_mm: Option<f64>,
    pub oxygen_flow_nm3_min: f64,
    pub coolant_added_kg: f64,

    /// Oxidation rates of the last step, %/min (soft-sensor inputs)
    pub si_rate_pct_min: f64,
    pub c_rate_pct_min: f64,

    pub latest_sample: Option<DiscreteSample>,
    pub is_emergency_stop: bool,
    pub last_ts: DateTime<Utc>,
}

impl ProcessState {
    /// Semi-steel practice starting point.
    pub fn initial(settings: &SimulationSettings) -> Self {
        Self {
            time_min: 0.0,
            total_duration_min: settings.total_duration_min,
            c_pct: 3.5,
            si_pct: 0.25,
            v_pct: 0.35,
            ti_pct: 0.15,
            mn_pct: 0.20,
            feo_pct: 5.0,
            v2o5_pct: MIN_ELEMENT_PCT,
            sio2_pct: 1.0,
            temp_c: 1280.0,
            lance_height_mm: settings.nominal_lance_mm,
            lance_override_mm: None,
            oxygen_flow_nm3_min: settings.nominal_oxygen_nm3_min(),
            coolant_added_kg: 0.0,
            si_rate_pct_min: 0.0,
            c_rate_pct_min: 0.0,
            latest_sample: None,
            is_emergency_stop: false,
            last_ts: Utc::now(),
        }
    }

    pub fn melt(&self) -> MeltVector {
        MeltVector {
            c: self.c_pct,
            si: self.si_pct,
            v: self.v_pct,
            ti: self.ti_pct,
            temp_c: self.temp_c,
            feo: self.feo_pct,
            v2o5: self.v2o5_pct,
            sio2: self.sio2_pct,
        }
    }

    /// Take an integrated melt vector, clamped into the physical envelope.
    pub fn apply(&mut self, y: &MeltVector) {
        self.c_pct = y.c.max(MIN_ELEMENT_PCT);
        self.si_pct = y.si.max(MIN_ELEMENT_PCT);
        self.v_pct = y.v.max(MIN_ELEMENT_PCT);
        self.ti_pct = y.ti.max(MIN_ELEMENT_PCT);
        self.feo_pct = y.feo.max(MIN_ELEMENT_PCT);
        self.v2o5_pct = y.v2o5.max(MIN_ELEMENT_PCT);
        self.sio2_pct = y.sio2.max(MIN_ELEMENT_PCT);
        self.temp_c = y.temp_c.clamp(MIN_TEMP_C, MAX_TEMP_C);
    }

    /// Every %-field and the temperature inside the envelope.
    pub fn within_envelope(&self) -> bool {
        let pcts = [
            self.c_pct,
            self.si_pct,
            self.v_pct,
            self.ti_pct,
            self.mn_pct,
            self.feo_pct,
            self.v2o5_pct,
            self.sio2_pct,
        ];
        pcts.iter().all(|p| *p >= MIN_ELEMENT_PCT) && (MIN_TEMP_C..=MAX_TEMP_C).contains(&self.temp_c)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_clamps() {
        let mut s = ProcessState::initial(&SimulationSettings::default());
        let mut y = s.melt();
        y.si = -0.4;
        y.v2o5 = -1.0;
        y.temp_c = 2600.0;
        s.apply(&y);
        assert_eq!(s.si_pct, MIN_ELEMENT_PCT);
        assert_eq!(s.v2o5_pct, MIN_ELEMENT_PCT);
        assert_eq!(s.temp_c, MAX_TEMP_C);
        assert!(s.within_envelope());
    }

    #[test]
    fn test_initial_state_is_nominal() {
        let settings = SimulationSettings::default();
        let s = ProcessState::initial(&settings);
        assert_eq!(s.lance_height_mm, 1100.0);
        assert!((s.oxygen_flow_nm3_min - 22000.0 / 60.0).abs() < 1e-9);
        assert!(!s.is_emergency_stop);
    }
}

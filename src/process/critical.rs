//! Critical temperature
//!
//! Tc is where carbon takes over from vanadium as the preferred oxygen sink.

use serde::{Deserialize, Serialize};

const TC_BASE_C: f64 = 1361.0;
const TC_REFERENCE_V: f64 = 0.12;
const TC_PER_PCT_V: f64 = 80.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CriticalTemperature {
    pub t_critical_c: f64,
    pub current_temp_c: Option<f64>,
    /// T - Tc; positive means the bath is past the crossover
    pub margin_c: Option<f64>,
    pub notes: Vec<String>,
}

pub fn predict_critical_temperature(v_pct: Option<f64>, current_temp_c: Option<f64>) -> CriticalTemperature {
    let mut notes = Vec::new();
    let t_critical_c = match v_pct {
        Some(v) => {
            notes.push("Tc adjusted linearly with bath vanadium.".to_string());
            TC_BASE_C + (v - TC_REFERENCE_V) * TC_PER_PCT_V
        }
        None => {
            notes.push(format!("No bath vanadium given, using the {} °C base.", TC_BASE_C));
            TC_BASE_C
        }
    };
    let margin_c = current_temp_c.map(|t| ((t - t_critical_c) * 100.0).round() / 100.0);

    CriticalTemperature {
        t_critical_c: (t_critical_c * 100.0).round() / 100.0,
        current_temp_c,
        margin_c,
        notes,
    }
}

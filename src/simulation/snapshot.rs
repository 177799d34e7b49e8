//! Per-tick snapshot record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::state::DiscreteSample;
use crate::sensing::SensorStatus;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemperatureReading {
    pub value: f64,
    pub status: SensorStatus,
    pub ts: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Chemistry {
    pub si: f64,
    pub v: f64,
    pub c: f64,
    /// Model carbon fused with the off-gas estimate
    pub c_fused: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LanceReading {
    pub value: f64,
    pub ts: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelParams {
    pub heat_efficiency: f64,
    pub reaction_rate_modifier: f64,
}

/// Immutable view of one tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Minutes since blow start
    pub process_time: f64,
    pub heat: u64,
    pub temperature: TemperatureReading,
    pub chemistry: Chemistry,
    pub lance_height: LanceReading,
    pub model_params: ModelParams,
    pub is_emergency_stop: bool,
    pub latest_discrete_sample: Option<DiscreteSample>,
}

fn round_to(x: f64, places: i32) -> f64 {
    let f = 10f64.powi(places);
    (x * f).round() / f
}

impl Snapshot {
    /// Display rounding applied at the serialization boundary.
    pub fn rounded(&self) -> Self {
        let mut out = self.clone();
        out.process_time = round_to(self.process_time, 2);
        out.temperature.value = round_to(self.temperature.value, 1);
        out.chemistry = Chemistry {
            si: round_to(self.chemistry.si, 3),
            v: round_to(self.chemistry.v, 3),
            c: round_to(self.chemistry.c, 2),
            c_fused: round_to(self.chemistry.c_fused, 3),
        };
        out.model_params = ModelParams {
            heat_efficiency: round_to(self.model_params.heat_efficiency, 3),
            reaction_rate_modifier: round_to(self.model_params.reaction_rate_modifier, 3),
        };
        out
    }

    /// Untyped payload for subscribers that speak JSON.
    pub fn to_payload(&self) -> serde_json::Value {
        serde_json::to_value(self.rounded()).unwrap_or(serde_json::Value::Null)
    }
}

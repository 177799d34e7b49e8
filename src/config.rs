//! Configuration
//!
//! Calibratable constants and runtime knobs. Loaded from an optional YAML file,
//! then overridden from the environment (`.env` is honoured).

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

use crate::process::ModelVariant;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub physics: PhysicsSettings,
    pub simulation: SimulationSettings,
    pub soft_sensor: SoftSensorSettings,
    pub kalman: KalmanSettings,
    pub control: ControlSettings,
    pub model_variant: ModelVariant,
    pub logging: LoggingSettings,
}

/// Heat and mass balance coefficients used by the static process models.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicsSettings {
    /// Hot-metal specific heat, kJ/(kg·K)
    pub cp_hm: f64,
    /// Oxidation enthalpies, kJ/kg of element
    pub h_si_oxidation: f64,
    pub h_v_oxidation: f64,
    pub h_c_oxidation: f64,
    /// Coolant absorption capacities, kJ/kg
    pub h_oxide_scale_absorption: f64,
    pub h_pig_iron_absorption: f64,
    pub h_coolant_melting: f64,
    pub slag_coeff_si: f64,
    pub slag_coeff_v: f64,
    /// Oxygen coefficients, m³ per kg of element oxidised
    pub oxy_coeff_si: f64,
    pub oxy_coeff_v: f64,
    pub oxy_coeff_c: f64,
    pub target_v_residual: f64,
    pub target_c_oxidation_start: f64,
    pub one_can_temp_boost: f64,
    pub heat_loss_ratio: f64,
    /// Temperature where C oxidation overtakes V in the site rules
    pub temp_critical_v_c_switch: f64,
}

impl Default for PhysicsSettings {
    fn default() -> Self {
        Self {
            cp_hm: 0.8,
            h_si_oxidation: 27620.0,
            h_v_oxidation: 15200.0,
            h_c_oxidation: 9280.0,
            h_oxide_scale_absorption: 2000.0,
            h_pig_iron_absorption: 1200.0,
            h_coolant_melting: 1400.0,
            slag_coeff_si: 2.14,
            slag_coeff_v: 1.79,
            oxy_coeff_si: 0.8,
            oxy_coeff_v: 0.5,
            oxy_coeff_c: 0.93,
            target_v_residual: 0.03,
            target_c_oxidation_start: 3.5,
            one_can_temp_boost: 30.0,
            heat_loss_ratio: 0.05,
            temp_critical_v_c_switch: 1360.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationSettings {
    pub oxygen_flow_nm3_h: f64,
    pub bath_mass_t: f64,
    pub stirring_factor: f64,
    pub heat_efficiency: f64,
    pub reaction_rate_modifier: f64,
    /// Nominal blow length of one heat, minutes
    pub total_duration_min: f64,
    /// Extra time after the blow before a new heat starts, minutes
    pub grace_min: f64,
    pub tick_period_ms: u64,
    pub history_limit: usize,
    pub subscriber_capacity: usize,
    /// Baseline scrap/ore cooling applied during the coolant window of every
    /// heat, W. The offline blow path uses only the charged coolant.
    pub base_coolant_w: f64,
    pub nominal_lance_mm: f64,
    pub safe_lance_mm: f64,
    /// Fixed RNG seed for reproducible runs
    pub seed: Option<u64>,
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            oxygen_flow_nm3_h: 22000.0,
            bath_mass_t: 100.0,
            stirring_factor: 1.0,
            heat_efficiency: 0.92,
            reaction_rate_modifier: 1.05,
            total_duration_min: 8.0,
            grace_min: 2.0,
            tick_period_ms: 1000,
            history_limit: 3600,
            subscriber_capacity: 32,
            base_coolant_w: 20_000_000.0,
            nominal_lance_mm: 1100.0,
            safe_lance_mm: 2000.0,
            seed: None,
        }
    }
}

impl SimulationSettings {
    pub fn tick_period(&self) -> Duration {
        Duration::from_millis(self.tick_period_ms.max(1))
    }

    pub fn nominal_oxygen_nm3_min(&self) -> f64 {
        self.oxygen_flow_nm3_h / 60.0
    }
}

/// Soft-sensor calibration. The reconstruction coefficients are illustrative
/// and expected to be fitted per site.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SoftSensorSettings {
    pub temp_min: f64,
    pub temp_max: f64,
    /// Maximum plausible rate of change, °C/min
    pub max_rate_c_per_min: f64,
    /// °C/min contributed per %/min of Si oxidised
    pub si_heat: f64,
    /// °C/min contributed per %/min of C oxidised
    pub c_heat: f64,
    /// Ambient loss, °C/min
    pub base_loss: f64,
    pub default_temp: f64,
    pub inference_confidence: f64,
    pub fallback_confidence: f64,
    pub rate_violation_confidence: f64,
}

impl Default for SoftSensorSettings {
    fn default() -> Self {
        Self {
            temp_min: 1200.0,
            temp_max: 1550.0,
            max_rate_c_per_min: 50.0,
            si_heat: 20.0,
            c_heat: 10.0,
            base_loss: 5.0,
            default_temp: 1300.0,
            inference_confidence: 0.85,
            fallback_confidence: 0.1,
            rate_violation_confidence: 0.2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KalmanSettings {
    pub process_noise: f64,
    pub measurement_noise: f64,
    pub initial_covariance: f64,
    /// Relative noise of the simulated off-gas analyser
    pub offgas_noise: f64,
}

impl Default for KalmanSettings {
    fn default() -> Self {
        Self {
            process_noise: 1e-6,
            measurement_noise: 1e-4,
            initial_covariance: 1e-2,
            offgas_noise: 0.05,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlSettings {
    pub switch_cooldown_ms: u64,
    /// Hex SHA-256 digest of the provisioned production credential
    pub production_token_sha256: Option<String>,
}

impl Default for ControlSettings {
    fn default() -> Self {
        Self {
            switch_cooldown_ms: 1000,
            production_token_sha256: None,
        }
    }
}

impl ControlSettings {
    pub fn switch_cooldown(&self) -> Duration {
        Duration::from_millis(self.switch_cooldown_ms)
    }

    /// Provision a production credential, keeping only its digest.
    pub fn with_production_token(mut self, token: &str) -> Self {
        self.production_token_sha256 = Some(digest_token(token));
        self
    }
}

pub fn digest_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub level: String,
    pub format: LogFormat,
    pub dir: Option<PathBuf>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
            dir: None,
        }
    }
}

/// Outcome of [`Settings::load`]. Diagnostics are returned rather than logged
/// because loading runs before the subscriber is installed.
#[derive(Debug, Clone)]
pub struct LoadedSettings {
    pub settings: Settings,
    pub source: Option<PathBuf>,
    /// Rejected environment overrides
    pub warnings: Vec<String>,
}

impl LoadedSettings {
    /// Emit the deferred diagnostics through `tracing`.
    pub fn log_diagnostics(&self) {
        if let Some(path) = &self.source {
            info!("Loaded configuration from {}", path.display());
        }
        for w in &self.warnings {
            warn!("{}", w);
        }
    }
}

impl Settings {
    /// Load settings from an optional YAML file and apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<LoadedSettings> {
        dotenv::dotenv().ok();

        let mut settings = match path {
            Some(p) => Self::from_yaml_file(p)?,
            None => Self::default(),
        };
        let warnings = settings.apply_overrides(|key| std::env::var(key).ok());
        Ok(LoadedSettings {
            settings,
            source: path.map(Path::to_path_buf),
            warnings,
        })
    }

    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let settings: Settings = serde_yaml::from_str(&raw)
            .with_context(|| format!("parsing config {}", path.display()))?;
        Ok(settings)
    }

    /// Apply `VTWIN_*` overrides looked up through `var`. Returns one message
    /// per rejected value.
    pub fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) -> Vec<String> {
        let mut warnings = Vec::new();
        if let Some(token) = var("VTWIN_PRODUCTION_TOKEN") {
            if !token.is_empty() {
                self.control.production_token_sha256 = Some(digest_token(&token));
            }
        }
        if let Some(ms) = var("VTWIN_SWITCH_COOLDOWN_MS") {
            match ms.parse() {
                Ok(v) => self.control.switch_cooldown_ms = v,
                Err(_) => warnings.push(format!("Ignoring VTWIN_SWITCH_COOLDOWN_MS={}: not an integer", ms)),
            }
        }
        if let Some(variant) = var("VTWIN_MODEL_VARIANT") {
            match variant.parse() {
                Ok(v) => self.model_variant = v,
                Err(e) => warnings.push(format!("Ignoring VTWIN_MODEL_VARIANT: {}", e)),
            }
        }
        if let Some(fmt) = var("VTWIN_LOG_FORMAT") {
            match fmt.to_lowercase().as_str() {
                "json" => self.logging.format = LogFormat::Json,
                "text" => self.logging.format = LogFormat::Text,
                other => warnings.push(format!("Ignoring VTWIN_LOG_FORMAT={}", other)),
            }
        }
        warnings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_partial_yaml_keeps_defaults() -> Result<()> {
        let mut file = NamedTempFile::new()?;
        writeln!(file, "simulation:\n  bath_mass_t: 80.0\ncontrol:\n  switch_cooldown_ms: 250")?;

        let settings = Settings::from_yaml_file(file.path())?;
        assert_eq!(settings.simulation.bath_mass_t, 80.0);
        assert_eq!(settings.simulation.oxygen_flow_nm3_h, 22000.0);
        assert_eq!(settings.control.switch_cooldown(), Duration::from_millis(250));
        assert_eq!(settings.soft_sensor.temp_max, 1550.0);
        Ok(())
    }

    #[test]
    fn test_bad_overrides_are_reported_not_applied() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("VTWIN_MODEL_VARIANT", "quantum"),
            ("VTWIN_SWITCH_COOLDOWN_MS", "soon"),
            ("VTWIN_LOG_FORMAT", "JSON"),
        ]);
        let mut settings = Settings::default();
        let warnings = settings.apply_overrides(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(warnings.len(), 2);
        assert!(warnings[0].contains("VTWIN_SWITCH_COOLDOWN_MS"));
        assert!(warnings[1].contains("quantum"));
        assert_eq!(settings.model_variant, ModelVariant::Thermodynamic);
        assert_eq!(settings.control.switch_cooldown_ms, 1000);
        assert_eq!(settings.logging.format, LogFormat::Json);
    }

    #[test]
    fn test_good_overrides_apply_silently() {
        let mut settings = Settings::default();
        let warnings = settings.apply_overrides(|k| match k {
            "VTWIN_MODEL_VARIANT" => Some("site_empirical".to_string()),
            "VTWIN_PRODUCTION_TOKEN" => Some("secret".to_string()),
            _ => None,
        });
        assert!(warnings.is_empty());
        assert_eq!(settings.model_variant, ModelVariant::SiteEmpirical);
        assert_eq!(settings.control.production_token_sha256, Some(digest_token("secret")));
    }

    #[test]
    fn test_token_is_stored_as_digest() {
        let control = ControlSettings::default().with_production_token("secret");
        let stored = control.production_token_sha256.unwrap();
        assert_eq!(stored.len(), 64);
        assert_ne!(stored, "secret");
        assert_eq!(stored, digest_token("secret"));
    }
}

//! vtwin
//!
//! Runs the converter twin: loads configuration, starts the simulation loop
//! in Simulation mode and logs snapshots until Ctrl-C.

use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_stream::StreamExt;
use tracing::{debug, info, warn};

use vanadium_twin::config::Settings;
use vanadium_twin::control::ModeController;
use vanadium_twin::kinetics::{simulate_blow_path, BlowPathInputs, IronAnalysis};
use vanadium_twin::process::{model_for, predict_critical_temperature, ThermalInputs};
use vanadium_twin::simulation::Simulator;
use vanadium_twin::utils::init_telemetry;

/// Log every Nth snapshot at info
const SNAPSHOT_LOG_EVERY: u64 = 10;

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let loaded = Settings::load(config_path.as_deref())?;
    let _telemetry = init_telemetry(&loaded.settings.logging)?;
    loaded.log_diagnostics();
    let settings = loaded.settings;

    println!("\n{}", "═".repeat(60));
    println!("🏭 Vanadium Extraction Digital Twin v{}", env!("CARGO_PKG_VERSION"));
    println!("{}", "═".repeat(60));
    println!("Model: {} | Tick: {:?}", settings.model_variant, settings.simulation.tick_period());
    println!("{}\n", "═".repeat(60));

    // Pre-blow check with the configured process model
    let model = model_for(settings.model_variant, &settings.physics);
    let analysis = IronAnalysis { c: 4.2, si: 0.28, v: 0.28, ti: 0.1, p: 0.08, s: 0.03 };
    let coolant = model.recommend_coolant(&ThermalInputs { iron_temp_c: 1340.0, si_pct: analysis.si, is_one_can: true })?;
    info!("Coolant: {:?} {:.1} kg/t within {} min", coolant.coolant_type, coolant.kg_per_t, coolant.add_within_min);

    let mut blow = BlowPathInputs::new(1340.0, analysis);
    blow.coolant_t = coolant.kg_per_t * blow.bath_mass_t / 1000.0;
    let path = simulate_blow_path(&blow, &model.kinetic_params(), model.coolant_duty_kj_kg())?;
    let tc = predict_critical_temperature(Some(path.final_point.v_pct), Some(path.final_temp_c));
    info!(
        "Blow path: end {:.1} °C, V {:.3} %, Tc {:.1} °C (margin {:?})",
        path.final_temp_c, path.final_point.v_pct, tc.t_critical_c, tc.margin_c
    );
    if let Some(advice) = &path.proactive_advice {
        info!("{}", advice);
    }
    if let Some(dev) = &path.deviation {
        warn!("{}", dev.message);
    }

    // Twin and controller
    let simulator = Arc::new(Simulator::new(&settings));
    let controller = ModeController::new(simulator.clone(), &settings.control);
    info!("Mode: {}", controller.mode());

    let mut snapshots = simulator.subscribe();
    simulator.start();

    let logger = tokio::spawn(async move {
        let mut seen = 0u64;
        while let Some(snapshot) = snapshots.next().await {
            seen += 1;
            let payload = snapshot.to_payload();
            if seen % SNAPSHOT_LOG_EVERY == 0 {
                info!("heat #{} t={:.2} min T={:.1} °C", snapshot.heat, snapshot.process_time, snapshot.temperature.value);
            }
            debug!("{}", payload);
        }
    });

    tokio::signal::ctrl_c().await?;
    info!("Shutting down");
    simulator.stop();
    logger.abort();
    Ok(())
}

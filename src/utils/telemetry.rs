//! Logging
//!
//! Installs the global tracing subscriber: an env filter, a console layer in
//! text or JSON, and optionally a daily-rolling file layer.

use anyhow::Result;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

use crate::config::{LogFormat, LoggingSettings};

/// Keep alive for the life of the process or buffered file lines are lost.
pub struct TelemetryGuard {
    _file: Option<WorkerGuard>,
}

fn default_directives(level: &str) -> String {
    format!("vanadium_twin={level},vtwin={level}")
}

pub fn init_telemetry(settings: &LoggingSettings) -> Result<TelemetryGuard> {
    // 1. Filter: RUST_LOG wins over configuration
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directives(&settings.level)));

    // 2. Optional file sink
    let (file_writer, guard) = match &settings.dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "vtwin.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (Some(writer), Some(guard))
        }
        None => (None, None),
    };

    // 3. Install
    let registry = Registry::default().with(filter);
    match settings.format {
        LogFormat::Json => {
            let file_layer = file_writer.map(|w| fmt::layer().json().with_writer(w).with_ansi(false));
            registry.with(fmt::layer().json()).with(file_layer).try_init()?;
        }
        LogFormat::Text => {
            let file_layer = file_writer.map(|w| fmt::layer().with_writer(w).with_ansi(false));
            registry.with(fmt::layer().with_target(false)).with(file_layer).try_init()?;
        }
    }

    Ok(TelemetryGuard { _file: guard })
}

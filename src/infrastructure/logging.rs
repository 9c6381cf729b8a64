//! Logging system configuration and initialization
//!
//! Two outputs, mirroring how the harvester is operated:
//! - a log file truncated on every run, verbose by default (`debug`)
//! - the console, `info` and above
//!
//! `init` returns a [`LoggingHandle`] that owns the file writer guard. Keep it
//! alive for the whole run; dropping it flushes and closes the log file.

use anyhow::{Context, Result};
use std::fs::File;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    fmt::{self, time::FormatTime},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer, Registry,
};

pub use crate::infrastructure::config::LoggingConfig;

/// Dependencies that are only interesting at trace level.
const NOISY_TARGETS: [&str; 5] = ["reqwest", "hyper", "hyper_util", "html5ever", "selectors"];

/// Local wall-clock timestamps, millisecond precision
struct LocalTimeFormatter;

impl FormatTime for LocalTimeFormatter {
    fn format_time(&self, w: &mut fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(w, "{}", chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f"))
    }
}

/// Process-lifetime logging handle.
#[must_use = "dropping the handle stops the file writer"]
pub struct LoggingHandle {
    file_guard: Option<WorkerGuard>,
}

impl LoggingHandle {
    pub fn has_file_output(&self) -> bool {
        self.file_guard.is_some()
    }
}

/// Build the filter for one output. `RUST_LOG` wins when set.
fn build_filter(level: &str) -> Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }

    let mut directives = vec![level.to_string()];
    if !level.eq_ignore_ascii_case("trace") {
        directives.extend(NOISY_TARGETS.iter().map(|target| format!("{target}=warn")));
    }
    EnvFilter::try_new(directives.join(",")).with_context(|| format!("Invalid log level '{level}'"))
}

/// Initialize the global subscriber from `config`.
pub fn init(config: &LoggingConfig) -> Result<LoggingHandle> {
    let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = Vec::new();
    let mut file_guard = None;

    if config.file_output {
        let file = File::create(&config.file_path)
            .with_context(|| format!("Failed to create log file {}", config.file_path.display()))?;
        let (writer, guard) = tracing_appender::non_blocking(file);
        file_guard = Some(guard);

        let filter = build_filter(&config.level)?;
        let layer = if config.json_format {
            fmt::layer()
                .json()
                .with_writer(writer)
                .with_timer(LocalTimeFormatter)
                .with_target(true)
                .with_ansi(false)
                .with_filter(filter)
                .boxed()
        } else {
            fmt::layer()
                .with_writer(writer)
                .with_timer(LocalTimeFormatter)
                .with_target(false)
                .with_ansi(false)
                .with_filter(filter)
                .boxed()
        };
        layers.push(layer);
    }

    if config.console_output {
        let filter = build_filter(&config.console_level)?;
        layers.push(
            fmt::layer()
                .with_writer(std::io::stdout)
                .with_timer(LocalTimeFormatter)
                .with_target(false)
                .with_filter(filter)
                .boxed(),
        );
    }

    if layers.is_empty() {
        anyhow::bail!("No logging output configured");
    }

    tracing_subscriber::registry()
        .with(layers)
        .try_init()
        .context("Failed to install the tracing subscriber")?;

    info!(
        "Logging initialized (file: {}, level: {}, console: {})",
        if config.file_output { config.file_path.display().to_string() } else { "off".to_string() },
        config.level,
        if config.console_output { config.console_level.as_str() } else { "off" },
    );

    Ok(LoggingHandle { file_guard })
}

/// Log version and environment once at startup.
pub fn log_system_info() {
    info!("=== Contract Harvester ===");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));
    info!("Operating system: {} / {}", std::env::consts::OS, std::env::consts::ARCH);
    if let Ok(current_dir) = std::env::current_dir() {
        info!("Working directory: {}", current_dir.display());
    }
}

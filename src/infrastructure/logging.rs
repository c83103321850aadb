//! Logging system configuration and initialization
//!
//! Sets up the `tracing` stack for both binaries:
//! - Console output, human-readable or JSON lines
//! - Optional file output through a non-blocking writer
//! - Level from configuration, overridable with `RUST_LOG`
//! - BRT (Brasília Time, UTC-3) timestamps, matching the store's locale

#![allow(clippy::needless_pass_by_value)]

use std::sync::Mutex;

use anyhow::{Context, Result, anyhow};
use chrono::{FixedOffset, Offset, Utc};
use lazy_static::lazy_static;
use once_cell::sync::OnceCell;
use tracing::info;
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{
    EnvFilter, Layer, Registry,
    fmt::{self, time::FormatTime},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

pub use crate::infrastructure::config::LoggingConfig;

/// Offset of Brasília Time west of UTC, in seconds.
const BRT_OFFSET_SECS: i32 = 3 * 3600;

/// Dependency targets turned down unless TRACE is requested.
const QUIET_TARGETS: &[(&str, &str)] = &[
    ("sqlx::query", "warn"),
    ("sqlx::postgres", "warn"),
    ("lapin", "warn"),
    ("pinky_swear", "warn"),
    ("chromiumoxide", "warn"),
    ("tungstenite", "warn"),
    ("hyper", "warn"),
    ("h2", "warn"),
    ("tokio", "info"),
    ("runtime", "warn"),
];

lazy_static! {
    static ref LOG_GUARDS: Mutex<Vec<tracing_appender::non_blocking::WorkerGuard>> = Mutex::new(Vec::new());
}

static INITIALIZED: OnceCell<()> = OnceCell::new();

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

fn brt_offset() -> FixedOffset {
    FixedOffset::west_opt(BRT_OFFSET_SECS).unwrap_or_else(|| Utc.fix())
}

/// Timestamp formatter for BRT (UTC-3)
struct BrtTimeFormatter;

impl FormatTime for BrtTimeFormatter {
    fn format_time(&self, w: &mut fmt::format::Writer<'_>) -> std::fmt::Result {
        let now = Utc::now().with_timezone(&brt_offset());
        write!(w, "{}", now.format("%Y-%m-%d %H:%M:%S%.3f %:z"))
    }
}

/// Initialize logging with default configuration
pub fn init_logging() -> Result<()> {
    init_logging_with_config(LoggingConfig::default())
}

/// Initialize logging with custom configuration
///
/// Calling this more than once is a no-op; the first configuration wins.
///
/// # Environment Variable Override
/// ```bash
/// # Show SQL statements while keeping everything else at info
/// RUST_LOG="info,sqlx::query=debug" cargo run --bin consumer
/// ```
pub fn init_logging_with_config(config: LoggingConfig) -> Result<()> {
    if INITIALIZED.get().is_some() {
        return Ok(());
    }

    let env_filter = build_filter(&config)?;
    let mut layers: Vec<BoxedLayer> = Vec::new();

    if config.console_output {
        layers.push(if config.json_format {
            fmt::Layer::new()
                .json()
                .with_writer(std::io::stdout)
                .with_timer(BrtTimeFormatter)
                .with_target(true)
                .boxed()
        } else {
            fmt::Layer::new()
                .with_writer(std::io::stdout)
                .with_timer(BrtTimeFormatter)
                .with_target(false)
                .boxed()
        });
    }

    if config.file_output {
        std::fs::create_dir_all(&config.log_dir)
            .with_context(|| format!("Failed to create log directory {}", config.log_dir.display()))?;

        let file_appender = rolling::never(&config.log_dir, &config.file_name);
        let (file_writer, file_guard) = non_blocking(file_appender);
        LOG_GUARDS
            .lock()
            .map_err(|_| anyhow!("log guard registry poisoned"))?
            .push(file_guard);

        layers.push(if config.json_format {
            fmt::Layer::new()
                .json()
                .with_writer(file_writer)
                .with_timer(BrtTimeFormatter)
                .with_target(true)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true)
                .with_ansi(false)
                .boxed()
        } else {
            fmt::Layer::new()
                .with_writer(file_writer)
                .with_timer(BrtTimeFormatter)
                .with_target(false)
                .with_ansi(false)
                .boxed()
        });
    }

    Registry::default()
        .with(layers)
        .with(env_filter)
        .try_init()
        .map_err(|e| anyhow!("Failed to install tracing subscriber: {e}"))?;
    let _ = INITIALIZED.set(());

    info!(
        level = %config.level,
        json = config.json_format,
        file = config.file_output,
        "Logging initialized"
    );
    Ok(())
}

/// Level filter: `RUST_LOG` if set, otherwise the configured level with
/// noisy dependencies turned down and per-module overrides applied.
fn build_filter(config: &LoggingConfig) -> Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }

    let mut filter = EnvFilter::try_new(&config.level)
        .with_context(|| format!("Invalid log level '{}'", config.level))?;

    if !config.level.to_lowercase().contains("trace") {
        for (target, level) in QUIET_TARGETS {
            filter = filter.add_directive(format!("{target}={level}").parse()?);
        }
    }

    for (target, level) in &config.module_filters {
        filter = filter.add_directive(
            format!("{target}={level}")
                .parse()
                .with_context(|| format!("Invalid module filter {target}={level}"))?,
        );
    }

    Ok(filter)
}

//! Logging initialization.
//!
//! Console and file output over `tracing`, with an env-filter that keeps
//! dependency noise (sqlx, reqwest, hyper) below the application level.
//! `RUST_LOG` overrides the configured level entirely.

use anyhow::{Context, Result};
use once_cell::sync::OnceCell;
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Registry};

use crate::infrastructure::config::LoggingConfig;

// Keeps the non-blocking file writer alive for the process lifetime.
static LOG_GUARD: OnceCell<WorkerGuard> = OnceCell::new();

fn build_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let mut filter = EnvFilter::new(level);
        if !level.eq_ignore_ascii_case("trace") {
            for directive in [
                "sqlx::query=warn",
                "reqwest=info",
                "hyper=warn",
                "h2=warn",
                "tokio=info",
            ] {
                filter = filter.add_directive(directive.parse().expect("static directive"));
            }
        }
        filter
    })
}

/// Initialize the global subscriber from config. File output goes to a
/// daily-rolling `supplement-scraper.log` under `log_dir`.
pub fn init_logging(config: &LoggingConfig, log_dir: &Path) -> Result<()> {
    let filter = build_filter(&config.level);
    let registry = Registry::default().with(filter);

    match (config.file_output, config.console_output) {
        (true, true) | (true, false) => {
            std::fs::create_dir_all(log_dir)
                .with_context(|| format!("Failed to create log directory: {}", log_dir.display()))?;
            let appender = rolling::daily(log_dir, "supplement-scraper.log");
            let (writer, guard) = non_blocking(appender);
            let _ = LOG_GUARD.set(guard);

            let file_layer = fmt::layer().with_writer(writer).with_ansi(false);
            if config.console_output {
                registry.with(file_layer).with(fmt::layer()).try_init()
            } else {
                registry.with(file_layer).try_init()
            }
        }
        (false, _) => registry.with(fmt::layer()).try_init(),
    }
    .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {e}"))?;

    Ok(())
}

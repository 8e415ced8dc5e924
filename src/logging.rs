use std::fs::{self, OpenOptions};
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{Context, Result};
use directories::BaseDirs;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::APP_NAME;

/// Environment variable holding the filter directives, e.g. `cardsmith=debug`.
pub const LOG_ENV: &str = "CARDSMITH_LOG";

fn filter(default: &str) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default))
}

pub fn log_file_path() -> Result<PathBuf> {
    let base = BaseDirs::new().context("unable to determine base directories")?;
    Ok(base.data_local_dir().join(APP_NAME).join("cardsmith.log"))
}

/// The terminal belongs to the UI, so events go to a file instead.
pub fn init_tui_logging() -> Result<PathBuf> {
    let path = log_file_path()?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create log dir: {}", parent.display()))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("failed to open log file {}", path.display()))?;

    let fmt_layer = fmt::layer()
        .with_writer(Mutex::new(file))
        .with_target(true)
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(filter("info"))
        .with(fmt_layer)
        .try_init()
        .context("failed to initialize logging")?;

    tracing::info!(log = %path.display(), "cardsmith started");
    Ok(path)
}

/// Warnings and errors on stderr; stdout is reserved for vCard output.
pub fn init_cli_logging() -> Result<()> {
    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact();

    tracing_subscriber::registry()
        .with(filter("warn"))
        .with(fmt_layer)
        .try_init()
        .context("failed to initialize logging")?;
    Ok(())
}

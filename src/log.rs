use std::fs;
use anyhow::Result;
use tracing::error;
use std::fs::OpenOptions;
use tauri::{App, Manager};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{prelude::*, EnvFilter, fmt};

use crate::config::ENV_LOG;

const LOG_FILE: &str = "brightness-controller.log";
const DEFAULT_FILTER: &str = "info";

/// `ENV_LOG` if it parses, `info` otherwise
fn env_filter() -> EnvFilter {
    EnvFilter::try_from_env(ENV_LOG).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

pub fn init_logging(app: &App) -> Result<WorkerGuard> {
    let app_data_local = app.path().app_local_data_dir()?;
    if !app_data_local.exists() {
        fs::create_dir_all(&app_data_local)?;
    }

    let log_path = app_data_local.join(LOG_FILE);
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)?;

    let (file_writer, guard) = tracing_appender::non_blocking(file);

    let file_layer = fmt::layer()
        .with_writer(file_writer)
        .with_ansi(false)
        .with_filter(env_filter());

    // release builds have no console attached, so this only shows up when
    // launched from a terminal
    let console_layer = fmt::layer()
        .with_writer(std::io::stdout)
        .with_ansi(cfg!(debug_assertions))
        .with_filter(env_filter());

    tracing_subscriber::registry()
        .with(file_layer)
        .with(console_layer)
        .init();

    std::panic::set_hook(Box::new(|panic_info| {
        error!("panic occurred: {:?}", panic_info);
    }));

    Ok(guard)
}

//! CLI command implementations

pub mod login;
pub mod logs;
pub mod register;
pub mod speak;
pub mod users;

use std::path::PathBuf;

use anyhow::{Context, Result};
use gridpin_core::{AtmContext, EntryPoint, LoggingService};

/// Get the data directory from environment or default
pub fn get_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("GRIDPIN_DIR") {
        PathBuf::from(dir)
    } else {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".gridpin")
    }
}

/// Open the data directory with every service wired up
pub fn get_context() -> Result<AtmContext> {
    let data_dir = get_data_dir();
    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("Failed to create data directory: {:?}", data_dir))?;

    AtmContext::new(&data_dir, EntryPoint::Cli).context("Failed to initialize GridPin")
}

/// Event log on its own, without opening the user store
pub fn get_logger() -> Result<LoggingService> {
    let data_dir = get_data_dir();
    std::fs::create_dir_all(&data_dir)?;
    LoggingService::new(&data_dir, EntryPoint::Cli, env!("CARGO_PKG_VERSION"))
}

/// Record a command execution, ignoring any errors (logging should never break the app)
pub fn log_command(ctx: &AtmContext, command: &str) {
    let _ = ctx.logger.log_command(command);
}

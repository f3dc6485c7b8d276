//! Helpers shared by subcommands.

use std::path::Path;

use anyhow::{Context, Result};
use cla_core::LogInput;

/// Reads a JSON log file.
pub fn read_log(path: &Path) -> Result<LogInput> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read log {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("invalid log file {}", path.display()))
}

//! CLI subcommand implementations.

pub mod analyze;
pub mod classify;
mod util;

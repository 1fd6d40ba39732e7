//! Logging initialization.
//!
//! `simplelog` writes to stderr by default and to a file when `--log-path`
//! is given, mirroring the two-sink pattern used across the reference pack
//! (`chigenori053-Design_BrainModel`'s root package, `tasansal-tracelens`)
//! rather than routing through an env-var-configured subscriber: the CLI's
//! `--log-level`/`--log-path` flags are the only configuration surface.

use std::fs::File;
use std::path::Path;

use simplelog::{ColorChoice, CombinedLogger, Config, TermLogger, TerminalMode, WriteLogger};

use crate::core::config::LogLevel;
use crate::core::error::{EngineError, Result};

/// Initialize logging at `level`, additionally writing to `log_path` if
/// given. Safe to call once per process; a second call returns an error
/// from the underlying `log` crate, wrapped as `EngineError::InvalidConfig`.
pub fn init(level: LogLevel, log_path: Option<&Path>) -> Result<()> {
    let filter = level.to_level_filter();
    let mut loggers: Vec<Box<dyn simplelog::SharedLogger>> = vec![TermLogger::new(
        filter,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )];

    if let Some(path) = log_path {
        let file = File::create(path)?;
        loggers.push(WriteLogger::new(filter, Config::default(), file));
    }

    CombinedLogger::init(loggers)
        .map_err(|e| EngineError::invalid_config(format!("logging already initialized: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_accepts_no_log_path() {
        // Only checks construction doesn't panic; a real process-wide
        // `CombinedLogger::init` call is exercised by the CLI, not here,
        // since `log` only allows one global logger per process.
        let filter = LogLevel::Info.to_level_filter();
        assert_eq!(filter, log::LevelFilter::Info);
    }
}

// src/logging.rs

//! `tracing` subscriber setup.
//!
//! Filter resolution, first match wins:
//! 1. `--log-level` on the command line, applied to the whole crate;
//! 2. `DAILYBOT_LOG`, any `EnvFilter` directive string
//!    (`info`, `dailybot::bot=debug,warn`, ...);
//! 3. `info`.
//!
//! Output goes to stderr so stdout only carries the task list, the dry-run
//! plan and the final status table. Worker spans (`worker{emulator=..}`)
//! prefix every line a worker logs, which keeps parallel emulators apart.

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

use crate::cli::LogLevel;

pub const LOG_ENV: &str = "DAILYBOT_LOG";

/// Install the global subscriber. Call once, before any worker starts.
pub fn init_logging(cli_level: Option<LogLevel>) -> Result<()> {
    let filter = resolve_filter(cli_level, std::env::var(LOG_ENV).ok().as_deref())?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("logging already initialised: {e}"))
}

fn resolve_filter(cli_level: Option<LogLevel>, env: Option<&str>) -> Result<EnvFilter> {
    if let Some(level) = cli_level {
        return Ok(EnvFilter::new(directive(level)));
    }
    match env.map(str::trim).filter(|s| !s.is_empty()) {
        Some(spec) => EnvFilter::try_new(spec)
            .with_context(|| format!("invalid {LOG_ENV} value '{spec}'")),
        None => Ok(EnvFilter::new("info")),
    }
}

fn directive(level: LogLevel) -> &'static str {
    match level {
        LogLevel::Error => "error",
        LogLevel::Warn => "warn",
        LogLevel::Info => "info",
        LogLevel::Debug => "debug",
        LogLevel::Trace => "trace",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_level_beats_environment() {
        let f = resolve_filter(Some(LogLevel::Debug), Some("error")).unwrap();
        assert_eq!(f.to_string(), "debug");
    }

    #[test]
    fn environment_accepts_directives() {
        let f = resolve_filter(None, Some(" dailybot::bot=trace,warn ")).unwrap();
        assert!(f.to_string().contains("dailybot::bot=trace"));
        assert_eq!(resolve_filter(None, Some("")).unwrap().to_string(), "info");
        assert_eq!(resolve_filter(None, None).unwrap().to_string(), "info");
    }

    #[test]
    fn garbage_environment_is_an_error() {
        assert!(resolve_filter(None, Some("dailybot=loud")).is_err());
    }
}

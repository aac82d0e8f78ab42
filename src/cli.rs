// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

/// Command-line arguments for `dailybot`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "dailybot",
    version,
    about = "Drive the daily task list of a mobile chat app across emulator instances.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    ///
    /// Default: `Dailybot.toml` in the current working directory.
    #[arg(long, value_name = "PATH", default_value = "Dailybot.toml")]
    pub config: String,

    /// Emulator index to drive. Repeat for several; default is every
    /// configured account.
    #[arg(long = "emulator", value_name = "INDEX")]
    pub emulators: Vec<u32>,

    /// Run a single task by name instead of the whole list.
    #[arg(long, value_name = "NAME")]
    pub task: Option<String>,

    /// Only scan the task page and report progress; execute nothing.
    #[arg(long, conflicts_with = "task")]
    pub refresh: bool,

    /// Print the built-in task list and exit.
    #[arg(long)]
    pub list_tasks: bool,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `DAILYBOT_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Parse + validate the config, print the plan, touch no device.
    #[arg(long)]
    pub dry_run: bool,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}

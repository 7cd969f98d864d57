// src/cli.rs

//! CLI argument parsing using `clap`.
//!
//! Both entry points work without any flags: `perfrun` reads the fixed
//! config path, `perfrun-host` needs only its operation flags.

use clap::{Parser, ValueEnum};

/// Command-line arguments for `perfrun`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "perfrun",
    version,
    about = "Run benchmark cases across hosts: monitors, task, wait, collect.",
    long_about = "Edit the config file (configs/host.toml by default) and run."
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    #[arg(long, value_name = "PATH", default_value = "configs/host.toml")]
    pub config: String,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// Overrides `PERFRUN_LOG` and `log_level` from the config file.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Validate the config and print the commands for each case without
    /// dispatching anything.
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

/// Arguments for the host-side helper `perfrun-host`.
#[derive(Debug, Clone, Parser)]
#[command(name = "perfrun-host", version, about = "Manage a host.")]
pub struct HostArgs {
    /// Operation on the host.
    #[arg(short = 'o', value_enum)]
    pub operation: HostOperation,

    /// Pid file path (required for `pidrunning`).
    #[arg(
        short = 'f',
        value_name = "PID_FILE",
        required_if_eq("operation", "pidrunning")
    )]
    pub pid_file: Option<String>,
}

/// Closed set of host-side operations.
#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum HostOperation {
    /// Check whether the process recorded in a pid file is running.
    #[value(name = "pidrunning")]
    PidRunning,
}

/// Parse `perfrun` arguments, returning clap's error for usage output.
pub fn try_parse() -> Result<CliArgs, clap::Error> {
    CliArgs::try_parse()
}

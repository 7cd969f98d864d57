// src/bin/perfrun-host.rs

//! Host-side helper: `perfrun-host -o pidrunning -f <pid_file>`.
//!
//! Exits 0 when the process recorded in the pid file is running, 1 otherwise.

use std::path::Path;

use clap::Parser;
use tracing::debug;

use perfrun::cli::{HostArgs, HostOperation};
use perfrun::fs::RealFileSystem;
use perfrun::liveness::is_pid_running;
use perfrun::logging;

fn main() {
    let args = HostArgs::parse();
    if let Err(err) = logging::init_logging(None, None, None) {
        eprintln!("perfrun-host: {err:#}");
    }

    let ok = match args.operation {
        HostOperation::PidRunning => match args.pid_file.as_deref() {
            Some(path) => is_pid_running(&RealFileSystem, Path::new(path)),
            None => false,
        },
    };

    debug!(operation = ?args.operation, ok, "host operation finished");
    std::process::exit(if ok { 0 } else { 1 });
}

// src/monitor.rs

//! System and vendor monitor control.
//!
//! Monitors are instrumentation: a monitor that fails to start or stop is
//! logged and reported, never treated as a failure of the case.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error};

use crate::dispatch::{CommandOp, CommandSpec, DispatchResult, HostDispatcher};

/// Outcome of one start or stop round.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MonitorReport {
    pub system: DispatchResult,
    pub vendor: DispatchResult,
}

impl MonitorReport {
    pub fn is_success(&self) -> bool {
        self.system.is_success() && self.vendor.is_success()
    }
}

/// Starts and stops the monitors of a case on every host.
#[derive(Debug)]
pub struct MonitorController {
    dispatcher: Arc<HostDispatcher>,
    python: String,
    timeout: Duration,
}

impl MonitorController {
    pub fn new(dispatcher: Arc<HostDispatcher>, python: impl Into<String>, timeout: Duration) -> Self {
        Self {
            dispatcher,
            python: python.into(),
            timeout,
        }
    }

    pub async fn start(&self, host_root: &Path, case_log_dir: &Path, vendor: &str) -> MonitorReport {
        let log = case_log_dir.display();

        let system = self.system_spec(
            host_root,
            &format!("-v {vendor} -o restart -l {log}"),
        );
        debug!(cmd = %system.command, "starting system monitor");
        let system = self.dispatcher.dispatch(&system, false).await;
        if !system.is_success() {
            error!(failed = ?system, "hosts that can't start the system monitor");
        }

        let vendor_spec = self.vendor_spec(host_root, vendor, &format!("-o restart -l {log}"));
        debug!(cmd = %vendor_spec.command, "starting vendor monitor");
        let vendor = self.dispatcher.dispatch(&vendor_spec, false).await;
        if !vendor.is_success() {
            error!(failed = ?vendor, "hosts that can't start the vendor monitor");
        }

        MonitorReport { system, vendor }
    }

    pub async fn stop(&self, host_root: &Path, vendor: &str) -> MonitorReport {
        let system = self.system_spec(host_root, "-o stop");
        debug!(cmd = %system.command, "stopping system monitor");
        let system = self.dispatcher.dispatch(&system, false).await;
        if !system.is_success() {
            error!(failed = ?system, "hosts that can't stop the system monitor");
        }

        let vendor_spec = self.vendor_spec(host_root, vendor, "-o stop");
        debug!(cmd = %vendor_spec.command, "stopping vendor monitor");
        let vendor = self.dispatcher.dispatch(&vendor_spec, false).await;
        if !vendor.is_success() {
            error!(failed = ?vendor, "hosts that can't stop the vendor monitor");
        }

        MonitorReport { system, vendor }
    }

    /// `cd <root> && <python> ../utils/sys_monitor.py <args>`
    pub fn system_spec(&self, host_root: &Path, args: &str) -> CommandSpec {
        CommandSpec::new(format!(
            "cd {} && {} ../utils/sys_monitor.py {args}",
            host_root.display(),
            self.python
        ))
        .with_op(CommandOp::SysMonitor)
        .with_timeout(self.timeout)
    }

    /// `cd <root> && <python> <root>/vendors/<v>/<v>_monitor.py <args>`
    pub fn vendor_spec(&self, host_root: &Path, vendor: &str, args: &str) -> CommandSpec {
        CommandSpec::new(format!(
            "cd {} && {} {} {args}",
            host_root.display(),
            self.python,
            vendor_monitor_path(host_root, vendor).display()
        ))
        .with_timeout(self.timeout)
    }
}

/// `<root>/vendors/<vendor>/<vendor>_monitor.py`
pub fn vendor_monitor_path(host_root: &Path, vendor: &str) -> PathBuf {
    host_root
        .join("vendors")
        .join(vendor)
        .join(format!("{vendor}_monitor.py"))
}

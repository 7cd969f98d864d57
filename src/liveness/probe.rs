// src/liveness/probe.rs

//! Pid-file based liveness probes.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::dispatch::{CommandSpec, HostDispatcher, shell_quote};
use crate::exec::{NOT_EXECUTABLE_EXIT_CODE, NOT_FOUND_EXIT_CODE};
use crate::fs::FileSystem;

/// Default process table root.
pub const PROC_ROOT: &str = "/proc";

/// What a probe observed for a pid file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PidState {
    /// The pid file does not exist (yet, or any more).
    NoPidFile,
    /// The pid file exists but does not hold a pid.
    Unreadable,
    Running,
    Exited,
    /// The check itself could not run, e.g. the host helper is missing.
    Unknown,
}

impl PidState {
    pub fn is_running(self) -> bool {
        self == PidState::Running
    }
}

pub type ProbeFuture<'a> = Pin<Box<dyn Future<Output = PidState> + Send + 'a>>;

/// Observes whether the process behind a pid file is alive.
pub trait LivenessProbe: Send + Sync {
    fn probe<'a>(&'a self, pid_file: &'a Path) -> ProbeFuture<'a>;
}

/// Reads the pid file and looks the pid up in the process table of the
/// local machine.
#[derive(Debug, Clone)]
pub struct LocalProbe {
    fs: Arc<dyn FileSystem>,
    proc_root: PathBuf,
}

impl LocalProbe {
    pub fn new(fs: Arc<dyn FileSystem>) -> Self {
        Self {
            fs,
            proc_root: PathBuf::from(PROC_ROOT),
        }
    }

    /// Use a different process table root (tests point this at a fake tree).
    pub fn with_proc_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.proc_root = root.into();
        self
    }

    pub fn check(&self, pid_file: &Path) -> PidState {
        probe_pid_file(self.fs.as_ref(), &self.proc_root, pid_file)
    }
}

impl LivenessProbe for LocalProbe {
    fn probe<'a>(&'a self, pid_file: &'a Path) -> ProbeFuture<'a> {
        Box::pin(async move { self.check(pid_file) })
    }
}

/// Fail-closed liveness check against `/proc`.
///
/// Returns false when the pid file is missing or unparsable.
pub fn is_pid_running(fs: &dyn FileSystem, pid_file: &Path) -> bool {
    probe_pid_file(fs, Path::new(PROC_ROOT), pid_file).is_running()
}

fn probe_pid_file(fs: &dyn FileSystem, proc_root: &Path, pid_file: &Path) -> PidState {
    if !fs.exists(pid_file) {
        debug!(pid_file = %pid_file.display(), "pid file not found");
        return PidState::NoPidFile;
    }

    let pid = match fs.read_to_string(pid_file) {
        Ok(text) => match parse_pid(&text) {
            Some(pid) => pid,
            None => {
                warn!(pid_file = %pid_file.display(), "pid file does not contain a pid");
                return PidState::Unreadable;
            }
        },
        Err(err) => {
            warn!(pid_file = %pid_file.display(), error = %err, "cannot read pid file");
            return PidState::Unreadable;
        }
    };

    let cmdline = proc_root.join(pid.to_string()).join("cmdline");
    if fs.exists(&cmdline) {
        debug!(pid, "process is running");
        PidState::Running
    } else {
        debug!(pid, "process is not running");
        PidState::Exited
    }
}

fn parse_pid(text: &str) -> Option<u32> {
    text.lines().next()?.trim().parse().ok()
}

/// Probes the pid file on every host through the dispatcher.
///
/// The task counts as running while at least one host reports it running.
/// Requires the host-side helper (`perfrun-host`) on every host; a helper
/// that cannot be run yields [`PidState::Unknown`] rather than `Exited`.
#[derive(Debug)]
pub struct ClusterProbe {
    dispatcher: Arc<HostDispatcher>,
    host_helper: String,
    timeout: Duration,
}

impl ClusterProbe {
    pub fn new(dispatcher: Arc<HostDispatcher>, host_helper: impl Into<String>, timeout: Duration) -> Self {
        Self {
            dispatcher,
            host_helper: host_helper.into(),
            timeout,
        }
    }

    async fn check(&self, pid_file: &Path) -> PidState {
        // Failures are keyed by host, so repeated entries must count once.
        let hosts = self.dispatcher.hosts().distinct_len();
        let quoted = shell_quote(&pid_file.display().to_string());

        let exists = CommandSpec::new(format!("test -f {quoted}"))
            .with_timeout(self.timeout)
            .with_check(false);
        if self.dispatcher.dispatch(&exists, true).await.failed_count() >= hosts {
            return PidState::NoPidFile;
        }

        let running = CommandSpec::new(format!("{} -o pidrunning -f {quoted}", self.host_helper))
            .with_timeout(self.timeout)
            .with_check(false);
        let not_running = self.dispatcher.dispatch(&running, true).await;
        debug!(
            hosts,
            not_running = not_running.failed_count(),
            "cluster liveness probe"
        );
        if not_running.failed_count() < hosts {
            return PidState::Running;
        }

        let broken: Vec<(&str, i32)> = not_running
            .failed_hosts()
            .filter(|(_, code)| matches!(*code, NOT_EXECUTABLE_EXIT_CODE | NOT_FOUND_EXIT_CODE))
            .collect();
        if broken.is_empty() {
            PidState::Exited
        } else {
            warn!(helper = %self.host_helper, hosts = ?broken, "host helper cannot be run");
            PidState::Unknown
        }
    }
}

impl LivenessProbe for ClusterProbe {
    fn probe<'a>(&'a self, pid_file: &'a Path) -> ProbeFuture<'a> {
        Box::pin(self.check(pid_file))
    }
}

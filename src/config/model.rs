// src/config/model.rs

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::orchestrator::CaseDescriptor;

/// Default marker the benchmark prints in front of its result lines.
pub const DEFAULT_RESULT_MARKER: &str = "FlagPerf Result";

/// Configuration as read from the TOML file, before validation.
///
/// ```toml
/// vendor = "nvidia"
/// deploy_path = "/opt/perf/operation"
/// log_path = "result"
/// hosts = ["127.0.0.1"]
///
/// [cases]
/// "mm:FP32:312:nativetorch:A100" = {}
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct RawConfig {
    pub vendor: String,

    /// Deployment root on every host.
    pub deploy_path: PathBuf,

    /// Log root, relative to `deploy_path` unless absolute.
    pub log_path: PathBuf,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default = "default_nproc_per_node")]
    pub nproc_per_node: u32,

    /// Device list exported as `CUDA_VISIBLE_DEVICES` for vendors that need it.
    #[serde(default)]
    pub device: Option<String>,

    #[serde(default = "default_hosts")]
    pub hosts: Vec<String>,

    /// If `None`, `EXEC_IN_CONTAINER` decides.
    #[serde(default)]
    pub exec_in_container: Option<bool>,

    #[serde(default = "default_python")]
    pub python: String,

    /// Host-side helper invoked for remote liveness checks.
    #[serde(default = "default_host_helper")]
    pub host_helper: String,

    #[serde(default = "default_result_marker")]
    pub result_marker: String,

    #[serde(default = "default_system_series")]
    pub system_series: Vec<String>,

    #[serde(default = "default_true")]
    pub collect_remote_logs: bool,

    #[serde(default)]
    pub ssh: SshSection,

    #[serde(default)]
    pub timeouts: TimeoutSection,

    /// Case identifier -> case-specific settings.
    ///
    /// Kept as a raw value so a non-table `cases` is reported as "no valid
    /// cases" rather than a parse error.
    #[serde(default)]
    pub cases: Option<toml::Value>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_nproc_per_node() -> u32 {
    1
}

fn default_hosts() -> Vec<String> {
    vec!["127.0.0.1".to_string()]
}

fn default_python() -> String {
    "python3".to_string()
}

fn default_host_helper() -> String {
    "perfrun-host".to_string()
}

fn default_result_marker() -> String {
    DEFAULT_RESULT_MARKER.to_string()
}

fn default_system_series() -> Vec<String> {
    vec!["mem".to_string()]
}

fn default_true() -> bool {
    true
}

/// `[ssh]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct SshSection {
    #[serde(default = "default_ssh_port")]
    pub port: u16,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

fn default_ssh_port() -> u16 {
    22
}

fn default_connect_timeout() -> u64 {
    10
}

impl Default for SshSection {
    fn default() -> Self {
        Self {
            port: default_ssh_port(),
            connect_timeout_secs: default_connect_timeout(),
        }
    }
}

/// `[timeouts]` section, all values in seconds.
#[derive(Debug, Clone, Deserialize)]
pub struct TimeoutSection {
    #[serde(default = "default_monitor_secs")]
    pub monitor_secs: u64,

    #[serde(default = "default_launch_secs")]
    pub launch_secs: u64,

    #[serde(default = "default_ten")]
    pub launch_grace_secs: u64,

    #[serde(default = "default_ten")]
    pub poll_interval_secs: u64,

    /// 0 waits forever for the task to finish.
    #[serde(default)]
    pub task_secs: u64,

    #[serde(default = "default_ten")]
    pub probe_secs: u64,

    #[serde(default = "default_collect_secs")]
    pub collect_secs: u64,
}

fn default_monitor_secs() -> u64 {
    60
}

fn default_launch_secs() -> u64 {
    15
}

fn default_ten() -> u64 {
    10
}

fn default_collect_secs() -> u64 {
    600
}

impl Default for TimeoutSection {
    fn default() -> Self {
        Self {
            monitor_secs: default_monitor_secs(),
            launch_secs: default_launch_secs(),
            launch_grace_secs: default_ten(),
            poll_interval_secs: default_ten(),
            task_secs: 0,
            probe_secs: default_ten(),
            collect_secs: default_collect_secs(),
        }
    }
}

/// Resolved durations used by the orchestrator and its collaborators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub monitor: Duration,
    pub launch: Duration,
    pub launch_grace: Duration,
    pub poll_interval: Duration,
    pub task: Option<Duration>,
    pub probe: Duration,
    pub collect: Duration,
}

impl From<&TimeoutSection> for Timeouts {
    fn from(t: &TimeoutSection) -> Self {
        Self {
            monitor: Duration::from_secs(t.monitor_secs),
            launch: Duration::from_secs(t.launch_secs),
            launch_grace: Duration::from_secs(t.launch_grace_secs),
            poll_interval: Duration::from_secs(t.poll_interval_secs),
            task: (t.task_secs > 0).then(|| Duration::from_secs(t.task_secs)),
            probe: Duration::from_secs(t.probe_secs),
            collect: Duration::from_secs(t.collect_secs),
        }
    }
}

impl Default for Timeouts {
    fn default() -> Self {
        Timeouts::from(&TimeoutSection::default())
    }
}

/// Validated configuration.
///
/// Built from [`RawConfig`] via `TryFrom`, which parses every case
/// descriptor up front so a malformed case never reaches dispatch.
#[derive(Debug, Clone)]
pub struct Config {
    pub vendor: String,
    pub deploy_path: PathBuf,
    pub log_path: PathBuf,
    pub log_level: String,
    pub nproc_per_node: u32,
    pub device: Option<String>,
    pub hosts: Vec<String>,
    pub exec_in_container: Option<bool>,
    pub python: String,
    pub host_helper: String,
    pub result_marker: String,
    pub system_series: Vec<String>,
    pub collect_remote_logs: bool,
    pub ssh: SshSection,
    pub timeouts: Timeouts,
    pub cases: Vec<CaseDescriptor>,
}

impl Config {
    pub(crate) fn new_unchecked(raw: RawConfig, cases: Vec<CaseDescriptor>) -> Self {
        let timeouts = Timeouts::from(&raw.timeouts);
        Self {
            vendor: raw.vendor,
            deploy_path: raw.deploy_path,
            log_path: raw.log_path,
            log_level: raw.log_level,
            nproc_per_node: raw.nproc_per_node,
            device: raw.device,
            hosts: raw.hosts,
            exec_in_container: raw.exec_in_container,
            python: raw.python,
            host_helper: raw.host_helper,
            result_marker: raw.result_marker,
            system_series: raw.system_series,
            collect_remote_logs: raw.collect_remote_logs,
            ssh: raw.ssh,
            timeouts,
            cases,
        }
    }

    /// Case identifiers in configuration order.
    pub fn case_names(&self) -> Vec<String> {
        self.cases.iter().map(|c| c.to_string()).collect()
    }
}

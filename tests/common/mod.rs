#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use perfrun::config::Config;
use perfrun::dispatch::HostDispatcher;
use perfrun::fs::FileSystem;
use perfrun::fs::mock::MockFileSystem;
use perfrun::liveness::{LivenessPoller, LivenessProbe};
use perfrun::monitor::MonitorController;
use perfrun::orchestrator::{CaseOrchestrator, LaunchSettings, RunLayout, TaskLauncher};
use perfrun::types::{ExecutionContext, HostList};

pub use perfrun_test_utils::builders::{ConfigBuilder, fast_timeouts};
pub use perfrun_test_utils::{FakeProbe, FakeRunner, LogCapture, init_tracing, with_timeout};

pub const DEPLOY: &str = "/opt/perf";
pub const RUN_DIR: &str = "/opt/perf/result/run20240101000000";
pub const CASE: &str = "mm:FP32:312:nativetorch:A100";

pub fn dispatcher(runner: &FakeRunner, hosts: &[&str], in_container: bool) -> Arc<HostDispatcher> {
    Arc::new(HostDispatcher::new(
        Arc::new(runner.clone()),
        HostList::new(hosts.iter().map(|h| h.to_string()).collect()),
        ExecutionContext::new(in_container),
    ))
}

/// Orchestrator over fakes: commands go to `runner`, liveness answers come
/// from `probe`, files live in `fs`.
pub fn orchestrator(
    cfg: &Config,
    runner: &FakeRunner,
    probe: Arc<dyn LivenessProbe>,
    fs: &MockFileSystem,
    task_timeout: Option<Duration>,
) -> CaseOrchestrator {
    let hosts: Vec<&str> = cfg.hosts.iter().map(String::as_str).collect();
    let dispatcher = dispatcher(runner, &hosts, false);
    let timeouts = fast_timeouts(task_timeout);
    let fs: Arc<dyn FileSystem> = Arc::new(fs.clone());

    CaseOrchestrator::new(
        Arc::clone(&dispatcher),
        MonitorController::new(Arc::clone(&dispatcher), cfg.python.clone(), timeouts.monitor),
        TaskLauncher::new(Arc::clone(&fs), LaunchSettings::from_config(cfg)),
        LivenessPoller::new(probe, timeouts.poll_interval).with_timeout(timeouts.task),
        fs,
        RunLayout {
            deploy_path: PathBuf::from(DEPLOY),
            run_dir: PathBuf::from(RUN_DIR),
        },
        timeouts,
    )
}

/// Monitor logs and benchmark output for one case, as the task would leave them.
pub fn seed_case_logs(fs: &MockFileSystem, case: &str) {
    seed_logs_in(fs, &format!("{RUN_DIR}/{case}"));
}

/// The same logs as copied back from a remote host.
pub fn seed_remote_case_logs(fs: &MockFileSystem, host: &str, case: &str) {
    seed_logs_in(fs, &format!("{RUN_DIR}/hosts/{host}/{case}"));
}

fn seed_logs_in(fs: &MockFileSystem, dir: &str) {
    fs.add_file(format!("{dir}/nvidia_monitor.log"), "t0 250W\nt1 260W\n");
    fs.add_file(format!("{dir}/mem_monitor.log"), "t0\t0.25\nt1\t0.5\n");
    fs.add_file(
        format!("{dir}/operation.log.txt"),
        "[FlagPerf Result] tflops=312\n",
    );
}

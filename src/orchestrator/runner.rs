// src/orchestrator/runner.rs

//! Drives every case through its lifecycle.
//!
//! Cases run strictly one after another. A degraded stage (monitor failure,
//! failed launch on a host) is recorded on the case and the case moves on;
//! only a task that never finishes within the configured timeout leaves a
//! case short of `MonitorsStopped`. Such a case is still collected, but it
//! never reaches `Collected`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local};
use tracing::{error, info, warn};

use crate::collect::{HostResults, REMOTE_LOGS_DIR, ResultCollector};
use crate::config::{Config, Timeouts};
use crate::dispatch::{CommandSpec, DispatchResult, HostDispatcher, SshOptions, shell_quote};
use crate::errors::Result;
use crate::exec::CommandRunner;
use crate::fs::FileSystem;
use crate::liveness::{ClusterProbe, LivenessPoller, LivenessProbe, LocalProbe, WaitOutcome};
use crate::monitor::{MonitorController, MonitorReport};
use crate::types::{ExecutionContext, HostList, is_local_host};

use super::launch::{LaunchSettings, TaskLauncher, pid_file};
use super::record::{CaseRecord, CaseStatus, RunRecord};

/// Written into the run directory at the end of a run.
pub const DETAIL_RESULT_FILE: &str = "detail_result.json";
pub const RUN_RECORD_FILE: &str = "run_record.json";

/// `run%Y%m%d%H%M%S`
pub fn run_dir_name(now: DateTime<Local>) -> String {
    now.format("run%Y%m%d%H%M%S").to_string()
}

/// Where a run lives on every host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunLayout {
    pub deploy_path: PathBuf,
    pub run_dir: PathBuf,
}

impl RunLayout {
    pub fn case_dir(&self, case: &impl std::fmt::Display) -> PathBuf {
        self.run_dir.join(case.to_string())
    }
}

/// Start the composite command in the background so dispatch returns at once.
pub fn detached(command: &str) -> String {
    format!("nohup bash -c {} > /dev/null 2>&1 &", shell_quote(command))
}

/// The case state machine, wired to its collaborators.
#[derive(Debug)]
pub struct CaseOrchestrator {
    dispatcher: Arc<HostDispatcher>,
    monitors: MonitorController,
    launcher: TaskLauncher,
    poller: LivenessPoller,
    fs: Arc<dyn FileSystem>,
    layout: RunLayout,
    timeouts: Timeouts,
}

impl CaseOrchestrator {
    pub fn new(
        dispatcher: Arc<HostDispatcher>,
        monitors: MonitorController,
        launcher: TaskLauncher,
        poller: LivenessPoller,
        fs: Arc<dyn FileSystem>,
        layout: RunLayout,
        timeouts: Timeouts,
    ) -> Self {
        Self {
            dispatcher,
            monitors,
            launcher,
            poller,
            fs,
            layout,
            timeouts,
        }
    }

    /// Production wiring: one dispatcher shared by monitors and the
    /// cluster liveness probe. When every host is the local machine the pid
    /// file is checked in-process instead.
    ///
    /// `cfg.deploy_path` is expected to be absolute already.
    pub fn from_config(
        cfg: &Config,
        run_dir: PathBuf,
        runner: Arc<dyn CommandRunner>,
        fs: Arc<dyn FileSystem>,
    ) -> Self {
        let context = ExecutionContext::resolve(cfg.exec_in_container);
        let dispatcher = Arc::new(
            HostDispatcher::new(runner, HostList::new(cfg.hosts.clone()), context)
                .with_ssh(SshOptions::from(&cfg.ssh)),
        );
        let t = cfg.timeouts;

        let monitors = MonitorController::new(Arc::clone(&dispatcher), cfg.python.clone(), t.monitor);
        let launcher = TaskLauncher::new(Arc::clone(&fs), LaunchSettings::from_config(cfg));
        let probe: Arc<dyn LivenessProbe> = if dispatcher.hosts().iter().all(is_local_host) {
            Arc::new(LocalProbe::new(Arc::clone(&fs)))
        } else {
            Arc::new(ClusterProbe::new(Arc::clone(&dispatcher), cfg.host_helper.clone(), t.probe))
        };
        let poller = LivenessPoller::new(probe, t.poll_interval).with_timeout(t.task);
        let layout = RunLayout {
            deploy_path: cfg.deploy_path.clone(),
            run_dir,
        };

        Self::new(dispatcher, monitors, launcher, poller, fs, layout, t)
    }

    pub fn dispatcher(&self) -> &HostDispatcher {
        &self.dispatcher
    }

    pub fn layout(&self) -> &RunLayout {
        &self.layout
    }

    pub fn launcher(&self) -> &TaskLauncher {
        &self.launcher
    }

    pub fn monitors(&self) -> &MonitorController {
        &self.monitors
    }

    fn vendor(&self) -> &str {
        &self.launcher.settings().vendor
    }

    /// Run every case of the record in order.
    pub async fn run_all(&self, record: &mut RunRecord) {
        for case in record.cases.iter_mut() {
            info!("======= Testcase: {} =======", case.case);
            self.run_case(case).await;
        }
    }

    /// Monitors, launch, wait, stop monitors.
    pub async fn run_case(&self, rec: &mut CaseRecord) {
        let case_dir = self.layout.case_dir(&rec.case);
        info!(case = %rec.case, "-== Testcase starts ==-");

        info!("1) Start monitor in the host...");
        let report = self
            .monitors
            .start(&self.layout.deploy_path, &case_dir, self.vendor())
            .await;
        note_monitor_failures(rec, CaseStatus::MonitorsStarted, "start", &report);
        advance(rec, CaseStatus::MonitorsStarted);

        info!("2) Start tasks in the host...");
        let launch = self.launch(rec, &case_dir).await;
        if !launch.is_success() {
            warn!(case = %rec.case, failed = %describe(&launch), "launch failed on some hosts");
            rec.fail(
                CaseStatus::TaskLaunched,
                format!("launch failed on {}", describe(&launch)),
            );
        }
        advance(rec, CaseStatus::TaskLaunched);
        // The task writes its pid file shortly after start.
        tokio::time::sleep(self.timeouts.launch_grace).await;

        info!("3) Waiting for tasks end in the host...");
        match self.poller.wait_until_finished(&pid_file(&case_dir)).await {
            WaitOutcome::Finished { .. } => advance(rec, CaseStatus::TaskFinished),
            WaitOutcome::TimedOut { elapsed } => {
                error!(case = %rec.case, elapsed_secs = elapsed.as_secs(), "task did not finish; giving up on case");
                rec.fail(
                    CaseStatus::TaskLaunched,
                    format!("task did not finish within {}s", elapsed.as_secs()),
                );
            }
        }

        info!("4) Stop monitor in the host...");
        let report = self.monitors.stop(&self.layout.deploy_path, self.vendor()).await;
        note_monitor_failures(rec, CaseStatus::MonitorsStopped, "stop", &report);
        if rec.status == CaseStatus::TaskFinished {
            advance(rec, CaseStatus::MonitorsStopped);
        } else {
            warn!(case = %rec.case, status = %rec.status, "case left unfinished");
        }

        info!(case = %rec.case, status = %rec.status, "-== Testcase finished ==-");
    }

    async fn launch(&self, rec: &CaseRecord, case_dir: &Path) -> DispatchResult {
        let command = self.launcher.command(&rec.case, case_dir);
        info!(cmd = %command, "Run cmd in the host to start tasks");
        let spec = CommandSpec::new(detached(&command))
            .with_timeout(self.timeouts.launch)
            .with_check(false);
        self.dispatcher.dispatch(&spec, false).await
    }

    /// Copy the run directory of every remote host into `<run_dir>/hosts`.
    pub async fn collect_remote_logs(&self) -> DispatchResult {
        if self.dispatcher.hosts().iter().all(is_local_host) {
            return DispatchResult::new();
        }
        let local = self.layout.run_dir.join(REMOTE_LOGS_DIR);
        let failed = self
            .dispatcher
            .collect_files(
                self.fs.as_ref(),
                &self.layout.run_dir,
                &local,
                self.timeouts.collect,
            )
            .await;
        if !failed.is_success() {
            warn!(failed = %describe(&failed), "could not collect logs from some hosts");
        }
        failed
    }

    /// Collect every case whose task was launched.
    ///
    /// Only cases that completed their lifecycle move on to `Collected`; the
    /// logs of a timed-out case are read as they are and its status is kept.
    pub fn collect(
        &self,
        record: &mut RunRecord,
        collector: &ResultCollector,
    ) -> BTreeMap<String, HostResults> {
        let complete = record.collectable();
        for rec in record.cases.iter().filter(|r| r.status < CaseStatus::TaskLaunched) {
            warn!(case = %rec.case, status = %rec.status, "skipping collection for case that never launched");
        }

        let mut results = BTreeMap::new();
        for index in record.launched() {
            let Some(rec) = record.case_mut(index) else {
                continue;
            };
            let finished = complete.contains(&index);
            if !finished {
                warn!(case = %rec.case, status = %rec.status, "collecting logs of unfinished case");
            }

            let id = rec.case.to_string();
            let hosts = collector.collect_case(&id);
            let stage = if finished { CaseStatus::Collected } else { rec.status };
            for (host, result) in &hosts {
                for err in &result.errors {
                    rec.fail(stage, format!("{host}: {err}"));
                }
            }
            if finished {
                advance(rec, CaseStatus::Collected);
            }
            results.insert(id, hosts);
        }
        results
    }

    /// Write `run_record.json` into the run directory.
    pub fn persist_record(&self, record: &RunRecord) -> Result<PathBuf> {
        let path = self.layout.run_dir.join(RUN_RECORD_FILE);
        self.fs.write(&path, &serde_json::to_vec_pretty(record)?)?;
        Ok(path)
    }

    /// Write `detail_result.json` into the run directory.
    pub fn persist_results(&self, results: &BTreeMap<String, HostResults>) -> Result<PathBuf> {
        let path = self.layout.run_dir.join(DETAIL_RESULT_FILE);
        self.fs.write(&path, &serde_json::to_vec(results)?)?;
        Ok(path)
    }

    /// Grace delay after launch.
    pub fn launch_grace(&self) -> Duration {
        self.timeouts.launch_grace
    }
}

fn advance(rec: &mut CaseRecord, to: CaseStatus) {
    if let Err(err) = rec.advance(to) {
        error!(case = %rec.case, error = %err, "case state machine rejected transition");
    }
}

fn note_monitor_failures(rec: &mut CaseRecord, stage: CaseStatus, verb: &str, report: &MonitorReport) {
    if !report.system.is_success() {
        rec.fail(
            stage,
            format!("system monitor {verb} failed on {}", describe(&report.system)),
        );
    }
    if !report.vendor.is_success() {
        rec.fail(
            stage,
            format!("vendor monitor {verb} failed on {}", describe(&report.vendor)),
        );
    }
}

/// `h1=1,h3=124`
fn describe(result: &DispatchResult) -> String {
    result
        .failed_hosts()
        .map(|(host, code)| format!("{host}={code}"))
        .collect::<Vec<_>>()
        .join(",")
}

// tests/orchestrator_lifecycle.rs

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::*;
use perfrun::fs::mock::MockFileSystem;
use perfrun::liveness::ClusterProbe;
use perfrun::orchestrator::{CaseStatus, RunRecord};
use perfrun::collect::ResultCollector;

fn position(calls: &[String], needle: &str) -> usize {
    calls
        .iter()
        .position(|c| c.contains(needle))
        .unwrap_or_else(|| panic!("no call containing {needle:?} in {calls:#?}"))
}

#[tokio::test]
async fn monitor_failures_do_not_stop_the_case() {
    init_tracing();

    let cfg = ConfigBuilder::new().case(CASE).build();
    let runner = FakeRunner::new().fail_when(&["sys_monitor.py"], 1);
    let fs = MockFileSystem::new();
    let orch = orchestrator(&cfg, &runner, Arc::new(FakeProbe::finishes_after(2)), &fs, None);

    let mut record = RunRecord::new(RUN_DIR, &cfg.cases);
    with_timeout(orch.run_all(&mut record)).await;

    let case = &record.cases[0];
    assert_eq!(
        case.history,
        vec![
            CaseStatus::Pending,
            CaseStatus::MonitorsStarted,
            CaseStatus::TaskLaunched,
            CaseStatus::TaskFinished,
            CaseStatus::MonitorsStopped,
        ]
    );
    let stages: Vec<CaseStatus> = case.failures.iter().map(|f| f.stage).collect();
    assert_eq!(stages, vec![CaseStatus::MonitorsStarted, CaseStatus::MonitorsStopped]);
    assert!(case.failures[0].message.contains("system monitor start failed"));

    let calls = runner.calls();
    let start = position(&calls, "-o restart");
    let launch = position(&calls, "nohup bash -c");
    let stop = position(&calls, "-o stop");
    assert!(start < launch && launch < stop);
}

#[tokio::test]
async fn launch_command_carries_case_and_log_dir() {
    init_tracing();

    let cfg = ConfigBuilder::new().case(CASE).build();
    let runner = FakeRunner::new();
    let fs = MockFileSystem::new();
    let orch = orchestrator(&cfg, &runner, Arc::new(FakeProbe::finishes_after(0)), &fs, None);

    let mut record = RunRecord::new(RUN_DIR, &cfg.cases);
    with_timeout(orch.run_all(&mut record)).await;

    let launches = runner.calls_containing("host_main.py");
    assert_eq!(launches.len(), 1);
    let launch = &launches[0];
    assert!(launch.starts_with("nohup bash -c "));
    assert!(launch.contains(&format!("--case_name {CASE}")));
    assert!(launch.contains(&format!("--log_dir {RUN_DIR}/{CASE}")));
    assert!(launch.contains(&format!("> {RUN_DIR}/{CASE}/host_main.log.txt 2>&1")));
}

/// Two remote hosts, the system monitor fails to start on the first one and
/// the task never writes its pid file.
#[tokio::test]
async fn task_that_never_starts_times_out_and_still_stops_monitors() {
    init_tracing();

    let cfg = ConfigBuilder::new()
        .hosts(&["node-a", "node-b"])
        .case(CASE)
        .build();
    let runner = FakeRunner::new()
        .fail_when(&["node-a", "sys_monitor.py", "restart"], 1)
        .fail_when(&["test -f"], 1);
    let fs = MockFileSystem::new();
    let probe = ClusterProbe::new(
        dispatcher(&runner, &["node-a", "node-b"], false),
        "perfrun-host",
        Duration::from_millis(100),
    );
    let orch = orchestrator(&cfg, &runner, Arc::new(probe), &fs, Some(Duration::from_millis(30)));

    let mut record = RunRecord::new(RUN_DIR, &cfg.cases);
    with_timeout(orch.run_all(&mut record)).await;

    let case = &record.cases[0];
    assert_eq!(case.status, CaseStatus::TaskLaunched);
    assert!(case.finished_at.is_none());
    let messages: Vec<&str> = case.failures.iter().map(|f| f.message.as_str()).collect();
    assert!(messages.iter().any(|m| *m == "system monitor start failed on node-a=1"));
    assert!(messages.iter().any(|m| m.starts_with("task did not finish within")));

    // One launch per host, monitors stopped on both hosts as cleanup.
    assert_eq!(runner.calls_containing("nohup bash -c").len(), 2);
    assert_eq!(runner.calls_containing("-o stop").len(), 4);
    assert!(runner.calls_containing("-o pidrunning").is_empty());

    // Whatever a timed-out case left behind is still collected, but the case
    // does not advance.
    seed_remote_case_logs(&fs, "node-a", CASE);
    let collector = ResultCollector::from_config(&cfg, Arc::new(fs.clone()), RUN_DIR);
    let results = orch.collect(&mut record, &collector);
    assert_eq!(results[CASE]["node-a"].benchmark, vec!["[FlagPerf Result] tflops=312"]);
    assert_eq!(results[CASE]["node-b"].errors.len(), 3);
    let case = &record.cases[0];
    assert_eq!(case.status, CaseStatus::TaskLaunched);
    assert!(
        case.failures
            .iter()
            .any(|f| f.stage == CaseStatus::TaskLaunched && f.message.starts_with("node-b: "))
    );
}

#[tokio::test]
async fn timed_out_case_does_not_block_the_next_one() {
    init_tracing();

    let first = "a:b:c:d:e";
    let second = "f:b:c:d:e";
    let cfg = ConfigBuilder::new().case(first).case(second).build();
    let runner = FakeRunner::new()
        .fail_when(&["test -f", "a:b:c:d:e/start_base_task.pid"], 1)
        .fail_when(&["-o pidrunning"], 1);
    let fs = MockFileSystem::new();
    let probe = ClusterProbe::new(
        dispatcher(&runner, &["127.0.0.1"], false),
        "perfrun-host",
        Duration::from_millis(100),
    );
    let orch = orchestrator(&cfg, &runner, Arc::new(probe), &fs, Some(Duration::from_millis(20)));

    let mut record = RunRecord::new(RUN_DIR, &cfg.cases);
    with_timeout(orch.run_all(&mut record)).await;

    assert_eq!(record.cases[0].status, CaseStatus::TaskLaunched);
    assert_eq!(record.cases[1].status, CaseStatus::MonitorsStopped);
    assert_eq!(record.collectable(), vec![1]);
}

#[tokio::test]
async fn finished_cases_are_collected_and_persisted() {
    init_tracing();

    let cfg = ConfigBuilder::new().case(CASE).build();
    let runner = FakeRunner::new();
    let fs = MockFileSystem::new();
    seed_case_logs(&fs, CASE);
    let orch = orchestrator(&cfg, &runner, Arc::new(FakeProbe::finishes_after(1)), &fs, None);

    let mut record = RunRecord::new(RUN_DIR, &cfg.cases);
    with_timeout(orch.run_all(&mut record)).await;

    let collector = ResultCollector::from_config(&cfg, Arc::new(fs.clone()), RUN_DIR);
    let results = orch.collect(&mut record, &collector);
    assert_eq!(record.cases[0].status, CaseStatus::Collected);
    assert_eq!(results[CASE]["127.0.0.1"].system["mem"], vec![0.25, 0.5]);

    orch.persist_results(&results).unwrap();
    orch.persist_record(&record).unwrap();

    let detail = fs.contents(format!("{RUN_DIR}/detail_result.json")).unwrap();
    assert!(detail.contains("tflops=312"));
    let saved: serde_json::Value =
        serde_json::from_str(&fs.contents(format!("{RUN_DIR}/run_record.json")).unwrap()).unwrap();
    assert_eq!(saved["cases"][0]["case"], CASE);
    assert_eq!(saved["cases"][0]["status"], "collected");
}

#[tokio::test]
async fn failed_launch_is_logged() {
    let logs = LogCapture::new();
    let _guard = logs.install();

    let cfg = ConfigBuilder::new().case(CASE).build();
    let runner = FakeRunner::new().fail_when(&["nohup bash -c"], 255);
    let fs = MockFileSystem::new();
    let orch = orchestrator(&cfg, &runner, Arc::new(FakeProbe::finishes_after(0)), &fs, None);

    let mut record = RunRecord::new(RUN_DIR, &cfg.cases);
    with_timeout(orch.run_all(&mut record)).await;

    let warnings = logs.lines_at("WARN");
    assert!(
        warnings
            .iter()
            .any(|l| l.contains("launch failed on some hosts") && l.contains("127.0.0.1=255")),
        "{}",
        logs.contents()
    );
    assert_eq!(record.cases[0].failures[0].message, "launch failed on 127.0.0.1=255");
}

/// Only local hosts: the pid file is checked in-process, no helper calls.
#[tokio::test]
async fn full_run_over_fakes() {
    init_tracing();

    let mut cfg = ConfigBuilder::new().case(CASE).build();
    cfg.timeouts = fast_timeouts(Some(Duration::from_secs(2)));
    let runner = FakeRunner::new();
    let fs = MockFileSystem::new();
    seed_case_logs(&fs, CASE);
    // No process 4242 in the mock process table, so the task has exited.
    fs.add_file(format!("{RUN_DIR}/{CASE}/start_base_task.pid"), "4242\n");

    with_timeout(perfrun::run_with(
        &cfg,
        RUN_DIR.into(),
        Arc::new(runner.clone()),
        Arc::new(fs.clone()),
    ))
    .await
    .unwrap();

    // Healthcheck first, then the case.
    assert_eq!(runner.calls()[0], ":");
    assert!(runner.calls_containing("-o pidrunning").is_empty());
    assert!(runner.calls_containing("test -f").is_empty());
    let saved = fs.contents(format!("{RUN_DIR}/run_record.json")).unwrap();
    assert!(saved.contains("\"collected\""));
    assert!(fs.contents(format!("{RUN_DIR}/detail_result.json")).is_some());
}

/// A remote host: logs are read from the copy under `hosts/<host>`.
#[tokio::test]
async fn remote_run_collects_copied_logs() {
    init_tracing();

    let mut cfg = ConfigBuilder::new().hosts(&["node-a"]).case(CASE).build();
    cfg.timeouts = fast_timeouts(Some(Duration::from_secs(2)));
    let runner = FakeRunner::new().fail_when(&["-o pidrunning"], 1);
    let fs = MockFileSystem::new();
    seed_remote_case_logs(&fs, "node-a", CASE);

    with_timeout(perfrun::run_with(
        &cfg,
        RUN_DIR.into(),
        Arc::new(runner.clone()),
        Arc::new(fs.clone()),
    ))
    .await
    .unwrap();

    assert_eq!(runner.calls_containing("scp -r").len(), 1);
    let detail: serde_json::Value =
        serde_json::from_str(&fs.contents(format!("{RUN_DIR}/detail_result.json")).unwrap()).unwrap();
    assert_eq!(
        detail[CASE]["node-a"]["benchmark"][0],
        "[FlagPerf Result] tflops=312"
    );
    assert!(detail[CASE]["node-a"].get("errors").is_none());
    let saved = fs.contents(format!("{RUN_DIR}/run_record.json")).unwrap();
    assert!(saved.contains("\"collected\""));
}

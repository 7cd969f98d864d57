// src/lib.rs

pub mod cli;
pub mod collect;
pub mod config;
pub mod dispatch;
pub mod errors;
pub mod exec;
pub mod fs;
pub mod liveness;
pub mod logging;
pub mod monitor;
pub mod orchestrator;
pub mod types;

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Local;
use tracing::{error, info, warn};

use crate::cli::CliArgs;
use crate::collect::{ResultCollector, log_summary};
use crate::config::{Config, RawConfig, load_from_path};
use crate::errors::{PerfrunError, Result};
use crate::exec::{CommandRunner, ShellRunner};
use crate::fs::{FileSystem, RealFileSystem};
use crate::orchestrator::{CaseOrchestrator, RunRecord, detached, pid_file, run_dir_name};

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading and the run directory
/// - logging to stderr and `<run_dir>/perfrun_run.log`
/// - the shell runner and host dispatcher
/// - the case orchestrator, raced against Ctrl-C
/// - result collection
pub async fn run(args: CliArgs) -> Result<()> {
    let raw = load_from_path(&args.config)?;
    let deploy_path = std::path::absolute(&raw.deploy_path)?;
    let run_dir = run_dir_for(&deploy_path, &raw.log_path);

    let log_file = (!args.dry_run).then(|| run_dir.join(logging::RUN_LOG_FILE));
    logging::init_logging(args.log_level, Some(raw.log_level.as_str()), log_file.as_deref())?;

    let cfg = validate(raw, deploy_path)?;

    if args.dry_run {
        print_dry_run(&cfg, &run_dir);
        return Ok(());
    }

    let runner: Arc<dyn CommandRunner> = Arc::new(ShellRunner::new());
    let fs: Arc<dyn FileSystem> = Arc::new(RealFileSystem);
    run_with(&cfg, run_dir, runner, fs).await
}

/// Run every configured case with the given collaborators.
///
/// `cfg.deploy_path` must be absolute; `run_dir` receives every artifact.
pub async fn run_with(
    cfg: &Config,
    run_dir: PathBuf,
    runner: Arc<dyn CommandRunner>,
    fs: Arc<dyn FileSystem>,
) -> Result<()> {
    info!("======== Step 1: Check configs. ========");
    info!(run_dir = %run_dir.display(), "Initialize logger...[SUCCESS]");

    let orchestrator = CaseOrchestrator::from_config(cfg, run_dir.clone(), runner, Arc::clone(&fs));
    let dispatcher = orchestrator.dispatcher();
    info!(
        hosts = %dispatcher.hosts(),
        in_container = dispatcher.context().in_container,
        "execution context"
    );

    let unreachable = dispatcher.healthcheck().await;
    if unreachable.is_success() {
        info!("Check hosts in the cluster...[SUCCESS]");
    } else {
        let hosts: Vec<&str> = unreachable.failed_hosts().map(|(h, _)| h).collect();
        error!(?hosts, "Check hosts in the cluster...[FAILED]");
    }

    log_test_configs(cfg, &run_dir);

    info!("========= Step 2: Prepare and Run test cases. =========");
    let mut record = RunRecord::new(&run_dir, &cfg.cases);
    let interrupted = tokio::select! {
        _ = orchestrator.run_all(&mut record) => false,
        _ = wait_for_interrupt(tokio::signal::ctrl_c()) => true,
    };
    if interrupted {
        warn!("interrupted; saving partial run record");
        orchestrator.persist_record(&record)?;
        return Err(PerfrunError::Interrupted);
    }

    info!("========= Step 3: Collect logs in the cluster. =========");
    if cfg.collect_remote_logs {
        orchestrator.collect_remote_logs().await;
    }
    let collector = ResultCollector::from_config(cfg, Arc::clone(&fs), &run_dir);
    let results = orchestrator.collect(&mut record, &collector);
    let detail = orchestrator.persist_results(&results)?;
    let saved = orchestrator.persist_record(&record)?;
    info!(
        detail = %detail.display(),
        record = %saved.display(),
        "results saved"
    );

    log_summary(&results);

    let degraded = record.cases.iter().filter(|c| c.is_degraded()).count();
    info!(
        cases = record.cases.len(),
        collected = results.len(),
        degraded,
        "run finished"
    );
    Ok(())
}

/// Resolves once the interrupt signal arrives.
///
/// If the handler cannot be installed the run goes on without one.
async fn wait_for_interrupt(signal: impl Future<Output = std::io::Result<()>>) {
    match signal.await {
        Ok(()) => {}
        Err(err) => {
            error!(error = %err, "cannot listen for Ctrl-C; running without interrupt handling");
            std::future::pending::<()>().await;
        }
    }
}

/// `<deploy_path>/<log_path>/run<timestamp>`; an absolute `log_path` is used as is.
pub fn run_dir_for(deploy_path: &Path, log_path: &Path) -> PathBuf {
    deploy_path.join(log_path).join(run_dir_name(Local::now()))
}

fn validate(raw: RawConfig, deploy_path: PathBuf) -> Result<Config> {
    match Config::try_from(raw) {
        Ok(mut cfg) => {
            cfg.deploy_path = deploy_path;
            Ok(cfg)
        }
        Err(err) => {
            error!(error = %err, "invalid configuration");
            Err(err)
        }
    }
}

fn log_test_configs(cfg: &Config, run_dir: &Path) {
    info!("{}", "-".repeat(60));
    info!("Prepare to run benchmarks with configs:");
    info!("Deploy path on host:\t{}", cfg.deploy_path.display());
    info!("Vendor:\t\t{}", cfg.vendor);
    info!("Testcases:\t\t[{}]", cfg.case_names().join(","));
    info!("Hosts:\t\t[{}]", cfg.hosts.join(","));
    info!("Log path on host:\t{}", run_dir.display());
    info!("{}", "-".repeat(60));
}

/// Print the resolved commands for every case without dispatching anything.
fn print_dry_run(cfg: &Config, run_dir: &Path) {
    let fs: Arc<dyn FileSystem> = Arc::new(RealFileSystem);
    let runner: Arc<dyn CommandRunner> = Arc::new(ShellRunner::new());
    let orchestrator = CaseOrchestrator::from_config(cfg, run_dir.to_path_buf(), runner, fs);
    let layout = orchestrator.layout();
    let monitors = orchestrator.monitors();

    println!("perfrun dry-run");
    println!("  vendor = {}", cfg.vendor);
    println!("  hosts = [{}]", cfg.hosts.join(", "));
    println!(
        "  in_container = {}",
        orchestrator.dispatcher().context().in_container
    );
    println!("  run_dir = {}", run_dir.display());
    println!();

    println!("cases ({}):", cfg.cases.len());
    for case in &cfg.cases {
        let case_dir = layout.case_dir(case);
        let log = case_dir.display();
        println!("  - {case}");
        println!(
            "      system monitor: {}",
            monitors
                .system_spec(&layout.deploy_path, &format!("-v {} -o restart -l {log}", cfg.vendor))
                .command
        );
        println!(
            "      vendor monitor: {}",
            monitors
                .vendor_spec(&layout.deploy_path, &cfg.vendor, &format!("-o restart -l {log}"))
                .command
        );
        println!(
            "      launch: {}",
            detached(&orchestrator.launcher().command(case, &case_dir))
        );
        println!("      pid file: {}", pid_file(&case_dir).display());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn interrupt_resolves_on_signal() {
        let waited = tokio::time::timeout(
            Duration::from_millis(200),
            wait_for_interrupt(async { Ok(()) }),
        )
        .await;
        assert!(waited.is_ok());
    }

    #[tokio::test]
    async fn broken_signal_handler_never_interrupts() {
        let waited = tokio::time::timeout(
            Duration::from_millis(50),
            wait_for_interrupt(async { Err(std::io::Error::other("no signal driver")) }),
        )
        .await;
        assert!(waited.is_err());
    }

    #[test]
    fn run_dir_sits_under_log_path() {
        let dir = run_dir_for(Path::new("/opt/perf"), Path::new("result"));
        assert!(dir.starts_with("/opt/perf/result"));
        assert!(dir.file_name().unwrap().to_string_lossy().starts_with("run"));
    }
}

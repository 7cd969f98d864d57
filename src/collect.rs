// src/collect.rs

//! Per-case, per-host log collection.
//!
//! Reads the monitor logs and the benchmark's result lines out of every case
//! directory. Local hosts write straight into `<run_dir>/<case>`; the logs of
//! a remote host are read from the copy under `<run_dir>/hosts/<host>/<case>`.
//! A missing or malformed file only degrades its own case and host; the error
//! is kept next to whatever could be read.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::fs::FileSystem;
use crate::types::{HostList, is_local_host};

/// Benchmark output file scanned for result lines.
pub const BENCHMARK_LOG: &str = "operation.log.txt";

/// Subdirectory of the run directory receiving logs copied from remote hosts.
pub const REMOTE_LOGS_DIR: &str = "hosts";

/// Results of one case, keyed by host.
pub type HostResults = BTreeMap<String, CaseResult>;

/// Collected data for one case on one host.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CaseResult {
    /// Raw lines of `<vendor>_monitor.log`, for vendor-specific analysis.
    pub vendor: Vec<String>,
    /// Samples of each system monitor, keyed by index (`mem`, `cpu`, ...).
    pub system: BTreeMap<String, Vec<f64>>,
    /// Benchmark result lines.
    pub benchmark: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

/// Reads the artifacts of each case under a run directory.
#[derive(Debug, Clone)]
pub struct ResultCollector {
    fs: Arc<dyn FileSystem>,
    run_dir: PathBuf,
    hosts: HostList,
    vendor: String,
    system_series: Vec<String>,
    result_marker: String,
}

impl ResultCollector {
    pub fn new(
        fs: Arc<dyn FileSystem>,
        run_dir: impl Into<PathBuf>,
        hosts: HostList,
        vendor: impl Into<String>,
        system_series: Vec<String>,
        result_marker: impl Into<String>,
    ) -> Self {
        Self {
            fs,
            run_dir: run_dir.into(),
            hosts,
            vendor: vendor.into(),
            system_series,
            result_marker: result_marker.into(),
        }
    }

    pub fn from_config(cfg: &Config, fs: Arc<dyn FileSystem>, run_dir: impl Into<PathBuf>) -> Self {
        Self::new(
            fs,
            run_dir,
            HostList::new(cfg.hosts.clone()),
            cfg.vendor.clone(),
            cfg.system_series.clone(),
            cfg.result_marker.clone(),
        )
    }

    /// Where the logs of `case_id` on `host` are read from.
    pub fn case_dir(&self, host: &str, case_id: &str) -> PathBuf {
        if is_local_host(host) {
            self.run_dir.join(case_id)
        } else {
            self.run_dir.join(REMOTE_LOGS_DIR).join(host).join(case_id)
        }
    }

    pub fn collect<I, S>(&self, case_ids: I) -> BTreeMap<String, HostResults>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        case_ids
            .into_iter()
            .map(|id| {
                let id = id.as_ref().to_string();
                let result = self.collect_case(&id);
                (id, result)
            })
            .collect()
    }

    /// One result per distinct host.
    pub fn collect_case(&self, case_id: &str) -> HostResults {
        let mut results = HostResults::new();
        for host in self.hosts.iter() {
            if results.contains_key(host) {
                continue;
            }
            let result = self.collect_host(host, case_id);
            results.insert(host.to_string(), result);
        }
        results
    }

    fn collect_host(&self, host: &str, case_id: &str) -> CaseResult {
        let dir = self.case_dir(host, case_id);
        let mut result = CaseResult::default();

        let vendor_log = dir.join(format!("{}_monitor.log", self.vendor));
        match self.fs.read_to_string(&vendor_log) {
            Ok(text) => result.vendor = non_empty_lines(&text),
            Err(err) => result.errors.push(format!("vendor monitor log: {err:#}")),
        }

        for index in &self.system_series {
            let path = dir.join(format!("{index}_monitor.log"));
            match self.read_series(&path) {
                Ok(series) => {
                    result.system.insert(index.clone(), series);
                }
                Err(msg) => result.errors.push(msg),
            }
        }

        let bench_log = dir.join(BENCHMARK_LOG);
        match self.fs.read_to_string(&bench_log) {
            Ok(text) => {
                result.benchmark = text
                    .lines()
                    .filter(|l| l.contains(&self.result_marker))
                    .map(|l| l.trim().to_string())
                    .collect();
            }
            Err(err) => result.errors.push(format!("benchmark log: {err:#}")),
        }

        if result.errors.is_empty() {
            debug!(case = case_id, host, "collected case logs");
        } else {
            warn!(case = case_id, host, errors = ?result.errors, "case logs collected partially");
        }
        result
    }

    /// Tab-separated monitor log: the sample is the second field.
    fn read_series(&self, path: &Path) -> Result<Vec<f64>, String> {
        let text = self
            .fs
            .read_to_string(path)
            .map_err(|e| format!("system monitor log: {e:#}"))?;
        text.lines()
            .filter(|l| l.contains('\t'))
            .map(|l| parse_sample(l).ok_or_else(|| format!("bad sample in {}: {l:?}", path.display())))
            .collect()
    }
}

fn parse_sample(line: &str) -> Option<f64> {
    let field = line.split('\t').nth(1)?.trim();
    field.trim_end_matches('%').trim().parse().ok()
}

fn non_empty_lines(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim_end)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}

/// Log a short per-case report: result lines and series sizes.
pub fn log_summary(results: &BTreeMap<String, HostResults>) {
    for (case, hosts) in results {
        info!("{}", "*".repeat(50));
        info!("Test Case {case}");
        for (host, result) in hosts {
            info!("Host {host}");
            info!("1) Performance:");
            for line in &result.benchmark {
                // Result lines look like "[<marker>] ..."; keep the part after it.
                let text = line.split_once(']').map(|(_, rest)| rest).unwrap_or(line.as_str());
                info!("  {}", text.trim());
            }
            info!("2) Monitor samples:");
            info!("  vendor: {} lines", result.vendor.len());
            for (index, series) in &result.system {
                info!("  {index}: {} samples", series.len());
            }
            if !result.errors.is_empty() {
                warn!(case = %case, host = %host, errors = result.errors.len(), "collection errors");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::mock::MockFileSystem;

    const RUN: &str = "/opt/perf/result/run1";

    const LOCAL: &str = "127.0.0.1";

    fn collector_on(fs: &MockFileSystem, hosts: &[&str]) -> ResultCollector {
        ResultCollector::new(
            Arc::new(fs.clone()),
            RUN,
            HostList::new(hosts.iter().map(|h| h.to_string()).collect()),
            "nvidia",
            vec!["mem".to_string()],
            "FlagPerf Result",
        )
    }

    fn collector(fs: &MockFileSystem) -> ResultCollector {
        collector_on(fs, &[LOCAL])
    }

    fn seed_case(fs: &MockFileSystem, case: &str) {
        seed_dir(fs, &format!("{RUN}/{case}"));
    }

    fn seed_dir(fs: &MockFileSystem, dir: &str) {
        fs.add_file(format!("{dir}/nvidia_monitor.log"), "t0 250W 40C\nt1 260W 41C\n\n");
        fs.add_file(format!("{dir}/mem_monitor.log"), "header\n2024-01-01 00:00\t0.25%\n2024-01-01 00:05\t0.5\n");
        fs.add_file(
            format!("{dir}/operation.log.txt"),
            "starting\n[FlagPerf Result] tflops=312\nnoise\n  [FlagPerf Result] latency=1.2ms\n",
        );
    }

    #[test]
    fn reads_all_artifacts() {
        let fs = MockFileSystem::new();
        seed_case(&fs, "a:b:c:d:e");
        let results = collector(&fs).collect_case("a:b:c:d:e");
        let result = &results[LOCAL];
        assert_eq!(result.vendor.len(), 2);
        assert_eq!(result.system["mem"], vec![0.25, 0.5]);
        assert_eq!(
            result.benchmark,
            vec!["[FlagPerf Result] tflops=312", "[FlagPerf Result] latency=1.2ms"]
        );
        assert!(result.errors.is_empty());
    }

    #[test]
    fn missing_case_does_not_block_others() {
        let fs = MockFileSystem::new();
        seed_case(&fs, "good:b:c:d:e");
        let results = collector(&fs).collect(["missing:b:c:d:e", "good:b:c:d:e"]);
        assert_eq!(results.len(), 2);
        assert_eq!(results["missing:b:c:d:e"][LOCAL].errors.len(), 3);
        assert!(results["good:b:c:d:e"][LOCAL].errors.is_empty());
    }

    #[test]
    fn malformed_sample_is_reported() {
        let fs = MockFileSystem::new();
        seed_case(&fs, "a:b:c:d:e");
        fs.add_file(format!("{RUN}/a:b:c:d:e/mem_monitor.log"), "t\tlots\n");
        let results = collector(&fs).collect_case("a:b:c:d:e");
        let result = &results[LOCAL];
        assert!(!result.system.contains_key("mem"));
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.benchmark.len(), 2);
    }

    #[test]
    fn remote_hosts_are_read_from_their_copies() {
        let fs = MockFileSystem::new();
        seed_case(&fs, "a:b:c:d:e");
        seed_dir(&fs, &format!("{RUN}/hosts/node-a/a:b:c:d:e"));
        let results = collector_on(&fs, &[LOCAL, "node-a", "node-b"]).collect_case("a:b:c:d:e");

        assert_eq!(results.len(), 3);
        assert!(results[LOCAL].errors.is_empty());
        assert!(results["node-a"].errors.is_empty());
        assert_eq!(results["node-a"].benchmark.len(), 2);
        // Nothing was copied from node-b.
        assert_eq!(results["node-b"].errors.len(), 3);
        assert!(results["node-b"].benchmark.is_empty());
    }

    #[test]
    fn case_dir_depends_on_host() {
        let fs = MockFileSystem::new();
        let c = collector(&fs);
        assert_eq!(c.case_dir("localhost", "x"), PathBuf::from(format!("{RUN}/x")));
        assert_eq!(c.case_dir("node-a", "x"), PathBuf::from(format!("{RUN}/hosts/node-a/x")));
    }

    #[test]
    fn serialises_without_empty_errors() {
        let json = serde_json::to_value(CaseResult::default()).unwrap();
        assert!(json.get("errors").is_none());
    }
}

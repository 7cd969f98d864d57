#![allow(dead_code)]

use std::collections::BTreeMap;
use std::time::Duration;

use perfrun::config::{Config, RawConfig, Timeouts};
use perfrun::errors::Result;

/// Builder for `Config`, going through the same TOML parsing and
/// validation as a real config file.
pub struct ConfigBuilder {
    vendor: String,
    deploy_path: String,
    log_path: String,
    hosts: Vec<String>,
    exec_in_container: Option<bool>,
    cases: Vec<String>,
    extra: BTreeMap<String, String>,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            vendor: "nvidia".to_string(),
            deploy_path: "/opt/perf".to_string(),
            log_path: "result".to_string(),
            hosts: vec!["127.0.0.1".to_string()],
            exec_in_container: Some(false),
            cases: Vec::new(),
            extra: BTreeMap::new(),
        }
    }

    pub fn vendor(mut self, vendor: &str) -> Self {
        self.vendor = vendor.to_string();
        self
    }

    pub fn deploy_path(mut self, path: &str) -> Self {
        self.deploy_path = path.to_string();
        self
    }

    pub fn hosts(mut self, hosts: &[&str]) -> Self {
        self.hosts = hosts.iter().map(|h| h.to_string()).collect();
        self
    }

    pub fn in_container(mut self, value: bool) -> Self {
        self.exec_in_container = Some(value);
        self
    }

    pub fn case(mut self, id: &str) -> Self {
        self.cases.push(id.to_string());
        self
    }

    /// Extra top-level `key = <toml value>` line.
    pub fn set(mut self, key: &str, toml_value: &str) -> Self {
        self.extra.insert(key.to_string(), toml_value.to_string());
        self
    }

    pub fn to_toml(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("vendor = {:?}\n", self.vendor));
        out.push_str(&format!("deploy_path = {:?}\n", self.deploy_path));
        out.push_str(&format!("log_path = {:?}\n", self.log_path));
        out.push_str(&format!("hosts = {:?}\n", self.hosts));
        if let Some(flag) = self.exec_in_container {
            out.push_str(&format!("exec_in_container = {flag}\n"));
        }
        for (key, value) in &self.extra {
            out.push_str(&format!("{key} = {value}\n"));
        }
        out.push_str("\n[cases]\n");
        for case in &self.cases {
            out.push_str(&format!("{case:?} = {{}}\n"));
        }
        out
    }

    pub fn raw(&self) -> RawConfig {
        toml::from_str(&self.to_toml()).expect("builder produced invalid TOML")
    }

    pub fn try_build(self) -> Result<Config> {
        Config::try_from(self.raw())
    }

    pub fn build(self) -> Config {
        self.try_build()
            .expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Millisecond-scale timeouts so orchestrator tests finish quickly.
pub fn fast_timeouts(task: Option<Duration>) -> Timeouts {
    Timeouts {
        monitor: Duration::from_millis(200),
        launch: Duration::from_millis(200),
        launch_grace: Duration::ZERO,
        poll_interval: Duration::from_millis(2),
        task,
        probe: Duration::from_millis(200),
        collect: Duration::from_millis(200),
    }
}

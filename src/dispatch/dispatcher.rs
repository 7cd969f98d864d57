// src/dispatch/dispatcher.rs

//! Multi-host command dispatch.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, error, warn};

use crate::config::SshSection;
use crate::dispatch::command::CommandSpec;
use crate::dispatch::rewrite::{Rewrite, rewrite};
use crate::exec::{CommandOutput, CommandRunner};
use crate::fs::FileSystem;
use crate::types::{ExecutionContext, HostList, is_local_host};

/// Exit code recorded for a host whose command could not be rewritten.
pub const REWRITE_FAILED_EXIT_CODE: i32 = -2;

/// Hosts whose command failed, with their exit codes.
///
/// A host that is absent succeeded (or was skipped by policy). Built fresh
/// for every dispatch call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct DispatchResult {
    failed: BTreeMap<String, i32>,
}

impl DispatchResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, host: &str, exit_code: i32) {
        self.failed.insert(host.to_string(), exit_code);
    }

    /// True when no host failed.
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn failed_count(&self) -> usize {
        self.failed.len()
    }

    pub fn contains(&self, host: &str) -> bool {
        self.failed.contains_key(host)
    }

    pub fn exit_code(&self, host: &str) -> Option<i32> {
        self.failed.get(host).copied()
    }

    pub fn failed_hosts(&self) -> impl Iterator<Item = (&str, i32)> {
        self.failed.iter().map(|(h, c)| (h.as_str(), *c))
    }
}

/// How remote hosts are reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SshOptions {
    pub port: u16,
    pub connect_timeout: Duration,
}

impl Default for SshOptions {
    fn default() -> Self {
        Self::from(&SshSection::default())
    }
}

impl From<&SshSection> for SshOptions {
    fn from(s: &SshSection) -> Self {
        Self {
            port: s.port,
            connect_timeout: Duration::from_secs(s.connect_timeout_secs),
        }
    }
}

/// Executes commands across the hosts of a run.
///
/// Hosts are visited one after another in list order. A failure on one host
/// is recorded and dispatch continues with the next host.
pub struct HostDispatcher {
    runner: Arc<dyn CommandRunner>,
    hosts: HostList,
    context: ExecutionContext,
    ssh: SshOptions,
}

impl std::fmt::Debug for HostDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostDispatcher")
            .field("hosts", &self.hosts)
            .field("context", &self.context)
            .field("ssh", &self.ssh)
            .finish_non_exhaustive()
    }
}

impl HostDispatcher {
    pub fn new(runner: Arc<dyn CommandRunner>, hosts: HostList, context: ExecutionContext) -> Self {
        Self {
            runner,
            hosts,
            context,
            ssh: SshOptions::default(),
        }
    }

    pub fn with_ssh(mut self, ssh: SshOptions) -> Self {
        self.ssh = ssh;
        self
    }

    pub fn hosts(&self) -> &HostList {
        &self.hosts
    }

    pub fn context(&self) -> ExecutionContext {
        self.context
    }

    /// Run `spec` on every host.
    pub async fn dispatch(&self, spec: &CommandSpec, no_log: bool) -> DispatchResult {
        self.dispatch_some(spec, self.hosts.len(), no_log).await
    }

    /// Run `spec` on the first `host_count` hosts.
    pub async fn dispatch_some(
        &self,
        spec: &CommandSpec,
        host_count: usize,
        no_log: bool,
    ) -> DispatchResult {
        if host_count > self.hosts.len() {
            warn!(
                requested = host_count,
                available = self.hosts.len(),
                "host count exceeds host list; dispatching to all hosts"
            );
        }

        let mut result = DispatchResult::new();

        for (index, host) in self.hosts.iter().take(host_count).enumerate() {
            debug!(host, index, op = %spec.op, "dispatching command");

            let command = match rewrite(spec, self.context) {
                Ok(Rewrite::Run(command)) => command,
                Ok(Rewrite::Skip(reason)) => {
                    debug!(host, index, reason, "skipping host for this command");
                    continue;
                }
                Err(err) => {
                    error!(
                        host,
                        index,
                        cmd = %spec.command,
                        error = %err,
                        "command rewrite failed; host not dispatched"
                    );
                    result.record(host, REWRITE_FAILED_EXIT_CODE);
                    continue;
                }
            };

            let line = self.command_for_host(host, &command);
            let output = self.runner.run(&line, spec.timeout).await;

            if !output.is_success() {
                result.record(host, output.exit_code);
                if spec.check && !no_log {
                    error!(
                        host,
                        index,
                        exit_code = output.exit_code,
                        cmd = %command,
                        output = %output.joined(),
                        "command failed on host"
                    );
                } else {
                    debug!(
                        host,
                        index,
                        exit_code = output.exit_code,
                        cmd = %command,
                        "command returned non-zero (unchecked)"
                    );
                }
            }
        }

        result
    }

    /// Run `spec` on the controlling machine only.
    pub async fn run_local(&self, spec: &CommandSpec) -> CommandOutput {
        debug!(cmd = %spec.command, "running command locally");
        let output = self.runner.run(&spec.command, spec.timeout).await;
        if spec.check && !output.is_success() {
            error!(
                exit_code = output.exit_code,
                cmd = %spec.command,
                output = %output.first_line(),
                "local command failed"
            );
        }
        output
    }

    /// Hosts that cannot run a no-op command.
    pub async fn healthcheck(&self) -> DispatchResult {
        self.dispatch(&CommandSpec::new(":"), false).await
    }

    /// Copy `remote_dir` from every remote host into `<local_dir>/<host>`.
    ///
    /// Local hosts already share the filesystem and are skipped.
    pub async fn collect_files(
        &self,
        fs: &dyn FileSystem,
        remote_dir: &Path,
        local_dir: &Path,
        timeout: Duration,
    ) -> DispatchResult {
        let mut result = DispatchResult::new();

        for host in self.hosts.iter() {
            if is_local_host(host) {
                debug!(host, "local host; nothing to collect");
                continue;
            }
            if let Err(err) = fs.create_dir_all(local_dir) {
                warn!(dir = %local_dir.display(), error = %err, "cannot create local collect dir");
            }

            let dest = local_dir.join(host);
            let line = format!(
                "scp -r -P {} -o ConnectTimeout={} -o StrictHostKeyChecking=no {} {}",
                self.ssh.port,
                self.ssh.connect_timeout.as_secs(),
                shell_quote(&format!("{}:{}", host, remote_dir.display())),
                shell_quote(&dest.display().to_string()),
            );
            let output = self.runner.run(&line, timeout).await;
            if !output.is_success() {
                result.record(host, output.exit_code);
                debug!(
                    host,
                    remote = %remote_dir.display(),
                    local = %dest.display(),
                    output = %output.first_line(),
                    "collecting files from host failed"
                );
            }
        }

        result
    }

    /// The command line the runner executes for `host`.
    pub fn command_for_host(&self, host: &str, command: &str) -> String {
        if is_local_host(host) {
            return command.to_string();
        }
        format!(
            "ssh -o ConnectTimeout={} -o StrictHostKeyChecking=no -p {} {} {}",
            self.ssh.connect_timeout.as_secs(),
            self.ssh.port,
            host,
            shell_quote(command)
        )
    }
}

/// Quote `s` for a POSIX shell as a single word.
pub fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', r"'\''"))
}

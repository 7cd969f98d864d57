// src/exec/shell.rs

//! Production command runner backed by `tokio::process`.

use std::process::Stdio;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tracing::{debug, warn};

use super::runner::{
    CommandOutput, CommandRunner, RunFuture, SPAWN_FAILED_EXIT_CODE, TIMEOUT_EXIT_CODE,
};

/// Runs commands through `bash -c`.
///
/// `bash` rather than `sh` because launch pipelines `source` environment
/// scripts.
#[derive(Debug, Clone)]
pub struct ShellRunner {
    shell: String,
}

impl ShellRunner {
    pub fn new() -> Self {
        Self {
            shell: "bash".to_string(),
        }
    }

    /// Use a different shell binary (it must accept `-c <command>`).
    pub fn with_shell(shell: impl Into<String>) -> Self {
        Self {
            shell: shell.into(),
        }
    }
}

impl Default for ShellRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandRunner for ShellRunner {
    fn run<'a>(&'a self, command: &'a str, timeout: Duration) -> RunFuture<'a> {
        Box::pin(async move {
            debug!(cmd = %command, timeout_secs = timeout.as_secs_f64(), "running command");
            match run_inner(&self.shell, command, timeout).await {
                Ok(output) => output,
                Err(err) => {
                    warn!(cmd = %command, error = %err, "command could not be executed");
                    CommandOutput::new(SPAWN_FAILED_EXIT_CODE, vec![format!("{err:#}")])
                }
            }
        })
    }
}

async fn run_inner(shell: &str, command: &str, timeout: Duration) -> Result<CommandOutput> {
    let mut cmd = Command::new(shell);
    cmd.arg("-c")
        .arg(command)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = cmd
        .spawn()
        .with_context(|| format!("spawning '{shell} -c {command}'"))?;

    let stdout = child.stdout.take();
    let stderr = child.stderr.take();

    // Readers run alongside the wait so a chatty child never blocks on a
    // full pipe.
    let collect = async {
        let (out, err) = tokio::join!(read_lines(stdout), read_lines(stderr));
        let status = child.wait().await;
        (status, out, err)
    };

    match tokio::time::timeout(timeout, collect).await {
        Ok((status, mut out, err)) => {
            let status = status.with_context(|| format!("waiting for '{command}'"))?;
            out.extend(err);
            Ok(CommandOutput::new(status.code().unwrap_or(SPAWN_FAILED_EXIT_CODE), out))
        }
        Err(_) => {
            // `child` is dropped on return; `kill_on_drop` terminates it.
            Ok(CommandOutput::new(
                TIMEOUT_EXIT_CODE,
                vec![format!(
                    "command timed out after {:.1}s and was killed",
                    timeout.as_secs_f64()
                )],
            ))
        }
    }
}

async fn read_lines<R>(reader: Option<R>) -> Vec<String>
where
    R: AsyncRead + Unpin,
{
    let Some(reader) = reader else {
        return Vec::new();
    };
    let mut lines = BufReader::new(reader).lines();
    let mut out = Vec::new();
    while let Ok(Some(line)) = lines.next_line().await {
        out.push(line);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn captures_exit_code_and_output() {
        let runner = ShellRunner::new();
        let out = runner
            .run("echo hello; echo oops >&2; exit 3", Duration::from_secs(5))
            .await;
        assert_eq!(out.exit_code, 3);
        assert_eq!(out.lines, vec!["hello".to_string(), "oops".to_string()]);
    }

    #[tokio::test]
    async fn timeout_kills_and_reports_distinct_code() {
        let runner = ShellRunner::new();
        let out = runner.run("sleep 5", Duration::from_millis(100)).await;
        assert_eq!(out.exit_code, TIMEOUT_EXIT_CODE);
        assert!(out.first_line().contains("timed out"));
    }

    #[tokio::test]
    async fn missing_shell_is_reported_not_raised() {
        let runner = ShellRunner::with_shell("/nonexistent/shell-binary");
        let out = runner.run("true", Duration::from_secs(1)).await;
        assert_eq!(out.exit_code, SPAWN_FAILED_EXIT_CODE);
        assert!(out.first_line().contains("spawning"));
    }
}

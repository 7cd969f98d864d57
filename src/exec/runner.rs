// src/exec/runner.rs

//! Pluggable command runner abstraction.
//!
//! The dispatcher talks to a `CommandRunner` instead of spawning processes
//! itself, so tests can swap in a fake that records commands and returns
//! scripted exit codes while production uses [`super::ShellRunner`].

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

/// Exit code reported when a command exceeded its timeout and was killed.
pub const TIMEOUT_EXIT_CODE: i32 = 124;

/// Exit code reported when the process could not be started or awaited.
pub const SPAWN_FAILED_EXIT_CODE: i32 = -1;

/// Shell exit code for a command that exists but cannot be executed.
pub const NOT_EXECUTABLE_EXIT_CODE: i32 = 126;

/// Shell exit code for a command that was not found.
pub const NOT_FOUND_EXIT_CODE: i32 = 127;

/// Exit status plus captured output of one command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub exit_code: i32,
    /// Captured stdout lines followed by stderr lines.
    pub lines: Vec<String>,
}

impl CommandOutput {
    pub fn new(exit_code: i32, lines: Vec<String>) -> Self {
        Self { exit_code, lines }
    }

    pub fn success() -> Self {
        Self::new(0, Vec::new())
    }

    pub fn is_success(&self) -> bool {
        self.exit_code == 0
    }

    /// First captured line, or an empty string.
    pub fn first_line(&self) -> &str {
        self.lines.first().map(String::as_str).unwrap_or("")
    }

    /// All captured output joined for diagnostics.
    pub fn joined(&self) -> String {
        self.lines.join("\n")
    }
}

pub type RunFuture<'a> = Pin<Box<dyn Future<Output = CommandOutput> + Send + 'a>>;

/// Executes a single shell command with a timeout.
///
/// Implementations spawn at most one process per call and never retry.
/// Failures to start are reported as a non-zero `exit_code` with an
/// explanatory line, never as an error that aborts the caller.
pub trait CommandRunner: Send + Sync {
    fn run<'a>(&'a self, command: &'a str, timeout: Duration) -> RunFuture<'a>;
}

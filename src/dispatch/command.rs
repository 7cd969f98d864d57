// src/dispatch/command.rs

//! Tagged command model.
//!
//! Callers state what a command does when they build it; the dispatcher
//! switches on [`CommandOp`] instead of searching the command text.

use std::fmt;
use std::time::Duration;

/// Sub-operation of a container-manager command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerOp {
    /// Liveness check of a pid file (`-o pidrunning`).
    PidRunning,
    /// Any other container control (start, stop, exec, ...).
    Other,
}

/// What a dispatched command targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CommandOp {
    #[default]
    Generic,
    ImageManager,
    ContainerManager(ContainerOp),
    SysMonitor,
    DockerImages { inference: bool, stop: bool },
}

impl fmt::Display for CommandOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandOp::Generic => write!(f, "generic"),
            CommandOp::ImageManager => write!(f, "image-manager"),
            CommandOp::ContainerManager(ContainerOp::PidRunning) => {
                write!(f, "container-manager/pidrunning")
            }
            CommandOp::ContainerManager(ContainerOp::Other) => write!(f, "container-manager"),
            CommandOp::SysMonitor => write!(f, "sys-monitor"),
            CommandOp::DockerImages { inference, stop } => {
                write!(f, "docker-images(inference={inference}, stop={stop})")
            }
        }
    }
}

/// A command plus how to run it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub command: String,
    pub op: CommandOp,
    pub timeout: Duration,
    /// Whether a non-zero exit is reported as an error.
    pub check: bool,
}

impl CommandSpec {
    /// A generic, checked command with a 10 second timeout.
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            op: CommandOp::Generic,
            timeout: Duration::from_secs(10),
            check: true,
        }
    }

    pub fn with_op(mut self, op: CommandOp) -> Self {
        self.op = op;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_check(mut self, check: bool) -> Self {
        self.check = check;
        self
    }
}

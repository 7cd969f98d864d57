// src/dispatch/rewrite.rs

//! Per-host command rewriting for in-container execution.
//!
//! When the controller shares a container with its hosts, image and
//! container management make no sense and interpreter paths recorded on the
//! controller do not exist on the host. Commands are adjusted here based on
//! their [`CommandOp`] tag.
//!
//! Interpreter replacement is positional: the commands built by this crate
//! have the shape `cd <path> && <interpreter> <script> ...`, so the
//! interpreter is token 4. Stop commands for inference images carry one
//! extra leading token, putting the interpreter at token 5.

use tracing::debug;

use crate::dispatch::command::{CommandOp, CommandSpec, ContainerOp};
use crate::errors::{PerfrunError, Result};
use crate::types::ExecutionContext;

/// Interpreter token substituted into rewritten commands.
pub const INTERPRETER: &str = "python3";

/// 1-indexed slot of the interpreter in `cd <path> && <interpreter> ...`.
pub const INTERPRETER_SLOT: usize = 4;

/// Interpreter slot for docker-images inference stop commands.
pub const STOP_INTERPRETER_SLOT: usize = 5;

pub const CONTAINER_MANAGER_TOOL: &str = "container_manager.py";
pub const CLUSTER_MANAGER_TOOL: &str = "cluster_manager.py";

/// What the dispatcher should do with a command for one host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rewrite {
    /// Run this (possibly modified) command.
    Run(String),
    /// Do not run anything on this host; not a failure.
    Skip(&'static str),
}

/// Apply the rewriting policy for the given execution context.
///
/// Outside a container every command runs unmodified.
pub fn rewrite(spec: &CommandSpec, ctx: ExecutionContext) -> Result<Rewrite> {
    if !ctx.in_container {
        return Ok(Rewrite::Run(spec.command.clone()));
    }

    let cmd = &spec.command;
    let rewritten = match spec.op {
        CommandOp::Generic => cmd.clone(),
        CommandOp::ImageManager => {
            return Ok(Rewrite::Skip("image management is not available in-container"));
        }
        CommandOp::ContainerManager(ContainerOp::Other) => {
            return Ok(Rewrite::Skip("container management is not available in-container"));
        }
        CommandOp::ContainerManager(ContainerOp::PidRunning) => to_cluster_pid_running(cmd)?,
        CommandOp::SysMonitor => {
            replace_tokens(cmd, INTERPRETER_SLOT, INTERPRETER_SLOT, INTERPRETER)?
        }
        CommandOp::DockerImages {
            inference: true,
            stop: true,
        } => replace_tokens(cmd, STOP_INTERPRETER_SLOT, STOP_INTERPRETER_SLOT, INTERPRETER)?,
        CommandOp::DockerImages { .. } => {
            replace_tokens(cmd, INTERPRETER_SLOT, INTERPRETER_SLOT, INTERPRETER)?
        }
    };

    if rewritten != *cmd {
        debug!(op = %spec.op, cmd = %rewritten, "rewrote command for in-container execution");
    }
    Ok(Rewrite::Run(rewritten))
}

/// Replace the whitespace-separated tokens `start..=end` (1-indexed) with a
/// single `replacement` token.
///
/// The result is re-joined with single spaces. Bounds are checked before
/// anything is modified.
pub fn replace_tokens(input: &str, start: usize, end: usize, replacement: &str) -> Result<String> {
    let mut tokens: Vec<&str> = input.split_whitespace().collect();
    if start < 1 || end > tokens.len() || start > end {
        return Err(PerfrunError::InvalidTokenRange {
            start,
            end,
            tokens: tokens.len(),
        });
    }
    tokens.splice(start - 1..end, [replacement]);
    Ok(tokens.join(" "))
}

/// Turn a container-manager liveness check into the equivalent
/// cluster-manager call: swap the tool and keep only `-o pidrunning`
/// followed by the `-f ...` tail.
fn to_cluster_pid_running(cmd: &str) -> Result<String> {
    let tokens: Vec<&str> = cmd.split_whitespace().collect();

    let op_at = tokens
        .windows(2)
        .position(|w| w == ["-o", "pidrunning"])
        .ok_or_else(|| PerfrunError::Rewrite(format!("no `-o pidrunning` in '{cmd}'")))?;
    let file_at = tokens[op_at + 2..]
        .iter()
        .position(|t| *t == "-f")
        .map(|i| i + op_at + 2)
        .ok_or_else(|| PerfrunError::Rewrite(format!("no `-f <pid file>` in '{cmd}'")))?;

    let out: Vec<String> = tokens[..op_at + 2]
        .iter()
        .chain(&tokens[file_at..])
        .map(|t| match t.strip_suffix(CONTAINER_MANAGER_TOOL) {
            Some(prefix) => format!("{prefix}{CLUSTER_MANAGER_TOOL}"),
            None => t.to_string(),
        })
        .collect();
    Ok(out.join(" "))
}

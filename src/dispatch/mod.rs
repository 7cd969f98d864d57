// src/dispatch/mod.rs

//! Multi-host command dispatch.
//!
//! - [`command`]: the tagged `CommandSpec` callers build.
//! - [`rewrite`]: per-host rewriting policy for in-container execution.
//! - [`dispatcher`]: `HostDispatcher`, which runs a spec on every host
//!   through a `CommandRunner` and aggregates per-host failures.

pub mod command;
pub mod dispatcher;
pub mod rewrite;

pub use command::{CommandOp, CommandSpec, ContainerOp};
pub use dispatcher::{
    DispatchResult, HostDispatcher, REWRITE_FAILED_EXIT_CODE, SshOptions, shell_quote,
};
pub use rewrite::{Rewrite, replace_tokens, rewrite};

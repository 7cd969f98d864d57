// src/exec/mod.rs

//! Process execution layer.
//!
//! - [`runner`] defines the `CommandRunner` trait and `CommandOutput`.
//! - [`shell`] provides `ShellRunner`, the `tokio::process` implementation
//!   used in production.

pub mod runner;
pub mod shell;

pub use runner::{
    CommandOutput, CommandRunner, NOT_EXECUTABLE_EXIT_CODE, NOT_FOUND_EXIT_CODE, RunFuture,
    SPAWN_FAILED_EXIT_CODE, TIMEOUT_EXIT_CODE,
};
pub use shell::ShellRunner;

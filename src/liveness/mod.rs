// src/liveness/mod.rs

//! Liveness of launched tasks, observed through pid files.
//!
//! The check is best effort: it cannot tell a clean exit from a crash.

pub mod poller;
pub mod probe;

pub use poller::{LivenessPoller, WaitOutcome};
pub use probe::{
    ClusterProbe, LivenessProbe, LocalProbe, PROC_ROOT, PidState, ProbeFuture, is_pid_running,
};

// src/orchestrator/mod.rs

//! Case lifecycle orchestration.
//!
//! - `case.rs`: case descriptors and the benchmark paths derived from them.
//! - `record.rs`: pure state machine and run bookkeeping.
//! - `launch.rs`: the composite launch command for a case.
//! - `runner.rs`: `CaseOrchestrator`, which drives cases through monitors,
//!   launch, wait and collection.

pub mod case;
pub mod launch;
pub mod record;
pub mod runner;

pub use case::CaseDescriptor;
pub use launch::{LaunchSettings, PID_FILE_NAME, TaskLauncher, pid_file};
pub use record::{CaseRecord, CaseStatus, IllegalTransition, RunRecord, StageFailure};
pub use runner::{
    CaseOrchestrator, DETAIL_RESULT_FILE, RUN_RECORD_FILE, RunLayout, detached, run_dir_name,
};

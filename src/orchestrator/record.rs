// src/orchestrator/record.rs

//! Per-run bookkeeping: the forward-only case state machine.
//!
//! This part is pure: no processes, no clocks other than timestamps, so the
//! transition rules are unit tested directly.

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use serde::Serialize;

use super::case::CaseDescriptor;

/// Lifecycle of one case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseStatus {
    Pending,
    MonitorsStarted,
    TaskLaunched,
    TaskFinished,
    MonitorsStopped,
    Collected,
}

impl CaseStatus {
    /// The only status a case may move to from `self`.
    pub fn next(self) -> Option<CaseStatus> {
        use CaseStatus::*;
        match self {
            Pending => Some(MonitorsStarted),
            MonitorsStarted => Some(TaskLaunched),
            TaskLaunched => Some(TaskFinished),
            TaskFinished => Some(MonitorsStopped),
            MonitorsStopped => Some(Collected),
            Collected => None,
        }
    }
}

impl fmt::Display for CaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CaseStatus::Pending => "pending",
            CaseStatus::MonitorsStarted => "monitors-started",
            CaseStatus::TaskLaunched => "task-launched",
            CaseStatus::TaskFinished => "task-finished",
            CaseStatus::MonitorsStopped => "monitors-stopped",
            CaseStatus::Collected => "collected",
        };
        f.write_str(s)
    }
}

/// Attempted a transition other than to the immediate successor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("illegal case transition {from} -> {to}")]
pub struct IllegalTransition {
    pub from: CaseStatus,
    pub to: CaseStatus,
}

/// A stage that degraded without stopping the case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageFailure {
    pub stage: CaseStatus,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CaseRecord {
    pub case: CaseDescriptor,
    pub status: CaseStatus,
    /// Every status the case has been in, in order.
    pub history: Vec<CaseStatus>,
    pub failures: Vec<StageFailure>,
    pub started_at: Option<DateTime<Local>>,
    pub finished_at: Option<DateTime<Local>>,
}

impl CaseRecord {
    pub fn new(case: CaseDescriptor) -> Self {
        Self {
            case,
            status: CaseStatus::Pending,
            history: vec![CaseStatus::Pending],
            failures: Vec::new(),
            started_at: None,
            finished_at: None,
        }
    }

    pub fn advance(&mut self, to: CaseStatus) -> Result<(), IllegalTransition> {
        if self.status.next() != Some(to) {
            return Err(IllegalTransition {
                from: self.status,
                to,
            });
        }
        if self.status == CaseStatus::Pending {
            self.started_at = Some(Local::now());
        }
        if to == CaseStatus::MonitorsStopped {
            self.finished_at = Some(Local::now());
        }
        self.status = to;
        self.history.push(to);
        Ok(())
    }

    /// Note a degraded stage; the status does not change.
    pub fn fail(&mut self, stage: CaseStatus, message: impl Into<String>) {
        self.failures.push(StageFailure {
            stage,
            message: message.into(),
        });
    }

    pub fn is_degraded(&self) -> bool {
        !self.failures.is_empty()
    }
}

/// Everything known about one run.
#[derive(Debug, Clone, Serialize)]
pub struct RunRecord {
    pub log_dir: PathBuf,
    pub started_at: DateTime<Local>,
    pub cases: Vec<CaseRecord>,
}

impl RunRecord {
    pub fn new(log_dir: impl Into<PathBuf>, cases: &[CaseDescriptor]) -> Self {
        Self {
            log_dir: log_dir.into(),
            started_at: Local::now(),
            cases: cases.iter().cloned().map(CaseRecord::new).collect(),
        }
    }

    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }

    pub fn case(&self, index: usize) -> Option<&CaseRecord> {
        self.cases.get(index)
    }

    pub fn case_mut(&mut self, index: usize) -> Option<&mut CaseRecord> {
        self.cases.get_mut(index)
    }

    pub fn status_of(&self, case: &CaseDescriptor) -> Option<CaseStatus> {
        self.cases.iter().find(|r| &r.case == case).map(|r| r.status)
    }

    /// Cases whose lifecycle reached `MonitorsStopped` and can be collected.
    pub fn collectable(&self) -> Vec<usize> {
        self.cases
            .iter()
            .enumerate()
            .filter(|(_, r)| r.status == CaseStatus::MonitorsStopped)
            .map(|(i, _)| i)
            .collect()
    }

    /// Cases whose task was launched, finished or not; their logs may exist.
    pub fn launched(&self) -> Vec<usize> {
        self.cases
            .iter()
            .enumerate()
            .filter(|(_, r)| r.status >= CaseStatus::TaskLaunched)
            .map(|(i, _)| i)
            .collect()
    }
}

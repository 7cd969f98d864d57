// src/liveness/poller.rs

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::probe::{LivenessProbe, PidState};

/// Result of waiting for a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// The probe stopped reporting the task as running.
    Finished { polls: u64, elapsed: Duration },
    /// The configured task timeout ran out first.
    TimedOut { elapsed: Duration },
}

/// Blocks the orchestrator until a launched task goes away.
///
/// There is no process handle, only a pid file written by the task. Until a
/// pid file has been observed the poller keeps waiting for one; afterwards
/// any answer other than "running" ends the wait. An `Unknown` answer never
/// ends it, so only the timeout can.
pub struct LivenessPoller {
    probe: Arc<dyn LivenessProbe>,
    interval: Duration,
    timeout: Option<Duration>,
}

impl std::fmt::Debug for LivenessPoller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LivenessPoller")
            .field("interval", &self.interval)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl LivenessPoller {
    pub fn new(probe: Arc<dyn LivenessProbe>, interval: Duration) -> Self {
        Self {
            probe,
            interval,
            timeout: None,
        }
    }

    /// Give up after `timeout`; `None` waits forever.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub async fn is_running(&self, pid_file: &Path) -> bool {
        self.probe.probe(pid_file).await.is_running()
    }

    pub async fn wait_until_finished(&self, pid_file: &Path) -> WaitOutcome {
        let started = Instant::now();
        let mut seen_pid_file = false;
        let mut warned_unknown = false;
        let mut polls = 0u64;

        debug!(pid_file = %pid_file.display(), "check whether the task is running");

        loop {
            polls += 1;
            match self.probe.probe(pid_file).await {
                PidState::Running => {
                    if !seen_pid_file {
                        info!(pid_file = %pid_file.display(), "task is running");
                        seen_pid_file = true;
                    }
                }
                PidState::Unknown => {
                    if !warned_unknown {
                        warn!(pid_file = %pid_file.display(), "cannot tell whether the task is running; still waiting");
                        warned_unknown = true;
                    }
                }
                PidState::NoPidFile if !seen_pid_file => {
                    if polls == 1 {
                        info!(pid_file = %pid_file.display(), "waiting for the task to write its pid file");
                    }
                }
                state => {
                    let elapsed = started.elapsed();
                    info!(
                        ?state,
                        polls,
                        elapsed_secs = elapsed.as_secs(),
                        "task is no longer running"
                    );
                    return WaitOutcome::Finished { polls, elapsed };
                }
            }

            if let Some(limit) = self.timeout {
                let elapsed = started.elapsed();
                if elapsed >= limit {
                    warn!(
                        pid_file = %pid_file.display(),
                        limit_secs = limit.as_secs(),
                        seen_pid_file,
                        "gave up waiting for the task"
                    );
                    return WaitOutcome::TimedOut { elapsed };
                }
            }

            tokio::time::sleep(self.interval).await;
        }
    }
}

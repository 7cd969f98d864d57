use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use perfrun::liveness::{LivenessProbe, PidState, ProbeFuture};

/// A fake liveness probe that:
/// - replays a scripted sequence of states, repeating the last one
/// - records which pid files were probed.
#[derive(Debug, Clone)]
pub struct FakeProbe {
    script: Arc<Mutex<VecDeque<PidState>>>,
    probed: Arc<Mutex<Vec<PathBuf>>>,
}

impl FakeProbe {
    pub fn new(states: &[PidState]) -> Self {
        assert!(!states.is_empty(), "FakeProbe needs at least one state");
        Self {
            script: Arc::new(Mutex::new(states.iter().copied().collect())),
            probed: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Running a few times, then exited.
    pub fn finishes_after(running_polls: usize) -> Self {
        let mut states = vec![PidState::Running; running_polls];
        states.push(PidState::Exited);
        Self::new(&states)
    }

    /// The pid file never shows up.
    pub fn never_starts() -> Self {
        Self::new(&[PidState::NoPidFile])
    }

    pub fn probed(&self) -> Vec<PathBuf> {
        self.probed.lock().unwrap().clone()
    }

    fn next_state(&self) -> PidState {
        let mut script = self.script.lock().unwrap();
        if script.len() > 1 {
            script.pop_front().unwrap()
        } else {
            *script.front().unwrap()
        }
    }
}

impl LivenessProbe for FakeProbe {
    fn probe<'a>(&'a self, pid_file: &'a Path) -> ProbeFuture<'a> {
        self.probed.lock().unwrap().push(pid_file.to_path_buf());
        let state = self.next_state();
        Box::pin(async move { state })
    }
}

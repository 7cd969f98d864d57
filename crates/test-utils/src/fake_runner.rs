use std::sync::{Arc, Mutex};
use std::time::Duration;

use perfrun::exec::{CommandOutput, CommandRunner, RunFuture};

/// A fake command runner that:
/// - records every command line it is asked to run, in order
/// - answers with the exit code of the first rule whose needles all occur
///   in the command line, or 0 when no rule matches.
#[derive(Debug, Clone, Default)]
pub struct FakeRunner {
    rules: Arc<Mutex<Vec<Rule>>>,
    calls: Arc<Mutex<Vec<String>>>,
}

#[derive(Debug, Clone)]
struct Rule {
    needles: Vec<String>,
    exit_code: i32,
    output: Vec<String>,
}

impl FakeRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Exit with `exit_code` for commands containing every needle.
    pub fn fail_when(self, needles: &[&str], exit_code: i32) -> Self {
        self.respond(needles, exit_code, &[])
    }

    pub fn respond(self, needles: &[&str], exit_code: i32, output: &[&str]) -> Self {
        self.rules.lock().unwrap().push(Rule {
            needles: needles.iter().map(|s| s.to_string()).collect(),
            exit_code,
            output: output.iter().map(|s| s.to_string()).collect(),
        });
        self
    }

    /// Every command line run so far.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Command lines containing `needle`.
    pub fn calls_containing(&self, needle: &str) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| c.contains(needle))
            .collect()
    }

    fn answer(&self, command: &str) -> CommandOutput {
        let rules = self.rules.lock().unwrap();
        rules
            .iter()
            .find(|r| r.needles.iter().all(|n| command.contains(n.as_str())))
            .map(|r| CommandOutput::new(r.exit_code, r.output.clone()))
            .unwrap_or_else(CommandOutput::success)
    }
}

impl CommandRunner for FakeRunner {
    fn run<'a>(&'a self, command: &'a str, _timeout: Duration) -> RunFuture<'a> {
        Box::pin(async move {
            self.calls.lock().unwrap().push(command.to_string());
            self.answer(command)
        })
    }
}

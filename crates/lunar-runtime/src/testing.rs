//! Scripted command runner for adapter tests

use crate::command::{command_line, CommandOutput, CommandRunner};
use crate::error::Result;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

/// Replays queued outputs in order and records every invocation
///
/// When the queue is empty a run succeeds with empty stdout.
#[derive(Default)]
pub struct ScriptedRunner {
    outputs: Mutex<VecDeque<CommandOutput>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_output(&self, stdout: &str) {
        self.outputs.lock().unwrap().push_back(CommandOutput {
            stdout: stdout.to_string(),
            stderr: String::new(),
            exit_code: 0,
        });
    }

    pub fn push_failure(&self, exit_code: i32, stderr: &str) {
        self.outputs.lock().unwrap().push_back(CommandOutput {
            stdout: String::new(),
            stderr: stderr.to_string(),
            exit_code,
        });
    }

    /// Every invocation so far, as `program arg1 arg2 ...`
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(&self, program: &str, args: &[String]) -> Result<CommandOutput> {
        self.calls.lock().unwrap().push(command_line(program, args));
        Ok(self
            .outputs
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_default())
    }
}

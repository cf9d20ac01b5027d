//! Scripted command executor.

use std::collections::{HashMap, VecDeque};
use std::io;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use crate::error::ExecutionError;
use crate::source::{ExecutionResult, NativeExecutor};

#[derive(Debug, Clone)]
enum Response {
    Output(ExecutionResult),
    SpawnFailure,
}

#[derive(Debug, Default)]
struct Script {
    /// The last response repeats once the others are used up.
    responses: VecDeque<Response>,
    delay: Option<Duration>,
}

impl Script {
    fn next(&mut self) -> Option<Response> {
        if self.responses.len() > 1 {
            self.responses.pop_front()
        } else {
            self.responses.front().cloned()
        }
    }
}

#[derive(Debug, Default)]
struct State {
    exact: HashMap<String, Script>,
    /// Substring patterns, tried in registration order after exact matches.
    matching: Vec<(String, Script)>,
    history: Vec<String>,
}

/// A [`NativeExecutor`] that answers from a script and records every call.
///
/// Clones share the script and the history, so a test can keep a handle
/// after moving one into a source. Unscripted commands exit 127.
#[derive(Debug, Clone, Default)]
pub struct MockExecutor {
    state: Arc<Mutex<State>>,
}

impl MockExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn script(&self, command: &str, responses: impl IntoIterator<Item = Response>) {
        let mut state = self.lock();
        let script = state.exact.entry(command.to_string()).or_default();
        script.responses = responses.into_iter().collect();
    }

    /// `command` exits 0 printing `stdout`.
    pub fn respond(&self, command: &str, stdout: &str) {
        self.script(command, [Response::Output(ExecutionResult::ok(stdout))]);
    }

    /// `command` prints each of `outputs` on successive calls, then repeats the last.
    pub fn respond_sequence<'a>(&self, command: &str, outputs: impl IntoIterator<Item = &'a str>) {
        self.script(
            command,
            outputs
                .into_iter()
                .map(|s| Response::Output(ExecutionResult::ok(s))),
        );
    }

    pub fn respond_with(&self, command: &str, result: ExecutionResult) {
        self.script(command, [Response::Output(result)]);
    }

    /// `command` cannot even be started.
    pub fn fail_spawn(&self, command: &str) {
        self.script(command, [Response::SpawnFailure]);
    }

    /// Any command containing `pattern` exits 0 printing `stdout`.
    pub fn respond_matching(&self, pattern: &str, stdout: &str) {
        let script = Script {
            responses: VecDeque::from([Response::Output(ExecutionResult::ok(stdout))]),
            delay: None,
        };
        self.lock().matching.push((pattern.to_string(), script));
    }

    /// Delays the answer to `command`, in tokio time.
    pub fn delay(&self, command: &str, delay: Duration) {
        self.lock()
            .exact
            .entry(command.to_string())
            .or_default()
            .delay = Some(delay);
    }

    /// Every command executed so far, in call order.
    pub fn history(&self) -> Vec<String> {
        self.lock().history.clone()
    }

    pub fn execution_count(&self, command: &str) -> usize {
        self.lock().history.iter().filter(|c| *c == command).count()
    }
}

#[async_trait]
impl NativeExecutor for MockExecutor {
    async fn execute(&self, command: &str) -> Result<ExecutionResult, ExecutionError> {
        let (response, delay) = {
            let mut state = self.lock();
            state.history.push(command.to_string());
            let State {
                exact, matching, ..
            } = &mut *state;
            let script = match exact.get_mut(command) {
                Some(script) => Some(script),
                None => matching
                    .iter_mut()
                    .find(|(pattern, _)| command.contains(pattern.as_str()))
                    .map(|(_, script)| script),
            };
            match script {
                Some(script) => (script.next(), script.delay),
                None => (None, None),
            }
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        match response {
            Some(Response::Output(result)) => Ok(result),
            Some(Response::SpawnFailure) => Err(ExecutionError::Spawn {
                command: command.to_string(),
                source: io::Error::new(io::ErrorKind::NotFound, "scripted spawn failure"),
            }),
            None => Ok(ExecutionResult::new(
                127,
                None,
                Some(format!("sh: {command}: command not found\n")),
            )),
        }
    }
}

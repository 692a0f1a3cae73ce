//! Single-channel command queue
//!
//! Commands run one at a time in submission order. `process` is called once
//! per coordinator tick: it starts the head command if nothing is in flight
//! and returns without waiting. The command's future runs on its own task
//! and re-locks the queue to settle.

use drone_shared::{CommandId, SessionError};
use futures::future::BoxFuture;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use tokio::time::Duration;
use tracing::{debug, warn};

pub type CommandResult = Result<(), SessionError>;

/// Asynchronous body of one attempt
pub type CommandFuture = BoxFuture<'static, CommandResult>;

/// Starts one attempt. A synchronous error means the command could not be
/// started at all and is not retried.
pub type Execute = Box<dyn FnMut() -> Result<CommandFuture, SessionError> + Send>;

/// Caller-visible completion, invoked exactly once
pub type Finished = Box<dyn FnOnce(CommandResult) + Send>;

/// Decides from the last error whether to try again
pub type RetryPredicate = Arc<dyn Fn(&SessionError) -> bool + Send + Sync>;

/// Retry and settle behavior of a command
#[derive(Clone, Default)]
pub struct CommandConfig {
    /// No retries when absent
    pub retries_enabled: Option<RetryPredicate>,
    /// Upper bound on attempts; unbounded when absent
    pub max_attempts: Option<u32>,
    /// Pause after success before the queue advances
    pub finish_delay: Option<Duration>,
}

impl CommandConfig {
    pub fn with_retries(mut self, predicate: impl Fn(&SessionError) -> bool + Send + Sync + 'static) -> Self {
        self.retries_enabled = Some(Arc::new(predicate));
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    pub fn with_finish_delay(mut self, delay: Duration) -> Self {
        self.finish_delay = Some(delay);
        self
    }

    /// Fill unset fields from `defaults`
    pub fn or(self, defaults: CommandConfig) -> Self {
        Self {
            retries_enabled: self.retries_enabled.or(defaults.retries_enabled),
            max_attempts: self.max_attempts.or(defaults.max_attempts),
            finish_delay: self.finish_delay.or(defaults.finish_delay),
        }
    }
}

impl fmt::Debug for CommandConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandConfig")
            .field("retries_enabled", &self.retries_enabled.is_some())
            .field("max_attempts", &self.max_attempts)
            .field("finish_delay", &self.finish_delay)
            .finish()
    }
}

/// A unit of work for a [`CommandQueue`]
pub struct Command {
    pub id: CommandId,
    pub label: String,
    pub config: CommandConfig,
    execute: Execute,
    finished: Option<Finished>,
    attempts: u32,
}

impl Command {
    pub fn new(
        id: CommandId,
        label: impl Into<String>,
        execute: Execute,
        finished: Finished,
        config: CommandConfig,
    ) -> Self {
        Self {
            id,
            label: label.into(),
            config,
            execute,
            finished: Some(finished),
            attempts: 0,
        }
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    fn should_retry(&self, error: &SessionError) -> bool {
        if error.is_unsupported() {
            return false;
        }
        if let Some(max) = self.config.max_attempts {
            if self.attempts >= max {
                return false;
            }
        }
        self.config
            .retries_enabled
            .as_ref()
            .map(|predicate| predicate(error))
            .unwrap_or(false)
    }

    fn finish(&mut self, result: CommandResult) {
        if let Some(finished) = self.finished.take() {
            finished(result);
        }
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("id", &self.id)
            .field("label", &self.label)
            .field("attempts", &self.attempts)
            .finish()
    }
}

#[derive(Default)]
struct QueueState {
    pending: VecDeque<Command>,
    in_flight: bool,
    closed: bool,
    /// Bumped by `remove_all`; an in-flight failure from an older
    /// generation is finished instead of re-queued
    generation: u64,
}

/// Ordered, single-in-flight queue for one channel
#[derive(Clone)]
pub struct CommandQueue {
    name: Arc<str>,
    state: Arc<Mutex<QueueState>>,
}

impl CommandQueue {
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self {
            name: name.into(),
            state: Arc::new(Mutex::new(QueueState::default())),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Append to the tail. Fails once the queue is closed; the command is
    /// dropped without its callback.
    pub fn add(&self, command: Command) -> Result<(), SessionError> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(SessionError::SessionClosed);
        }
        debug!("[QUEUE] {} add {} ({})", self.name, command.label, command.id);
        state.pending.push_back(command);
        Ok(())
    }

    /// Start the head command unless one is already in flight.
    ///
    /// Must be called from within a tokio runtime.
    pub fn process(&self) {
        let (mut command, generation) = {
            let mut state = self.state.lock();
            if state.closed || state.in_flight {
                return;
            }
            let Some(command) = state.pending.pop_front() else {
                return;
            };
            state.in_flight = true;
            (command, state.generation)
        };

        command.attempts += 1;
        debug!(
            "[QUEUE] {} execute {} ({}) attempt {}",
            self.name, command.label, command.id, command.attempts
        );

        match (command.execute)() {
            Ok(future) => {
                let queue = self.clone();
                tokio::spawn(async move {
                    let result = future.await;
                    queue.settle(command, generation, result).await;
                });
            }
            Err(error) => {
                warn!(
                    "[QUEUE] {} {} ({}) could not start: {}",
                    self.name, command.label, command.id, error
                );
                command.finish(Err(error));
                self.release();
            }
        }
    }

    async fn settle(&self, mut command: Command, generation: u64, result: CommandResult) {
        match result {
            Ok(()) => {
                if let Some(delay) = command.config.finish_delay {
                    tokio::time::sleep(delay).await;
                }
                debug!("[QUEUE] {} finished {} ({})", self.name, command.label, command.id);
                command.finish(Ok(()));
            }
            Err(error) => {
                if command.should_retry(&error) {
                    let mut state = self.state.lock();
                    if !state.closed && state.generation == generation {
                        warn!(
                            "[QUEUE] {} {} ({}) failed, retrying: {}",
                            self.name, command.label, command.id, error
                        );
                        state.pending.push_front(command);
                        state.in_flight = false;
                        return;
                    }
                }
                warn!(
                    "[QUEUE] {} {} ({}) failed after {} attempt(s): {}",
                    self.name,
                    command.label,
                    command.id,
                    command.attempts,
                    error
                );
                command.finish(Err(error));
            }
        }
        self.release();
    }

    fn release(&self) {
        self.state.lock().in_flight = false;
    }

    /// Drop every queued command without calling back. An in-flight
    /// command still completes and calls back, but is not retried.
    pub fn remove_all(&self) {
        let mut state = self.state.lock();
        let dropped = state.pending.len();
        state.pending.clear();
        state.generation += 1;
        if dropped > 0 {
            debug!("[QUEUE] {} removed {} command(s)", self.name, dropped);
        }
    }

    /// Permanently close: queued commands are abandoned and later adds fail
    pub fn close(&self) {
        let mut state = self.state.lock();
        state.closed = true;
        state.pending.clear();
        state.generation += 1;
    }

    pub fn len(&self) -> usize {
        self.state.lock().pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_in_flight(&self) -> bool {
        self.state.lock().in_flight
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }
}

//! Background task slots for long-running operator commands.
//!
//! Flushing a recording and sampling stills both take seconds. Each runs on
//! its own thread behind a `TaskSlot`, which enforces one run at a time:
//! a command that arrives while the slot is busy is ignored, not queued.
//! Nothing is cancellable once started.

use anyhow::{anyhow, Result};
use std::thread::JoinHandle;

/// Observable state of a slot.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TaskState {
    Idle,
    Running,
    /// The previous run failed. The slot accepts new work.
    Failed(String),
}

pub struct TaskSlot<T> {
    name: &'static str,
    handle: Option<JoinHandle<Result<T>>>,
    last_error: Option<String>,
}

impl<T: Send + 'static> TaskSlot<T> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            handle: None,
            last_error: None,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// True while a spawned run has not finished.
    pub fn is_busy(&self) -> bool {
        self.handle
            .as_ref()
            .map(|handle| !handle.is_finished())
            .unwrap_or(false)
    }

    pub fn state(&self) -> TaskState {
        if self.is_busy() {
            return TaskState::Running;
        }
        match &self.last_error {
            Some(err) => TaskState::Failed(err.clone()),
            None => TaskState::Idle,
        }
    }

    /// Start `job` unless a run is in flight. Returns false when ignored.
    ///
    /// A finished-but-unreaped run is reaped first; its result is discarded.
    pub fn try_spawn<F>(&mut self, job: F) -> Result<bool>
    where
        F: FnOnce() -> Result<T> + Send + 'static,
    {
        if self.is_busy() {
            log::debug!("{}: busy, ignoring request", self.name);
            return Ok(false);
        }
        let _ = self.reap();
        let handle = std::thread::Builder::new()
            .name(self.name.to_string())
            .spawn(job)
            .map_err(|e| anyhow!("failed to spawn {} task: {}", self.name, e))?;
        self.handle = Some(handle);
        self.last_error = None;
        Ok(true)
    }

    /// Collect the result of a finished run without blocking.
    pub fn reap(&mut self) -> Option<Result<T>> {
        if self.is_busy() {
            return None;
        }
        self.join()
    }

    /// Block until the current run (if any) finishes and collect its result.
    pub fn wait(&mut self) -> Option<Result<T>> {
        self.join()
    }

    fn join(&mut self) -> Option<Result<T>> {
        let handle = self.handle.take()?;
        let result = handle
            .join()
            .unwrap_or_else(|_| Err(anyhow!("{} task panicked", self.name)));
        if let Err(err) = &result {
            log::error!("{} failed: {:#}", self.name, err);
            self.last_error = Some(format!("{:#}", err));
        }
        Some(result)
    }
}

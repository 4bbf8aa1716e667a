//! Cancellable handle for the background request/poll task.

use tokio::task::JoinHandle;

/// Owns the single background task of one authentication attempt.
///
/// The task issues the biometric request and then polls for the result.
/// A session holds at most one handle; starting a new attempt cancels the
/// previous one first. Cancelling is idempotent.
#[derive(Debug)]
pub struct PollHandle {
    task: JoinHandle<()>,
    generation: u64,
}

impl PollHandle {
    pub(crate) fn new(task: JoinHandle<()>, generation: u64) -> Self {
        Self { task, generation }
    }

    /// Attempt number this handle belongs to.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Stop the task. Safe to call any number of times, including after the
    /// task has already finished.
    pub fn cancel(&self) {
        self.task.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

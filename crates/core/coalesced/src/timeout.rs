use std::sync::Arc;
use std::time::Duration;

use crate::scheduler::Scheduler;
use crate::task::{DelayedTask, TaskState};
use crate::Cancellable;

/// Fires a callback once after a delay, unless disposed (or dropped) first.
///
/// There is no coalescing here: every `Timeout` owns exactly one task.
#[derive(Debug)]
pub struct Timeout {
    task: DelayedTask,
}

impl Timeout {
    pub fn new<F: Fn() + Send + Sync + 'static>(
        delay: Duration,
        callback: F,
        scheduler: &Arc<dyn Scheduler>,
    ) -> Self {
        let task = DelayedTask::new(callback);
        task.start(delay, scheduler);

        Self { task }
    }

    /// Whether the callback ran to completion
    pub fn fired(&self) -> bool {
        self.task.state() == TaskState::Completed
    }

    /// Whether the callback can still fire
    pub fn is_pending(&self) -> bool {
        !self.task.is_done()
    }

    /// Stop the callback from firing. Returns whether it was still pending.
    pub fn cancel(&self) -> bool {
        self.task.cancel(true)
    }

    pub fn dispose(&self) {
        self.task.dispose();
    }
}

impl Cancellable for Timeout {
    fn cancel(&self) -> bool {
        Timeout::cancel(self)
    }

    fn dispose(&self) {
        Timeout::dispose(self)
    }
}

impl Drop for Timeout {
    fn drop(&mut self) {
        self.task.dispose();
    }
}

use std::time::Duration;

use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;

use super::{Job, Scheduler};
use crate::{Error, Result};

/// [`Scheduler`] backed by a tokio runtime.
///
/// Jobs are plain blocking callbacks, so they run on the runtime's blocking
/// pool. Delays are tokio timers raced against the job's token.
#[derive(Clone, Debug)]
pub struct TokioScheduler {
    handle: Handle,
}

impl TokioScheduler {
    /// Schedule onto the given runtime
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }

    /// Schedule onto the runtime we are currently running inside of
    pub fn current() -> Result<Self> {
        Handle::try_current()
            .map(Self::new)
            .map_err(|_| Error::NoScheduler)
    }
}

impl Scheduler for TokioScheduler {
    fn spawn(&self, job: Job, token: CancellationToken) {
        self.handle.spawn_blocking(move || {
            if token.is_cancelled() {
                trace!("Skipping job, cancelled before it started");
            } else {
                job();
            }
        });
    }

    fn spawn_after(&self, delay: Duration, job: Job, token: CancellationToken) {
        self.handle.spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {
                    trace!("Delay of {delay:?} cancelled");
                }
                _ = tokio::time::sleep(delay) => {
                    if !token.is_cancelled() {
                        job();
                    }
                }
            }
        });
    }
}

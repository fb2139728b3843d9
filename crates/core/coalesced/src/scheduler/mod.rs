//! Scheduling substrate the runner hands its work to

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

mod manual;
mod runtime;

pub use self::manual::ManualScheduler;
pub use self::runtime::TokioScheduler;

/// Unit of work handed to a [`Scheduler`]
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Something that can execute a job now, or after a delay.
///
/// Both operations are cancellable through `token`: a job whose token is
/// cancelled before it starts must never run. Once a job has started it is
/// left alone.
pub trait Scheduler: Send + Sync + 'static {
    /// Execute `job` as soon as possible on some worker
    fn spawn(&self, job: Job, token: CancellationToken);

    /// Execute `job` once `delay` has elapsed
    fn spawn_after(&self, delay: Duration, job: Job, token: CancellationToken);
}

impl<S: Scheduler + ?Sized> Scheduler for Arc<S> {
    fn spawn(&self, job: Job, token: CancellationToken) {
        (**self).spawn(job, token)
    }

    fn spawn_after(&self, delay: Duration, job: Job, token: CancellationToken) {
        (**self).spawn_after(delay, job, token)
    }
}

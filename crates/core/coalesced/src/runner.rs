use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use chrono::{DateTime, Utc};

use crate::scheduler::{Scheduler, TokioScheduler};
use crate::slot::AtomicSlot;
use crate::task::{Action, Delay, DelayedTask, Fault, FaultHook, Outcome};
use crate::{Cancellable, Error, Result, RunnerConfig};

const NEVER: i64 = i64::MIN;

/// Wall-clock timestamp that can be read and written without locking
struct Stamp(AtomicI64);

impl Stamp {
    fn never() -> Self {
        Self(AtomicI64::new(NEVER))
    }

    fn set_now(&self) {
        let nanos = Utc::now().timestamp_nanos_opt().unwrap_or(i64::MAX);
        self.0.store(nanos, Ordering::Release);
    }

    fn get(&self) -> Option<DateTime<Utc>> {
        match self.0.load(Ordering::Acquire) {
            NEVER => None,
            nanos => Some(DateTime::from_timestamp_nanos(nanos)),
        }
    }
}

struct Shared {
    config: RunnerConfig,
    action: AtomicSlot<Action>,
    scheduler: AtomicSlot<Arc<dyn Scheduler>>,
    fault_hook: AtomicSlot<FaultHook>,
    /// The one task that is waiting or running, if any
    slot: AtomicSlot<DelayedTask>,
    count: AtomicU64,
    last_start: Stamp,
    last_complete: Stamp,
    disposed: AtomicBool,
}

impl Shared {
    fn cancel(&self, only_if_not_running: bool) -> bool {
        match self.slot.load() {
            Some(task) => task.cancel(only_if_not_running),
            None => false,
        }
    }
}

/// Runs an action at most once at a time, folding repeated requests into
/// the one that is already waiting or running.
///
/// ```ignore
/// let runner = Runner::new(|| flush_to_disk())?;
///
/// // Any number of these within 500ms result in a single flush.
/// runner.defer(Duration::from_millis(500))?;
/// ```
///
/// Dropping the runner disposes it.
pub struct Runner {
    shared: Arc<Shared>,
}

impl Runner {
    /// Bind `action` to the tokio runtime we are running inside of
    pub fn new<F: Fn() + Send + Sync + 'static>(action: F) -> Result<Self> {
        let scheduler = TokioScheduler::current()?;
        Ok(Self::with_scheduler(action, Arc::new(scheduler)))
    }

    /// Bind `action` to a specific scheduler
    pub fn with_scheduler<F: Fn() + Send + Sync + 'static>(
        action: F,
        scheduler: Arc<dyn Scheduler>,
    ) -> Self {
        Self::from_config(action, RunnerConfig::default(), scheduler)
    }

    pub fn from_config<F: Fn() + Send + Sync + 'static>(
        action: F,
        config: RunnerConfig,
        scheduler: Arc<dyn Scheduler>,
    ) -> Self {
        let action: Action = Arc::new(action);

        Self {
            shared: Arc::new(Shared {
                config,
                action: AtomicSlot::new(action),
                scheduler: AtomicSlot::new(scheduler),
                fault_hook: AtomicSlot::empty(),
                slot: AtomicSlot::empty(),
                count: AtomicU64::new(0),
                last_start: Stamp::never(),
                last_complete: Stamp::never(),
                disposed: AtomicBool::new(false),
            }),
        }
    }

    /// Get told about runs of the action that panicked.
    ///
    /// Faulted runs are otherwise only logged, they never count as a run.
    pub fn with_fault_hook<F: Fn(&Fault) + Send + Sync + 'static>(self, hook: F) -> Self {
        let hook: FaultHook = Arc::new(hook);
        self.shared.fault_hook.store(hook);
        self
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.shared.config
    }

    /// Run as soon as possible, coalesced with any pending run
    pub fn run(&self) -> Result<DelayedTask> {
        self.defer_with(Delay::Immediate, self.shared.config.reset_if_idle)
    }

    /// Run after `delay`, coalesced with any pending run
    pub fn defer(&self, delay: impl Into<Delay>) -> Result<DelayedTask> {
        self.defer_with(delay, self.shared.config.reset_if_idle)
    }

    /// Run after `delay`.
    ///
    /// With `reset_if_idle`, a run that is still waiting is cancelled and
    /// replaced so the new delay applies. A run that has already started is
    /// never interrupted: it is returned instead and no new run is scheduled.
    pub fn defer_with(&self, delay: impl Into<Delay>, reset_if_idle: bool) -> Result<DelayedTask> {
        let delay = delay.into();
        let shared = &self.shared;

        if shared.disposed.load(Ordering::SeqCst) {
            return Err(Error::Disposed);
        }

        if reset_if_idle && shared.cancel(true) {
            trace!("{}: replaced waiting run", shared.config.name);
        }

        loop {
            if let Some(current) = shared.slot.load() {
                if !current.is_done() {
                    trace!("{}: coalesced into task {}", shared.config.name, current.id());
                    return Ok(current);
                }

                // finished but its continuation has not cleared it yet
                shared.slot.clear_if(|task| task.ptr_eq(&current));
                continue;
            }

            let (Some(action), Some(scheduler)) = (shared.action.load(), shared.scheduler.load())
            else {
                return Err(Error::Disposed);
            };

            let task = DelayedTask::builder()
                .action(Some(action))
                .on_complete(on_complete(Arc::downgrade(&self.shared)))
                .on_fault(shared.fault_hook.load())
                .build();

            match shared.slot.install(task.clone()) {
                Ok(()) => {
                    if shared.disposed.load(Ordering::SeqCst) {
                        task.dispose();
                        return Err(Error::Disposed);
                    }

                    shared.last_start.set_now();
                    debug!(
                        "{}: scheduling task {} with {delay:?}",
                        shared.config.name,
                        task.id()
                    );

                    task.start(delay, &scheduler);
                    return Ok(task);
                }
                Err(winner) if !winner.is_done() => {
                    trace!(
                        "{}: lost install race to task {}",
                        shared.config.name,
                        winner.id()
                    );
                    return Ok(winner);
                }
                Err(_) => continue,
            }
        }
    }

    /// Cancel the pending run, if any.
    ///
    /// With `only_if_not_running` a run that has already started is left
    /// alone. Returns whether a run was prevented from happening.
    pub fn cancel(&self, only_if_not_running: bool) -> bool {
        self.shared.cancel(only_if_not_running)
    }

    /// Invoke the action on this thread, outside of any scheduling or
    /// bookkeeping.
    pub fn run_synchronously(&self) -> Result<()> {
        if self.shared.disposed.load(Ordering::SeqCst) {
            return Err(Error::Disposed);
        }

        let action = self.shared.action.load().ok_or(Error::Disposed)?;
        action();
        Ok(())
    }

    /// Task currently waiting or running, if any
    pub fn current(&self) -> Option<DelayedTask> {
        self.shared.slot.load().filter(|task| !task.is_done())
    }

    /// Whether a run is waiting or running
    pub fn is_scheduled(&self) -> bool {
        self.current().is_some()
    }

    /// Whether a run was ever scheduled
    pub fn has_been_run(&self) -> bool {
        self.shared.last_start.get().is_some()
    }

    /// Number of runs that completed successfully
    pub fn count(&self) -> u64 {
        self.shared.count.load(Ordering::Acquire)
    }

    /// When the latest run was scheduled
    pub fn last_start(&self) -> Option<DateTime<Utc>> {
        self.shared.last_start.get()
    }

    /// When the latest successful run completed
    pub fn last_complete(&self) -> Option<DateTime<Utc>> {
        self.shared.last_complete.get()
    }

    pub fn is_disposed(&self) -> bool {
        self.shared.disposed.load(Ordering::SeqCst)
    }

    /// Cancel any pending run and release the action and scheduler.
    /// Everything but `cancel` fails with [`Error::Disposed`] afterwards.
    pub fn dispose(&self) {
        let shared = &self.shared;
        if shared.disposed.swap(true, Ordering::SeqCst) {
            return;
        }

        shared.cancel(false);
        shared.action.take();
        shared.scheduler.take();
        shared.fault_hook.take();

        debug!("{}: disposed after {} runs", shared.config.name, self.count());
    }
}

/// Bookkeeping once a task spawned by the runner finishes
fn on_complete(shared: Weak<Shared>) -> impl Fn(&DelayedTask, &Outcome) + Send + Sync + 'static {
    move |task: &DelayedTask, outcome: &Outcome| {
        let Some(shared) = shared.upgrade() else {
            return;
        };

        if *outcome == Outcome::Completed {
            shared.last_complete.set_now();
            shared.count.fetch_add(1, Ordering::AcqRel);
        }

        if shared.slot.clear_if(|current| current.ptr_eq(task)) {
            trace!("{}: task {} left the slot", shared.config.name, task.id());
        }
    }
}

impl Cancellable for Runner {
    fn cancel(&self) -> bool {
        Runner::cancel(self, false)
    }

    fn dispose(&self) {
        Runner::dispose(self)
    }
}

impl Drop for Runner {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl fmt::Debug for Runner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runner")
            .field("name", &self.shared.config.name)
            .field("current", &self.current())
            .field("count", &self.count())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

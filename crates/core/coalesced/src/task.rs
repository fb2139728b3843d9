//! Cancellable, delayable unit of work

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::scheduler::Scheduler;
use crate::slot::AtomicSlot;
use crate::{Cancellable, Error, Result};

/// Callback run by a task
pub type Action = Arc<dyn Fn() + Send + Sync + 'static>;

/// Observer for actions that panicked
pub type FaultHook = Arc<dyn Fn(&Fault) + Send + Sync + 'static>;

/// Runs inline once a task reaches a terminal state
pub type Continuation = Arc<dyn Fn(&DelayedTask, &Outcome) + Send + Sync + 'static>;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// When a task should run once started
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
pub enum Delay {
    /// Run on the calling thread before `start` returns
    Inline,
    /// Hand to the scheduler straight away
    Immediate,
    /// Hand to the scheduler once the delay has elapsed
    After(Duration),
}

impl Delay {
    /// Signed milliseconds: negative runs inline, zero runs immediately
    pub fn from_millis(millis: i64) -> Self {
        match millis {
            i64::MIN..=-1 => Delay::Inline,
            0 => Delay::Immediate,
            _ => Delay::After(Duration::from_millis(millis.unsigned_abs())),
        }
    }

    /// Signed seconds, same convention as [`Delay::from_millis`]
    pub fn from_secs_f64(secs: f64) -> Result<Self> {
        if secs.is_nan() {
            return Err(Error::InvalidArgument("delay is not a number"));
        }

        if secs < 0.0 {
            Ok(Delay::Inline)
        } else if secs == 0.0 {
            Ok(Delay::Immediate)
        } else {
            Duration::try_from_secs_f64(secs)
                .map(Delay::After)
                .map_err(|_| Error::InvalidArgument("delay is out of range"))
        }
    }
}

impl From<Duration> for Delay {
    fn from(duration: Duration) -> Self {
        if duration.is_zero() {
            Delay::Immediate
        } else {
            Delay::After(duration)
        }
    }
}

/// Lifecycle of a [`DelayedTask`]
#[repr(u8)]
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
pub enum TaskState {
    /// Constructed, not started
    Created = 0,
    /// Started: either the delay is armed or the scheduler has not picked it up yet
    Waiting = 1,
    /// The callback is executing
    Running = 2,
    /// The callback returned
    Completed = 3,
    /// Cancelled before the callback started
    Canceled = 4,
    /// The callback panicked
    Faulted = 5,
}

impl TaskState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => TaskState::Created,
            1 => TaskState::Waiting,
            2 => TaskState::Running,
            3 => TaskState::Completed,
            4 => TaskState::Canceled,
            _ => TaskState::Faulted,
        }
    }

    /// Whether this state is final
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskState::Completed | TaskState::Canceled | TaskState::Faulted
        )
    }
}

/// Information about a callback that panicked
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Fault {
    /// Panic message, if it was a string
    pub message: String,
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "action panicked: {}", self.message)
    }
}

impl Fault {
    fn from_panic(payload: &(dyn Any + Send)) -> Self {
        let message = if let Some(message) = payload.downcast_ref::<&str>() {
            message.to_string()
        } else if let Some(message) = payload.downcast_ref::<String>() {
            message.clone()
        } else {
            "unknown panic payload".to_string()
        };

        Self { message }
    }
}

/// How a task ended
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum Outcome {
    Completed,
    Canceled,
    Faulted(Fault),
}

impl Outcome {
    fn state(&self) -> TaskState {
        match self {
            Outcome::Completed => TaskState::Completed,
            Outcome::Canceled => TaskState::Canceled,
            Outcome::Faulted(_) => TaskState::Faulted,
        }
    }
}

struct Inner {
    id: u64,
    callback: Action,
    state: AtomicU8,
    /// Taken exactly once, by whoever gets to cancel
    source: AtomicSlot<CancellationToken>,
    /// Observer side of `source`, handed to the scheduler
    token: CancellationToken,
    /// Child of `token` guarding the delay timer
    timer: CancellationToken,
    /// First of {delay elapsed, task finished} wins
    race: AtomicU8,
    continuation: Option<Continuation>,
    fault_hook: Option<FaultHook>,
    completion: watch::Sender<Option<Outcome>>,
}

/// A single-use unit of work that can be started now, later or inline,
/// and cancelled until it starts running.
///
/// Handles are cheap to clone and all refer to the same task.
#[derive(Clone)]
pub struct DelayedTask {
    inner: Arc<Inner>,
}

/// Builder for [`DelayedTask`]
#[derive(Default)]
pub struct DelayedTaskBuilder {
    callback: Option<Action>,
    continuation: Option<Continuation>,
    fault_hook: Option<FaultHook>,
}

impl DelayedTaskBuilder {
    /// Callback to run; a task without one runs a no-op
    pub fn callback<F: Fn() + Send + Sync + 'static>(mut self, callback: F) -> Self {
        self.callback = Some(Arc::new(callback));
        self
    }

    /// Shared callback to run
    pub fn action(mut self, action: Option<Action>) -> Self {
        self.callback = action;
        self
    }

    /// Run `continuation` inline when the task reaches a terminal state
    pub fn on_complete<F>(mut self, continuation: F) -> Self
    where
        F: Fn(&DelayedTask, &Outcome) + Send + Sync + 'static,
    {
        self.continuation = Some(Arc::new(continuation));
        self
    }

    /// Observe callbacks that panic
    pub fn on_fault(mut self, hook: Option<FaultHook>) -> Self {
        self.fault_hook = hook;
        self
    }

    pub fn build(self) -> DelayedTask {
        let callback = self.callback.unwrap_or_else(|| Arc::new(|| {}));
        let token = CancellationToken::new();
        let timer = token.child_token();
        let (completion, _) = watch::channel(None);

        DelayedTask {
            inner: Arc::new(Inner {
                id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
                callback,
                state: AtomicU8::new(TaskState::Created as u8),
                source: AtomicSlot::new(token.clone()),
                token,
                timer,
                race: AtomicU8::new(0),
                continuation: self.continuation,
                fault_hook: self.fault_hook,
                completion,
            }),
        }
    }
}

impl DelayedTask {
    /// Create a task running `callback`
    pub fn new<F: Fn() + Send + Sync + 'static>(callback: F) -> Self {
        Self::builder().callback(callback).build()
    }

    pub fn builder() -> DelayedTaskBuilder {
        DelayedTaskBuilder::default()
    }

    /// Process-unique id, for logging
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    pub fn state(&self) -> TaskState {
        TaskState::from_u8(self.inner.state.load(Ordering::Acquire))
    }

    /// Whether the task has reached a terminal state
    pub fn is_done(&self) -> bool {
        self.state().is_terminal()
    }

    /// Whether someone asked this task to stop, even if it was already running
    pub fn is_cancellation_requested(&self) -> bool {
        self.inner.token.is_cancelled()
    }

    /// Token cancelled when cancellation is requested, for cooperative callbacks
    pub fn cancellation_token(&self) -> CancellationToken {
        self.inner.token.clone()
    }

    /// Whether both handles refer to the same task
    pub fn ptr_eq(&self, other: &DelayedTask) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// How the task ended, if it has
    pub fn outcome(&self) -> Option<Outcome> {
        self.inner.completion.borrow().clone()
    }

    /// Wait until the task reaches a terminal state
    pub async fn completed(&self) -> Outcome {
        let mut receiver = self.inner.completion.subscribe();
        let outcome = match receiver.wait_for(Option::is_some).await {
            Ok(outcome) => outcome.clone(),
            Err(_) => None,
        };

        // the sender lives as long as `self`, so this is always Some
        outcome.unwrap_or(Outcome::Canceled)
    }

    /// Start the task.
    ///
    /// Returns `false` if the task was already started or cancelled; a task
    /// only ever starts once.
    pub fn start(&self, delay: impl Into<Delay>, scheduler: &Arc<dyn Scheduler>) -> bool {
        let delay = delay.into();
        let next = match delay {
            Delay::Inline => TaskState::Running,
            Delay::Immediate | Delay::After(_) => TaskState::Waiting,
        };

        if self
            .inner
            .state
            .compare_exchange(
                TaskState::Created as u8,
                next as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_err()
        {
            debug!("Task {} is {:?}, not starting it again", self.id(), self.state());
            return false;
        }

        match delay {
            Delay::Inline => {
                trace!("Running task {} inline", self.id());
                self.run();
            }
            Delay::Immediate => {
                trace!("Scheduling task {}", self.id());
                self.submit(scheduler);
            }
            Delay::After(duration) => {
                trace!("Scheduling task {} in {duration:?}", self.id());

                let task = self.clone();
                let target = scheduler.clone();
                scheduler.spawn_after(
                    duration,
                    Box::new(move || {
                        if task.inner.race.fetch_add(1, Ordering::AcqRel) == 0 {
                            task.submit(&target);
                        } else {
                            trace!("Task {} finished before its delay elapsed", task.id());
                        }
                    }),
                    self.inner.timer.clone(),
                );
            }
        }

        true
    }

    /// Request cancellation.
    ///
    /// Returns `true` only if this call guaranteed the callback will never
    /// run. A task that is already running is never reported as cancelled;
    /// with `only_if_not_running` set it is not even asked to stop.
    pub fn cancel(&self, only_if_not_running: bool) -> bool {
        let state = self.state();
        if state.is_terminal() || (only_if_not_running && state == TaskState::Running) {
            return false;
        }

        let Some(source) = self.inner.source.take() else {
            return false;
        };

        source.cancel();

        let mut current = state as u8;
        loop {
            match TaskState::from_u8(current) {
                TaskState::Created | TaskState::Waiting => {
                    match self.inner.state.compare_exchange(
                        current,
                        TaskState::Canceled as u8,
                        Ordering::AcqRel,
                        Ordering::Acquire,
                    ) {
                        Ok(_) => {
                            debug!("Cancelled task {}", self.id());
                            self.finish(Outcome::Canceled);
                            return true;
                        }
                        Err(actual) => current = actual,
                    }
                }
                TaskState::Running => {
                    debug!("Task {} is already running, cancellation requested", self.id());
                    return false;
                }
                _ => return false,
            }
        }
    }

    /// Cancel (if still possible) and release the cancellation source.
    /// Idempotent.
    pub fn dispose(&self) {
        self.cancel(false);
    }

    fn submit(&self, scheduler: &Arc<dyn Scheduler>) {
        let task = self.clone();
        scheduler.spawn(Box::new(move || task.execute()), self.inner.token.clone());
    }

    /// Entry point once the scheduler picks the task up
    fn execute(&self) {
        if self
            .inner
            .state
            .compare_exchange(
                TaskState::Waiting as u8,
                TaskState::Running as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_err()
        {
            trace!("Task {} was {:?} when picked up", self.id(), self.state());
            return;
        }

        self.run();
    }

    /// Run the callback, the task must already be `Running`
    fn run(&self) {
        let callback = &self.inner.callback;
        let outcome = match panic::catch_unwind(AssertUnwindSafe(|| callback())) {
            Ok(()) => Outcome::Completed,
            Err(payload) => {
                let fault = Fault::from_panic(payload.as_ref());
                warn!("Task {} faulted: {}", self.id(), fault.message);
                Outcome::Faulted(fault)
            }
        };

        self.inner
            .state
            .store(outcome.state() as u8, Ordering::Release);

        if let (Outcome::Faulted(fault), Some(hook)) = (&outcome, &self.inner.fault_hook) {
            if panic::catch_unwind(AssertUnwindSafe(|| hook(fault))).is_err() {
                warn!("Fault hook of task {} panicked", self.id());
            }
        }

        self.finish(outcome);
    }

    /// Bookkeeping once the state is terminal
    fn finish(&self, outcome: Outcome) {
        if self.inner.race.fetch_add(1, Ordering::AcqRel) == 0 {
            self.inner.timer.cancel();
        }

        // release the source, cancelling is a no-op for anyone who already ran
        if let Some(source) = self.inner.source.take() {
            source.cancel();
        }

        if let Some(continuation) = &self.inner.continuation {
            if panic::catch_unwind(AssertUnwindSafe(|| continuation(self, &outcome))).is_err() {
                warn!("Continuation of task {} panicked", self.id());
            }
        }

        self.inner.completion.send_modify(|current| {
            current.replace(outcome);
        });
    }
}

impl Cancellable for DelayedTask {
    fn cancel(&self) -> bool {
        DelayedTask::cancel(self, false)
    }

    fn dispose(&self) {
        DelayedTask::dispose(self)
    }
}

impl fmt::Debug for DelayedTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DelayedTask")
            .field("id", &self.id())
            .field("state", &self.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::ManualScheduler;
    use std::sync::atomic::AtomicUsize;
    use std::thread;

    fn manual() -> (Arc<ManualScheduler>, Arc<dyn Scheduler>) {
        let manual = Arc::new(ManualScheduler::new());
        let scheduler: Arc<dyn Scheduler> = manual.clone();
        (manual, scheduler)
    }

    fn counting_task(counter: &Arc<AtomicUsize>) -> DelayedTask {
        let counter = counter.clone();
        DelayedTask::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn inline_runs_before_start_returns() {
        let (_, scheduler) = manual();
        let counter = Arc::new(AtomicUsize::new(0));
        let task = counting_task(&counter);

        assert!(task.start(Delay::Inline, &scheduler));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert_eq!(task.state(), TaskState::Completed);
        assert_eq!(task.outcome(), Some(Outcome::Completed));
    }

    #[test]
    fn negative_millis_mean_inline() {
        assert_eq!(Delay::from_millis(-1), Delay::Inline);
        assert_eq!(Delay::from_millis(0), Delay::Immediate);
        assert_eq!(
            Delay::from_millis(25),
            Delay::After(Duration::from_millis(25))
        );
        assert_eq!(Delay::from(Duration::ZERO), Delay::Immediate);
    }

    #[test]
    fn nan_delay_is_rejected() {
        assert!(matches!(
            Delay::from_secs_f64(f64::NAN),
            Err(Error::InvalidArgument(_))
        ));
        assert!(Delay::from_secs_f64(f64::INFINITY).is_err());
        assert_eq!(Delay::from_secs_f64(-0.5), Ok(Delay::Inline));
    }

    #[test]
    fn immediate_goes_through_the_scheduler() {
        let (manual, scheduler) = manual();
        let counter = Arc::new(AtomicUsize::new(0));
        let task = counting_task(&counter);

        task.start(Delay::Immediate, &scheduler);
        assert_eq!(task.state(), TaskState::Waiting);
        assert_eq!(counter.load(Ordering::SeqCst), 0);

        manual.run_ready();
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert_eq!(task.state(), TaskState::Completed);
    }

    #[test]
    fn tasks_only_start_once() {
        let (manual, scheduler) = manual();
        let counter = Arc::new(AtomicUsize::new(0));
        let task = counting_task(&counter);

        assert!(task.start(Delay::Immediate, &scheduler));
        assert!(!task.start(Delay::Immediate, &scheduler));

        manual.run_ready();
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn missing_callback_is_a_no_op() {
        let (_, scheduler) = manual();
        let task = DelayedTask::builder().action(None).build();

        task.start(Delay::Inline, &scheduler);
        assert_eq!(task.outcome(), Some(Outcome::Completed));
    }

    #[test]
    fn cancelling_a_waiting_task_prevents_it_from_running() {
        let (manual, scheduler) = manual();
        let counter = Arc::new(AtomicUsize::new(0));
        let task = counting_task(&counter);

        task.start(Duration::from_millis(100), &scheduler);
        assert_eq!(task.state(), TaskState::Waiting);

        assert!(task.cancel(true));
        assert_eq!(task.state(), TaskState::Canceled);
        assert_eq!(manual.pending(), 0);

        manual.advance(Duration::from_secs(1));
        assert_eq!(counter.load(Ordering::SeqCst), 0);
        assert_eq!(task.outcome(), Some(Outcome::Canceled));
    }

    #[test]
    fn cancelling_before_start_prevents_start() {
        let (manual, scheduler) = manual();
        let counter = Arc::new(AtomicUsize::new(0));
        let task = counting_task(&counter);

        assert!(task.cancel(false));
        assert!(!task.start(Delay::Immediate, &scheduler));

        manual.run_ready();
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn cancelling_after_hand_off_still_wins() {
        let (manual, scheduler) = manual();
        let counter = Arc::new(AtomicUsize::new(0));
        let task = counting_task(&counter);

        task.start(Delay::Immediate, &scheduler);
        assert!(task.cancel(false));

        assert_eq!(manual.run_ready(), 0);
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn completed_tasks_cannot_be_cancelled() {
        let (_, scheduler) = manual();
        let task = DelayedTask::new(|| {});

        task.start(Delay::Inline, &scheduler);
        assert!(!task.cancel(false));
        assert!(!task.cancel(true));
        assert_eq!(task.state(), TaskState::Completed);
    }

    #[test]
    fn running_task_is_left_alone() {
        let (_, scheduler) = manual();
        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let slot: Arc<AtomicSlot<DelayedTask>> = Arc::new(AtomicSlot::empty());

        let task = {
            let seen = seen.clone();
            let slot = slot.clone();
            DelayedTask::new(move || {
                if let Some(task) = slot.load() {
                    seen.lock().push(task.cancel(true));
                    seen.lock().push(task.is_cancellation_requested());
                    seen.lock().push(task.cancel(false));
                    seen.lock().push(task.is_cancellation_requested());
                }
            })
        };

        slot.install(task.clone()).unwrap();
        task.start(Delay::Inline, &scheduler);

        assert_eq!(*seen.lock(), vec![false, false, false, true]);
        assert_eq!(task.outcome(), Some(Outcome::Completed));
    }

    #[test]
    fn panics_become_faults() {
        let (_, scheduler) = manual();
        let faults = Arc::new(AtomicUsize::new(0));

        let hook: FaultHook = {
            let faults = faults.clone();
            Arc::new(move |fault: &Fault| {
                assert_eq!(fault.message, "boom");
                faults.fetch_add(1, Ordering::SeqCst);
            })
        };

        let task = DelayedTask::builder()
            .callback(|| panic!("boom"))
            .on_fault(Some(hook))
            .build();

        task.start(Delay::Inline, &scheduler);
        assert_eq!(task.state(), TaskState::Faulted);
        assert_eq!(faults.load(Ordering::SeqCst), 1);
        assert!(matches!(task.outcome(), Some(Outcome::Faulted(_))));
    }

    #[test]
    fn continuation_sees_the_outcome() {
        let (manual, scheduler) = manual();
        let outcomes = Arc::new(parking_lot::Mutex::new(Vec::new()));

        let make = |outcomes: &Arc<parking_lot::Mutex<Vec<Outcome>>>| {
            let outcomes = outcomes.clone();
            DelayedTask::builder()
                .on_complete(move |task, outcome| {
                    assert!(task.is_done());
                    outcomes.lock().push(outcome.clone());
                })
                .build()
        };

        let ran = make(&outcomes);
        let cancelled = make(&outcomes);

        ran.start(Delay::Immediate, &scheduler);
        cancelled.start(Duration::from_millis(10), &scheduler);
        cancelled.cancel(false);
        manual.advance(Duration::from_millis(20));

        assert_eq!(
            *outcomes.lock(),
            vec![Outcome::Canceled, Outcome::Completed]
        );
    }

    #[test]
    fn dispose_is_idempotent() {
        let (_, scheduler) = manual();
        let task = DelayedTask::new(|| {});

        task.start(Duration::from_millis(10), &scheduler);
        task.dispose();
        task.dispose();

        assert_eq!(task.state(), TaskState::Canceled);
    }

    #[test]
    fn concurrent_cancel_has_a_single_winner() {
        for _ in 0..100 {
            let (_, scheduler) = manual();
            let task = DelayedTask::new(|| {});
            task.start(Duration::from_secs(60), &scheduler);

            let handles: Vec<_> = (0..2)
                .map(|_| {
                    let task = task.clone();
                    thread::spawn(move || task.cancel(false))
                })
                .collect();

            let cancelled: Vec<bool> = handles
                .into_iter()
                .map(|handle| handle.join().unwrap())
                .collect();

            assert_eq!(cancelled.iter().filter(|won| **won).count(), 1);
        }
    }

    #[test]
    fn panicking_hook_and_continuation_still_finish_the_task() {
        let (_, scheduler) = manual();
        let hook: FaultHook = Arc::new(|_: &Fault| panic!("hook"));

        let task = DelayedTask::builder()
            .callback(|| panic!("action"))
            .on_fault(Some(hook))
            .on_complete(|_, _| panic!("continuation"))
            .build();

        task.start(Delay::Inline, &scheduler);
        assert_eq!(task.state(), TaskState::Faulted);
        assert!(matches!(task.outcome(), Some(Outcome::Faulted(_))));

        let completed = DelayedTask::builder()
            .on_complete(|_, _| panic!("continuation"))
            .build();

        completed.start(Delay::Inline, &scheduler);
        assert_eq!(completed.outcome(), Some(Outcome::Completed));
    }

    /// Substrate that ignores cancellation tokens
    #[derive(Default)]
    struct Careless {
        ready: parking_lot::Mutex<Vec<crate::scheduler::Job>>,
        delayed: parking_lot::Mutex<Vec<crate::scheduler::Job>>,
    }

    impl Careless {
        fn fire_delayed(&self) {
            let jobs: Vec<_> = self.delayed.lock().drain(..).collect();
            jobs.into_iter().for_each(|job| job());
        }

        fn run_ready(&self) -> usize {
            let jobs: Vec<_> = self.ready.lock().drain(..).collect();
            let count = jobs.len();
            jobs.into_iter().for_each(|job| job());
            count
        }
    }

    impl Scheduler for Careless {
        fn spawn(&self, job: crate::scheduler::Job, _: CancellationToken) {
            self.ready.lock().push(job);
        }

        fn spawn_after(&self, _: Duration, job: crate::scheduler::Job, _: CancellationToken) {
            self.delayed.lock().push(job);
        }
    }

    #[test]
    fn delay_firing_after_cancel_never_submits() {
        let careless = Arc::new(Careless::default());
        let scheduler: Arc<dyn Scheduler> = careless.clone();
        let counter = Arc::new(AtomicUsize::new(0));
        let task = counting_task(&counter);

        task.start(Duration::from_millis(10), &scheduler);
        assert!(task.cancel(false));
        assert_eq!(task.inner.race.load(Ordering::SeqCst), 1);

        // the timer ignores its token and fires anyway
        careless.fire_delayed();
        assert_eq!(task.inner.race.load(Ordering::SeqCst), 2);
        assert_eq!(careless.run_ready(), 0);
        assert_eq!(counter.load(Ordering::SeqCst), 0);
        assert_eq!(task.state(), TaskState::Canceled);
    }

    #[test]
    fn delay_firing_first_submits_once() {
        let careless = Arc::new(Careless::default());
        let scheduler: Arc<dyn Scheduler> = careless.clone();
        let counter = Arc::new(AtomicUsize::new(0));
        let task = counting_task(&counter);

        task.start(Duration::from_millis(10), &scheduler);
        careless.fire_delayed();
        assert_eq!(task.inner.race.load(Ordering::SeqCst), 1);

        assert_eq!(careless.run_ready(), 1);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert_eq!(task.inner.race.load(Ordering::SeqCst), 2);
        assert!(!task.cancel(false));
    }

    #[test]
    fn stale_hand_off_of_a_cancelled_task_does_nothing() {
        let careless = Arc::new(Careless::default());
        let scheduler: Arc<dyn Scheduler> = careless.clone();
        let counter = Arc::new(AtomicUsize::new(0));
        let task = counting_task(&counter);

        task.start(Delay::Immediate, &scheduler);
        assert!(task.cancel(true));

        // the job runs even though its token was cancelled
        assert_eq!(careless.run_ready(), 1);
        assert_eq!(counter.load(Ordering::SeqCst), 0);
        assert_eq!(task.state(), TaskState::Canceled);
    }
}

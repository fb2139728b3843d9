use std::collections::VecDeque;
use std::time::Duration;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use super::{Job, Scheduler};

struct Timer {
    due: Duration,
    seq: u64,
    job: Job,
    token: CancellationToken,
}

#[derive(Default)]
struct State {
    now: Duration,
    seq: u64,
    ready: VecDeque<(Job, CancellationToken)>,
    timers: Vec<Timer>,
}

/// Deterministic [`Scheduler`] driven by a virtual clock.
///
/// Nothing runs until the owner calls [`run_ready`](Self::run_ready) or
/// [`advance`](Self::advance); jobs then run on the calling thread in the
/// order they became due.
#[derive(Default)]
pub struct ManualScheduler {
    state: Mutex<State>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current virtual time, measured from creation
    pub fn now(&self) -> Duration {
        self.state.lock().now
    }

    /// Jobs and timers that are still waiting and have not been cancelled
    pub fn pending(&self) -> usize {
        let state = self.state.lock();
        let ready = state
            .ready
            .iter()
            .filter(|(_, token)| !token.is_cancelled())
            .count();
        let timers = state
            .timers
            .iter()
            .filter(|timer| !timer.token.is_cancelled())
            .count();

        ready + timers
    }

    /// Run every job that is ready right now, including jobs queued by the
    /// jobs being run. Returns how many jobs actually ran.
    pub fn run_ready(&self) -> usize {
        let mut ran = 0;

        loop {
            // Never hold the lock while a job runs, jobs schedule more jobs.
            let next = self.state.lock().ready.pop_front();
            let Some((job, token)) = next else {
                break;
            };

            if !token.is_cancelled() {
                job();
                ran += 1;
            }
        }

        ran
    }

    /// Move the clock forward by `by`, firing due timers in order and
    /// running whatever they make ready. Returns how many jobs ran.
    pub fn advance(&self, by: Duration) -> usize {
        let target = self.now() + by;
        let mut ran = self.run_ready();

        loop {
            let next = {
                let mut state = self.state.lock();
                let due = state
                    .timers
                    .iter()
                    .enumerate()
                    .filter(|(_, timer)| timer.due <= target)
                    .min_by_key(|(_, timer)| (timer.due, timer.seq))
                    .map(|(index, _)| index);

                due.map(|index| {
                    let timer = state.timers.swap_remove(index);
                    state.now = state.now.max(timer.due);
                    timer
                })
            };

            let Some(timer) = next else {
                break;
            };

            if !timer.token.is_cancelled() {
                (timer.job)();
                ran += 1;
            }

            ran += self.run_ready();
        }

        self.state.lock().now = target;
        ran
    }
}

impl Scheduler for ManualScheduler {
    fn spawn(&self, job: Job, token: CancellationToken) {
        self.state.lock().ready.push_back((job, token));
    }

    fn spawn_after(&self, delay: Duration, job: Job, token: CancellationToken) {
        let mut state = self.state.lock();
        let due = state.now + delay;
        let seq = state.seq;
        state.seq += 1;
        state.timers.push(Timer {
            due,
            seq,
            job,
            token,
        });
    }
}

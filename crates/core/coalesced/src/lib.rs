//! Coalescing of repeated requests to run the same piece of work.
//!
//! A [`Runner`] binds one action to a [`Scheduler`] and guarantees at most
//! one waiting or running execution of it. Asking again while a run is
//! waiting restarts (or joins) its delay; asking while it runs joins the
//! running execution. [`DelayedTask`] is the cancellable unit underneath.

#[macro_use]
extern crate log;

mod cancel;
mod config;
mod error;
mod runner;
mod timeout;

pub mod scheduler;
pub mod slot;
pub mod task;

pub use cancel::Cancellable;
pub use config::RunnerConfig;
pub use error::{Error, Result};
pub use runner::Runner;
pub use scheduler::{ManualScheduler, Scheduler, TokioScheduler};
pub use task::{Delay, DelayedTask, Fault, Outcome, TaskState};
pub use timeout::Timeout;

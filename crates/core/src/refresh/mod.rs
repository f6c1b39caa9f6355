//! Adaptive refresh: task state machine, cadence policy, execution and the
//! scheduling loop.

mod executor;
mod mode;
mod policy;
mod scheduler;
mod session_tracker;
mod stats;
mod task;

pub use executor::RefreshExecutor;
pub use mode::RefreshMode;
pub use policy::{backoff_delay, refresh_interval};
pub use scheduler::{RefreshScheduler, SessionTransition, TickReport};
pub use stats::RefreshStats;
pub use task::{RefreshTask, TaskState};

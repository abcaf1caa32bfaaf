//! Step orchestration for Blueprint.
//!
//! An [`Orchestrator`] runs [`Step`]s strictly in order, threading a
//! cumulative result map from step to step. Each step binds an [`Agent`] to
//! a retry budget, a fixed retry delay and an optional failure handler.
//! Everything runs on the calling thread; retry delays block it.

pub mod agent;
pub mod observer;
pub mod orchestrator;
pub mod step;

pub use agent::Agent;
pub use observer::{SilentObserver, StepObserver};
pub use orchestrator::{ExecutionState, Orchestrator, StepRecord};
pub use step::{DEFAULT_RETRY_DELAY, FailureHandler, Step, failed_status};

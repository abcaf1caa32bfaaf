//! Progress hooks for orchestrated runs.

use blueprint_shared::BlueprintError;

use crate::orchestrator::StepRecord;

/// Receives step lifecycle events. Every method defaults to a no-op.
pub trait StepObserver: Send + Sync {
    /// A step is about to run its first attempt.
    fn step_started(&self, _index: usize, _total: usize, _name: &str) {}

    /// Attempt `attempt` failed with a retryable error; another follows.
    fn step_retrying(&self, _name: &str, _attempt: u32, _error: &BlueprintError) {}

    /// The step reached a terminal state; `record` is what the log keeps.
    fn step_finished(&self, _record: &StepRecord) {}
}

/// Observer that ignores every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentObserver;

impl StepObserver for SilentObserver {}

//! A named agent bound to a retry and failure-recovery policy.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use blueprint_shared::{BlueprintError, Payload, Result};

use crate::agent::Agent;

/// Pause between attempts when none is configured.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Called with the cumulative input and the triggering error once a step has
/// exhausted its attempts. `Ok` substitutes the step's output; `Err` halts
/// the run.
pub type FailureHandler = Box<dyn Fn(&Payload, &BlueprintError) -> Result<Payload> + Send + Sync>;

/// One entry in an orchestrated run.
pub struct Step {
    pub(crate) name: String,
    pub(crate) agent: Arc<dyn Agent>,
    pub(crate) retries: u32,
    pub(crate) retry_delay: Duration,
    pub(crate) on_failure: Option<FailureHandler>,
}

impl Step {
    /// A step with no retries, the default delay and no failure handler.
    pub fn new(name: impl Into<String>, agent: Arc<dyn Agent>) -> Self {
        Self {
            name: name.into(),
            agent,
            retries: 0,
            retry_delay: DEFAULT_RETRY_DELAY,
            on_failure: None,
        }
    }

    /// Extra attempts after the first one.
    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    pub fn with_failure_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&Payload, &BlueprintError) -> Result<Payload> + Send + Sync + 'static,
    {
        self.on_failure = Some(Box::new(handler));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn retries(&self) -> u32 {
        self.retries
    }

    pub fn retry_delay(&self) -> Duration {
        self.retry_delay
    }

    pub fn has_failure_handler(&self) -> bool {
        self.on_failure.is_some()
    }
}

impl std::fmt::Debug for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Step")
            .field("name", &self.name)
            .field("agent", &self.agent.name())
            .field("retries", &self.retries)
            .field("retry_delay", &self.retry_delay)
            .field("on_failure", &self.on_failure.is_some())
            .finish()
    }
}

/// Failure handler that records the failure instead of producing content:
/// `{"status": "FAILED", "error": "<message>"}`.
pub fn failed_status(_input: &Payload, error: &BlueprintError) -> Result<Payload> {
    let mut output = Payload::new();
    output.insert("status".into(), Value::String("FAILED".into()));
    output.insert("error".into(), Value::String(error.to_string()));
    Ok(output)
}

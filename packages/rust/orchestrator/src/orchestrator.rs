//! Sequential step execution with bounded retries and failure recovery.
//!
//! Per step and per run the state moves
//! `pending -> running -> {success | retrying -> running | failed}`.
//! Each successful step's output is merged into the cumulative result map
//! under the step's name before the next step starts.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error, info, instrument, warn};

use blueprint_shared::{BlueprintError, Payload, Result};

use crate::observer::{SilentObserver, StepObserver};
use crate::step::Step;

// ---------------------------------------------------------------------------
// Execution log
// ---------------------------------------------------------------------------

/// Per-step state within one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionState {
    Pending,
    Running,
    Success,
    Failed,
    Retrying,
}

/// One execution-log entry.
#[derive(Debug, Clone, Serialize)]
pub struct StepRecord {
    pub step_name: String,
    pub step_index: usize,
    pub state: ExecutionState,
    /// Snapshot of the cumulative map the step received.
    pub input: Payload,
    /// Agent output, or the failure handler's substitute.
    pub output: Option<Payload>,
    pub error: Option<String>,
    /// Number of times the agent was invoked.
    pub attempts: u32,
    /// The failure handler supplied `output` after the step failed.
    pub recovered: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl StepRecord {
    fn pending(step: &Step, step_index: usize, input: Payload) -> Self {
        Self {
            step_name: step.name.clone(),
            step_index,
            state: ExecutionState::Pending,
            input,
            output: None,
            error: None,
            attempts: 0,
            recovered: false,
            started_at: Utc::now(),
            finished_at: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

/// Runs an ordered list of steps, owning the log of the most recent run.
#[derive(Debug)]
pub struct Orchestrator {
    steps: Vec<Step>,
    log: Vec<StepRecord>,
}

impl Orchestrator {
    /// Fails when `steps` is empty or two steps share a name (their results
    /// would overwrite each other in the cumulative map).
    pub fn new(steps: Vec<Step>) -> Result<Self> {
        if steps.is_empty() {
            return Err(BlueprintError::invalid_argument(
                "orchestrator requires at least one step",
            ));
        }
        let mut seen = HashSet::new();
        for step in &steps {
            if step.name.trim().is_empty() {
                return Err(BlueprintError::invalid_argument("step name must not be empty"));
            }
            if !seen.insert(step.name.as_str()) {
                return Err(BlueprintError::invalid_argument(format!(
                    "duplicate step name '{}'",
                    step.name
                )));
            }
        }
        Ok(Self {
            steps,
            log: Vec::new(),
        })
    }

    pub fn step_names(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.name.as_str()).collect()
    }

    /// Run every step in order. See [`Orchestrator::execute_with`].
    pub fn execute(&mut self, initial_input: Payload) -> Result<Payload> {
        self.execute_with(initial_input, &SilentObserver)
    }

    /// Run every step in order, reporting progress to `observer`.
    ///
    /// Returns the cumulative result map: `initial_input` plus one entry per
    /// step keyed by step name. The first unrecoverable failure halts the
    /// run and is returned; the log still holds every step that ran.
    #[instrument(skip_all, fields(steps = self.steps.len()))]
    pub fn execute_with(
        &mut self,
        initial_input: Payload,
        observer: &dyn StepObserver,
    ) -> Result<Payload> {
        info!("starting run");
        self.log.clear();

        let total = self.steps.len();
        let mut cumulative = initial_input;

        for (index, step) in self.steps.iter().enumerate() {
            let mut record = StepRecord::pending(step, index, cumulative.clone());
            observer.step_started(index, total, &step.name);
            debug!(step = %step.name, keys = ?cumulative.keys().collect::<Vec<_>>(), "step input");

            let outcome = match run_attempts(step, &cumulative, &mut record, observer) {
                Ok(output) => {
                    record.state = ExecutionState::Success;
                    record.output = Some(output.clone());
                    info!(step = %step.name, attempts = record.attempts, "step succeeded");
                    Ok(output)
                }
                Err(err) => {
                    record.state = ExecutionState::Failed;
                    record.error = Some(err.to_string());
                    recover(step, &cumulative, err, &mut record)
                }
            };

            record.finished_at = Some(Utc::now());
            observer.step_finished(&record);
            self.log.push(record);

            match outcome {
                Ok(output) => {
                    cumulative.insert(step.name.clone(), Value::Object(output));
                }
                Err(err) => {
                    error!(step = %step.name, error = %err, "run halted");
                    return Err(err);
                }
            }
        }

        info!("run completed");
        Ok(cumulative)
    }

    /// Log of the most recent run, in step order.
    pub fn execution_log(&self) -> &[StepRecord] {
        &self.log
    }

    /// Names of steps that ended `failed` in the last run (recovered ones
    /// included).
    pub fn failed_steps(&self) -> Vec<&str> {
        self.steps_in(ExecutionState::Failed)
    }

    pub fn successful_steps(&self) -> Vec<&str> {
        self.steps_in(ExecutionState::Success)
    }

    fn steps_in(&self, state: ExecutionState) -> Vec<&str> {
        self.log
            .iter()
            .filter(|r| r.state == state)
            .map(|r| r.step_name.as_str())
            .collect()
    }
}

/// Invoke the step's agent until it succeeds, fails with a non-retryable
/// error, or runs out of attempts (`retries + 1`).
fn run_attempts(
    step: &Step,
    input: &Payload,
    record: &mut StepRecord,
    observer: &dyn StepObserver,
) -> Result<Payload> {
    let max_attempts = step.retries.saturating_add(1);
    loop {
        record.state = ExecutionState::Running;
        record.attempts += 1;

        let err = match step.agent.execute(input) {
            Ok(output) => return Ok(output),
            Err(err) => err,
        };

        if record.attempts >= max_attempts || !err.is_retryable() {
            warn!(
                step = %step.name,
                attempts = record.attempts,
                retryable = err.is_retryable(),
                error = %err,
                "step failed"
            );
            return Err(err);
        }

        record.state = ExecutionState::Retrying;
        warn!(
            step = %step.name,
            attempt = record.attempts,
            of = max_attempts,
            error = %err,
            "step failed, retrying"
        );
        observer.step_retrying(&step.name, record.attempts, &err);
        if !step.retry_delay.is_zero() {
            std::thread::sleep(step.retry_delay);
        }
    }
}

/// Apply the step's failure handler, if any. The record keeps the
/// `failed` state either way.
fn recover(
    step: &Step,
    input: &Payload,
    err: BlueprintError,
    record: &mut StepRecord,
) -> Result<Payload> {
    let Some(handler) = &step.on_failure else {
        return Err(err);
    };

    match handler(input, &err) {
        Ok(output) => {
            warn!(step = %step.name, "failure handler supplied output; continuing");
            record.output = Some(output.clone());
            record.recovered = true;
            Ok(output)
        }
        Err(handler_error) => {
            let recovery = BlueprintError::Recovery {
                step: step.name.clone(),
                handler_error: Box::new(handler_error),
                cause: Box::new(err),
            };
            record.error = Some(recovery.to_string());
            Err(recovery)
        }
    }
}

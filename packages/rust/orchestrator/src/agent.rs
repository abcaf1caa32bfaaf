//! The agent capability.

use blueprint_shared::{Payload, Result};

/// Anything that turns a structured input map into a structured output map.
///
/// Agents are stateless with respect to a run: everything they need arrives
/// in `input` (the cumulative result map of the run so far).
pub trait Agent: Send + Sync {
    /// Short identifier used in logs.
    fn name(&self) -> &str;

    /// Produce this agent's output for `input`.
    fn execute(&self, input: &Payload) -> Result<Payload>;
}

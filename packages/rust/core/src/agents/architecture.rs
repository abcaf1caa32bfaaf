//! Target solution architecture.

use std::sync::Arc;

use tracing::instrument;

use blueprint_orchestrator::Agent;
use blueprint_shared::{Payload, Result};

use super::{DISCOVER, GenerationSettings, Generator, UNDERSTAND, section};
use crate::completion::CompletionProvider;

pub const DEFAULT_TEMPERATURE: f32 = 0.2;

const MISSING_CURRENT_STATE: &str = "No current state assessment provided.";
const MISSING_RECOMMENDATION: &str = "No strategic recommendation provided.";

const SYSTEM_PROMPT: &str = "\
You are a solution architect for generative AI systems. Design the target \
architecture that delivers the recommended use case on top of the current \
state: components, data flows, integration points and hosting. Include one \
Mermaid flowchart of the main data flow. Respond in markdown.";

/// Designs the solution from the `understand` and `discover` sections.
pub struct SolutionArchitectureAgent {
    generator: Generator,
}

impl SolutionArchitectureAgent {
    pub fn new(completion: Arc<dyn CompletionProvider>, settings: GenerationSettings) -> Self {
        Self {
            generator: Generator::new(completion, settings),
        }
    }
}

impl Agent for SolutionArchitectureAgent {
    fn name(&self) -> &str {
        "solution_architecture"
    }

    #[instrument(skip_all, fields(agent = "solution_architecture"))]
    fn execute(&self, input: &Payload) -> Result<Payload> {
        let current_state = section(input, UNDERSTAND).unwrap_or(MISSING_CURRENT_STATE);
        let recommendation = section(input, DISCOVER).unwrap_or(MISSING_RECOMMENDATION);

        let user_prompt = format!(
            "### CURRENT STATE ASSESSMENT\n{current_state}\n\n\
             ### STRATEGIC RECOMMENDATION\n{recommendation}\n\n\
             Design the technical solution for the recommendation."
        );
        self.generator.generate(SYSTEM_PROMPT, user_prompt)
    }
}

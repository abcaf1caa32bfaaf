//! Governance, risk and compliance review.

use std::sync::Arc;

use tracing::instrument;

use blueprint_orchestrator::Agent;
use blueprint_shared::{Payload, Result};

use super::{ARCHITECT, GenerationSettings, Generator, UNDERSTAND, section};
use crate::completion::CompletionProvider;

pub const DEFAULT_TEMPERATURE: f32 = 0.0;

const MISSING_CURRENT_STATE: &str = "No current state assessment provided.";
const MISSING_ARCHITECTURE: &str = "No solution architecture provided.";

const SYSTEM_PROMPT: &str = "\
You are an AI governance and risk lead. Review the proposed architecture \
against the current state and set out data privacy, security, model risk and \
regulatory controls, with an owner for each. Respond in markdown.";

/// Reviews the `architect` section against the `understand` section.
pub struct GovernanceAgent {
    generator: Generator,
}

impl GovernanceAgent {
    pub fn new(completion: Arc<dyn CompletionProvider>, settings: GenerationSettings) -> Self {
        Self {
            generator: Generator::new(completion, settings),
        }
    }
}

impl Agent for GovernanceAgent {
    fn name(&self) -> &str {
        "governance"
    }

    #[instrument(skip_all, fields(agent = "governance"))]
    fn execute(&self, input: &Payload) -> Result<Payload> {
        let current_state = section(input, UNDERSTAND).unwrap_or(MISSING_CURRENT_STATE);
        let architecture = section(input, ARCHITECT).unwrap_or(MISSING_ARCHITECTURE);

        let user_prompt = format!(
            "### CURRENT STATE ASSESSMENT\n{current_state}\n\n\
             ### SOLUTION ARCHITECTURE\n{architecture}\n\n\
             Define the governance and risk controls for this solution."
        );
        self.generator.generate(SYSTEM_PROMPT, user_prompt)
    }
}

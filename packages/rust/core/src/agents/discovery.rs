//! Use-case discovery and strategic recommendation.

use std::sync::Arc;

use tracing::instrument;

use blueprint_orchestrator::Agent;
use blueprint_shared::{Payload, Result};

use super::{CONTENT_KEY, GenerationSettings, Generator, UNDERSTAND, section};
use crate::completion::CompletionProvider;

pub const DEFAULT_TEMPERATURE: f32 = 0.2;

const MISSING_CURRENT_STATE: &str = "No current state assessment provided.";

const SYSTEM_PROMPT: &str = "\
You are a generative AI strategy consultant. From a current-state assessment, \
propose a short list of concrete AI use cases, rate each one for business value \
and feasibility, and finish with a single strategic recommendation for the \
statement of work. Respond in markdown.";

/// Proposes AI use cases from the `understand` section.
///
/// Also accepts a bare `{"content": ..}` input when run outside an
/// orchestrated flow.
pub struct UseCaseDiscoveryAgent {
    generator: Generator,
}

impl UseCaseDiscoveryAgent {
    pub fn new(completion: Arc<dyn CompletionProvider>, settings: GenerationSettings) -> Self {
        Self {
            generator: Generator::new(completion, settings),
        }
    }
}

impl Agent for UseCaseDiscoveryAgent {
    fn name(&self) -> &str {
        "use_case_discovery"
    }

    #[instrument(skip_all, fields(agent = "use_case_discovery"))]
    fn execute(&self, input: &Payload) -> Result<Payload> {
        let current_state = section(input, UNDERSTAND)
            .or_else(|| input.get(CONTENT_KEY).and_then(|v| v.as_str()))
            .unwrap_or(MISSING_CURRENT_STATE);

        let user_prompt = format!(
            "### CURRENT STATE ASSESSMENT\n{current_state}\n\n\
             Propose AI use cases and a final strategic recommendation for the statement of work."
        );
        self.generator.generate(SYSTEM_PROMPT, user_prompt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::testing::{RecordingCompletion, payload};
    use serde_json::json;

    fn agent(completion: Arc<RecordingCompletion>) -> UseCaseDiscoveryAgent {
        UseCaseDiscoveryAgent::new(completion, GenerationSettings::new("m", DEFAULT_TEMPERATURE))
    }

    #[test]
    fn reads_understand_section() {
        let completion = Arc::new(RecordingCompletion::default());
        let output = agent(completion.clone())
            .execute(&payload(json!({ "understand": { "content": "Legacy CRM, no data lake." } })))
            .unwrap();

        assert_eq!(output["content"], json!("generated #1"));
        let request = &completion.requests()[0];
        assert!(request.user_prompt.contains("Legacy CRM, no data lake."));
        assert_eq!(request.temperature, DEFAULT_TEMPERATURE);
    }

    #[test]
    fn accepts_direct_content() {
        let completion = Arc::new(RecordingCompletion::default());
        agent(completion.clone())
            .execute(&payload(json!({ "content": "Direct assessment." })))
            .unwrap();
        assert!(completion.requests()[0].user_prompt.contains("Direct assessment."));
    }

    #[test]
    fn falls_back_to_placeholder() {
        let completion = Arc::new(RecordingCompletion::default());
        agent(completion.clone()).execute(&Payload::new()).unwrap();
        assert!(completion.requests()[0].user_prompt.contains(MISSING_CURRENT_STATE));
    }
}

//! Final document synthesis.

use std::sync::Arc;

use tracing::instrument;

use blueprint_orchestrator::Agent;
use blueprint_shared::{Payload, Result};

use super::{ARCHITECT, DISCOVER, GOVERN, GenerationSettings, Generator, UNDERSTAND, section};
use crate::completion::CompletionProvider;

pub const DEFAULT_TEMPERATURE: f32 = 0.3;

const MISSING_SECTION: &str = "N/A";

const SYSTEM_PROMPT: &str = "\
You are a principal consultant writing a proposal statement of work for a \
generative AI implementation. Merge the supplied sections into one coherent \
document in a professional consulting tone. Use # for main headers, ## for \
subheaders, bullet points for lists and **bold** for emphasis. Avoid tables \
and code blocks except for Mermaid diagrams carried over from the sections.";

/// Merges all four prior sections into the final markdown document.
pub struct BlueprintSynthesizerAgent {
    generator: Generator,
}

impl BlueprintSynthesizerAgent {
    pub fn new(completion: Arc<dyn CompletionProvider>, settings: GenerationSettings) -> Self {
        Self {
            generator: Generator::new(completion, settings),
        }
    }
}

impl Agent for BlueprintSynthesizerAgent {
    fn name(&self) -> &str {
        "blueprint_synthesizer"
    }

    #[instrument(skip_all, fields(agent = "blueprint_synthesizer"))]
    fn execute(&self, input: &Payload) -> Result<Payload> {
        let understanding = section(input, UNDERSTAND).unwrap_or(MISSING_SECTION);
        let discovery = section(input, DISCOVER).unwrap_or(MISSING_SECTION);
        let architecture = section(input, ARCHITECT).unwrap_or(MISSING_SECTION);
        let governance = section(input, GOVERN).unwrap_or(MISSING_SECTION);

        let user_prompt = format!(
            "### CURRENT STATE ASSESSMENT\n{understanding}\n\n\
             ### STRATEGIC RECOMMENDATION\n{discovery}\n\n\
             ### TECHNICAL DESIGN\n{architecture}\n\n\
             ### GOVERNANCE & RISK\n{governance}\n\n\
             Produce the final statement of work."
        );
        self.generator.generate(SYSTEM_PROMPT, user_prompt)
    }
}

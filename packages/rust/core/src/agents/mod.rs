//! The five generation agents behind a Blueprint run.
//!
//! Each agent reads the sections it depends on from the cumulative map by
//! step name and returns `{"content": <markdown>}`.

use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use blueprint_shared::{Payload, Result};

use crate::completion::{CompletionProvider, CompletionRequest};

mod architecture;
mod discovery;
mod governance;
mod synthesis;
mod understanding;

pub use architecture::{DEFAULT_TEMPERATURE as ARCHITECT_TEMPERATURE, SolutionArchitectureAgent};
pub use discovery::{DEFAULT_TEMPERATURE as DISCOVER_TEMPERATURE, UseCaseDiscoveryAgent};
pub use governance::{DEFAULT_TEMPERATURE as GOVERN_TEMPERATURE, GovernanceAgent};
pub use synthesis::{BlueprintSynthesizerAgent, DEFAULT_TEMPERATURE as SYNTHESIZE_TEMPERATURE};
pub use understanding::{
    DEFAULT_TEMPERATURE as UNDERSTAND_TEMPERATURE, DocumentUnderstandingAgent, NO_CONTEXT_CONTENT,
    NO_CONTEXT_WARNING,
};

// Step names, also the keys of each section in the cumulative map.
pub const UNDERSTAND: &str = "understand";
pub const DISCOVER: &str = "discover";
pub const ARCHITECT: &str = "architect";
pub const GOVERN: &str = "govern";
pub const SYNTHESIZE: &str = "synthesize";

/// Key holding an agent's markdown output.
pub const CONTENT_KEY: &str = "content";

/// Model and sampling temperature for one agent.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationSettings {
    pub model: String,
    pub temperature: f32,
}

impl GenerationSettings {
    pub fn new(model: impl Into<String>, temperature: f32) -> Self {
        Self {
            model: model.into(),
            temperature,
        }
    }
}

/// The `content` of a prior step's section, if it produced one.
pub(crate) fn section<'a>(input: &'a Payload, step: &str) -> Option<&'a str> {
    input
        .get(step)
        .and_then(|v| v.get(CONTENT_KEY))
        .and_then(Value::as_str)
}

/// Shared completion call: prompt pair in, `{"content": ..}` out.
pub(crate) struct Generator {
    completion: Arc<dyn CompletionProvider>,
    settings: GenerationSettings,
}

impl Generator {
    pub(crate) fn new(completion: Arc<dyn CompletionProvider>, settings: GenerationSettings) -> Self {
        Self {
            completion,
            settings,
        }
    }

    pub(crate) fn settings(&self) -> &GenerationSettings {
        &self.settings
    }

    pub(crate) fn generate(&self, system_prompt: &str, user_prompt: String) -> Result<Payload> {
        let request = CompletionRequest {
            system_prompt: system_prompt.to_string(),
            user_prompt,
            model: self.settings.model.clone(),
            temperature: self.settings.temperature,
        };
        let content = self.completion.complete(&request)?;
        debug!(chars = content.len(), "section generated");

        let mut output = Payload::new();
        output.insert(CONTENT_KEY.into(), Value::String(content));
        Ok(output)
    }
}

//! Current-state assessment grounded in retrieved document context.

use std::sync::Arc;

use serde_json::Value;
use tracing::{info, instrument, warn};

use blueprint_orchestrator::Agent;
use blueprint_retrieval::{RetrievalPipeline, RetrievedContext};
use blueprint_shared::{BlueprintError, Payload, Result};

use super::{CONTENT_KEY, GenerationSettings, Generator};
use crate::completion::CompletionProvider;

pub const DEFAULT_TEMPERATURE: f32 = 0.1;
const DEFAULT_K: usize = 5;
const DEFAULT_QUERY: &str =
    "What are the business goals, systems, data assets, and constraints mentioned in this document?";

/// Section content returned when the index holds nothing relevant.
pub const NO_CONTEXT_CONTENT: &str = "No relevant context found in the uploaded documents to perform a business architecture assessment.";
pub const NO_CONTEXT_WARNING: &str = "No relevant context found in the similarity index.";

const SYSTEM_PROMPT: &str = "\
You are a business architecture analyst preparing the current-state assessment \
for a generative AI engagement. Using only the supplied document excerpts, \
describe the organization's business goals, existing systems, data assets and \
constraints. Do not invent facts that the excerpts do not support. Respond in \
markdown with one heading per topic.";

/// Retrieves the chunks closest to `input.query` and asks the model for a
/// current-state assessment of them.
///
/// Reads `query` (string) and `k` (positive integer) from its input, with
/// defaults when absent.
pub struct DocumentUnderstandingAgent {
    retrieval: Arc<RetrievalPipeline>,
    generator: Generator,
}

impl DocumentUnderstandingAgent {
    pub fn new(
        retrieval: Arc<RetrievalPipeline>,
        completion: Arc<dyn CompletionProvider>,
        settings: GenerationSettings,
    ) -> Self {
        Self {
            retrieval,
            generator: Generator::new(completion, settings),
        }
    }
}

impl Agent for DocumentUnderstandingAgent {
    fn name(&self) -> &str {
        "document_understanding"
    }

    #[instrument(skip_all, fields(agent = "document_understanding", model = %self.generator.settings().model))]
    fn execute(&self, input: &Payload) -> Result<Payload> {
        let query = match input.get("query") {
            None => DEFAULT_QUERY,
            Some(Value::String(q)) => q.as_str(),
            Some(other) => {
                return Err(BlueprintError::invalid_argument(format!(
                    "query must be a string, got {other}"
                )));
            }
        };
        let k = match input.get("k") {
            None => DEFAULT_K,
            Some(v) => v
                .as_u64()
                .filter(|k| *k > 0)
                .and_then(|k| usize::try_from(k).ok())
                .ok_or_else(|| {
                    BlueprintError::invalid_argument(format!("k must be a positive integer, got {v}"))
                })?,
        };

        info!(k, "retrieving context");
        let context = match self.retrieval.retrieve(query, k)? {
            RetrievedContext::Found { context, .. } => context,
            RetrievedContext::NotFound => {
                warn!("no context found; skipping generation");
                let mut output = Payload::new();
                output.insert(CONTENT_KEY.into(), Value::String(NO_CONTEXT_CONTENT.into()));
                output.insert("warning".into(), Value::String(NO_CONTEXT_WARNING.into()));
                return Ok(output);
            }
        };

        let user_prompt = format!(
            "### DOCUMENT EXCERPTS\n{context}\n\n### REQUEST\n{query}\n\n\
             Produce the current-state assessment."
        );
        self.generator.generate(SYSTEM_PROMPT, user_prompt)
    }
}

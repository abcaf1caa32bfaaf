//! Explicit service assembly.
//!
//! Providers are built once at startup by [`Services::from_config`] (or
//! injected with [`Services::new`]). Each document gets its own
//! [`Session`]: a fresh retrieval pipeline with an empty index plus the
//! five-step orchestrator wired to it.

use std::sync::Arc;

use serde_json::Value;
use tracing::info;

use blueprint_orchestrator::{Orchestrator, Step, failed_status};
use blueprint_retrieval::{
    Chunker, Cl100kTokenizer, DocumentExtractor, Embedder, OpenAiEmbedder, RetrievalPipeline,
    TextExtractor, Tokenizer,
};
use blueprint_shared::{AppConfig, BlueprintError, Payload, Result, validate_config};

use crate::agents::{
    ARCHITECT, ARCHITECT_TEMPERATURE, BlueprintSynthesizerAgent, CONTENT_KEY, DISCOVER,
    DISCOVER_TEMPERATURE, DocumentUnderstandingAgent, GOVERN, GOVERN_TEMPERATURE, GenerationSettings,
    GovernanceAgent, SYNTHESIZE, SYNTHESIZE_TEMPERATURE, SolutionArchitectureAgent, UNDERSTAND,
    UNDERSTAND_TEMPERATURE, UseCaseDiscoveryAgent,
};
use crate::completion::{ChatCompletionClient, CompletionProvider};

/// The external collaborators a run depends on.
#[derive(Clone)]
pub struct Providers {
    pub extractor: Arc<dyn TextExtractor>,
    pub tokenizer: Arc<dyn Tokenizer>,
    pub embedder: Arc<dyn Embedder>,
    pub completion: Arc<dyn CompletionProvider>,
}

/// Long-lived services shared by every session.
pub struct Services {
    config: AppConfig,
    providers: Providers,
}

/// Per-document state: one index, one orchestrator.
pub struct Session {
    pub retrieval: Arc<RetrievalPipeline>,
    pub orchestrator: Orchestrator,
}

impl Services {
    /// Build the default providers (PDF/text extraction, `cl100k_base`,
    /// OpenAI-compatible embeddings and chat completions) from `config`.
    pub fn from_config(config: AppConfig) -> Result<Self> {
        validate_config(&config)?;
        let providers = Providers {
            extractor: Arc::new(DocumentExtractor::new()),
            tokenizer: Arc::new(Cl100kTokenizer::new()?),
            embedder: Arc::new(OpenAiEmbedder::from_config(&config.embedding)?),
            completion: Arc::new(ChatCompletionClient::from_config(&config.completion)?),
        };
        info!(
            embedding_model = %config.embedding.model,
            completion_model = %config.completion.model,
            "services ready"
        );
        Ok(Self { config, providers })
    }

    pub fn new(config: AppConfig, providers: Providers) -> Result<Self> {
        validate_config(&config)?;
        Ok(Self { config, providers })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// A retrieval pipeline over a fresh, empty index.
    pub fn retrieval_pipeline(&self) -> Result<RetrievalPipeline> {
        let chunker = Chunker::new(
            self.providers.tokenizer.clone(),
            self.config.chunking.chunk_size,
            self.config.chunking.overlap,
        )?;
        RetrievalPipeline::new(
            self.providers.extractor.clone(),
            chunker,
            self.providers.embedder.clone(),
        )
    }

    /// Start a document-processing session.
    pub fn session(&self) -> Result<Session> {
        let retrieval = Arc::new(self.retrieval_pipeline()?);
        let orchestrator = self.orchestrator(retrieval.clone())?;
        Ok(Session {
            retrieval,
            orchestrator,
        })
    }

    /// Seed map for a run: the grounding query and how many chunks to use.
    pub fn initial_input(&self) -> Payload {
        let mut input = Payload::new();
        input.insert(
            "query".into(),
            Value::String(self.config.retrieval.query.clone()),
        );
        input.insert("k".into(), Value::from(self.config.retrieval.top_k));
        input
    }

    /// understand -> discover -> architect -> govern -> synthesize
    fn orchestrator(&self, retrieval: Arc<RetrievalPipeline>) -> Result<Orchestrator> {
        let completion = &self.providers.completion;
        let settings = |temperature| GenerationSettings::new(&self.config.completion.model, temperature);
        let recover = self.config.orchestrator.recover_failed_sections;

        let steps = vec![
            self.step(
                UNDERSTAND,
                Arc::new(DocumentUnderstandingAgent::new(
                    retrieval,
                    completion.clone(),
                    settings(UNDERSTAND_TEMPERATURE),
                )),
                false,
            ),
            self.step(
                DISCOVER,
                Arc::new(UseCaseDiscoveryAgent::new(
                    completion.clone(),
                    settings(DISCOVER_TEMPERATURE),
                )),
                recover,
            ),
            self.step(
                ARCHITECT,
                Arc::new(SolutionArchitectureAgent::new(
                    completion.clone(),
                    settings(ARCHITECT_TEMPERATURE),
                )),
                recover,
            ),
            self.step(
                GOVERN,
                Arc::new(GovernanceAgent::new(
                    completion.clone(),
                    settings(GOVERN_TEMPERATURE),
                )),
                recover,
            ),
            self.step(
                SYNTHESIZE,
                Arc::new(BlueprintSynthesizerAgent::new(
                    completion.clone(),
                    settings(SYNTHESIZE_TEMPERATURE),
                )),
                false,
            ),
        ];

        Orchestrator::new(steps)
    }

    fn step(
        &self,
        name: &str,
        agent: Arc<dyn blueprint_orchestrator::Agent>,
        recoverable: bool,
    ) -> Step {
        let step = Step::new(name, agent)
            .with_retries(self.config.orchestrator.retries)
            .with_retry_delay(self.config.orchestrator.retry_delay());
        if recoverable {
            step.with_failure_handler(placeholder_section)
        } else {
            step
        }
    }
}

/// Failure handler for intermediate sections: records the failure and
/// leaves a visible placeholder in place of the section text.
pub fn placeholder_section(input: &Payload, error: &BlueprintError) -> Result<Payload> {
    let mut output = failed_status(input, error)?;
    output.insert(
        CONTENT_KEY.into(),
        Value::String(format!("_This section could not be generated: {error}._")),
    );
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::testing::{RecordingCompletion, UnitEmbedder};
    use blueprint_orchestrator::ExecutionState;
    use blueprint_retrieval::TEXT_PLAIN;
    use blueprint_shared::SourceDocument;
    use serde_json::json;

    fn test_config(recover: bool) -> AppConfig {
        let mut config = AppConfig::default();
        config.orchestrator.retry_delay_ms = 0;
        config.orchestrator.recover_failed_sections = recover;
        config.completion.model = "test-model".into();
        config
    }

    fn services(config: AppConfig, completion: Arc<RecordingCompletion>) -> Services {
        Services::new(
            config,
            Providers {
                extractor: Arc::new(DocumentExtractor::new()),
                tokenizer: Arc::new(Cl100kTokenizer::new().unwrap()),
                embedder: Arc::new(UnitEmbedder),
                completion,
            },
        )
        .unwrap()
    }

    fn ingest_sample(session: &Session) {
        session
            .retrieval
            .ingest(&SourceDocument::new(
                b"Claims processing is manual and slow.".to_vec(),
                TEXT_PLAIN,
                "claims.txt",
            ))
            .unwrap();
    }

    #[test]
    fn session_wires_five_steps_in_order() {
        let services = services(test_config(false), Arc::new(RecordingCompletion::default()));
        let session = services.session().unwrap();
        assert_eq!(
            session.orchestrator.step_names(),
            vec![UNDERSTAND, DISCOVER, ARCHITECT, GOVERN, SYNTHESIZE]
        );
        assert_eq!(session.retrieval.indexed_records().unwrap(), 0);
    }

    #[test]
    fn sessions_do_not_share_an_index() {
        let services = services(test_config(false), Arc::new(RecordingCompletion::default()));
        let first = services.session().unwrap();
        ingest_sample(&first);
        let second = services.session().unwrap();
        assert_eq!(first.retrieval.indexed_records().unwrap(), 1);
        assert_eq!(second.retrieval.indexed_records().unwrap(), 0);
    }

    #[test]
    fn initial_input_carries_query_and_k() {
        let services = services(test_config(false), Arc::new(RecordingCompletion::default()));
        let input = services.initial_input();
        assert_eq!(input["k"], json!(5));
        assert!(input["query"].as_str().unwrap().contains("Statement of Work"));
    }

    #[test]
    fn agents_use_configured_model_and_temperatures() {
        let completion = Arc::new(RecordingCompletion::default());
        let services = services(test_config(false), completion.clone());
        let mut session = services.session().unwrap();
        ingest_sample(&session);

        session.orchestrator.execute(services.initial_input()).unwrap();

        let temperatures: Vec<f32> = completion.requests().iter().map(|r| r.temperature).collect();
        assert_eq!(temperatures, vec![0.1, 0.2, 0.2, 0.0, 0.3]);
        assert!(completion.requests().iter().all(|r| r.model == "test-model"));
    }

    #[test]
    fn retries_come_from_config() {
        let completion = Arc::new(RecordingCompletion::failing_on("solution architect"));
        let mut config = test_config(false);
        config.orchestrator.retries = 2;
        let services = services(config, completion);
        let mut session = services.session().unwrap();
        ingest_sample(&session);

        assert!(session.orchestrator.execute(services.initial_input()).is_err());
        let log = session.orchestrator.execution_log();
        assert_eq!(log.len(), 3);
        assert_eq!(log[2].step_name, ARCHITECT);
        assert_eq!(log[2].attempts, 3);
    }

    #[test]
    fn recoverable_sections_get_placeholder_content() {
        let completion = Arc::new(RecordingCompletion::failing_on("solution architect"));
        let services = services(test_config(true), completion.clone());
        let mut session = services.session().unwrap();
        ingest_sample(&session);

        let result = session.orchestrator.execute(services.initial_input()).unwrap();

        assert_eq!(result[ARCHITECT]["status"], json!("FAILED"));
        assert!(
            result[ARCHITECT]["content"]
                .as_str()
                .unwrap()
                .starts_with("_This section could not be generated")
        );
        let architect = &session.orchestrator.execution_log()[2];
        assert_eq!(architect.state, ExecutionState::Failed);
        assert!(architect.recovered);
        assert_eq!(session.orchestrator.successful_steps().len(), 4);

        // The synthesizer still sees the placeholder text.
        let last = completion.requests().pop().unwrap();
        assert!(last.user_prompt.contains("_This section could not be generated"));
    }

    #[test]
    fn first_and_last_steps_never_recover() {
        let completion = Arc::new(RecordingCompletion::failing_on("principal consultant"));
        let services = services(test_config(true), completion);
        let mut session = services.session().unwrap();
        ingest_sample(&session);

        assert!(session.orchestrator.execute(services.initial_input()).is_err());
        assert_eq!(session.orchestrator.failed_steps(), vec![SYNTHESIZE]);
    }

    #[test]
    fn invalid_config_rejected() {
        let mut config = test_config(false);
        config.chunking.overlap = config.chunking.chunk_size;
        let result = Services::new(
            config,
            Providers {
                extractor: Arc::new(DocumentExtractor::new()),
                tokenizer: Arc::new(Cl100kTokenizer::new().unwrap()),
                embedder: Arc::new(UnitEmbedder),
                completion: Arc::new(RecordingCompletion::default()),
            },
        );
        assert!(result.is_err());
    }

    #[test]
    fn placeholder_section_keeps_status_and_error() {
        let err = BlueprintError::Provider("timeout".into());
        let output = placeholder_section(&Payload::new(), &err).unwrap();
        assert_eq!(output["status"], json!("FAILED"));
        assert_eq!(output["error"], json!("provider error: timeout"));
        assert!(output["content"].as_str().unwrap().contains("timeout"));
    }
}

//! End-to-end generation: document bytes -> ingested index -> five steps ->
//! final markdown.

use std::time::{Duration, Instant};

use serde::Serialize;
use serde_json::Value;
use tracing::{error, info, instrument};

use blueprint_orchestrator::{StepObserver, StepRecord};
use blueprint_retrieval::IngestStats;
use blueprint_shared::{BlueprintError, Payload, Result, SourceDocument};

use crate::agents::{CONTENT_KEY, SYNTHESIZE};
use crate::services::Services;

/// Output of [`generate_blueprint`].
#[derive(Debug, Clone, Serialize)]
pub struct BlueprintResult {
    /// The synthesized document.
    pub markdown: String,
    pub ingest: IngestStats,
    /// Full cumulative map: initial input plus every step's section.
    pub sections: Payload,
    pub execution_log: Vec<StepRecord>,
    #[serde(skip)]
    pub elapsed: Duration,
}

/// Run the full flow for one document in a fresh session.
///
/// 1. Ingest: extract, chunk, embed, index
/// 2. Orchestrate: understand, discover, architect, govern, synthesize
/// 3. Pick the synthesized section as the final document
#[instrument(skip_all, fields(document_id = %document.id, source = %document.source))]
pub fn generate_blueprint(
    services: &Services,
    document: &SourceDocument,
    observer: &dyn StepObserver,
) -> Result<BlueprintResult> {
    let start = Instant::now();
    let mut session = services.session()?;

    // --- Phase 1: Ingestion ---
    let ingest = session.retrieval.ingest(document)?;
    info!(
        chunks = ingest.chunks_stored,
        text_length = ingest.text_length,
        "document ingested"
    );

    // --- Phase 2: Orchestration ---
    let sections = match session
        .orchestrator
        .execute_with(services.initial_input(), observer)
    {
        Ok(sections) => sections,
        Err(err) => {
            error!(
                failed = ?session.orchestrator.failed_steps(),
                succeeded = ?session.orchestrator.successful_steps(),
                "blueprint generation failed"
            );
            return Err(err);
        }
    };

    // --- Phase 3: Final document ---
    let markdown = sections
        .get(SYNTHESIZE)
        .and_then(|v| v.get(CONTENT_KEY))
        .and_then(Value::as_str)
        .ok_or_else(|| BlueprintError::Internal("synthesis step produced no content".into()))?
        .to_string();

    let elapsed = start.elapsed();
    info!(chars = markdown.len(), elapsed_ms = elapsed.as_millis() as u64, "blueprint generated");

    Ok(BlueprintResult {
        markdown,
        ingest,
        sections,
        execution_log: session.orchestrator.execution_log().to_vec(),
        elapsed,
    })
}

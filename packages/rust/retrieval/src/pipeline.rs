//! Retrieval pipeline: document bytes to indexed chunks, query to context.

use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;
use serde_json::Value;
use tracing::{info, instrument, warn};

use blueprint_shared::{BlueprintError, DocumentId, Metadata, Result, SourceDocument};

use crate::chunker::Chunker;
use crate::embedding::Embedder;
use crate::extraction::TextExtractor;
use crate::index::{RetrievalResult, SimilarityIndex};

/// Counts reported by [`RetrievalPipeline::ingest`].
///
/// Whenever at least one chunk is produced the three counts are equal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestStats {
    pub document_id: DocumentId,
    pub chunks_created: usize,
    pub embeddings_generated: usize,
    pub chunks_stored: usize,
    /// Characters of extracted text.
    pub text_length: usize,
}

/// Result of [`RetrievalPipeline::retrieve`].
#[derive(Debug, Clone)]
pub enum RetrievedContext {
    /// Ranked hits and their texts joined into one context string.
    Found {
        context: String,
        hits: Vec<RetrievalResult>,
    },
    /// Nothing indexed or nothing matched; callers should short-circuit.
    NotFound,
}

impl RetrievedContext {
    pub fn context(&self) -> Option<&str> {
        match self {
            Self::Found { context, .. } => Some(context),
            Self::NotFound => None,
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, Self::Found { .. })
    }
}

/// Extraction, chunking, embedding and indexing behind one facade.
///
/// The index is not synchronized on its own; the pipeline serializes access
/// to it so one pipeline can be shared across threads.
pub struct RetrievalPipeline {
    extractor: Arc<dyn TextExtractor>,
    chunker: Chunker,
    embedder: Arc<dyn Embedder>,
    index: Mutex<SimilarityIndex>,
}

impl RetrievalPipeline {
    /// Build a pipeline with an empty index sized to the embedder.
    pub fn new(
        extractor: Arc<dyn TextExtractor>,
        chunker: Chunker,
        embedder: Arc<dyn Embedder>,
    ) -> Result<Self> {
        let index = SimilarityIndex::new(embedder.dimension())?;
        Ok(Self {
            extractor,
            chunker,
            embedder,
            index: Mutex::new(index),
        })
    }

    /// Number of records currently indexed.
    pub fn indexed_records(&self) -> Result<usize> {
        Ok(self.lock_index()?.len())
    }

    /// Extract, chunk, embed and index `document`.
    ///
    /// A document with no extractable text is a no-op that reports zero
    /// counts; the embedder and index are not touched.
    #[instrument(skip_all, fields(document_id = %document.id, content_type = %document.content_type))]
    pub fn ingest(&self, document: &SourceDocument) -> Result<IngestStats> {
        let text = self
            .extractor
            .extract(&document.bytes, &document.content_type)?;
        let text_length = text.chars().count();
        info!(text_length, source = %document.source, "extracted text");

        let chunks = self.chunker.chunk(&text)?;
        if chunks.is_empty() {
            warn!("no chunks produced; document is empty");
            return Ok(IngestStats {
                document_id: document.id,
                chunks_created: 0,
                embeddings_generated: 0,
                chunks_stored: 0,
                text_length,
            });
        }
        info!(chunks = chunks.len(), "chunked text");

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let embeddings = self.embedder.embed(&texts)?;
        if embeddings.len() != texts.len() {
            return Err(BlueprintError::Provider(format!(
                "embedder returned {} vectors for {} chunks",
                embeddings.len(),
                texts.len()
            )));
        }

        let metadata: Vec<Metadata> = chunks
            .into_iter()
            .map(|chunk| chunk_metadata(document, chunk.sequence_index, chunk.text))
            .collect();
        let ids = self.lock_index()?.insert(&embeddings, metadata)?;

        let stats = IngestStats {
            document_id: document.id,
            chunks_created: texts.len(),
            embeddings_generated: embeddings.len(),
            chunks_stored: ids.len(),
            text_length,
        };
        info!(chunks_stored = stats.chunks_stored, "ingestion complete");
        Ok(stats)
    }

    /// Embed `query` and return the `k` closest chunk texts as one context
    /// string, or [`RetrievedContext::NotFound`] when nothing is indexed.
    #[instrument(skip_all, fields(k = k))]
    pub fn retrieve(&self, query: &str, k: usize) -> Result<RetrievedContext> {
        if k == 0 {
            return Err(BlueprintError::invalid_argument("k must be greater than 0"));
        }
        if query.trim().is_empty() {
            return Err(BlueprintError::invalid_argument("query must not be empty"));
        }
        if self.lock_index()?.is_empty() {
            info!("index is empty; no context");
            return Ok(RetrievedContext::NotFound);
        }

        let mut vectors = self.embedder.embed(&[query.to_string()])?;
        let query_vector = vectors
            .pop()
            .ok_or_else(|| BlueprintError::Provider("embedder returned no query vector".into()))?;

        let hits = self.lock_index()?.search(&query_vector, k)?;
        if hits.is_empty() {
            return Ok(RetrievedContext::NotFound);
        }

        let context = format_context(&hits);
        info!(hits = hits.len(), "retrieved context");
        Ok(RetrievedContext::Found { context, hits })
    }

    fn lock_index(&self) -> Result<MutexGuard<'_, SimilarityIndex>> {
        self.index
            .lock()
            .map_err(|_| BlueprintError::Internal("similarity index lock poisoned".into()))
    }
}

/// Per-chunk metadata. Caller extras go in first so the fixed keys win.
fn chunk_metadata(document: &SourceDocument, chunk_index: usize, text: String) -> Metadata {
    let mut meta = document.extra_metadata.clone();
    meta.insert("document_id".into(), Value::String(document.id.to_string()));
    meta.insert("chunk_index".into(), Value::from(chunk_index));
    meta.insert("text".into(), Value::String(text));
    meta.insert(
        "content_type".into(),
        Value::String(document.content_type.clone()),
    );
    meta.insert("source".into(), Value::String(document.source.clone()));
    meta
}

fn format_context(hits: &[RetrievalResult]) -> String {
    hits.iter()
        .enumerate()
        .map(|(i, hit)| {
            let text = hit
                .metadata
                .get("text")
                .and_then(Value::as_str)
                .unwrap_or_default();
            format!("--- Context Chunk {} ---\n{text}", i + 1)
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

//! Retrieval for Blueprint: turns document bytes into a queryable
//! similarity index and queries into ranked context.
//!
//! - [`chunker`]: token-aware overlapping windows
//! - [`index`]: exact nearest-neighbor store
//! - [`extraction`] / [`embedding`]: external collaborators behind traits
//! - [`pipeline`]: ingestion and retrieval facade

pub mod chunker;
pub mod embedding;
pub mod extraction;
pub mod index;
pub mod pipeline;

pub use chunker::{CL100K_BASE, Chunk, Chunker, Cl100kTokenizer, Tokenizer, chunk_text};
pub use embedding::{Embedder, OpenAiEmbedder};
pub use extraction::{
    APPLICATION_PDF, DocumentExtractor, SUPPORTED_CONTENT_TYPES, TEXT_MARKDOWN, TEXT_PLAIN,
    TextExtractor, content_type_for_path,
};
pub use index::{IndexedRecord, RECORD_ID_KEY, RetrievalResult, SimilarityIndex};
pub use pipeline::{IngestStats, RetrievalPipeline, RetrievedContext};

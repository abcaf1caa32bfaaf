//! Core domain types shared by the retrieval and orchestration crates.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Structured map flowing into and out of agents (and the cumulative
/// result map threaded through an orchestrator run).
pub type Payload = serde_json::Map<String, serde_json::Value>;

/// Side-channel metadata attached to every indexed record.
pub type Metadata = serde_json::Map<String, serde_json::Value>;

// ---------------------------------------------------------------------------
// DocumentId
// ---------------------------------------------------------------------------

/// A UUID v7 wrapper for uploaded source documents (time-sortable).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(pub Uuid);

impl DocumentId {
    /// Generate a new time-sortable document identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for DocumentId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for DocumentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for DocumentId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

// ---------------------------------------------------------------------------
// SourceDocument
// ---------------------------------------------------------------------------

/// Raw bytes of an uploaded document plus what the host knows about it.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    /// Identifier assigned at upload.
    pub id: DocumentId,
    /// Raw file bytes.
    pub bytes: Vec<u8>,
    /// Declared MIME type (e.g. `application/pdf`).
    pub content_type: String,
    /// Where the bytes came from (file path, upload name).
    pub source: String,
    /// Extra metadata merged into every chunk record.
    pub extra_metadata: Metadata,
}

impl SourceDocument {
    /// Build a source document with a fresh identifier and no extra metadata.
    pub fn new(bytes: Vec<u8>, content_type: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            id: DocumentId::new(),
            bytes,
            content_type: content_type.into(),
            source: source.into(),
            extra_metadata: Metadata::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_id_roundtrip() {
        let id = DocumentId::new();
        let s = id.to_string();
        let parsed: DocumentId = s.parse().expect("parse DocumentId");
        assert_eq!(id, parsed);
    }

    #[test]
    fn document_id_serializes_transparently() {
        let id = DocumentId::new();
        let json = serde_json::to_string(&id).expect("serialize");
        assert_eq!(json, format!("\"{id}\""));
    }

    #[test]
    fn source_document_defaults() {
        let doc = SourceDocument::new(b"hello".to_vec(), "text/plain", "notes.txt");
        assert_eq!(doc.content_type, "text/plain");
        assert_eq!(doc.source, "notes.txt");
        assert!(doc.extra_metadata.is_empty());
    }
}

//! Deterministic, token-aware text chunking.
//!
//! Text is tokenized once with a fixed vocabulary and cut into overlapping
//! windows of `chunk_size` tokens advancing by `chunk_size - overlap`.

use std::sync::Arc;

use serde::Serialize;
use tiktoken_rs::CoreBPE;

use blueprint_shared::{BlueprintError, Result};

/// Name of the fixed vocabulary used by [`Cl100kTokenizer`].
pub const CL100K_BASE: &str = "cl100k_base";

/// Size of the ordinary (non-special) `cl100k_base` vocabulary. Ordinary
/// encoding only ever yields ids below this.
const CL100K_ORDINARY_TOKENS: u32 = 100_256;

// ---------------------------------------------------------------------------
// Tokenizer
// ---------------------------------------------------------------------------

/// A fixed, versioned token vocabulary.
pub trait Tokenizer: Send + Sync {
    /// Encode text to token ids.
    fn encode(&self, text: &str) -> Vec<u32>;

    /// Decode token ids back to text. A multi-byte character split at either
    /// end of `tokens` comes back as U+FFFD; every token is kept. Fails with
    /// `Decode` for ids outside the vocabulary.
    fn decode(&self, tokens: &[u32]) -> Result<String>;

    /// Vocabulary name for tracing.
    fn name(&self) -> &str;
}

/// The `cl100k_base` BPE vocabulary.
pub struct Cl100kTokenizer {
    bpe: CoreBPE,
}

impl Cl100kTokenizer {
    /// Load the bundled vocabulary.
    pub fn new() -> Result<Self> {
        let bpe = tiktoken_rs::cl100k_base().map_err(|e| {
            BlueprintError::config(format!("failed to load {CL100K_BASE} vocabulary: {e}"))
        })?;
        Ok(Self { bpe })
    }
}

impl Tokenizer for Cl100kTokenizer {
    fn encode(&self, text: &str) -> Vec<u32> {
        self.bpe.encode_ordinary(text)
    }

    fn decode(&self, tokens: &[u32]) -> Result<String> {
        if let Some(bad) = tokens.iter().find(|t| **t >= CL100K_ORDINARY_TOKENS) {
            return Err(BlueprintError::decode(format!(
                "token {bad} is not in the {CL100K_BASE} vocabulary"
            )));
        }
        let bytes: Vec<u8> = self
            .bpe
            ._decode_native_and_split(tokens.to_vec())
            .flatten()
            .collect();
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    fn name(&self) -> &str {
        CL100K_BASE
    }
}

// ---------------------------------------------------------------------------
// Chunk
// ---------------------------------------------------------------------------

/// One overlapping, token-bounded slice of a larger text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Chunk {
    /// 0-based position in the chunk sequence (monotonic, gapless).
    pub sequence_index: usize,
    /// Decoded window text (or the untouched input for single-chunk texts).
    pub text: String,
    /// First token of the window in the full token stream.
    pub token_start: usize,
    /// One past the last token of the window.
    pub token_end: usize,
}

// ---------------------------------------------------------------------------
// Chunker
// ---------------------------------------------------------------------------

/// Splits text with a fixed tokenizer and validated window parameters.
#[derive(Clone)]
pub struct Chunker {
    tokenizer: Arc<dyn Tokenizer>,
    chunk_size: usize,
    overlap: usize,
}

impl Chunker {
    /// Build a chunker, rejecting `chunk_size == 0` and `overlap >= chunk_size`.
    pub fn new(tokenizer: Arc<dyn Tokenizer>, chunk_size: usize, overlap: usize) -> Result<Self> {
        validate_window(chunk_size, overlap)?;
        Ok(Self {
            tokenizer,
            chunk_size,
            overlap,
        })
    }

    /// Chunk `text` with this chunker's parameters.
    pub fn chunk(&self, text: &str) -> Result<Vec<Chunk>> {
        chunk_text(self.tokenizer.as_ref(), text, self.chunk_size, self.overlap)
    }

    /// Maximum tokens per chunk.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Tokens shared between consecutive chunks.
    pub fn overlap(&self) -> usize {
        self.overlap
    }
}

impl std::fmt::Debug for Chunker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Chunker")
            .field("tokenizer", &self.tokenizer.name())
            .field("chunk_size", &self.chunk_size)
            .field("overlap", &self.overlap)
            .finish()
    }
}

fn validate_window(chunk_size: usize, overlap: usize) -> Result<()> {
    if chunk_size == 0 {
        return Err(BlueprintError::invalid_argument(
            "chunk_size must be greater than 0",
        ));
    }
    if overlap >= chunk_size {
        return Err(BlueprintError::invalid_argument(format!(
            "overlap ({overlap}) must be less than chunk_size ({chunk_size})"
        )));
    }
    Ok(())
}

/// Split `text` into overlapping token windows.
///
/// Blank input yields no chunks. Input that fits in one window is returned
/// verbatim rather than re-decoded. Every token lands in at least one
/// window; a character split across two windows is replaced by U+FFFD at
/// the cut.
pub fn chunk_text(
    tokenizer: &dyn Tokenizer,
    text: &str,
    chunk_size: usize,
    overlap: usize,
) -> Result<Vec<Chunk>> {
    validate_window(chunk_size, overlap)?;

    if text.trim().is_empty() {
        return Ok(Vec::new());
    }

    let tokens = tokenizer.encode(text);
    if tokens.len() <= chunk_size {
        return Ok(vec![Chunk {
            sequence_index: 0,
            text: text.to_string(),
            token_start: 0,
            token_end: tokens.len(),
        }]);
    }

    let step = chunk_size - overlap;
    let mut chunks = Vec::with_capacity(tokens.len().div_ceil(step));
    let mut start = 0;

    while start < tokens.len() {
        let end = (start + chunk_size).min(tokens.len());
        chunks.push(Chunk {
            sequence_index: chunks.len(),
            text: tokenizer.decode(&tokens[start..end])?,
            token_start: start,
            token_end: end,
        });

        if end >= tokens.len() {
            break;
        }
        start += step;
    }

    tracing::debug!(
        tokenizer = tokenizer.name(),
        tokens = tokens.len(),
        chunks = chunks.len(),
        chunk_size,
        overlap,
        "chunked text"
    );

    Ok(chunks)
}

//! Shared types, error model, and configuration for Blueprint.
//!
//! This crate is the foundation depended on by all other Blueprint crates.
//! It provides:
//! - [`BlueprintError`] — the unified error type
//! - Domain types ([`DocumentId`], [`SourceDocument`], [`Payload`], [`Metadata`])
//! - Configuration ([`AppConfig`] and its sections, config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, ChunkingConfig, CompletionConfig, EmbeddingConfig, OrchestratorConfig,
    RetrievalConfig, config_dir, config_file_path, init_config, load_config, load_config_from,
    resolve_api_key, validate_api_keys, validate_config,
};
pub use error::{BlueprintError, Result};
pub use types::{DocumentId, Metadata, Payload, SourceDocument};

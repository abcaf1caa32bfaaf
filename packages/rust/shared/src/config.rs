//! Application configuration for Blueprint.
//!
//! User config lives at `~/.blueprint/blueprint.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{BlueprintError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "blueprint.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".blueprint";

// ---------------------------------------------------------------------------
// Config structs (matching blueprint.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Embedding provider settings.
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Completion provider settings.
    #[serde(default)]
    pub completion: CompletionConfig,

    /// Token chunking parameters.
    #[serde(default)]
    pub chunking: ChunkingConfig,

    /// Retrieval parameters for the grounding step.
    #[serde(default)]
    pub retrieval: RetrievalConfig,

    /// Step retry policy.
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
}

/// `[embedding]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Name of the env var holding the API key (never store the key itself).
    #[serde(default = "default_embedding_key_env")]
    pub api_key_env: String,

    /// Base URL of an OpenAI-compatible API.
    #[serde(default = "default_embedding_base_url")]
    pub base_url: String,

    /// Embedding model name.
    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Vector length produced by `model`.
    #[serde(default = "default_embedding_dimension")]
    pub dimension: usize,

    /// HTTP timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_embedding_key_env(),
            base_url: default_embedding_base_url(),
            model: default_embedding_model(),
            dimension: default_embedding_dimension(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_embedding_key_env() -> String {
    "OPENAI_API_KEY".into()
}
fn default_embedding_base_url() -> String {
    "https://api.openai.com/v1".into()
}
fn default_embedding_model() -> String {
    "text-embedding-3-small".into()
}
fn default_embedding_dimension() -> usize {
    1536
}
fn default_timeout_secs() -> u64 {
    60
}

/// `[completion]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionConfig {
    /// Name of the env var holding the API key.
    #[serde(default = "default_completion_key_env")]
    pub api_key_env: String,

    /// Base URL of an OpenAI-compatible chat completions API.
    #[serde(default = "default_completion_base_url")]
    pub base_url: String,

    /// Model used by every generation agent.
    #[serde(default = "default_completion_model")]
    pub model: String,

    /// HTTP timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_completion_key_env(),
            base_url: default_completion_base_url(),
            model: default_completion_model(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_completion_key_env() -> String {
    "GROQ_API_KEY".into()
}
fn default_completion_base_url() -> String {
    "https://api.groq.com/openai/v1".into()
}
fn default_completion_model() -> String {
    "llama-3.1-8b-instant".into()
}

/// `[chunking]` section.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ChunkingConfig {
    /// Maximum tokens per chunk.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Tokens shared between consecutive chunks.
    #[serde(default = "default_chunk_overlap")]
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            overlap: default_chunk_overlap(),
        }
    }
}

fn default_chunk_size() -> usize {
    512
}
fn default_chunk_overlap() -> usize {
    50
}

/// `[retrieval]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Number of chunks retrieved to ground the first step.
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Query used to ground the first step.
    #[serde(default = "default_query")]
    pub query: String,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            query: default_query(),
        }
    }
}

fn default_top_k() -> usize {
    5
}
fn default_query() -> String {
    "Generate a comprehensive GenAI Statement of Work (SOW) based on this document.".into()
}

/// `[orchestrator]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Retries per step after the first attempt.
    #[serde(default = "default_retries")]
    pub retries: u32,

    /// Fixed pause between attempts, in milliseconds.
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// Substitute a placeholder section instead of halting when an
    /// intermediate step exhausts its retries.
    #[serde(default)]
    pub recover_failed_sections: bool,
}

impl OrchestratorConfig {
    /// Retry delay as a `Duration`.
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            retries: default_retries(),
            retry_delay_ms: default_retry_delay_ms(),
            recover_failed_sections: false,
        }
    }
}

fn default_retries() -> u32 {
    1
}
fn default_retry_delay_ms() -> u64 {
    1000
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.blueprint/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| BlueprintError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.blueprint/blueprint.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| BlueprintError::io(path, e))?;

    let config: AppConfig = toml::from_str(&content).map_err(|e| {
        BlueprintError::config(format!("failed to parse {}: {e}", path.display()))
    })?;
    validate_config(&config)?;
    Ok(config)
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| BlueprintError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| BlueprintError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| BlueprintError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Check value ranges that serde cannot express.
pub fn validate_config(config: &AppConfig) -> Result<()> {
    if config.chunking.chunk_size == 0 {
        return Err(BlueprintError::config("chunking.chunk_size must be greater than 0"));
    }
    if config.chunking.overlap >= config.chunking.chunk_size {
        return Err(BlueprintError::config(
            "chunking.overlap must be less than chunking.chunk_size",
        ));
    }
    if config.embedding.dimension == 0 {
        return Err(BlueprintError::config("embedding.dimension must be greater than 0"));
    }
    if config.retrieval.top_k == 0 {
        return Err(BlueprintError::config("retrieval.top_k must be greater than 0"));
    }
    for (section, base_url) in [
        ("embedding", &config.embedding.base_url),
        ("completion", &config.completion.base_url),
    ] {
        Url::parse(base_url).map_err(|e| {
            BlueprintError::config(format!("{section}.base_url '{base_url}' is invalid: {e}"))
        })?;
    }
    Ok(())
}

/// Read the API key named by `var_name`, failing if it is unset or empty.
pub fn resolve_api_key(var_name: &str) -> Result<String> {
    match std::env::var(var_name) {
        Ok(val) if !val.trim().is_empty() => Ok(val),
        _ => Err(BlueprintError::config(format!(
            "API key not found. Set the {var_name} environment variable."
        ))),
    }
}

/// Check that both provider API key env vars are set and non-empty.
pub fn validate_api_keys(config: &AppConfig) -> Result<()> {
    resolve_api_key(&config.embedding.api_key_env)?;
    resolve_api_key(&config.completion.api_key_env)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("chunk_size"));
        assert!(toml_str.contains("OPENAI_API_KEY"));
        assert!(toml_str.contains("GROQ_API_KEY"));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.chunking.chunk_size, 512);
        assert_eq!(parsed.chunking.overlap, 50);
        assert_eq!(parsed.embedding.dimension, 1536);
        assert_eq!(parsed.orchestrator.retries, 1);
        validate_config(&parsed).expect("defaults are valid");
    }

    #[test]
    fn partial_config_fills_defaults() {
        let toml_str = r#"
[chunking]
chunk_size = 256

[orchestrator]
retry_delay_ms = 10
recover_failed_sections = true
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.chunking.chunk_size, 256);
        assert_eq!(config.chunking.overlap, 50);
        assert_eq!(config.orchestrator.retry_delay(), Duration::from_millis(10));
        assert!(config.orchestrator.recover_failed_sections);
        assert_eq!(config.completion.model, "llama-3.1-8b-instant");
    }

    #[test]
    fn overlap_must_be_below_chunk_size() {
        let mut config = AppConfig::default();
        config.chunking.overlap = config.chunking.chunk_size;
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("overlap"));
    }

    #[test]
    fn invalid_base_url_rejected() {
        let mut config = AppConfig::default();
        config.completion.base_url = "not a url".into();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn api_key_validation() {
        let mut config = AppConfig::default();
        // Use a unique env var name to avoid interfering with other tests
        config.embedding.api_key_env = "BP_TEST_NONEXISTENT_KEY_12345".into();
        let result = validate_api_keys(&config);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("API key not found"));
    }
}

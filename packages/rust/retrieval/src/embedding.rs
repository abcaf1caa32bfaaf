//! Embedding provider: text in, fixed-length vectors out.

use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};

use blueprint_shared::{BlueprintError, EmbeddingConfig, Result, resolve_api_key};

/// Produces one embedding vector per input text, in input order.
pub trait Embedder: Send + Sync {
    /// Fails with `InvalidArgument` on an empty batch and `Provider` when
    /// the backing service fails.
    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Length of every vector this embedder returns.
    fn dimension(&self) -> usize;
}

// ---------------------------------------------------------------------------
// OpenAI-compatible client
// ---------------------------------------------------------------------------

/// Blocking client for an OpenAI-compatible `/embeddings` endpoint.
#[derive(Debug, Clone)]
pub struct OpenAiEmbedder {
    client: Client,
    endpoint: String,
    model: String,
    dimension: usize,
}

impl OpenAiEmbedder {
    pub fn new(
        api_key: &str,
        base_url: &str,
        model: impl Into<String>,
        dimension: usize,
        timeout: Duration,
    ) -> Result<Self> {
        if dimension == 0 {
            return Err(BlueprintError::invalid_argument(
                "embedding dimension must be greater than 0",
            ));
        }

        let mut headers = HeaderMap::new();
        let auth = HeaderValue::from_str(&format!("Bearer {}", api_key.trim()))
            .map_err(|_| BlueprintError::config("embedding API key contains invalid characters"))?;
        headers.insert(AUTHORIZATION, auth);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| BlueprintError::config(format!("failed to build embedding client: {e}")))?;

        Ok(Self {
            client,
            endpoint: format!("{}/embeddings", base_url.trim_end_matches('/')),
            model: model.into(),
            dimension,
        })
    }

    /// Build from the `[embedding]` config section, reading the API key from
    /// the environment.
    pub fn from_config(config: &EmbeddingConfig) -> Result<Self> {
        let api_key = resolve_api_key(&config.api_key_env)?;
        Self::new(
            &api_key,
            &config.base_url,
            config.model.clone(),
            config.dimension,
            Duration::from_secs(config.timeout_secs),
        )
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}

impl Embedder for OpenAiEmbedder {
    #[tracing::instrument(skip_all, fields(model = %self.model, inputs = texts.len()))]
    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Err(BlueprintError::invalid_argument(
                "cannot embed an empty batch",
            ));
        }

        let request = EmbeddingRequest {
            model: &self.model,
            input: texts,
        };
        let resp = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .map_err(|e| BlueprintError::Provider(format!("embedding request failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp
                .text()
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            return Err(BlueprintError::Provider(format!(
                "embedding request returned {status}: {body}"
            )));
        }

        let mut parsed: EmbeddingResponse = resp
            .json()
            .map_err(|e| BlueprintError::Provider(format!("malformed embedding response: {e}")))?;
        parsed.data.sort_by_key(|entry| entry.index);

        if parsed.data.len() != texts.len() {
            return Err(BlueprintError::Provider(format!(
                "provider returned {} embeddings for {} inputs",
                parsed.data.len(),
                texts.len()
            )));
        }
        if let Some(entry) = parsed
            .data
            .iter()
            .find(|entry| entry.embedding.len() != self.dimension)
        {
            return Err(BlueprintError::Provider(format!(
                "embedding {} has length {}, expected {}",
                entry.index,
                entry.embedding.len(),
                self.dimension
            )));
        }

        tracing::debug!("embeddings received");
        Ok(parsed.data.into_iter().map(|entry| entry.embedding).collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn embedder(base_url: &str, dimension: usize) -> OpenAiEmbedder {
        OpenAiEmbedder::new(
            "sk-test",
            base_url,
            "text-embedding-3-small",
            dimension,
            Duration::from_secs(5),
        )
        .unwrap()
    }

    fn texts(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_embed_reorders_by_index() {
        let server = wiremock::MockServer::start().await;

        wiremock::Mock::given(wiremock::matchers::method("POST"))
            .and(wiremock::matchers::path("/v1/embeddings"))
            .and(wiremock::matchers::header("authorization", "Bearer sk-test"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_json(json!({
                "data": [
                    { "index": 1, "embedding": [0.0, 1.0] },
                    { "index": 0, "embedding": [1.0, 0.0] }
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let base = format!("{}/v1", server.uri());
        let vectors = tokio::task::spawn_blocking(move || {
            embedder(&base, 2).embed(&texts(&["first", "second"]))
        })
        .await
        .unwrap()
        .unwrap();

        assert_eq!(vectors, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
    }

    #[tokio::test]
    async fn test_embed_server_error_is_provider_error() {
        let server = wiremock::MockServer::start().await;

        wiremock::Mock::given(wiremock::matchers::method("POST"))
            .and(wiremock::matchers::path("/embeddings"))
            .respond_with(wiremock::ResponseTemplate::new(429).set_body_string("slow down"))
            .mount(&server)
            .await;

        let base = server.uri();
        let err = tokio::task::spawn_blocking(move || embedder(&base, 2).embed(&texts(&["x"])))
            .await
            .unwrap()
            .unwrap_err();

        assert!(err.is_retryable());
        assert!(err.to_string().contains("429"));
        assert!(err.to_string().contains("slow down"));
    }

    #[tokio::test]
    async fn test_embed_count_and_dimension_checked() {
        let server = wiremock::MockServer::start().await;

        wiremock::Mock::given(wiremock::matchers::method("POST"))
            .and(wiremock::matchers::path("/embeddings"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_json(json!({
                "data": [ { "index": 0, "embedding": [1.0, 0.0, 0.5] } ]
            })))
            .mount(&server)
            .await;

        let base = server.uri();
        let (count_err, dim_err) = tokio::task::spawn_blocking(move || {
            let client = embedder(&base, 2);
            (
                client.embed(&texts(&["a", "b"])).unwrap_err(),
                client.embed(&texts(&["a"])).unwrap_err(),
            )
        })
        .await
        .unwrap();

        assert!(count_err.to_string().contains("1 embeddings for 2 inputs"));
        assert!(dim_err.to_string().contains("expected 2"));
    }

    #[test]
    fn empty_batch_is_invalid_argument() {
        let err = embedder("http://localhost:9", 2).embed(&[]).unwrap_err();
        assert!(matches!(err, BlueprintError::InvalidArgument { .. }));
    }

    #[test]
    fn zero_dimension_rejected() {
        let result = OpenAiEmbedder::new("k", "http://localhost", "m", 0, Duration::from_secs(1));
        assert!(result.is_err());
    }
}

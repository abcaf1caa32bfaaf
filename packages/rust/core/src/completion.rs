//! Completion provider: system + user prompt in, generated text out.

use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use blueprint_shared::{BlueprintError, CompletionConfig, Result, resolve_api_key};

/// One generation call.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub system_prompt: String,
    pub user_prompt: String,
    pub model: String,
    pub temperature: f32,
}

/// Generates text for a prompt pair.
pub trait CompletionProvider: Send + Sync {
    /// Fails with `Provider` when the call fails or returns no usable content.
    fn complete(&self, request: &CompletionRequest) -> Result<String>;
}

// ---------------------------------------------------------------------------
// OpenAI-compatible chat completions client
// ---------------------------------------------------------------------------

/// Blocking client for an OpenAI-compatible `/chat/completions` endpoint
/// (Groq by default).
#[derive(Debug, Clone)]
pub struct ChatCompletionClient {
    client: Client,
    endpoint: String,
}

impl ChatCompletionClient {
    pub fn new(api_key: &str, base_url: &str, timeout: Duration) -> Result<Self> {
        let mut headers = HeaderMap::new();
        let auth = HeaderValue::from_str(&format!("Bearer {}", api_key.trim()))
            .map_err(|_| BlueprintError::config("completion API key contains invalid characters"))?;
        headers.insert(AUTHORIZATION, auth);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| BlueprintError::config(format!("failed to build completion client: {e}")))?;

        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
        })
    }

    /// Build from the `[completion]` config section, reading the API key
    /// from the environment.
    pub fn from_config(config: &CompletionConfig) -> Result<Self> {
        let api_key = resolve_api_key(&config.api_key_env)?;
        Self::new(
            &api_key,
            &config.base_url,
            Duration::from_secs(config.timeout_secs),
        )
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    messages: [ChatMessage<'a>; 2],
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: AssistantMessage,
}

#[derive(Deserialize)]
struct AssistantMessage {
    #[serde(default)]
    content: Option<String>,
}

impl CompletionProvider for ChatCompletionClient {
    #[instrument(skip_all, fields(model = %request.model, temperature = request.temperature))]
    fn complete(&self, request: &CompletionRequest) -> Result<String> {
        let body = ChatRequest {
            model: &request.model,
            temperature: request.temperature,
            messages: [
                ChatMessage {
                    role: "system",
                    content: &request.system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: &request.user_prompt,
                },
            ],
        };

        let resp = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .map_err(|e| BlueprintError::Provider(format!("completion request failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp
                .text()
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            return Err(BlueprintError::Provider(format!(
                "completion request returned {status}: {text}"
            )));
        }

        let parsed: ChatResponse = resp
            .json()
            .map_err(|e| BlueprintError::Provider(format!("malformed completion response: {e}")))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| BlueprintError::Provider("completion response had empty content".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request() -> CompletionRequest {
        CompletionRequest {
            system_prompt: "You are terse.".into(),
            user_prompt: "Say hi.".into(),
            model: "llama-3.1-8b-instant".into(),
            temperature: 0.2,
        }
    }

    async fn complete_against(server: &wiremock::MockServer) -> Result<String> {
        let base = server.uri();
        tokio::task::spawn_blocking(move || {
            ChatCompletionClient::new("gsk-test", &base, Duration::from_secs(5))?.complete(&request())
        })
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_complete_returns_first_choice() {
        let server = wiremock::MockServer::start().await;

        wiremock::Mock::given(wiremock::matchers::method("POST"))
            .and(wiremock::matchers::path("/chat/completions"))
            .and(wiremock::matchers::header("authorization", "Bearer gsk-test"))
            .and(wiremock::matchers::body_partial_json(json!({
                "model": "llama-3.1-8b-instant",
                "messages": [
                    { "role": "system", "content": "You are terse." },
                    { "role": "user", "content": "Say hi." }
                ]
            })))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_json(json!({
                "choices": [ { "message": { "role": "assistant", "content": "Hi." } } ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        assert_eq!(complete_against(&server).await.unwrap(), "Hi.");
    }

    #[tokio::test]
    async fn test_empty_content_is_provider_error() {
        let server = wiremock::MockServer::start().await;

        wiremock::Mock::given(wiremock::matchers::method("POST"))
            .and(wiremock::matchers::path("/chat/completions"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_json(json!({
                "choices": [ { "message": { "role": "assistant", "content": null } } ]
            })))
            .mount(&server)
            .await;

        let err = complete_against(&server).await.unwrap_err();
        assert!(err.is_retryable());
        assert!(err.to_string().contains("empty content"));
    }

    #[tokio::test]
    async fn test_no_choices_is_provider_error() {
        let server = wiremock::MockServer::start().await;

        wiremock::Mock::given(wiremock::matchers::method("POST"))
            .and(wiremock::matchers::path("/chat/completions"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_json(json!({ "choices": [] })))
            .mount(&server)
            .await;

        assert!(matches!(
            complete_against(&server).await,
            Err(BlueprintError::Provider(_))
        ));
    }

    #[tokio::test]
    async fn test_http_error_is_provider_error() {
        let server = wiremock::MockServer::start().await;

        wiremock::Mock::given(wiremock::matchers::method("POST"))
            .and(wiremock::matchers::path("/chat/completions"))
            .respond_with(wiremock::ResponseTemplate::new(503).set_body_string("overloaded"))
            .mount(&server)
            .await;

        let err = complete_against(&server).await.unwrap_err();
        assert!(err.to_string().contains("503"));
        assert!(err.to_string().contains("overloaded"));
    }
}

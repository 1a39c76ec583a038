//! Anthropic backend

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::{MemoryError, Result};
use crate::llm::{GenerationBackend, GenerationRequest};

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";
const API_VERSION: &str = "2023-06-01";

/// Anthropic messages-API client
pub struct AnthropicBackend {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl AnthropicBackend {
    /// Create a new client with the given request timeout
    pub fn new(api_key: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
        })
    }

    /// Set the model to use
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Override the API base URL (tests)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[derive(Serialize)]
struct MessagesRequest {
    model: String,
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<ChatMessage>,
}

#[derive(Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    r#type: String,
    #[serde(default)]
    text: Option<String>,
}

#[async_trait]
impl GenerationBackend for AnthropicBackend {
    fn name(&self) -> &str {
        "anthropic"
    }

    async fn generate(&self, request: GenerationRequest) -> Result<String> {
        let body = MessagesRequest {
            model: self.model.clone(),
            max_tokens: request.max_output_tokens,
            temperature: request.temperature,
            system: (!request.system.is_empty()).then(|| request.system.clone()),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: request.prompt,
            }],
        };

        let response = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error = response.text().await.unwrap_or_default();
            return Err(MemoryError::Backend(format!(
                "Anthropic API error ({status}): {error}"
            )));
        }

        let data: MessagesResponse = response.json().await?;
        data.content
            .into_iter()
            .find(|block| block.r#type == "text")
            .and_then(|block| block.text)
            .ok_or_else(|| MemoryError::Backend("Anthropic response had no text block".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn request() -> GenerationRequest {
        GenerationRequest {
            prompt: "Extract observations".to_string(),
            system: "You are the memory consciousness".to_string(),
            temperature: 0.3,
            max_output_tokens: 1000,
        }
    }

    #[tokio::test]
    async fn returns_text_block_content() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .and(header("x-api-key", "test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "content": [{"type": "text", "text": "(10:00) \u{1F534} User has two kids"}],
                "stop_reason": "end_turn",
                "usage": {"input_tokens": 10, "output_tokens": 12}
            })))
            .mount(&server)
            .await;

        let backend = AnthropicBackend::new("test-key", Duration::from_secs(5))
            .unwrap()
            .with_base_url(server.uri());
        let text = backend.generate(request()).await.unwrap();
        assert!(text.contains("User has two kids"));
    }

    #[tokio::test]
    async fn non_success_status_is_a_backend_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .respond_with(ResponseTemplate::new(529).set_body_string("overloaded"))
            .mount(&server)
            .await;

        let backend = AnthropicBackend::new("test-key", Duration::from_secs(5))
            .unwrap()
            .with_base_url(server.uri());
        let err = backend.generate(request()).await.unwrap_err();
        assert!(matches!(err, MemoryError::Backend(_)));
    }

    #[tokio::test]
    async fn slow_response_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_delay(Duration::from_secs(2))
                    .set_body_json(json!({"content": []})),
            )
            .mount(&server)
            .await;

        let backend = AnthropicBackend::new("test-key", Duration::from_millis(100))
            .unwrap()
            .with_base_url(server.uri());
        assert!(backend.generate(request()).await.is_err());
    }
}

//! Live adapter for the `LlmClient` port using the Anthropic messages API.

use std::env;
use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::ports::llm::{
    CompletionRequest, CompletionResponse, GatewayError, LlmClient, LlmFuture,
};

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Live LLM client that calls the Anthropic Claude API.
///
/// The API key is read from `ANTHROPIC_API_KEY` on every call unless one was
/// supplied with [`LiveLlmClient::with_api_key`].
pub struct LiveLlmClient {
    client: Client,
    api_key: Option<String>,
    endpoint: String,
}

impl LiveLlmClient {
    /// Creates a new live LLM client.
    #[must_use]
    pub fn new() -> Self {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build().unwrap_or_default();
        Self { client, api_key: None, endpoint: ANTHROPIC_API_URL.to_string() }
    }

    /// Uses a fixed API key instead of the environment.
    #[must_use]
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Sends requests to a different messages endpoint.
    #[must_use]
    pub fn with_endpoint(mut self, url: impl Into<String>) -> Self {
        self.endpoint = url.into();
        self
    }

    fn api_key(&self) -> Result<String, GatewayError> {
        if let Some(key) = &self.api_key {
            return Ok(key.clone());
        }
        env::var("ANTHROPIC_API_KEY").map_err(|_| {
            GatewayError::Fatal("ANTHROPIC_API_KEY environment variable not set".into())
        })
    }
}

impl Default for LiveLlmClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Request body sent to the Anthropic messages API.
#[derive(Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "str::is_empty")]
    system: &'a str,
    messages: Vec<AnthropicMessage<'a>>,
}

/// A single message in the Anthropic API request.
#[derive(Serialize)]
struct AnthropicMessage<'a> {
    role: &'a str,
    content: &'a str,
}

/// Top-level response from the Anthropic messages API.
#[derive(Deserialize)]
struct AnthropicResponse {
    content: Vec<ContentBlock>,
    usage: Usage,
}

/// A content block in the Anthropic response.
#[derive(Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: String,
}

/// Token usage reported by the Anthropic API.
#[derive(Deserialize)]
struct Usage {
    input_tokens: u32,
    output_tokens: u32,
}

/// Error response from the Anthropic API.
#[derive(Deserialize)]
struct AnthropicError {
    error: AnthropicErrorDetail,
}

/// Detail inside an Anthropic error response.
#[derive(Deserialize)]
struct AnthropicErrorDetail {
    message: String,
}

fn transport_error(err: &reqwest::Error) -> GatewayError {
    if err.is_timeout() || err.is_connect() || err.is_request() {
        GatewayError::Transient(format!("Anthropic API request failed: {err}"))
    } else {
        GatewayError::Fatal(format!("Anthropic API request failed: {err}"))
    }
}

impl LlmClient for LiveLlmClient {
    fn complete(&self, request: &CompletionRequest) -> LlmFuture<'_> {
        let request = request.clone();

        Box::pin(async move {
            let api_key = self.api_key()?;

            let body = AnthropicRequest {
                model: &request.model,
                max_tokens: request.max_tokens,
                temperature: request.temperature,
                system: &request.system,
                messages: vec![AnthropicMessage { role: "user", content: &request.prompt }],
            };

            let response = self
                .client
                .post(&self.endpoint)
                .header("x-api-key", &api_key)
                .header("anthropic-version", ANTHROPIC_VERSION)
                .json(&body)
                .send()
                .await
                .map_err(|e| transport_error(&e))?;

            let status = response.status();
            let response_text = response.text().await.map_err(|e| {
                GatewayError::Transient(format!("Failed to read Anthropic API response: {e}"))
            })?;

            if !status.is_success() {
                let msg = serde_json::from_str::<AnthropicError>(&response_text)
                    .map(|e| e.error.message)
                    .unwrap_or(response_text);
                return Err(GatewayError::from_status(status.as_u16(), msg));
            }

            let api_response: AnthropicResponse =
                serde_json::from_str(&response_text).map_err(|e| {
                    GatewayError::Fatal(format!("Failed to parse Anthropic API response: {e}"))
                })?;

            let text = api_response.content.into_iter().map(|block| block.text).collect::<String>();

            Ok(CompletionResponse {
                text,
                prompt_tokens: api_response.usage.input_tokens,
                completion_tokens: api_response.usage.output_tokens,
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_body_includes_system_and_temperature() {
        let body = AnthropicRequest {
            model: "m",
            max_tokens: 10,
            temperature: 0.25,
            system: "be terse",
            messages: vec![AnthropicMessage { role: "user", content: "hi" }],
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["system"], "be terse");
        assert_eq!(json["temperature"], 0.25);
        assert_eq!(json["messages"][0]["role"], "user");
    }

    #[test]
    fn empty_system_prompt_is_omitted() {
        let body = AnthropicRequest {
            model: "m",
            max_tokens: 10,
            temperature: 0.0,
            system: "",
            messages: vec![],
        };
        let json = serde_json::to_value(&body).unwrap();
        assert!(json.get("system").is_none());
    }

    #[tokio::test]
    async fn explicit_key_bypasses_environment() {
        let client = LiveLlmClient::new().with_api_key("k");
        assert_eq!(client.api_key().unwrap(), "k");
    }
}

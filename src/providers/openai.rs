//! OpenAI-compatible chat completions backend.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::sanitize_api_error;
use super::traits::{GatewayError, GenerateOptions, ModelGateway};
use crate::pipeline::ChatMessage;

/// Default API root; any OpenAI-compatible server can be used instead.
pub const DEFAULT_API_URL: &str = "https://api.openai.com/v1";

/// Default per-call timeout for the backend HTTP client.
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

/// [`ModelGateway`] backed by `POST {api_url}/chat/completions`.
pub struct OpenAiGateway {
    api_key: String,
    /// Full chat completions endpoint.
    endpoint: String,
    client: reqwest::Client,
}

impl OpenAiGateway {
    pub fn new(api_key: impl Into<String>, api_url: Option<&str>, timeout_secs: u64) -> Self {
        let base = api_url
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .unwrap_or(DEFAULT_API_URL)
            .trim_end_matches('/');
        Self {
            api_key: api_key.into(),
            endpoint: format!("{base}/chat/completions"),
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(timeout_secs.max(1)))
                .connect_timeout(Duration::from_secs(10))
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl ModelGateway for OpenAiGateway {
    fn name(&self) -> &str {
        "openai"
    }

    async fn generate(
        &self,
        messages: &[ChatMessage],
        options: &GenerateOptions,
    ) -> Result<String, GatewayError> {
        let payload = ChatCompletionRequest {
            model: &options.model,
            messages,
            response_format: options.force_json.then_some(ResponseFormat {
                kind: "json_object",
            }),
        };

        let resp = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| GatewayError::Transport(sanitize_api_error(&e.to_string())))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(GatewayError::Status {
                status: status.as_u16(),
                body: sanitize_api_error(&body),
            });
        }

        let body: ChatCompletionResponse = resp
            .json()
            .await
            .map_err(|e| GatewayError::InvalidResponse(sanitize_api_error(&e.to_string())))?;

        Ok(body
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .unwrap_or_default())
    }
}

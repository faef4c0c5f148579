//! Trait definition for the model backend.
//!
//! Pipeline phases only see [`ModelGateway`]; the concrete backend is
//! constructed once at startup and handed to the orchestrator, so tests can
//! substitute a scripted fake.

use async_trait::async_trait;

use crate::pipeline::ChatMessage;

/// Per-call options for [`ModelGateway::generate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerateOptions {
    /// Model identifier understood by the backend.
    pub model: String,
    /// Ask the backend to constrain its output to a JSON object.
    pub force_json: bool,
}

impl GenerateOptions {
    pub fn text(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            force_json: false,
        }
    }

    pub fn json(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            force_json: true,
        }
    }
}

/// Failure of the model backend call itself (network, auth, rate limit).
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("backend returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("backend response could not be decoded: {0}")]
    InvalidResponse(String),
}

/// A language-model backend: system instruction plus history in, text out.
#[async_trait]
pub trait ModelGateway: Send + Sync {
    /// Short backend name for logs (e.g. "openai").
    fn name(&self) -> &str;

    /// Generate a completion for the given role-tagged messages.
    ///
    /// Returns an empty string when the backend produced no content.
    async fn generate(
        &self,
        messages: &[ChatMessage],
        options: &GenerateOptions,
    ) -> Result<String, GatewayError>;
}

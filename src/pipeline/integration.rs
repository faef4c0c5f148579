//! φ phase: merge conversation, plan and retrieved context into one
//! synthesis and score its coherence.

use std::sync::Arc;
use std::time::Instant;

use super::error::{Phase, PipelineError};
use super::json::parse_object;
use super::types::{ChatMessage, Integration};
use crate::providers::{GenerateOptions, ModelGateway};

/// Context block sent when retrieval was skipped or found nothing.
pub const NO_CONTEXT: &str = "No external context retrieved.";

const INTEGRATION_PROMPT: &str = r#"You are the φ-phase (Integration) module of NextLevelAI.

You receive:
- Full conversation
- Execution plan
- External context snippets

Your tasks:
1. Create an integrated, coherent context summary.
2. Evaluate:
   - kappa (κ): logical coherence (0-1)
   - tau (τ): long-term responsibility (0-1)
   - sigma (Σ): systemic risk (0-1, lower is better)

Return ONLY JSON:
{
  "integratedContext": "...",
  "coherence": {
    "kappa": 0.0,
    "tau": 0.0,
    "sigma": 0.0,
    "notes": "..."
  }
}"#;

/// Render snippets as a numbered block, keeping provider order.
pub fn format_context(snippets: &[String]) -> String {
    if snippets.is_empty() {
        return NO_CONTEXT.to_string();
    }
    snippets
        .iter()
        .enumerate()
        .map(|(i, snippet)| format!("[#{}] {}", i + 1, snippet))
        .collect::<Vec<_>>()
        .join("\n\n")
}

pub struct IntegrationPhase {
    gateway: Arc<dyn ModelGateway>,
    model: String,
}

impl IntegrationPhase {
    pub fn new(gateway: Arc<dyn ModelGateway>, model: impl Into<String>) -> Self {
        Self {
            gateway,
            model: model.into(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn build_messages(conversation: &[ChatMessage], plan: &str, snippets: &[String]) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(conversation.len() + 3);
        messages.push(ChatMessage::system(INTEGRATION_PROMPT));
        messages.push(ChatMessage::system(format!("Plan: {plan}")));
        messages.push(ChatMessage::system(format!(
            "Context:\n{}",
            format_context(snippets)
        )));
        messages.extend_from_slice(conversation);
        messages
    }

    /// Synthesize context and produce the coherence report.
    ///
    /// Missing axes default to 0.5 and missing notes to empty text. Scores
    /// outside `[0, 1]` are kept as given.
    pub async fn run(
        &self,
        conversation: &[ChatMessage],
        plan: &str,
        snippets: &[String],
    ) -> Result<Integration, PipelineError> {
        let start = Instant::now();
        let messages = Self::build_messages(conversation, plan, snippets);
        let raw = self
            .gateway
            .generate(&messages, &GenerateOptions::json(&self.model))
            .await
            .map_err(|e| PipelineError::gateway(Phase::Integration, e))?;

        let integration: Integration = parse_object(Phase::Integration, &raw)?;
        let coherence = &integration.coherence;
        tracing::info!(
            model = %self.model,
            snippets = snippets.len(),
            kappa = coherence.kappa,
            tau = coherence.tau,
            sigma = coherence.sigma,
            band = %coherence.band(),
            duration_ms = start.elapsed().as_millis().min(u64::MAX as u128) as u64,
            "Integration completed"
        );
        Ok(integration)
    }
}

//! e phase: final answer generation, conditioned on the integrated context
//! and the coherence report.

use std::sync::Arc;
use std::time::Instant;

use super::error::{Phase, PipelineError};
use super::types::{ChatMessage, CoherenceReport};
use crate::providers::{GenerateOptions, ModelGateway};

pub struct ExpansionPhase {
    gateway: Arc<dyn ModelGateway>,
    model: String,
}

impl ExpansionPhase {
    pub fn new(gateway: Arc<dyn ModelGateway>, model: impl Into<String>) -> Self {
        Self {
            gateway,
            model: model.into(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn build_prompt(integrated_context: &str, coherence: &CoherenceReport) -> String {
        format!(
            r#"You are the e-phase (Expansion) module of NextLevelAI.

You receive:
- Integrated context summary
- Coherence report (κ, τ, Σ)

Your role:
1. Generate the strongest possible answer.
2. Maintain or improve coherence: keep kappa (κ) and tau (τ) at least as high as reported.
3. Do not increase systemic risk: sigma (Σ) must not rise above the reported value.
4. Provide structured, clear reasoning when helpful.

Integrated context:
{integrated_context}

Coherence:
kappa: {kappa}
tau: {tau}
sigma: {sigma}
notes: {notes}"#,
            kappa = coherence.kappa,
            tau = coherence.tau,
            sigma = coherence.sigma,
            notes = coherence.notes,
        )
    }

    fn build_messages(
        conversation: &[ChatMessage],
        integrated_context: &str,
        coherence: &CoherenceReport,
    ) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(conversation.len() + 1);
        messages.push(ChatMessage::system(Self::build_prompt(
            integrated_context,
            coherence,
        )));
        messages.extend_from_slice(conversation);
        messages
    }

    /// Generate the final reply. Empty backend output is returned unchanged.
    pub async fn run(
        &self,
        conversation: &[ChatMessage],
        integrated_context: &str,
        coherence: &CoherenceReport,
    ) -> Result<String, PipelineError> {
        let start = Instant::now();
        let messages = Self::build_messages(conversation, integrated_context, coherence);
        let reply = self
            .gateway
            .generate(&messages, &GenerateOptions::text(&self.model))
            .await
            .map_err(|e| PipelineError::gateway(Phase::Expansion, e))?;

        tracing::info!(
            model = %self.model,
            reply_chars = reply.chars().count(),
            duration_ms = start.elapsed().as_millis().min(u64::MAX as u128) as u64,
            "Expansion completed"
        );
        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::testing::ScriptedGateway;

    fn report() -> CoherenceReport {
        CoherenceReport {
            kappa: 0.9,
            tau: 0.8,
            sigma: 0.1,
            notes: "stable".into(),
        }
    }

    #[test]
    fn prompt_embeds_context_and_scores_verbatim() {
        let prompt = ExpansionPhase::build_prompt("The user asks about 6 x 7.", &report());
        assert!(prompt.contains("Integrated context:\nThe user asks about 6 x 7."));
        assert!(prompt.contains("kappa: 0.9"));
        assert!(prompt.contains("tau: 0.8"));
        assert!(prompt.contains("sigma: 0.1"));
        assert!(prompt.contains("notes: stable"));
        assert!(prompt.contains("Maintain or improve coherence"));
        assert!(prompt.contains("must not rise"));
    }

    #[test]
    fn out_of_range_scores_are_embedded_as_given() {
        let mut coherence = report();
        coherence.kappa = 1.7;
        let prompt = ExpansionPhase::build_prompt("", &coherence);
        assert!(prompt.contains("kappa: 1.7"));
    }

    #[tokio::test]
    async fn run_uses_text_mode() {
        let gateway = Arc::new(ScriptedGateway::new(vec![Ok("The answer is 42.".into())]));
        let phase = ExpansionPhase::new(gateway.clone(), "e-model");
        let conversation = vec![ChatMessage::user("what is 6 x 7?")];
        let reply = phase.run(&conversation, "ctx", &report()).await.unwrap();

        assert_eq!(reply, "The answer is 42.");
        let calls = gateway.calls();
        assert_eq!(calls[0].options, GenerateOptions::text("e-model"));
        assert_eq!(calls[0].messages.len(), 2);
        assert_eq!(calls[0].messages[1], conversation[0]);
    }

    #[tokio::test]
    async fn run_returns_empty_text_unchanged() {
        let gateway = Arc::new(ScriptedGateway::new(vec![Ok(String::new())]));
        let phase = ExpansionPhase::new(gateway, "e-model");
        let reply = phase.run(&[ChatMessage::user("hi")], "", &report()).await.unwrap();
        assert_eq!(reply, "");
    }

    #[tokio::test]
    async fn run_surfaces_gateway_errors() {
        let gateway = Arc::new(ScriptedGateway::new(vec![Err("timeout".into())]));
        let phase = ExpansionPhase::new(gateway, "e-model");
        let err = phase.run(&[ChatMessage::user("hi")], "", &report()).await.unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Gateway { phase: Phase::Expansion, .. }
        ));
    }
}

//! π phase: read the conversation and decide how to answer it.

use std::sync::Arc;
use std::time::Instant;

use super::error::{Phase, PipelineError};
use super::json::parse_object;
use super::types::{ChatMessage, ExecutionPlan};
use crate::providers::{GenerateOptions, ModelGateway};

const PERCEPTION_PROMPT: &str = r#"You are the π-phase (Perception) module of NextLevelAI.

Your responsibilities:
1. Understand the user's goal.
2. Identify whether retrieval of external context (RAG) or tools are needed.
3. Produce a 2-5 step execution plan.

Return ONLY JSON:
{
  "plan": "...",
  "needsRag": true/false,
  "needsTools": true/false
}"#;

/// Perception phase bound to a model backend and model name.
pub struct PerceptionPhase {
    gateway: Arc<dyn ModelGateway>,
    model: String,
}

impl PerceptionPhase {
    pub fn new(gateway: Arc<dyn ModelGateway>, model: impl Into<String>) -> Self {
        Self {
            gateway,
            model: model.into(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn build_messages(conversation: &[ChatMessage]) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(conversation.len() + 1);
        messages.push(ChatMessage::system(PERCEPTION_PROMPT));
        messages.extend_from_slice(conversation);
        messages
    }

    /// Produce the execution plan for `conversation`.
    ///
    /// Missing fields fall back to an empty plan that needs neither retrieval
    /// nor tools; output that is not a JSON object fails the phase.
    pub async fn run(&self, conversation: &[ChatMessage]) -> Result<ExecutionPlan, PipelineError> {
        let start = Instant::now();
        let messages = Self::build_messages(conversation);
        let raw = self
            .gateway
            .generate(&messages, &GenerateOptions::json(&self.model))
            .await
            .map_err(|e| PipelineError::gateway(Phase::Perception, e))?;

        let plan: ExecutionPlan = parse_object(Phase::Perception, &raw)?;
        tracing::info!(
            model = %self.model,
            needs_rag = plan.needs_rag,
            needs_tools = plan.needs_tools,
            duration_ms = start.elapsed().as_millis().min(u64::MAX as u128) as u64,
            "Perception completed"
        );
        Ok(plan)
    }
}

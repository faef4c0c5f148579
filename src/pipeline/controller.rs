//! Pipeline controller.
//!
//! Drives one request through the phases as an explicit state machine:
//!
//! ```text
//! Received ─▸ Perceiving ─┬─▸ RetrievingContext ─┐
//!                         └──────────────────────┴─▸ Integrating ─▸ Expanding ─▸ Persisting ─▸ Completed
//!
//! any error from Perceiving … Expanding ─▸ Failed
//! ```
//!
//! Failures are fail-fast: no retries and no skipped phases. Only the
//! persistence step is best-effort.

use std::sync::Arc;
use std::time::Instant;

use uuid::Uuid;

use super::error::PipelineError;
use super::expansion::ExpansionPhase;
use super::integration::IntegrationPhase;
use super::perception::PerceptionPhase;
use super::types::{
    latest_user_utterance, ChatMessage, ChatReply, ChatRequest, ExecutionPlan, Integration,
};
use crate::config::ModelConfig;
use crate::memory::{ConversationStore, LogConversationStore};
use crate::providers::ModelGateway;
use crate::retrieval::{NoopRetrieval, RetrievalProvider};

/// Message returned to clients that send no conversation.
pub const MESSAGES_REQUIRED: &str = "messages array is required";

// ── States ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    Received,
    Perceiving,
    RetrievingContext,
    Integrating,
    Expanding,
    Persisting,
    Completed,
    Failed,
}

impl PipelineStage {
    pub fn label(self) -> &'static str {
        match self {
            Self::Received => "received",
            Self::Perceiving => "perceiving",
            Self::RetrievingContext => "retrieving_context",
            Self::Integrating => "integrating",
            Self::Expanding => "expanding",
            Self::Persisting => "persisting",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl std::fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

// ── Retrieval decision ───────────────────────────────────────────

/// Branch taken after perception.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContextDecision {
    /// Ask the retrieval provider, using the latest user utterance as query.
    Retrieve { query: String },
    Skip,
}

impl ContextDecision {
    pub fn from_plan(plan: &ExecutionPlan, conversation: &[ChatMessage]) -> Self {
        if plan.needs_rag {
            Self::Retrieve {
                query: latest_user_utterance(conversation).to_string(),
            }
        } else {
            Self::Skip
        }
    }
}

// ── Run tracking ─────────────────────────────────────────────────

/// State of a single request, used for transition logging.
struct PipelineRun {
    id: Uuid,
    stage: PipelineStage,
    started: Instant,
}

impl PipelineRun {
    fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            stage: PipelineStage::Received,
            started: Instant::now(),
        }
    }

    fn advance(&mut self, next: PipelineStage) {
        tracing::debug!(
            request_id = %self.id,
            from = self.stage.label(),
            to = next.label(),
            "Pipeline transition"
        );
        self.stage = next;
    }

    fn fail(&mut self, err: &PipelineError) {
        tracing::error!(
            request_id = %self.id,
            stage = self.stage.label(),
            error = %err,
            "Pipeline failed"
        );
        self.stage = PipelineStage::Failed;
    }

    fn elapsed_ms(&self) -> u64 {
        self.started.elapsed().as_millis().min(u64::MAX as u128) as u64
    }
}

// ── Orchestrator ─────────────────────────────────────────────────

/// Sequences perception, optional retrieval, integration, expansion and
/// persistence for each chat request.
///
/// Holds no per-request state; one instance is shared by all requests.
pub struct Orchestrator {
    perception: PerceptionPhase,
    integration: IntegrationPhase,
    expansion: ExpansionPhase,
    retrieval: Arc<dyn RetrievalProvider>,
    store: Arc<dyn ConversationStore>,
}

impl Orchestrator {
    /// Build an orchestrator with the default no-op retrieval provider and
    /// logging conversation store.
    pub fn new(gateway: Arc<dyn ModelGateway>, models: &ModelConfig) -> Self {
        Self {
            perception: PerceptionPhase::new(Arc::clone(&gateway), models.perception.clone()),
            integration: IntegrationPhase::new(Arc::clone(&gateway), models.integration.clone()),
            expansion: ExpansionPhase::new(gateway, models.expansion.clone()),
            retrieval: Arc::new(NoopRetrieval),
            store: Arc::new(LogConversationStore),
        }
    }

    pub fn with_retrieval(mut self, retrieval: Arc<dyn RetrievalProvider>) -> Self {
        self.retrieval = retrieval;
        self
    }

    pub fn with_store(mut self, store: Arc<dyn ConversationStore>) -> Self {
        self.store = store;
        self
    }

    /// Model names per phase, in pipeline order.
    pub fn models(&self) -> ModelConfig {
        ModelConfig {
            perception: self.perception.model().to_string(),
            integration: self.integration.model().to_string(),
            expansion: self.expansion.model().to_string(),
        }
    }

    pub fn retrieval_name(&self) -> &str {
        self.retrieval.name()
    }

    pub fn store_name(&self) -> &str {
        self.store.name()
    }

    /// Run the full pipeline for one request.
    ///
    /// Returns [`PipelineError::Validation`] without touching any phase when
    /// the request carries no messages.
    pub async fn handle(&self, request: ChatRequest) -> Result<ChatReply, PipelineError> {
        let mut run = PipelineRun::new();
        if request.messages.is_empty() {
            tracing::warn!(request_id = %run.id, "Rejected chat request without messages");
            return Err(PipelineError::Validation(MESSAGES_REQUIRED.into()));
        }

        tracing::info!(
            request_id = %run.id,
            user_id = request.user_id.as_deref().unwrap_or("anonymous"),
            messages = request.messages.len(),
            "Chat request received"
        );

        match self.execute(&mut run, request).await {
            Ok(reply) => {
                run.advance(PipelineStage::Completed);
                tracing::info!(
                    request_id = %run.id,
                    used_rag = reply.used_rag,
                    used_tools = reply.used_tools,
                    band = %reply.coherence.band(),
                    duration_ms = run.elapsed_ms(),
                    "Chat request completed"
                );
                Ok(reply)
            }
            Err(err) => {
                run.fail(&err);
                Err(err)
            }
        }
    }

    async fn execute(
        &self,
        run: &mut PipelineRun,
        request: ChatRequest,
    ) -> Result<ChatReply, PipelineError> {
        let ChatRequest { user_id, messages } = request;

        run.advance(PipelineStage::Perceiving);
        let plan = self.perception.run(&messages).await?;

        let snippets = match ContextDecision::from_plan(&plan, &messages) {
            ContextDecision::Retrieve { query } => {
                run.advance(PipelineStage::RetrievingContext);
                self.retrieval
                    .retrieve(user_id.as_deref(), &query)
                    .await
                    .map_err(PipelineError::Retrieval)?
            }
            ContextDecision::Skip => Vec::new(),
        };

        run.advance(PipelineStage::Integrating);
        let Integration {
            integrated_context,
            coherence,
        } = self.integration.run(&messages, &plan.plan, &snippets).await?;

        run.advance(PipelineStage::Expanding);
        let reply = self
            .expansion
            .run(&messages, &integrated_context, &coherence)
            .await?;
        if reply.is_empty() {
            tracing::warn!(request_id = %run.id, "Expansion returned an empty reply");
        }

        run.advance(PipelineStage::Persisting);
        let mut history = messages;
        history.push(ChatMessage::assistant(reply.clone()));
        if let Err(e) = self
            .store
            .persist(user_id.as_deref(), &history, &coherence)
            .await
        {
            tracing::warn!(
                request_id = %run.id,
                store = self.store.name(),
                "Failed to persist conversation, continuing: {e}"
            );
        }

        Ok(ChatReply {
            reply,
            coherence,
            used_rag: plan.needs_rag,
            used_tools: plan.needs_tools,
        })
    }
}

// ── Tests ────────────────────────────────────────────────────────

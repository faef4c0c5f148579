//! Three-phase reasoning pipeline.
//!
//! - **π Perception** ([`PerceptionPhase`]) plans the answer and decides
//!   whether retrieval and tools are needed.
//! - **φ Integration** ([`IntegrationPhase`]) merges conversation, plan and
//!   retrieved context, and scores coherence (κ, τ, Σ).
//! - **e Expansion** ([`ExpansionPhase`]) writes the final reply under the
//!   integrated context and coherence report.
//!
//! [`Orchestrator`] sequences the phases; each phase waits for the previous
//! one's validated output.

pub mod controller;
pub mod error;
pub mod expansion;
pub mod integration;
mod json;
pub mod perception;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use controller::{ContextDecision, Orchestrator, PipelineStage, MESSAGES_REQUIRED};
pub use error::{Phase, PipelineError};
pub use expansion::ExpansionPhase;
pub use integration::IntegrationPhase;
pub use perception::PerceptionPhase;
pub use types::{
    latest_user_utterance, ChatMessage, ChatReply, ChatRequest, CoherenceBand, CoherenceReport,
    ExecutionPlan, Integration, Role,
};

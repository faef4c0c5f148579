//! NextLevel orchestrator.
//!
//! Runs a single conversational request through three model-backed phases
//! and returns the final reply together with the coherence report produced
//! along the way:
//!
//! ```text
//! messages ─▸ π Perception ─▸ plan ──┬─▸ (retrieve context if needsRag)
//!                                    │
//!                                    └─▸ φ Integration ─▸ coherence
//!                                                │
//!                                                └─▸ e Expansion ─▸ reply
//! ```
//!
//! The model backend, the retrieval provider and the conversation store are
//! traits ([`ModelGateway`], [`RetrievalProvider`], [`ConversationStore`]) so
//! they can be swapped without touching the [`Orchestrator`].

pub mod config;
pub mod gateway;
pub mod memory;
pub mod pipeline;
pub mod providers;
pub mod retrieval;

pub use config::Config;
pub use memory::{
    ConversationStore, InMemoryConversationStore, LogConversationStore, StoreError,
    StoredConversation,
};
pub use pipeline::{
    ChatMessage, ChatReply, ChatRequest, CoherenceReport, ExecutionPlan, Orchestrator,
    PipelineError, Role,
};
pub use providers::{GatewayError, GenerateOptions, ModelGateway, OpenAiGateway};
pub use retrieval::{NoopRetrieval, RetrievalProvider};

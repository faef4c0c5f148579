//! Context retrieval extension point.
//!
//! The orchestrator calls a [`RetrievalProvider`] only when the perception
//! phase asks for retrieval. No index ships with the service; the default
//! [`NoopRetrieval`] always answers with an empty snippet list.

use async_trait::async_trait;

/// Source of context snippets for the integration phase.
#[async_trait]
pub trait RetrievalProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Snippets relevant to `query`, most relevant first.
    async fn retrieve(&self, user_id: Option<&str>, query: &str) -> anyhow::Result<Vec<String>>;
}

/// Retrieval provider that never finds anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopRetrieval;

#[async_trait]
impl RetrievalProvider for NoopRetrieval {
    fn name(&self) -> &str {
        "noop"
    }

    async fn retrieve(&self, user_id: Option<&str>, query: &str) -> anyhow::Result<Vec<String>> {
        tracing::debug!(
            user_id = user_id.unwrap_or("anonymous"),
            query_len = query.len(),
            "No retrieval backend configured, returning no context"
        );
        Ok(Vec::new())
    }
}

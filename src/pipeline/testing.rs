//! Scripted collaborators shared by the pipeline unit tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use super::types::{ChatMessage, CoherenceReport};
use crate::memory::{ConversationStore, StoreError};
use crate::providers::{GatewayError, GenerateOptions, ModelGateway};
use crate::retrieval::RetrievalProvider;

#[derive(Debug, Clone)]
pub(crate) struct RecordedCall {
    pub messages: Vec<ChatMessage>,
    pub options: GenerateOptions,
}

/// Gateway that replays canned responses in order and records each call.
pub(crate) struct ScriptedGateway {
    responses: Mutex<VecDeque<Result<String, String>>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedGateway {
    pub fn new(responses: Vec<Result<String, String>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl ModelGateway for ScriptedGateway {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn generate(
        &self,
        messages: &[ChatMessage],
        options: &GenerateOptions,
    ) -> Result<String, GatewayError> {
        self.calls.lock().push(RecordedCall {
            messages: messages.to_vec(),
            options: options.clone(),
        });
        match self.responses.lock().pop_front() {
            Some(Ok(text)) => Ok(text),
            Some(Err(reason)) => Err(GatewayError::Transport(reason)),
            None => Err(GatewayError::Transport("script exhausted".into())),
        }
    }
}

/// Retrieval provider that records queries and returns fixed snippets,
/// or always fails when built with [`RecordingRetrieval::failing`].
#[derive(Default)]
pub(crate) struct RecordingRetrieval {
    pub snippets: Vec<String>,
    pub fail: bool,
    pub queries: Mutex<Vec<(Option<String>, String)>>,
}

impl RecordingRetrieval {
    pub fn with_snippets(snippets: &[&str]) -> Self {
        Self {
            snippets: snippets.iter().map(|s| (*s).to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn call_count(&self) -> usize {
        self.queries.lock().len()
    }
}

#[async_trait]
impl RetrievalProvider for RecordingRetrieval {
    fn name(&self) -> &str {
        "recording"
    }

    async fn retrieve(&self, user_id: Option<&str>, query: &str) -> anyhow::Result<Vec<String>> {
        self.queries
            .lock()
            .push((user_id.map(String::from), query.to_string()));
        if self.fail {
            anyhow::bail!("index unavailable");
        }
        Ok(self.snippets.clone())
    }
}

/// Conversation store that counts calls and optionally always fails.
#[derive(Default)]
pub(crate) struct CountingStore {
    pub fail: bool,
    pub calls: AtomicUsize,
    pub last: Mutex<Option<(Vec<ChatMessage>, CoherenceReport)>>,
}

impl CountingStore {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ConversationStore for CountingStore {
    fn name(&self) -> &str {
        "counting"
    }

    async fn persist(
        &self,
        _user_id: Option<&str>,
        messages: &[ChatMessage],
        coherence: &CoherenceReport,
    ) -> Result<(), StoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last.lock() = Some((messages.to_vec(), coherence.clone()));
        if self.fail {
            return Err(StoreError::new("counting", "always fails"));
        }
        Ok(())
    }
}

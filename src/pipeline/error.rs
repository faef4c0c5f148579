use crate::providers::GatewayError;
use axum::http::StatusCode;

/// Pipeline phase, used to attribute failures and log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Perception,
    Integration,
    Expansion,
}

impl Phase {
    pub fn label(self) -> &'static str {
        match self {
            Self::Perception => "perception",
            Self::Integration => "integration",
            Self::Expansion => "expansion",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Everything that can stop a chat request.
///
/// Conversation store failures are not listed; the orchestrator logs them
/// and the request still succeeds.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("{0}")]
    Validation(String),

    #[error("{phase} phase returned malformed output: {detail}")]
    MalformedModelOutput { phase: Phase, detail: String },

    #[error("{phase} phase model call failed: {source}")]
    Gateway {
        phase: Phase,
        #[source]
        source: GatewayError,
    },

    #[error("context retrieval failed: {0}")]
    Retrieval(#[source] anyhow::Error),
}

impl PipelineError {
    pub fn malformed(phase: Phase, detail: impl std::fmt::Display) -> Self {
        Self::MalformedModelOutput {
            phase,
            detail: detail.to_string(),
        }
    }

    pub fn gateway(phase: Phase, source: GatewayError) -> Self {
        Self::Gateway { phase, source }
    }

    /// HTTP status the gateway answers with for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::MalformedModelOutput { .. } | Self::Gateway { .. } | Self::Retrieval(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_maps_to_bad_request() {
        let err = PipelineError::Validation("messages array is required".into());
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.to_string(), "messages array is required");
        assert!(err.is_validation());
    }

    #[test]
    fn execution_failures_map_to_internal_error() {
        let malformed = PipelineError::malformed(Phase::Perception, "expected value at line 1");
        assert_eq!(malformed.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(malformed.to_string().contains("perception phase"));

        let gateway = PipelineError::gateway(
            Phase::Expansion,
            GatewayError::Transport("connection refused".into()),
        );
        assert_eq!(gateway.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(gateway.to_string().contains("connection refused"));

        let retrieval = PipelineError::Retrieval(anyhow::anyhow!("index offline"));
        assert_eq!(retrieval.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!retrieval.is_validation());
    }
}

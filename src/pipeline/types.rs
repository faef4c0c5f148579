//! Data contracts exchanged between the pipeline phases.
//!
//! Every JSON shape the model backend is asked to produce is parsed into
//! these types with field-level defaults. A response that is not JSON at
//! all is a hard failure and is handled by the phase modules, not here.

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ── Conversation ─────────────────────────────────────────────────

/// Author of a conversation message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::System => "system",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single role-tagged message. Order within a conversation is chronological.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// Content of the most recent `user` message, or `""` when there is none.
pub fn latest_user_utterance(messages: &[ChatMessage]) -> &str {
    messages
        .iter()
        .rev()
        .find(|m| m.role == Role::User)
        .map_or("", |m| m.content.as_str())
}

// ── Perception output ────────────────────────────────────────────

/// Execution plan produced by the perception phase.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionPlan {
    /// Free-text description of 2–5 steps.
    #[serde(default, deserialize_with = "null_as_default")]
    pub plan: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub needs_rag: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub needs_tools: bool,
}

// ── Coherence report ─────────────────────────────────────────────

/// Neutral midpoint used for any axis the integration phase leaves out.
pub const DEFAULT_AXIS: f64 = 0.5;

/// κ/τ/Σ self-assessment produced by the integration phase.
///
/// Values are not clamped: whatever finite number the backend assigns is
/// carried through to the caller unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoherenceReport {
    /// Internal logical coherence, higher is better.
    #[serde(default = "default_axis", deserialize_with = "coerce_axis")]
    pub kappa: f64,
    /// Temporal / long-term responsibility, higher is better.
    #[serde(default = "default_axis", deserialize_with = "coerce_axis")]
    pub tau: f64,
    /// Systemic or hidden-fragmentation risk, lower is better.
    #[serde(default = "default_axis", deserialize_with = "coerce_axis")]
    pub sigma: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub notes: String,
}

impl Default for CoherenceReport {
    fn default() -> Self {
        Self {
            kappa: DEFAULT_AXIS,
            tau: DEFAULT_AXIS,
            sigma: DEFAULT_AXIS,
            notes: String::new(),
        }
    }
}

impl CoherenceReport {
    pub fn band(&self) -> CoherenceBand {
        CoherenceBand::classify(self)
    }
}

/// Axis value above which a report reads as overloaded.
pub const OVERLOAD_THRESHOLD: f64 = 1.2;

/// Coarse reading of a [`CoherenceReport`], used for log summaries.
///
/// Checked in order: harmonic, drift, overload, baseline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoherenceBand {
    /// High κ with negligible Σ.
    Harmonic,
    /// Nothing notable in either direction.
    Baseline,
    /// Σ above the midpoint.
    Drift,
    /// At least one axis above [`OVERLOAD_THRESHOLD`].
    Overload,
}

impl CoherenceBand {
    pub fn classify(report: &CoherenceReport) -> Self {
        if report.kappa > 0.9 && report.sigma < 0.1 {
            Self::Harmonic
        } else if report.sigma > 0.5 {
            Self::Drift
        } else if [report.kappa, report.tau, report.sigma]
            .iter()
            .any(|v| *v > OVERLOAD_THRESHOLD)
        {
            Self::Overload
        } else {
            Self::Baseline
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Harmonic => "harmonic",
            Self::Baseline => "baseline",
            Self::Drift => "drift",
            Self::Overload => "overload",
        }
    }
}

impl std::fmt::Display for CoherenceBand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

// ── Integration output ───────────────────────────────────────────

/// Synthesis produced by the integration phase.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Integration {
    #[serde(default, deserialize_with = "null_as_default")]
    pub integrated_context: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub coherence: CoherenceReport,
}

// ── Request / reply ──────────────────────────────────────────────

/// Inbound chat request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
}

/// Assembled response of a completed pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatReply {
    pub reply: String,
    pub coherence: CoherenceReport,
    pub used_rag: bool,
    pub used_tools: bool,
}

// ── serde helpers ────────────────────────────────────────────────

fn default_axis() -> f64 {
    DEFAULT_AXIS
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Accepts JSON numbers and numeric strings; `null` maps to the midpoint.
fn coerce_axis<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::Error;

    let value = Value::deserialize(deserializer)?;
    let number = match &value {
        Value::Null => return Ok(DEFAULT_AXIS),
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match number {
        Some(n) if n.is_finite() => Ok(n),
        _ => Err(D::Error::custom(format!(
            "coherence axis is not a finite number: {value}"
        ))),
    }
}

// ── Tests ────────────────────────────────────────────────────────

//! Per-turn error taxonomy
//!
//! None of these escape the dispatcher. Each is turned into exactly one
//! user-visible reply (or a deliberate silence) and recorded on the turn.

use crate::capability::CapabilityError;
use crate::dialogue::intent::IntentKind;
use crate::llm::LlmError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TurnError {
    /// Nothing scored high enough to act on; routed to the fallback
    #[error("no intent above {threshold} (best: {intent} at {confidence:.2})")]
    ClassificationLowConfidence {
        intent: IntentKind,
        confidence: f64,
        threshold: f64,
    },

    #[error("{intent} needs more details: {}", missing.join(", "))]
    CapabilityIncomplete {
        intent: IntentKind,
        missing: Vec<String>,
    },

    #[error("{intent} matched {count} targets")]
    CapabilityAmbiguous { intent: IntentKind, count: usize },

    #[error("{intent} failed: {message}")]
    CapabilityHardFailure { intent: IntentKind, message: String },

    #[error("language model unavailable: {0}")]
    UpstreamUnavailable(String),
}

impl TurnError {
    /// Stable label for logs and turn records
    pub fn kind(&self) -> &'static str {
        match self {
            TurnError::ClassificationLowConfidence { .. } => "classification_low_confidence",
            TurnError::CapabilityIncomplete { .. } => "capability_incomplete",
            TurnError::CapabilityAmbiguous { .. } => "capability_ambiguous",
            TurnError::CapabilityHardFailure { .. } => "capability_hard_failure",
            TurnError::UpstreamUnavailable(_) => "upstream_unavailable",
        }
    }

    /// Whether the turn leaves a flow open for the user to finish
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            TurnError::CapabilityIncomplete { .. } | TurnError::CapabilityAmbiguous { .. }
        )
    }

    /// Whether the user's request went unserved
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            TurnError::CapabilityHardFailure { .. } | TurnError::UpstreamUnavailable(_)
        )
    }

    pub fn from_capability(intent: IntentKind, error: &CapabilityError) -> Self {
        match error {
            CapabilityError::Upstream(e) => TurnError::UpstreamUnavailable(e.message.clone()),
            other => TurnError::CapabilityHardFailure {
                intent,
                message: other.to_string(),
            },
        }
    }
}

impl From<&LlmError> for TurnError {
    fn from(error: &LlmError) -> Self {
        TurnError::UpstreamUnavailable(error.message.clone())
    }
}

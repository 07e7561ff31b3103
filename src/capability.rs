//! Capability handlers: the opaque request processors the dispatcher drives
//!
//! A capability turns a (possibly accumulated) message into one of four
//! outcomes. The dispatcher owns every consequence of that outcome for the
//! dialogue state; capabilities never touch the stores themselves.

mod extraction;
pub mod reply;

pub use extraction::{ExtractionCapability, FieldSpec};

use crate::channel::ChannelKind;
use crate::dialogue::context::ConversationContext;
use crate::dialogue::history::HistoryEntry;
use crate::dialogue::intent::IntentKind;
use crate::dialogue::key::ConversationKey;
use crate::llm::LlmError;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// What a capability made of a request
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ProcessResult {
    /// Done; `data` is whatever the capability wants to render
    Success { data: Value },
    /// Recoverable: some required fields are still unknown
    Incomplete {
        data: Value,
        missing_fields: Vec<String>,
    },
    /// Recoverable: several targets match equally well
    Ambiguous {
        candidates: Vec<Value>,
        action: Value,
    },
    /// Terminal for this turn
    Failed { error: String },
}

impl ProcessResult {
    pub fn success(data: Value) -> Self {
        ProcessResult::Success { data }
    }

    pub fn incomplete(data: Value, missing_fields: Vec<String>) -> Self {
        ProcessResult::Incomplete {
            data,
            missing_fields,
        }
    }

    pub fn ambiguous(candidates: Vec<Value>, action: Value) -> Self {
        ProcessResult::Ambiguous { candidates, action }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        ProcessResult::Failed {
            error: error.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ProcessResult::Success { .. })
    }

    pub fn label(&self) -> &'static str {
        match self {
            ProcessResult::Success { .. } => "success",
            ProcessResult::Incomplete { .. } => "incomplete",
            ProcessResult::Ambiguous { .. } => "ambiguous",
            ProcessResult::Failed { .. } => "failed",
        }
    }
}

/// Errors a capability may raise instead of returning a result. The
/// dispatcher treats every one of them as a hard failure.
#[derive(Error, Debug)]
pub enum CapabilityError {
    #[error("language model unavailable: {0}")]
    Upstream(#[from] LlmError),
    #[error("could not understand the request: {0}")]
    Unparseable(String),
    #[error("{0}")]
    Internal(String),
}

impl CapabilityError {
    pub fn is_upstream(&self) -> bool {
        matches!(self, CapabilityError::Upstream(_))
    }
}

/// Everything a capability gets to see for one request
#[derive(Debug, Clone, Copy)]
pub struct CapabilityRequest<'a> {
    pub key: &'a ConversationKey,
    pub community_id: Option<&'a str>,
    pub channel: ChannelKind,
    /// The message, or the whole flow joined with ". " on a continuation
    pub text: &'a str,
    pub context: Option<&'a ConversationContext>,
    /// Partial payload stored by the previous turn of the flow
    pub seed: Option<&'a Value>,
    pub history: &'a [HistoryEntry],
}

/// The user's numbered pick during disambiguation
#[derive(Debug, Clone, Copy)]
pub struct Selection<'a> {
    /// 1-based, already validated against `candidates`
    pub index: usize,
    pub candidate: &'a Value,
    pub candidates: &'a [Value],
    pub action: &'a Value,
}

#[async_trait]
pub trait Capability: Send + Sync {
    fn kind(&self) -> IntentKind;

    async fn process(&self, request: CapabilityRequest<'_>)
        -> Result<ProcessResult, CapabilityError>;

    /// Apply the stored action to the picked candidate
    async fn resolve(
        &self,
        selection: Selection<'_>,
        _request: CapabilityRequest<'_>,
    ) -> Result<ProcessResult, CapabilityError> {
        Ok(ProcessResult::failed(format!(
            "{} cannot act on choice {}",
            self.kind(),
            selection.index
        )))
    }

    fn render_response(&self, result: &ProcessResult) -> String {
        reply::render_default(result)
    }
}

/// Capability handlers by intent
#[derive(Default, Clone)]
pub struct CapabilityRegistry {
    handlers: HashMap<IntentKind, Arc<dyn Capability>>,
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, capability: Arc<dyn Capability>) -> Self {
        self.register(capability);
        self
    }

    /// Replaces any handler already registered for the same kind
    pub fn register(&mut self, capability: Arc<dyn Capability>) {
        let kind = capability.kind();
        if self.handlers.insert(kind, capability).is_some() {
            tracing::warn!(kind = %kind, "Replaced capability handler");
        }
    }

    pub fn get(&self, kind: IntentKind) -> Option<Arc<dyn Capability>> {
        self.handlers.get(&kind).cloned()
    }

    pub fn kinds(&self) -> Vec<IntentKind> {
        IntentKind::CAPABILITIES
            .into_iter()
            .filter(|k| self.handlers.contains_key(k))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedCapability;
    use serde_json::json;

    #[test]
    fn test_registry_lookup() {
        let registry = CapabilityRegistry::new()
            .with(Arc::new(ScriptedCapability::new(IntentKind::Participation)))
            .with(Arc::new(ScriptedCapability::new(IntentKind::EventCreation)));
        assert!(registry.get(IntentKind::Banter).is_none());
        assert_eq!(
            registry.kinds(),
            vec![IntentKind::EventCreation, IntentKind::Participation]
        );
    }

    #[test]
    fn test_result_serializes_with_outcome_tag() {
        let result = ProcessResult::incomplete(json!({"date": "Friday"}), vec!["time".into()]);
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["outcome"], "incomplete");
        assert_eq!(value["missing_fields"], json!(["time"]));
        assert_eq!(result.label(), "incomplete");
    }

    #[test]
    fn test_upstream_errors_convert() {
        let err: CapabilityError = LlmError::network("down").into();
        assert!(err.is_upstream());
        assert_eq!(err.to_string(), "language model unavailable: down");
    }
}

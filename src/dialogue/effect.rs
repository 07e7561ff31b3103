//! Store mutations produced by routing decisions

use super::context::{ContextPatch, ACTION_KEY, CANDIDATES_KEY};
use super::intent::IntentKind;
use serde_json::{Map, Value};

/// Effects the dispatcher applies after a capability settles
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Open or refresh the flow for this conversation
    UpdateContext(ContextPatch),

    /// Close the flow
    ClearContext,

    /// Arm the retry shortcut for a capability
    MarkRetry(IntentKind),

    /// Disarm the retry shortcut for a capability
    ClearRetry(IntentKind),
}

impl Effect {
    /// Continuation: keep collecting fields for `intent`
    pub fn await_fields(intent: IntentKind, accumulated_text: &str, data: Value) -> Self {
        Effect::UpdateContext(ContextPatch {
            pending_intent: Some(intent),
            accumulated_text: Some(accumulated_text.to_string()),
            data: Some(data),
        })
    }

    /// Disambiguation: wait for a numbered pick among `candidates`
    pub fn await_choice(
        intent: IntentKind,
        accumulated_text: &str,
        candidates: Vec<Value>,
        action: Value,
    ) -> Self {
        let mut data = Map::new();
        data.insert(CANDIDATES_KEY.to_string(), Value::Array(candidates));
        data.insert(ACTION_KEY.to_string(), action);
        Effect::UpdateContext(ContextPatch {
            pending_intent: Some(intent),
            accumulated_text: Some(accumulated_text.to_string()),
            data: Some(Value::Object(data)),
        })
    }

    /// Refresh `last_updated` without changing anything else
    pub fn touch_context() -> Self {
        Effect::UpdateContext(ContextPatch::default())
    }
}

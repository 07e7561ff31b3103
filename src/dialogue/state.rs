//! Dialogue state as seen by the dispatcher

use super::context::{ConversationContext, ACTION_KEY, CANDIDATES_KEY};
use super::intent::IntentKind;
use serde::Serialize;
use serde_json::{Map, Value};

/// Where a conversation stands, derived from its (live) context
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
#[derive(Default)]
pub enum DialogueState {
    /// No open flow
    #[default]
    Idle,

    /// A capability is waiting for more details
    Continuation {
        pending_intent: IntentKind,
        accumulated_text: String,
        data: Value,
    },

    /// A capability is waiting for the user to pick one of several targets
    Disambiguation {
        pending_intent: IntentKind,
        accumulated_text: String,
        candidates: Vec<Value>,
        action: Value,
    },
}

impl DialogueState {
    pub fn from_context(context: Option<&ConversationContext>) -> Self {
        let Some(context) = context else {
            return DialogueState::Idle;
        };
        let Some(pending_intent) = context.pending_intent else {
            return DialogueState::Idle;
        };

        match context.candidates() {
            Some(candidates) => DialogueState::Disambiguation {
                pending_intent,
                accumulated_text: context.accumulated_text.clone(),
                candidates: candidates.to_vec(),
                action: context.original_action(),
            },
            None => DialogueState::Continuation {
                pending_intent,
                accumulated_text: context.accumulated_text.clone(),
                data: context.data.clone(),
            },
        }
    }

    pub fn pending_intent(&self) -> Option<IntentKind> {
        match self {
            DialogueState::Idle => None,
            DialogueState::Continuation { pending_intent, .. }
            | DialogueState::Disambiguation { pending_intent, .. } => Some(*pending_intent),
        }
    }

    /// Text of the flow so far, empty when idle
    pub fn accumulated_text(&self) -> &str {
        match self {
            DialogueState::Idle => "",
            DialogueState::Continuation {
                accumulated_text, ..
            }
            | DialogueState::Disambiguation {
                accumulated_text, ..
            } => accumulated_text,
        }
    }

    /// The stored payload handed back to the capability on a continuation
    pub fn seed(&self) -> Option<Value> {
        match self {
            DialogueState::Idle => None,
            DialogueState::Continuation { data, .. } => Some(data.clone()),
            DialogueState::Disambiguation {
                candidates, action, ..
            } => {
                let mut seed = Map::new();
                seed.insert(CANDIDATES_KEY.to_string(), Value::Array(candidates.clone()));
                seed.insert(ACTION_KEY.to_string(), action.clone());
                Some(Value::Object(seed))
            }
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, DialogueState::Idle)
    }

    pub fn name(&self) -> &'static str {
        match self {
            DialogueState::Idle => "idle",
            DialogueState::Continuation { .. } => "continuation",
            DialogueState::Disambiguation { .. } => "disambiguation",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;

    fn context(pending: Option<IntentKind>, data: Value) -> ConversationContext {
        ConversationContext {
            pending_intent: pending,
            accumulated_text: "I'll join tomorrow's 3s".to_string(),
            data,
            last_updated: Utc::now(),
        }
    }

    #[test]
    fn test_no_context_is_idle() {
        assert_eq!(DialogueState::from_context(None), DialogueState::Idle);
        let orphan = context(None, json!({"x": 1}));
        assert!(DialogueState::from_context(Some(&orphan)).is_idle());
    }

    #[test]
    fn test_pending_without_candidates_is_continuation() {
        let ctx = context(Some(IntentKind::EventCreation), json!({"gameMode": "RBGs"}));
        let state = DialogueState::from_context(Some(&ctx));
        assert_eq!(state.name(), "continuation");
        assert_eq!(state.pending_intent(), Some(IntentKind::EventCreation));
    }

    #[test]
    fn test_candidates_make_disambiguation() {
        let ctx = context(
            Some(IntentKind::Participation),
            json!({"sessions": [{"id": "a"}, {"id": "b"}], "action": {"status": "joined"}}),
        );
        match DialogueState::from_context(Some(&ctx)) {
            DialogueState::Disambiguation {
                candidates, action, ..
            } => {
                assert_eq!(candidates.len(), 2);
                assert_eq!(action, json!({"status": "joined"}));
            }
            other => panic!("expected disambiguation, got {other:?}"),
        }
    }

    #[test]
    fn test_seed_round_trips_the_stored_payload() {
        let data = json!({"sessions": [{"id": "a"}, {"id": "b"}], "action": {"status": "joined"}});
        let ctx = context(Some(IntentKind::Participation), data.clone());
        let state = DialogueState::from_context(Some(&ctx));
        assert_eq!(state.seed(), Some(data));
        assert_eq!(state.accumulated_text(), "I'll join tomorrow's 3s");
        assert_eq!(DialogueState::Idle.seed(), None);
    }
}

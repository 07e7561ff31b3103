//! Intent vocabulary shared by the classifier and the dispatcher

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;
use std::fmt;

/// What the user wants done
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentKind {
    EventCreation,
    Configuration,
    Participation,
    ScheduleInfo,
    Banter,
    /// Open-ended chat handled by the fallback responder
    Conversation,
}

impl IntentKind {
    /// Kinds that have a dedicated capability handler
    pub const CAPABILITIES: [IntentKind; 5] = [
        IntentKind::EventCreation,
        IntentKind::Configuration,
        IntentKind::Participation,
        IntentKind::ScheduleInfo,
        IntentKind::Banter,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            IntentKind::EventCreation => "event_creation",
            IntentKind::Configuration => "configuration",
            IntentKind::Participation => "participation",
            IntentKind::ScheduleInfo => "schedule_info",
            IntentKind::Banter => "banter",
            IntentKind::Conversation => "conversation",
        }
    }

    /// The detector priority of a capability kind
    pub fn detector_priority(self) -> Priority {
        match self {
            IntentKind::EventCreation => Priority::EventCreation,
            IntentKind::Configuration => Priority::Configuration,
            IntentKind::Participation => Priority::Participation,
            IntentKind::ScheduleInfo => Priority::ScheduleInfo,
            IntentKind::Banter => Priority::Banter,
            IntentKind::Conversation => Priority::DefaultConversation,
        }
    }
}

impl fmt::Display for IntentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tie-break order for candidates of equal confidence, highest first.
///
/// Declaration order is the ranking; the derived `Ord` makes
/// `EventCreation` the smallest, so ascending sort puts it first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    /// Retry shortcut after a failed event creation
    Forced,
    EventCreation,
    Configuration,
    Participation,
    ScheduleInfo,
    /// Re-proposal of an open flow's pending intent
    ContextContinuation,
    /// Generic follow-up to recent history
    ConversationContinuation,
    Banter,
    DefaultConversation,
}

/// One possible reading of a message. Built fresh per turn, never stored.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IntentCandidate {
    pub intent: IntentKind,
    pub confidence: f64,
    pub priority: Priority,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl IntentCandidate {
    pub fn new(intent: IntentKind, confidence: f64, priority: Priority) -> Self {
        Self {
            intent,
            confidence: confidence.clamp(0.0, 1.0),
            priority,
            details: None,
        }
    }

    #[must_use]
    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Highest confidence first, then declared priority
    pub fn rank(&self, other: &Self) -> Ordering {
        other
            .confidence
            .total_cmp(&self.confidence)
            .then(self.priority.cmp(&other.priority))
    }
}

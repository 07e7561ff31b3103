//! Multi-turn dialogue core
//!
//! Stores for open flows, history and retry markers, the intent classifier,
//! and the pure routing functions the dispatcher drives.

pub mod classifier;
pub mod context;
pub mod continuation;
pub mod detectors;
mod effect;
pub mod history;
pub mod intent;
pub mod key;
pub mod retry;
pub mod state;
pub mod transition;

#[cfg(test)]
mod proptests;

pub use classifier::{ClassifierInput, IntentClassifier};
pub use context::{ContextPatch, ContextStore, ConversationContext, InMemoryContextStore};
pub use effect::Effect;
pub use history::{HistoryEntry, HistoryStore, InMemoryHistory, Role};
pub use intent::{IntentCandidate, IntentKind, Priority};
pub use key::ConversationKey;
pub use retry::{InMemoryRetryTracker, RetryMarker, RetryStore};
pub use state::DialogueState;

//! Runtime for handling inbound messages
//!
//! The [`TurnDispatcher`] drives one message through the dialogue core; the
//! sweeper keeps the in-memory stores from growing without bound.

mod dispatcher;
mod sweeper;

pub use dispatcher::{TurnDispatcher, TurnOutcome};
pub use sweeper::{spawn_sweeper, sweep_once, SweepReport};

use crate::clock::Clock;
use crate::config::DialogueConfig;
use crate::dialogue::{
    ContextStore, HistoryStore, InMemoryContextStore, InMemoryHistory, InMemoryRetryTracker,
    RetryStore,
};
use std::sync::Arc;

/// The three per-conversation stores and the clock they share
#[derive(Clone)]
pub struct DialogueStores {
    pub contexts: Arc<dyn ContextStore>,
    pub history: Arc<dyn HistoryStore>,
    pub retries: Arc<dyn RetryStore>,
    pub clock: Arc<dyn Clock>,
}

impl DialogueStores {
    pub fn in_memory(config: &DialogueConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            contexts: Arc::new(InMemoryContextStore::new(config.context_ttl, clock.clone())),
            history: Arc::new(InMemoryHistory::new(
                config.history_limit,
                config.history_ttl,
                clock.clone(),
            )),
            retries: Arc::new(InMemoryRetryTracker::new(clock.clone())),
            clock,
        }
    }
}

//! Bounded per-conversation message history
//!
//! History is advisory: it biases classification and gives the fallback
//! responder something to talk about. It is never a source of truth for
//! committed scheduling data.

use super::key::ConversationKey;
use crate::clock::Clock;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Who said it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Push an entry stamped with the current time, evicting the oldest
    /// entries past the cap
    async fn append(&self, key: &ConversationKey, role: Role, content: &str);

    /// Entries oldest to newest; empty for an unknown key
    async fn get(&self, key: &ConversationKey) -> Vec<HistoryEntry>;

    /// Drop expired entries everywhere. Returns the number removed.
    async fn sweep(&self) -> usize;
}

/// In-process history buffer
pub struct InMemoryHistory {
    entries: RwLock<HashMap<ConversationKey, VecDeque<HistoryEntry>>>,
    limit: usize,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl InMemoryHistory {
    pub fn new(limit: usize, ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            limit,
            ttl,
            clock,
        }
    }

    fn is_expired(&self, entry: &HistoryEntry, now: DateTime<Utc>) -> bool {
        now - entry.timestamp > self.ttl
    }

    /// Entries are appended in time order, so expired ones are always a prefix
    fn prune_front(&self, buffer: &mut VecDeque<HistoryEntry>, now: DateTime<Utc>) -> usize {
        let mut removed = 0;
        while buffer.front().is_some_and(|e| self.is_expired(e, now)) {
            buffer.pop_front();
            removed += 1;
        }
        removed
    }
}

#[async_trait]
impl HistoryStore for InMemoryHistory {
    async fn append(&self, key: &ConversationKey, role: Role, content: &str) {
        let now = self.clock.now();
        let mut entries = self.entries.write().await;
        let buffer = entries.entry(key.clone()).or_default();
        self.prune_front(buffer, now);
        buffer.push_back(HistoryEntry {
            role,
            content: content.to_string(),
            timestamp: now,
        });
        while buffer.len() > self.limit {
            buffer.pop_front();
        }
    }

    async fn get(&self, key: &ConversationKey) -> Vec<HistoryEntry> {
        let now = self.clock.now();
        let entries = self.entries.read().await;
        entries
            .get(key)
            .map(|buffer| {
                buffer
                    .iter()
                    .filter(|e| !self.is_expired(e, now))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    async fn sweep(&self) -> usize {
        let now = self.clock.now();
        let mut entries = self.entries.write().await;
        let mut removed = 0;
        for buffer in entries.values_mut() {
            removed += self.prune_front(buffer, now);
        }
        entries.retain(|_, buffer| !buffer.is_empty());
        removed
    }
}

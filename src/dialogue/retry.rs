//! Marks a capability that recently failed so the user can simply try again

use super::intent::IntentKind;
use super::key::ConversationKey;
use crate::clock::Clock;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RetryMarker {
    pub timestamp: DateTime<Utc>,
    pub attempted: bool,
}

impl RetryMarker {
    /// Whether the failure is recent enough to act on
    pub fn is_within(&self, window: Duration, now: DateTime<Utc>) -> bool {
        now - self.timestamp <= window
    }
}

/// Markers never expire on their own: callers apply the relevance window
#[async_trait]
pub trait RetryStore: Send + Sync {
    async fn mark_failed(&self, key: &ConversationKey, capability: IntentKind);
    async fn clear(&self, key: &ConversationKey, capability: IntentKind);
    async fn check(&self, key: &ConversationKey, capability: IntentKind) -> Option<RetryMarker>;
    /// Forget markers older than `retention`. Returns the number removed.
    async fn sweep(&self, retention: Duration) -> usize;
}

type RetryKey = (ConversationKey, IntentKind);

pub struct InMemoryRetryTracker {
    markers: RwLock<HashMap<RetryKey, RetryMarker>>,
    clock: Arc<dyn Clock>,
}

impl InMemoryRetryTracker {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            markers: RwLock::new(HashMap::new()),
            clock,
        }
    }
}

#[async_trait]
impl RetryStore for InMemoryRetryTracker {
    async fn mark_failed(&self, key: &ConversationKey, capability: IntentKind) {
        let marker = RetryMarker {
            timestamp: self.clock.now(),
            attempted: true,
        };
        self.markers
            .write()
            .await
            .insert((key.clone(), capability), marker);
    }

    async fn clear(&self, key: &ConversationKey, capability: IntentKind) {
        self.markers
            .write()
            .await
            .remove(&(key.clone(), capability));
    }

    async fn check(&self, key: &ConversationKey, capability: IntentKind) -> Option<RetryMarker> {
        self.markers
            .read()
            .await
            .get(&(key.clone(), capability))
            .copied()
    }

    async fn sweep(&self, retention: Duration) -> usize {
        let now = self.clock.now();
        let mut markers = self.markers.write().await;
        let before = markers.len();
        markers.retain(|_, marker| marker.is_within(retention, now));
        before - markers.len()
    }
}

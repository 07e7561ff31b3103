//! Per-conversation open-flow state with lazy TTL expiry

use super::intent::IntentKind;
use super::key::ConversationKey;
use crate::clock::Clock;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Key in `data` under which a disambiguation flow keeps its candidate list
pub const CANDIDATES_KEY: &str = "sessions";
/// Key in `data` under which a disambiguation flow keeps the original action
pub const ACTION_KEY: &str = "action";

/// An open multi-turn flow for one (user, channel)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationContext {
    pub pending_intent: Option<IntentKind>,
    /// Every message of the flow so far, joined with ". "
    pub accumulated_text: String,
    /// Capability payload: partially extracted fields, or a candidate list
    pub data: Value,
    pub last_updated: DateTime<Utc>,
}

impl ConversationContext {
    fn empty(now: DateTime<Utc>) -> Self {
        Self {
            pending_intent: None,
            accumulated_text: String::new(),
            data: Value::Null,
            last_updated: now,
        }
    }

    /// The stored candidate list, if this flow is waiting for a numbered pick
    pub fn candidates(&self) -> Option<&[Value]> {
        self.data
            .get(CANDIDATES_KEY)
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .filter(|list| !list.is_empty())
    }

    /// The action a disambiguation will apply to the picked candidate
    pub fn original_action(&self) -> Value {
        self.data.get(ACTION_KEY).cloned().unwrap_or(Value::Null)
    }

    fn is_stale(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        now - self.last_updated > ttl
    }
}

/// Shallow update. Fields left `None` keep their stored value; `data`
/// replaces the stored payload wholesale.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContextPatch {
    pub pending_intent: Option<IntentKind>,
    pub accumulated_text: Option<String>,
    pub data: Option<Value>,
}

impl ContextPatch {
    pub fn data(data: Value) -> Self {
        Self {
            data: Some(data),
            ..Self::default()
        }
    }

    fn apply(self, context: &mut ConversationContext) {
        if let Some(intent) = self.pending_intent {
            context.pending_intent = Some(intent);
        }
        if let Some(text) = self.accumulated_text {
            context.accumulated_text = text;
        }
        if let Some(data) = self.data {
            context.data = data;
        }
    }
}

#[async_trait]
pub trait ContextStore: Send + Sync {
    /// The live context, or `None` if absent or older than the TTL
    async fn get(&self, key: &ConversationKey) -> Option<ConversationContext>;

    /// Merge `patch` into the stored context (creating it if absent) and
    /// stamp it with the current time
    async fn update(&self, key: &ConversationKey, patch: ContextPatch) -> ConversationContext;

    /// Delete unconditionally. Absent keys are fine.
    async fn clear(&self, key: &ConversationKey);

    /// Drop every stale context. Returns the number removed.
    async fn sweep(&self) -> usize;
}

/// In-process context store
pub struct InMemoryContextStore {
    contexts: RwLock<HashMap<ConversationKey, ConversationContext>>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl InMemoryContextStore {
    pub fn new(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            contexts: RwLock::new(HashMap::new()),
            ttl,
            clock,
        }
    }
}

#[async_trait]
impl ContextStore for InMemoryContextStore {
    async fn get(&self, key: &ConversationKey) -> Option<ConversationContext> {
        let now = self.clock.now();
        {
            let contexts = self.contexts.read().await;
            match contexts.get(key) {
                None => return None,
                Some(context) if !context.is_stale(now, self.ttl) => return Some(context.clone()),
                Some(_) => {}
            }
        }

        // Stale: delete lazily, unless a concurrent update refreshed it
        let mut contexts = self.contexts.write().await;
        if contexts.get(key).is_some_and(|c| c.is_stale(now, self.ttl)) {
            contexts.remove(key);
            tracing::debug!(key = %key, "Expired conversation context");
        }
        None
    }

    async fn update(&self, key: &ConversationKey, patch: ContextPatch) -> ConversationContext {
        let now = self.clock.now();
        let mut contexts = self.contexts.write().await;
        let context = contexts
            .entry(key.clone())
            .or_insert_with(|| ConversationContext::empty(now));
        // Merging into an expired record would resurrect its stale fields
        if context.is_stale(now, self.ttl) {
            *context = ConversationContext::empty(now);
        }
        patch.apply(context);
        context.last_updated = now;
        context.clone()
    }

    async fn clear(&self, key: &ConversationKey) {
        self.contexts.write().await.remove(key);
    }

    async fn sweep(&self) -> usize {
        let now = self.clock.now();
        let mut contexts = self.contexts.write().await;
        let before = contexts.len();
        contexts.retain(|_, context| !context.is_stale(now, self.ttl));
        before - contexts.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ManualClock;
    use serde_json::json;

    fn key() -> ConversationKey {
        ConversationKey::new("u1", "c1")
    }

    fn store(clock: &Arc<ManualClock>) -> InMemoryContextStore {
        InMemoryContextStore::new(Duration::minutes(30), clock.clone())
    }

    #[tokio::test]
    async fn test_update_creates_and_get_returns() {
        let clock = Arc::new(ManualClock::default());
        let store = store(&clock);
        assert!(store.get(&key()).await.is_none());

        store
            .update(
                &key(),
                ContextPatch {
                    pending_intent: Some(IntentKind::EventCreation),
                    accumulated_text: Some("schedule RBGs Friday".to_string()),
                    data: Some(json!({"gameMode": "RBGs"})),
                },
            )
            .await;

        let context = store.get(&key()).await.unwrap();
        assert_eq!(context.pending_intent, Some(IntentKind::EventCreation));
        assert_eq!(context.accumulated_text, "schedule RBGs Friday");
        assert_eq!(context.last_updated, clock.now());
    }

    #[tokio::test]
    async fn test_update_replaces_data_wholesale_and_keeps_siblings() {
        let clock = Arc::new(ManualClock::default());
        let store = store(&clock);
        store
            .update(
                &key(),
                ContextPatch {
                    pending_intent: Some(IntentKind::EventCreation),
                    data: Some(json!({"y": 2})),
                    ..ContextPatch::default()
                },
            )
            .await;
        clock.advance(Duration::minutes(1));

        let merged = store.update(&key(), ContextPatch::data(json!({"x": 1}))).await;
        assert_eq!(merged.pending_intent, Some(IntentKind::EventCreation));
        assert_eq!(merged.data, json!({"x": 1}));
        assert_eq!(merged.last_updated, clock.now());
    }

    #[tokio::test]
    async fn test_lazy_expiry() {
        let clock = Arc::new(ManualClock::default());
        let store = store(&clock);
        store.update(&key(), ContextPatch::data(json!({"a": 1}))).await;

        clock.advance(Duration::minutes(30));
        assert!(store.get(&key()).await.is_some(), "exactly at the TTL is still live");

        clock.advance(Duration::seconds(1));
        assert!(store.get(&key()).await.is_none());
        assert!(store.contexts.read().await.is_empty());
    }

    #[tokio::test]
    async fn test_update_after_expiry_starts_fresh() {
        let clock = Arc::new(ManualClock::default());
        let store = store(&clock);
        store
            .update(
                &key(),
                ContextPatch {
                    pending_intent: Some(IntentKind::Participation),
                    ..ContextPatch::default()
                },
            )
            .await;
        clock.advance(Duration::minutes(45));

        let context = store.update(&key(), ContextPatch::data(json!({}))).await;
        assert_eq!(context.pending_intent, None);
    }

    #[tokio::test]
    async fn test_clear_absent_key_is_noop() {
        let clock = Arc::new(ManualClock::default());
        let store = store(&clock);
        store.clear(&key()).await;
        store.clear(&key()).await;
        assert!(store.get(&key()).await.is_none());
    }

    #[tokio::test]
    async fn test_sweep_removes_only_stale() {
        let clock = Arc::new(ManualClock::default());
        let store = store(&clock);
        store.update(&key(), ContextPatch::data(json!(1))).await;
        clock.advance(Duration::minutes(20));
        let other = ConversationKey::new("u2", "c1");
        store.update(&other, ContextPatch::data(json!(2))).await;
        clock.advance(Duration::minutes(15));

        assert_eq!(store.sweep().await, 1);
        assert_eq!(store.sweep().await, 0);
        assert!(store.get(&other).await.is_some());
    }

    #[test]
    fn test_candidates_accessor() {
        let mut context = ConversationContext::empty(Utc::now());
        assert!(context.candidates().is_none());
        context.data = json!({ "sessions": [] });
        assert!(context.candidates().is_none());
        context.data = json!({ "sessions": [{"id": 1}, {"id": 2}], "action": {"op": "join"} });
        assert_eq!(context.candidates().unwrap().len(), 2);
        assert_eq!(context.original_action(), json!({"op": "join"}));
    }
}

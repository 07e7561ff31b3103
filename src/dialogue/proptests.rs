//! Property-based tests for the dialogue core
//!
//! These tests verify key invariants hold across all possible inputs.

use super::continuation::is_continuation;
use super::history::{HistoryEntry, HistoryStore, InMemoryHistory, Role};
use super::intent::{IntentCandidate, IntentKind, Priority};
use super::key::ConversationKey;
use super::state::DialogueState;
use super::transition::{enter, route, Entry, Gate, Route};
use crate::testing::ManualClock;
use chrono::{Duration, Utc};
use proptest::prelude::*;
use serde_json::json;
use std::sync::Arc;

// ============================================================================
// Test Helpers
// ============================================================================

fn block_on<F: std::future::Future>(future: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
        .block_on(future)
}

fn one_entry_history() -> Vec<HistoryEntry> {
    vec![HistoryEntry {
        role: Role::Assistant,
        content: "What time works?".to_string(),
        timestamp: Utc::now(),
    }]
}

// ============================================================================
// Arbitrary Generators
// ============================================================================

fn arb_intent() -> impl Strategy<Value = IntentKind> {
    prop_oneof![
        Just(IntentKind::EventCreation),
        Just(IntentKind::Configuration),
        Just(IntentKind::Participation),
        Just(IntentKind::ScheduleInfo),
        Just(IntentKind::Banter),
        Just(IntentKind::Conversation),
    ]
}

fn arb_capability() -> impl Strategy<Value = IntentKind> {
    proptest::sample::select(IntentKind::CAPABILITIES.to_vec())
}

fn arb_priority() -> impl Strategy<Value = Priority> {
    prop_oneof![
        Just(Priority::Forced),
        Just(Priority::EventCreation),
        Just(Priority::Configuration),
        Just(Priority::Participation),
        Just(Priority::ScheduleInfo),
        Just(Priority::ContextContinuation),
        Just(Priority::ConversationContinuation),
        Just(Priority::Banter),
        Just(Priority::DefaultConversation),
    ]
}

fn arb_candidate() -> impl Strategy<Value = IntentCandidate> {
    (arb_intent(), 0.0f64..=1.0, arb_priority())
        .prop_map(|(intent, confidence, priority)| IntentCandidate::new(intent, confidence, priority))
}

fn arb_disambiguation() -> impl Strategy<Value = DialogueState> {
    (arb_capability(), "[a-z ]{0,30}", 1usize..6).prop_map(|(intent, text, count)| {
        DialogueState::Disambiguation {
            pending_intent: intent,
            accumulated_text: text,
            candidates: (0..count).map(|i| json!({ "id": i })).collect(),
            action: json!({"op": "apply"}),
        }
    })
}

fn arb_open_state() -> impl Strategy<Value = DialogueState> {
    prop_oneof![
        (arb_capability(), "[a-z ]{1,30}").prop_map(|(intent, text)| {
            DialogueState::Continuation {
                pending_intent: intent,
                accumulated_text: text,
                data: json!({}),
            }
        }),
        arb_disambiguation(),
    ]
}

fn arb_gate_flags() -> impl Strategy<Value = (f64, bool, bool, bool)> {
    (0.0f64..=1.0, any::<bool>(), any::<bool>(), any::<bool>())
}

// ============================================================================
// History
// ============================================================================

proptest! {
    #[test]
    fn prop_history_keeps_most_recent_in_order(count in 0usize..60, limit in 1usize..25) {
        let clock = Arc::new(ManualClock::default());
        let history = InMemoryHistory::new(limit, Duration::minutes(30), clock.clone());
        let key = ConversationKey::new("u", "c");

        let entries = block_on(async {
            for i in 0..count {
                history.append(&key, Role::User, &i.to_string()).await;
                clock.advance(Duration::milliseconds(10));
            }
            history.get(&key).await
        });

        prop_assert_eq!(entries.len(), count.min(limit));
        let expected: Vec<String> = (count.saturating_sub(limit)..count).map(|i| i.to_string()).collect();
        let actual: Vec<String> = entries.into_iter().map(|e| e.content).collect();
        prop_assert_eq!(actual, expected);
    }
}

// ============================================================================
// Ranking
// ============================================================================

proptest! {
    #[test]
    fn prop_rank_is_confidence_then_priority(mut candidates in prop::collection::vec(arb_candidate(), 1..12)) {
        candidates.sort_by(IntentCandidate::rank);
        for pair in candidates.windows(2) {
            prop_assert!(pair[0].confidence >= pair[1].confidence);
            if pair[0].confidence.total_cmp(&pair[1].confidence).is_eq() {
                prop_assert!(pair[0].priority <= pair[1].priority);
            }
        }
    }

    #[test]
    fn prop_confidence_always_clamped(confidence in -10.0f64..10.0, intent in arb_intent()) {
        let candidate = IntentCandidate::new(intent, confidence, Priority::Banter);
        prop_assert!((0.0..=1.0).contains(&candidate.confidence));
    }
}

// ============================================================================
// Continuation heuristic
// ============================================================================

proptest! {
    #[test]
    fn prop_nothing_continues_without_history(text in ".{0,80}") {
        prop_assert!(!is_continuation(&text, &[]));
    }

    #[test]
    fn prop_questions_always_continue(text in "[a-z ]{0,80}") {
        let question = format!("{text}?");
        prop_assert!(is_continuation(&question, &one_entry_history()));
    }

    #[test]
    fn prop_short_messages_continue(words in prop::collection::vec("[a-z]{1,10}", 1..8)) {
        let text = words.join(" ");
        prop_assert!(is_continuation(&text, &one_entry_history()));
    }
}

// ============================================================================
// Routing
// ============================================================================

proptest! {
    /// A bare number during disambiguation never reaches the classifier,
    /// whatever else is going on
    #[test]
    fn prop_number_in_disambiguation_always_resolves(
        state in arb_disambiguation(),
        choice in 0usize..1000,
        pad_left in " {0,3}",
        pad_right in "[ \t]{0,3}",
        retry_live in any::<bool>(),
    ) {
        let text = format!("{pad_left}{choice}{pad_right}");
        prop_assert_eq!(enter(&state, &text, retry_live), Entry::Resolve { choice });
    }

    #[test]
    fn prop_numbers_outside_disambiguation_are_classified(choice in 0usize..1000) {
        let state = DialogueState::Idle;
        prop_assert_eq!(enter(&state, &choice.to_string(), false), Entry::Classify);
    }

    /// An open flow that gets its own intent back always continues
    #[test]
    fn prop_pending_intent_continues_at_any_confidence(
        state in arb_open_state(),
        confidence in 0.0f64..=1.0,
        (threshold, addressed, has_history, retry_live) in arb_gate_flags(),
        text in "[a-z ]{1,20}",
    ) {
        let pending = state.pending_intent().unwrap();
        let candidate = IntentCandidate::new(pending, confidence, Priority::ContextContinuation);
        let gate = Gate {
            threshold,
            addressed,
            has_history,
            retry_live,
            registered: &IntentKind::CAPABILITIES,
        };
        match route(&state, &text, &candidate, gate) {
            Route::Continue { intent, text: flow, seed } => {
                prop_assert_eq!(intent, pending);
                prop_assert!(flow.ends_with(&text));
                prop_assert!(seed.is_some());
            }
            other => prop_assert!(false, "expected continue, got {:?}", other),
        }
    }

    /// Silence only ever happens with nothing open, nothing asking for us,
    /// and a guess below the threshold
    #[test]
    fn prop_silence_needs_idle_and_no_signal(
        state in prop_oneof![Just(DialogueState::Idle), arb_open_state()],
        candidate in arb_candidate(),
        (threshold, addressed, has_history, retry_live) in arb_gate_flags(),
    ) {
        let gate = Gate {
            threshold,
            addressed,
            has_history,
            retry_live,
            registered: &IntentKind::CAPABILITIES,
        };
        if route(&state, "hello", &candidate, gate) == Route::Silent {
            prop_assert!(state.is_idle());
            prop_assert!(!addressed && !has_history && !retry_live);
            prop_assert!(candidate.confidence < threshold);
        }
    }
}

//! Heuristic intent scorer
//!
//! Deterministic and explainable: detector votes, the open flow, and the
//! continuation heuristic each contribute candidates with fixed confidences,
//! and the best one wins. Ties go to the declared [`Priority`].

use super::context::ConversationContext;
use super::continuation::is_continuation;
use super::detectors::{base_confidence, standard_detectors, Detector};
use super::history::HistoryEntry;
use super::intent::{IntentCandidate, IntentKind, Priority};
use crate::channel::ChannelKind;
use serde_json::json;
use std::sync::Arc;

/// Confidence of an open flow's pending intent when the message reads as a follow-up
const PENDING_FOLLOW_UP_CONFIDENCE: f64 = 0.89;
/// Confidence of an open flow's pending intent otherwise
const PENDING_CONFIDENCE: f64 = 0.75;
/// Confidence of a generic follow-up to recent history
const CONVERSATION_CONTINUATION_CONFIDENCE: f64 = 0.88;

/// Everything the classifier looks at for one message
#[derive(Debug, Clone, Copy)]
pub struct ClassifierInput<'a> {
    pub text: &'a str,
    pub channel: ChannelKind,
    pub context: Option<&'a ConversationContext>,
    pub history: &'a [HistoryEntry],
}

pub struct IntentClassifier {
    detectors: Vec<Arc<dyn Detector>>,
}

impl IntentClassifier {
    pub fn new(detectors: Vec<Arc<dyn Detector>>) -> Self {
        Self { detectors }
    }

    pub fn standard() -> Result<Self, regex::Error> {
        Ok(Self::new(standard_detectors()?))
    }

    /// Every candidate, best first
    pub fn candidates(&self, input: ClassifierInput<'_>) -> Vec<IntentCandidate> {
        let mut candidates: Vec<IntentCandidate> = self
            .detectors
            .iter()
            .filter(|d| d.detect(input.text))
            .map(|d| {
                IntentCandidate::new(
                    d.kind(),
                    d.confidence(input.channel),
                    d.kind().detector_priority(),
                )
                .with_details(json!({"source": "detector"}))
            })
            .collect();

        let follow_up = is_continuation(input.text, input.history);

        if let Some(pending) = input.context.and_then(|c| c.pending_intent) {
            let confidence = if follow_up {
                PENDING_FOLLOW_UP_CONFIDENCE
            } else {
                PENDING_CONFIDENCE
            };
            candidates.push(
                IntentCandidate::new(pending, confidence, Priority::ContextContinuation)
                    .with_details(json!({"source": "pending_flow", "follow_up": follow_up})),
            );
        }

        if follow_up {
            candidates.push(
                IntentCandidate::new(
                    IntentKind::Conversation,
                    CONVERSATION_CONTINUATION_CONFIDENCE,
                    Priority::ConversationContinuation,
                )
                .with_details(json!({"source": "follow_up"})),
            );
        }

        if candidates.is_empty() {
            candidates.push(
                IntentCandidate::new(
                    IntentKind::Conversation,
                    base_confidence(IntentKind::Conversation, input.channel),
                    Priority::DefaultConversation,
                )
                .with_details(json!({"source": "default"})),
            );
        }

        candidates.sort_by(IntentCandidate::rank);
        candidates
    }

    /// The single best reading of the message
    pub fn classify(&self, input: ClassifierInput<'_>) -> IntentCandidate {
        let mut ranked = self.candidates(input).into_iter();
        // `candidates` always yields at least the default conversation
        let top = ranked.next().unwrap_or_else(|| {
            IntentCandidate::new(IntentKind::Conversation, 0.0, Priority::DefaultConversation)
        });
        tracing::debug!(
            intent = %top.intent,
            confidence = top.confidence,
            priority = ?top.priority,
            details = ?top.details,
            runners_up = ranked.len(),
            "Classified message"
        );
        top
    }
}

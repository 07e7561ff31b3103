//! Pure routing for one inbound message
//!
//! Three steps, none of which touch a store:
//! 1. [`enter`] decides whether the classifier runs at all (numbered picks
//!    and the retry shortcut bypass it).
//! 2. [`route`] turns the chosen candidate into a [`Route`].
//! 3. [`settle`] turns a capability's outcome into store [`Effect`]s.
//!
//! The dispatcher gathers the inputs, calls these, and executes the result.

use super::effect::Effect;
use super::intent::{IntentCandidate, IntentKind, Priority};
use super::state::DialogueState;
use crate::capability::ProcessResult;
use serde_json::Value;

/// Separator between the messages of one flow
pub const FLOW_SEPARATOR: &str = ". ";

/// Substring that marks a message as being about scheduling
const SCHEDULING_STEM: &str = "schedul";

/// How the dispatcher picks the candidate for a message
#[derive(Debug, Clone, PartialEq)]
pub enum Entry {
    /// Numbered pick during disambiguation, 1-based and not yet range checked
    Resolve { choice: usize },
    /// Retry shortcut after a recent failure
    Forced(IntentCandidate),
    /// Ask the classifier
    Classify,
}

/// What happens to a classified message
#[derive(Debug, Clone, PartialEq)]
pub enum Route {
    /// Feed the whole flow back to the pending capability
    Continue {
        intent: IntentKind,
        text: String,
        seed: Option<Value>,
    },
    /// Start a new request with a capability
    Fresh { intent: IntentKind },
    /// Free-text reply
    Fallback,
    /// Not for us
    Silent,
}

impl Route {
    pub fn name(&self) -> &'static str {
        match self {
            Route::Continue { .. } => "continue",
            Route::Fresh { .. } => "fresh",
            Route::Fallback => "fallback",
            Route::Silent => "silent",
        }
    }
}

/// Everything besides the candidate that decides a [`Route`]
#[derive(Debug, Clone, Copy)]
pub struct Gate<'a> {
    /// Minimum confidence to start a fresh request in this channel
    pub threshold: f64,
    /// Mention, direct message, or reply to the bot
    pub addressed: bool,
    pub has_history: bool,
    pub retry_live: bool,
    /// Kinds with a registered capability handler
    pub registered: &'a [IntentKind],
}

/// A message that is nothing but a number, e.g. `" 2 "`
pub fn parse_choice(text: &str) -> Option<usize> {
    let trimmed = text.trim();
    if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    // Too large for usize is simply out of range
    Some(trimmed.parse().unwrap_or(usize::MAX))
}

/// 0-based position of a 1-based choice, if it names one of `count` options
pub fn choice_index(choice: usize, count: usize) -> Option<usize> {
    (1..=count).contains(&choice).then(|| choice - 1)
}

/// "schedule", "Scheduling", "schedul-ing" but not "reschedule"
pub fn mentions_scheduling(text: &str) -> bool {
    let lowered = text.to_lowercase();
    lowered.match_indices(SCHEDULING_STEM).any(|(at, _)| {
        lowered[..at]
            .chars()
            .next_back()
            .map_or(true, |c| !c.is_alphanumeric())
    })
}

/// Decide how to pick the candidate. A number during disambiguation wins
/// over everything else.
pub fn enter(state: &DialogueState, text: &str, retry_live: bool) -> Entry {
    if let DialogueState::Disambiguation { .. } = state {
        if let Some(choice) = parse_choice(text) {
            return Entry::Resolve { choice };
        }
    }

    if retry_live && mentions_scheduling(text) {
        return Entry::Forced(
            IntentCandidate::new(IntentKind::EventCreation, 1.0, Priority::Forced)
                .with_details(serde_json::json!({"source": "retry"})),
        );
    }

    Entry::Classify
}

pub fn route(
    state: &DialogueState,
    text: &str,
    candidate: &IntentCandidate,
    gate: Gate<'_>,
) -> Route {
    let handled = |intent: IntentKind| gate.registered.contains(&intent);

    // An open flow that gets its own intent back runs whatever the confidence
    if state.pending_intent() == Some(candidate.intent) && handled(candidate.intent) {
        return Route::Continue {
            intent: candidate.intent,
            text: join_flow(state.accumulated_text(), text),
            seed: state.seed(),
        };
    }

    if handled(candidate.intent) && candidate.confidence >= gate.threshold {
        return Route::Fresh {
            intent: candidate.intent,
        };
    }

    // Only a weak guess with nobody asking for us goes unanswered
    let quiet = !gate.addressed && !gate.has_history && !gate.retry_live;
    if state.is_idle() && quiet && candidate.confidence < gate.threshold {
        return Route::Silent;
    }

    Route::Fallback
}

/// `"schedule RBGs Friday"` + `"8pm"` = `"schedule RBGs Friday. 8pm"`
pub fn join_flow(accumulated: &str, text: &str) -> String {
    if accumulated.is_empty() {
        text.to_string()
    } else {
        format!("{accumulated}{FLOW_SEPARATOR}{text}")
    }
}

/// Store effects of a capability outcome. `flow_text` is what the
/// capability was given and becomes the flow's accumulated text.
pub fn settle(intent: IntentKind, result: &ProcessResult, flow_text: &str) -> Vec<Effect> {
    let retry_tracked = intent == IntentKind::EventCreation;
    match result {
        ProcessResult::Success { .. } => {
            let mut effects = vec![Effect::ClearContext];
            if retry_tracked {
                effects.push(Effect::ClearRetry(intent));
            }
            effects
        }
        ProcessResult::Incomplete { data, .. } => {
            vec![Effect::await_fields(intent, flow_text, data.clone())]
        }
        ProcessResult::Ambiguous { candidates, action } => vec![Effect::await_choice(
            intent,
            flow_text,
            candidates.clone(),
            action.clone(),
        )],
        ProcessResult::Failed { .. } => {
            let mut effects = vec![Effect::ClearContext];
            if retry_tracked {
                effects.push(Effect::MarkRetry(intent));
            }
            effects
        }
    }
}

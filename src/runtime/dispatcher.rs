//! Turn dispatcher: one inbound message in, at most one reply out
//!
//! Gathers the dialogue state, asks the pure routing functions in
//! [`crate::dialogue::transition`] what to do, calls the capability or the
//! fallback, and applies the resulting store effects. Nothing here returns
//! an error; every failure becomes a reply and a [`TurnError`] on the outcome.

use super::DialogueStores;
use crate::capability::reply::{apology, choice_out_of_range, SERVICE_UNAVAILABLE};
use crate::capability::{
    Capability, CapabilityError, CapabilityRegistry, CapabilityRequest, ProcessResult, Selection,
};
use crate::channel::{ChannelDirectory, ChannelKind, StaticChannelConfig};
use crate::config::DialogueConfig;
use crate::dialogue::transition::{self, Entry, Gate, Route};
use crate::dialogue::{
    ClassifierInput, ConversationContext, ConversationKey, DialogueState, Effect,
    HistoryEntry, IntentCandidate, IntentClassifier, IntentKind, Role,
};
use crate::error::TurnError;
use crate::fallback::FallbackResponder;
use crate::message::{InboundMessage, MessageCleaner};
use crate::observe::{ObservabilitySink, TurnRecord};
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// What happened to one message
#[derive(Debug, Clone, PartialEq)]
pub struct TurnOutcome {
    /// `None` is a deliberate silence
    pub reply: Option<String>,
    pub intent: Option<IntentKind>,
    pub confidence: Option<f64>,
    /// `silent`, `fallback`, `fresh`, `continue` or `resolve`
    pub route: &'static str,
    pub error: Option<TurnError>,
}

impl TurnOutcome {
    fn silent() -> Self {
        Self {
            reply: None,
            intent: None,
            confidence: None,
            route: Route::Silent.name(),
            error: None,
        }
    }

    /// The user's request was served, or a flow is waiting on them
    pub fn success(&self) -> bool {
        self.error.as_ref().map_or(true, |e| !e.is_failure())
    }

    /// A flow stays open until the user answers
    pub fn awaiting_user(&self) -> bool {
        self.error.as_ref().is_some_and(TurnError::is_recoverable)
    }
}

/// Everything gathered about the conversation before routing
struct Turn<'a> {
    message: &'a InboundMessage,
    key: ConversationKey,
    text: String,
    channel: ChannelKind,
    context: Option<ConversationContext>,
    state: DialogueState,
    history: Vec<HistoryEntry>,
}

impl Turn<'_> {
    fn request<'r>(&'r self, text: &'r str, seed: Option<&'r Value>) -> CapabilityRequest<'r> {
        CapabilityRequest {
            key: &self.key,
            community_id: self.message.community_id.as_deref(),
            channel: self.channel,
            text,
            context: self.context.as_ref(),
            seed,
            history: &self.history,
        }
    }
}

pub struct TurnDispatcher {
    config: DialogueConfig,
    stores: DialogueStores,
    classifier: IntentClassifier,
    capabilities: CapabilityRegistry,
    registered: Vec<IntentKind>,
    fallback: FallbackResponder,
    channels: Arc<dyn ChannelDirectory>,
    cleaner: MessageCleaner,
    sink: Option<Arc<dyn ObservabilitySink>>,
}

impl TurnDispatcher {
    pub fn new(
        config: DialogueConfig,
        stores: DialogueStores,
        classifier: IntentClassifier,
        capabilities: CapabilityRegistry,
        fallback: FallbackResponder,
    ) -> Result<Self, regex::Error> {
        let registered = capabilities.kinds();
        Ok(Self {
            config,
            stores,
            classifier,
            capabilities,
            registered,
            fallback,
            channels: Arc::new(StaticChannelConfig::new()),
            cleaner: MessageCleaner::new()?,
            sink: None,
        })
    }

    #[must_use]
    pub fn with_channels(mut self, channels: Arc<dyn ChannelDirectory>) -> Self {
        self.channels = channels;
        self
    }

    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn ObservabilitySink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn stores(&self) -> &DialogueStores {
        &self.stores
    }

    /// Handle one inbound message
    pub async fn handle(&self, message: InboundMessage) -> TurnOutcome {
        let started = Instant::now();
        let text = self.cleaner.clean(&message.content);
        let outcome = if text.is_empty() {
            TurnOutcome::silent()
        } else {
            self.run_turn(&message, text.clone()).await
        };

        tracing::info!(
            key = %message.key(),
            route = outcome.route,
            intent = ?outcome.intent,
            replied = outcome.reply.is_some(),
            awaiting_user = outcome.awaiting_user(),
            error = outcome.error.as_ref().map(TurnError::kind),
            "Handled message"
        );
        self.observe(&message, &text, &outcome, started.elapsed())
            .await;
        outcome
    }

    async fn run_turn(&self, message: &InboundMessage, text: String) -> TurnOutcome {
        let key = message.key();
        let channel = self
            .channels
            .channel_kind(&message.channel_id, message.community_id.as_deref())
            .await;
        let context = self.stores.contexts.get(&key).await;
        let state = DialogueState::from_context(context.as_ref());
        let history = self.stores.history.get(&key).await;
        let now = self.stores.clock.now();
        let retry_live = self
            .stores
            .retries
            .check(&key, IntentKind::EventCreation)
            .await
            .is_some_and(|m| m.is_within(self.config.retry_window, now));

        let turn = Turn {
            message,
            key,
            text,
            channel,
            context,
            state,
            history,
        };

        let candidate = match transition::enter(&turn.state, &turn.text, retry_live) {
            Entry::Resolve { choice } => return self.resolve(&turn, choice).await,
            Entry::Forced(candidate) => {
                tracing::info!(key = %turn.key, "Retrying failed event creation");
                candidate
            }
            Entry::Classify => self.classifier.classify(ClassifierInput {
                text: &turn.text,
                channel,
                context: turn.context.as_ref(),
                history: &turn.history,
            }),
        };

        let threshold = self.config.threshold(channel);
        let gate = Gate {
            threshold,
            addressed: message.is_addressed(),
            has_history: !turn.history.is_empty(),
            retry_live,
            registered: &self.registered,
        };
        let route = transition::route(&turn.state, &turn.text, &candidate, gate);
        tracing::debug!(
            key = %turn.key,
            state = turn.state.name(),
            route = route.name(),
            "Routed message"
        );

        match route {
            Route::Silent => TurnOutcome::silent(),
            Route::Fallback => {
                let low_confidence = (candidate.confidence < threshold).then_some(
                    TurnError::ClassificationLowConfidence {
                        intent: candidate.intent,
                        confidence: candidate.confidence,
                        threshold,
                    },
                );
                self.run_fallback(&turn, &candidate, low_confidence).await
            }
            Route::Fresh { intent } => {
                let outcome = self
                    .run_capability(&turn, intent, &turn.text, None)
                    .await;
                with_candidate(outcome, &candidate, route.name())
            }
            Route::Continue {
                intent,
                ref text,
                ref seed,
            } => {
                let outcome = self
                    .run_capability(&turn, intent, text, seed.as_ref())
                    .await;
                with_candidate(outcome, &candidate, route.name())
            }
        }
    }

    async fn run_fallback(
        &self,
        turn: &Turn<'_>,
        candidate: &IntentCandidate,
        low_confidence: Option<TurnError>,
    ) -> TurnOutcome {
        let reply = self
            .fallback
            .respond(turn.channel, &turn.history, &turn.text)
            .await;
        self.remember(&turn.key, &turn.text, &reply.text).await;
        TurnOutcome {
            reply: Some(reply.text),
            intent: Some(candidate.intent),
            confidence: Some(candidate.confidence),
            route: Route::Fallback.name(),
            error: reply.error.or(low_confidence),
        }
    }

    /// Run a capability on `flow_text` and settle its outcome
    async fn run_capability(
        &self,
        turn: &Turn<'_>,
        intent: IntentKind,
        flow_text: &str,
        seed: Option<&Value>,
    ) -> TurnOutcome {
        let Some(capability) = self.capabilities.get(intent) else {
            return self.unhandled(turn, intent).await;
        };
        let result = capability.process(turn.request(flow_text, seed)).await;
        self.conclude(turn, capability.as_ref(), intent, result, flow_text)
            .await
    }

    /// A bare number while a choice list is open
    async fn resolve(&self, turn: &Turn<'_>, choice: usize) -> TurnOutcome {
        let DialogueState::Disambiguation {
            pending_intent,
            accumulated_text,
            candidates,
            action,
        } = &turn.state
        else {
            return TurnOutcome::silent();
        };
        let intent = *pending_intent;
        let route = "resolve";

        let Some(index) = transition::choice_index(choice, candidates.len()) else {
            let reply = choice_out_of_range(candidates.len());
            self.apply(&turn.key, vec![Effect::touch_context()]).await;
            self.remember(&turn.key, &turn.text, &reply).await;
            return TurnOutcome {
                reply: Some(reply),
                intent: Some(intent),
                confidence: None,
                route,
                error: None,
            };
        };

        let Some(capability) = self.capabilities.get(intent) else {
            return self.unhandled(turn, intent).await;
        };
        let selection = Selection {
            index: choice,
            candidate: &candidates[index],
            candidates,
            action,
        };
        let seed = turn.state.seed();
        let result = capability
            .resolve(selection, turn.request(accumulated_text, seed.as_ref()))
            .await;
        let mut outcome = self
            .conclude(turn, capability.as_ref(), intent, result, accumulated_text)
            .await;
        outcome.route = route;
        outcome
    }

    /// Turn a capability result into effects, a reply and history
    async fn conclude(
        &self,
        turn: &Turn<'_>,
        capability: &dyn Capability,
        intent: IntentKind,
        result: Result<ProcessResult, CapabilityError>,
        flow_text: &str,
    ) -> TurnOutcome {
        let (settled, reply, error) = match result {
            Ok(result) => {
                let reply = capability.render_response(&result);
                let error = match &result {
                    ProcessResult::Success { .. } => None,
                    ProcessResult::Incomplete { missing_fields, .. } => {
                        Some(TurnError::CapabilityIncomplete {
                            intent,
                            missing: missing_fields.clone(),
                        })
                    }
                    ProcessResult::Ambiguous { candidates, .. } => {
                        Some(TurnError::CapabilityAmbiguous {
                            intent,
                            count: candidates.len(),
                        })
                    }
                    ProcessResult::Failed { error } => Some(TurnError::CapabilityHardFailure {
                        intent,
                        message: error.clone(),
                    }),
                };
                (result, reply, error)
            }
            Err(e) => {
                tracing::warn!(key = %turn.key, intent = %intent, error = %e, "Capability error");
                let reply = if e.is_upstream() {
                    SERVICE_UNAVAILABLE.to_string()
                } else {
                    apology(None)
                };
                let error = TurnError::from_capability(intent, &e);
                (ProcessResult::failed(e.to_string()), reply, Some(error))
            }
        };

        tracing::debug!(
            key = %turn.key,
            intent = %intent,
            outcome = settled.label(),
            success = settled.is_success(),
            "Capability settled"
        );
        self.apply(&turn.key, transition::settle(intent, &settled, flow_text))
            .await;
        self.remember(&turn.key, &turn.text, &reply).await;

        TurnOutcome {
            reply: Some(reply),
            intent: Some(intent),
            confidence: None,
            route: "capability",
            error,
        }
    }

    /// Pending intent whose handler is gone: close the flow and apologize
    async fn unhandled(&self, turn: &Turn<'_>, intent: IntentKind) -> TurnOutcome {
        tracing::warn!(key = %turn.key, intent = %intent, "No capability registered");
        let error = TurnError::CapabilityHardFailure {
            intent,
            message: "no handler registered".to_string(),
        };
        let reply = apology(None);
        self.apply(&turn.key, vec![Effect::ClearContext]).await;
        self.remember(&turn.key, &turn.text, &reply).await;
        TurnOutcome {
            reply: Some(reply),
            intent: Some(intent),
            confidence: None,
            route: "capability",
            error: Some(error),
        }
    }

    async fn apply(&self, key: &ConversationKey, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::UpdateContext(patch) => {
                    self.stores.contexts.update(key, patch).await;
                }
                Effect::ClearContext => self.stores.contexts.clear(key).await,
                Effect::MarkRetry(intent) => self.stores.retries.mark_failed(key, intent).await,
                Effect::ClearRetry(intent) => self.stores.retries.clear(key, intent).await,
            }
        }
    }

    async fn remember(&self, key: &ConversationKey, text: &str, reply: &str) {
        self.stores.history.append(key, Role::User, text).await;
        self.stores.history.append(key, Role::Assistant, reply).await;
    }

    async fn observe(
        &self,
        message: &InboundMessage,
        text: &str,
        outcome: &TurnOutcome,
        latency: Duration,
    ) {
        let Some(sink) = &self.sink else {
            return;
        };
        let record = TurnRecord {
            turn_id: uuid::Uuid::new_v4().to_string(),
            user: message.author_id.clone(),
            channel: message.channel_id.clone(),
            community: message.community_id.clone(),
            message: text.to_string(),
            detected_intent: outcome.intent.map(|i| i.as_str().to_string()),
            confidence: outcome.confidence,
            route: outcome.route.to_string(),
            success: outcome.success(),
            response: outcome.reply.clone(),
            latency_ms: u64::try_from(latency.as_millis()).unwrap_or(u64::MAX),
            error: outcome.error.as_ref().map(ToString::to_string),
        };
        if let Err(e) = sink.record(&record).await {
            tracing::debug!(error = %e, "Dropped turn record");
        }
    }
}

fn with_candidate(
    mut outcome: TurnOutcome,
    candidate: &IntentCandidate,
    route: &'static str,
) -> TurnOutcome {
    outcome.confidence = Some(candidate.confidence);
    outcome.route = route;
    outcome
}

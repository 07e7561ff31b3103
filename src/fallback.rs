//! Free-text replies when no capability takes the message
//!
//! Sends the channel persona, the rolling history and the new message to
//! the model. If there is no model, or it errors, the user gets a static
//! "service unavailable" line instead.

use crate::capability::reply::SERVICE_UNAVAILABLE;
use crate::channel::ChannelKind;
use crate::dialogue::history::HistoryEntry;
use crate::error::TurnError;
use crate::llm::{LlmMessage, LlmRequest, LlmService, SystemContent};
use crate::system_prompt::build_system_prompt;
use std::sync::Arc;

const FALLBACK_MAX_TOKENS: u32 = 400;

/// What the fallback said, and why it fell short if it did
#[derive(Debug, Clone, PartialEq)]
pub struct FallbackReply {
    pub text: String,
    pub error: Option<TurnError>,
}

#[derive(Clone, Default)]
pub struct FallbackResponder {
    llm: Option<Arc<dyn LlmService>>,
}

impl FallbackResponder {
    pub fn new(llm: Option<Arc<dyn LlmService>>) -> Self {
        Self { llm }
    }

    pub fn build_request(channel: ChannelKind, history: &[HistoryEntry], text: &str) -> LlmRequest {
        let mut messages: Vec<LlmMessage> = history.iter().map(LlmMessage::from).collect();
        messages.push(LlmMessage::user(text));
        LlmRequest {
            system: vec![SystemContent::cached(build_system_prompt(channel))],
            messages,
            max_tokens: Some(FALLBACK_MAX_TOKENS),
        }
    }

    pub async fn respond(
        &self,
        channel: ChannelKind,
        history: &[HistoryEntry],
        text: &str,
    ) -> FallbackReply {
        let Some(llm) = &self.llm else {
            return unavailable(TurnError::UpstreamUnavailable(
                "no language model configured".to_string(),
            ));
        };

        let request = Self::build_request(channel, history, text);
        match llm.complete(&request).await {
            Ok(response) => match response.non_empty_text() {
                Some(reply) => FallbackReply {
                    text: reply.to_string(),
                    error: None,
                },
                None => {
                    tracing::warn!(model = %llm.model_id(), "Fallback reply was empty");
                    unavailable(TurnError::UpstreamUnavailable("empty reply".to_string()))
                }
            },
            Err(e) => {
                tracing::warn!(model = %llm.model_id(), error = %e, "Fallback LLM error");
                unavailable(TurnError::from(&e))
            }
        }
    }
}

fn unavailable(error: TurnError) -> FallbackReply {
    FallbackReply {
        text: SERVICE_UNAVAILABLE.to_string(),
        error: Some(error),
    }
}

//! Inbound messages from the chat platform adapter

use crate::dialogue::key::ConversationKey;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// One message as delivered by the platform adapter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundMessage {
    pub author_id: String,
    pub channel_id: String,
    #[serde(default)]
    pub community_id: Option<String>,
    pub content: String,
    #[serde(default)]
    pub replied_to_message_id: Option<String>,
    /// The bot was mentioned, messaged directly, or replied to
    #[serde(default)]
    pub addressed: bool,
}

impl InboundMessage {
    pub fn new(
        author_id: impl Into<String>,
        channel_id: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            author_id: author_id.into(),
            channel_id: channel_id.into(),
            community_id: None,
            content: content.into(),
            replied_to_message_id: None,
            addressed: false,
        }
    }

    #[must_use]
    pub fn in_community(mut self, community_id: impl Into<String>) -> Self {
        self.community_id = Some(community_id.into());
        self
    }

    #[must_use]
    pub fn addressed(mut self) -> Self {
        self.addressed = true;
        self
    }

    #[must_use]
    pub fn replying_to(mut self, message_id: impl Into<String>) -> Self {
        self.replied_to_message_id = Some(message_id.into());
        self
    }

    pub fn key(&self) -> ConversationKey {
        ConversationKey::new(&self.author_id, &self.channel_id)
    }

    /// Mentioned, direct, or a reply to one of our messages
    pub fn is_addressed(&self) -> bool {
        self.addressed || self.replied_to_message_id.is_some()
    }
}

/// Strips platform markup (user, role and channel mentions) and collapses
/// whitespace, leaving the text the classifier sees
#[derive(Debug, Clone)]
pub struct MessageCleaner {
    mentions: Regex,
}

impl MessageCleaner {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            mentions: Regex::new(r"<(?:@[!&]?|#)\d+>")?,
        })
    }

    pub fn clean(&self, content: &str) -> String {
        let stripped = self.mentions.replace_all(content, " ");
        stripped.split_whitespace().collect::<Vec<_>>().join(" ")
    }
}

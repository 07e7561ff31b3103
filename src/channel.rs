//! Channel classification and the read-only directory that supplies it

use crate::config::{parse_id_list, ConfigError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Category of the channel a message came from. Drives thresholds and tone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    /// Dedicated scheduling channel
    Schedule,
    /// General chat
    Regular,
    /// Event announcements and sign-ups
    Events,
    #[default]
    Other,
}

impl ChannelKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ChannelKind::Schedule => "schedule",
            ChannelKind::Regular => "regular",
            ChannelKind::Events => "events",
            ChannelKind::Other => "other",
        }
    }
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Read-only channel configuration provider
#[async_trait]
pub trait ChannelDirectory: Send + Sync {
    async fn channel_kind(&self, channel_id: &str, community_id: Option<&str>) -> ChannelKind;
}

/// Fixed channel table, typically loaded from the environment
#[derive(Debug, Clone, Default)]
pub struct StaticChannelConfig {
    kinds: HashMap<String, ChannelKind>,
}

impl StaticChannelConfig {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_channel(mut self, channel_id: impl Into<String>, kind: ChannelKind) -> Self {
        self.kinds.insert(channel_id.into(), kind);
        self
    }

    /// Reads `HUDDLE_SCHEDULE_CHANNELS`, `HUDDLE_EVENTS_CHANNELS` and
    /// `HUDDLE_REGULAR_CHANNELS` as comma-separated channel IDs
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub(crate) fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let mut config = Self::new();
        for (var, kind) in [
            ("HUDDLE_SCHEDULE_CHANNELS", ChannelKind::Schedule),
            ("HUDDLE_EVENTS_CHANNELS", ChannelKind::Events),
            ("HUDDLE_REGULAR_CHANNELS", ChannelKind::Regular),
        ] {
            if let Some(raw) = lookup(var) {
                for id in parse_id_list(var, &raw)? {
                    if let Some(previous) = config.kinds.insert(id.clone(), kind) {
                        return Err(ConfigError::Conflict {
                            key: var.to_string(),
                            message: format!("channel {id} already listed as {previous}"),
                        });
                    }
                }
            }
        }
        Ok(config)
    }

    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }
}

#[async_trait]
impl ChannelDirectory for StaticChannelConfig {
    async fn channel_kind(&self, channel_id: &str, _community_id: Option<&str>) -> ChannelKind {
        self.kinds.get(channel_id).copied().unwrap_or_default()
    }
}

//! Environment-driven configuration for the dialogue core

use crate::channel::ChannelKind;
use chrono::Duration;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{key}: cannot parse {value:?}: {message}")]
    Invalid {
        key: String,
        value: String,
        message: String,
    },
    #[error("{key}: {message}")]
    Conflict { key: String, message: String },
}

/// Tunables for the stores and the dispatcher
#[derive(Debug, Clone, PartialEq)]
pub struct DialogueConfig {
    /// Open flows older than this are treated as absent
    pub context_ttl: Duration,
    /// History entries older than this are pruned
    pub history_ttl: Duration,
    /// Maximum retained history entries per conversation
    pub history_limit: usize,
    /// How long a failed event creation keeps the retry shortcut armed
    pub retry_window: Duration,
    /// Period of the background sweep
    pub sweep_interval: std::time::Duration,
    /// Minimum confidence to act on a fresh request in a scheduling channel
    pub schedule_threshold: f64,
    /// Minimum confidence to act on a fresh request anywhere else
    pub default_threshold: f64,
}

impl Default for DialogueConfig {
    fn default() -> Self {
        Self {
            context_ttl: Duration::minutes(30),
            history_ttl: Duration::minutes(30),
            history_limit: 20,
            retry_window: Duration::minutes(5),
            sweep_interval: std::time::Duration::from_secs(60),
            schedule_threshold: 0.5,
            default_threshold: 0.65,
        }
    }
}

impl DialogueConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let secs = |key: &str, fallback: Duration| -> Result<Duration, ConfigError> {
            let Some(raw) = parse_var::<i64>(&lookup, key)? else {
                return Ok(fallback);
            };
            Duration::try_seconds(raw).ok_or_else(|| ConfigError::Invalid {
                key: key.to_string(),
                value: raw.to_string(),
                message: "duration out of range".to_string(),
            })
        };

        let config = Self {
            context_ttl: secs("HUDDLE_CONTEXT_TTL_SECS", defaults.context_ttl)?,
            history_ttl: secs("HUDDLE_HISTORY_TTL_SECS", defaults.history_ttl)?,
            history_limit: parse_var(&lookup, "HUDDLE_HISTORY_LIMIT")?
                .unwrap_or(defaults.history_limit),
            retry_window: secs("HUDDLE_RETRY_WINDOW_SECS", defaults.retry_window)?,
            sweep_interval: parse_var::<u64>(&lookup, "HUDDLE_SWEEP_INTERVAL_SECS")?
                .map_or(defaults.sweep_interval, std::time::Duration::from_secs),
            schedule_threshold: parse_var(&lookup, "HUDDLE_SCHEDULE_THRESHOLD")?
                .unwrap_or(defaults.schedule_threshold),
            default_threshold: parse_var(&lookup, "HUDDLE_DEFAULT_THRESHOLD")?
                .unwrap_or(defaults.default_threshold),
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for (key, value) in [
            ("HUDDLE_CONTEXT_TTL_SECS", self.context_ttl),
            ("HUDDLE_HISTORY_TTL_SECS", self.history_ttl),
            ("HUDDLE_RETRY_WINDOW_SECS", self.retry_window),
        ] {
            if value < Duration::zero() {
                return Err(ConfigError::Invalid {
                    key: key.to_string(),
                    value: value.num_seconds().to_string(),
                    message: "duration cannot be negative".to_string(),
                });
            }
        }
        for (key, value) in [
            ("HUDDLE_SCHEDULE_THRESHOLD", self.schedule_threshold),
            ("HUDDLE_DEFAULT_THRESHOLD", self.default_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::Invalid {
                    key: key.to_string(),
                    value: value.to_string(),
                    message: "threshold must be within 0..=1".to_string(),
                });
            }
        }
        if self.history_limit == 0 {
            return Err(ConfigError::Invalid {
                key: "HUDDLE_HISTORY_LIMIT".to_string(),
                value: "0".to_string(),
                message: "history limit must be positive".to_string(),
            });
        }
        if self.sweep_interval.is_zero() {
            return Err(ConfigError::Invalid {
                key: "HUDDLE_SWEEP_INTERVAL_SECS".to_string(),
                value: "0".to_string(),
                message: "sweep interval must be positive".to_string(),
            });
        }
        Ok(())
    }

    /// Confidence a fresh request must reach before a capability runs
    pub fn threshold(&self, channel: ChannelKind) -> f64 {
        match channel {
            ChannelKind::Schedule => self.schedule_threshold,
            ChannelKind::Regular | ChannelKind::Events | ChannelKind::Other => {
                self.default_threshold
            }
        }
    }
}

fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| ConfigError::Invalid {
                key: key.to_string(),
                value: raw.clone(),
                message: e.to_string(),
            }),
    }
}

/// Comma-separated IDs, blanks dropped
pub(crate) fn parse_id_list(key: &str, raw: &str) -> Result<Vec<String>, ConfigError> {
    let ids: Vec<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect();
    if let Some(bad) = ids.iter().find(|id| id.contains(char::is_whitespace)) {
        return Err(ConfigError::Invalid {
            key: key.to_string(),
            value: bad.clone(),
            message: "channel IDs cannot contain whitespace".to_string(),
        });
    }
    Ok(ids)
}

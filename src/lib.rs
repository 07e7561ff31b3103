//! Huddle - dialogue core for a group scheduling chat bot
//!
//! Turns a stream of chat messages into capability calls: classifies each
//! message, keeps multi-turn flows open across messages, and replies once
//! per handled turn.

pub mod capability;
pub mod channel;
pub mod clock;
pub mod config;
pub mod dialogue;
pub mod error;
pub mod fallback;
pub mod llm;
pub mod message;
pub mod observe;
pub mod runtime;
pub mod system_prompt;

#[cfg(test)]
pub(crate) mod testing;

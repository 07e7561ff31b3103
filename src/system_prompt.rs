//! System prompt construction for the two places we talk to the model
//!
//! The fallback responder gets a persona whose tone follows the channel;
//! the extraction capability gets a strict JSON-only instruction listing the
//! fields it wants.

use crate::capability::FieldSpec;
use crate::channel::ChannelKind;
use std::fmt::Write;

/// Base persona for open-ended replies
const BASE_PROMPT: &str = r"You are the assistant for a gaming group's scheduling bot. You help people plan sessions, check who is coming, and keep the group organized.

Keep replies short: one to three sentences, plain text, no markdown headings. If someone asks you to do something you can't do from chat, say so briefly and suggest what they can type instead (for example: 'schedule 3s Friday at 8pm', 'I'll join Friday', 'what's on the schedule').";

const EXTRACTION_PROMPT: &str = r"You extract structured fields from chat messages for a scheduling bot. Reply with a single JSON object and nothing else. Use null for any field the message does not state. Do not invent values. Keep values short and in the user's own words (for example keep 'Friday' rather than converting it to a date).";

fn tone_for(channel: ChannelKind) -> &'static str {
    match channel {
        ChannelKind::Schedule => {
            "This is the scheduling channel. Stay focused and businesslike; steer chatter back to planning."
        }
        ChannelKind::Events => {
            "This is the events channel. Be upbeat and clear about dates and times."
        }
        ChannelKind::Regular => {
            "This is the group's general chat. Be relaxed and friendly; banter is welcome."
        }
        ChannelKind::Other => "Be friendly and brief.",
    }
}

/// Persona prompt for the fallback responder
pub fn build_system_prompt(channel: ChannelKind) -> String {
    format!("{BASE_PROMPT}\n\n{}", tone_for(channel))
}

/// JSON extraction prompt for a capability's fields
pub fn build_extraction_prompt(label: &str, fields: &[FieldSpec]) -> String {
    let mut prompt = format!("{EXTRACTION_PROMPT}\n\nThe request is: {label}.\nFields:");
    for field in fields {
        let requirement = if field.required { "required" } else { "optional" };
        let _ = write!(
            prompt,
            "\n- \"{}\" ({requirement}): {}",
            field.name, field.description
        );
    }
    prompt.push_str("\n\nExample reply: {");
    let example: Vec<String> = fields
        .iter()
        .map(|f| format!("\"{}\": null", f.name))
        .collect();
    prompt.push_str(&example.join(", "));
    prompt.push('}');
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tone_follows_channel() {
        let schedule = build_system_prompt(ChannelKind::Schedule);
        let regular = build_system_prompt(ChannelKind::Regular);
        assert!(schedule.starts_with(BASE_PROMPT));
        assert!(schedule.contains("scheduling channel"));
        assert!(regular.contains("banter is welcome"));
    }

    #[test]
    fn test_extraction_prompt_lists_fields() {
        let fields = vec![
            FieldSpec::required("gameMode", "the game mode, e.g. 3s or RBGs"),
            FieldSpec::optional("notes", "anything else"),
        ];
        let prompt = build_extraction_prompt("create an event", &fields);
        assert!(prompt.contains("\"gameMode\" (required)"));
        assert!(prompt.contains("\"notes\" (optional)"));
        assert!(prompt.ends_with("{\"gameMode\": null, \"notes\": null}"));
    }
}

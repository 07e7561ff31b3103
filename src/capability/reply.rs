//! Plain-text reply building blocks shared by capabilities and the dispatcher

use super::ProcessResult;
use serde_json::Value;
use std::fmt::Write;

/// Reply when the language model is not reachable
pub const SERVICE_UNAVAILABLE: &str =
    "I can't reach my language service right now. Please try again in a few minutes.";

/// Reply text for any result, used when a capability has nothing better
pub fn render_default(result: &ProcessResult) -> String {
    match result {
        ProcessResult::Success { data } => match summarize_fields(data) {
            Some(summary) => format!("Done: {summary}."),
            None => "Done.".to_string(),
        },
        ProcessResult::Incomplete { missing_fields, .. } => missing_fields_prompt(missing_fields),
        ProcessResult::Ambiguous { candidates, .. } => numbered_choices(candidates),
        ProcessResult::Failed { error } => apology(Some(error)),
    }
}

/// "I still need the time and date."
pub fn missing_fields_prompt(missing: &[String]) -> String {
    let names: Vec<String> = missing.iter().map(|f| humanize(f)).collect();
    match names.as_slice() {
        [] => "I need a few more details to finish that.".to_string(),
        [only] => format!("Almost there. What's the {only}?"),
        [init @ .., last] => format!(
            "Almost there. I still need the {} and {last}.",
            init.join(", ")
        ),
    }
}

/// A numbered list the user answers with a bare number
pub fn numbered_choices(candidates: &[Value]) -> String {
    let mut out = String::from("I found more than one match. Reply with the number you mean:");
    for (i, candidate) in candidates.iter().enumerate() {
        let _ = write!(out, "\n{}. {}", i + 1, describe_candidate(candidate));
    }
    out
}

/// Reply to a number outside the offered range
pub fn choice_out_of_range(count: usize) -> String {
    format!("Please reply with a number between 1 and {count}.")
}

pub fn apology(error: Option<&str>) -> String {
    match error {
        Some(reason) if !reason.trim().is_empty() => {
            format!("Sorry, I couldn't do that: {}. Please try again.", reason.trim())
        }
        _ => "Sorry, something went wrong on my end. Please try again.".to_string(),
    }
}

/// Short human label for a candidate target
pub fn describe_candidate(candidate: &Value) -> String {
    for field in ["label", "title", "name", "description"] {
        if let Some(text) = candidate.get(field).and_then(Value::as_str) {
            return text.to_string();
        }
    }
    match candidate {
        Value::String(s) => s.clone(),
        Value::Object(_) => summarize_fields(candidate).unwrap_or_else(|| candidate.to_string()),
        other => other.to_string(),
    }
}

/// "game mode: RBGs, date: Friday" for the scalar fields of an object
pub fn summarize_fields(data: &Value) -> Option<String> {
    let object = data.as_object()?;
    let parts: Vec<String> = object
        .iter()
        .filter_map(|(key, value)| {
            let text = match value {
                Value::String(s) if !s.is_empty() => s.clone(),
                Value::Number(n) => n.to_string(),
                Value::Bool(b) => b.to_string(),
                _ => return None,
            };
            Some(format!("{}: {text}", humanize(key)))
        })
        .collect();
    (!parts.is_empty()).then(|| parts.join(", "))
}

/// `gameMode` and `game_mode` both become "game mode"
pub fn humanize(field: &str) -> String {
    let mut out = String::with_capacity(field.len() + 4);
    for (i, c) in field.chars().enumerate() {
        if c == '_' || c == '-' {
            out.push(' ');
        } else if c.is_uppercase() && i > 0 {
            out.push(' ');
            out.extend(c.to_lowercase());
        } else {
            out.extend(c.to_lowercase());
        }
    }
    out
}

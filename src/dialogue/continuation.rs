//! "Does this message read like a follow-up?"

use super::history::HistoryEntry;

/// Messages shorter than this many words read as follow-ups
const SHORT_MESSAGE_WORDS: usize = 8;

/// Openers that signal the user is replying to what came before
const CONTINUATION_MARKERS: &[&str] = &[
    "yes",
    "yeah",
    "yep",
    "no",
    "nope",
    "ok",
    "okay",
    "sure",
    "also",
    "and",
    "but",
    "hmm",
    "actually",
    "wait",
    "what about",
    "how about",
    "then",
    "so",
    "maybe",
    "instead",
    "oh",
];

/// Pure heuristic. A conversation with no history has nothing to continue.
pub fn is_continuation(content: &str, history: &[HistoryEntry]) -> bool {
    if history.is_empty() {
        return false;
    }

    if content.split_whitespace().count() < SHORT_MESSAGE_WORDS {
        return true;
    }

    if content.contains('?') {
        return true;
    }

    let folded = content.trim().to_lowercase();
    CONTINUATION_MARKERS
        .iter()
        .any(|marker| folded.starts_with(marker))
}

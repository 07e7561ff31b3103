//! Cheap per-capability keyword detectors
//!
//! Each detector is a pure predicate over the cleaned message text plus a
//! fixed confidence table. They are deliberately simple and explainable; the
//! classifier combines them with conversation context.

use super::intent::IntentKind;
use crate::channel::ChannelKind;
use regex::RegexSet;
use std::sync::Arc;

pub trait Detector: Send + Sync {
    /// The capability this detector votes for
    fn kind(&self) -> IntentKind;

    /// Whether the text looks like a request for this capability
    fn detect(&self, text: &str) -> bool;

    /// Confidence of a positive detection in the given channel
    fn confidence(&self, channel: ChannelKind) -> f64 {
        base_confidence(self.kind(), channel)
    }
}

/// Fixed per-capability confidence, adjusted by channel
pub fn base_confidence(kind: IntentKind, channel: ChannelKind) -> f64 {
    use ChannelKind::{Events, Other, Regular, Schedule};
    match (kind, channel) {
        (IntentKind::EventCreation, Schedule) => 0.95,
        (IntentKind::EventCreation, _) => 0.87,
        (IntentKind::Configuration, _) => 0.93,
        (IntentKind::Participation, Schedule | Events) => 0.90,
        (IntentKind::Participation, Regular | Other) => 0.85,
        (IntentKind::ScheduleInfo, Schedule) => 0.90,
        (IntentKind::ScheduleInfo, Events) => 0.85,
        (IntentKind::ScheduleInfo, Regular | Other) => 0.80,
        (IntentKind::Banter, Regular) => 0.70,
        (IntentKind::Banter, _) => 0.55,
        (IntentKind::Conversation, Regular) => 0.70,
        (IntentKind::Conversation, _) => 0.50,
    }
}

const EVENT_CREATION_PATTERNS: &[&str] = &[
    r"^(please\s+)?(schedule|book|plan|set\s+up|create|organi[sz]e|host)\b",
    r"\b(let'?s|lets|can\s+we|could\s+we|shall\s+we|should\s+we|wanna|want\s+to)\s+(do|run|play|schedule|set\s+up|book|plan|host|organi[sz]e)\b",
    r"\b(new|create\s+an?|schedule\s+an?|set\s+up\s+an?)\s+(event|session|game|raid|match|scrim)\b",
    r"\banyone\s+(up\s+for|down\s+for|want\s+to\s+play)\b",
];

const CONFIGURATION_PATTERNS: &[&str] = &[
    r"\b(set|change|update|configure)\s+(the\s+|my\s+|our\s+)?(default|time\s*zone|reminders?|channel|prefix|language|tone|settings?|config)\b",
    r"\b(turn|switch)\s+(on|off)\s+(the\s+)?(reminders?|notifications?|pings?)\b",
    r"\b(settings|configuration|config)\b",
];

const PARTICIPATION_PATTERNS: &[&str] = &[
    r"\b(join|joining|attend|attending|rsvp)\b",
    r"\b(count\s+me\s+(in|out)|sign\s+me\s+up|put\s+me\s+down|i'?m\s+(in|out)|im\s+(in|out))\b",
    r"\b(can'?t|cannot|won'?t)\s+make\s+it\b",
    r"\b(drop(ping)?\s+out|skip(ping)?|bail(ing)?\s+on)\b",
    r"\b(mark|put)\s+me\s+(as\s+)?(tentative|late|maybe)\b",
];

const SCHEDULE_INFO_PATTERNS: &[&str] = &[
    r"\b(what'?s|what\s+is|show(\s+me)?|list)\s+(on\s+)?(the\s+)?(schedule|events|sessions|calendar)\b",
    r"\bwhen('?s|\s+is|\s+are)\s+(the\s+)?(next|our|we)\b",
    r"\b(upcoming|next)\s+(sessions?|events?|games?|raids?|matche?s?)\b",
    r"\bwho('?s|\s+is)\s+(coming|going|joining|signed\s+up|in)\b",
];

const BANTER_PATTERNS: &[&str] = &[
    r"^(hi|hey|hello|yo|sup|gm|gn|thanks|thank\s+you|thx|ty|lol|lmao|haha+|good\s+(morning|night|evening))\b",
    r"\b(how\s+are\s+you|you\s+there|good\s+bot|bad\s+bot|love\s+you)\b",
];

/// Case-insensitive keyword detector over a set of patterns
pub struct KeywordDetector {
    kind: IntentKind,
    patterns: RegexSet,
}

impl KeywordDetector {
    pub fn new(kind: IntentKind, patterns: &[&str]) -> Result<Self, regex::Error> {
        let patterns = RegexSet::new(patterns.iter().map(|p| format!("(?i){p}")))?;
        Ok(Self { kind, patterns })
    }

    pub fn event_creation() -> Result<Self, regex::Error> {
        Self::new(IntentKind::EventCreation, EVENT_CREATION_PATTERNS)
    }

    pub fn configuration() -> Result<Self, regex::Error> {
        Self::new(IntentKind::Configuration, CONFIGURATION_PATTERNS)
    }

    pub fn participation() -> Result<Self, regex::Error> {
        Self::new(IntentKind::Participation, PARTICIPATION_PATTERNS)
    }

    pub fn schedule_info() -> Result<Self, regex::Error> {
        Self::new(IntentKind::ScheduleInfo, SCHEDULE_INFO_PATTERNS)
    }

    pub fn banter() -> Result<Self, regex::Error> {
        Self::new(IntentKind::Banter, BANTER_PATTERNS)
    }
}

impl Detector for KeywordDetector {
    fn kind(&self) -> IntentKind {
        self.kind
    }

    fn detect(&self, text: &str) -> bool {
        self.patterns.is_match(text.trim())
    }
}

/// The five standard detectors, in priority order
pub fn standard_detectors() -> Result<Vec<Arc<dyn Detector>>, regex::Error> {
    Ok(vec![
        Arc::new(KeywordDetector::event_creation()?),
        Arc::new(KeywordDetector::configuration()?),
        Arc::new(KeywordDetector::participation()?),
        Arc::new(KeywordDetector::schedule_info()?),
        Arc::new(KeywordDetector::banter()?),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detected(text: &str) -> Vec<IntentKind> {
        standard_detectors()
            .unwrap()
            .iter()
            .filter(|d| d.detect(text))
            .map(|d| d.kind())
            .collect()
    }

    #[test]
    fn test_event_creation_phrasings() {
        assert_eq!(detected("can we do 3s tomorrow at 8pm"), vec![IntentKind::EventCreation]);
        assert_eq!(detected("schedule RBGs Friday"), vec![IntentKind::EventCreation]);
        assert_eq!(detected("let's schedule it"), vec![IntentKind::EventCreation]);
        assert_eq!(detected("Anyone up for a raid tonight"), vec![IntentKind::EventCreation]);
    }

    #[test]
    fn test_participation_phrasings() {
        assert_eq!(detected("I'll join tomorrow's 3s"), vec![IntentKind::Participation]);
        assert_eq!(detected("count me out for friday"), vec![IntentKind::Participation]);
        assert_eq!(detected("sorry, can't make it"), vec![IntentKind::Participation]);
    }

    #[test]
    fn test_configuration_phrasings() {
        assert_eq!(detected("change the timezone to EST"), vec![IntentKind::Configuration]);
        assert_eq!(detected("turn off reminders"), vec![IntentKind::Configuration]);
    }

    #[test]
    fn test_schedule_info_phrasings() {
        assert_eq!(detected("what's on the schedule"), vec![IntentKind::ScheduleInfo]);
        assert_eq!(detected("when is the next raid"), vec![IntentKind::ScheduleInfo]);
        assert_eq!(detected("who's coming saturday"), vec![IntentKind::ScheduleInfo]);
    }

    #[test]
    fn test_banter_phrasings() {
        assert_eq!(detected("hey"), vec![IntentKind::Banter]);
        assert_eq!(detected("thanks bot"), vec![IntentKind::Banter]);
    }

    #[test]
    fn test_plain_chatter_detects_nothing() {
        assert!(detected("the weather is nice today").is_empty());
        assert!(detected("8pm").is_empty());
    }

    #[test]
    fn test_confidence_table() {
        assert!((base_confidence(IntentKind::EventCreation, ChannelKind::Schedule) - 0.95).abs() < 1e-9);
        assert!((base_confidence(IntentKind::EventCreation, ChannelKind::Regular) - 0.87).abs() < 1e-9);
        for channel in [
            ChannelKind::Schedule,
            ChannelKind::Regular,
            ChannelKind::Events,
            ChannelKind::Other,
        ] {
            assert!((base_confidence(IntentKind::Configuration, channel) - 0.93).abs() < 1e-9);
        }
    }
}

//! Generic LLM-backed field extraction capability
//!
//! Asks the model for a JSON object with a fixed set of fields. Fields
//! carried in the seed from earlier turns fill any gaps the model leaves;
//! a value the model extracts now overrides the seed, so a user can correct
//! a detail by restating it.

use super::{reply, Capability, CapabilityError, CapabilityRequest, ProcessResult};
use crate::dialogue::intent::IntentKind;
use crate::llm::{LlmMessage, LlmRequest, LlmService, SystemContent};
use crate::system_prompt::build_extraction_prompt;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::Arc;

const EXTRACTION_MAX_TOKENS: u32 = 300;

/// One field the capability wants filled
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: String,
    pub description: String,
    pub required: bool,
}

impl FieldSpec {
    pub fn required(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            required: true,
        }
    }

    pub fn optional(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            required: false,
        }
    }
}

pub struct ExtractionCapability {
    kind: IntentKind,
    label: String,
    fields: Vec<FieldSpec>,
    llm: Option<Arc<dyn LlmService>>,
}

impl ExtractionCapability {
    pub fn new(
        kind: IntentKind,
        label: impl Into<String>,
        fields: Vec<FieldSpec>,
        llm: Option<Arc<dyn LlmService>>,
    ) -> Self {
        Self {
            kind,
            label: label.into(),
            fields,
            llm,
        }
    }

    /// Game mode, date and time for a new session
    pub fn event_creation(llm: Option<Arc<dyn LlmService>>) -> Self {
        Self::new(
            IntentKind::EventCreation,
            "create a new session",
            vec![
                FieldSpec::required("gameMode", "the game or mode to play, e.g. 3s, 2s, RBGs"),
                FieldSpec::required("date", "the day, e.g. tomorrow, Friday, 12/3"),
                FieldSpec::required("time", "the start time, e.g. 8pm"),
                FieldSpec::optional("notes", "any extra detail the user gave"),
            ],
            llm,
        )
    }

    /// Which setting and what to set it to
    pub fn configuration(llm: Option<Arc<dyn LlmService>>) -> Self {
        Self::new(
            IntentKind::Configuration,
            "change a bot setting",
            vec![
                FieldSpec::required("setting", "the setting name, e.g. timezone, reminders"),
                FieldSpec::required("value", "the new value"),
            ],
            llm,
        )
    }

    /// Join, leave or tentative for a session
    pub fn participation(llm: Option<Arc<dyn LlmService>>) -> Self {
        Self::new(
            IntentKind::Participation,
            "update attendance for a session",
            vec![
                FieldSpec::required("status", "one of: joined, declined, tentative"),
                FieldSpec::required("session", "which session, e.g. tomorrow's 3s"),
            ],
            llm,
        )
    }

    fn required_missing(&self, data: &Map<String, Value>) -> Vec<String> {
        self.fields
            .iter()
            .filter(|f| f.required && !has_value(data.get(&f.name)))
            .map(|f| f.name.clone())
            .collect()
    }

    /// Seed first, then every non-empty freshly extracted known field on top
    fn merge(&self, seed: Option<&Value>, extracted: &Map<String, Value>) -> Map<String, Value> {
        let mut merged = seed.and_then(Value::as_object).cloned().unwrap_or_default();
        for field in &self.fields {
            if let Some(value) = extracted.get(&field.name).filter(|v| has_value(Some(v))) {
                merged.insert(field.name.clone(), value.clone());
            }
        }
        merged
    }
}

fn has_value(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::String(s)) => !s.trim().is_empty(),
        Some(_) => true,
    }
}

/// The first `{` to the last `}` of the reply, parsed as an object
fn parse_json_object(text: &str) -> Result<Map<String, Value>, CapabilityError> {
    let start = text.find('{');
    let end = text.rfind('}');
    let (Some(start), Some(end)) = (start, end) else {
        return Err(CapabilityError::Unparseable(format!(
            "no JSON object in model reply: {text}"
        )));
    };
    if end < start {
        return Err(CapabilityError::Unparseable(format!(
            "no JSON object in model reply: {text}"
        )));
    }
    match serde_json::from_str::<Value>(&text[start..=end]) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(CapabilityError::Unparseable(format!(
            "expected a JSON object, got {other}"
        ))),
        Err(e) => Err(CapabilityError::Unparseable(e.to_string())),
    }
}

#[async_trait]
impl Capability for ExtractionCapability {
    fn kind(&self) -> IntentKind {
        self.kind
    }

    async fn process(
        &self,
        request: CapabilityRequest<'_>,
    ) -> Result<ProcessResult, CapabilityError> {
        let Some(llm) = &self.llm else {
            return Err(CapabilityError::Upstream(crate::llm::LlmError::unavailable(
                "no language model configured",
            )));
        };

        let llm_request = LlmRequest {
            system: vec![SystemContent::cached(build_extraction_prompt(
                &self.label,
                &self.fields,
            ))],
            messages: vec![LlmMessage::user(request.text)],
            max_tokens: Some(EXTRACTION_MAX_TOKENS),
        };
        let response = llm.complete(&llm_request).await?;
        let extracted = parse_json_object(&response.text)?;
        let merged = self.merge(request.seed, &extracted);
        let missing = self.required_missing(&merged);

        tracing::debug!(
            kind = %self.kind,
            extracted = extracted.len(),
            missing = ?missing,
            "Extracted fields"
        );

        if missing.is_empty() {
            Ok(ProcessResult::success(Value::Object(merged)))
        } else {
            Ok(ProcessResult::incomplete(Value::Object(merged), missing))
        }
    }

    fn render_response(&self, result: &ProcessResult) -> String {
        match result {
            ProcessResult::Success { data } => match reply::summarize_fields(data) {
                Some(summary) => format!("Got it, I'll {}: {summary}.", self.label),
                None => format!("Got it, I'll {}.", self.label),
            },
            other => reply::render_default(other),
        }
    }
}

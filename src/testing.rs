//! Test doubles for the dialogue core
//!
//! Everything here is deterministic: a clock that only moves when told to,
//! a model that replays queued responses, and a capability that replays
//! queued outcomes.

use crate::capability::{
    Capability, CapabilityError, CapabilityRequest, ProcessResult, Selection,
};
use crate::clock::Clock;
use crate::dialogue::intent::IntentKind;
use crate::llm::{LlmError, LlmRequest, LlmResponse, LlmService};
use crate::observe::{ObservabilitySink, SinkError, TurnRecord};
use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Mutex;

// ============================================================================
// Manual Clock
// ============================================================================

pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl Default for ManualClock {
    fn default() -> Self {
        Self {
            now: Mutex::new(Utc.with_ymd_and_hms(2024, 6, 7, 18, 0, 0).unwrap()),
        }
    }
}

impl ManualClock {
    pub fn advance(&self, by: Duration) {
        *self.now.lock().unwrap() += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

// ============================================================================
// Mock LLM Client
// ============================================================================

/// Mock LLM client that returns queued responses
pub struct MockLlmClient {
    responses: Mutex<VecDeque<Result<LlmResponse, LlmError>>>,
    model_id: String,
    requests: Mutex<Vec<LlmRequest>>,
}

impl MockLlmClient {
    pub fn new(model_id: impl Into<String>) -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            model_id: model_id.into(),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn queue_response(&self, response: LlmResponse) {
        self.responses.lock().unwrap().push_back(Ok(response));
    }

    pub fn queue_error(&self, error: LlmError) {
        self.responses.lock().unwrap().push_back(Err(error));
    }

    pub fn recorded_requests(&self) -> Vec<LlmRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmService for MockLlmClient {
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        self.requests.lock().unwrap().push(request.clone());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(LlmError::network("No mock response queued")))
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}

// ============================================================================
// Scripted Capability
// ============================================================================

/// What a [`ScriptedCapability`] was asked to do
#[derive(Debug, Clone, PartialEq)]
pub enum CapabilityCall {
    Process { text: String, seed: Option<Value> },
    Resolve { index: usize, candidate: Value, action: Value },
}

/// Capability that replays queued outcomes and records its calls
pub struct ScriptedCapability {
    kind: IntentKind,
    results: Mutex<VecDeque<Result<ProcessResult, CapabilityError>>>,
    resolutions: Mutex<VecDeque<ProcessResult>>,
    calls: Mutex<Vec<CapabilityCall>>,
}

impl ScriptedCapability {
    pub fn new(kind: IntentKind) -> Self {
        Self {
            kind,
            results: Mutex::new(VecDeque::new()),
            resolutions: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    #[must_use]
    pub fn then(self, result: ProcessResult) -> Self {
        self.results.lock().unwrap().push_back(Ok(result));
        self
    }

    #[must_use]
    pub fn then_error(self, error: CapabilityError) -> Self {
        self.results.lock().unwrap().push_back(Err(error));
        self
    }

    #[must_use]
    pub fn then_resolve(self, result: ProcessResult) -> Self {
        self.resolutions.lock().unwrap().push_back(result);
        self
    }

    pub fn calls(&self) -> Vec<CapabilityCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Capability for ScriptedCapability {
    fn kind(&self) -> IntentKind {
        self.kind
    }

    async fn process(
        &self,
        request: CapabilityRequest<'_>,
    ) -> Result<ProcessResult, CapabilityError> {
        self.calls.lock().unwrap().push(CapabilityCall::Process {
            text: request.text.to_string(),
            seed: request.seed.cloned(),
        });
        self.results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(ProcessResult::failed("no scripted result")))
    }

    async fn resolve(
        &self,
        selection: Selection<'_>,
        _request: CapabilityRequest<'_>,
    ) -> Result<ProcessResult, CapabilityError> {
        self.calls.lock().unwrap().push(CapabilityCall::Resolve {
            index: selection.index,
            candidate: selection.candidate.clone(),
            action: selection.action.clone(),
        });
        Ok(self
            .resolutions
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| ProcessResult::failed("no scripted resolution")))
    }
}

// ============================================================================
// Observability sinks
// ============================================================================

#[derive(Default)]
pub struct RecordingSink {
    records: Mutex<Vec<TurnRecord>>,
}

impl RecordingSink {
    pub fn records(&self) -> Vec<TurnRecord> {
        self.records.lock().unwrap().clone()
    }
}

#[async_trait]
impl ObservabilitySink for RecordingSink {
    async fn record(&self, record: &TurnRecord) -> Result<(), SinkError> {
        self.records.lock().unwrap().push(record.clone());
        Ok(())
    }
}

/// Sink whose backend is always down
pub struct FailingSink;

#[async_trait]
impl ObservabilitySink for FailingSink {
    async fn record(&self, _record: &TurnRecord) -> Result<(), SinkError> {
        Err(SinkError::new("sink offline"))
    }
}

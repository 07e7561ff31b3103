//! Per-turn records for whoever is watching
//!
//! A sink failure is logged at debug level and otherwise ignored: it never
//! changes what the user sees.

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

/// One handled message
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TurnRecord {
    pub turn_id: String,
    pub user: String,
    pub channel: String,
    pub community: Option<String>,
    pub message: String,
    pub detected_intent: Option<String>,
    pub confidence: Option<f64>,
    pub route: String,
    pub success: bool,
    pub response: Option<String>,
    pub latency_ms: u64,
    pub error: Option<String>,
}

#[derive(Error, Debug)]
#[error("observability sink failed: {0}")]
pub struct SinkError(String);

impl SinkError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

#[async_trait]
pub trait ObservabilitySink: Send + Sync {
    async fn record(&self, record: &TurnRecord) -> Result<(), SinkError>;
}

/// Emits each turn as a structured `tracing` event
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

#[async_trait]
impl ObservabilitySink for TracingSink {
    async fn record(&self, record: &TurnRecord) -> Result<(), SinkError> {
        let json = serde_json::to_string(record).map_err(|e| SinkError::new(e.to_string()))?;
        tracing::info!(
            turn_id = %record.turn_id,
            route = %record.route,
            success = record.success,
            latency_ms = record.latency_ms,
            record = %json,
            "Turn handled"
        );
        Ok(())
    }
}

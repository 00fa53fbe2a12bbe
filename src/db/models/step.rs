//! Step data models: raw per-tick records, the dedup oracle singleton, and
//! debounce-built sessions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::time;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StepSource {
    Counter,
    Detector,
}

impl StepSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepSource::Counter => "Counter",
            StepSource::Detector => "Detector",
        }
    }
}

/// One accepted hardware tick. Counter records carry the cumulative total
/// since boot; detector records are one physical step each.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepRecord {
    pub id: String,
    pub source: StepSource,
    pub count: i64,
    pub detected_at: DateTime<Utc>,
}

impl StepRecord {
    pub fn new(source: StepSource, count: i64, detected_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            source,
            count,
            detected_at,
        }
    }
}

/// Singleton row replaced on every counter tick. Delta oracle only; never
/// uploaded.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LastKnownStepState {
    pub steps: i64,
    pub distance: Option<f64>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// A burst of detector ticks coalesced over the cooldown window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepSession {
    pub id: String,
    pub count: i64,
    pub start_date_time: DateTime<Utc>,
    pub end_date_time: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub posted_at: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified_at: Option<String>,
}

impl StepSession {
    pub fn new(count: i64, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            id: Self::derive_id(count, start, end),
            count,
            start_date_time: start,
            end_date_time: end,
            posted_at: None,
            modified_at: None,
        }
    }

    /// Deterministic from the session contents, so a retried build lands
    /// on the same row.
    pub fn derive_id(count: i64, start: DateTime<Utc>, end: DateTime<Utc>) -> String {
        let canonical = format!("{}|{}|{}", count, time::to_iso(start), time::to_iso(end));
        hex::encode(Sha256::digest(canonical.as_bytes()))
    }
}

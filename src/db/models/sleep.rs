use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Pending sleep segment, deleted once its chunk is acknowledged.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SleepQueueEntry {
    pub id: i64,
    pub start_millis: i64,
    pub end_millis: i64,
    pub duration_minutes: i64,
    pub created_at: DateTime<Utc>,
}

/// Audit copy of every segment ever seen, including duplicates.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SleepQueueHistoryEntry {
    pub id: i64,
    pub queue_id: i64,
    pub start_millis: i64,
    pub end_millis: i64,
    pub duration_minutes: i64,
    pub created_at: DateTime<Utc>,
}

//! Mutex-guarded, chunked batch upload.
//!
//! Each data category has a dedicated lock owned by the coordinator
//! instance; a post request that finds its category's lock held returns
//! immediately as a success no-op, because the in-flight upload already
//! covers it. Acknowledged chunks are deleted exactly; a failed chunk
//! stops the pass and leaves the remainder for the next trigger.

pub mod client;
pub mod scheduler;

use std::sync::Arc;

use anyhow::Context;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::Mutex as AsyncMutex;

use crate::config::ChunkLimits;
use crate::db::{models::StepSession, Database};
use crate::error::{Error, Result};
use crate::secure::{SecureTokenStore, AUTH_TOKEN_ALIAS};
use crate::time;

use client::ApiClient;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DataCategory {
    Steps,
    StepSessions,
    Sleep,
    DeviceUsage,
    AppUsage,
}

impl DataCategory {
    pub const ALL: [DataCategory; 5] = [
        DataCategory::Steps,
        DataCategory::StepSessions,
        DataCategory::Sleep,
        DataCategory::DeviceUsage,
        DataCategory::AppUsage,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DataCategory::Steps => "steps",
            DataCategory::StepSessions => "stepSessions",
            DataCategory::Sleep => "sleep",
            DataCategory::DeviceUsage => "deviceUsage",
            DataCategory::AppUsage => "appUsage",
        }
    }

    fn index(self) -> usize {
        match self {
            DataCategory::Steps => 0,
            DataCategory::StepSessions => 1,
            DataCategory::Sleep => 2,
            DataCategory::DeviceUsage => 3,
            DataCategory::AppUsage => 4,
        }
    }
}

/// Result of one `post_category` invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostOutcome {
    /// Another upload for this category was already in flight; nothing was
    /// read or sent.
    AlreadyInFlight,
    Completed {
        posted_chunks: usize,
        total_chunks: usize,
    },
}

#[derive(Debug, Clone)]
enum RecordKey {
    Text(String),
    Int(i64),
}

struct PendingRecord {
    key: RecordKey,
    payload: Value,
}

fn to_pending<T: Serialize>(key: RecordKey, record: &T) -> Result<PendingRecord> {
    let payload = serde_json::to_value(record).context("failed to serialize record")?;
    Ok(PendingRecord { key, payload })
}

fn text_keys(keys: Vec<RecordKey>) -> Vec<String> {
    keys.into_iter()
        .filter_map(|key| match key {
            RecordKey::Text(id) => Some(id),
            RecordKey::Int(_) => None,
        })
        .collect()
}

fn int_keys(keys: Vec<RecordKey>) -> Vec<i64> {
    keys.into_iter()
        .filter_map(|key| match key {
            RecordKey::Int(id) => Some(id),
            RecordKey::Text(_) => None,
        })
        .collect()
}

pub struct BatchUploadCoordinator {
    db: Database,
    client: Arc<dyn ApiClient>,
    secrets: SecureTokenStore,
    limits: ChunkLimits,
    locks: [AsyncMutex<()>; DataCategory::ALL.len()],
}

impl BatchUploadCoordinator {
    pub fn new(
        db: Database,
        client: Arc<dyn ApiClient>,
        secrets: SecureTokenStore,
        limits: ChunkLimits,
    ) -> Self {
        Self {
            db,
            client,
            secrets,
            limits,
            locks: std::array::from_fn(|_| AsyncMutex::new(())),
        }
    }

    /// Drains the category's unsent rows in bounded chunks, deleting each
    /// chunk's rows once the server acknowledges it. At most one pass per
    /// category runs at a time; contended calls no-op.
    pub async fn post_category(&self, category: DataCategory) -> Result<PostOutcome> {
        // The guard also serves as the guaranteed-release path: dropped on
        // every exit, including errors.
        let _guard = match self.locks[category.index()].try_lock() {
            Ok(guard) => guard,
            Err(_) => {
                info!("{} upload already in flight, skipping", category.as_str());
                return Ok(PostOutcome::AlreadyInFlight);
            }
        };

        let records = self.pending_records(category).await?;
        if records.is_empty() {
            return Ok(PostOutcome::Completed {
                posted_chunks: 0,
                total_chunks: 0,
            });
        }

        let token = self.secrets.decrypt(AUTH_TOKEN_ALIAS).await?;
        let limit = self.limits.for_category(category);
        let total_chunks = records.chunks(limit).count();
        let mut posted_chunks = 0;

        for chunk in records.chunks(limit) {
            let payload: Vec<Value> = chunk.iter().map(|record| record.payload.clone()).collect();
            match self.client.post_chunk(category, &token, &payload).await {
                Ok(()) => {
                    let keys = chunk.iter().map(|record| record.key.clone()).collect();
                    self.delete_records(category, keys).await?;
                    posted_chunks += 1;
                }
                Err(cause) => {
                    warn!(
                        "{} upload stopped at chunk {}/{}: {}",
                        category.as_str(),
                        posted_chunks + 1,
                        total_chunks,
                        cause
                    );
                    return Err(Error::UploadPartialFailure {
                        posted_chunks,
                        total_chunks,
                        cause,
                    });
                }
            }
        }

        info!(
            "Posted {posted_chunks} chunk(s) for {}",
            category.as_str()
        );
        Ok(PostOutcome::Completed {
            posted_chunks,
            total_chunks,
        })
    }

    /// Runs every category once, in order. Categories fail independently.
    pub async fn post_all(&self) -> Vec<(DataCategory, Result<PostOutcome>)> {
        let mut results = Vec::with_capacity(DataCategory::ALL.len());
        for category in DataCategory::ALL {
            results.push((category, self.post_category(category).await));
        }
        results
    }

    async fn pending_records(&self, category: DataCategory) -> Result<Vec<PendingRecord>> {
        match category {
            DataCategory::Steps => self
                .db
                .get_step_records()
                .await?
                .iter()
                .map(|record| to_pending(RecordKey::Text(record.id.clone()), record))
                .collect(),
            DataCategory::StepSessions => self
                .stamp_step_sessions()
                .await?
                .iter()
                .map(|session| to_pending(RecordKey::Text(session.id.clone()), session))
                .collect(),
            DataCategory::Sleep => self
                .db
                .get_sleep_queue()
                .await?
                .iter()
                .map(|entry| to_pending(RecordKey::Int(entry.id), entry))
                .collect(),
            DataCategory::DeviceUsage => self
                .db
                .get_device_usage_logs()
                .await?
                .iter()
                .map(|log| {
                    let id = log.id.context("device usage log missing row id")?;
                    to_pending(RecordKey::Int(id), log)
                })
                .collect(),
            DataCategory::AppUsage => self
                .db
                .get_duration_logs()
                .await?
                .iter()
                .map(|log| to_pending(RecordKey::Text(log.id.clone()), log))
                .collect(),
        }
    }

    /// Stamps the current timestamp into each pending session's posted_at
    /// list before it goes on the wire, and persists the stamp so retry
    /// metadata survives a failed send.
    async fn stamp_step_sessions(&self) -> Result<Vec<StepSession>> {
        let mut sessions = self.db.get_step_sessions().await?;
        if sessions.is_empty() {
            return Ok(sessions);
        }

        let stamp = time::now_iso();
        for session in &mut sessions {
            session
                .posted_at
                .get_or_insert_with(Vec::new)
                .push(stamp.clone());
            session.modified_at = Some(stamp.clone());
            self.db.upsert_step_session(session).await?;
        }
        Ok(sessions)
    }

    async fn delete_records(&self, category: DataCategory, keys: Vec<RecordKey>) -> Result<()> {
        match category {
            DataCategory::Steps => self.db.delete_step_records(text_keys(keys)).await?,
            DataCategory::StepSessions => self.db.delete_step_sessions(text_keys(keys)).await?,
            DataCategory::Sleep => self.db.delete_sleep_entries(int_keys(keys)).await?,
            DataCategory::DeviceUsage => self.db.delete_device_usage_logs(int_keys(keys)).await?,
            DataCategory::AppUsage => self.db.delete_duration_logs(text_keys(keys)).await?,
        }
        Ok(())
    }
}

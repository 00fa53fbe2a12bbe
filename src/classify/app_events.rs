//! Lifecycle event pairing.
//!
//! Open events (create/start/resume) are cached; a close event is matched
//! against the first cached open of its counterpart kind and emits one
//! derived duration log. A matching close removes every cached open of
//! that kind, collapsing overlapping opens into one close. The cache is
//! bounded: when full, the oldest entry is evicted so closes that never
//! arrive cannot grow it without limit.

use std::collections::VecDeque;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db::models::DurationLog;

const LOG_CATEGORY: &str = "device";
const UNIT_SECONDS: &str = "second";

pub const DEFAULT_CACHE_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AppEventKind {
    Create,
    Start,
    Resume,
    Pause,
    Stop,
    Destroy,
}

impl AppEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppEventKind::Create => "app_create",
            AppEventKind::Start => "app_start",
            AppEventKind::Resume => "app_resume",
            AppEventKind::Pause => "app_pause",
            AppEventKind::Stop => "app_stop",
            AppEventKind::Destroy => "app_destroy",
        }
    }

    fn is_open(self) -> bool {
        matches!(
            self,
            AppEventKind::Create | AppEventKind::Start | AppEventKind::Resume
        )
    }

    fn open_counterpart(self) -> Option<AppEventKind> {
        match self {
            AppEventKind::Pause => Some(AppEventKind::Resume),
            AppEventKind::Stop => Some(AppEventKind::Start),
            AppEventKind::Destroy => Some(AppEventKind::Create),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
struct CachedEvent {
    kind: AppEventKind,
    timestamp: DateTime<Utc>,
}

pub struct LifecycleEventPairer {
    source: String,
    capacity: usize,
    cache: Mutex<VecDeque<CachedEvent>>,
}

impl LifecycleEventPairer {
    pub fn new(source: impl Into<String>) -> Self {
        Self::with_capacity(source, DEFAULT_CACHE_CAPACITY)
    }

    pub fn with_capacity(source: impl Into<String>, capacity: usize) -> Self {
        Self {
            source: source.into(),
            capacity: capacity.max(1),
            cache: Mutex::new(VecDeque::new()),
        }
    }

    /// Feeds one lifecycle event through the two-state machine. Returns a
    /// log only when a close event found a cached open to pair with.
    pub fn process(&self, kind: AppEventKind, timestamp: DateTime<Utc>) -> Option<DurationLog> {
        let mut cache = self.cache.lock().unwrap();

        if kind.is_open() {
            if cache.len() >= self.capacity {
                cache.pop_front();
            }
            cache.push_back(CachedEvent { kind, timestamp });
            return None;
        }

        let open_kind = kind.open_counterpart()?;
        let matched = cache.iter().find(|event| event.kind == open_kind).cloned()?;
        cache.retain(|event| event.kind != open_kind);

        let value = (timestamp - matched.timestamp).num_milliseconds() as f64 / 1000.0;
        Some(DurationLog {
            id: DurationLog::derive_id(LOG_CATEGORY, kind.as_str(), matched.timestamp, timestamp),
            category: LOG_CATEGORY.to_string(),
            data_type: kind.as_str().to_string(),
            value,
            unit: UNIT_SECONDS.to_string(),
            start_date_time: matched.timestamp,
            end_date_time: timestamp,
            source: self.source.clone(),
        })
    }
}

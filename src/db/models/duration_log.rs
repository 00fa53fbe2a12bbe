use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::time;

/// A derived duration (e.g. foreground app time) produced by pairing a
/// close event with an earlier open event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DurationLog {
    pub id: String,
    pub category: String,
    pub data_type: String,
    /// Seconds.
    pub value: f64,
    pub unit: String,
    pub start_date_time: DateTime<Utc>,
    pub end_date_time: DateTime<Utc>,
    pub source: String,
}

impl DurationLog {
    /// Content-derived id: the same logical interval always maps to the
    /// same row regardless of how often it is re-emitted.
    pub fn derive_id(
        category: &str,
        data_type: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> String {
        let canonical = format!(
            "{}|{}|{}|{}",
            category,
            data_type,
            time::to_iso(start),
            time::to_iso(end)
        );
        hex::encode(Sha256::digest(canonical.as_bytes()))
    }
}

//! Step tick classification.
//!
//! The counter sensor re-delivers the same cumulative total on
//! recalibration and listener re-registration, so counter ticks are
//! deduplicated on the exact cumulative value. Detector ticks are each a
//! distinct physical step and pass through untouched.

use chrono::{DateTime, Utc};

use crate::db::models::{StepRecord, StepSource};

/// Returns a record only when no record exists for exactly this cumulative
/// total. `None` means "duplicate, discard" and is not an error.
pub fn classify_counter_tick(
    total_steps: i64,
    existing: Option<&StepRecord>,
    detected_at: DateTime<Utc>,
) -> Option<StepRecord> {
    if existing.is_some() {
        return None;
    }
    Some(StepRecord::new(StepSource::Counter, total_steps, detected_at))
}

/// No dedup: every detector callback is one step.
pub fn classify_detector_tick(detected_at: DateTime<Utc>) -> StepRecord {
    StepRecord::new(StepSource::Detector, 1, detected_at)
}

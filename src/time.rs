//! Epoch-millis and ISO-8601 conversions used everywhere a timestamp
//! crosses the storage or wire boundary.

use chrono::{DateTime, SecondsFormat, TimeZone, Utc};

use crate::error::{Error, Result};

pub fn now() -> DateTime<Utc> {
    Utc::now()
}

pub fn now_epoch_millis() -> i64 {
    Utc::now().timestamp_millis()
}

pub fn now_iso() -> String {
    to_iso(Utc::now())
}

/// Canonical ISO rendering (millisecond precision, `Z` suffix). Also the
/// encoding used for content-derived ids, so it must stay stable.
pub fn to_iso(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn epoch_millis_to_datetime(epoch_millis: i64) -> Result<DateTime<Utc>> {
    Utc.timestamp_millis_opt(epoch_millis)
        .single()
        .ok_or(Error::InvalidTimestamp(epoch_millis))
}

pub fn epoch_millis_to_iso(epoch_millis: i64) -> Result<String> {
    epoch_millis_to_datetime(epoch_millis).map(to_iso)
}

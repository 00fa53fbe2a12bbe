use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One screen-lock/interactive transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceUsageLog {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub is_locked: bool,
    pub is_screen_on: bool,
    pub created_at: DateTime<Utc>,
}

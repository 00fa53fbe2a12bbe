mod device;
mod duration_logs;
mod secrets;
mod sleep;
mod steps;

use anyhow::{Context, Result};

use crate::db::Database;

impl Database {
    /// Full local wipe, including stored secrets. Used by SDK reset only.
    pub async fn reset(&self) -> Result<()> {
        self.execute(|conn| {
            conn.execute_batch(
                "DELETE FROM step_records;
                 DELETE FROM last_known_step_state;
                 DELETE FROM step_sessions;
                 DELETE FROM sleep_queue;
                 DELETE FROM sleep_queue_history;
                 DELETE FROM device_usage_logs;
                 DELETE FROM duration_logs;
                 DELETE FROM encrypted_secrets;",
            )
            .context("failed to reset database")?;
            Ok(())
        })
        .await
    }
}

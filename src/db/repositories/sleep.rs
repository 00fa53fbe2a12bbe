use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Row};

use crate::db::{
    helpers::parse_datetime,
    models::{SleepQueueEntry, SleepQueueHistoryEntry},
    Database,
};

fn row_to_queue_entry(row: &Row) -> Result<SleepQueueEntry> {
    let created_at: String = row.get("created_at")?;
    Ok(SleepQueueEntry {
        id: row.get("id")?,
        start_millis: row.get("start_millis")?,
        end_millis: row.get("end_millis")?,
        duration_minutes: row.get("duration_minutes")?,
        created_at: parse_datetime(&created_at, "created_at")?,
    })
}

fn row_to_history_entry(row: &Row) -> Result<SleepQueueHistoryEntry> {
    let created_at: String = row.get("created_at")?;
    Ok(SleepQueueHistoryEntry {
        id: row.get("id")?,
        queue_id: row.get("queue_id")?,
        start_millis: row.get("start_millis")?,
        end_millis: row.get("end_millis")?,
        duration_minutes: row.get("duration_minutes")?,
        created_at: parse_datetime(&created_at, "created_at")?,
    })
}

impl Database {
    /// Appends one segment to the pending queue and its audit copy to the
    /// history in a single transaction. Returns the queue row id.
    pub async fn push_sleep_segment(
        &self,
        start_millis: i64,
        end_millis: i64,
        duration_minutes: i64,
        created_at: DateTime<Utc>,
    ) -> Result<i64> {
        self.execute(move |conn| {
            let tx = conn
                .transaction()
                .context("failed to open sleep segment transaction")?;

            tx.execute(
                "INSERT INTO sleep_queue (start_millis, end_millis, duration_minutes, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    start_millis,
                    end_millis,
                    duration_minutes,
                    created_at.to_rfc3339(),
                ],
            )
            .with_context(|| "failed to insert sleep queue entry")?;
            let queue_id = tx.last_insert_rowid();

            tx.execute(
                "INSERT INTO sleep_queue_history
                 (queue_id, start_millis, end_millis, duration_minutes, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    queue_id,
                    start_millis,
                    end_millis,
                    duration_minutes,
                    created_at.to_rfc3339(),
                ],
            )
            .with_context(|| "failed to insert sleep history entry")?;

            tx.commit().context("failed to commit sleep segment")?;
            Ok(queue_id)
        })
        .await
    }

    pub async fn get_sleep_queue(&self) -> Result<Vec<SleepQueueEntry>> {
        self.execute(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, start_millis, end_millis, duration_minutes, created_at
                 FROM sleep_queue
                 ORDER BY id ASC",
            )?;

            let mut rows = stmt.query([])?;
            let mut entries = Vec::new();
            while let Some(row) = rows.next()? {
                entries.push(row_to_queue_entry(row)?);
            }
            Ok(entries)
        })
        .await
    }

    pub async fn delete_sleep_entries(&self, ids: Vec<i64>) -> Result<()> {
        self.execute(move |conn| {
            let mut stmt = conn.prepare("DELETE FROM sleep_queue WHERE id = ?1")?;
            for id in &ids {
                stmt.execute(params![id])?;
            }
            Ok(())
        })
        .await
    }

    pub async fn get_sleep_history(&self) -> Result<Vec<SleepQueueHistoryEntry>> {
        self.execute(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, queue_id, start_millis, end_millis, duration_minutes, created_at
                 FROM sleep_queue_history
                 ORDER BY id ASC",
            )?;

            let mut rows = stmt.query([])?;
            let mut entries = Vec::new();
            while let Some(row) = rows.next()? {
                entries.push(row_to_history_entry(row)?);
            }
            Ok(entries)
        })
        .await
    }
}

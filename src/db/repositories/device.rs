use anyhow::{Context, Result};
use rusqlite::{params, Row};

use crate::db::{helpers::parse_datetime, models::DeviceUsageLog, Database};

fn row_to_usage_log(row: &Row) -> Result<DeviceUsageLog> {
    let created_at: String = row.get("created_at")?;
    Ok(DeviceUsageLog {
        id: Some(row.get("id")?),
        is_locked: row.get("is_locked")?,
        is_screen_on: row.get("is_screen_on")?,
        created_at: parse_datetime(&created_at, "created_at")?,
    })
}

impl Database {
    pub async fn insert_device_usage(&self, log: &DeviceUsageLog) -> Result<i64> {
        let log = log.clone();
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO device_usage_logs (is_locked, is_screen_on, created_at)
                 VALUES (?1, ?2, ?3)",
                params![log.is_locked, log.is_screen_on, log.created_at.to_rfc3339()],
            )
            .with_context(|| "failed to insert device usage log")?;
            Ok(conn.last_insert_rowid())
        })
        .await
    }

    pub async fn get_device_usage_logs(&self) -> Result<Vec<DeviceUsageLog>> {
        self.execute(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, is_locked, is_screen_on, created_at
                 FROM device_usage_logs
                 ORDER BY id ASC",
            )?;

            let mut rows = stmt.query([])?;
            let mut logs = Vec::new();
            while let Some(row) = rows.next()? {
                logs.push(row_to_usage_log(row)?);
            }
            Ok(logs)
        })
        .await
    }

    pub async fn delete_device_usage_logs(&self, ids: Vec<i64>) -> Result<()> {
        self.execute(move |conn| {
            let mut stmt = conn.prepare("DELETE FROM device_usage_logs WHERE id = ?1")?;
            for id in &ids {
                stmt.execute(params![id])?;
            }
            Ok(())
        })
        .await
    }
}

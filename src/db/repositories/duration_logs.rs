use anyhow::{Context, Result};
use rusqlite::{params, Row};

use crate::db::{helpers::parse_datetime, models::DurationLog, Database};

fn row_to_duration_log(row: &Row) -> Result<DurationLog> {
    let start: String = row.get("start_date_time")?;
    let end: String = row.get("end_date_time")?;

    Ok(DurationLog {
        id: row.get("id")?,
        category: row.get("category")?,
        data_type: row.get("data_type")?,
        value: row.get("value")?,
        unit: row.get("unit")?,
        start_date_time: parse_datetime(&start, "start_date_time")?,
        end_date_time: parse_datetime(&end, "end_date_time")?,
        source: row.get("source")?,
    })
}

impl Database {
    pub async fn upsert_duration_log(&self, log: &DurationLog) -> Result<()> {
        let log = log.clone();
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO duration_logs
                 (id, category, data_type, value, unit, start_date_time, end_date_time, source)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                 ON CONFLICT(id) DO UPDATE SET
                     value = excluded.value,
                     unit = excluded.unit,
                     source = excluded.source",
                params![
                    log.id,
                    log.category,
                    log.data_type,
                    log.value,
                    log.unit,
                    log.start_date_time.to_rfc3339(),
                    log.end_date_time.to_rfc3339(),
                    log.source,
                ],
            )
            .with_context(|| "failed to upsert duration log")?;
            Ok(())
        })
        .await
    }

    pub async fn get_duration_logs(&self) -> Result<Vec<DurationLog>> {
        self.execute(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, category, data_type, value, unit, start_date_time, end_date_time, source
                 FROM duration_logs
                 ORDER BY start_date_time ASC",
            )?;

            let mut rows = stmt.query([])?;
            let mut logs = Vec::new();
            while let Some(row) = rows.next()? {
                logs.push(row_to_duration_log(row)?);
            }
            Ok(logs)
        })
        .await
    }

    pub async fn delete_duration_logs(&self, ids: Vec<String>) -> Result<()> {
        self.execute(move |conn| {
            let mut stmt = conn.prepare("DELETE FROM duration_logs WHERE id = ?1")?;
            for id in &ids {
                stmt.execute(params![id])?;
            }
            Ok(())
        })
        .await
    }
}

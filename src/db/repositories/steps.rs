use anyhow::{anyhow, Context, Result};
use rusqlite::{params, OptionalExtension, Row};

use crate::db::{
    helpers::parse_datetime,
    models::{LastKnownStepState, StepRecord, StepSession, StepSource},
    Database,
};

fn source_from_str(value: &str) -> Result<StepSource> {
    match value {
        "Counter" => Ok(StepSource::Counter),
        "Detector" => Ok(StepSource::Detector),
        other => Err(anyhow!("unknown step source '{other}'")),
    }
}

fn row_to_step_record(row: &Row) -> Result<StepRecord> {
    let source: String = row.get("source")?;
    let detected_at: String = row.get("detected_at")?;

    Ok(StepRecord {
        id: row.get("id")?,
        source: source_from_str(&source)?,
        count: row.get("count")?,
        detected_at: parse_datetime(&detected_at, "detected_at")?,
    })
}

fn row_to_step_session(row: &Row) -> Result<StepSession> {
    let start: String = row.get("start_date_time")?;
    let end: String = row.get("end_date_time")?;
    let posted_at: Option<String> = row.get("posted_at")?;

    Ok(StepSession {
        id: row.get("id")?,
        count: row.get("count")?,
        start_date_time: parse_datetime(&start, "start_date_time")?,
        end_date_time: parse_datetime(&end, "end_date_time")?,
        posted_at: posted_at
            .map(|raw| serde_json::from_str(&raw).context("failed to parse posted_at"))
            .transpose()?,
        modified_at: row.get("modified_at")?,
    })
}

impl Database {
    pub async fn insert_step_record(&self, record: &StepRecord) -> Result<()> {
        let record = record.clone();
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO step_records (id, source, count, detected_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    record.id,
                    record.source.as_str(),
                    record.count,
                    record.detected_at.to_rfc3339(),
                ],
            )
            .with_context(|| "failed to insert step record")?;
            Ok(())
        })
        .await
    }

    /// Dedup oracle: is there already a counter record for exactly this
    /// cumulative total?
    pub async fn find_counter_record(&self, total_steps: i64) -> Result<Option<StepRecord>> {
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, source, count, detected_at
                 FROM step_records
                 WHERE source = ?1 AND count = ?2
                 LIMIT 1",
            )?;

            stmt.query_row(params![StepSource::Counter.as_str(), total_steps], |row| {
                Ok(row_to_step_record(row))
            })
            .optional()?
            .transpose()
        })
        .await
    }

    pub async fn get_step_records(&self) -> Result<Vec<StepRecord>> {
        self.execute(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, source, count, detected_at
                 FROM step_records
                 ORDER BY detected_at ASC",
            )?;

            let mut rows = stmt.query([])?;
            let mut records = Vec::new();
            while let Some(row) = rows.next()? {
                records.push(row_to_step_record(row)?);
            }
            Ok(records)
        })
        .await
    }

    pub async fn delete_step_records(&self, ids: Vec<String>) -> Result<()> {
        self.execute(move |conn| {
            let mut stmt = conn.prepare("DELETE FROM step_records WHERE id = ?1")?;
            for id in &ids {
                stmt.execute(params![id])?;
            }
            Ok(())
        })
        .await
    }

    pub async fn replace_last_known_state(&self, state: &LastKnownStepState) -> Result<()> {
        let state = state.clone();
        self.execute(move |conn| {
            conn.execute(
                "INSERT OR REPLACE INTO last_known_step_state
                 (id, steps, distance, start_time, end_time, created_at)
                 VALUES (1, ?1, ?2, ?3, ?4, ?5)",
                params![
                    state.steps,
                    state.distance,
                    state.start_time.to_rfc3339(),
                    state.end_time.to_rfc3339(),
                    state.created_at.to_rfc3339(),
                ],
            )
            .with_context(|| "failed to replace last known step state")?;
            Ok(())
        })
        .await
    }

    pub async fn get_last_known_state(&self) -> Result<Option<LastKnownStepState>> {
        self.execute(|conn| {
            let mut stmt = conn.prepare(
                "SELECT steps, distance, start_time, end_time, created_at
                 FROM last_known_step_state
                 WHERE id = 1",
            )?;

            stmt.query_row([], |row| {
                let start: String = row.get("start_time")?;
                let end: String = row.get("end_time")?;
                let created: String = row.get("created_at")?;
                Ok((
                    row.get::<_, i64>("steps")?,
                    row.get::<_, Option<f64>>("distance")?,
                    start,
                    end,
                    created,
                ))
            })
            .optional()?
            .map(|(steps, distance, start, end, created)| {
                Ok(LastKnownStepState {
                    steps,
                    distance,
                    start_time: parse_datetime(&start, "start_time")?,
                    end_time: parse_datetime(&end, "end_time")?,
                    created_at: parse_datetime(&created, "created_at")?,
                })
            })
            .transpose()
        })
        .await
    }

    /// Insert-or-update keyed on the content-derived id, so a retried
    /// session build lands on the existing row.
    pub async fn upsert_step_session(&self, session: &StepSession) -> Result<()> {
        let session = session.clone();
        self.execute(move |conn| {
            let posted_at = session
                .posted_at
                .as_ref()
                .map(|times| serde_json::to_string(times))
                .transpose()
                .context("failed to encode posted_at")?;

            conn.execute(
                "INSERT INTO step_sessions
                 (id, count, start_date_time, end_date_time, posted_at, modified_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(id) DO UPDATE SET
                     count = excluded.count,
                     start_date_time = excluded.start_date_time,
                     end_date_time = excluded.end_date_time,
                     posted_at = excluded.posted_at,
                     modified_at = excluded.modified_at",
                params![
                    session.id,
                    session.count,
                    session.start_date_time.to_rfc3339(),
                    session.end_date_time.to_rfc3339(),
                    posted_at,
                    session.modified_at,
                ],
            )
            .with_context(|| "failed to upsert step session")?;
            Ok(())
        })
        .await
    }

    pub async fn get_step_sessions(&self) -> Result<Vec<StepSession>> {
        self.execute(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, count, start_date_time, end_date_time, posted_at, modified_at
                 FROM step_sessions
                 ORDER BY start_date_time ASC",
            )?;

            let mut rows = stmt.query([])?;
            let mut sessions = Vec::new();
            while let Some(row) = rows.next()? {
                sessions.push(row_to_step_session(row)?);
            }
            Ok(sessions)
        })
        .await
    }

    pub async fn delete_step_sessions(&self, ids: Vec<String>) -> Result<()> {
        self.execute(move |conn| {
            let mut stmt = conn.prepare("DELETE FROM step_sessions WHERE id = ?1")?;
            for id in &ids {
                stmt.execute(params![id])?;
            }
            Ok(())
        })
        .await
    }
}

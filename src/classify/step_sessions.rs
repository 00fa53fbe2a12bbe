//! Debounce-based step session building.
//!
//! Detector ticks accumulate in memory; each tick restarts a cooldown
//! timer, and the timer firing flushes the accumulated burst as one
//! `StepSession`. The accumulator is deliberately not journaled: ticks
//! gathered when the process dies before the timer fires are lost.

use std::sync::{Arc, Mutex};

use log::{info, warn};
use tokio::{
    sync::Mutex as AsyncMutex,
    task::JoinHandle,
    time::{sleep, Duration},
};

use crate::db::{models::StepSession, Database};
use crate::error::Result;
use crate::time;

pub struct StepSessionBuilder {
    db: Database,
    cooldown: Duration,
    ticks: Arc<Mutex<Vec<i64>>>,
    pending_flush: Arc<AsyncMutex<Option<JoinHandle<()>>>>,
}

impl StepSessionBuilder {
    pub fn new(db: Database, cooldown: Duration) -> Self {
        Self {
            db,
            cooldown,
            ticks: Arc::new(Mutex::new(Vec::new())),
            pending_flush: Arc::new(AsyncMutex::new(None)),
        }
    }

    /// Records one detector tick and restarts the cooldown. The flush task
    /// is single-flight: a new tick always replaces the pending one, so at
    /// most one flush runs per quiet period.
    pub async fn on_detector_tick(&self, epoch_millis: i64) {
        self.ticks.lock().unwrap().push(epoch_millis);

        let mut pending = self.pending_flush.lock().await;
        if let Some(handle) = pending.take() {
            handle.abort();
        }

        let db = self.db.clone();
        let ticks = Arc::clone(&self.ticks);
        let cooldown = self.cooldown;
        *pending = Some(tokio::spawn(async move {
            sleep(cooldown).await;
            if let Err(err) = flush(&db, &ticks).await {
                warn!("Failed to flush step session: {err}");
            }
        }));
    }

    /// Ticks accumulated but not yet flushed.
    pub fn pending_tick_count(&self) -> usize {
        self.ticks.lock().unwrap().len()
    }

    /// Immediate flush for shutdown paths; cancels the pending timer so a
    /// second flush cannot race this one.
    pub async fn flush_now(&self) -> Result<Option<StepSession>> {
        if let Some(handle) = self.pending_flush.lock().await.take() {
            handle.abort();
        }
        flush(&self.db, &self.ticks).await
    }
}

async fn flush(db: &Database, ticks: &Mutex<Vec<i64>>) -> Result<Option<StepSession>> {
    let drained: Vec<i64> = std::mem::take(&mut *ticks.lock().unwrap());

    let Some(start_millis) = drained.iter().min().copied() else {
        return Ok(None);
    };
    let Some(end_millis) = drained.iter().max().copied() else {
        return Ok(None);
    };

    let session = StepSession::new(
        drained.len() as i64,
        time::epoch_millis_to_datetime(start_millis)?,
        time::epoch_millis_to_datetime(end_millis)?,
    );
    db.upsert_step_session(&session).await?;
    info!(
        "Flushed step session with {} step(s) over {}ms",
        session.count,
        end_millis - start_millis
    );
    Ok(Some(session))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const COOLDOWN: Duration = Duration::from_secs(30);

    fn builder() -> StepSessionBuilder {
        let db = Database::new_in_memory().unwrap();
        StepSessionBuilder::new(db, COOLDOWN)
    }

    #[tokio::test(start_paused = true)]
    async fn burst_coalesces_into_one_session_after_cooldown() {
        let builder = builder();

        builder.on_detector_tick(1_000).await;
        builder.on_detector_tick(2_000).await;
        builder.on_detector_tick(3_000).await;
        assert_eq!(builder.pending_tick_count(), 3);

        sleep(COOLDOWN + Duration::from_secs(1)).await;

        let sessions = builder.db.get_step_sessions().await.unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].count, 3);
        assert_eq!(sessions[0].start_date_time.timestamp_millis(), 1_000);
        assert_eq!(sessions[0].end_date_time.timestamp_millis(), 3_000);
        assert_eq!(builder.pending_tick_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn tick_restarts_the_cooldown() {
        let builder = builder();

        builder.on_detector_tick(1_000).await;
        sleep(COOLDOWN - Duration::from_secs(5)).await;
        builder.on_detector_tick(2_000).await;
        sleep(COOLDOWN - Duration::from_secs(5)).await;

        // Neither quiet period has completed yet.
        assert!(builder.db.get_step_sessions().await.unwrap().is_empty());

        sleep(Duration::from_secs(6)).await;
        let sessions = builder.db.get_step_sessions().await.unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].count, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn flush_now_persists_pending_ticks_and_cancels_timer() {
        let builder = builder();

        builder.on_detector_tick(5_000).await;
        builder.on_detector_tick(6_000).await;

        let flushed = builder.flush_now().await.unwrap().unwrap();
        assert_eq!(flushed.count, 2);

        // The cancelled timer must not produce a second flush.
        sleep(COOLDOWN * 2).await;
        assert_eq!(builder.db.get_step_sessions().await.unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn flush_with_no_ticks_is_a_no_op() {
        let builder = builder();
        assert!(builder.flush_now().await.unwrap().is_none());
        assert!(builder.db.get_step_sessions().await.unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn identical_burst_rebuild_upserts_same_row() {
        let builder = builder();

        builder.on_detector_tick(1_000).await;
        builder.on_detector_tick(2_000).await;
        let first = builder.flush_now().await.unwrap().unwrap();

        builder.on_detector_tick(1_000).await;
        builder.on_detector_tick(2_000).await;
        let second = builder.flush_now().await.unwrap().unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(builder.db.get_step_sessions().await.unwrap().len(), 1);
    }
}

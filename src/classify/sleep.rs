//! Sleep segment intake.
//!
//! Every segment is appended to both the pending queue and the permanent
//! history, duplicates included. The queue is drained to zero by upload,
//! so a re-delivered segment can only double-count if it arrives before
//! the drain; the history keeps every delivery as an audit trail.

use log::info;

use crate::db::Database;
use crate::error::Result;
use crate::time;

pub struct SleepSegmentLinker {
    db: Database,
}

impl SleepSegmentLinker {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Returns the queue id of the appended entry. All-zero segments are
    /// platform padding and are ignored.
    pub async fn on_sleep_segment(
        &self,
        start_millis: i64,
        end_millis: i64,
    ) -> Result<Option<i64>> {
        if start_millis == 0 && end_millis == 0 {
            return Ok(None);
        }

        let duration_minutes = (end_millis - start_millis).max(0) / 1000 / 60;
        let queue_id = self
            .db
            .push_sleep_segment(start_millis, end_millis, duration_minutes, time::now())
            .await?;
        info!("Queued sleep segment of {duration_minutes} minute(s)");
        Ok(Some(queue_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn linker() -> SleepSegmentLinker {
        SleepSegmentLinker::new(Database::new_in_memory().unwrap())
    }

    #[tokio::test]
    async fn segment_lands_in_queue_and_history_with_derived_duration() {
        let linker = linker();

        // Eight hours.
        let start = 1_700_000_000_000;
        let end = start + 8 * 60 * 60 * 1000;
        let queue_id = linker.on_sleep_segment(start, end).await.unwrap().unwrap();

        let queue = linker.db.get_sleep_queue().await.unwrap();
        assert_eq!(queue.len(), 1);
        assert_eq!(queue[0].id, queue_id);
        assert_eq!(queue[0].duration_minutes, 480);

        let history = linker.db.get_sleep_history().await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].queue_id, queue_id);
    }

    #[tokio::test]
    async fn duplicate_delivery_appends_twice() {
        let linker = linker();

        linker.on_sleep_segment(1_000, 61_000).await.unwrap();
        linker.on_sleep_segment(1_000, 61_000).await.unwrap();

        assert_eq!(linker.db.get_sleep_queue().await.unwrap().len(), 2);
        assert_eq!(linker.db.get_sleep_history().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn all_zero_segment_is_ignored() {
        let linker = linker();
        assert!(linker.on_sleep_segment(0, 0).await.unwrap().is_none());
        assert!(linker.db.get_sleep_queue().await.unwrap().is_empty());
        assert!(linker.db.get_sleep_history().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn inverted_segment_clamps_duration_to_zero() {
        let linker = linker();
        linker.on_sleep_segment(61_000, 1_000).await.unwrap();

        let queue = linker.db.get_sleep_queue().await.unwrap();
        assert_eq!(queue[0].duration_minutes, 0);
    }
}

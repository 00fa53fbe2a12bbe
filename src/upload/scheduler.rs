//! Periodic upload triggers.
//!
//! One task per category, each on its own cadence. The platform's alarm or
//! worker machinery may also call `post_category` directly and may double
//! fire around process restarts; that is safe because the coordinator
//! no-ops on contention.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use log::{info, warn};
use tokio::{
    task::JoinHandle,
    time::{self, Duration, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;

use super::{BatchUploadCoordinator, DataCategory};

/// Authorization oracle: whether a category's sensor is still enabled.
pub trait SensorGate: Send + Sync {
    fn is_authorized(&self, category: DataCategory) -> bool;
}

pub const MIN_UPLOAD_INTERVAL: Duration = Duration::from_secs(15 * 60);

struct ScheduledTask {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

pub struct UploadScheduler {
    coordinator: Arc<BatchUploadCoordinator>,
    gate: Arc<dyn SensorGate>,
    min_interval: Duration,
    tasks: Mutex<HashMap<DataCategory, ScheduledTask>>,
}

impl UploadScheduler {
    pub fn new(
        coordinator: Arc<BatchUploadCoordinator>,
        gate: Arc<dyn SensorGate>,
        debug: bool,
    ) -> Self {
        Self {
            coordinator,
            gate,
            min_interval: if debug {
                Duration::from_millis(1)
            } else {
                MIN_UPLOAD_INTERVAL
            },
            tasks: Mutex::new(HashMap::new()),
        }
    }

    /// Starts (or restarts) the periodic upload for one category. The
    /// interval is clamped to the 15-minute floor outside debug builds.
    pub fn start_category(&self, category: DataCategory, interval: Duration) {
        let interval = interval.max(self.min_interval);
        let mut tasks = self.tasks.lock().unwrap();

        if let Some(previous) = tasks.remove(&category) {
            previous.token.cancel();
            previous.handle.abort();
        }

        let token = CancellationToken::new();
        let handle = tokio::spawn(upload_loop(
            self.coordinator.clone(),
            self.gate.clone(),
            category,
            interval,
            token.clone(),
        ));
        tasks.insert(category, ScheduledTask { token, handle });
    }

    pub fn start_all(&self, interval: Duration) {
        for category in DataCategory::ALL {
            self.start_category(category, interval);
        }
    }

    pub fn stop_category(&self, category: DataCategory) {
        if let Some(task) = self.tasks.lock().unwrap().remove(&category) {
            task.token.cancel();
        }
    }

    pub fn stop_all(&self) {
        let mut tasks = self.tasks.lock().unwrap();
        for (_, task) in tasks.drain() {
            task.token.cancel();
        }
    }

    /// Whether the category's task is still running. A task that
    /// self-cancelled (gate turned off) reports false even though it was
    /// never explicitly stopped.
    pub fn is_active(&self, category: DataCategory) -> bool {
        self.tasks
            .lock()
            .unwrap()
            .get(&category)
            .map(|task| !task.handle.is_finished())
            .unwrap_or(false)
    }
}

async fn upload_loop(
    coordinator: Arc<BatchUploadCoordinator>,
    gate: Arc<dyn SensorGate>,
    category: DataCategory,
    interval: Duration,
    cancel_token: CancellationToken,
) {
    let mut ticker = time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                // A category that lost authorization halts its own
                // schedule; any in-flight upload is left to finish.
                if !gate.is_authorized(category) {
                    info!(
                        "{} uploads no longer authorized, halting schedule",
                        category.as_str()
                    );
                    break;
                }

                if let Err(err) = coordinator.post_category(category).await {
                    warn!("{} upload failed: {err}", category.as_str());
                }
            }
            _ = cancel_token.cancelled() => {
                info!("Upload loop shutting down for {}", category.as_str());
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ChunkLimits;
    use crate::db::models::{StepRecord, StepSource};
    use crate::db::Database;
    use crate::error::ApiError;
    use crate::secure::{SecureTokenStore, StaticKeystore, AUTH_TOKEN_ALIAS};
    use crate::upload::client::ApiClient;
    use async_trait::async_trait;
    use serde_json::Value;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    struct CountingClient {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ApiClient for CountingClient {
        async fn post_chunk(
            &self,
            _category: DataCategory,
            _token: &str,
            _records: &[Value],
        ) -> Result<(), ApiError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct ToggleGate {
        enabled: AtomicBool,
    }

    impl SensorGate for ToggleGate {
        fn is_authorized(&self, _category: DataCategory) -> bool {
            self.enabled.load(Ordering::SeqCst)
        }
    }

    struct Fixture {
        db: Database,
        client: Arc<CountingClient>,
        gate: Arc<ToggleGate>,
        scheduler: UploadScheduler,
    }

    async fn fixture(enabled: bool) -> Fixture {
        let db = Database::new_in_memory().unwrap();
        let secrets = SecureTokenStore::new(db.clone(), Arc::new(StaticKeystore::new()));
        secrets.encrypt(AUTH_TOKEN_ALIAS, "bearer-token").await.unwrap();

        let client = Arc::new(CountingClient {
            calls: AtomicUsize::new(0),
        });
        let gate = Arc::new(ToggleGate {
            enabled: AtomicBool::new(enabled),
        });
        let coordinator = Arc::new(BatchUploadCoordinator::new(
            db.clone(),
            client.clone(),
            secrets,
            ChunkLimits::default(),
        ));
        let scheduler = UploadScheduler::new(coordinator, gate.clone(), true);
        Fixture {
            db,
            client,
            gate,
            scheduler,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn scheduled_category_posts_on_each_tick() {
        let f = fixture(true).await;
        let record = StepRecord::new(StepSource::Counter, 100, crate::time::now());
        f.db.insert_step_record(&record).await.unwrap();

        f.scheduler
            .start_category(DataCategory::Steps, Duration::from_secs(1));
        time::sleep(Duration::from_millis(100)).await;

        assert_eq!(f.client.calls.load(Ordering::SeqCst), 1);
        assert!(f.db.get_step_records().await.unwrap().is_empty());
        assert!(f.scheduler.is_active(DataCategory::Steps));

        f.scheduler.stop_all();
    }

    #[tokio::test(start_paused = true)]
    async fn unauthorized_category_halts_its_own_schedule() {
        let f = fixture(false).await;

        f.scheduler
            .start_category(DataCategory::Steps, Duration::from_secs(1));
        time::sleep(Duration::from_millis(100)).await;

        // The first tick observed the gate off and broke out of the loop.
        assert!(!f.scheduler.is_active(DataCategory::Steps));
        assert_eq!(f.client.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn gate_turning_off_stops_future_fires() {
        let f = fixture(true).await;

        f.scheduler
            .start_category(DataCategory::Steps, Duration::from_secs(60));
        time::sleep(Duration::from_millis(100)).await;
        assert!(f.scheduler.is_active(DataCategory::Steps));

        f.gate.enabled.store(false, Ordering::SeqCst);
        time::sleep(Duration::from_secs(61)).await;

        assert!(!f.scheduler.is_active(DataCategory::Steps));
    }

    #[tokio::test(start_paused = true)]
    async fn stop_category_cancels_the_task() {
        let f = fixture(true).await;

        f.scheduler
            .start_category(DataCategory::Steps, Duration::from_secs(60));
        f.scheduler.stop_category(DataCategory::Steps);
        time::sleep(Duration::from_millis(100)).await;

        // Removed from the schedule map entirely.
        assert!(!f.scheduler.is_active(DataCategory::Steps));
    }
}

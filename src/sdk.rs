//! SDK facade: wires the pipeline together and exposes the raw-event
//! entry points the platform glue calls into.

use std::{path::PathBuf, sync::Arc};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::info;
use tokio::time::Duration;

use crate::{
    classify::{
        app_events::{AppEventKind, LifecycleEventPairer},
        sleep::SleepSegmentLinker,
        step_sessions::StepSessionBuilder,
        steps,
    },
    config::SdkConfig,
    db::{
        models::{DeviceUsageLog, LastKnownStepState, StepSession},
        Database,
    },
    error::Result,
    secure::{Keystore, SecureTokenStore, AUTH_TOKEN_ALIAS},
    time,
    upload::{
        client::ApiClient,
        scheduler::{SensorGate, UploadScheduler},
        BatchUploadCoordinator, DataCategory, PostOutcome,
    },
};

/// Raw platform events, one method per kind. Delivery may be duplicated
/// and out of order; the classifiers behind these entry points absorb
/// both.
#[async_trait]
pub trait RawEventSink: Send + Sync {
    async fn on_step_counter_tick(&self, cumulative_count: i64) -> Result<()>;
    async fn on_step_detector_tick(&self) -> Result<()>;
    async fn on_sleep_segment(&self, start_millis: i64, end_millis: i64) -> Result<()>;
    async fn on_screen_lock_changed(&self, is_locked: bool, is_screen_on: bool) -> Result<()>;
    async fn on_lifecycle_event(&self, kind: AppEventKind, timestamp: DateTime<Utc>)
        -> Result<()>;
}

pub struct Sdk {
    config: SdkConfig,
    db: Database,
    session_builder: StepSessionBuilder,
    sleep_linker: SleepSegmentLinker,
    pairer: LifecycleEventPairer,
    coordinator: Arc<BatchUploadCoordinator>,
    scheduler: UploadScheduler,
    secrets: SecureTokenStore,
}

impl Sdk {
    /// `db_path: None` keeps the store in memory (tests, ephemeral hosts).
    pub fn new(
        config: SdkConfig,
        db_path: Option<PathBuf>,
        keystore: Arc<dyn Keystore>,
        client: Arc<dyn ApiClient>,
        gate: Arc<dyn SensorGate>,
    ) -> Result<Self> {
        let db = match db_path {
            Some(path) => Database::new(path)?,
            None => Database::new_in_memory()?,
        };

        let secrets = SecureTokenStore::new(db.clone(), keystore);
        let coordinator = Arc::new(BatchUploadCoordinator::new(
            db.clone(),
            client,
            secrets.clone(),
            config.chunk_limits.clone(),
        ));
        let scheduler = UploadScheduler::new(coordinator.clone(), gate, config.debug);
        let session_builder = StepSessionBuilder::new(
            db.clone(),
            Duration::from_millis(config.session_cooldown_millis),
        );
        let sleep_linker = SleepSegmentLinker::new(db.clone());
        let pairer = LifecycleEventPairer::new(config.source_name.clone());

        info!("SDK core initialized");
        Ok(Self {
            config,
            db,
            session_builder,
            sleep_linker,
            pairer,
            coordinator,
            scheduler,
            secrets,
        })
    }

    /// Stores the bearer credential encrypted at rest.
    pub async fn authenticate(&self, token: &str) -> Result<()> {
        self.secrets.encrypt(AUTH_TOKEN_ALIAS, token).await
    }

    pub async fn encrypt_secret(&self, alias: &str, plaintext: &str) -> Result<()> {
        self.secrets.encrypt(alias, plaintext).await
    }

    pub async fn decrypt_secret(&self, alias: &str) -> Result<String> {
        self.secrets.decrypt(alias).await
    }

    pub async fn post_category(&self, category: DataCategory) -> Result<PostOutcome> {
        self.coordinator.post_category(category).await
    }

    pub async fn post_all(&self) -> Vec<(DataCategory, Result<PostOutcome>)> {
        self.coordinator.post_all().await
    }

    /// Starts the periodic upload schedule for every category.
    pub fn start_upload_schedules(&self) {
        let interval = Duration::from_secs(self.config.upload_interval_minutes * 60);
        self.scheduler.start_all(interval);
    }

    pub fn stop_upload_schedules(&self) {
        self.scheduler.stop_all();
    }

    /// Flushes any accumulated detector ticks without waiting out the
    /// cooldown. Shutdown path.
    pub async fn flush_step_session(&self) -> Result<Option<StepSession>> {
        self.session_builder.flush_now().await
    }

    /// Full local wipe: schedules stopped, every table cleared, stored
    /// secrets included.
    pub async fn reset(&self) -> Result<()> {
        self.scheduler.stop_all();
        self.db.reset().await?;
        info!("SDK reset: local store cleared");
        Ok(())
    }
}

#[async_trait]
impl RawEventSink for Sdk {
    async fn on_step_counter_tick(&self, cumulative_count: i64) -> Result<()> {
        let now = time::now();

        let existing = self.db.find_counter_record(cumulative_count).await?;
        if let Some(record) = steps::classify_counter_tick(cumulative_count, existing.as_ref(), now)
        {
            self.db.insert_step_record(&record).await?;
        }

        self.db
            .replace_last_known_state(&LastKnownStepState {
                steps: cumulative_count,
                distance: None,
                start_time: now,
                end_time: now,
                created_at: now,
            })
            .await?;
        Ok(())
    }

    async fn on_step_detector_tick(&self) -> Result<()> {
        let now = time::now();
        let record = steps::classify_detector_tick(now);
        self.db.insert_step_record(&record).await?;
        self.session_builder
            .on_detector_tick(now.timestamp_millis())
            .await;
        Ok(())
    }

    async fn on_sleep_segment(&self, start_millis: i64, end_millis: i64) -> Result<()> {
        self.sleep_linker
            .on_sleep_segment(start_millis, end_millis)
            .await?;
        Ok(())
    }

    async fn on_screen_lock_changed(&self, is_locked: bool, is_screen_on: bool) -> Result<()> {
        self.db
            .insert_device_usage(&DeviceUsageLog {
                id: None,
                is_locked,
                is_screen_on,
                created_at: time::now(),
            })
            .await?;
        Ok(())
    }

    async fn on_lifecycle_event(
        &self,
        kind: AppEventKind,
        timestamp: DateTime<Utc>,
    ) -> Result<()> {
        if let Some(log) = self.pairer.process(kind, timestamp) {
            self.db.upsert_duration_log(&log).await?;
        }
        Ok(())
    }
}

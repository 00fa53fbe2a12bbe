//! End-to-end drive of the pipeline: raw events in through the sink,
//! canonical records buffered, chunks out through a scripted network
//! collaborator, store drained on acknowledgment.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use pretty_assertions::assert_eq;
use serde_json::Value;

use pulsekit::{
    ApiClient, ApiError, AppEventKind, DataCategory, Error, PostOutcome, RawEventSink, Sdk,
    SdkConfig, SensorGate, StaticKeystore,
};

/// Records every chunk the coordinator ships.
struct RecordingClient {
    calls: Mutex<Vec<(DataCategory, usize)>>,
}

impl RecordingClient {
    fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
        }
    }

    fn calls(&self) -> Vec<(DataCategory, usize)> {
        self.calls.lock().unwrap().clone()
    }

    fn records_for(&self, category: DataCategory) -> usize {
        self.calls()
            .iter()
            .filter(|(c, _)| *c == category)
            .map(|(_, size)| size)
            .sum()
    }
}

#[async_trait]
impl ApiClient for RecordingClient {
    async fn post_chunk(
        &self,
        category: DataCategory,
        _token: &str,
        records: &[Value],
    ) -> Result<(), ApiError> {
        self.calls.lock().unwrap().push((category, records.len()));
        Ok(())
    }
}

struct AlwaysOn;

impl SensorGate for AlwaysOn {
    fn is_authorized(&self, _category: DataCategory) -> bool {
        true
    }
}

fn build_sdk(client: Arc<RecordingClient>) -> Sdk {
    let _ = env_logger::builder().is_test(true).try_init();

    Sdk::new(
        SdkConfig::default(),
        None,
        Arc::new(StaticKeystore::new()),
        client,
        Arc::new(AlwaysOn),
    )
    .unwrap()
}

fn at(epoch_millis: i64) -> chrono::DateTime<chrono::Utc> {
    pulsekit::time::epoch_millis_to_datetime(epoch_millis).unwrap()
}

#[tokio::test]
async fn raw_events_flow_through_to_acknowledged_upload() {
    let client = Arc::new(RecordingClient::new());
    let sdk = build_sdk(client.clone());
    sdk.authenticate("bearer-token").await.unwrap();

    // Counter ticks with a redelivered total: 100, 100, 150 -> 2 records.
    sdk.on_step_counter_tick(100).await.unwrap();
    sdk.on_step_counter_tick(100).await.unwrap();
    sdk.on_step_counter_tick(150).await.unwrap();

    // Three physical steps; flushed as one session without waiting out the
    // cooldown.
    sdk.on_step_detector_tick().await.unwrap();
    sdk.on_step_detector_tick().await.unwrap();
    sdk.on_step_detector_tick().await.unwrap();
    let session = sdk.flush_step_session().await.unwrap().unwrap();
    assert_eq!(session.count, 3);

    // One sleep segment, delivered twice.
    sdk.on_sleep_segment(1_000, 3_601_000).await.unwrap();
    sdk.on_sleep_segment(1_000, 3_601_000).await.unwrap();

    // Two screen transitions.
    sdk.on_screen_lock_changed(true, false).await.unwrap();
    sdk.on_screen_lock_changed(false, true).await.unwrap();

    // Resume/pause pairs into one duration log; the stray pause is a no-op.
    sdk.on_lifecycle_event(AppEventKind::Resume, at(10_000))
        .await
        .unwrap();
    sdk.on_lifecycle_event(AppEventKind::Pause, at(70_000))
        .await
        .unwrap();
    sdk.on_lifecycle_event(AppEventKind::Pause, at(80_000))
        .await
        .unwrap();

    let results = sdk.post_all().await;
    for (category, result) in &results {
        assert!(result.is_ok(), "{} failed: {result:?}", category.as_str());
    }

    // 2 counter records + 3 detector records.
    assert_eq!(client.records_for(DataCategory::Steps), 5);
    assert_eq!(client.records_for(DataCategory::StepSessions), 1);
    assert_eq!(client.records_for(DataCategory::Sleep), 2);
    assert_eq!(client.records_for(DataCategory::DeviceUsage), 2);
    assert_eq!(client.records_for(DataCategory::AppUsage), 1);

    // Everything acknowledged was deleted: a second pass ships nothing.
    let calls_before = client.calls().len();
    let results = sdk.post_all().await;
    for (_, result) in &results {
        assert_eq!(
            *result.as_ref().unwrap(),
            PostOutcome::Completed {
                posted_chunks: 0,
                total_chunks: 0
            }
        );
    }
    assert_eq!(client.calls().len(), calls_before);
}

#[tokio::test]
async fn secrets_survive_round_trip_until_reset() {
    let client = Arc::new(RecordingClient::new());
    let sdk = build_sdk(client.clone());

    sdk.encrypt_secret("refresh_token", "r-123").await.unwrap();
    assert_eq!(sdk.decrypt_secret("refresh_token").await.unwrap(), "r-123");

    sdk.authenticate("bearer-token").await.unwrap();
    sdk.on_step_counter_tick(42).await.unwrap();

    sdk.reset().await.unwrap();

    // Secrets are gone along with the buffered data.
    assert!(matches!(
        sdk.decrypt_secret("refresh_token").await.unwrap_err(),
        Error::KeyNotFound { .. }
    ));

    // Buffered rows were wiped too: re-authenticate and confirm nothing
    // ships.
    sdk.authenticate("bearer-token").await.unwrap();
    let results = sdk.post_all().await;
    for (_, result) in &results {
        assert_eq!(
            *result.as_ref().unwrap(),
            PostOutcome::Completed {
                posted_chunks: 0,
                total_chunks: 0
            }
        );
    }
    assert!(client.calls().is_empty());
}

#[tokio::test]
async fn unauthenticated_upload_reports_key_not_found() {
    let client = Arc::new(RecordingClient::new());
    let sdk = build_sdk(client.clone());

    sdk.on_step_counter_tick(100).await.unwrap();

    let err = sdk.post_category(DataCategory::Steps).await.unwrap_err();
    assert!(matches!(err, Error::KeyNotFound { .. }));
    assert!(client.calls().is_empty());
}

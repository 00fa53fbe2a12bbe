//! pulsekit: local buffering and synchronized-upload core for mobile
//! health signals.
//!
//! Raw platform events (step ticks, sleep segments, screen-lock and app
//! lifecycle transitions) arrive through [`RawEventSink`], are classified
//! into canonical records, buffered in an embedded SQLite store, and
//! drained to a remote service in mutex-guarded, size-bounded chunks.
//! The long-lived bearer credential is sealed at rest with AES-256-GCM.

pub mod classify;
pub mod config;
pub mod db;
pub mod error;
pub mod sdk;
pub mod secure;
pub mod time;
pub mod upload;

pub use classify::app_events::AppEventKind;
pub use config::{ChunkLimits, ConfigStore, SdkConfig};
pub use error::{ApiError, Error, Result};
pub use sdk::{RawEventSink, Sdk};
pub use secure::{Keystore, SecureTokenStore, StaticKeystore, AUTH_TOKEN_ALIAS};
pub use upload::{
    client::{ApiClient, HttpApiClient},
    scheduler::{SensorGate, UploadScheduler},
    BatchUploadCoordinator, DataCategory, PostOutcome,
};

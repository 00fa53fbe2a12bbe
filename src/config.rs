use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf, sync::RwLock};

use crate::upload::DataCategory;

/// Records per network request, bounded by the service's request-size
/// limits. The app-usage default is (32 KiB + 292 B) / 292 B.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkLimits {
    pub steps: usize,
    pub step_sessions: usize,
    pub sleep: usize,
    pub device_usage: usize,
    pub app_usage: usize,
}

impl Default for ChunkLimits {
    fn default() -> Self {
        Self {
            steps: 45,
            step_sessions: 40,
            sleep: 46,
            device_usage: 91,
            app_usage: 112,
        }
    }
}

impl ChunkLimits {
    pub fn for_category(&self, category: DataCategory) -> usize {
        let limit = match category {
            DataCategory::Steps => self.steps,
            DataCategory::StepSessions => self.step_sessions,
            DataCategory::Sleep => self.sleep,
            DataCategory::DeviceUsage => self.device_usage,
            DataCategory::AppUsage => self.app_usage,
        };
        limit.max(1)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SdkConfig {
    pub api_base_url: String,
    /// Stamped as the `source` of derived duration logs; the host app's
    /// package or bundle identifier.
    pub source_name: String,
    pub session_cooldown_millis: u64,
    pub upload_interval_minutes: u64,
    pub chunk_limits: ChunkLimits,
    /// Lifts the 15-minute floor on upload intervals.
    pub debug: bool,
}

impl Default for SdkConfig {
    fn default() -> Self {
        Self {
            api_base_url: "https://api.example.com/v1".into(),
            source_name: "pulsekit.host".into(),
            session_cooldown_millis: 30_000,
            upload_interval_minutes: 15,
            chunk_limits: ChunkLimits::default(),
            debug: false,
        }
    }
}

pub struct ConfigStore {
    path: PathBuf,
    data: RwLock<SdkConfig>,
}

impl ConfigStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_default()
        } else {
            SdkConfig::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn get(&self) -> SdkConfig {
        self.data.read().unwrap().clone()
    }

    pub fn update(&self, config: SdkConfig) -> Result<()> {
        {
            let mut guard = self.data.write().unwrap();
            *guard = config;
            self.persist(&guard)?;
        }
        Ok(())
    }

    fn persist(&self, data: &SdkConfig) -> Result<()> {
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write config to {}", self.path.display()))
    }
}

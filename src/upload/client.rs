//! Network collaborator boundary.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::ApiError;

use super::DataCategory;

const REQUEST_TIMEOUT_SECS: u64 = 30;

/// One bounded chunk of records shipped per call. Implementations own
/// their transport timeout; the coordinator adds none of its own.
#[async_trait]
pub trait ApiClient: Send + Sync {
    async fn post_chunk(
        &self,
        category: DataCategory,
        token: &str,
        records: &[Value],
    ) -> Result<(), ApiError>;
}

pub struct HttpApiClient {
    http: reqwest::Client,
    base_url: String,
}

impl HttpApiClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|err| ApiError::Transport {
                message: err.to_string(),
            })?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self, category: DataCategory) -> String {
        let path = match category {
            DataCategory::Steps => "movement/steps",
            DataCategory::StepSessions => "movement/step-sessions",
            DataCategory::Sleep => "sleep/log",
            DataCategory::DeviceUsage => "device/usage",
            DataCategory::AppUsage => "device/app-events",
        };
        format!("{}/{}", self.base_url, path)
    }
}

#[async_trait]
impl ApiClient for HttpApiClient {
    async fn post_chunk(
        &self,
        category: DataCategory,
        token: &str,
        records: &[Value],
    ) -> Result<(), ApiError> {
        let response = self
            .http
            .post(self.endpoint(category))
            .bearer_auth(token)
            .json(&records)
            .send()
            .await
            .map_err(|err| ApiError::Transport {
                message: err.to_string(),
            })?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(ApiError::Http {
                status: status.as_u16(),
            })
        }
    }
}

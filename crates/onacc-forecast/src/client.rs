//! HTTP client for the Open-Meteo forecast, seasonal and climate endpoints.

use std::sync::Arc;
use std::time::Duration;

use onacc_core::{ApiConfig, ReqwestErrorExt};
use reqwest::Client;
use tracing::instrument;

use crate::error::ForecastError;
use crate::payload::RawPayload;
use crate::types::ForecastRequest;

/// Longest provider error body kept in an `ApiError`
const MAX_ERROR_BODY: usize = 2048;

#[derive(Debug, Clone)]
pub struct ForecastClient {
    client: Arc<Client>,
    api: Arc<ApiConfig>,
}

impl ForecastClient {
    pub fn new(api: ApiConfig) -> Result<Self, ForecastError> {
        let timeout = Duration::from_secs(api.timeout_secs);
        Self::with_timeout(api, timeout)
    }

    /// Like `new`, with an explicit per-request timeout instead of `api.timeout_secs`.
    pub fn with_timeout(api: ApiConfig, timeout: Duration) -> Result<Self, ForecastError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(api.user_agent.clone())
            .build()
            .map_err(|e| ForecastError::InvalidConfig(format!("HTTP client: {}", e)))?;

        Ok(Self {
            client: Arc::new(client),
            api: Arc::new(api),
        })
    }

    pub fn api(&self) -> &ApiConfig {
        &self.api
    }

    /// Execute one request. A single attempt; retries belong to the pipeline.
    #[instrument(skip(self, request), fields(locality = %request.locality.name(), mode = %request.mode()), level = "debug")]
    pub async fn fetch(&self, request: &ForecastRequest) -> Result<RawPayload, ForecastError> {
        let url = request.endpoint.url(&self.api);

        let response = self
            .client
            .get(url)
            .query(&request.query)
            .send()
            .await
            .map_err(|e| ForecastError::Network(e.into_network_error()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ForecastError::Network(e.into_network_error()))?;

        if !status.is_success() {
            tracing::debug!("Forecast API returned status {}", status);
            return Err(ForecastError::Api {
                status: status.as_u16(),
                body: truncate(body, MAX_ERROR_BODY),
            });
        }

        RawPayload::from_json(request.mode(), &body)
    }
}

fn truncate(mut body: String, max: usize) -> String {
    if body.len() > max {
        let mut cut = max;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        body.truncate(cut);
    }
    body
}

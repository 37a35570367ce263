//! Forecast API client for the JMA overview forecast feed
//!
//! This module provides the [`ForecastSource`] seam used by the forecast
//! store, and the HTTP implementation that talks to
//! `https://www.jma.go.jp/bosai/forecast/data/overview_forecast/{code}.json`
//! with timeouts, transient-failure retries and an explicit error taxonomy.

use crate::config::ForecastConfig;
use crate::error::FetchError;
use crate::models::{RegionCode, WeatherReport};
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{RetryTransientMiddleware, policies::ExponentialBackoff};
use std::time::Instant;
use tracing::{debug, info, instrument, warn};

/// Anything that can produce the overview forecast for a region code
#[async_trait]
pub trait ForecastSource: Send + Sync {
    async fn fetch(&self, code: RegionCode) -> std::result::Result<WeatherReport, FetchError>;
}

/// HTTP client for the JMA overview forecast endpoint
pub struct JmaClient {
    /// HTTP client with retry middleware
    client: ClientWithMiddleware,
    /// Base URL without trailing slash
    base_url: String,
}

impl JmaClient {
    /// Create a new client from the forecast settings
    pub fn new(config: &ForecastConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .user_agent(concat!("tenki/", env!("CARGO_PKG_VERSION")))
            .build()
            .with_context(|| "Failed to create HTTP client")?;

        let retry_policy = ExponentialBackoff::builder().build_with_max_retries(config.max_retries);
        let client = ClientBuilder::new(client)
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build();

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    /// URL of the forecast document for `code`
    #[must_use]
    pub fn report_url(&self, code: RegionCode) -> String {
        format!("{}/{}.json", self.base_url, code)
    }
}

#[async_trait]
impl ForecastSource for JmaClient {
    #[instrument(name = "fetch_forecast", skip(self), fields(code = %code))]
    async fn fetch(&self, code: RegionCode) -> std::result::Result<WeatherReport, FetchError> {
        let url = self.report_url(code);
        debug!("Requesting {}", url);
        let start_time = Instant::now();

        let response = self.client.get(&url).send().await.map_err(|e| {
            warn!("Network error for region {}: {}", code, e);
            FetchError::network(e.to_string())
        })?;

        let status = response.status();
        if !status.is_success() {
            warn!("Forecast request for region {} failed with {}", code, status);
            return Err(FetchError::Status {
                status: status.as_u16(),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| FetchError::network(e.to_string()))?;

        let report: WeatherReport = serde_json::from_slice(&body).map_err(|e| {
            warn!("Failed to parse forecast for region {}: {}", code, e);
            FetchError::parse(e.to_string())
        })?;

        let total_duration = start_time.elapsed();
        info!(
            "Fetched forecast for {} ({}) in {:.3}s",
            report.target_area,
            code,
            total_duration.as_secs_f64()
        );

        if total_duration.as_secs() > 5 {
            warn!(
                "Slow forecast API response: {:.3}s",
                total_duration.as_secs_f64()
            );
        }

        Ok(report)
    }
}

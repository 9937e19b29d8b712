/// Forecast API HTTP client.
///
/// Communicates with the remote simulation service using the synchronous
/// `ureq` client. Provides:
///
/// - **Metadata**: forecast descriptors, forecast years, default growth rates.
/// - **Submit**: post an impact analysis and get an inline result or a
///   computation handle.
/// - **Poll**: check an in-flight computation via the shared endpoint.
///
/// The base URL is environment-selected: `[api] dev_mode` switches between
/// the deployed URL and a local development server.
use std::time::Duration;

use anyhow::{Context, Result};

use super::types::{
    ForecastMetadata, ImpactRequest, ImpactResponseBody, PollOutcome, PollResponseBody,
    SubmitOutcome,
};
use crate::config::schema::ApiConfig;
use crate::session::ImpactTransport;

/// Synchronous forecast API client.
///
/// Created from the resolved config and reused for the lifetime of one
/// command (or the web server). Carries two timeouts: a short one for
/// metadata and a generous one for submissions, since a cold submit may
/// block until the simulation finishes.
#[derive(Debug, Clone)]
pub struct ForecastApiClient {
    base_url: String,
    metadata_timeout: Duration,
    submit_timeout: Duration,
}

impl ForecastApiClient {
    /// Build a client from the resolved config.
    pub fn from_config(config: &ApiConfig) -> Self {
        let base = if config.dev_mode {
            &config.dev_url
        } else {
            &config.base_url
        };
        Self {
            base_url: base.trim_end_matches('/').to_string(),
            metadata_timeout: Duration::from_millis(config.metadata_timeout_ms),
            submit_timeout: Duration::from_millis(config.submit_timeout_ms),
        }
    }

    /// The resolved base URL (for diagnostics).
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetch forecast descriptors, forecast years, and default growth rates.
    pub fn fetch_forecasts(&self) -> Result<ForecastMetadata> {
        let url = format!("{}/forecasts", self.base_url);

        let resp = ureq::get(&url)
            .timeout(self.metadata_timeout)
            .call()
            .with_context(|| format!("forecast metadata request failed ({url})"))?;

        resp.into_json()
            .context("failed to parse forecast metadata response")
    }

    /// Submit an impact analysis.
    ///
    /// The server answers inline when the result is cached; otherwise it
    /// returns a computation id to poll. The long submit timeout covers the
    /// blocking case.
    pub fn submit_impact(&self, request: &ImpactRequest) -> Result<SubmitOutcome> {
        let url = format!("{}/forecasts/impact", self.base_url);

        let resp = ureq::post(&url)
            .timeout(self.submit_timeout)
            .send_json(request)
            .context("impact submission failed")?;

        let body: ImpactResponseBody = resp
            .into_json()
            .context("failed to parse impact response")?;

        Ok(body.into())
    }

    /// Poll an in-flight computation.
    ///
    /// Reuses the impact endpoint with `forecast_id = "computation_id:<id>"`.
    pub fn poll_impact(&self, computation_id: &str) -> Result<PollOutcome> {
        let url = format!("{}/forecasts/impact", self.base_url);
        let request = ImpactRequest::poll(computation_id);

        let resp = ureq::post(&url)
            .timeout(self.metadata_timeout)
            .send_json(&request)
            .context("computation poll failed")?;

        let body: PollResponseBody = resp.into_json().context("failed to parse poll response")?;

        body.into_outcome()
    }

    /// Check whether the API is reachable.
    ///
    /// Uses a short timeout so `obrcast health` doesn't stall when the
    /// service is down.
    pub fn is_healthy(&self) -> bool {
        let url = format!("{}/forecasts", self.base_url);
        ureq::get(&url)
            .timeout(Duration::from_secs(5))
            .call()
            .is_ok()
    }
}

impl ImpactTransport for ForecastApiClient {
    fn submit_impact(&self, request: &ImpactRequest) -> Result<SubmitOutcome> {
        ForecastApiClient::submit_impact(self, request)
    }

    fn poll_impact(&self, computation_id: &str) -> Result<PollOutcome> {
        ForecastApiClient::poll_impact(self, computation_id)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_from_default_config() {
        let config = ApiConfig::default();
        let client = ForecastApiClient::from_config(&config);
        assert_eq!(
            client.base_url,
            "https://obr-forecast.policyengine.org/api"
        );
        assert_eq!(client.submit_timeout, Duration::from_millis(300_000));
        assert_eq!(client.metadata_timeout, Duration::from_millis(30_000));
    }

    #[test]
    fn dev_mode_selects_dev_url() {
        let config = ApiConfig {
            dev_mode: true,
            ..ApiConfig::default()
        };
        let client = ForecastApiClient::from_config(&config);
        assert_eq!(client.base_url, "http://127.0.0.1:8000/api");
    }

    #[test]
    fn client_strips_trailing_slash() {
        let config = ApiConfig {
            base_url: "https://example.org/api/".to_string(),
            ..ApiConfig::default()
        };
        let client = ForecastApiClient::from_config(&config);
        assert_eq!(client.base_url, "https://example.org/api");
    }
}

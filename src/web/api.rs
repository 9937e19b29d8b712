//! JSON API handlers for the local dashboard.
//!
//! Each handler proxies the remote forecast API and returns a
//! `Response<Cursor<Vec<u8>>>` with JSON content. The impact endpoint keeps
//! the upstream's dual shape — submit and poll share one route — so the
//! page logic mirrors the deployed dashboard exactly.

use std::io::Cursor;

use anyhow::{Context, Result};
use serde::Serialize;
use tiny_http::{Response, StatusCode};

use super::cache::TtlCache;
use super::content_type_json;
use crate::api::types::{ImpactRequest, PollOutcome, SubmitOutcome};
use crate::api::{ForecastApiClient, ForecastMetadata};

/// Shared state for the dashboard handlers.
pub struct DashboardCtx {
    pub client: ForecastApiClient,
    pub metadata_cache: TtlCache<ForecastMetadata>,
}

const METADATA_CACHE_KEY: &str = "forecasts";

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// `GET /api/forecasts` — forecast metadata, cached with a TTL.
pub fn get_forecasts(ctx: &DashboardCtx) -> Result<Response<Cursor<Vec<u8>>>> {
    if let Some(metadata) = ctx.metadata_cache.get(METADATA_CACHE_KEY) {
        return json_response(&metadata);
    }

    let metadata = ctx.client.fetch_forecasts()?;
    ctx.metadata_cache
        .insert(METADATA_CACHE_KEY, metadata.clone());
    json_response(&metadata)
}

/// `POST /api/impact` — submit an analysis or poll an in-flight computation.
///
/// A `forecast_id` of `computation_id:<id>` is a poll; anything else is a
/// submission. Responses use the upstream envelope shapes.
pub fn post_impact(ctx: &DashboardCtx, body: &str) -> Result<Response<Cursor<Vec<u8>>>> {
    let request: ImpactRequest =
        serde_json::from_str(body).context("invalid impact request body")?;

    if let Some(computation_id) = request.polled_computation_id() {
        let outcome = ctx.client.poll_impact(computation_id)?;
        let envelope = match outcome {
            PollOutcome::Computing => serde_json::json!({ "status": "computing" }),
            PollOutcome::Completed(result) => serde_json::json!({
                "status": "completed",
                "result": result,
            }),
            PollOutcome::Failed(error) => serde_json::json!({
                "status": "failed",
                "error": error,
            }),
        };
        return json_response(&envelope);
    }

    let outcome = ctx.client.submit_impact(&request)?;
    let envelope = match outcome {
        SubmitOutcome::Completed(result) => serde_json::to_value(&result)?,
        SubmitOutcome::Computing(handle) => serde_json::json!({
            "computation_id": handle.computation_id,
            "status": handle.status,
        }),
    };
    json_response(&envelope)
}

/// `GET /api/health` — API reachability and cache counters.
pub fn get_health(ctx: &DashboardCtx) -> Result<Response<Cursor<Vec<u8>>>> {
    #[derive(Serialize)]
    struct HealthResponse {
        status: &'static str,
        api_url: String,
        api_reachable: bool,
        cache: super::cache::CacheStats,
    }

    let response = HealthResponse {
        status: "ok",
        api_url: ctx.client.base_url().to_string(),
        api_reachable: ctx.client.is_healthy(),
        cache: ctx.metadata_cache.stats(),
    };
    json_response(&response)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Build a JSON success response.
fn json_response<T: Serialize>(data: &T) -> Result<Response<Cursor<Vec<u8>>>> {
    let body = serde_json::to_string(data).context("failed to serialize JSON response")?;
    Ok(Response::from_data(body.into_bytes())
        .with_header(content_type_json())
        .with_status_code(StatusCode(200)))
}

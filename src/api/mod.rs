//! Remote simulation API: wire documents and the HTTP client.
//!
//! The server exposes two operations on one resource:
//!
//! - `GET /forecasts` — forecast descriptors, forecast years, and default
//!   growth rates.
//! - `POST /forecasts/impact` — submit an impact analysis. Answers either
//!   inline with a full result (cache hit) or with a computation id to poll.
//!   The same endpoint doubles as the poll endpoint when the submitted
//!   `forecast_id` is `computation_id:<id>`.

pub mod client;
pub mod types;

pub use client::ForecastApiClient;
pub use types::{
    ComputationHandle, ComputationStatus, DecileYearlyChange, ForecastDescriptor,
    ForecastMetadata, ImpactRequest, ImpactResult, PollOutcome, SubmitOutcome, YearlyMetric,
};

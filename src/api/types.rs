//! Wire documents for the forecast API, plus the tagged in-memory views of
//! its polymorphic responses.
//!
//! The server answers `POST /forecasts/impact` with one of two JSON shapes
//! (a full result, or `{computation_id, status}`), and polls with a
//! `{status, result?, error?}` envelope. Those optional-field shapes stay at
//! the deserialization boundary; everything past the client works with the
//! tagged [`SubmitOutcome`] / [`PollOutcome`] variants.

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::rates::GrowthRateMatrix;

/// Sentinel forecast id for a user-defined scenario.
pub const CUSTOM_FORECAST_ID: &str = "custom";

/// Prefix that turns a submission into a poll of an in-flight computation.
pub const COMPUTATION_ID_PREFIX: &str = "computation_id:";

// ---------------------------------------------------------------------------
// Metadata
// ---------------------------------------------------------------------------

/// A selectable official forecast. Immutable, fetched once at load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForecastDescriptor {
    pub id: String,
    pub name: String,
    /// Publication date, ISO `YYYY-MM-DD`.
    pub date: String,
}

/// Response body for `GET /forecasts`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ForecastMetadata {
    pub forecasts: Vec<ForecastDescriptor>,
    #[serde(default)]
    pub forecast_years: Vec<i32>,
    #[serde(default)]
    pub default_growth_rates: GrowthRateMatrix,
}

// ---------------------------------------------------------------------------
// Metrics
// ---------------------------------------------------------------------------

/// A single scalar time-series point (income level or poverty rate).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct YearlyMetric {
    pub year: i32,
    pub value: f64,
}

/// Year-over-year fractional change in aggregate income for one decile.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DecileYearlyChange {
    /// Income decile, 1 (poorest) to 10 (richest).
    pub decile: u8,
    pub year: i32,
    pub change: f64,
}

/// Echo of the submitted scenario attached to a result.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ImpactMetadata {
    pub forecast_id: String,
    pub growth_rates: GrowthRateMatrix,
}

/// A completed impact analysis. All-or-nothing — there are no partial
/// results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImpactResult {
    pub median_income_by_year: Vec<YearlyMetric>,
    /// Older server builds emit this series as `poverty_rate_by_year`.
    #[serde(default, alias = "poverty_rate_by_year")]
    pub absolute_poverty_by_year: Vec<YearlyMetric>,
    #[serde(default)]
    pub relative_poverty_by_year: Vec<YearlyMetric>,
    #[serde(default)]
    pub decile_yearly_changes: Vec<DecileYearlyChange>,
    #[serde(default)]
    pub metadata: ImpactMetadata,
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

/// Request body for `POST /forecasts/impact`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImpactRequest {
    pub forecast_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub growth_rates: Option<GrowthRateMatrix>,
}

impl ImpactRequest {
    /// Analyze an official forecast by id.
    pub fn official(forecast_id: impl Into<String>) -> Self {
        Self {
            forecast_id: forecast_id.into(),
            growth_rates: None,
        }
    }

    /// Analyze a custom scenario with an explicit growth-rate matrix.
    pub fn custom(growth_rates: GrowthRateMatrix) -> Self {
        Self {
            forecast_id: CUSTOM_FORECAST_ID.to_string(),
            growth_rates: Some(growth_rates),
        }
    }

    /// Poll an in-flight computation via the shared endpoint.
    pub fn poll(computation_id: &str) -> Self {
        Self {
            forecast_id: format!("{COMPUTATION_ID_PREFIX}{computation_id}"),
            growth_rates: None,
        }
    }

    /// If this request is a poll, the computation id it targets.
    pub fn polled_computation_id(&self) -> Option<&str> {
        self.forecast_id.strip_prefix(COMPUTATION_ID_PREFIX)
    }
}

// ---------------------------------------------------------------------------
// Computation status
// ---------------------------------------------------------------------------

/// Server-side job status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComputationStatus {
    Computing,
    Completed,
    Failed,
}

impl std::fmt::Display for ComputationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Computing => write!(f, "computing"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// An in-flight server-side job observed from a submit response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComputationHandle {
    pub computation_id: String,
    pub status: ComputationStatus,
}

// ---------------------------------------------------------------------------
// Tagged response views
// ---------------------------------------------------------------------------

/// Outcome of an impact submission.
#[derive(Debug, Clone)]
pub enum SubmitOutcome {
    /// The server answered inline with a full result (cache hit, or it
    /// blocked until the job finished).
    Completed(Box<ImpactResult>),
    /// The job is running; poll with the handle's computation id.
    Computing(ComputationHandle),
}

/// Outcome of one computation poll.
#[derive(Debug, Clone)]
pub enum PollOutcome {
    /// Still running; poll again after the interval.
    Computing,
    Completed(Box<ImpactResult>),
    Failed(String),
}

// ---------------------------------------------------------------------------
// Raw wire shapes (deserialization boundary only)
// ---------------------------------------------------------------------------

/// `POST /forecasts/impact` response: pending envelope or full result.
///
/// `Pending` is listed first — its two required fields make it the more
/// specific shape for untagged matching.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum ImpactResponseBody {
    Pending {
        computation_id: String,
        status: ComputationStatus,
    },
    Ready(Box<ImpactResult>),
}

impl From<ImpactResponseBody> for SubmitOutcome {
    fn from(body: ImpactResponseBody) -> Self {
        match body {
            ImpactResponseBody::Ready(result) => SubmitOutcome::Completed(result),
            ImpactResponseBody::Pending {
                computation_id,
                status,
            } => SubmitOutcome::Computing(ComputationHandle {
                computation_id,
                status,
            }),
        }
    }
}

/// Poll response envelope.
#[derive(Debug, Deserialize)]
pub(crate) struct PollResponseBody {
    pub status: ComputationStatus,
    #[serde(default)]
    pub result: Option<Box<ImpactResult>>,
    #[serde(default)]
    pub error: Option<String>,
}

impl PollResponseBody {
    pub(crate) fn into_outcome(self) -> Result<PollOutcome> {
        match self.status {
            ComputationStatus::Computing => Ok(PollOutcome::Computing),
            ComputationStatus::Completed => {
                let result = self
                    .result
                    .ok_or_else(|| anyhow::anyhow!("server reported completed without a result"))?;
                Ok(PollOutcome::Completed(result))
            }
            ComputationStatus::Failed => Ok(PollOutcome::Failed(
                self.error
                    .unwrap_or_else(|| "computation failed".to_string()),
            )),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

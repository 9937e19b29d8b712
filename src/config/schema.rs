/// Configuration schema and defaults for obrcast.
///
/// Defines the TOML-serializable configuration structure with all sections:
/// `[api]`, `[rates]`, `[web]`, and `[output]`.
///
/// Every field has a sensible built-in default. Users only need to set the
/// values they want to override.
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Top-level obrcast configuration.
///
/// Maps directly to the `~/.obrcast/config.toml` and `.obrcast.toml` file
/// schemas. All sections and fields are optional — missing values fall back
/// to built-in defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ObrcastConfig {
    pub api: ApiConfig,
    pub rates: RatesConfig,
    pub web: WebConfig,
    pub output: OutputConfig,
}

impl ObrcastConfig {
    /// The default config rendered as annotated TOML, written by
    /// `obrcast config init`.
    pub fn default_toml() -> String {
        let header = "\
# obrcast configuration
#
# Layers (later overrides earlier):
#   built-in defaults -> ~/.obrcast/config.toml -> ./.obrcast.toml -> OBRCAST_* env vars
#
# All keys are optional; delete anything you don't want to override.

";
        let body = toml::to_string_pretty(&Self::default())
            .unwrap_or_else(|_| String::from("# failed to render defaults\n"));
        format!("{header}{body}")
    }
}

// ---------------------------------------------------------------------------
// [api]
// ---------------------------------------------------------------------------

/// Remote simulation API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Deployed API base URL (including the `/api` prefix).
    pub base_url: String,
    /// Development API base URL (local FastAPI server).
    pub dev_url: String,
    /// Use `dev_url` instead of `base_url`.
    /// Can also be set via `OBRCAST_DEV_MODE=1`.
    pub dev_mode: bool,
    /// Timeout for metadata requests (milliseconds).
    pub metadata_timeout_ms: u64,
    /// Timeout for the initial impact submission (milliseconds).
    ///
    /// Generous by default — on a cache hit the server answers inline, but a
    /// cold submission may block until the simulation finishes.
    pub submit_timeout_ms: u64,
    /// Interval between computation polls (seconds).
    pub poll_interval_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://obr-forecast.policyengine.org/api".to_string(),
            dev_url: "http://127.0.0.1:8000/api".to_string(),
            dev_mode: false,
            metadata_timeout_ms: 30_000,
            submit_timeout_ms: 300_000,
            poll_interval_secs: 10,
        }
    }
}

// ---------------------------------------------------------------------------
// [rates]
// ---------------------------------------------------------------------------

/// Growth-rate editor bounds.
///
/// The upstream UI shipped with inconsistent input ranges across versions,
/// so the bounds are configurable rather than hard-coded. Defaults cover the
/// widest range the UI ever allowed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RatesConfig {
    /// Minimum decimal growth rate accepted for an override.
    pub min: f64,
    /// Maximum decimal growth rate accepted for an override.
    pub max: f64,
    /// Editor step size (decimal, e.g. 0.005 = 0.5 percentage points).
    pub step: f64,
}

impl Default for RatesConfig {
    fn default() -> Self {
        Self {
            min: -0.10,
            max: 0.20,
            step: 0.005,
        }
    }
}

// ---------------------------------------------------------------------------
// [web]
// ---------------------------------------------------------------------------

/// Local dashboard server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebConfig {
    /// Bind address for `obrcast web`.
    pub addr: String,
    /// Time-to-live for cached forecast metadata (seconds).
    pub cache_ttl_secs: u64,
    /// Open the dashboard in the default browser on startup.
    pub open_browser: bool,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            addr: "127.0.0.1:9810".to_string(),
            cache_ttl_secs: 3600,
            open_browser: true,
        }
    }
}

// ---------------------------------------------------------------------------
// [output]
// ---------------------------------------------------------------------------

/// Terminal output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Default output format for listing commands: `table`, `json`, `csv`.
    pub format: String,
    /// Width in characters of the decile bar chart.
    pub bar_width: usize,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: "table".to_string(),
            bar_width: 40,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

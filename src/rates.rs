//! Growth-rate matrix handling: the four economic rate categories, per-year
//! rate maps, CLI override parsing, and bound clamping.
//!
//! A custom scenario starts from the server's default matrix and applies
//! user overrides on top. Rates are decimals on the wire (`0.035` = 3.5%);
//! the CLI accepts either the decimal or a `%`-suffixed percentage.

use std::collections::{BTreeMap, BTreeSet};

use anyhow::{Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::config::schema::RatesConfig;

// ---------------------------------------------------------------------------
// Rate categories
// ---------------------------------------------------------------------------

/// One of the four growth-rate categories driving a scenario.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RateCategory {
    EarnedIncome,
    MixedIncome,
    CapitalIncome,
    Inflation,
}

impl RateCategory {
    /// All categories in display order.
    pub const ALL: [RateCategory; 4] = [
        RateCategory::EarnedIncome,
        RateCategory::MixedIncome,
        RateCategory::CapitalIncome,
        RateCategory::Inflation,
    ];

    /// The wire/CLI key for this category.
    pub fn key(self) -> &'static str {
        match self {
            Self::EarnedIncome => "earned_income",
            Self::MixedIncome => "mixed_income",
            Self::CapitalIncome => "capital_income",
            Self::Inflation => "inflation",
        }
    }

    /// Human-readable label for tables and the dashboard.
    pub fn label(self) -> &'static str {
        match self {
            Self::EarnedIncome => "Earned Income Growth",
            Self::MixedIncome => "Mixed Income Growth",
            Self::CapitalIncome => "Capital Income Growth",
            Self::Inflation => "Inflation Rate",
        }
    }

    /// Parse a CLI/wire key.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "earned_income" => Some(Self::EarnedIncome),
            "mixed_income" => Some(Self::MixedIncome),
            "capital_income" => Some(Self::CapitalIncome),
            "inflation" => Some(Self::Inflation),
            _ => None,
        }
    }
}

impl std::fmt::Display for RateCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.key())
    }
}

// ---------------------------------------------------------------------------
// Growth-rate matrix
// ---------------------------------------------------------------------------

/// Per-category, per-year decimal growth rates.
///
/// Serde shape matches the API JSON exactly: four named objects keyed by
/// year. Years are integer keys serialized as strings in JSON.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GrowthRateMatrix {
    pub earned_income: BTreeMap<i32, f64>,
    pub mixed_income: BTreeMap<i32, f64>,
    pub capital_income: BTreeMap<i32, f64>,
    pub inflation: BTreeMap<i32, f64>,
}

impl GrowthRateMatrix {
    /// The per-year map for one category.
    pub fn category(&self, category: RateCategory) -> &BTreeMap<i32, f64> {
        match category {
            RateCategory::EarnedIncome => &self.earned_income,
            RateCategory::MixedIncome => &self.mixed_income,
            RateCategory::CapitalIncome => &self.capital_income,
            RateCategory::Inflation => &self.inflation,
        }
    }

    fn category_mut(&mut self, category: RateCategory) -> &mut BTreeMap<i32, f64> {
        match category {
            RateCategory::EarnedIncome => &mut self.earned_income,
            RateCategory::MixedIncome => &mut self.mixed_income,
            RateCategory::CapitalIncome => &mut self.capital_income,
            RateCategory::Inflation => &mut self.inflation,
        }
    }

    /// The rate for one (category, year) cell, if present.
    pub fn get(&self, category: RateCategory, year: i32) -> Option<f64> {
        self.category(category).get(&year).copied()
    }

    /// Set one (category, year) cell.
    pub fn set(&mut self, category: RateCategory, year: i32, rate: f64) {
        self.category_mut(category).insert(year, rate);
    }

    /// All years present in any category, ascending.
    pub fn years(&self) -> Vec<i32> {
        let mut years = BTreeSet::new();
        for category in RateCategory::ALL {
            years.extend(self.category(category).keys().copied());
        }
        years.into_iter().collect()
    }

    /// True if no category has any year.
    pub fn is_empty(&self) -> bool {
        RateCategory::ALL
            .iter()
            .all(|c| self.category(*c).is_empty())
    }

    /// Apply an override, clamping the rate to the configured bounds.
    ///
    /// Returns the rate actually stored (clamped when out of bounds).
    pub fn apply(&mut self, ovr: &RateOverride, bounds: &RatesConfig) -> f64 {
        let rate = ovr.rate.clamp(bounds.min, bounds.max);
        self.set(ovr.category, ovr.year, rate);
        rate
    }
}

// ---------------------------------------------------------------------------
// CLI overrides
// ---------------------------------------------------------------------------

/// A single growth-rate override from the CLI: `category:year=rate`.
///
/// The rate accepts a decimal (`0.035`) or a percentage (`3.5%`).
#[derive(Debug, Clone, PartialEq)]
pub struct RateOverride {
    pub category: RateCategory,
    pub year: i32,
    pub rate: f64,
}

impl RateOverride {
    /// Parse an override expression like `earned_income:2027=3.5%`.
    pub fn parse(input: &str) -> Result<Self> {
        // Compiled per call; override lists are tiny.
        let re = Regex::new(r"^([a-z_]+):(\d{4})=(-?\d+(?:\.\d+)?)(%?)$")
            .context("invalid override regex")?;

        let caps = re.captures(input.trim()).with_context(|| {
            format!("invalid override '{input}' — expected category:year=rate (e.g. inflation:2027=2%)")
        })?;

        let category = RateCategory::parse(&caps[1]).with_context(|| {
            format!(
                "unknown category '{}' — expected one of earned_income, mixed_income, capital_income, inflation",
                &caps[1]
            )
        })?;
        let year: i32 = caps[2].parse().context("invalid year")?;
        let mut rate: f64 = caps[3].parse().context("invalid rate")?;
        if &caps[4] == "%" {
            rate /= 100.0;
        }

        Ok(Self {
            category,
            year,
            rate,
        })
    }
}

/// Parse a list of CLI override expressions.
pub fn parse_overrides(inputs: &[String]) -> Result<Vec<RateOverride>> {
    inputs.iter().map(|s| RateOverride::parse(s)).collect()
}

// ---------------------------------------------------------------------------
// Implied rates
// ---------------------------------------------------------------------------

/// Derive implied year-over-year growth rates from a published index series.
///
/// For each year with a predecessor in the series: `round(cur/prev, 3) - 1`.
/// This matches how the server derives its default growth factors from the
/// OBR index parameters.
pub fn implied_rates(index: &BTreeMap<i32, f64>) -> BTreeMap<i32, f64> {
    let mut rates = BTreeMap::new();
    for (&year, &value) in index {
        if let Some(&prev) = index.get(&(year - 1))
            && prev != 0.0
        {
            let ratio = value / prev;
            rates.insert(year, (ratio * 1000.0).round() / 1000.0 - 1.0);
        }
    }
    rates
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

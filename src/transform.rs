//! Chart data transforms: pure functions from result series to display
//! series. No network access, no mutable state.
//!
//! Conventions preserved from the dashboard charts:
//!
//! - Baseline = first element of a series (sorted by year ascending).
//! - Income-like series: percent change = (value − baseline)/baseline × 100.
//! - Rate-like series: percentage-point change = (value − baseline) × 100.
//! - Decile colors: linear blue (decile 1) to red (decile 10) ramp.

use std::collections::BTreeMap;

use crate::api::types::{DecileYearlyChange, YearlyMetric};

// ---------------------------------------------------------------------------
// Baseline-relative series
// ---------------------------------------------------------------------------

/// A series point annotated with its change from the baseline year.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BaselineChange {
    pub year: i32,
    pub value: f64,
    /// Percent for income-like series, percentage points for rate-like.
    pub change: f64,
}

/// Percent change from the first (baseline) element, for income-like series.
///
/// The baseline year itself reports 0.0. Empty input yields an empty vec; a
/// zero baseline reports 0.0 throughout rather than dividing by zero.
pub fn percent_change_from_baseline(series: &[YearlyMetric]) -> Vec<BaselineChange> {
    let Some(baseline) = series.first() else {
        return Vec::new();
    };
    series
        .iter()
        .map(|m| BaselineChange {
            year: m.year,
            value: m.value,
            change: if baseline.value == 0.0 {
                0.0
            } else {
                (m.value - baseline.value) / baseline.value * 100.0
            },
        })
        .collect()
}

/// Percentage-point change from the first element, for rate-like series.
pub fn point_change_from_baseline(series: &[YearlyMetric]) -> Vec<BaselineChange> {
    let Some(baseline) = series.first() else {
        return Vec::new();
    };
    series
        .iter()
        .map(|m| BaselineChange {
            year: m.year,
            value: m.value,
            change: (m.value - baseline.value) * 100.0,
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Decile series
// ---------------------------------------------------------------------------

/// RGB color for an income decile: blue (1) to red (10), fixed green.
///
/// Deterministic — the same decile always maps to the same color.
pub fn decile_color(decile: u8) -> (u8, u8, u8) {
    let d = f64::from(decile);
    let red = (d / 10.0 * 255.0).round().clamp(0.0, 255.0) as u8;
    let blue = ((11.0 - d) / 10.0 * 255.0).round().clamp(0.0, 255.0) as u8;
    (red, 50, blue)
}

/// Dense per-year decile grid: one row per year, ten change columns.
///
/// Years are ascending; cells missing from the input are 0.0.
pub fn decile_grid(changes: &[DecileYearlyChange]) -> Vec<(i32, [f64; 10])> {
    let mut by_year: BTreeMap<i32, [f64; 10]> = BTreeMap::new();
    for change in changes {
        if !(1..=10).contains(&change.decile) {
            continue;
        }
        let row = by_year.entry(change.year).or_insert([0.0; 10]);
        row[usize::from(change.decile) - 1] = change.change;
    }
    by_year.into_iter().collect()
}

// ---------------------------------------------------------------------------
// Growth helpers
// ---------------------------------------------------------------------------

/// Cumulative growth factor from `base_year` to `target_year` given per-year
/// decimal rates. Years missing from the map contribute no growth.
pub fn cumulative_growth(base_year: i32, target_year: i32, rates: &BTreeMap<i32, f64>) -> f64 {
    let mut cumulative = 1.0;
    for year in (base_year + 1)..=target_year {
        cumulative *= 1.0 + rates.get(&year).copied().unwrap_or(0.0);
    }
    cumulative
}

// ---------------------------------------------------------------------------
// Formatting
// ---------------------------------------------------------------------------

/// Format a GBP amount with thousands separators and no decimals: `£31,234`.
pub fn format_gbp(value: f64) -> String {
    let rounded = value.round();
    let negative = rounded < 0.0;
    let digits = format!("{:.0}", rounded.abs());
    let mut grouped = String::new();
    for (i, ch) in digits.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    let grouped: String = grouped.chars().rev().collect();
    if negative {
        format!("-£{grouped}")
    } else {
        format!("£{grouped}")
    }
}

/// Format a decimal rate as a one-decimal percentage: `0.175` → `17.5%`.
pub fn format_rate(rate: f64) -> String {
    format!("{:.1}%", rate * 100.0)
}

/// Format an already-scaled percent value with an explicit sign: `+10.0%`.
pub fn format_signed_pct(pct: f64) -> String {
    format!("{pct:+.1}%")
}

/// Format an already-scaled percentage-point value: `-0.3pp`.
pub fn format_signed_pp(points: f64) -> String {
    format!("{points:+.1}pp")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn series(points: &[(i32, f64)]) -> Vec<YearlyMetric> {
        points
            .iter()
            .map(|&(year, value)| YearlyMetric { year, value })
            .collect()
    }

    #[test]
    fn percent_change_uses_first_year_as_baseline() {
        let changes = percent_change_from_baseline(&series(&[(2025, 100.0), (2026, 110.0)]));
        assert_eq!(changes[0].change, 0.0);
        assert!((changes[1].change - 10.0).abs() < 1e-9);
    }

    #[test]
    fn percent_change_handles_zero_baseline() {
        let changes = percent_change_from_baseline(&series(&[(2025, 0.0), (2026, 50.0)]));
        assert_eq!(changes[1].change, 0.0);
    }

    #[test]
    fn percent_change_of_empty_series_is_empty() {
        assert!(percent_change_from_baseline(&[]).is_empty());
    }

    #[test]
    fn point_change_scales_to_percentage_points() {
        let changes = point_change_from_baseline(&series(&[(2025, 0.17), (2026, 0.181)]));
        assert!((changes[1].change - 1.1).abs() < 1e-9);
    }

    #[test]
    fn decile_colors_are_distinct_and_deterministic() {
        let first = decile_color(1);
        let last = decile_color(10);
        assert_ne!(first, last);
        assert_eq!(first, decile_color(1));
        assert_eq!(last, decile_color(10));
        // Decile 1 is blue-dominant, decile 10 red-dominant
        assert!(first.2 > first.0);
        assert!(last.0 > last.2);
    }

    #[test]
    fn decile_red_channel_is_monotonic() {
        let mut prev = decile_color(1).0;
        for decile in 2..=10 {
            let red = decile_color(decile).0;
            assert!(red >= prev);
            prev = red;
        }
    }

    #[test]
    fn decile_grid_fills_missing_cells_with_zero() {
        let changes = vec![
            DecileYearlyChange {
                decile: 1,
                year: 2026,
                change: 0.02,
            },
            DecileYearlyChange {
                decile: 10,
                year: 2026,
                change: 0.04,
            },
            DecileYearlyChange {
                decile: 5,
                year: 2027,
                change: -0.01,
            },
        ];
        let grid = decile_grid(&changes);
        assert_eq!(grid.len(), 2);

        let (year, row) = grid[0];
        assert_eq!(year, 2026);
        assert_eq!(row[0], 0.02);
        assert_eq!(row[9], 0.04);
        assert_eq!(row[4], 0.0);

        let (year, row) = grid[1];
        assert_eq!(year, 2027);
        assert_eq!(row[4], -0.01);
    }

    #[test]
    fn decile_grid_ignores_out_of_range_deciles() {
        let changes = vec![DecileYearlyChange {
            decile: 11,
            year: 2026,
            change: 0.5,
        }];
        assert!(decile_grid(&changes).is_empty());
    }

    #[test]
    fn cumulative_growth_compounds_rates() {
        let mut rates = BTreeMap::new();
        rates.insert(2026, 0.10);
        rates.insert(2027, 0.10);
        let growth = cumulative_growth(2025, 2027, &rates);
        assert!((growth - 1.21).abs() < 1e-9);
    }

    #[test]
    fn cumulative_growth_over_empty_range_is_one() {
        let rates = BTreeMap::new();
        assert_eq!(cumulative_growth(2025, 2025, &rates), 1.0);
    }

    #[test]
    fn gbp_formatting_groups_thousands() {
        assert_eq!(format_gbp(31234.4), "£31,234");
        assert_eq!(format_gbp(999.0), "£999");
        assert_eq!(format_gbp(1_234_567.0), "£1,234,567");
        assert_eq!(format_gbp(-4500.0), "-£4,500");
    }

    #[test]
    fn rate_formatting() {
        assert_eq!(format_rate(0.175), "17.5%");
        assert_eq!(format_signed_pct(10.0), "+10.0%");
        assert_eq!(format_signed_pct(-2.31), "-2.3%");
        assert_eq!(format_signed_pp(-0.3), "-0.3pp");
    }
}

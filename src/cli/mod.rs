//! CLI command implementations for obrcast.
//!
//! Provides subcommand handlers for:
//! - `obrcast forecasts` — list official forecasts
//! - `obrcast rates` — show the default growth-rate matrix
//! - `obrcast analyze` — submit an analysis, poll, render results
//! - `obrcast health` — check API connectivity and config
//! - `obrcast config show|init|set|reset` — configuration management

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use colored::Colorize;

use crate::api::types::{ImpactRequest, ImpactResult, YearlyMetric};
use crate::api::{ForecastApiClient, ForecastMetadata};
use crate::config;
use crate::rates::{self, GrowthRateMatrix, RateCategory};
use crate::session::{Session, SessionState, run_to_completion};
use crate::transform;

/// Output format for listing commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Table,
    Json,
    Csv,
}

impl OutputFormat {
    pub fn from_str_opt(s: Option<&str>) -> Self {
        match s {
            Some("json") => Self::Json,
            Some("csv") => Self::Csv,
            _ => Self::Table,
        }
    }

    /// Resolve the format from the CLI flag, falling back to `[output] format`.
    pub fn resolve(flag: Option<&str>, cfg: &config::ObrcastConfig) -> Self {
        Self::from_str_opt(flag.or(Some(cfg.output.format.as_str())))
    }
}

// ---------------------------------------------------------------------------
// obrcast forecasts
// ---------------------------------------------------------------------------

/// List the available official forecasts.
pub fn run_forecasts(format: Option<&str>) -> Result<()> {
    let cfg = config::load();
    let format = OutputFormat::resolve(format, &cfg);
    let client = ForecastApiClient::from_config(&cfg.api);
    let metadata = fetch_metadata(&client)?;

    if metadata.forecasts.is_empty() {
        println!("{}", "No forecasts published by the server.".yellow());
        return Ok(());
    }

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&metadata.forecasts)?);
        }
        OutputFormat::Csv => {
            println!("id,name,date");
            for f in &metadata.forecasts {
                println!("{},{},{}", f.id, f.name, f.date);
            }
        }
        OutputFormat::Table => print_forecasts_table(&metadata),
    }

    Ok(())
}

fn print_forecasts_table(metadata: &ForecastMetadata) {
    println!("{}", "Available OBR Forecasts".bold().cyan());
    println!("{}", "=".repeat(50));
    println!("  {:<16} {:<22} Date", "Id", "Name");
    println!("  {}", "-".repeat(48));

    for (i, forecast) in metadata.forecasts.iter().enumerate() {
        let line = format!(
            "  {:<16} {:<22} {}",
            forecast.id, forecast.name, forecast.date
        );
        if i == 0 {
            println!("{} {}", line, "(default)".dimmed());
        } else {
            println!("{line}");
        }
    }

    if !metadata.forecast_years.is_empty() {
        println!();
        println!(
            "  {} {}",
            "Forecast years:".bold(),
            metadata
                .forecast_years
                .iter()
                .map(|y| y.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        );
    }
}

// ---------------------------------------------------------------------------
// obrcast rates
// ---------------------------------------------------------------------------

/// Show the default growth-rate matrix, or its cumulative view.
pub fn run_rates(format: Option<&str>, cumulative: bool) -> Result<()> {
    let cfg = config::load();
    let format = OutputFormat::resolve(format, &cfg);
    let client = ForecastApiClient::from_config(&cfg.api);
    let metadata = fetch_metadata(&client)?;

    let matrix = &metadata.default_growth_rates;
    if matrix.is_empty() {
        println!("{}", "Server returned no default growth rates.".yellow());
        return Ok(());
    }

    if cumulative {
        return print_cumulative(matrix, format);
    }

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(matrix)?),
        OutputFormat::Csv => {
            println!("category,year,rate");
            for category in RateCategory::ALL {
                for (year, rate) in matrix.category(category) {
                    println!("{},{},{}", category.key(), year, rate);
                }
            }
        }
        OutputFormat::Table => {
            println!("{}", "Default Growth Rates".bold().cyan());
            println!("{}", "=".repeat(60));

            let years = matrix.years();
            let mut header = format!("  {:<24}", "Category");
            for year in &years {
                header.push_str(&format!(" {year:>7}"));
            }
            println!("{header}");
            println!("  {}", "-".repeat(24 + years.len() * 8));

            for category in RateCategory::ALL {
                let mut line = format!("  {:<24}", category.label());
                for year in &years {
                    match matrix.get(category, *year) {
                        Some(rate) => line.push_str(&format!(" {:>7}", transform::format_rate(rate))),
                        None => line.push_str(&format!(" {:>7}", "—")),
                    }
                }
                println!("{line}");
            }

            println!();
            println!(
                "  {}",
                format!(
                    "Override with: obrcast analyze --set category:year=rate (bounds {:.0}% to {:.0}%)",
                    cfg.rates.min * 100.0,
                    cfg.rates.max * 100.0
                )
                .dimmed()
            );
        }
    }

    Ok(())
}

/// Render the cumulative growth factors for `obrcast rates --cumulative`.
fn print_cumulative(matrix: &GrowthRateMatrix, format: OutputFormat) -> Result<()> {
    let rows = cumulative_rows(matrix);

    match format {
        OutputFormat::Json => {
            let mut doc = serde_json::Map::new();
            for (category, factors) in &rows {
                let by_year: serde_json::Map<String, serde_json::Value> = factors
                    .iter()
                    .map(|(year, factor)| (year.to_string(), (*factor).into()))
                    .collect();
                doc.insert(category.key().to_string(), by_year.into());
            }
            println!("{}", serde_json::to_string_pretty(&doc)?);
        }
        OutputFormat::Csv => {
            println!("category,year,cumulative_factor");
            for (category, factors) in &rows {
                for (year, factor) in factors {
                    println!("{},{},{factor}", category.key(), year);
                }
            }
        }
        OutputFormat::Table => {
            println!("{}", "Cumulative Growth Factors".bold().cyan());
            println!("{}", "=".repeat(60));
            println!(
                "  {}",
                "Compounded from the first forecast year (1.000 = no growth)".dimmed()
            );

            let years = matrix.years();
            let mut header = format!("  {:<24}", "Category");
            for year in &years {
                header.push_str(&format!(" {year:>7}"));
            }
            println!("{header}");
            println!("  {}", "-".repeat(24 + years.len() * 8));

            for (category, factors) in &rows {
                let mut line = format!("  {:<24}", category.label());
                for (_, factor) in factors {
                    line.push_str(&format!(" {factor:>7.3}"));
                }
                println!("{line}");
            }
        }
    }

    Ok(())
}

/// Cumulative growth factor per category for every year in the matrix,
/// compounded from the first forecast year onward.
fn cumulative_rows(matrix: &GrowthRateMatrix) -> Vec<(RateCategory, Vec<(i32, f64)>)> {
    let years = matrix.years();
    let Some(&first) = years.first() else {
        return Vec::new();
    };

    RateCategory::ALL
        .iter()
        .map(|&category| {
            let rates = matrix.category(category);
            let factors = years
                .iter()
                .map(|&year| (year, transform::cumulative_growth(first - 1, year, rates)))
                .collect();
            (category, factors)
        })
        .collect()
}

// ---------------------------------------------------------------------------
// obrcast analyze
// ---------------------------------------------------------------------------

/// Submit an impact analysis, poll to completion, and render the results.
pub fn run_analyze(
    forecast: Option<&str>,
    custom: bool,
    overrides: &[String],
    format: Option<&str>,
) -> Result<()> {
    let parsed_overrides = rates::parse_overrides(overrides)?;

    let cfg = config::load();
    let format = OutputFormat::resolve(format, &cfg);
    let client = ForecastApiClient::from_config(&cfg.api);
    let metadata = fetch_metadata(&client)?;

    // Default to the first published forecast when none was named.
    let forecast_id = match forecast {
        Some(id) => id.to_string(),
        None => metadata
            .forecasts
            .first()
            .map(|f| f.id.clone())
            .context("server published no forecasts and no --forecast was given")?,
    };

    let request = if custom || !parsed_overrides.is_empty() {
        let mut matrix = metadata.default_growth_rates.clone();
        for ovr in &parsed_overrides {
            let stored = matrix.apply(ovr, &cfg.rates);
            if (stored - ovr.rate).abs() > f64::EPSILON {
                println!(
                    "{} {}:{} clamped from {} to {}",
                    "warning:".yellow().bold(),
                    ovr.category,
                    ovr.year,
                    transform::format_rate(ovr.rate),
                    transform::format_rate(stored),
                );
            }
        }
        if custom {
            ImpactRequest::custom(matrix)
        } else {
            ImpactRequest {
                forecast_id,
                growth_rates: Some(matrix),
            }
        }
    } else {
        ImpactRequest::official(forecast_id)
    };

    let mut session = Session::new(std::time::Duration::from_secs(cfg.api.poll_interval_secs));
    let mut polls = 0u32;
    let result = run_to_completion(&client, &mut session, &request, |state| match state {
        SessionState::Submitting => {
            println!("{}", "Submitting analysis to PolicyEngine...".dimmed());
        }
        SessionState::Computing(handle) => {
            polls += 1;
            if polls == 1 {
                println!(
                    "{}",
                    format!(
                        "Computation {} running — polling every {}s (this can take a few minutes)",
                        handle.computation_id, cfg.api.poll_interval_secs
                    )
                    .dimmed()
                );
            } else {
                println!(
                    "{}",
                    format!("still computing (poll {})", polls - 1).dimmed()
                );
            }
        }
        _ => {}
    });

    let result = match result {
        Ok(result) => result,
        Err(err) => {
            println!("{} {}", "Analysis failed:".red().bold(), err);
            anyhow::bail!("analysis failed");
        }
    };

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&result)?),
        OutputFormat::Csv => print_result_csv(&result),
        OutputFormat::Table => print_result_tables(&result, cfg.output.bar_width),
    }

    Ok(())
}

fn print_result_csv(result: &ImpactResult) {
    println!("series,year,value");
    for m in &result.median_income_by_year {
        println!("median_income,{},{}", m.year, m.value);
    }
    for m in &result.absolute_poverty_by_year {
        println!("absolute_poverty,{},{}", m.year, m.value);
    }
    for m in &result.relative_poverty_by_year {
        println!("relative_poverty,{},{}", m.year, m.value);
    }
    for c in &result.decile_yearly_changes {
        println!("decile_change_{},{},{}", c.decile, c.year, c.change);
    }
}

fn print_result_tables(result: &ImpactResult, bar_width: usize) {
    println!();
    println!("{}", "Forecast Impact Results".bold().cyan());
    println!("{}", "=".repeat(60));

    // Median household income with change from the baseline year and the
    // implied year-over-year growth of the series
    let income = transform::percent_change_from_baseline(&result.median_income_by_year);
    if !income.is_empty() {
        let baseline_year = income[0].year;
        let yoy = median_income_growth(&result.median_income_by_year);
        println!();
        println!("{}", "Median Household Income".bold());
        println!(
            "  {:<6} {:>12} {:>16} {:>8}",
            "Year",
            "Income",
            format!("Δ from {baseline_year}"),
            "YoY"
        );
        println!("  {}", "-".repeat(45));
        for point in &income {
            let growth = yoy
                .get(&point.year)
                .map(|rate| transform::format_signed_pct(rate * 100.0))
                .unwrap_or_else(|| "—".to_string());
            println!(
                "  {:<6} {:>12} {:>16} {:>8}",
                point.year,
                transform::format_gbp(point.value),
                transform::format_signed_pct(point.change),
                growth,
            );
        }
    }

    // Poverty rates with percentage-point change
    print_poverty_table(
        "Absolute Poverty Rate",
        &transform::point_change_from_baseline(&result.absolute_poverty_by_year),
    );
    print_poverty_table(
        "Relative Poverty Rate",
        &transform::point_change_from_baseline(&result.relative_poverty_by_year),
    );

    // Decile bars, one block per year
    let grid = transform::decile_grid(&result.decile_yearly_changes);
    if !grid.is_empty() {
        println!();
        println!("{}", "Income Growth by Decile".bold());
        println!(
            "  {}",
            "Year-over-year change in aggregate household income".dimmed()
        );

        let max_abs = grid
            .iter()
            .flat_map(|(_, row)| row.iter())
            .fold(0.0f64, |acc, c| acc.max(c.abs()));

        for (year, row) in &grid {
            println!();
            println!("  {}", year.to_string().bold());
            for (i, change) in row.iter().enumerate() {
                let decile = (i + 1) as u8;
                let (r, g, b) = transform::decile_color(decile);
                let bar = "█".repeat(decile_bar_len(*change, max_abs, bar_width));
                println!(
                    "  D{:<3} {} {}",
                    decile,
                    bar.truecolor(r, g, b),
                    transform::format_signed_pct(change * 100.0).dimmed(),
                );
            }
        }
    }

    println!();
    println!("  {}", "Data calculated using PolicyEngine".dimmed());
}

/// Bar length for one decile, scaled against the largest absolute change.
///
/// A zero change draws no bar; any nonzero change draws at least one cell.
fn decile_bar_len(change: f64, max_abs: f64, bar_width: usize) -> usize {
    if change == 0.0 || max_abs == 0.0 {
        return 0;
    }
    let len = ((change.abs() / max_abs) * bar_width as f64).round() as usize;
    len.max(1)
}

/// Implied year-over-year growth rates of the median income series.
fn median_income_growth(series: &[YearlyMetric]) -> BTreeMap<i32, f64> {
    let index: BTreeMap<i32, f64> = series.iter().map(|m| (m.year, m.value)).collect();
    rates::implied_rates(&index)
}

fn print_poverty_table(title: &str, series: &[transform::BaselineChange]) {
    if series.is_empty() {
        return;
    }
    let baseline_year = series[0].year;
    println!();
    println!("{}", title.bold());
    println!(
        "  {:<6} {:>8} {:>16}",
        "Year",
        "Rate",
        format!("Δ from {baseline_year}")
    );
    println!("  {}", "-".repeat(32));
    for point in series {
        println!(
            "  {:<6} {:>8} {:>16}",
            point.year,
            transform::format_rate(point.value),
            transform::format_signed_pp(point.change),
        );
    }
}

// ---------------------------------------------------------------------------
// obrcast health
// ---------------------------------------------------------------------------

/// Check system health: config files, API connectivity.
pub fn run_health() -> Result<()> {
    println!("{}", "obrcast Health Check".bold().cyan());
    println!("{}", "=".repeat(40));

    let global_exists = config::global_config_file()
        .map(|p| p.exists())
        .unwrap_or(false);
    let project_exists = config::project_config_file()
        .map(|p| p.exists())
        .unwrap_or(false);
    let cfg = config::load();

    print_health_item(
        "Global config",
        global_exists,
        if global_exists {
            "~/.obrcast/config.toml found"
        } else {
            "not found (run `obrcast config init` to create)"
        },
    );
    print_health_item(
        "Project config",
        project_exists,
        if project_exists {
            ".obrcast.toml found"
        } else {
            "none (optional)"
        },
    );
    print_health_item(
        "Mode",
        true,
        if cfg.api.dev_mode {
            "development (local API)"
        } else {
            "production"
        },
    );

    let client = ForecastApiClient::from_config(&cfg.api);
    let api_ok = client.is_healthy();
    let api_detail = if api_ok {
        format!("reachable at {}", client.base_url())
    } else {
        format!("not reachable at {} — is the service up?", client.base_url())
    };
    print_health_item("Forecast API", api_ok, &api_detail);

    print_health_item(
        "Polling",
        true,
        &format!(
            "every {}s, submit timeout {}s",
            cfg.api.poll_interval_secs,
            cfg.api.submit_timeout_ms / 1000
        ),
    );

    Ok(())
}

fn print_health_item(name: &str, ok: bool, detail: &str) {
    let status = if ok {
        "✓".green().bold()
    } else {
        "✗".red().bold()
    };
    println!("  {} {:<16} {}", status, name, detail.dimmed());
}

// ---------------------------------------------------------------------------
// obrcast config show | init | set | reset
// ---------------------------------------------------------------------------

/// Show the effective (merged) configuration as TOML.
pub fn run_config_show() -> Result<()> {
    let toml_str = config::show_effective_config()?;
    println!("{}", "Effective obrcast Configuration".bold().cyan());
    println!("{}", "=".repeat(50));
    println!();
    println!("{toml_str}");

    let global_exists = config::global_config_file()
        .map(|p| p.exists())
        .unwrap_or(false);
    let project_exists = config::project_config_file()
        .map(|p| p.exists())
        .unwrap_or(false);
    println!("{}", "Sources (highest priority last):".dimmed());
    println!("  {} built-in defaults", "·".dimmed());
    if global_exists {
        println!("  {} {}", "✓".green(), "~/.obrcast/config.toml".dimmed());
    } else {
        println!(
            "  {} {}",
            "·".dimmed(),
            "~/.obrcast/config.toml (not found)".dimmed()
        );
    }
    if project_exists {
        println!("  {} {}", "✓".green(), ".obrcast.toml".dimmed());
    } else {
        println!("  {} {}", "·".dimmed(), ".obrcast.toml (not found)".dimmed());
    }
    println!(
        "  {} {}",
        "·".dimmed(),
        "OBRCAST_* environment variables".dimmed()
    );

    Ok(())
}

/// Initialize a default config file at `~/.obrcast/config.toml`.
pub fn run_config_init(force: bool) -> Result<()> {
    let path = config::init_config(force)?;
    println!(
        "{} Config written to {}",
        "✓".green().bold(),
        path.display()
    );
    Ok(())
}

/// Set a single configuration value in the global config file.
pub fn run_config_set(key: &str, value: &str) -> Result<()> {
    config::set_config_value(key, value)?;
    println!("{} Set {} = {}", "✓".green().bold(), key.bold(), value);
    Ok(())
}

/// Reset configuration to defaults.
pub fn run_config_reset() -> Result<()> {
    let path = config::reset_config()?;
    println!(
        "{} Config reset to defaults at {}",
        "✓".green().bold(),
        path.display()
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Fetch forecast metadata, surfacing failures as a red banner.
///
/// There is no automatic retry — recovery is manual.
fn fetch_metadata(client: &ForecastApiClient) -> Result<ForecastMetadata> {
    match client.fetch_forecasts() {
        Ok(metadata) => Ok(metadata),
        Err(err) => {
            println!("{} {}", "Error fetching forecasts:".red().bold(), err);
            Err(err)
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_format_parsing() {
        assert_eq!(OutputFormat::from_str_opt(None), OutputFormat::Table);
        assert_eq!(OutputFormat::from_str_opt(Some("json")), OutputFormat::Json);
        assert_eq!(OutputFormat::from_str_opt(Some("csv")), OutputFormat::Csv);
        assert_eq!(
            OutputFormat::from_str_opt(Some("unknown")),
            OutputFormat::Table
        );
    }

    #[test]
    fn flag_takes_precedence_over_config_format() {
        let mut cfg = config::ObrcastConfig::default();
        cfg.output.format = "json".to_string();
        assert_eq!(OutputFormat::resolve(None, &cfg), OutputFormat::Json);
        assert_eq!(OutputFormat::resolve(Some("csv"), &cfg), OutputFormat::Csv);
    }

    #[test]
    fn cumulative_rows_compound_from_the_first_year() {
        let mut matrix = GrowthRateMatrix::default();
        matrix.set(RateCategory::EarnedIncome, 2026, 0.10);
        matrix.set(RateCategory::EarnedIncome, 2027, 0.10);
        matrix.set(RateCategory::Inflation, 2026, 0.02);

        let rows = cumulative_rows(&matrix);
        assert_eq!(rows.len(), 4);

        let (category, factors) = &rows[0];
        assert_eq!(*category, RateCategory::EarnedIncome);
        assert_eq!(factors[0].0, 2026);
        assert!((factors[0].1 - 1.10).abs() < 1e-9);
        assert!((factors[1].1 - 1.21).abs() < 1e-9);

        // Categories without a rate for a year carry no growth that year
        let (_, inflation) = &rows[3];
        assert!((inflation[0].1 - 1.02).abs() < 1e-9);
        assert!((inflation[1].1 - 1.02).abs() < 1e-9);
    }

    #[test]
    fn cumulative_rows_of_empty_matrix_are_empty() {
        assert!(cumulative_rows(&GrowthRateMatrix::default()).is_empty());
    }

    #[test]
    fn median_income_growth_derives_yoy_rates() {
        let series = vec![
            YearlyMetric {
                year: 2025,
                value: 30_000.0,
            },
            YearlyMetric {
                year: 2026,
                value: 30_900.0,
            },
            YearlyMetric {
                year: 2027,
                value: 31_827.0,
            },
        ];
        let yoy = median_income_growth(&series);

        // Baseline year has no predecessor, later years report the ratio
        assert!(!yoy.contains_key(&2025));
        assert!((yoy[&2026] - 0.030).abs() < 1e-9);
        assert!((yoy[&2027] - 0.030).abs() < 1e-9);
    }

    #[test]
    fn zero_change_draws_no_bar() {
        assert_eq!(decile_bar_len(0.0, 0.05, 40), 0);
        assert_eq!(decile_bar_len(0.02, 0.0, 40), 0);
    }

    #[test]
    fn small_nonzero_change_draws_at_least_one_cell() {
        assert_eq!(decile_bar_len(0.0001, 0.05, 40), 1);
        assert_eq!(decile_bar_len(0.05, 0.05, 40), 40);
        assert_eq!(decile_bar_len(-0.025, 0.05, 40), 20);
    }
}

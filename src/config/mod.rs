/// Configuration system for obrcast.
///
/// Provides a layered configuration hierarchy:
///
/// 1. **Built-in defaults** — hardcoded in [`schema::ObrcastConfig::default()`]
/// 2. **User global config** — `~/.obrcast/config.toml`
/// 3. **Project local config** — `.obrcast.toml` in the current working directory
/// 4. **Environment variables** — `OBRCAST_*` overrides (highest precedence)
///
/// Later layers override earlier ones. Missing sections in a TOML file fall
/// back to the previous layer's values.
pub mod schema;

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};

pub use schema::ObrcastConfig;

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Load the fully resolved obrcast configuration.
///
/// Merges all layers in order: defaults → global TOML → project TOML → env
/// vars. This is the primary entry point for all modules that need
/// configuration.
pub fn load() -> ObrcastConfig {
    let mut config = ObrcastConfig::default();

    // Layer 2: user global config (~/.obrcast/config.toml)
    if let Some(global) = load_toml_file(global_config_path()) {
        merge_config(&mut config, &global);
    }

    // Layer 3: project local config (.obrcast.toml)
    if let Some(project) = load_toml_file(project_config_path()) {
        merge_config(&mut config, &project);
    }

    // Layer 4: environment variable overrides
    apply_env_overrides(&mut config);

    config
}

/// Load a TOML config file from the given path (if it exists).
///
/// Returns `None` if the path is `None`, the file doesn't exist, or the
/// content is malformed. Malformed files are silently ignored so a broken
/// config never takes the tool down.
fn load_toml_file(path: Option<PathBuf>) -> Option<ObrcastConfig> {
    let path = path?;
    let content = fs::read_to_string(&path).ok()?;
    toml::from_str(&content).ok()
}

/// Merge a loaded config layer into the base config.
///
/// Each TOML file deserializes with `serde(default)`, so unset keys carry
/// the built-in defaults — which match the base for the common case of a
/// user setting only a handful of keys. The overlay therefore replaces the
/// base wholesale.
fn merge_config(base: &mut ObrcastConfig, overlay: &ObrcastConfig) {
    *base = overlay.clone();
}

// ---------------------------------------------------------------------------
// File paths
// ---------------------------------------------------------------------------

/// Path to the user global config: `~/.obrcast/config.toml`.
fn global_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".obrcast").join("config.toml"))
}

/// Path to the project local config: `.obrcast.toml` in the current directory.
fn project_config_path() -> Option<PathBuf> {
    std::env::current_dir()
        .ok()
        .map(|cwd| cwd.join(".obrcast.toml"))
}

/// Return the path to the global config file for display/init purposes.
pub fn global_config_file() -> Option<PathBuf> {
    global_config_path()
}

/// Return the path to the project config file for display purposes.
pub fn project_config_file() -> Option<PathBuf> {
    project_config_path()
}

// ---------------------------------------------------------------------------
// Environment variable overrides
// ---------------------------------------------------------------------------

/// Apply environment variable overrides (highest precedence layer).
///
/// Supported variables:
/// - `OBRCAST_API_URL` — deployed API base URL
/// - `OBRCAST_DEV_URL` — development API base URL
/// - `OBRCAST_DEV_MODE` — use the development URL (`1`/`true`/`yes`/`on`)
/// - `OBRCAST_SUBMIT_TIMEOUT_MS` — impact submission timeout
/// - `OBRCAST_POLL_INTERVAL_SECS` — computation poll interval
/// - `OBRCAST_WEB_ADDR` — dashboard bind address
fn apply_env_overrides(config: &mut ObrcastConfig) {
    if let Ok(val) = std::env::var("OBRCAST_API_URL")
        && !val.is_empty()
    {
        config.api.base_url = val;
    }
    if let Ok(val) = std::env::var("OBRCAST_DEV_URL")
        && !val.is_empty()
    {
        config.api.dev_url = val;
    }
    if let Ok(val) = std::env::var("OBRCAST_DEV_MODE") {
        config.api.dev_mode = is_truthy(&val);
    }
    if let Ok(val) = std::env::var("OBRCAST_SUBMIT_TIMEOUT_MS")
        && let Ok(ms) = val.parse::<u64>()
    {
        config.api.submit_timeout_ms = ms;
    }
    if let Ok(val) = std::env::var("OBRCAST_POLL_INTERVAL_SECS")
        && let Ok(secs) = val.parse::<u64>()
    {
        config.api.poll_interval_secs = secs;
    }
    if let Ok(val) = std::env::var("OBRCAST_WEB_ADDR")
        && !val.is_empty()
    {
        config.web.addr = val;
    }
}

/// Check if a string value represents a truthy boolean.
fn is_truthy(val: &str) -> bool {
    matches!(
        val.to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

// ---------------------------------------------------------------------------
// Config init / set / reset
// ---------------------------------------------------------------------------

/// Write the default annotated config to `~/.obrcast/config.toml`.
///
/// Creates the `~/.obrcast/` directory if it doesn't exist. Returns an error
/// if the file already exists (use `force = true` to overwrite).
pub fn init_config(force: bool) -> Result<PathBuf> {
    let path = global_config_path().context("could not determine home directory")?;

    if path.exists() && !force {
        anyhow::bail!(
            "config file already exists at {}. Use --force to overwrite.",
            path.display()
        );
    }

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).context("failed to create ~/.obrcast/ directory")?;
    }

    fs::write(&path, ObrcastConfig::default_toml()).context("failed to write config file")?;

    Ok(path)
}

/// Set a single config key to a value in the global config file.
///
/// Reads the current global config (or defaults), updates the specified key,
/// and writes the result back. Supports dotted keys like `api.dev_mode`.
pub fn set_config_value(key: &str, value: &str) -> Result<()> {
    let path = global_config_path().context("could not determine home directory")?;

    let toml_str = if path.exists() {
        fs::read_to_string(&path).context("failed to read config file")?
    } else {
        toml::to_string_pretty(&ObrcastConfig::default())
            .context("failed to serialize default config")?
    };

    let mut value_table: toml::Value =
        toml::from_str(&toml_str).context("failed to parse config as TOML value")?;

    set_toml_value(&mut value_table, key, value)?;

    let output =
        toml::to_string_pretty(&value_table).context("failed to serialize updated config")?;

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).context("failed to create config directory")?;
    }
    fs::write(&path, output).context("failed to write config file")?;

    Ok(())
}

/// Set a value in a TOML value tree using a dotted key path.
fn set_toml_value(root: &mut toml::Value, key: &str, raw_value: &str) -> Result<()> {
    let parts: Vec<&str> = key.split('.').collect();
    if parts.is_empty() {
        anyhow::bail!("empty config key");
    }

    // Navigate to the parent table
    let mut current = root;
    for &part in &parts[..parts.len() - 1] {
        current = current
            .get_mut(part)
            .with_context(|| format!("config key not found: section '{part}' in '{key}'"))?;
    }

    let leaf = parts[parts.len() - 1];

    let table = current.as_table_mut().with_context(|| {
        format!(
            "expected table at '{}'",
            key.rsplit_once('.').map(|(s, _)| s).unwrap_or("")
        )
    })?;

    // Determine the type of the existing value to parse correctly
    let existing = table.get(leaf);
    let new_value = match existing {
        Some(toml::Value::Boolean(_)) => toml::Value::Boolean(is_truthy(raw_value)),
        Some(toml::Value::Integer(_)) => {
            let n: i64 = raw_value
                .parse()
                .with_context(|| format!("expected integer for '{key}', got '{raw_value}'"))?;
            toml::Value::Integer(n)
        }
        Some(toml::Value::Float(_)) => {
            let f: f64 = raw_value
                .parse()
                .with_context(|| format!("expected float for '{key}', got '{raw_value}'"))?;
            toml::Value::Float(f)
        }
        _ => toml::Value::String(raw_value.to_string()),
    };

    table.insert(leaf.to_string(), new_value);
    Ok(())
}

/// Reset the global config to defaults (overwrite the file).
pub fn reset_config() -> Result<PathBuf> {
    init_config(true)
}

/// Show the effective (fully resolved) config as TOML.
pub fn show_effective_config() -> Result<String> {
    let config = load();
    toml::to_string_pretty(&config).context("failed to serialize effective config")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn is_truthy_accepts_variants() {
        assert!(is_truthy("1"));
        assert!(is_truthy("true"));
        assert!(is_truthy("TRUE"));
        assert!(is_truthy("yes"));
        assert!(is_truthy("on"));
        assert!(!is_truthy("0"));
        assert!(!is_truthy("false"));
        assert!(!is_truthy(""));
    }

    #[test]
    fn set_toml_value_updates_bool() {
        let toml_str = "[api]\ndev_mode = false\n";
        let mut root: toml::Value = toml::from_str(toml_str).unwrap();
        set_toml_value(&mut root, "api.dev_mode", "true").unwrap();

        let api = root.as_table().unwrap()["api"].as_table().unwrap();
        assert_eq!(api["dev_mode"].as_bool(), Some(true));
    }

    #[test]
    fn set_toml_value_updates_integer() {
        let toml_str = "[api]\npoll_interval_secs = 10\n";
        let mut root: toml::Value = toml::from_str(toml_str).unwrap();
        set_toml_value(&mut root, "api.poll_interval_secs", "30").unwrap();

        let api = root.as_table().unwrap()["api"].as_table().unwrap();
        assert_eq!(api["poll_interval_secs"].as_integer(), Some(30));
    }

    #[test]
    fn set_toml_value_updates_float() {
        let toml_str = "[rates]\nmax = 0.2\n";
        let mut root: toml::Value = toml::from_str(toml_str).unwrap();
        set_toml_value(&mut root, "rates.max", "0.15").unwrap();

        let rates = root.as_table().unwrap()["rates"].as_table().unwrap();
        assert!((rates["max"].as_float().unwrap() - 0.15).abs() < f64::EPSILON);
    }

    #[test]
    fn set_toml_value_rejects_invalid_key() {
        let toml_str = "[api]\ndev_mode = false\n";
        let mut root: toml::Value = toml::from_str(toml_str).unwrap();
        assert!(set_toml_value(&mut root, "nonexistent.key", "value").is_err());
    }

    #[test]
    fn show_effective_config_returns_toml() {
        let toml_str = show_effective_config().unwrap();
        let _: ObrcastConfig = toml::from_str(&toml_str).unwrap();
    }
}

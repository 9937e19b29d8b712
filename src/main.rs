use anyhow::Result;
use clap::{Parser, Subcommand};

use obrcast::cli;
use obrcast::config;

#[derive(Debug, Parser)]
#[command(name = "obrcast")]
#[command(about = "OBR Forecast Impact Estimator client")]
struct App {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// List the available official OBR forecasts
    Forecasts {
        /// Output format: table, json, csv (default from config)
        #[arg(long)]
        format: Option<String>,
    },
    /// Show the default growth-rate matrix for the forecast years
    Rates {
        /// Show cumulative growth factors instead of per-year rates
        #[arg(long)]
        cumulative: bool,
        /// Output format: table, json, csv (default from config)
        #[arg(long)]
        format: Option<String>,
    },
    /// Submit a forecast impact analysis and render the results
    Analyze {
        /// Official forecast id (defaults to the first available forecast)
        #[arg(long)]
        forecast: Option<String>,
        /// Run a custom scenario built from the default growth rates
        #[arg(long)]
        custom: bool,
        /// Override a growth rate: category:year=rate (e.g. earned_income:2027=3.5%)
        #[arg(long = "set", value_name = "CAT:YEAR=RATE")]
        set: Vec<String>,
        /// Output format: table, json, csv (default from config)
        #[arg(long)]
        format: Option<String>,
    },
    /// Serve the local web dashboard
    Web {
        /// Address to bind (host:port)
        #[arg(long)]
        addr: Option<String>,
    },
    /// Check system health: API connectivity, config
    Health,
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Debug, Subcommand)]
enum ConfigAction {
    /// Show the effective (merged) configuration
    Show,
    /// Write a default config file to ~/.obrcast/config.toml
    Init {
        /// Overwrite an existing config file
        #[arg(long)]
        force: bool,
    },
    /// Set a single config value (dotted key, e.g. api.poll_interval_secs)
    Set { key: String, value: String },
    /// Reset the global config file to defaults
    Reset,
}

fn main() -> Result<()> {
    let app = App::parse();

    match app.command {
        Commands::Forecasts { format } => cli::run_forecasts(format.as_deref()),
        Commands::Rates { cumulative, format } => cli::run_rates(format.as_deref(), cumulative),
        Commands::Analyze {
            forecast,
            custom,
            set,
            format,
        } => cli::run_analyze(forecast.as_deref(), custom, &set, format.as_deref()),
        Commands::Web { addr } => {
            let cfg = config::load();
            let addr = addr.unwrap_or_else(|| cfg.web.addr.clone());
            obrcast::web::serve(&addr, &cfg)
        }
        Commands::Health => cli::run_health(),
        Commands::Config { action } => match action {
            ConfigAction::Show => cli::run_config_show(),
            ConfigAction::Init { force } => cli::run_config_init(force),
            ConfigAction::Set { key, value } => cli::run_config_set(&key, &value),
            ConfigAction::Reset => cli::run_config_reset(),
        },
    }
}

//! onacc: climate forecasts for a selection of localities.
//!
//! Loads a locality file and/or manual coordinates, runs one forecast pass
//! against Open-Meteo and exports the normalized results plus a failure
//! report. Ctrl-C cancels outstanding localities; whatever finished is still
//! exported.

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;

use onacc_core::{Config, ExportFormat};
use onacc_forecast::request::{DAILY_MAX_DAYS, PROJECTION_MAX_YEAR};
use onacc_forecast::{
    parse_coordinates, write_failures, write_results_to_path, ForecastClient, ForecastConfig,
    ForecastMode, Locality, LocalityFilter, LocalityTable, Pipeline, RunOutcome, SeasonalLength,
    Variable,
};

const DEFAULT_PROJECTION_START: i32 = 2025;
const DEFAULT_OUTPUT_STEM: &str = "onacc_forecast";

/// Onacc climate forecast
#[derive(Parser, Debug)]
#[command(
    name = "onacc",
    version,
    about = "Daily, seasonal and projected climate forecasts for a set of localities"
)]
struct Cli {
    /// Locality file (csv, tsv or xlsx) with columns localite, latitude,
    /// longitude, altitude, region, country
    #[arg(long, value_name = "FILE")]
    localities: Option<PathBuf>,

    /// Keep only localities of this region (repeatable)
    #[arg(long = "region", value_name = "REGION")]
    regions: Vec<String>,

    /// Keep only localities of this country (repeatable)
    #[arg(long = "country", value_name = "COUNTRY")]
    countries: Vec<String>,

    /// Manual coordinates, e.g. "6.8399,13.2509, 6.4606,13.1184"
    #[arg(long, value_name = "PAIRS", conflicts_with_all = ["regions", "countries"])]
    coords: Option<String>,

    /// daily, seasonal or projection
    #[arg(long, default_value = "daily")]
    mode: ForecastMode,

    /// Horizon in days (daily: 1-14, seasonal: 45-270)
    #[arg(long)]
    days: Option<u32>,

    /// Seasonal preset: "45 days", "3 months", "6 months" or "9 months"
    #[arg(long)]
    season: Option<SeasonalLength>,

    /// First projected year
    #[arg(long)]
    start_year: Option<i32>,

    /// Last projected year
    #[arg(long)]
    end_year: Option<i32>,

    /// Climate model for projections
    #[arg(long)]
    model: Option<String>,

    /// Variables to fetch (default: all)
    #[arg(long, value_delimiter = ',', value_name = "temp_max,temp_min,precipitation")]
    variables: Vec<Variable>,

    /// Results file (default: onacc_forecast.<format>)
    #[arg(long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Failure report file
    #[arg(long, value_name = "FILE")]
    failures: Option<PathBuf>,

    /// Export format (csv, tsv or xlsx), overrides the config file
    #[arg(long)]
    format: Option<ExportFormat>,

    /// Configuration file (default: <config dir>/onacc/config.toml)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,
}

impl Cli {
    fn forecast_config(&self) -> Result<ForecastConfig> {
        let config = match self.mode {
            ForecastMode::Daily => ForecastConfig::daily(self.days.unwrap_or(DAILY_MAX_DAYS)),
            ForecastMode::Seasonal => {
                let days = match (self.season, self.days) {
                    (Some(_), Some(_)) => bail!("use either --season or --days, not both"),
                    (Some(season), None) => season.days(),
                    (None, Some(days)) => days,
                    (None, None) => SeasonalLength::ThreeMonths.days(),
                };
                ForecastConfig::seasonal(days)
            }
            ForecastMode::Projection => ForecastConfig::projection(
                self.start_year.unwrap_or(DEFAULT_PROJECTION_START),
                self.end_year.unwrap_or(PROJECTION_MAX_YEAR),
                self.model.clone(),
            ),
        };

        if self.variables.is_empty() {
            Ok(config)
        } else {
            Ok(config.with_variables(self.variables.clone()))
        }
    }

    fn filter(&self) -> LocalityFilter {
        LocalityFilter {
            regions: self.regions.iter().cloned().collect(),
            countries: self.countries.iter().cloned().collect(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    onacc_core::init();

    let (config, _) = Config::load_validated(cli.config.as_deref())
        .context("Failed to load configuration")?;
    let format = cli.format.unwrap_or(config.export.format);

    let selection = select_localities(&cli)?;
    let forecast = cli.forecast_config()?;
    tracing::info!(
        "Forecasting {} localities ({})",
        selection.len(),
        forecast.mode()
    );

    let client = ForecastClient::new(config.api.clone()).context("Failed to build HTTP client")?;
    let pipeline = Pipeline::new(client, &config.pipeline);

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, cancelling outstanding localities");
            on_interrupt.cancel();
        }
    });

    let outcome = pipeline
        .run(&selection, &forecast, &cancel)
        .await
        .context("Forecast run failed")?;

    let output = cli
        .output
        .clone()
        .unwrap_or_else(|| PathBuf::from(format!("{}.{}", DEFAULT_OUTPUT_STEM, format.extension())));
    let rows = write_results_to_path(&outcome, format, &output)
        .with_context(|| format!("Failed to write {}", output.display()))?;

    if let Some(path) = &cli.failures {
        write_failure_report(&outcome, format, path)?;
    }

    print_summary(&outcome, rows, &output);
    Ok(())
}

fn select_localities(cli: &Cli) -> Result<Vec<Locality>> {
    let table = match &cli.localities {
        Some(path) => {
            let report = LocalityTable::from_path(path)
                .with_context(|| format!("Failed to import {}", path.display()))?;
            for rejected in &report.rejected {
                tracing::warn!("{}: line {}: {}", path.display(), rejected.line, rejected.reason);
            }
            if report.skipped > 0 {
                tracing::info!("Skipped {} rows without coordinates", report.skipped);
            }
            tracing::info!("Loaded {} localities from {}", report.table.len(), path.display());
            report.table
        }
        None => LocalityTable::new(),
    };

    let selection = match &cli.coords {
        Some(raw) => {
            let pairs = parse_coordinates(raw).context("Invalid --coords")?;
            table
                .resolve_coordinates(&pairs)
                .context("Invalid --coords")?
        }
        None if cli.localities.is_some() => table.select(&cli.filter()),
        None => bail!("Nothing to forecast: pass --localities and/or --coords"),
    };

    if selection.is_empty() {
        bail!("No locality matches the requested regions/countries");
    }
    Ok(selection)
}

fn write_failure_report(outcome: &RunOutcome, format: ExportFormat, path: &Path) -> Result<()> {
    let file = File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    write_failures(outcome, format, BufWriter::new(file))
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

fn print_summary(outcome: &RunOutcome, rows: usize, output: &Path) {
    println!("Onacc {} forecast", outcome.mode);
    println!(
        "  {} localities forecast, {} rows written to {}",
        outcome.results.len(),
        rows,
        output.display()
    );

    if outcome.failures.is_empty() {
        return;
    }

    println!("  {} localities failed:", outcome.failures.len());
    for failure in outcome.failures.values() {
        println!(
            "    {} ({}): {} - {}",
            failure.locality.name(),
            failure.locality.country(),
            failure.kind,
            failure.message
        );
    }
}

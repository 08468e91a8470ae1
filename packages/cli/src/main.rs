#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI entry point for the attraction visitor and taxi comparison.
//!
//! Uses `indicatif-log-bridge` (via [`attraction_cli_utils::init_logger`])
//! to route `log` output through `indicatif::MultiProgress` so that log
//! lines and the step bar never fight for the terminal.

mod report;

use std::path::{Path, PathBuf};

use attraction_analytics::export::{write_block_zone_csv, write_csv, write_geojson};
use attraction_analytics::pipeline::load_geography;
use attraction_analytics::{RunConfig, presets, run_pipeline};
use attraction_cli_utils::IndicatifProgress;
use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "attraction",
    about = "Compare attraction visitors with taxi passengers per taxi zone"
)]
struct Cli {
    /// Directory that relative input paths are resolved against
    #[arg(long, env = "ATTRACTION_DATA_DIR", default_value = "data", global = true)]
    data_dir: PathBuf,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full comparison and write the configured outputs
    Run {
        #[command(flatten)]
        source: ConfigSource,
        /// Write the per-zone comparison as `GeoJSON` here (overrides the config)
        #[arg(long)]
        geojson: Option<PathBuf>,
        /// Write the per-zone comparison as CSV here (overrides the config)
        #[arg(long)]
        csv: Option<PathBuf>,
        /// Write block group assignments as CSV here (overrides the config)
        #[arg(long)]
        block_zones: Option<PathBuf>,
    },
    /// List the bundled presets
    Presets,
    /// Show the taxi zones that intersect the attraction
    Zones {
        #[command(flatten)]
        source: ConfigSource,
    },
    /// Assign block groups to taxi zones and write the mapping as CSV
    Assign {
        #[command(flatten)]
        source: ConfigSource,
        /// Output CSV path
        #[arg(long)]
        output: PathBuf,
    },
}

/// Which run definition to use.
#[derive(Args)]
struct ConfigSource {
    /// Bundled preset name (see `attraction presets`)
    #[arg(long, default_value = "astoria", conflicts_with = "config")]
    preset: String,
    /// Path to a TOML run definition
    #[arg(long)]
    config: Option<PathBuf>,
}

impl ConfigSource {
    fn load(&self, data_dir: &Path) -> Result<RunConfig, attraction_analytics::AnalyticsError> {
        let config = match &self.config {
            Some(path) => RunConfig::load(path)?,
            None => presets::preset(&self.preset)?,
        };
        log::info!(
            "Using run '{}' with data from {}",
            config.name,
            data_dir.display()
        );
        Ok(config.resolved(data_dir))
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = attraction_cli_utils::init_logger();
    let cli = Cli::parse();

    match cli.command {
        Commands::Presets => {
            for config in presets::all_presets()? {
                println!(
                    "{:<16} {}",
                    config.name,
                    config.description.as_deref().unwrap_or_default()
                );
            }
        }
        Commands::Zones { source } => {
            let config = source.load(&cli.data_dir)?;
            let geography = load_geography(&config)?;
            let zone_ids = geography.index.zones_intersecting(&geography.attraction)?;
            report::print_attraction_zones(&geography.zones, &zone_ids);
        }
        Commands::Assign { source, output } => {
            let config = source.load(&cli.data_dir)?;
            let geography = load_geography(&config)?;
            write_block_zone_csv(&output, &geography.block_zones)?;
            println!(
                "{} block groups assigned, {} unassigned",
                geography.block_zones.len(),
                geography.block_zones.unassigned().len()
            );
        }
        Commands::Run {
            source,
            geojson,
            csv,
            block_zones,
        } => {
            let mut config = source.load(&cli.data_dir)?;
            config.output.geojson = geojson.or(config.output.geojson);
            config.output.csv = csv.or(config.output.csv);
            config.output.block_zones = block_zones.or(config.output.block_zones);

            let progress = IndicatifProgress::steps_bar(&multi, &format!("Running {}", config.name));
            let output = run_pipeline(&config, &progress)?;

            if let Some(path) = &config.output.geojson {
                write_geojson(path, &output.comparisons, output.crs)?;
            }
            if let Some(path) = &config.output.csv {
                write_csv(path, &output.comparisons)?;
            }
            if let Some(path) = &config.output.block_zones {
                write_block_zone_csv(path, &output.block_zones)?;
            }

            report::print_comparison(&output.comparisons);
            report::print_summary(&output.summary);
        }
    }

    Ok(())
}

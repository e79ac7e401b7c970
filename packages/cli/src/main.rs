#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Command-line entry point for the collision toolchain.
//!
//! ```text
//! collision_map clean --data-dir data/ --out-dir cleaned/
//! collision_map hotspots --data-dir data/ [--config hotspots.toml]
//!     [--severity 1 --severity 2] [--year 2019] [--eps-meters 100]
//!     [--min-samples 25] [--top-k 10] [--out report.json]
//! collision_map decode --input cleaned/crashes.csv --out decoded.csv
//! ```
//!
//! `hotspots` exits with status 2 after writing its report when the
//! selection cannot support a density surface. Log verbosity follows
//! `RUST_LOG`.

use std::fs::File;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand, ValueEnum};
use collision_map_clean::{CrashCleanOptions, IndicatorMissing, clean_crashes, load_all_clean};
use collision_map_codebook::{DecodeMode, decode_table};
use collision_map_hotspots::{HotspotConfig, HotspotError, Selection};
use collision_map_table::Table;

#[derive(Parser)]
#[command(
    name = "collision_map",
    about = "Clean SWITRS collision records and find crash hot-spots"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Clean the crash, party, and victim tables and build the victim-level view
    Clean {
        /// Directory containing Crashes.csv, Parties.csv, and Victims.csv
        #[arg(long)]
        data_dir: PathBuf,
        /// Directory the cleaned CSVs and cleaning report are written to
        #[arg(long)]
        out_dir: PathBuf,
        #[command(flatten)]
        crash: CrashArgs,
    },
    /// Cluster crash locations and rank the clustered crashes
    Hotspots {
        /// Directory containing Crashes.csv
        #[arg(long)]
        data_dir: PathBuf,
        /// TOML config; flags below override its values
        #[arg(long)]
        config: Option<PathBuf>,
        /// Severity code to keep (0-4), repeatable
        #[arg(long)]
        severity: Vec<i64>,
        /// Accident year to keep (2014-2024), repeatable
        #[arg(long)]
        year: Vec<i64>,
        /// Neighborhood radius in meters
        #[arg(long)]
        eps_meters: Option<f64>,
        /// Minimum neighborhood size of a core point
        #[arg(long)]
        min_samples: Option<i64>,
        /// Number of groups to rank
        #[arg(long, allow_negative_numbers = true)]
        top_k: Option<i64>,
        /// Column the clustered crashes are ranked by
        #[arg(long)]
        group_by: Option<String>,
        /// Skip the density surface
        #[arg(long)]
        no_density: bool,
        /// Report path; printed to stdout when absent
        #[arg(long)]
        out: Option<PathBuf>,
        /// Also write the selected crashes with their cluster as CSV
        #[arg(long)]
        points_out: Option<PathBuf>,
        #[command(flatten)]
        crash: CrashArgs,
    },
    /// Add readable labels for coded columns
    Decode {
        /// CSV to decode
        #[arg(long)]
        input: PathBuf,
        /// Decoded CSV
        #[arg(long)]
        out: PathBuf,
        /// Replace codes in place instead of adding `_DESC` columns
        #[arg(long)]
        overwrite: bool,
    },
}

#[derive(clap::Args)]
struct CrashArgs {
    /// Keep crashes without a resolvable location
    #[arg(long)]
    keep_unlocated: bool,
    /// How missing involvement indicators are represented
    #[arg(long, value_enum, default_value_t = IndicatorArg::Preserve)]
    indicator_missing: IndicatorArg,
    /// Extra column never dropped as constant or sparse, repeatable
    #[arg(long)]
    exempt: Vec<String>,
}

#[derive(Clone, Copy, ValueEnum)]
enum IndicatorArg {
    Preserve,
    AsFalse,
}

impl CrashArgs {
    fn options(&self) -> CrashCleanOptions {
        let mut options = CrashCleanOptions {
            require_location: !self.keep_unlocated,
            indicator_missing: match self.indicator_missing {
                IndicatorArg::Preserve => IndicatorMissing::Preserve,
                IndicatorArg::AsFalse => IndicatorMissing::AsFalse,
            },
            ..CrashCleanOptions::default()
        };
        options.exempt_columns.extend(self.exempt.iter().cloned());
        options
    }
}

/// Flag values that take precedence over the config file.
struct Overrides {
    severity: Vec<i64>,
    year: Vec<i64>,
    eps_meters: Option<f64>,
    min_samples: Option<i64>,
    top_k: Option<i64>,
    group_by: Option<String>,
    no_density: bool,
}

impl Overrides {
    fn apply(self, mut config: HotspotConfig) -> HotspotConfig {
        if !self.severity.is_empty() {
            config.query.severity = Some(Selection::from(self.severity));
        }
        if !self.year.is_empty() {
            config.query.year = Some(Selection::from(self.year));
        }
        if let Some(eps_meters) = self.eps_meters {
            config.query.eps_meters = eps_meters;
        }
        if let Some(min_samples) = self.min_samples {
            config.query.min_samples = min_samples;
        }
        if let Some(top_k) = self.top_k {
            config.top_k = top_k;
        }
        if let Some(group_by) = self.group_by {
            config.group_by = group_by;
        }
        if self.no_density {
            config.density = false;
        }
        config
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    pretty_env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Clean {
            data_dir,
            out_dir,
            crash,
        } => clean(&data_dir, &out_dir, &crash.options())?,
        Commands::Hotspots {
            data_dir,
            config,
            severity,
            year,
            eps_meters,
            min_samples,
            top_k,
            group_by,
            no_density,
            out,
            points_out,
            crash,
        } => {
            let base = match config {
                Some(path) => HotspotConfig::from_path(&path)?,
                None => HotspotConfig::default(),
            };
            let config = Overrides {
                severity,
                year,
                eps_meters,
                min_samples,
                top_k,
                group_by,
                no_density,
            }
            .apply(base);
            hotspots(
                &data_dir,
                &config,
                &crash.options(),
                out.as_deref(),
                points_out.as_deref(),
            )?;
        }
        Commands::Decode {
            input,
            out,
            overwrite,
        } => {
            let mode = if overwrite {
                DecodeMode::Overwrite
            } else {
                DecodeMode::NewColumns
            };
            let decoded = decode_table(&Table::from_csv_path(&input)?, mode)?;
            decoded.write_csv(File::create(&out)?)?;
            log::info!("Wrote decoded table to {}", out.display());
        }
    }

    Ok(())
}

fn clean(
    data_dir: &Path,
    out_dir: &Path,
    options: &CrashCleanOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    let dataset = load_all_clean(data_dir, options)?;
    std::fs::create_dir_all(out_dir)?;

    for (name, table) in [
        ("crashes.csv", &dataset.crashes),
        ("parties.csv", &dataset.parties),
        ("victims.csv", &dataset.victims),
        ("victim_level.csv", &dataset.victim_level),
    ] {
        table.write_csv(File::create(out_dir.join(name))?)?;
        log::info!("Wrote {} rows to {name}", table.row_count());
    }

    let report_path = out_dir.join("cleaning_report.json");
    serde_json::to_writer_pretty(File::create(&report_path)?, &dataset.report)?;
    println!(
        "Cleaned {} crashes, {} parties, {} victims ({} warnings, see {})",
        dataset.crashes.row_count(),
        dataset.parties.row_count(),
        dataset.victims.row_count(),
        dataset.report.len(),
        report_path.display()
    );
    Ok(())
}

fn hotspots(
    data_dir: &Path,
    config: &HotspotConfig,
    options: &CrashCleanOptions,
    out: Option<&Path>,
    points_out: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let raw = Table::from_csv_path(&data_dir.join("Crashes.csv"))?;
    let cleaned = clean_crashes(&raw, options)?;

    let report = collision_map_hotspots::run(&cleaned.table, config)?;

    let json = report.to_json_pretty()?;
    match out {
        Some(path) => {
            std::fs::write(path, json)?;
            log::info!("Wrote hot-spot report to {}", path.display());
        }
        None => println!("{json}"),
    }

    if let Some(path) = points_out {
        report.labeled.write_csv(File::create(path)?)?;
        log::info!("Wrote labeled crashes to {}", path.display());
    }

    if let Err(HotspotError::DegenerateInput(e)) = report.density_outcome() {
        eprintln!("{e}");
        eprintln!("Widen the severity/year selection or pass --no-density.");
        std::process::exit(2);
    }

    Ok(())
}

//! gtapflow CLI: run the pipeline, check a region mapping, write a starter config.
//!
//! Commands:
//! - `run`: fetch sources, fill, balance and aggregate every configured flow
//! - `check-mapping`: load a mapping and order file and report problems
//! - `init-config`: write the standard four-flow configuration as TOML

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use gtapflow_core::data::{CsvMappingSource, MappingSource};
use gtapflow_runner::{
    load_mapping, run_pipeline, CsvReportSink, PipelineConfig, PipelineOutput, ReportSink,
    RunManifest, Sources,
};

#[derive(Parser)]
#[command(
    name = "gtapflow",
    version,
    about = "Fill, balance and aggregate bilateral flows to GTAP regions"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run every configured flow for one year and write the report.
    Run {
        /// Path to the pipeline TOML config.
        #[arg(long)]
        config: PathBuf,

        /// Override the configured year.
        #[arg(long)]
        year: Option<i32>,

        /// Override the configured version label.
        #[arg(long)]
        version: Option<String>,

        /// Override the configured output directory.
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },
    /// Load a region mapping and report conflicts and coverage.
    CheckMapping {
        /// `economy,Regions[,longnames]` CSV.
        #[arg(long)]
        mapping: PathBuf,

        /// Single-column `Regions` CSV with the canonical order.
        #[arg(long)]
        order: Option<PathBuf>,
    },
    /// Write the standard configuration to a file.
    InitConfig {
        /// Where to write the config.
        #[arg(long, default_value = "pipeline.toml")]
        path: PathBuf,

        /// Overwrite an existing file.
        #[arg(long, default_value_t = false)]
        force: bool,
    },
}

fn main() -> Result<()> {
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder().with_env_filter(env).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            year,
            version,
            output_dir,
        } => run_cmd(&config, year, version, output_dir),
        Commands::CheckMapping { mapping, order } => check_mapping_cmd(mapping, order),
        Commands::InitConfig { path, force } => init_config_cmd(&path, force),
    }
}

fn run_cmd(
    config_path: &Path,
    year: Option<i32>,
    version: Option<String>,
    output_dir: Option<PathBuf>,
) -> Result<()> {
    let mut config = PipelineConfig::from_file(config_path)
        .with_context(|| format!("failed to load config {}", config_path.display()))?;
    if let Some(year) = year {
        config.year = year;
    }
    if let Some(version) = version {
        config.version = version;
    }
    if let Some(dir) = output_dir {
        config.output_dir = dir;
    }
    config.validate().context("invalid config after CLI overrides")?;

    let mapping = load_mapping(&config).context("failed to load region mapping")?;
    let sources = Sources::from_config(&config).context("failed to set up data sources")?;
    let output = run_pipeline(&config, &sources, &mapping)?;

    print_summary(&output);

    let manifest = RunManifest::new(&output, chrono::Utc::now());
    let run_dir = CsvReportSink::new(&config.output_dir).write(&output, &manifest)?;
    println!("Report saved to: {}", run_dir.display());

    Ok(())
}

fn print_summary(output: &PipelineOutput) {
    println!();
    println!("=== gtapflow {} {} ===", output.version, output.year);
    println!("Dataset hash:  {}", output.dataset_hash);
    println!(
        "GDP filled:    {} entities ({} unfillable)",
        output.gdp_fill.filled.len(),
        output.gdp_fill.unfillable.len()
    );
    println!();
    println!(
        "{:<16} {:>12} {:>16} {:>16} {:>8}",
        "flow", "paid/rec", "paid", "rec", "clamped"
    );
    for flow in &output.flows {
        println!(
            "{:<16} {:>12.4} {:>16.2} {:>16.2} {:>8}",
            flow.kind.as_str(),
            flow.scale_factor,
            flow.paid.total(),
            flow.rec.total(),
            flow.paid_clamped + flow.rec_clamped
        );
    }
    println!();
}

fn check_mapping_cmd(mapping_path: PathBuf, order_path: Option<PathBuf>) -> Result<()> {
    let mapping_label = mapping_path.display().to_string();
    let mapping = CsvMappingSource::new(mapping_path, order_path)
        .load()
        .with_context(|| format!("mapping {mapping_label} is invalid"))?;

    println!("Entities:        {}", mapping.entity_count());
    println!("Regions (order): {}", mapping.order().len());

    let outside = mapping.regions_outside_order();
    let empty = mapping.empty_regions();
    if !empty.is_empty() {
        let labels: Vec<&str> = empty.iter().map(|r| r.as_str()).collect();
        println!("Regions with no entity (report zero): {}", labels.join(", "));
    }
    if !outside.is_empty() {
        let labels: Vec<&str> = outside.iter().map(|r| r.as_str()).collect();
        bail!(
            "mapped regions missing from the canonical order: {}",
            labels.join(", ")
        );
    }
    info!(mapping = %mapping_label, "mapping ok");
    println!("Mapping OK");
    Ok(())
}

fn init_config_cmd(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }
    let text = PipelineConfig::default_gtap().to_toml()?;
    std::fs::write(path, text).with_context(|| format!("failed to write {}", path.display()))?;
    println!("Wrote {}", path.display());
    Ok(())
}

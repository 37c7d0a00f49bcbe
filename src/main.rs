use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::{NaiveDate, Utc};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use signal_fusion::{dataset, report, BaselineTable, EstimatorConfig, Pipeline};

#[derive(Parser)]
#[command(name = "signal-fusion")]
#[command(about = "Estimate establishment headcount and operating status from external signals")]
#[command(long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct EstimatorArgs {
    /// JSON industry baseline table (defaults to the built-in table)
    #[arg(long)]
    baselines: Option<PathBuf>,
    /// JSON estimator configuration overrides
    #[arg(long)]
    config: Option<PathBuf>,
    /// Date recency is measured against (defaults to today, UTC)
    #[arg(long)]
    as_of: Option<NaiveDate>,
}

#[derive(Subcommand)]
enum Commands {
    /// Assess every establishment in a CSV and write the results as CSV
    Estimate {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        out: PathBuf,
        #[command(flatten)]
        estimator: EstimatorArgs,
    },
    /// Generate a markdown report
    Report {
        #[arg(long)]
        input: PathBuf,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
        #[arg(long)]
        label: Option<String>,
        #[arg(long, default_value_t = 10)]
        limit: usize,
        #[command(flatten)]
        estimator: EstimatorArgs,
    },
    /// Print the effective industry baseline table
    Baselines {
        #[arg(long)]
        baselines: Option<PathBuf>,
    },
}

fn load_baselines(path: Option<&Path>) -> anyhow::Result<BaselineTable> {
    match path {
        Some(path) => BaselineTable::from_path(path)
            .with_context(|| format!("failed to load baselines from {}", path.display())),
        None => Ok(BaselineTable::default()),
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<EstimatorConfig> {
    match path {
        Some(path) => EstimatorConfig::from_path(path)
            .with_context(|| format!("failed to load config from {}", path.display())),
        None => Ok(EstimatorConfig::default()),
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Estimate {
            input,
            out,
            estimator,
        } => {
            let baselines = load_baselines(estimator.baselines.as_deref())?;
            let config = load_config(estimator.config.as_deref())?;
            let as_of = estimator.as_of.unwrap_or_else(|| Utc::now().date_naive());

            let items = dataset::read_establishments(&input)?;
            let assessments = Pipeline::new(&baselines, &config, as_of).run_lenient(&items);
            dataset::write_assessments(&out, &assessments)?;

            println!(
                "Assessed {} of {} establishments into {}.",
                assessments.len(),
                items.len(),
                out.display()
            );
        }
        Commands::Report {
            input,
            out,
            label,
            limit,
            estimator,
        } => {
            let baselines = load_baselines(estimator.baselines.as_deref())?;
            let config = load_config(estimator.config.as_deref())?;
            let as_of = estimator.as_of.unwrap_or_else(|| Utc::now().date_naive());

            let items = dataset::read_establishments(&input)?;
            let assessments = Pipeline::new(&baselines, &config, as_of).run_lenient(&items);
            let skipped = items.len() - assessments.len();
            let report =
                report::build_report(label.as_deref(), as_of, &assessments, skipped, limit);
            std::fs::write(&out, report)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Report written to {}.", out.display());
        }
        Commands::Baselines { baselines } => {
            let table = load_baselines(baselines.as_deref())?;
            println!("{}", table.to_json_pretty()?);
        }
    }

    Ok(())
}

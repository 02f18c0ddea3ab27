#[macro_use]
extern crate log;

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::Context;
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use healthexport::{DEFAULT_RAW_KEY, ExtractionMode, HealthPipeline, PipelineConfig};
use healthexport_store::{BlobStore, StoreHandle};
use healthexport_types::MetricKind;
use indicatif::{ProgressBar, ProgressStyle};
use strum::IntoEnumIterator;

#[derive(Parser)]
pub struct HealthExportCli {
    /// `memory:`, a directory, `file://<dir>`, `sqlite:<path>` or `postgres://...`
    #[arg(env, long)]
    pub store_url: String,
    #[arg(env, long, default_value = DEFAULT_RAW_KEY)]
    pub raw_key: String,
    #[arg(env, long, default_value_t = ExtractionMode::SinglePass)]
    pub extraction_mode: ExtractionMode,
    /// Comma separated metrics to process, all of them when empty
    #[arg(env, long, value_delimiter = ',')]
    pub metrics: Vec<MetricKind>,
    #[clap(subcommand)]
    pub subcommand: HealthExportCommand,
}

#[derive(Subcommand)]
pub enum HealthExportCommand {
    ///
    /// Extract the raw export and build the daily datasets
    ///
    Run,
    ///
    /// Only write the intermediate tables
    ///
    Extract,
    ///
    /// Build the daily datasets from intermediate tables already in the store
    ///
    Transform,
    ///
    /// Upload a local export.xml under the raw key
    ///
    Import { file: PathBuf },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(error) = dotenv() {
        println!("{}", error);
    }

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .filter_module("sqlx::query", log::LevelFilter::Off)
        .filter_module("sea_orm_migration::migrator", log::LevelFilter::Off)
        .init();

    let cli = HealthExportCli::parse();
    let store = StoreHandle::open(&cli.store_url).await?;

    let metrics = if cli.metrics.is_empty() {
        MetricKind::iter().collect()
    } else {
        cli.metrics
    };
    let config = PipelineConfig {
        raw_key: cli.raw_key,
        mode: cli.extraction_mode,
        metrics,
    };

    let result = execute(&store, config, cli.subcommand).await;
    store.close().await?;
    result
}

async fn execute(
    store: &StoreHandle,
    config: PipelineConfig,
    command: HealthExportCommand,
) -> anyhow::Result<()> {
    let pipeline = HealthPipeline::new(store, config);

    let outcome = match command {
        HealthExportCommand::Import { file } => {
            return import(store, &pipeline.config().raw_key, &file).await;
        }
        HealthExportCommand::Run => pipeline.with_progress(spinner()?).run().await,
        HealthExportCommand::Extract => pipeline.with_progress(spinner()?).extract().await,
        HealthExportCommand::Transform => pipeline.transform().await,
    };

    match outcome {
        Ok(report) => {
            println!("{report}");
            Ok(())
        }
        Err(failure) => {
            for summary in &failure.completed {
                println!("{summary}");
            }
            Err(failure.into())
        }
    }
}

async fn import(store: &StoreHandle, key: &str, file: &Path) -> anyhow::Result<()> {
    let bytes = tokio::fs::read(file)
        .await
        .with_context(|| format!("reading {}", file.display()))?;

    info!("Writing to store: {key}");
    store.put(key, bytes).await?;
    info!("Upload completed for {key}");
    Ok(())
}

fn spinner() -> anyhow::Result<ProgressBar> {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::with_template(
        "{spinner:.cyan} {pos} records scanned ({elapsed})",
    )?);
    spinner.enable_steady_tick(Duration::from_millis(120));
    Ok(spinner)
}

use std::collections::BTreeSet;
use std::io::Cursor;
use std::time::Instant;

use healthexport_algos::{
    MetricFilterAggregator, SleepIntervalMerger, TransformStats, helpers::time_math::round_float,
};
use healthexport_codec::{
    ExtractOutcome, Extraction, MetricStats, StreamExtractor,
    table::{TableWriter, decode_rows, encode_aggregates, encode_rows},
};
use healthexport_store::BlobStore;
use healthexport_types::{DailyAggregate, MetricDescriptor, MetricKind, RowTable, Transform};
use indicatif::ProgressBar;
use strum::{Display, EnumString, IntoEnumIterator};

use crate::{
    MetricSummary, PipelineCause, PipelineError, PipelineFailure, RunReport, Stage,
    error::failed,
};

pub const DEFAULT_RAW_KEY: &str = "iwatch_health_export/export.xml";

/// How the raw export is traversed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "kebab-case")]
pub enum ExtractionMode {
    /// One traversal feeding every metric.
    #[default]
    SinglePass,
    /// One traversal per metric, each over a freshly fetched export.
    PerMetric,
}

#[derive(Clone, Debug, PartialEq)]
pub struct PipelineConfig {
    pub raw_key: String,
    pub mode: ExtractionMode,
    /// Processed in this order. A metric listed twice runs once.
    pub metrics: Vec<MetricKind>,
}

impl PipelineConfig {
    /// Configured metrics in order, first occurrence only.
    pub fn unique_metrics(&self) -> Vec<MetricKind> {
        let mut seen = BTreeSet::new();
        self.metrics
            .iter()
            .copied()
            .filter(|kind| seen.insert(*kind))
            .collect()
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            raw_key: DEFAULT_RAW_KEY.to_owned(),
            mode: ExtractionMode::default(),
            metrics: MetricKind::iter().collect(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Scope {
    Full,
    ExtractOnly,
    TransformOnly,
}

impl Scope {
    fn extracts(self) -> bool {
        matches!(self, Scope::Full | Scope::ExtractOnly)
    }

    fn transforms(self) -> bool {
        matches!(self, Scope::Full | Scope::TransformOnly)
    }
}

/// Turns a raw health export into daily datasets.
///
/// The store is borrowed for the duration of a run; opening and closing it
/// is up to the caller.
pub struct HealthPipeline<'a, S> {
    store: &'a S,
    config: PipelineConfig,
    progress: Option<ProgressBar>,
}

impl<'a, S: BlobStore> HealthPipeline<'a, S> {
    pub fn new(store: &'a S, config: PipelineConfig) -> Self {
        Self {
            store,
            config,
            progress: None,
        }
    }

    /// Reports the number of scanned records to `progress` while extracting
    /// and clears it once the run is over.
    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Extracts every configured metric and transforms it into its final
    /// dataset. Stops at the first fatal error.
    pub async fn run(&self) -> Result<RunReport, PipelineFailure> {
        self.execute(Scope::Full).await
    }

    /// Writes the intermediate tables only.
    pub async fn extract(&self) -> Result<RunReport, PipelineFailure> {
        self.execute(Scope::ExtractOnly).await
    }

    /// Builds the final datasets from intermediate tables already in the
    /// store.
    pub async fn transform(&self) -> Result<RunReport, PipelineFailure> {
        self.execute(Scope::TransformOnly).await
    }

    async fn execute(&self, scope: Scope) -> Result<RunReport, PipelineFailure> {
        let started = Instant::now();
        let mut completed = Vec::new();
        let result = self.run_metrics(scope, &mut completed).await;
        let elapsed = started.elapsed();
        let seconds = round_float(elapsed.as_secs_f64());
        if let Some(progress) = &self.progress {
            progress.finish_and_clear();
        }

        match result {
            Ok(()) => {
                info!("Job complete in {seconds} seconds");
                Ok(RunReport { completed, elapsed })
            }
            Err(error) => {
                error!("Job failed after {seconds} seconds: {error}");
                Err(PipelineFailure {
                    error,
                    completed,
                    elapsed,
                })
            }
        }
    }

    async fn run_metrics(
        &self,
        scope: Scope,
        completed: &mut Vec<MetricSummary>,
    ) -> Result<(), PipelineError> {
        let mut extraction = match (scope.extracts(), self.config.mode) {
            (true, ExtractionMode::SinglePass) => Some(self.extract_all().await?),
            _ => None,
        };

        // a single-pass extraction hands each table out once
        for kind in self.config.unique_metrics() {
            let descriptor = kind.descriptor();
            let mut summary = MetricSummary::new(kind);

            if scope.extracts() {
                let (bytes, stats) = match extraction.as_mut() {
                    Some(extraction) => Self::encode_extracted(extraction, descriptor)?,
                    None => self.extract_metric(descriptor).await?,
                };
                self.store_intermediate(descriptor, bytes, stats.rows).await?;
                summary.extracted = Some(stats);
            }

            if scope.transforms() {
                let table = self.load_intermediate(descriptor).await?;
                summary.transformed = Some(self.transform_metric(descriptor, &table).await?);
            }

            completed.push(summary);
        }

        Ok(())
    }

    async fn fetch(&self, metric: Option<MetricKind>) -> Result<Vec<u8>, PipelineError> {
        let key = &self.config.raw_key;
        info!("Read File: {key}");
        self.store
            .get(key)
            .await
            .map_err(failed(Stage::Fetch, metric))
    }

    fn tick(&self, records: u64) {
        if let Some(progress) = &self.progress {
            progress.set_position(records);
        }
    }

    async fn extract_all(&self) -> Result<Extraction, PipelineError> {
        let raw = self.fetch(None).await?;
        let extraction =
            StreamExtractor::extract_all_with_progress(Cursor::new(raw.as_slice()), |records| {
                self.tick(records)
            })
            .map_err(failed(Stage::Extract, None))?;

        let stats = extraction.stats;
        info!(
            "Scanned {} records, {} rows extracted, {} skipped",
            stats.records, stats.rows, stats.skipped
        );
        Ok(extraction)
    }

    fn encode_extracted(
        extraction: &mut Extraction,
        descriptor: &'static MetricDescriptor,
    ) -> Result<(Vec<u8>, MetricStats), PipelineError> {
        let table = extraction.take(descriptor.kind);
        let stats = extraction
            .per_metric
            .get(&descriptor.kind)
            .copied()
            .unwrap_or_default();
        let bytes = encode_rows(descriptor, &table)
            .map_err(failed(Stage::StoreIntermediate, Some(descriptor.kind)))?;
        Ok((bytes, stats))
    }

    /// Streams one metric's rows straight into its intermediate table.
    async fn extract_metric(
        &self,
        descriptor: &'static MetricDescriptor,
    ) -> Result<(Vec<u8>, MetricStats), PipelineError> {
        let kind = descriptor.kind;
        let raw = self.fetch(Some(kind)).await?;

        let mut writer =
            TableWriter::new(descriptor).map_err(failed(Stage::StoreIntermediate, Some(kind)))?;
        let mut stats = MetricStats::default();
        let mut stream = StreamExtractor::pass(Cursor::new(raw.as_slice()), kind);

        while let Some(outcome) = stream.next() {
            match outcome.map_err(failed(Stage::Extract, Some(kind)))? {
                ExtractOutcome::Row(row) => {
                    writer
                        .write(&row)
                        .map_err(failed(Stage::StoreIntermediate, Some(kind)))?;
                    stats.rows += 1;
                }
                ExtractOutcome::Skipped { .. } => stats.skipped += 1,
            }
            self.tick(stream.stats().records);
        }

        let (bytes, _) = writer
            .finish()
            .map_err(failed(Stage::StoreIntermediate, Some(kind)))?;
        Ok((bytes, stats))
    }

    async fn store_intermediate(
        &self,
        descriptor: &MetricDescriptor,
        bytes: Vec<u8>,
        rows: u64,
    ) -> Result<(), PipelineError> {
        let key = descriptor.intermediate_key;
        info!("Writing to store: {key}");
        self.store
            .put(key, bytes)
            .await
            .map_err(failed(Stage::StoreIntermediate, Some(descriptor.kind)))?;
        info!("Done writing {rows} rows to {key}");
        Ok(())
    }

    async fn load_intermediate(
        &self,
        descriptor: &MetricDescriptor,
    ) -> Result<RowTable, PipelineError> {
        let key = descriptor.intermediate_key;
        let metric = Some(descriptor.kind);

        info!("Read File: {key}");
        let bytes = self
            .store
            .get(key)
            .await
            .map_err(failed(Stage::LoadIntermediate, metric))?;
        let table =
            decode_rows(descriptor, &bytes).map_err(failed(Stage::LoadIntermediate, metric))?;
        info!("Loaded {} rows from {key}", table.len());
        Ok(table)
    }

    async fn transform_metric(
        &self,
        descriptor: &MetricDescriptor,
        table: &RowTable,
    ) -> Result<TransformStats, PipelineError> {
        let kind = descriptor.kind;
        info!("Transforming {kind}");
        let (rows, stats) =
            transform_table(descriptor, table).map_err(failed(Stage::Transform, Some(kind)))?;
        debug!("{kind}: {stats}");

        let key = descriptor.final_key();
        let bytes =
            encode_aggregates(descriptor, &rows).map_err(failed(Stage::StoreFinal, Some(kind)))?;
        self.store
            .put(&key, bytes)
            .await
            .map_err(failed(Stage::StoreFinal, Some(kind)))?;
        info!("Upload completed for {key}");
        Ok(stats)
    }
}

/// Applies the metric's transform to its intermediate table.
pub fn transform_table(
    descriptor: &MetricDescriptor,
    table: &RowTable,
) -> Result<(Vec<DailyAggregate>, TransformStats), PipelineCause> {
    let transformed = match table {
        RowTable::Samples(rows) => {
            MetricFilterAggregator::for_metric(descriptor).map(|agg| agg.aggregate(rows))
        }
        RowTable::Sessions(rows) => matches!(descriptor.transform, Transform::MergeIntervals)
            .then(|| SleepIntervalMerger::aggregate(rows)),
    };
    transformed.ok_or(PipelineCause::ShapeMismatch(descriptor.kind))
}

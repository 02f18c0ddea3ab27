use healthexport_codec::{ExtractError, TableError};
use healthexport_store::StoreError;
use healthexport_types::MetricKind;
use strum::Display;
use thiserror::Error;

/// Steps of the pipeline, in the order a metric goes through them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Display)]
#[strum(serialize_all = "kebab-case")]
pub enum Stage {
    Fetch,
    Extract,
    StoreIntermediate,
    LoadIntermediate,
    Transform,
    StoreFinal,
}

#[derive(Debug, Error)]
pub enum PipelineCause {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Extract(#[from] ExtractError),
    #[error(transparent)]
    Table(#[from] TableError),
    #[error("row table doesn't fit the {0} transform")]
    ShapeMismatch(MetricKind),
}

/// A fatal error, tagged with where it happened.
#[derive(Debug, Error)]
#[error("{stage} stage failed{}: {source}", for_metric(.metric))]
pub struct PipelineError {
    pub stage: Stage,
    /// `None` when the stage serves every metric at once.
    pub metric: Option<MetricKind>,
    #[source]
    pub source: PipelineCause,
}

fn for_metric(metric: &Option<MetricKind>) -> String {
    metric.map(|m| format!(" for {m}")).unwrap_or_default()
}

impl PipelineError {
    pub fn new(stage: Stage, metric: Option<MetricKind>, source: impl Into<PipelineCause>) -> Self {
        Self {
            stage,
            metric,
            source: source.into(),
        }
    }
}

/// `map_err` adapter tagging an error with its stage and metric.
pub(crate) fn failed<E>(stage: Stage, metric: Option<MetricKind>) -> impl FnOnce(E) -> PipelineError
where
    E: Into<PipelineCause>,
{
    move |error| PipelineError::new(stage, metric, error)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_names_stage_metric_and_cause() {
        let error = PipelineError::new(
            Stage::StoreFinal,
            Some(MetricKind::Sleep),
            StoreError::NotFound("transformed/sleep/sleep.csv".into()),
        );
        assert_eq!(
            error.to_string(),
            "store-final stage failed for sleep: no blob stored under `transformed/sleep/sleep.csv`"
        );
    }

    #[test]
    fn message_without_metric() {
        let error = PipelineError::new(
            Stage::Fetch,
            None,
            StoreError::NotFound("iwatch_health_export/export.xml".into()),
        );
        assert!(error.to_string().starts_with("fetch stage failed: "));
    }
}

use std::fmt;
use std::time::Duration;

use healthexport_algos::{TransformStats, helpers::time_math::round_float};
use healthexport_codec::MetricStats;
use healthexport_types::MetricKind;
use thiserror::Error;

use crate::PipelineError;

/// What happened to one metric during a run.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricSummary {
    pub kind: MetricKind,
    pub extracted: Option<MetricStats>,
    pub transformed: Option<TransformStats>,
}

impl MetricSummary {
    pub fn new(kind: MetricKind) -> Self {
        Self {
            kind,
            extracted: None,
            transformed: None,
        }
    }
}

impl fmt::Display for MetricSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "  {}", self.kind)?;
        if let Some(extracted) = self.extracted {
            write!(
                f,
                ": extracted {} rows ({} skipped)",
                extracted.rows, extracted.skipped
            )?;
        }
        if let Some(transformed) = self.transformed {
            let sep = if self.extracted.is_some() { "," } else { ":" };
            write!(f, "{sep} transformed {transformed}")?;
        }
        Ok(())
    }
}

fn seconds(elapsed: &Duration) -> f64 {
    round_float(elapsed.as_secs_f64())
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub completed: Vec<MetricSummary>,
    pub elapsed: Duration,
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Job complete in {} seconds:", seconds(&self.elapsed))?;
        for (i, summary) in self.completed.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{summary}")?;
        }
        Ok(())
    }
}

/// A run stopped by `error`, with the metrics that finished before it.
#[derive(Debug, Error)]
#[error("{error} (after {} seconds, {} metrics completed)", seconds(.elapsed), .completed.len())]
pub struct PipelineFailure {
    #[source]
    pub error: PipelineError,
    pub completed: Vec<MetricSummary>,
    pub elapsed: Duration,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_lists_metrics() {
        let report = RunReport {
            completed: vec![
                MetricSummary {
                    kind: MetricKind::HeartRate,
                    extracted: Some(MetricStats { rows: 4, skipped: 1 }),
                    transformed: Some(TransformStats {
                        rows: 4,
                        rejected: 2,
                        days: 1,
                    }),
                },
                MetricSummary::new(MetricKind::Steps),
            ],
            elapsed: Duration::from_millis(1_234),
        };

        assert_eq!(
            report.to_string(),
            "Job complete in 1.23 seconds:\n  heart_rate: extracted 4 rows (1 skipped), transformed 4 rows, 2 rejected, 1 days\n  steps"
        );
    }
}

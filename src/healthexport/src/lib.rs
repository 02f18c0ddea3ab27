#[macro_use]
extern crate log;

mod error;
pub use error::{PipelineCause, PipelineError, Stage};

mod report;
pub use report::{MetricSummary, PipelineFailure, RunReport};

mod pipeline;
pub use pipeline::{DEFAULT_RAW_KEY, ExtractionMode, HealthPipeline, PipelineConfig, transform_table};

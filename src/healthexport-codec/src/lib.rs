#[macro_use]
extern crate log;

mod error;
pub use error::{ExtractError, SkipReason, TableError};

mod record;
pub use record::{RawRecord, project};

mod extract;
pub use extract::{
    ExtractOutcome, Extraction, ExtractionStats, MetricStats, RecordStream, StreamExtractor,
};

pub mod table;

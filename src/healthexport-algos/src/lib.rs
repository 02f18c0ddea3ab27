pub(crate) mod aggregate;
pub use aggregate::{DailyAccumulator, MetricFilterAggregator};

pub(crate) mod sleep_merge;
pub use sleep_merge::{SleepInterval, SleepIntervalMerger, SleepSession};

pub(crate) mod stats;
pub use stats::TransformStats;

pub mod helpers;

mod metric;
pub use metric::*;

mod rows;
pub use rows::{ProjectedRow, RowTable, SampleRow, SessionRow};

mod aggregate;
pub use aggregate::{AggregateValue, DailyAggregate};

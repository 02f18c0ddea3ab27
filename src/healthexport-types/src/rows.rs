use serde::{Deserialize, Serialize};

use crate::MetricKind;

/// A timestamped sample: heart rate, respiration rate or step count.
///
/// Fields hold the attribute strings exactly as they appeared in the export,
/// parsing is left to the transform stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleRow {
    pub created_at: String,
    pub value: String,
}

/// A sleep session as reported by the device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRow {
    pub created_at: String,
    pub start_date: String,
    pub end_date: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProjectedRow {
    Sample(SampleRow),
    Session(SessionRow),
}

impl ProjectedRow {
    pub fn fields(&self) -> Vec<&str> {
        match self {
            ProjectedRow::Sample(row) => vec![&row.created_at, &row.value],
            ProjectedRow::Session(row) => vec![&row.created_at, &row.start_date, &row.end_date],
        }
    }
}

/// Intermediate rows of a single metric.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowTable {
    Samples(Vec<SampleRow>),
    Sessions(Vec<SessionRow>),
}

impl RowTable {
    pub fn empty_for(kind: MetricKind) -> Self {
        match kind.descriptor().projection {
            crate::Projection::Sample => RowTable::Samples(Vec::new()),
            crate::Projection::Session => RowTable::Sessions(Vec::new()),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            RowTable::Samples(rows) => rows.len(),
            RowTable::Sessions(rows) => rows.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Appends a row, returning it back if its shape doesn't fit the table.
    pub fn push(&mut self, row: ProjectedRow) -> Result<(), ProjectedRow> {
        match (self, row) {
            (RowTable::Samples(rows), ProjectedRow::Sample(row)) => rows.push(row),
            (RowTable::Sessions(rows), ProjectedRow::Session(row)) => rows.push(row),
            (_, row) => return Err(row),
        }
        Ok(())
    }

    pub fn iter(&self) -> Box<dyn Iterator<Item = ProjectedRow> + '_> {
        match self {
            RowTable::Samples(rows) => Box::new(rows.iter().cloned().map(ProjectedRow::Sample)),
            RowTable::Sessions(rows) => {
                Box::new(rows.iter().cloned().map(ProjectedRow::Session))
            }
        }
    }
}

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AggregateValue {
    Integer(i64),
    Float(f64),
}

impl AggregateValue {
    pub fn as_f64(self) -> f64 {
        match self {
            AggregateValue::Integer(v) => v as f64,
            AggregateValue::Float(v) => v,
        }
    }
}

impl std::fmt::Display for AggregateValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AggregateValue::Integer(v) => write!(f, "{v}"),
            AggregateValue::Float(v) => write!(f, "{v}"),
        }
    }
}

/// One summarized value per calendar date.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DailyAggregate {
    pub created_at: NaiveDate,
    pub value: AggregateValue,
    pub year: i32,
    pub month: u32,
    pub day: u32,
}

impl DailyAggregate {
    pub fn new(created_at: NaiveDate, value: AggregateValue) -> Self {
        Self {
            created_at,
            value,
            year: created_at.year(),
            month: created_at.month(),
            day: created_at.day(),
        }
    }
}

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

pub const CREATION_DATE: &str = "creationDate";
pub const START_DATE: &str = "startDate";
pub const END_DATE: &str = "endDate";
pub const VALUE: &str = "value";

/// The four datasets produced from a health export.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Display, EnumIter, EnumString,
    Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    HeartRate,
    Respiration,
    Steps,
    Sleep,
}

/// How a matching record is turned into an intermediate row.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Projection {
    /// `creationDate` + `value`
    Sample,
    /// `creationDate` + `startDate` + `endDate`
    Session,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ValidityBound {
    /// Both ends inclusive.
    Closed { min: f64, max: f64 },
    /// Upper end inclusive, no lower bound.
    AtMost(f64),
}

impl ValidityBound {
    pub fn contains(&self, value: f64) -> bool {
        match *self {
            ValidityBound::Closed { min, max } => value >= min && value <= max,
            ValidityBound::AtMost(max) => value <= max,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Reduction {
    Mean,
    Sum,
}

/// Column type of the aggregated value in the final dataset.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ValueType {
    Float,
    Integer,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Transform {
    Aggregate {
        bound: ValidityBound,
        reduction: Reduction,
    },
    MergeIntervals,
}

/// Everything the pipeline needs to know about one metric.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MetricDescriptor {
    pub kind: MetricKind,
    /// Value of the `type` attribute on matching `Record` elements.
    pub record_type: &'static str,
    pub projection: Projection,
    pub intermediate_key: &'static str,
    pub intermediate_header: &'static [&'static str],
    /// Partition name of the final dataset.
    pub dataset: &'static str,
    pub value_column: &'static str,
    pub value_type: ValueType,
    pub transform: Transform,
}

pub const HEART_RATE: MetricDescriptor = MetricDescriptor {
    kind: MetricKind::HeartRate,
    record_type: "HKQuantityTypeIdentifierHeartRate",
    projection: Projection::Sample,
    intermediate_key: "processed/Heart_Data.csv",
    intermediate_header: &["created_at", "value"],
    dataset: "heart",
    value_column: "avg_heart_rate",
    value_type: ValueType::Float,
    transform: Transform::Aggregate {
        bound: ValidityBound::Closed {
            min: 30.0,
            max: 220.0,
        },
        reduction: Reduction::Mean,
    },
};

pub const RESPIRATION: MetricDescriptor = MetricDescriptor {
    kind: MetricKind::Respiration,
    record_type: "HKQuantityTypeIdentifierRespiratoryRate",
    projection: Projection::Sample,
    intermediate_key: "processed/Resp_Data.csv",
    intermediate_header: &["created_at", "count"],
    dataset: "resp",
    value_column: "avg_resp_rate",
    value_type: ValueType::Float,
    transform: Transform::Aggregate {
        bound: ValidityBound::Closed {
            min: 8.0,
            max: 40.0,
        },
        reduction: Reduction::Mean,
    },
};

pub const STEPS: MetricDescriptor = MetricDescriptor {
    kind: MetricKind::Steps,
    record_type: "HKQuantityTypeIdentifierStepCount",
    projection: Projection::Sample,
    intermediate_key: "processed/Step_Data.csv",
    intermediate_header: &["created_at", "count"],
    dataset: "step",
    value_column: "total_steps",
    value_type: ValueType::Integer,
    transform: Transform::Aggregate {
        bound: ValidityBound::AtMost(100_000.0),
        reduction: Reduction::Sum,
    },
};

pub const SLEEP: MetricDescriptor = MetricDescriptor {
    kind: MetricKind::Sleep,
    record_type: "HKCategoryTypeIdentifierSleepAnalysis",
    projection: Projection::Session,
    intermediate_key: "processed/Sleep_Data.csv",
    intermediate_header: &["created_at", "start_date", "end_date"],
    dataset: "sleep",
    value_column: "total_sleep_minutes",
    value_type: ValueType::Float,
    transform: Transform::MergeIntervals,
};

impl MetricKind {
    pub fn descriptor(self) -> &'static MetricDescriptor {
        match self {
            MetricKind::HeartRate => &HEART_RATE,
            MetricKind::Respiration => &RESPIRATION,
            MetricKind::Steps => &STEPS,
            MetricKind::Sleep => &SLEEP,
        }
    }

    pub fn from_record_type(record_type: &str) -> Option<Self> {
        match record_type {
            t if t == HEART_RATE.record_type => Some(MetricKind::HeartRate),
            t if t == RESPIRATION.record_type => Some(MetricKind::Respiration),
            t if t == STEPS.record_type => Some(MetricKind::Steps),
            t if t == SLEEP.record_type => Some(MetricKind::Sleep),
            _ => None,
        }
    }
}

impl MetricDescriptor {
    /// Key of the final dataset, partitioned by dataset name.
    pub fn final_key(&self) -> String {
        format!("transformed/{0}/{0}.csv", self.dataset)
    }

    pub fn final_header(&self) -> [&'static str; 5] {
        ["created_at", self.value_column, "year", "month", "day"]
    }
}

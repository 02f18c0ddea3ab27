use std::collections::BTreeMap;

use chrono::NaiveDate;
use healthexport_types::{
    AggregateValue, DailyAggregate, MetricDescriptor, Reduction, SampleRow, Transform,
    ValidityBound, ValueType,
};

use crate::{
    TransformStats,
    helpers::timestamp::{parse_number, parse_timestamp},
};

/// Running reduction of one calendar date.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DailyAccumulator {
    pub sum: f64,
    pub count: u64,
}

impl DailyAccumulator {
    pub fn add(&mut self, value: f64) {
        self.sum += value;
        self.count += 1;
    }

    pub fn reduce(&self, reduction: Reduction) -> f64 {
        match reduction {
            Reduction::Sum => self.sum,
            Reduction::Mean if self.count == 0 => 0_f64,
            Reduction::Mean => self.sum / self.count as f64,
        }
    }
}

/// Filter, group by date and reduce, shared by heart rate, respiration and
/// step counts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetricFilterAggregator {
    pub bound: ValidityBound,
    pub reduction: Reduction,
    pub value_type: ValueType,
}

impl MetricFilterAggregator {
    pub fn new(bound: ValidityBound, reduction: Reduction, value_type: ValueType) -> Self {
        Self {
            bound,
            reduction,
            value_type,
        }
    }

    /// `None` for metrics that aren't plain aggregates (sleep).
    pub fn for_metric(descriptor: &MetricDescriptor) -> Option<Self> {
        match descriptor.transform {
            Transform::Aggregate { bound, reduction } => {
                Some(Self::new(bound, reduction, descriptor.value_type))
            }
            Transform::MergeIntervals => None,
        }
    }

    /// Parses, validates and buckets a single row. `None` rejects it.
    fn accept(&self, row: &SampleRow) -> Option<(NaiveDate, f64)> {
        let created_at = parse_timestamp(&row.created_at)?;
        let value = parse_number(&row.value)?;
        self.bound
            .contains(value)
            .then_some((created_at.date(), value))
    }

    /// Daily aggregates in ascending date order.
    pub fn aggregate(&self, rows: &[SampleRow]) -> (Vec<DailyAggregate>, TransformStats) {
        let mut days: BTreeMap<NaiveDate, DailyAccumulator> = BTreeMap::new();
        let mut stats = TransformStats {
            rows: rows.len(),
            ..Default::default()
        };

        for row in rows {
            match self.accept(row) {
                Some((date, value)) => days.entry(date).or_default().add(value),
                None => stats.rejected += 1,
            }
        }

        let aggregates: Vec<_> = days
            .into_iter()
            .map(|(date, acc)| {
                let reduced = acc.reduce(self.reduction);
                let value = match self.value_type {
                    ValueType::Float => AggregateValue::Float(reduced),
                    ValueType::Integer => AggregateValue::Integer(reduced.round() as i64),
                };
                DailyAggregate::new(date, value)
            })
            .collect();

        stats.days = aggregates.len();
        (aggregates, stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use healthexport_types::{HEART_RATE, RESPIRATION, SLEEP, STEPS};

    fn row(created_at: &str, value: &str) -> SampleRow {
        SampleRow {
            created_at: created_at.into(),
            value: value.into(),
        }
    }

    fn day_rows(values: &[&str]) -> Vec<SampleRow> {
        values
            .iter()
            .map(|v| row("2024-01-01 08:00:00 +0000", v))
            .collect()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn heart() -> MetricFilterAggregator {
        MetricFilterAggregator::for_metric(&HEART_RATE).unwrap()
    }

    fn steps() -> MetricFilterAggregator {
        MetricFilterAggregator::for_metric(&STEPS).unwrap()
    }

    #[test]
    fn sleep_is_not_a_plain_aggregate() {
        assert!(MetricFilterAggregator::for_metric(&SLEEP).is_none());
    }

    #[test]
    fn heart_rate_daily_mean_drops_out_of_range() {
        let (out, stats) = heart().aggregate(&day_rows(&["25", "60", "95", "225"]));
        assert_eq!(
            out,
            vec![DailyAggregate::new(
                date(2024, 1, 1),
                AggregateValue::Float(77.5)
            )]
        );
        assert_eq!(
            stats,
            TransformStats {
                rows: 4,
                rejected: 2,
                days: 1,
            }
        );
    }

    #[test]
    fn heart_rate_bounds_are_inclusive() {
        let (out, _) = heart().aggregate(&day_rows(&["29", "30", "220", "221"]));
        assert_eq!(out[0].value, AggregateValue::Float(125.0));
    }

    #[test]
    fn respiration_range() {
        let aggregator = MetricFilterAggregator::for_metric(&RESPIRATION).unwrap();
        let (out, stats) = aggregator.aggregate(&day_rows(&["7.9", "8", "14", "40", "40.5"]));
        assert_eq!(out[0].value, AggregateValue::Float(62.0 / 3.0));
        assert_eq!(stats.rejected, 2);
    }

    #[test]
    fn step_totals_drop_only_above_cap() {
        let (out, _) = steps().aggregate(&day_rows(&["100", "200", "150000"]));
        assert_eq!(out[0].value, AggregateValue::Integer(300));

        let (out, _) = steps().aggregate(&day_rows(&["100000", "100001", "0", "-20"]));
        assert_eq!(out[0].value, AggregateValue::Integer(99_980));
    }

    #[test]
    fn unparseable_rows_are_rejected_silently() {
        let rows = vec![
            row("not a date", "70"),
            row("2024-01-01 08:00:00 +0000", "seventy"),
            row("2024-01-01 09:00:00 +0000", "70"),
        ];
        let (out, stats) = heart().aggregate(&rows);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].value, AggregateValue::Float(70.0));
        assert_eq!(stats.rejected, 2);
    }

    #[test]
    fn groups_by_written_date_in_ascending_order() {
        let rows = vec![
            row("2024-01-02 00:10:00 -0800", "80"),
            row("2024-01-01 23:50:00 -0800", "60"),
            row("2024-01-01 10:00:00 -0800", "70"),
        ];
        let (out, stats) = heart().aggregate(&rows);
        assert_eq!(
            out,
            vec![
                DailyAggregate::new(date(2024, 1, 1), AggregateValue::Float(65.0)),
                DailyAggregate::new(date(2024, 1, 2), AggregateValue::Float(80.0)),
            ]
        );
        assert_eq!(stats.days, 2);
    }

    #[test]
    fn dates_are_unique() {
        let rows: Vec<_> = (0..48)
            .map(|h| row(&format!("2024-01-{:02} {:02}:00:00 +0000", 1 + h / 24, h % 24), "60"))
            .collect();
        let (out, _) = heart().aggregate(&rows);
        assert_eq!(out.len(), 2);
        assert!(out.windows(2).all(|w| w[0].created_at < w[1].created_at));
    }

    #[test]
    fn empty_input_yields_empty_output() {
        for aggregator in [heart(), steps()] {
            let (out, stats) = aggregator.aggregate(&[]);
            assert!(out.is_empty());
            assert_eq!(stats, TransformStats::default());
        }
    }

    #[test]
    fn everything_filtered_is_not_an_error() {
        let (out, stats) = heart().aggregate(&day_rows(&["10", "500"]));
        assert!(out.is_empty());
        assert_eq!(stats.rejected, 2);
    }

    #[test]
    fn accumulator_mean_of_nothing_is_zero() {
        assert_eq!(DailyAccumulator::default().reduce(Reduction::Mean), 0.0);
    }
}

use std::collections::BTreeMap;

use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use healthexport_types::{AggregateValue, DailyAggregate, SessionRow};

use crate::{
    TransformStats,
    helpers::{time_math::minutes, timestamp::parse_timestamp},
};

/// A sleep session with a positive duration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SleepSession {
    /// `creationDate` of the session, the primary sort key.
    pub report: NaiveDateTime,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct SleepInterval {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl SleepSession {
    /// `None` unless `end > start`.
    pub fn new(report: NaiveDateTime, start: NaiveDateTime, end: NaiveDateTime) -> Option<Self> {
        (end > start).then_some(Self { report, start, end })
    }

    pub fn parse(row: &SessionRow) -> Option<Self> {
        Self::new(
            parse_timestamp(&row.created_at)?,
            parse_timestamp(&row.start_date)?,
            parse_timestamp(&row.end_date)?,
        )
    }

    pub fn interval(&self) -> SleepInterval {
        SleepInterval {
            start: self.start,
            end: self.end,
        }
    }
}

impl SleepInterval {
    pub fn duration(&self) -> TimeDelta {
        self.end - self.start
    }

    pub fn minutes(&self) -> f64 {
        minutes(self.duration())
    }
}

pub struct SleepIntervalMerger;

impl SleepIntervalMerger {
    /// Parses session rows, dropping the unparseable and the non-positive.
    /// Returns the sessions and the number of rejected rows.
    pub fn sessions(rows: &[SessionRow]) -> (Vec<SleepSession>, usize) {
        let sessions: Vec<_> = rows.iter().filter_map(SleepSession::parse).collect();
        let rejected = rows.len() - sessions.len();
        (sessions, rejected)
    }

    /// Collapses overlapping and touching sessions.
    ///
    /// Sessions are ordered by report time first and start time second. The
    /// scan only ever compares against the currently open interval, so it
    /// relies on start times rising along that order. A session reported
    /// after a later-starting one breaks that assumption and may be absorbed
    /// or left unmerged; this ordering is kept for output compatibility.
    pub fn merge(mut sessions: Vec<SleepSession>) -> Vec<SleepInterval> {
        sessions.sort_by_key(|s| (s.report, s.start));
        Self::merge_ordered(sessions.iter().map(SleepSession::interval))
    }

    /// Single pass over intervals in their given order.
    pub fn merge_ordered<I>(intervals: I) -> Vec<SleepInterval>
    where
        I: IntoIterator<Item = SleepInterval>,
    {
        let mut merged = Vec::new();
        let mut open: Option<SleepInterval> = None;

        for next in intervals {
            match open.as_mut() {
                // touching intervals merge too
                Some(current) if next.start <= current.end => {
                    current.end = current.end.max(next.end);
                }
                Some(current) => {
                    merged.push(*current);
                    *current = next;
                }
                None => open = Some(next),
            }
        }

        merged.extend(open);
        merged
    }

    /// Minutes of sleep per calendar date of each interval's start.
    pub fn daily_totals(merged: &[SleepInterval]) -> Vec<DailyAggregate> {
        let mut days: BTreeMap<NaiveDate, f64> = BTreeMap::new();
        for interval in merged {
            *days.entry(interval.start.date()).or_default() += interval.minutes();
        }

        days.into_iter()
            .map(|(date, total)| DailyAggregate::new(date, AggregateValue::Float(total)))
            .collect()
    }

    pub fn aggregate(rows: &[SessionRow]) -> (Vec<DailyAggregate>, TransformStats) {
        let (sessions, rejected) = Self::sessions(rows);
        let merged = Self::merge(sessions);
        let totals = Self::daily_totals(&merged);

        let stats = TransformStats {
            rows: rows.len(),
            rejected,
            days: totals.len(),
        };
        (totals, stats)
    }
}

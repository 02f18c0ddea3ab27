use std::collections::BTreeMap;
use std::io::BufRead;

use healthexport_types::{MetricKind, ProjectedRow, RowTable};
use quick_xml::{Reader, events::Event};
use strum::IntoEnumIterator;

use crate::{
    ExtractError, SkipReason,
    record::{RECORD_TAG, RawRecord, project},
};

/// Result of offering one matching record to a row builder.
#[derive(Debug, Clone, PartialEq)]
pub enum ExtractOutcome<T> {
    Row(T),
    Skipped {
        record_type: String,
        reason: SkipReason,
    },
}

/// Counters of a single pass over a document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtractionStats {
    /// `Record` elements seen, matching or not.
    pub records: u64,
    pub matched: u64,
    pub rows: u64,
    pub skipped: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricStats {
    pub rows: u64,
    pub skipped: u64,
}

/// Every metric's rows, collected in one traversal.
#[derive(Debug, Clone, PartialEq)]
pub struct Extraction {
    pub tables: BTreeMap<MetricKind, RowTable>,
    pub per_metric: BTreeMap<MetricKind, MetricStats>,
    pub stats: ExtractionStats,
}

impl Extraction {
    fn new() -> Self {
        Self {
            tables: MetricKind::iter()
                .map(|kind| (kind, RowTable::empty_for(kind)))
                .collect(),
            per_metric: MetricKind::iter()
                .map(|kind| (kind, MetricStats::default()))
                .collect(),
            stats: ExtractionStats::default(),
        }
    }

    fn push(&mut self, kind: MetricKind, row: ProjectedRow) -> Result<(), ExtractError> {
        let table = self
            .tables
            .entry(kind)
            .or_insert_with(|| RowTable::empty_for(kind));
        push_row(table, kind, row)?;
        self.per_metric.entry(kind).or_default().rows += 1;
        Ok(())
    }

    pub fn take(&mut self, kind: MetricKind) -> RowTable {
        self.tables
            .insert(kind, RowTable::empty_for(kind))
            .unwrap_or_else(|| RowTable::empty_for(kind))
    }
}

fn push_row(table: &mut RowTable, kind: MetricKind, row: ProjectedRow) -> Result<(), ExtractError> {
    table
        .push(row)
        .map_err(|_| ExtractError::ShapeMismatch(kind))
}

/// Lazy pass over the `Record` elements of an export.
///
/// The builder sees every record and returns `None` for the ones it isn't
/// interested in. The event buffer and the [`RawRecord`] are dropped before
/// the next element is read, so memory stays bounded by the largest element.
pub struct RecordStream<R, F> {
    reader: Reader<R>,
    buf: Vec<u8>,
    builder: F,
    stats: ExtractionStats,
    finished: bool,
}

impl<R, F> RecordStream<R, F> {
    pub fn stats(&self) -> ExtractionStats {
        self.stats
    }
}

impl<R, F, T> Iterator for RecordStream<R, F>
where
    R: BufRead,
    F: FnMut(&RawRecord) -> Option<Result<T, SkipReason>>,
{
    type Item = Result<ExtractOutcome<T>, ExtractError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        loop {
            self.buf.clear();
            let position = self.reader.buffer_position() as u64;

            let record = match self.reader.read_event_into(&mut self.buf) {
                Ok(Event::Start(element)) | Ok(Event::Empty(element)) => {
                    if element.name().as_ref() != RECORD_TAG {
                        continue;
                    }
                    RawRecord::from_element(&element)
                }
                Ok(Event::Eof) => {
                    self.finished = true;
                    return None;
                }
                Ok(_) => continue,
                Err(source) => {
                    self.finished = true;
                    return Some(Err(ExtractError::Xml { position, source }));
                }
            };

            self.stats.records += 1;
            let Some(built) = (self.builder)(&record) else {
                continue;
            };
            self.stats.matched += 1;

            return Some(Ok(match built {
                Ok(row) => {
                    self.stats.rows += 1;
                    ExtractOutcome::Row(row)
                }
                Err(reason) => {
                    self.stats.skipped += 1;
                    let record_type = record.record_type.unwrap_or_default();
                    warn!("Skipped malformed {record_type} record near byte {position}: {reason}");
                    ExtractOutcome::Skipped {
                        record_type,
                        reason,
                    }
                }
            }));
        }
    }
}

pub struct StreamExtractor;

impl StreamExtractor {
    /// Scans `source` with an arbitrary record selector.
    pub fn with_builder<R, F, T>(source: R, builder: F) -> RecordStream<R, F>
    where
        R: BufRead,
        F: FnMut(&RawRecord) -> Option<Result<T, SkipReason>>,
    {
        RecordStream {
            reader: Reader::from_reader(source),
            buf: Vec::new(),
            builder,
            stats: ExtractionStats::default(),
            finished: false,
        }
    }

    /// Scans `source` for records whose type equals `record_type`, handing
    /// each one to `builder`.
    pub fn filtered<R, F, T>(
        source: R,
        record_type: &str,
        mut builder: F,
    ) -> RecordStream<R, impl FnMut(&RawRecord) -> Option<Result<T, SkipReason>>>
    where
        R: BufRead,
        F: FnMut(&RawRecord) -> Result<T, SkipReason>,
    {
        let record_type = record_type.to_owned();
        Self::with_builder(source, move |record: &RawRecord| {
            (record.record_type.as_deref() == Some(record_type.as_str())).then(|| builder(record))
        })
    }

    /// One pass for a single metric. A second metric needs a fresh or
    /// rewound source.
    pub fn pass<R: BufRead>(
        source: R,
        kind: MetricKind,
    ) -> RecordStream<R, impl FnMut(&RawRecord) -> Option<Result<ProjectedRow, SkipReason>>> {
        let descriptor = kind.descriptor();
        Self::filtered(source, descriptor.record_type, move |record| {
            project(descriptor, record)
        })
    }

    /// One pass that dispatches every record to the metric matching its type.
    pub fn multiplexed<R: BufRead>(
        source: R,
    ) -> RecordStream<
        R,
        impl FnMut(&RawRecord) -> Option<Result<(MetricKind, ProjectedRow), SkipReason>>,
    > {
        Self::with_builder(source, |record: &RawRecord| {
            let kind = MetricKind::from_record_type(record.record_type.as_deref()?)?;
            Some(project(kind.descriptor(), record).map(|row| (kind, row)))
        })
    }

    /// Collects a single metric's rows.
    pub fn extract<R: BufRead>(
        source: R,
        kind: MetricKind,
    ) -> Result<(RowTable, ExtractionStats), ExtractError> {
        let mut table = RowTable::empty_for(kind);
        let mut stream = Self::pass(source, kind);

        for outcome in stream.by_ref() {
            if let ExtractOutcome::Row(row) = outcome? {
                push_row(&mut table, kind, row)?;
            }
        }

        Ok((table, stream.stats()))
    }

    /// Collects every metric's rows in a single traversal of `source`.
    pub fn extract_all<R: BufRead>(source: R) -> Result<Extraction, ExtractError> {
        Self::extract_all_with_progress(source, |_| {})
    }

    /// Like [`StreamExtractor::extract_all`], reporting the number of
    /// `Record` elements scanned so far after each matched record.
    pub fn extract_all_with_progress<R, P>(
        source: R,
        mut progress: P,
    ) -> Result<Extraction, ExtractError>
    where
        R: BufRead,
        P: FnMut(u64),
    {
        let mut extraction = Extraction::new();
        let mut stream = Self::multiplexed(source);

        while let Some(outcome) = stream.next() {
            match outcome? {
                ExtractOutcome::Row((kind, row)) => extraction.push(kind, row)?,
                ExtractOutcome::Skipped { record_type, .. } => {
                    let stats = MetricKind::from_record_type(&record_type)
                        .and_then(|kind| extraction.per_metric.get_mut(&kind));
                    if let Some(stats) = stats {
                        stats.skipped += 1;
                    }
                }
            }
            progress(stream.stats().records);
        }

        extraction.stats = stream.stats();
        Ok(extraction)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use healthexport_types::{SampleRow, SessionRow};

    const EXPORT: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE HealthData [
<!ELEMENT HealthData (ExportDate,Me,(Record|Workout)*)>
]>
<HealthData locale="en_US">
 <ExportDate value="2024-01-03 10:00:00 +0000"/>
 <Me HKCharacteristicTypeIdentifierBiologicalSex="HKBiologicalSexNotSet"/>
 <Record type="HKQuantityTypeIdentifierHeartRate" creationDate="2024-01-01 08:00:00 +0000" startDate="2024-01-01 08:00:00 +0000" endDate="2024-01-01 08:00:00 +0000" value="72">
  <MetadataEntry key="HKMetadataKeyHeartRateMotionContext" value="0"/>
 </Record>
 <Record type="HKQuantityTypeIdentifierStepCount" creationDate="2024-01-01 09:00:00 +0000" value="120"/>
 <Record type="HKQuantityTypeIdentifierHeartRate" creationDate="2024-01-01 08:05:00 +0000"/>
 <Record type="HKQuantityTypeIdentifierBodyMass" creationDate="2024-01-01 08:05:00 +0000" value="80"/>
 <Record type="HKCategoryTypeIdentifierSleepAnalysis" creationDate="2024-01-02 07:00:00 +0000" startDate="2024-01-01 23:00:00 +0000" endDate="2024-01-02 06:30:00 +0000" value="HKCategoryValueSleepAnalysisAsleepCore"/>
 <Record type="HKQuantityTypeIdentifierRespiratoryRate" creationDate="2024-01-02 03:00:00 +0000" value="14.5"/>
 <Record type="HKQuantityTypeIdentifierHeartRate" creationDate="2024-01-02 08:00:00 +0000" value="65"/>
 <Workout workoutActivityType="HKWorkoutActivityTypeWalking" duration="30"/>
</HealthData>
"#;

    fn source() -> Cursor<&'static [u8]> {
        Cursor::new(EXPORT.as_bytes())
    }

    #[test]
    fn pass_filters_by_type_in_document_order() {
        let rows: Vec<_> = StreamExtractor::pass(source(), MetricKind::HeartRate)
            .filter_map(|outcome| match outcome.unwrap() {
                ExtractOutcome::Row(row) => Some(row),
                ExtractOutcome::Skipped { .. } => None,
            })
            .collect();

        assert_eq!(
            rows,
            vec![
                ProjectedRow::Sample(SampleRow {
                    created_at: "2024-01-01 08:00:00 +0000".into(),
                    value: "72".into(),
                }),
                ProjectedRow::Sample(SampleRow {
                    created_at: "2024-01-02 08:00:00 +0000".into(),
                    value: "65".into(),
                }),
            ]
        );
    }

    #[test]
    fn malformed_record_is_skipped_not_fatal() {
        let (table, stats) = StreamExtractor::extract(source(), MetricKind::HeartRate).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(
            stats,
            ExtractionStats {
                records: 7,
                matched: 3,
                rows: 2,
                skipped: 1,
            }
        );
    }

    #[test]
    fn skipped_outcome_names_reason() {
        let skipped: Vec<_> = StreamExtractor::pass(source(), MetricKind::HeartRate)
            .filter_map(|outcome| match outcome.unwrap() {
                ExtractOutcome::Skipped { reason, .. } => Some(reason),
                ExtractOutcome::Row(_) => None,
            })
            .collect();
        assert_eq!(skipped, vec![SkipReason::MissingAttribute("value")]);
    }

    #[test]
    fn separate_passes_need_fresh_sources() {
        let bytes = EXPORT.as_bytes();
        let (heart, _) = StreamExtractor::extract(Cursor::new(bytes), MetricKind::HeartRate).unwrap();
        let (sleep, _) = StreamExtractor::extract(Cursor::new(bytes), MetricKind::Sleep).unwrap();
        assert_eq!(heart.len(), 2);
        assert_eq!(
            sleep,
            RowTable::Sessions(vec![SessionRow {
                created_at: "2024-01-02 07:00:00 +0000".into(),
                start_date: "2024-01-01 23:00:00 +0000".into(),
                end_date: "2024-01-02 06:30:00 +0000".into(),
            }])
        );
    }

    #[test]
    fn multiplexed_pass_matches_individual_passes() {
        let mut extraction = StreamExtractor::extract_all(source()).unwrap();

        for kind in MetricKind::iter() {
            let (single, _) = StreamExtractor::extract(source(), kind).unwrap();
            assert_eq!(extraction.take(kind), single, "{kind}");
        }

        assert_eq!(extraction.stats.records, 7);
        assert_eq!(extraction.stats.matched, 6);
        assert_eq!(
            extraction.per_metric[&MetricKind::HeartRate],
            MetricStats { rows: 2, skipped: 1 }
        );
        assert_eq!(
            extraction.per_metric[&MetricKind::Steps],
            MetricStats { rows: 1, skipped: 0 }
        );
    }

    #[test]
    fn custom_builder_sees_raw_attributes() {
        let values: Vec<String> = StreamExtractor::filtered(
            source(),
            "HKQuantityTypeIdentifierRespiratoryRate",
            |record| Ok(record.require("value")?.to_owned()),
        )
        .filter_map(|outcome| match outcome.unwrap() {
            ExtractOutcome::Row(value) => Some(value),
            ExtractOutcome::Skipped { .. } => None,
        })
        .collect();
        assert_eq!(values, vec!["14.5".to_string()]);
    }

    #[test]
    fn empty_document_yields_empty_tables() {
        let extraction =
            StreamExtractor::extract_all(Cursor::new(b"<HealthData/>".as_slice())).unwrap();
        assert!(extraction.tables.values().all(RowTable::is_empty));
        assert_eq!(extraction.tables.len(), 4);
    }

    #[test]
    fn broken_document_surfaces_error_once() {
        let broken = r#"<HealthData><Record type="HKQuantityTypeIdentifierStepCount" creationDate="2024-01-01 09:00:00 +0000" value="1"/></Oops>"#;
        let mut stream = StreamExtractor::pass(Cursor::new(broken.as_bytes()), MetricKind::Steps);
        assert!(matches!(stream.next(), Some(Ok(ExtractOutcome::Row(_)))));
        assert!(matches!(stream.next(), Some(Err(ExtractError::Xml { .. }))));
        assert!(stream.next().is_none());
    }

    #[test]
    fn mismatched_row_is_an_error() {
        let mut extraction = Extraction::new();
        let row = ProjectedRow::Sample(SampleRow {
            created_at: "2024-01-02 07:00:00 +0000".into(),
            value: "HKCategoryValueSleepAnalysisAsleepCore".into(),
        });

        assert!(matches!(
            extraction.push(MetricKind::Sleep, row),
            Err(ExtractError::ShapeMismatch(MetricKind::Sleep))
        ));
        assert!(extraction.take(MetricKind::Sleep).is_empty());
        assert_eq!(extraction.per_metric[&MetricKind::Sleep], MetricStats::default());
    }

    #[test]
    fn progress_reports_scanned_records() {
        let mut seen = Vec::new();
        StreamExtractor::extract_all_with_progress(source(), |records| seen.push(records))
            .unwrap();
        assert_eq!(seen.len(), 6);
        assert_eq!(seen.last(), Some(&7));
    }
}

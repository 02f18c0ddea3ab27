//! CSV encoding of the intermediate row tables and the final daily datasets.

use healthexport_types::{
    DailyAggregate, MetricDescriptor, ProjectedRow, RowTable, SampleRow, SessionRow,
};

use crate::TableError;

const PROGRESS_EVERY: u64 = 50_000;

/// Streams projected rows into an in-memory CSV table with the metric's
/// intermediate header.
pub struct TableWriter {
    descriptor: &'static MetricDescriptor,
    writer: csv::Writer<Vec<u8>>,
    count: u64,
}

impl TableWriter {
    pub fn new(descriptor: &'static MetricDescriptor) -> Result<Self, TableError> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(descriptor.intermediate_header)?;
        Ok(Self {
            descriptor,
            writer,
            count: 0,
        })
    }

    pub fn write(&mut self, row: &ProjectedRow) -> Result<(), TableError> {
        self.writer.write_record(row.fields())?;
        self.count += 1;
        if self.count % PROGRESS_EVERY == 0 {
            info!("{} - written {} rows...", self.descriptor.intermediate_key, self.count);
        }
        Ok(())
    }

    /// Returns the encoded table and the number of data rows in it.
    pub fn finish(self) -> Result<(Vec<u8>, u64), TableError> {
        let bytes = self
            .writer
            .into_inner()
            .map_err(|error| TableError::Io(error.into_error()))?;
        Ok((bytes, self.count))
    }
}

pub fn encode_rows(
    descriptor: &'static MetricDescriptor,
    table: &RowTable,
) -> Result<Vec<u8>, TableError> {
    let mut writer = TableWriter::new(descriptor)?;
    for row in table.iter() {
        writer.write(&row)?;
    }
    Ok(writer.finish()?.0)
}

fn check_header(
    reader: &mut csv::Reader<&[u8]>,
    expected: &[&str],
) -> Result<(), TableError> {
    let found = reader.headers()?;
    if found.iter().ne(expected.iter().copied()) {
        return Err(TableError::Header {
            found: found.iter().map(str::to_owned).collect(),
            expected: expected.iter().map(|h| h.to_string()).collect(),
        });
    }
    Ok(())
}

pub fn decode_rows(descriptor: &MetricDescriptor, bytes: &[u8]) -> Result<RowTable, TableError> {
    let mut reader = csv::Reader::from_reader(bytes);
    check_header(&mut reader, descriptor.intermediate_header)?;

    let mut table = RowTable::empty_for(descriptor.kind);
    for record in reader.records() {
        let record = record?;
        let field = |i: usize| record.get(i).unwrap_or_default().to_owned();
        match &mut table {
            RowTable::Samples(rows) => rows.push(SampleRow {
                created_at: field(0),
                value: field(1),
            }),
            RowTable::Sessions(rows) => rows.push(SessionRow {
                created_at: field(0),
                start_date: field(1),
                end_date: field(2),
            }),
        }
    }

    Ok(table)
}

pub fn encode_aggregates(
    descriptor: &MetricDescriptor,
    rows: &[DailyAggregate],
) -> Result<Vec<u8>, TableError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(descriptor.final_header())?;

    for row in rows {
        writer.write_record([
            row.created_at.to_string(),
            row.value.to_string(),
            row.year.to_string(),
            row.month.to_string(),
            row.day.to_string(),
        ])?;
    }

    writer
        .into_inner()
        .map_err(|error| TableError::Io(error.into_error()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use healthexport_types::{AggregateValue, HEART_RATE, RESPIRATION, SLEEP, STEPS, ValueType};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn decode_aggregates(descriptor: &MetricDescriptor, bytes: &[u8]) -> Vec<DailyAggregate> {
        let mut reader = csv::Reader::from_reader(bytes);
        check_header(&mut reader, &descriptor.final_header()).unwrap();
        reader
            .records()
            .map(|record| {
                let record = record.unwrap();
                let value = match descriptor.value_type {
                    ValueType::Integer => AggregateValue::Integer(record[1].parse().unwrap()),
                    ValueType::Float => AggregateValue::Float(record[1].parse().unwrap()),
                };
                DailyAggregate::new(record[0].parse().unwrap(), value)
            })
            .collect()
    }

    #[test]
    fn intermediate_header_follows_metric() {
        let bytes = encode_rows(&RESPIRATION, &RowTable::Samples(vec![])).unwrap();
        assert_eq!(String::from_utf8(bytes).unwrap(), "created_at,count\n");
    }

    #[test]
    fn intermediate_table_survives_storage() {
        let table = RowTable::Sessions(vec![SessionRow {
            created_at: "2024-01-02 07:00:00 +0000".into(),
            start_date: "2024-01-01 23:00:00 +0000".into(),
            end_date: "".into(),
        }]);
        let bytes = encode_rows(&SLEEP, &table).unwrap();
        assert_eq!(decode_rows(&SLEEP, &bytes).unwrap(), table);
    }

    #[test]
    fn values_with_commas_are_quoted() {
        let table = RowTable::Samples(vec![SampleRow {
            created_at: "2024-01-01 08:00:00 +0000".into(),
            value: "1,5".into(),
        }]);
        let bytes = encode_rows(&HEART_RATE, &table).unwrap();
        assert!(String::from_utf8_lossy(&bytes).contains("\"1,5\""));
        assert_eq!(decode_rows(&HEART_RATE, &bytes).unwrap(), table);
    }

    #[test]
    fn decode_rejects_foreign_header() {
        let error = decode_rows(&SLEEP, b"created_at,value\n").unwrap_err();
        assert!(matches!(error, TableError::Header { .. }));
    }

    #[test]
    fn writer_counts_rows() {
        let mut writer = TableWriter::new(&STEPS).unwrap();
        for _ in 0..3 {
            writer
                .write(&ProjectedRow::Sample(SampleRow {
                    created_at: "2024-01-01 09:00:00 +0000".into(),
                    value: "10".into(),
                }))
                .unwrap();
        }
        let (_, count) = writer.finish().unwrap();
        assert_eq!(count, 3);
    }

    #[test]
    fn final_table_layout() {
        let rows = vec![
            DailyAggregate::new(date(2024, 1, 1), AggregateValue::Integer(300)),
            DailyAggregate::new(date(2024, 1, 2), AggregateValue::Integer(12)),
        ];
        let bytes = encode_aggregates(&STEPS, &rows).unwrap();
        assert_eq!(
            String::from_utf8(bytes.clone()).unwrap(),
            "created_at,total_steps,year,month,day\n2024-01-01,300,2024,1,1\n2024-01-02,12,2024,1,2\n"
        );
        assert_eq!(decode_aggregates(&STEPS, &bytes), rows);
    }

    #[test]
    fn empty_final_table_keeps_header() {
        let bytes = encode_aggregates(&HEART_RATE, &[]).unwrap();
        assert_eq!(
            String::from_utf8(bytes.clone()).unwrap(),
            "created_at,avg_heart_rate,year,month,day\n"
        );
        assert!(decode_aggregates(&HEART_RATE, &bytes).is_empty());
    }
}

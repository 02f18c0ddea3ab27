use std::collections::HashMap;

use healthexport_types::{
    CREATION_DATE, END_DATE, MetricDescriptor, ProjectedRow, Projection, START_DATE, SampleRow,
    SessionRow, VALUE,
};
use quick_xml::events::BytesStart;

use crate::SkipReason;

pub(crate) const RECORD_TAG: &[u8] = b"Record";
const TYPE_ATTRIBUTE: &str = "type";

/// A single export element, alive only while it is being projected.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawRecord {
    pub tag: String,
    pub record_type: Option<String>,
    pub attributes: HashMap<String, String>,
    undecodable: Vec<String>,
    malformed: Option<String>,
}

impl RawRecord {
    pub fn new<I, K, V>(tag: &str, attributes: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut attributes: HashMap<String, String> = attributes
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        let record_type = attributes.remove(TYPE_ATTRIBUTE);
        Self {
            tag: tag.to_owned(),
            record_type,
            attributes,
            ..Default::default()
        }
    }

    pub(crate) fn from_element(element: &BytesStart<'_>) -> Self {
        let mut record = Self {
            tag: String::from_utf8_lossy(element.name().as_ref()).into_owned(),
            ..Default::default()
        };

        for attribute in element.attributes() {
            let attribute = match attribute {
                Ok(attribute) => attribute,
                Err(error) => {
                    // the rest of the list can't be trusted once the syntax breaks
                    record.malformed = Some(error.to_string());
                    break;
                }
            };

            let key = String::from_utf8_lossy(attribute.key.as_ref()).into_owned();
            match attribute.unescape_value() {
                Ok(value) if key == TYPE_ATTRIBUTE => record.record_type = Some(value.into_owned()),
                Ok(value) => {
                    record.attributes.insert(key, value.into_owned());
                }
                Err(_) => record.undecodable.push(key),
            }
        }

        record
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    pub fn require(&self, name: &'static str) -> Result<&str, SkipReason> {
        if let Some(value) = self.get(name) {
            return Ok(value);
        }

        if self.undecodable.iter().any(|key| key == name) {
            Err(SkipReason::UndecodableAttribute(name))
        } else if let Some(error) = &self.malformed {
            Err(SkipReason::MalformedAttributes(error.clone()))
        } else {
            Err(SkipReason::MissingAttribute(name))
        }
    }

}

/// Projects a record onto the row shape of `descriptor`.
pub fn project(descriptor: &MetricDescriptor, record: &RawRecord) -> Result<ProjectedRow, SkipReason> {
    let created_at = record.require(CREATION_DATE)?.to_owned();

    match descriptor.projection {
        Projection::Sample => Ok(ProjectedRow::Sample(SampleRow {
            created_at,
            value: record.require(VALUE)?.to_owned(),
        })),
        Projection::Session => Ok(ProjectedRow::Session(SessionRow {
            created_at,
            start_date: record.require(START_DATE)?.to_owned(),
            end_date: record.require(END_DATE)?.to_owned(),
        })),
    }
}

use healthexport_types::MetricKind;
use thiserror::Error;

/// Fatal problems while scanning an export document.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("malformed export document near byte {position}: {source}")]
    Xml {
        position: u64,
        #[source]
        source: quick_xml::Error,
    },
    #[error("projected row doesn't fit the {0} table")]
    ShapeMismatch(MetricKind),
}

/// Why a single matching record didn't produce a row.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SkipReason {
    #[error("missing attribute `{0}`")]
    MissingAttribute(&'static str),
    #[error("attribute `{0}` could not be decoded")]
    UndecodableAttribute(&'static str),
    #[error("malformed attribute list: {0}")]
    MalformedAttributes(String),
}

#[derive(Debug, Error)]
pub enum TableError {
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("unexpected header {found:?}, expected {expected:?}")]
    Header {
        found: Vec<String>,
        expected: Vec<String>,
    },
}

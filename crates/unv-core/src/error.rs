use thiserror::Error;

pub type Result<T> = std::result::Result<T, DecodeError>;

/// Failure modes of the universe decoder.
///
/// Errors raised inside a record loop are wrapped in [`DecodeError::Record`]
/// so the caller sees which section and record index went wrong.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("unexpected end of file at offset {offset} ({needed} more bytes needed)")]
    Truncated { offset: usize, needed: usize },

    #[error("mandatory section marker {marker:?} not found")]
    MarkerNotFound { marker: &'static str },

    #[error("node {id} declares parent {declared} but is owned by {expected}")]
    ParentMismatch { id: u32, declared: u32, expected: u32 },

    #[error("column {column_id} references unknown table {table_id}")]
    UnresolvedTable { column_id: u32, table_id: u32 },

    #[error("date index {index} is before the 1976-07-04 epoch (2442964)")]
    InvalidDateIndex { index: u32 },

    #[error("class tree exceeds the configured depth limit of {limit}")]
    DepthExceeded { limit: usize },

    #[error("in section {section:?}, record {record}: {source}")]
    Record {
        section: &'static str,
        record: usize,
        #[source]
        source: Box<DecodeError>,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl DecodeError {
    pub(crate) fn in_record(self, section: &'static str, record: usize) -> DecodeError {
        DecodeError::Record {
            section,
            record,
            source: Box::new(self),
        }
    }

    /// Innermost error, with any record context peeled off.
    pub fn root_cause(&self) -> &DecodeError {
        match self {
            DecodeError::Record { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

//! Result envelopes handed back to the caller.

use crate::document::{Datum, Document};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One record as reported by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordEntry {
    /// Client id of the originating record; `None` for records read from the store.
    pub client_id: Option<String>,
    /// Persisted identifier.
    pub id: Option<Datum>,
    pub data: Document,
}

/// Result envelope of one operation.
///
/// `success` reflects whether the query or connection succeeded. Per-record
/// failures in a batch do not flip it; they travel on the operation's
/// exception instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultSet {
    pub records: Vec<RecordEntry>,
    pub success: bool,
    pub total: usize,
    pub count: usize,
}

impl ResultSet {
    /// Successful envelope over `records`; total and count are the record count.
    pub fn new(records: Vec<RecordEntry>) -> Self {
        let count = records.len();
        Self {
            records,
            success: true,
            total: count,
            count,
        }
    }

    /// Envelope for a query or connection failure: no records at all.
    pub fn failed() -> Self {
        Self {
            records: Vec::new(),
            success: false,
            total: 0,
            count: 0,
        }
    }
}

/// A record whose backend command failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordFailure {
    pub client_id: String,
    pub error: String,
}

/// Exception payload attached to an operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum OperationException {
    /// The query or connection itself failed.
    Query(String),
    /// Some records of a batch failed; the others were processed.
    Records(Vec<RecordFailure>),
}

impl OperationException {
    /// Per-record failures, empty for a query exception.
    pub fn failures(&self) -> &[RecordFailure] {
        match self {
            OperationException::Records(failures) => failures,
            OperationException::Query(_) => &[],
        }
    }
}

impl fmt::Display for OperationException {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationException::Query(error) => write!(f, "query failed: {}", error),
            OperationException::Records(failures) => {
                write!(f, "{} record(s) failed", failures.len())
            }
        }
    }
}

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// One row of the input CSV, keyed by header name. Immutable once read.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    index: u64,
    fields: HashMap<String, String>,
}

impl Record {
    pub fn new(index: u64, fields: HashMap<String, String>) -> Self {
        Record { index, fields }
    }

    /// Zero-based position of the row in its source (header excluded).
    pub fn index(&self) -> u64 {
        self.index
    }

    pub fn field(&self, column: &str) -> Option<&str> {
        self.fields.get(column).map(String::as_str)
    }
}

/// A payload bound for a single queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub queue: String,
    pub payload: Vec<u8>,
}

/// What a worker hands to its result sink before acknowledging.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessedRow {
    pub original: String,
    pub transformed: String,
}

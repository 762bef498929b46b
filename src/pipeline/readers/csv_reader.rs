// src/pipeline/readers/csv_reader.rs

use std::collections::HashMap;
use std::fs::File;
use std::path::PathBuf;

use tracing::debug;

use super::base_reader::{BaseReader, RecordIter};
use crate::data_model::Record;
use crate::error::{PipelineError, Result};

/// Reads records from a CSV file whose first row is a header.
#[derive(Debug, Clone)]
pub struct CsvReader {
    path: PathBuf,
}

impl CsvReader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        CsvReader { path: path.into() }
    }
}

impl BaseReader for CsvReader {
    fn read_records(&self) -> Result<RecordIter> {
        let file = File::open(&self.path).map_err(|source| PipelineError::SourceUnavailable {
            path: self.path.display().to_string(),
            source,
        })?;
        debug!(path = %self.path.display(), "Opened CSV input");

        let reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::Headers)
            .from_reader(file);

        let iterator = reader
            .into_deserialize::<HashMap<String, String>>()
            .enumerate()
            .map(|(index, row)| {
                row.map(|fields| Record::new(index as u64, fields))
                    .map_err(PipelineError::from)
            });

        Ok(Box::new(iterator))
    }
}

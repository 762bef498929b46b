// src/pipeline/sinks/mod.rs

//! Where a worker reports each processed message before acknowledging it.

use std::path::Path;

use async_trait::async_trait;
use tracing::info;

use crate::config::worker::SinkConfig;
use crate::data_model::ProcessedRow;
use crate::error::Result;
use crate::pipeline::writers::{BaseWriter, CsvAppendWriter};

#[async_trait]
pub trait ResultSink: Send {
    fn name(&self) -> &'static str;

    /// Records one row. When this returns `Ok` the row is durable and the
    /// message may be acknowledged.
    async fn record(&mut self, row: &ProcessedRow) -> Result<()>;

    /// Releases the output once the worker stops receiving.
    async fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Logs the transformed value only.
pub struct LogSink;

#[async_trait]
impl ResultSink for LogSink {
    fn name(&self) -> &'static str {
        "LogSink"
    }

    async fn record(&mut self, row: &ProcessedRow) -> Result<()> {
        info!("Processed: {}", row.transformed);
        Ok(())
    }
}

/// Appends every row to a CSV file, then logs it.
pub struct CsvFileSink {
    writer: CsvAppendWriter,
}

impl CsvFileSink {
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let writer = CsvAppendWriter::new(path)?;
        info!(path = %writer.path().display(), "Appending processed rows to CSV");
        Ok(CsvFileSink { writer })
    }
}

#[async_trait]
impl ResultSink for CsvFileSink {
    fn name(&self) -> &'static str {
        "CsvFileSink"
    }

    async fn record(&mut self, row: &ProcessedRow) -> Result<()> {
        self.writer.write_batch(std::slice::from_ref(row))?;
        info!("Processed: {}", row.transformed);
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.writer.close()?;
        info!(path = %self.writer.path().display(), "Closed processed rows CSV");
        Ok(())
    }
}

pub fn build_sink(config: &SinkConfig) -> Result<Box<dyn ResultSink>> {
    Ok(match config {
        SinkConfig::Log => Box::new(LogSink),
        SinkConfig::Csv { path } => Box::new(CsvFileSink::create(path)?),
    })
}

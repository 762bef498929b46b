use crate::data_model::ProcessedRow;
use crate::error::Result;

/// Trait for writing processed rows to an output sink (e.g. file).
pub trait BaseWriter {
    /// Write a batch of rows and make them durable before returning.
    fn write_batch(&mut self, rows: &[ProcessedRow]) -> Result<()>;

    /// Flush anything buffered and make it durable. The writer stays usable.
    fn close(&mut self) -> Result<()>;
}

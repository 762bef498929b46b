use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use crate::data_model::ProcessedRow;
use crate::error::Result;
use crate::pipeline::writers::BaseWriter;

/// Appends `original,transformed` rows to a CSV file without a header, so
/// several runs (or restarts) keep extending the same file.
pub struct CsvAppendWriter {
    path: PathBuf,
    writer: csv::Writer<File>,
}

impl CsvAppendWriter {
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent_dir) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent_dir)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);

        Ok(CsvAppendWriter {
            path: path.to_path_buf(),
            writer,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl BaseWriter for CsvAppendWriter {
    fn write_batch(&mut self, rows: &[ProcessedRow]) -> Result<()> {
        if rows.is_empty() {
            return Ok(());
        }
        for row in rows {
            self.writer
                .write_record([row.original.as_str(), row.transformed.as_str()])?;
        }
        self.writer.flush()?;
        self.writer.get_ref().sync_data()?;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.writer.flush()?;
        self.writer.get_ref().sync_all()?;
        Ok(())
    }
}

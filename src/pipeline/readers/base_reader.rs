use crate::data_model::Record;
use crate::error::Result;

pub type RecordIter = Box<dyn Iterator<Item = Result<Record>> + Send>;

pub trait BaseReader {
    /// Opens the source. Fails before yielding anything if it is unavailable.
    fn read_records(&self) -> Result<RecordIter>;
}

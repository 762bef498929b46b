use thiserror::Error;

/// Custom Result type for this crate.
pub type Result<T> = std::result::Result<T, PipelineError>;

/// The Error type for dispatcher and worker operations.
///
/// Every variant is fatal: errors are never recovered mid-stream, they bubble
/// up to `main` which logs them and exits with [`PipelineError::exit_code`].
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// The broker could not be reached when opening the connection.
    #[error("Connection to RabbitMQ server failed: {0}")]
    ConnectionFailed(String),

    /// The input file is missing or cannot be opened.
    #[error("Input source '{path}' unavailable: {source}")]
    SourceUnavailable {
        path: String,
        source: std::io::Error,
    },

    /// Failure while declaring, publishing, consuming or acknowledging.
    #[error("Delivery error: {0}")]
    DeliveryError(String),

    #[error("Record {record_index} has no column '{column}'")]
    MissingField { record_index: u64, column: String },

    #[error("Payload is not valid UTF-8: {source}")]
    Decode {
        #[from]
        source: std::string::FromUtf8Error,
    },

    #[error("I/O error: {source}")]
    IoError {
        #[from]
        source: std::io::Error,
    },

    #[error("CSV error: {source}")]
    CsvError {
        #[from]
        source: csv::Error,
    },

    #[error("YAML error: {source}")]
    YamlError {
        #[from]
        source: serde_yaml::Error,
    },
}

impl PipelineError {
    /// Process exit status for this error. Interrupts are not errors, so every
    /// variant maps to 1.
    pub fn exit_code(&self) -> u8 {
        1
    }
}

// Anything lapin reports after the connection is up is a delivery problem;
// connection setup maps its own errors to `ConnectionFailed`.
impl From<lapin::Error> for PipelineError {
    fn from(err: lapin::Error) -> Self {
        PipelineError::DeliveryError(err.to_string())
    }
}

use thiserror::Error;

#[derive(Error, Debug)]
pub enum GaokaoError {
    #[error("Failed to parse {context}: {reason}")]
    ParseFailure { context: String, reason: String },

    #[error("Source '{source_name}' is missing required columns: {}", missing.join(", "))]
    SchemaMismatch {
        source_name: String,
        missing: Vec<String>,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV serialization failed: {0}")]
    Csv(#[from] csv::Error),
}

pub type Result<T> = std::result::Result<T, GaokaoError>;

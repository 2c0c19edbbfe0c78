use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScreeningError {
    #[error("Invalid screening input: {0}")]
    InvalidInput(String),

    /// One source file could not be normalized. Index building turns this into
    /// a `SourceParseFailure` diagnostic instead of propagating it.
    #[error("Failed to parse {file}: {reason}")]
    SourceParse { file: String, reason: String },

    #[error("Malformed source data: {0}")]
    Malformed(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("Spreadsheet error: {0}")]
    Spreadsheet(String),

    #[error("Snapshot not found: {0}")]
    SnapshotNotFound(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ScreeningError>;

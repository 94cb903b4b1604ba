use thiserror::Error;

#[derive(Error, Debug)]
pub enum SacError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Data source unavailable: {name}: {message}")]
    SourceUnavailable { name: String, message: String },

    #[error("Malformed dataset: {0}")]
    Malformed(String),

    #[error("Dataset from '{0}' has no usable rows")]
    EmptyDataset(String),

    #[error("Unknown attendant: {0}")]
    UnknownAttendant(String),

    #[error("Export error: {0}")]
    Export(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Spreadsheet error: {0}")]
    Spreadsheet(#[from] calamine::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, SacError>;

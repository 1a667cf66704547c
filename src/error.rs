use thiserror::Error;

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON deserialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Spreadsheet error: {0}")]
    Spreadsheet(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Missing required column: {0}")]
    MissingColumn(String),

    #[error("Invalid object location: {0}")]
    InvalidLocation(String),

    #[error("Object not found: gs://{bucket}/{name}")]
    ObjectNotFound { bucket: String, name: String },

    #[error("Storage error: {message}")]
    Storage { message: String },

    #[error("Warehouse query failed: {message}")]
    Query { message: String },
}

impl From<calamine::Error> for IngestError {
    fn from(e: calamine::Error) -> Self {
        IngestError::Spreadsheet(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, IngestError>;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum EtlError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON deserialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unreadable source '{path}': {message}")]
    Source { path: String, message: String },

    #[error("Missing column '{column}' in {source_label}")]
    MissingColumn { column: String, source_label: String },

    #[error("Document store error: {message}")]
    Store { message: String },

    #[error("Schedule error: {0}")]
    Schedule(String),
}

#[cfg(feature = "mongo")]
impl From<mongodb::error::Error> for EtlError {
    fn from(e: mongodb::error::Error) -> Self {
        EtlError::Store {
            message: e.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, EtlError>;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("No {0} to export")]
    NothingToExport(&'static str),

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Invalid filename: {0}")]
    InvalidFilename(String),

    #[error("Invalid pattern: {0}")]
    InvalidPattern(String),

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("File {0} already exists")]
    AlreadyExists(String),
}

pub type Result<T> = std::result::Result<T, Error>;

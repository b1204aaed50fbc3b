use thiserror::Error;

#[derive(Error, Debug)]
pub enum FolioError {
    #[error("Failed to read/write WAL file: {0}")]
    WalIo(std::io::Error),
    #[error("Failed to serialize/deserialize WAL operation: {0}")]
    WalSerialization(serde_json::Error),
    #[error("File not found")]
    FileNotFound,
    #[error("File read error: {0}")]
    FileRead(std::io::Error),
    #[error("File write error: {0}")]
    FileWrite(std::io::Error),
    #[error("Invalid filename: {0}")]
    InvalidFilename(String),
    #[error("Unknown content section: {0}")]
    UnknownSection(String),
}

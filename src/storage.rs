use std::path::PathBuf;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use crate::entities::{Media, MediaId, Section};
use crate::error::FolioError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum WalOperation {
    CreateMedia { media: Media },
    ReplaceMedia { media: Media },
    DeleteMedia { media_id: MediaId },
    PutSection { section: Section, content: Value },
    PublishSections { at: DateTime<Utc> },
}

pub trait Storage {
    async fn read_all(&self) -> Result<Vec<WalOperation>, FolioError>;
    async fn write(&mut self, operation: WalOperation) -> Result<(), FolioError>;
}

pub struct FileStorage {
    wal_path: PathBuf,
}

impl FileStorage {
    pub fn new(wal_path: PathBuf) -> Self {
        Self { wal_path }
    }
}

impl Storage for FileStorage {
    async fn read_all(&self) -> Result<Vec<WalOperation>, FolioError> {
        let file_str = match tokio::fs::read_to_string(&self.wal_path).await {
            Ok(contents) => contents,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(err) => return Err(FolioError::WalIo(err)),
        };
        let operations = file_str.split('\n')
            .filter(|x| !x.is_empty())
            .map(|x| serde_json::from_str(x).map_err(FolioError::WalSerialization))
            .collect::<Result<Vec<WalOperation>, FolioError>>()?;
        Ok(operations)
    }

    async fn write(&mut self, operation: WalOperation) -> Result<(), FolioError> {
        let serialized_operation = serde_json::to_string(&operation)
            .map_err(FolioError::WalSerialization)?;
        let line = format!("{}\n", serialized_operation);
        let mut file = tokio::fs::OpenOptions::new()
            .append(true)
            .create(true)
            .open(&self.wal_path)
            .await
            .map_err(FolioError::WalIo)?;
        tokio::io::AsyncWriteExt::write_all(&mut file, line.as_bytes()).await
            .map_err(FolioError::WalIo)?;
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct InMemoryStorage {
    operations: Vec<WalOperation>,
}

impl Storage for InMemoryStorage {
    async fn read_all(&self) -> Result<Vec<WalOperation>, FolioError> {
        Ok(self.operations.clone())
    }

    async fn write(&mut self, operation: WalOperation) -> Result<(), FolioError> {
        self.operations.push(operation);
        Ok(())
    }
}

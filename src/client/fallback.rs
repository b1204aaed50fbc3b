use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::str::FromStr;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::warn;
use crate::client::{ApiClient, ClientError};
use crate::entities::content::validate_section;
use crate::entities::Section;
use crate::error::FolioError;

/// Where a section read or write actually landed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Remote,
    Local,
}

#[derive(Debug, Error)]
pub enum ContentError {
    #[error("{0}")]
    Client(ClientError),
    #[error("local content cache error: {0}")]
    Cache(#[from] FolioError),
    #[error("invalid content: {0}")]
    Invalid(String),
    #[error("the API is unreachable and no local copy of this section exists")]
    Unavailable,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct CacheFile {
    sections: BTreeMap<String, Value>,
    dirty: BTreeSet<String>,
}

/// JSON file under the workdir holding the last known copy of each section,
/// plus which ones still need to reach the server.
pub struct LocalContentCache {
    path: PathBuf,
}

impl LocalContentCache {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    async fn load(&self) -> Result<CacheFile, FolioError> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(CacheFile::default()),
            Err(err) => return Err(FolioError::FileRead(err)),
        };
        serde_json::from_str(&raw).map_err(FolioError::WalSerialization)
    }

    async fn save(&self, cache: &CacheFile) -> Result<(), FolioError> {
        let raw = serde_json::to_string_pretty(cache).map_err(FolioError::WalSerialization)?;
        tokio::fs::write(&self.path, raw).await.map_err(FolioError::FileWrite)
    }

    pub async fn get(&self, section: Section) -> Result<Option<Value>, FolioError> {
        let cache = self.load().await?;
        Ok(cache.sections.get(section.as_str()).cloned())
    }

    pub async fn put(&self, section: Section, content: Value, dirty: bool) -> Result<(), FolioError> {
        let mut cache = self.load().await?;
        cache.sections.insert(section.to_string(), content);
        if dirty {
            cache.dirty.insert(section.to_string());
        } else {
            cache.dirty.remove(section.as_str());
        }
        self.save(&cache).await
    }

    pub async fn dirty_sections(&self) -> Result<Vec<Section>, FolioError> {
        let cache = self.load().await?;
        Ok(cache.dirty.iter().filter_map(|s| Section::from_str(s).ok()).collect())
    }
}

/// Remote-first content access that degrades to the local cache when the
/// API is unreachable, mirroring how the editors keep working offline.
pub struct ContentService {
    client: ApiClient,
    cache: LocalContentCache,
}

impl ContentService {
    pub fn new(client: ApiClient, cache_path: PathBuf) -> Self {
        Self {
            client,
            cache: LocalContentCache::new(cache_path),
        }
    }

    pub async fn get(&self, section: Section) -> Result<(Value, Origin), ContentError> {
        match self.client.get_section(section).await {
            Ok(content) => {
                if let Err(err) = self.cache.put(section, content.clone(), false).await {
                    warn!("content cache write failed: {}", err);
                }
                Ok((content, Origin::Remote))
            }
            Err(err) if err.is_offline() => match self.cache.get(section).await? {
                Some(content) => Ok((content, Origin::Local)),
                None => Err(ContentError::Unavailable),
            },
            Err(err) => Err(ContentError::Client(err)),
        }
    }

    pub async fn put(&self, section: Section, content: Value) -> Result<Origin, ContentError> {
        let errors = validate_section(section, &content);
        if !errors.is_empty() {
            let joined = errors.iter()
                .map(|(field, msg)| format!("{field}: {msg}"))
                .collect::<Vec<_>>()
                .join("; ");
            return Err(ContentError::Invalid(joined));
        }

        match self.client.put_section(section, &content).await {
            Ok(_) => {
                self.cache.put(section, content, false).await?;
                Ok(Origin::Remote)
            }
            Err(err) if err.is_offline() => {
                self.cache.put(section, content, true).await?;
                Ok(Origin::Local)
            }
            Err(err) => Err(ContentError::Client(err)),
        }
    }

    /// Pushes locally saved sections to the server. Stops at the first
    /// offline failure and reports how many made it through.
    pub async fn flush(&self) -> Result<usize, ContentError> {
        let mut flushed = 0;
        for section in self.cache.dirty_sections().await? {
            let Some(content) = self.cache.get(section).await? else {
                continue;
            };
            match self.client.put_section(section, &content).await {
                Ok(_) => {
                    self.cache.put(section, content, false).await?;
                    flushed += 1;
                }
                Err(err) if err.is_offline() => break,
                Err(err) => return Err(ContentError::Client(err)),
            }
        }
        Ok(flushed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn offline_service(dir: &tempfile::TempDir) -> ContentService {
        // Port 9 is the discard port; nothing answers there.
        ContentService::new(
            ApiClient::new("http://127.0.0.1:9"),
            dir.path().join("content-local.json"),
        )
    }

    fn hero() -> Value {
        json!({ "title": "Offline first", "subtitle": "Saved without a server." })
    }

    #[tokio::test]
    async fn put_falls_back_to_the_local_cache_when_offline() {
        let dir = tempfile::tempdir().unwrap();
        let service = offline_service(&dir);

        let origin = service.put(Section::Hero, hero()).await.unwrap();
        assert_eq!(origin, Origin::Local);

        let (content, origin) = service.get(Section::Hero).await.unwrap();
        assert_eq!(origin, Origin::Local);
        assert_eq!(content["title"], "Offline first");

        let dirty = service.cache.dirty_sections().await.unwrap();
        assert_eq!(dirty, vec![Section::Hero]);
    }

    #[tokio::test]
    async fn get_without_any_copy_reports_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let service = offline_service(&dir);
        assert!(matches!(
            service.get(Section::Clients).await,
            Err(ContentError::Unavailable)
        ));
    }

    #[tokio::test]
    async fn invalid_content_is_rejected_before_any_write() {
        let dir = tempfile::tempdir().unwrap();
        let service = offline_service(&dir);

        let err = service
            .put(Section::Hero, json!({ "title": "", "subtitle": "x" }))
            .await
            .unwrap_err();
        assert!(matches!(err, ContentError::Invalid(_)));
        assert!(service.cache.get(Section::Hero).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn flush_stops_quietly_while_still_offline() {
        let dir = tempfile::tempdir().unwrap();
        let service = offline_service(&dir);

        service.put(Section::Hero, hero()).await.unwrap();
        let flushed = service.flush().await.unwrap();
        assert_eq!(flushed, 0);
        assert_eq!(service.cache.dirty_sections().await.unwrap(), vec![Section::Hero]);
    }
}

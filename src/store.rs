use std::path::PathBuf;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use itertools::Itertools;
use serde_json::Value;
use tracing::{debug, info};
use uuid::Uuid;
use crate::config::AppConfig;
use crate::entities::content::default_content;
use crate::entities::{
    BulkDeleteOutcome, DuplicateAction, Media, MediaId, Section, StoreResult, SyncReport,
};
use crate::error::FolioError;
use crate::storage::{Storage, WalOperation};
use crate::utils::hash_utils::MurMurHasher;

/// A fresh upload about to be stored, as parsed off the wire.
#[derive(Debug)]
pub struct NewUpload<'a> {
    pub original_name: &'a str,
    pub declared_mime: Option<&'a str>,
    pub alt: Option<String>,
    pub description: Option<String>,
    pub action: Option<DuplicateAction>,
}

/// In-memory CMS state, rebuilt from the WAL at startup. Media bytes live in
/// the upload directory; records and content sections live here.
pub struct CmsStore<S: Storage> {
    upload_dir: PathBuf,
    thumbnails_dir: PathBuf,
    storage: S,
    media_map: DashMap<MediaId, Media>,
    sections: DashMap<Section, Value>,
    published: DashMap<Section, Value>,
    published_at: Option<DateTime<Utc>>,
}

impl<S: Storage> CmsStore<S> {
    pub fn new(cfg: &AppConfig, storage: S) -> Self {
        Self {
            upload_dir: cfg.upload_dir.clone(),
            thumbnails_dir: cfg.thumbnails_dir.clone(),
            storage,
            media_map: DashMap::new(),
            sections: DashMap::new(),
            published: DashMap::new(),
            published_at: None,
        }
    }

    pub async fn init(&mut self) -> Result<(), FolioError> {
        info!("replaying WAL...");
        let operations = self.storage.read_all().await?;
        for operation in operations {
            self.apply_no_wal(operation);
        }
        info!("WAL replayed, {} media records, {} sections", self.media_map.len(), self.sections.len());
        Ok(())
    }

    fn apply_no_wal(&mut self, operation: WalOperation) {
        match operation {
            WalOperation::CreateMedia { media } | WalOperation::ReplaceMedia { media } => {
                self.media_map.insert(media.id.clone(), media);
            }
            WalOperation::DeleteMedia { media_id } => {
                self.media_map.remove(&media_id);
            }
            WalOperation::PutSection { section, content } => {
                self.sections.insert(section, content);
            }
            WalOperation::PublishSections { at } => {
                self.snapshot_published(at);
            }
        }
    }

    fn snapshot_published(&mut self, at: DateTime<Utc>) {
        for section in Section::ALL {
            self.published.insert(section, self.get_section(section));
        }
        self.published_at = Some(at);
    }

    async fn write_wal(&mut self, operation: WalOperation) -> Result<(), FolioError> {
        debug!("writing WAL op: {:?}", operation);
        self.storage.write(operation).await
    }

    // ------------------------------------------------------------------
    // media

    pub fn media_count(&self) -> usize {
        self.media_map.len()
    }

    pub fn get_media_by_id(&self, media_id: &str) -> Option<Media> {
        self.media_map.get(media_id).map(|x| x.value().clone())
    }

    pub fn get_media_by_hash(&self, hash: &str) -> Option<Media> {
        self.media_map.iter()
            .find(|x| x.value().hash == hash)
            .map(|x| x.value().clone())
    }

    pub fn list_media(&self, page_size: usize, page_index: usize) -> Vec<Media> {
        self.media_map.iter()
            .map(|x| x.value().clone())
            .sorted_by_key(|m| std::cmp::Reverse(m.created_at))
            .skip(page_index * page_size)
            .take(page_size)
            .collect()
    }

    pub fn media_path(&self, media: &Media) -> PathBuf {
        self.upload_dir.join(&media.name)
    }

    /// A stored file counts as a duplicate of an upload when the content
    /// hashes match, or when the original name and byte size both match.
    fn find_duplicate(&self, hash: &str, original_name: &str, size: i64) -> Option<Media> {
        self.media_map.iter()
            .find(|x| {
                let m = x.value();
                m.hash == hash || (m.original_name == original_name && m.size == size)
            })
            .map(|x| x.value().clone())
    }

    fn name_taken(&self, name: &str) -> bool {
        self.media_map.iter().any(|x| x.value().name == name)
    }

    fn unique_filename(&self, filename: &str) -> String {
        let mut unique_filename = filename.to_string();
        let mut suffix = 0;
        while self.upload_dir.join(&unique_filename).exists() || self.name_taken(&unique_filename) {
            suffix += 1;
            unique_filename = format!("dup{}-{}", suffix, filename);
        }
        unique_filename
    }

    fn resolve_mime(declared: Option<&str>, content: &[u8]) -> String {
        declared
            .map(|x| x.to_string())
            .or_else(|| infer::get(content).map(|x| x.mime_type().to_string()))
            .unwrap_or_else(|| "application/octet-stream".to_string())
    }

    pub async fn store_upload(&mut self, content: &[u8], upload: NewUpload<'_>) -> Result<StoreResult, FolioError> {
        if upload.original_name.is_empty() {
            return Err(FolioError::InvalidFilename("filename is empty".to_string()));
        }
        if upload.original_name.contains('/') || upload.original_name.contains('\\') {
            return Err(FolioError::InvalidFilename(upload.original_name.to_string()));
        }

        let hash = MurMurHasher::hash_bytes(content);
        let size = content.len() as i64;
        let mime_type = Self::resolve_mime(upload.declared_mime, content);
        let duplicate = self.find_duplicate(&hash, upload.original_name, size);

        match (duplicate, upload.action) {
            (Some(existing), None) => Ok(StoreResult::Duplicate { existing }),
            (Some(existing), Some(DuplicateAction::Replace)) => {
                let abs_path = self.upload_dir.join(&existing.name);
                tokio::fs::write(&abs_path, content).await.map_err(FolioError::FileWrite)?;
                let media = Media {
                    id: existing.id.clone(),
                    name: existing.name.clone(),
                    original_name: upload.original_name.to_string(),
                    size,
                    mime_type,
                    url: existing.url.clone(),
                    hash,
                    created_at: Utc::now(),
                    alt: upload.alt,
                    description: upload.description,
                };
                self.media_map.insert(media.id.clone(), media.clone());
                self.write_wal(WalOperation::ReplaceMedia { media: media.clone() }).await?;
                Ok(StoreResult::Replaced(media))
            }
            (duplicate, action) => {
                let renamed = duplicate.is_some() && action == Some(DuplicateAction::Rename);
                let name = self.unique_filename(upload.original_name);
                let abs_path = self.upload_dir.join(&name);
                tokio::fs::write(&abs_path, content).await.map_err(FolioError::FileWrite)?;
                let media = Media {
                    id: Uuid::new_v4().simple().to_string(),
                    url: format!("/uploads/{}", name),
                    name,
                    original_name: upload.original_name.to_string(),
                    size,
                    mime_type,
                    hash,
                    created_at: Utc::now(),
                    alt: upload.alt,
                    description: upload.description,
                };
                self.media_map.insert(media.id.clone(), media.clone());
                self.write_wal(WalOperation::CreateMedia { media: media.clone() }).await?;
                if renamed {
                    Ok(StoreResult::Renamed(media))
                } else {
                    Ok(StoreResult::Created(media))
                }
            }
        }
    }

    pub async fn delete_media(&mut self, media_id: &str) -> Result<Option<Media>, FolioError> {
        let maybe_media = self.media_map.remove(media_id).map(|x| x.1);
        if let Some(media) = &maybe_media {
            self.write_wal(WalOperation::DeleteMedia { media_id: media.id.clone() }).await?;
            let _ = tokio::fs::remove_file(self.media_path(media)).await;
            let _ = tokio::fs::remove_file(self.thumbnail_path(&media.id)).await;
        }
        Ok(maybe_media)
    }

    /// Deletes the given id set in one pass, reporting per-id failures
    /// instead of aborting the batch.
    pub async fn bulk_delete(&mut self, ids: &[MediaId]) -> Result<BulkDeleteOutcome, FolioError> {
        let mut outcome = BulkDeleteOutcome { deleted: 0, total: ids.len(), errors: Vec::new() };
        for id in ids {
            match self.delete_media(id).await? {
                Some(_) => outcome.deleted += 1,
                None => outcome.errors.push(format!("{id}: not found")),
            }
        }
        Ok(outcome)
    }

    /// Reconciles the upload directory with the catalog: indexes untracked
    /// files and drops records whose files are gone.
    pub async fn sync_upload_dir(&mut self) -> Result<SyncReport, FolioError> {
        let mut report = SyncReport::default();

        let orphaned: Vec<MediaId> = self.media_map.iter()
            .filter(|x| !self.upload_dir.join(&x.value().name).exists())
            .map(|x| x.key().clone())
            .collect();
        for media_id in orphaned {
            self.media_map.remove(&media_id);
            self.write_wal(WalOperation::DeleteMedia { media_id }).await?;
            report.removed += 1;
        }

        let mut dir = tokio::fs::read_dir(&self.upload_dir).await.map_err(FolioError::FileRead)?;
        while let Some(entry) = dir.next_entry().await.map_err(FolioError::FileRead)? {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let Some(name) = path.file_name().and_then(|x| x.to_str()).map(|x| x.to_string()) else {
                continue;
            };
            if self.name_taken(&name) {
                continue;
            }
            let content = tokio::fs::read(&path).await.map_err(FolioError::FileRead)?;
            let hash = MurMurHasher::hash_bytes(&content);
            if self.get_media_by_hash(&hash).is_some() {
                continue;
            }
            let media = Media {
                id: Uuid::new_v4().simple().to_string(),
                url: format!("/uploads/{}", name),
                original_name: name.clone(),
                name,
                size: content.len() as i64,
                mime_type: Self::resolve_mime(None, &content),
                hash,
                created_at: Utc::now(),
                alt: None,
                description: None,
            };
            self.media_map.insert(media.id.clone(), media.clone());
            self.write_wal(WalOperation::CreateMedia { media }).await?;
            report.added += 1;
        }

        report.total = self.media_map.len();
        Ok(report)
    }

    // ------------------------------------------------------------------
    // thumbnails

    pub fn thumbnail_path(&self, media_id: &str) -> PathBuf {
        self.thumbnails_dir.join(format!("{}.png", media_id))
    }

    pub fn media_without_thumbnail(&self) -> Vec<Media> {
        self.media_map.iter()
            .filter(|x| !self.thumbnail_path(&x.value().id).exists())
            .map(|x| x.value().clone())
            .sorted_by_key(|m| std::cmp::Reverse(m.created_at))
            .collect()
    }

    // ------------------------------------------------------------------
    // content sections

    pub fn get_section(&self, section: Section) -> Value {
        self.sections.get(&section)
            .map(|x| x.value().clone())
            .unwrap_or_else(|| default_content(section))
    }

    pub async fn put_section(&mut self, section: Section, content: Value) -> Result<(), FolioError> {
        self.sections.insert(section, content.clone());
        self.write_wal(WalOperation::PutSection { section, content }).await
    }

    pub async fn publish(&mut self) -> Result<DateTime<Utc>, FolioError> {
        let at = Utc::now();
        self.snapshot_published(at);
        self.write_wal(WalOperation::PublishSections { at }).await?;
        Ok(at)
    }

    pub fn published_section(&self, section: Section) -> Option<Value> {
        self.published.get(&section).map(|x| x.value().clone())
    }

    pub fn published_at(&self) -> Option<DateTime<Utc>> {
        self.published_at
    }

    pub fn section_count(&self) -> usize {
        self.sections.len()
    }

    /// True once the section has been written at least once; `get_section`
    /// answers with defaults either way.
    pub fn section_is_set(&self, section: Section) -> bool {
        self.sections.contains_key(&section)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{FileStorage, InMemoryStorage};
    use serde_json::json;

    fn test_config(dir: &tempfile::TempDir) -> AppConfig {
        AppConfig::new(
            dir.path().to_str().unwrap(),
            "uploads",
            "127.0.0.1:0",
            "http://127.0.0.1:0",
        )
        .unwrap()
    }

    fn upload<'a>(name: &'a str, action: Option<DuplicateAction>) -> NewUpload<'a> {
        NewUpload {
            original_name: name,
            declared_mime: Some("image/png"),
            alt: None,
            description: None,
            action,
        }
    }

    #[tokio::test]
    async fn second_identical_upload_is_a_duplicate() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = test_config(&dir);
        let mut store = CmsStore::new(&cfg, InMemoryStorage::default());

        let first = store.store_upload(b"bytes", upload("a.png", None)).await.unwrap();
        let StoreResult::Created(created) = first else { panic!("expected created") };

        let second = store.store_upload(b"bytes", upload("other-name.png", None)).await.unwrap();
        let StoreResult::Duplicate { existing } = second else { panic!("expected duplicate") };
        assert_eq!(existing.id, created.id);
        assert_eq!(store.media_count(), 1);
    }

    #[tokio::test]
    async fn same_name_and_size_is_a_duplicate() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = test_config(&dir);
        let mut store = CmsStore::new(&cfg, InMemoryStorage::default());

        store.store_upload(b"aaaa", upload("a.png", None)).await.unwrap();
        let result = store.store_upload(b"bbbb", upload("a.png", None)).await.unwrap();
        assert!(matches!(result, StoreResult::Duplicate { .. }));
    }

    #[tokio::test]
    async fn replace_keeps_the_id_and_swaps_content() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = test_config(&dir);
        let mut store = CmsStore::new(&cfg, InMemoryStorage::default());

        let StoreResult::Created(created) = store.store_upload(b"old", upload("a.png", None)).await.unwrap() else {
            panic!("expected created")
        };
        let result = store
            .store_upload(b"new bytes", upload("a.png", Some(DuplicateAction::Replace)))
            .await
            .unwrap();
        let StoreResult::Replaced(replaced) = result else { panic!("expected replaced") };
        assert_eq!(replaced.id, created.id);
        assert_eq!(replaced.name, created.name);
        assert_ne!(replaced.hash, created.hash);
        assert_eq!(store.media_count(), 1);
        let on_disk = std::fs::read(store.media_path(&replaced)).unwrap();
        assert_eq!(on_disk, b"new bytes");
    }

    #[tokio::test]
    async fn rename_stores_alongside_under_a_fresh_name() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = test_config(&dir);
        let mut store = CmsStore::new(&cfg, InMemoryStorage::default());

        let StoreResult::Created(created) = store.store_upload(b"bytes", upload("a.png", None)).await.unwrap() else {
            panic!("expected created")
        };
        let result = store
            .store_upload(b"bytes", upload("a.png", Some(DuplicateAction::Rename)))
            .await
            .unwrap();
        let StoreResult::Renamed(renamed) = result else { panic!("expected renamed") };
        assert_ne!(renamed.id, created.id);
        assert_eq!(renamed.name, "dup1-a.png");
        assert_eq!(renamed.original_name, "a.png");
        assert_eq!(store.media_count(), 2);
        assert!(store.get_media_by_id(&created.id).is_some());
    }

    #[tokio::test]
    async fn bulk_delete_reports_missing_ids() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = test_config(&dir);
        let mut store = CmsStore::new(&cfg, InMemoryStorage::default());

        let StoreResult::Created(created) = store.store_upload(b"bytes", upload("a.png", None)).await.unwrap() else {
            panic!("expected created")
        };
        let outcome = store.bulk_delete(&[created.id.clone(), "missing".to_string()]).await.unwrap();
        assert_eq!(outcome.deleted, 1);
        assert_eq!(outcome.total, 2);
        assert_eq!(outcome.errors, vec!["missing: not found".to_string()]);
        assert_eq!(store.media_count(), 0);
    }

    #[tokio::test]
    async fn sync_indexes_stray_files_and_drops_orphans() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = test_config(&dir);
        let mut store = CmsStore::new(&cfg, InMemoryStorage::default());

        let StoreResult::Created(created) = store.store_upload(b"bytes", upload("a.png", None)).await.unwrap() else {
            panic!("expected created")
        };
        std::fs::write(cfg.upload_dir.join("stray.jpg"), b"stray content").unwrap();
        std::fs::remove_file(store.media_path(&created)).unwrap();

        let report = store.sync_upload_dir().await.unwrap();
        assert_eq!(report.added, 1);
        assert_eq!(report.removed, 1);
        assert_eq!(report.total, 1);
        assert!(store.get_media_by_id(&created.id).is_none());
    }

    #[tokio::test]
    async fn publish_snapshots_drafts() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = test_config(&dir);
        let mut store = CmsStore::new(&cfg, InMemoryStorage::default());

        let draft = json!({ "title": "One", "subtitle": "First draft" });
        store.put_section(Section::Hero, draft.clone()).await.unwrap();
        store.publish().await.unwrap();
        store
            .put_section(Section::Hero, json!({ "title": "Two", "subtitle": "Second draft" }))
            .await
            .unwrap();

        assert_eq!(store.published_section(Section::Hero), Some(draft));
        assert_eq!(store.get_section(Section::Hero)["title"], "Two");
        assert!(store.published_at().is_some());
    }

    #[tokio::test]
    async fn wal_replay_restores_state() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = test_config(&dir);
        let created = {
            let mut store = CmsStore::new(&cfg, FileStorage::new(cfg.wal_path.clone()));
            store.init().await.unwrap();
            let StoreResult::Created(created) = store.store_upload(b"bytes", upload("a.png", None)).await.unwrap() else {
                panic!("expected created")
            };
            store.put_section(Section::Hero, json!({ "title": "T", "subtitle": "S" })).await.unwrap();
            created
        };

        let mut reopened = CmsStore::new(&cfg, FileStorage::new(cfg.wal_path.clone()));
        reopened.init().await.unwrap();
        assert_eq!(reopened.media_count(), 1);
        assert_eq!(reopened.get_media_by_id(&created.id).unwrap().name, "a.png");
        assert_eq!(reopened.get_section(Section::Hero)["title"], "T");
    }
}

use std::fmt;
use std::str::FromStr;
use chrono::{DateTime, Utc};
use mime::Mime;
use serde::{Deserialize, Serialize};

pub type MediaId = String;

pub const MAX_UPLOAD_SIZE_IN_BYTES: u64 = 52_428_800; // 50 MB

/// Only images and videos are accepted into the library.
pub fn is_allowed_mime(mime: &Mime) -> bool {
    mime.type_() == mime::IMAGE || mime.type_() == mime::VIDEO
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Media {
    pub id: MediaId,
    /// Stored filename, server-chosen on rename.
    pub name: String,
    pub original_name: String,
    pub size: i64,
    pub mime_type: String,
    pub url: String,
    pub hash: String,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Explicit resolution for a duplicate upload, carried on the wire as the
/// multipart `action` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DuplicateAction {
    Replace,
    Rename,
}

impl DuplicateAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            DuplicateAction::Replace => "replace",
            DuplicateAction::Rename => "rename",
        }
    }
}

impl FromStr for DuplicateAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "replace" => Ok(DuplicateAction::Replace),
            "rename" => Ok(DuplicateAction::Rename),
            other => Err(format!("unknown action: {other}")),
        }
    }
}

impl fmt::Display for DuplicateAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of storing an upload into the catalog.
#[derive(Debug, Clone)]
pub enum StoreResult {
    Created(Media),
    Replaced(Media),
    Renamed(Media),
    Duplicate { existing: Media },
}

fn is_false(value: &bool) -> bool {
    !*value
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    #[serde(flatten)]
    pub media: Media,
    #[serde(default, skip_serializing_if = "is_false")]
    pub replaced: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub renamed: bool,
}

/// Body of a 409 response: the stored file the upload collided with, and
/// what the server saw in the rejected upload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictBody {
    pub existing_file: ExistingFile,
    pub uploaded_file: UploadedFile,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExistingFile {
    pub id: String,
    pub name: String,
    pub size: i64,
    pub url: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedFile {
    pub original_name: String,
    #[serde(rename = "mimetype")]
    pub mimetype: String,
    pub size: i64,
}

impl ConflictBody {
    pub fn new(existing: &Media, original_name: &str, mimetype: &str, size: i64) -> Self {
        Self {
            existing_file: ExistingFile {
                id: existing.id.clone(),
                name: existing.name.clone(),
                size: existing.size,
                url: existing.url.clone(),
                created_at: existing.created_at.to_rfc3339(),
            },
            uploaded_file: UploadedFile {
                original_name: original_name.to_string(),
                mimetype: mimetype.to_string(),
                size,
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaPage {
    pub items: Vec<Media>,
    pub total: usize,
    pub page_size: usize,
    pub page_index: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkDeleteOutcome {
    pub deleted: usize,
    pub total: usize,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub added: usize,
    pub removed: usize,
    pub total: usize,
}

use std::path::PathBuf;
use std::pin::Pin;
use std::task::{Context, Poll};
use mime::Mime;
use reqwest::multipart;
use thiserror::Error;
use tokio::io::{AsyncRead, ReadBuf};
use tokio_util::io::ReaderStream;
use crate::client::conflict::{validate_conflict, UploadConflict};
use crate::client::{request_error, ApiClient, ClientError, FailureKind, ProgressFn};
use crate::entities::media::{is_allowed_mime, MAX_UPLOAD_SIZE_IN_BYTES};
use crate::entities::{DuplicateAction, Media, UploadResponse};

/// Rejections raised before any network traffic happens.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PreflightError {
    #[error("The file is too large ({size} bytes); the limit is 50 MB.")]
    TooLarge { size: u64 },
    #[error("Unsupported file type `{mime}`; only images and videos can be uploaded.")]
    UnsupportedType { mime: String },
}

/// Local checks applied to every upload before the request is built.
pub fn check_upload(size: u64, mime: &Mime) -> Result<(), PreflightError> {
    if size > MAX_UPLOAD_SIZE_IN_BYTES {
        return Err(PreflightError::TooLarge { size });
    }
    if !is_allowed_mime(mime) {
        return Err(PreflightError::UnsupportedType { mime: mime.to_string() });
    }
    Ok(())
}

#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub path: PathBuf,
    pub display_name: Option<String>,
    pub alt: Option<String>,
    pub description: Option<String>,
    pub action: Option<DuplicateAction>,
}

impl UploadRequest {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            display_name: None,
            alt: None,
            description: None,
            action: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct StoredUpload {
    pub media: Media,
    pub replaced: bool,
    pub renamed: bool,
}

impl StoredUpload {
    /// The confirmation line shown to the user after a successful upload.
    pub fn confirmation(&self) -> String {
        if self.replaced {
            format!("Replaced the existing file with {}.", self.media.name)
        } else if self.renamed {
            format!("Stored as {} alongside the existing file.", self.media.name)
        } else {
            format!("Uploaded {}.", self.media.name)
        }
    }
}

/// Everything an upload can come back as, decoded and validated once at the
/// API boundary. A duplicate is a workflow branch here, not an error.
#[derive(Debug)]
pub enum UploadOutcome {
    Stored(StoredUpload),
    Duplicate(UploadConflict),
}

struct ProgressReader<R> {
    inner: R,
    done: u64,
    total: u64,
    progress: Option<ProgressFn>,
}

impl<R> ProgressReader<R> {
    fn new(inner: R, total: u64, progress: Option<ProgressFn>) -> Self {
        Self { inner, done: 0, total, progress }
    }
}

impl<R: AsyncRead + Unpin> AsyncRead for ProgressReader<R> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        let me = self.get_mut();
        let before = buf.filled().len();
        match Pin::new(&mut me.inner).poll_read(cx, buf) {
            Poll::Ready(Ok(())) => {
                me.done += (buf.filled().len() - before) as u64;
                if let Some(report) = &me.progress {
                    report(me.done, me.total);
                }
                Poll::Ready(Ok(()))
            }
            other => other,
        }
    }
}

impl ApiClient {
    /// Uploads one file. Oversized or non-media files are rejected locally;
    /// a 409 comes back as [`UploadOutcome::Duplicate`] after its payload
    /// passed structural validation.
    pub async fn upload(
        &self,
        request: &UploadRequest,
        progress: Option<ProgressFn>,
    ) -> Result<UploadOutcome, ClientError> {
        let metadata = tokio::fs::metadata(&request.path).await
            .map_err(|e| ClientError::File(e.to_string()))?;
        let size = metadata.len();
        let mime = mime_guess::from_path(&request.path)
            .first()
            .unwrap_or(mime::APPLICATION_OCTET_STREAM);
        check_upload(size, &mime)?;

        let filename = request.path.file_name()
            .and_then(|x| x.to_str())
            .map(|x| x.to_string())
            .ok_or_else(|| ClientError::File("path has no filename".to_string()))?;

        let file = tokio::fs::File::open(&request.path).await
            .map_err(|e| ClientError::File(e.to_string()))?;
        let stream = ReaderStream::new(ProgressReader::new(file, size, progress));
        let part = multipart::Part::stream_with_length(reqwest::Body::wrap_stream(stream), size)
            .file_name(filename)
            .mime_str(mime.as_ref())
            .map_err(|e| ClientError::Decode(e.to_string()))?;

        let mut form = multipart::Form::new().part("file", part);
        if let Some(name) = &request.display_name {
            form = form.text("name", name.clone());
        }
        if let Some(alt) = &request.alt {
            form = form.text("alt", alt.clone());
        }
        if let Some(description) = &request.description {
            form = form.text("description", description.clone());
        }
        if let Some(action) = request.action {
            form = form.text("action", action.as_str());
        }

        let url = format!("{}/media", self.base_url());
        let response = self.http().post(&url).multipart(form).send().await
            .map_err(request_error)?;

        let status = response.status();
        if status.is_success() {
            let decoded: UploadResponse = response.json().await
                .map_err(|e| ClientError::Decode(e.to_string()))?;
            Ok(UploadOutcome::Stored(StoredUpload {
                media: decoded.media,
                replaced: decoded.replaced,
                renamed: decoded.renamed,
            }))
        } else if status == reqwest::StatusCode::CONFLICT {
            let raw: serde_json::Value = response.json().await
                .map_err(|e| ClientError::Decode(e.to_string()))?;
            let conflict = validate_conflict(&raw)?;
            Ok(UploadOutcome::Duplicate(conflict))
        } else {
            Err(ClientError::Http(FailureKind::from_status(status.as_u16())))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn size_limit_is_50_mb_inclusive() {
        let png: Mime = "image/png".parse().unwrap();
        assert_eq!(check_upload(MAX_UPLOAD_SIZE_IN_BYTES, &png), Ok(()));
        assert_eq!(
            check_upload(MAX_UPLOAD_SIZE_IN_BYTES + 1, &png),
            Err(PreflightError::TooLarge { size: MAX_UPLOAD_SIZE_IN_BYTES + 1 })
        );
    }

    #[test]
    fn only_images_and_videos_pass() {
        assert!(check_upload(10, &"video/mp4".parse().unwrap()).is_ok());
        assert!(matches!(
            check_upload(10, &"application/pdf".parse().unwrap()),
            Err(PreflightError::UnsupportedType { .. })
        ));
        assert!(matches!(
            check_upload(10, &mime::APPLICATION_OCTET_STREAM),
            Err(PreflightError::UnsupportedType { .. })
        ));
    }

    #[test]
    fn confirmation_mentions_the_stored_name() {
        let media = Media {
            id: "m1".to_string(),
            name: "dup1-photo.png".to_string(),
            original_name: "photo.png".to_string(),
            size: 10,
            mime_type: "image/png".to_string(),
            url: "/uploads/dup1-photo.png".to_string(),
            hash: "h".to_string(),
            created_at: chrono::Utc::now(),
            alt: None,
            description: None,
        };
        let renamed = StoredUpload { media: media.clone(), replaced: false, renamed: true };
        assert!(renamed.confirmation().contains("dup1-photo.png"));

        let replaced = StoredUpload { media, replaced: true, renamed: false };
        assert!(replaced.confirmation().starts_with("Replaced"));
    }

    #[tokio::test]
    async fn bad_type_never_reaches_the_network() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, b"plain text").unwrap();

        // Nothing listens on this port; a network attempt would surface as
        // an Http error, not a Preflight one.
        let client = ApiClient::new("http://127.0.0.1:9");
        let err = client.upload(&UploadRequest::new(path), None).await.unwrap_err();
        assert!(matches!(err, ClientError::Preflight(PreflightError::UnsupportedType { .. })));
    }

    #[tokio::test]
    async fn oversize_file_never_reaches_the_network() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("huge.png");
        let file = std::fs::File::create(&path).unwrap();
        file.set_len(MAX_UPLOAD_SIZE_IN_BYTES + 1).unwrap();

        let client = ApiClient::new("http://127.0.0.1:9");
        let err = client.upload(&UploadRequest::new(path), None).await.unwrap_err();
        assert!(matches!(err, ClientError::Preflight(PreflightError::TooLarge { .. })));
    }
}

pub mod bulk;
pub mod conflict;
pub mod fallback;
pub mod resolution;
pub mod upload;

use std::sync::Arc;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use thiserror::Error;
use crate::entities::{BulkDeleteOutcome, MediaId, MediaPage, Section, SyncReport};
use crate::thumbnails::{ThumbnailReport, ThumbnailStatus};
pub use self::conflict::ConflictValidationError;
pub use self::upload::PreflightError;

/// Byte-progress callback: `(done, total)`.
pub type ProgressFn = Arc<dyn Fn(u64, u64) + Send + Sync>;

/// What went wrong from the user's point of view. Every server status the
/// UI knows how to talk about gets its own kind with a fixed message;
/// anything else falls back to [`FailureKind::Other`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    BadRequest,
    Unauthorized,
    Forbidden,
    PayloadTooLarge,
    UnsupportedMediaType,
    UnprocessableEntity,
    TooManyRequests,
    Internal,
    BadGateway,
    ServiceUnavailable,
    GatewayTimeout,
    NoConnection,
    Timeout,
    Other,
}

impl FailureKind {
    pub fn from_status(status: u16) -> Self {
        match status {
            400 => Self::BadRequest,
            401 => Self::Unauthorized,
            403 => Self::Forbidden,
            413 => Self::PayloadTooLarge,
            415 => Self::UnsupportedMediaType,
            422 => Self::UnprocessableEntity,
            429 => Self::TooManyRequests,
            500 => Self::Internal,
            502 => Self::BadGateway,
            503 => Self::ServiceUnavailable,
            504 => Self::GatewayTimeout,
            _ => Self::Other,
        }
    }

    pub fn from_reqwest(err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else {
            Self::NoConnection
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            Self::BadRequest => "The server rejected the request. Check the file and try again.",
            Self::Unauthorized => "You are not signed in. Sign in and try again.",
            Self::Forbidden => "You do not have permission to manage media.",
            Self::PayloadTooLarge => "The file is too large for the server (max 50 MB).",
            Self::UnsupportedMediaType => "The server does not accept this file type.",
            Self::UnprocessableEntity => "The upload was rejected as invalid.",
            Self::TooManyRequests => "Too many requests. Wait a moment and try again.",
            Self::Internal => "The server hit an internal error. Try again later.",
            Self::BadGateway => "The server is temporarily unreachable (bad gateway).",
            Self::ServiceUnavailable => "The service is temporarily unavailable. Try again later.",
            Self::GatewayTimeout => "The server took too long to respond (gateway timeout).",
            Self::NoConnection => "Could not reach the server. Check your connection.",
            Self::Timeout => "The request timed out. Try again.",
            Self::Other => "Something went wrong while talking to the server.",
        }
    }
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("{}", .0.message())]
    Http(FailureKind),

    #[error(transparent)]
    Preflight(#[from] PreflightError),

    #[error(transparent)]
    InvalidConflict(#[from] ConflictValidationError),

    #[error("could not read the selected file: {0}")]
    File(String),

    #[error("failed to decode server response: {0}")]
    Decode(String),
}

impl ClientError {
    /// True for failures that mean the API itself is unreachable, which is
    /// when the content service may fall back to its local cache.
    pub fn is_offline(&self) -> bool {
        matches!(self, Self::Http(FailureKind::NoConnection | FailureKind::Timeout))
    }
}

pub(crate) fn request_error(err: reqwest::Error) -> ClientError {
    ClientError::Http(FailureKind::from_reqwest(&err))
}

#[derive(Clone, Debug)]
pub struct ApiClient {
    client: Client,
    api_url: String,
}

impl ApiClient {
    pub fn new(api_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_url: api_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.api_url
    }

    pub(crate) fn http(&self) -> &Client {
        &self.client
    }

    async fn expect_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ClientError> {
        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::Http(FailureKind::from_status(status.as_u16())));
        }
        response.json::<T>().await.map_err(|e| ClientError::Decode(e.to_string()))
    }

    pub async fn ping(&self) -> Result<bool, ClientError> {
        let url = format!("{}/ping", self.api_url);
        let response = self.client.get(&url).send().await.map_err(request_error)?;
        Ok(response.status().is_success())
    }

    pub async fn list_media(&self, page_size: usize, page_index: usize) -> Result<MediaPage, ClientError> {
        let url = format!("{}/media", self.api_url);
        let response = self.client.get(&url)
            .query(&[("page_size", page_size), ("page_index", page_index)])
            .send()
            .await
            .map_err(request_error)?;
        Self::expect_json(response).await
    }

    /// One aggregate request for the whole id set. The server answers once,
    /// so progress is simulated from response download bytes.
    pub async fn bulk_delete(&self, ids: &[MediaId], progress: Option<ProgressFn>) -> Result<BulkDeleteOutcome, ClientError> {
        let url = format!("{}/media/bulk/delete", self.api_url);
        let mut response = self.client.delete(&url)
            .json(&json!({ "ids": ids }))
            .send()
            .await
            .map_err(request_error)?;
        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::Http(FailureKind::from_status(status.as_u16())));
        }

        let total = response.content_length().unwrap_or(0);
        let mut received = 0u64;
        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await.map_err(request_error)? {
            received += chunk.len() as u64;
            if let Some(report) = &progress {
                let pct = if total > 0 { (received * 100 / total).min(100) } else { 100 };
                report(pct, 100);
            }
            body.extend_from_slice(&chunk);
        }
        serde_json::from_slice(&body).map_err(|e| ClientError::Decode(e.to_string()))
    }

    pub async fn sync(&self) -> Result<SyncReport, ClientError> {
        let url = format!("{}/media/sync", self.api_url);
        let response = self.client.post(&url).send().await.map_err(request_error)?;
        Self::expect_json(response).await
    }

    pub async fn check_thumbnails(&self) -> Result<ThumbnailStatus, ClientError> {
        let url = format!("{}/media/check-thumbnails", self.api_url);
        let response = self.client.get(&url).send().await.map_err(request_error)?;
        Self::expect_json(response).await
    }

    pub async fn regenerate_thumbnails(&self) -> Result<ThumbnailReport, ClientError> {
        let url = format!("{}/media/regenerate-thumbnails", self.api_url);
        let response = self.client.post(&url).send().await.map_err(request_error)?;
        Self::expect_json(response).await
    }

    pub async fn get_section(&self, section: Section) -> Result<Value, ClientError> {
        let url = format!("{}/api/services/{}", self.api_url, section);
        let response = self.client.get(&url).send().await.map_err(request_error)?;
        Self::expect_json(response).await
    }

    pub async fn put_section(&self, section: Section, content: &Value) -> Result<Value, ClientError> {
        let url = format!("{}/api/services/{}", self.api_url, section);
        let response = self.client.put(&url).json(content).send().await.map_err(request_error)?;
        Self::expect_json(response).await
    }

    pub async fn publish(&self) -> Result<Value, ClientError> {
        let url = format!("{}/api/services/publish", self.api_url);
        let response = self.client.post(&url).send().await.map_err(request_error)?;
        Self::expect_json(response).await
    }

    pub async fn services_health(&self) -> Result<Value, ClientError> {
        let url = format!("{}/api/services/health", self.api_url);
        let response = self.client.get(&url).send().await.map_err(request_error)?;
        Self::expect_json(response).await
    }
}

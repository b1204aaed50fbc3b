use std::sync::Mutex;
use std::time::Duration;
use thiserror::Error;
use crate::client::conflict::UploadConflict;
use crate::client::upload::{StoredUpload, UploadOutcome, UploadRequest};
use crate::client::{ApiClient, ClientError};
use crate::entities::DuplicateAction;

/// Safety net against a stuck resolution upload: after this long without a
/// response the flow resets itself instead of leaving the UI wedged.
pub const RESOLUTION_WATCHDOG: Duration = Duration::from_secs(60);

/// Re-runs an upload with an explicit duplicate action. The seam exists so
/// the flow can be driven against a scripted uploader in tests.
pub trait ResolutionUploader {
    async fn upload_with_action(
        &self,
        request: &UploadRequest,
        action: DuplicateAction,
    ) -> Result<UploadOutcome, ClientError>;
}

impl ResolutionUploader for ApiClient {
    async fn upload_with_action(
        &self,
        request: &UploadRequest,
        action: DuplicateAction,
    ) -> Result<UploadOutcome, ClientError> {
        let mut request = request.clone();
        request.action = Some(action);
        self.upload(&request, None).await
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FlowState {
    #[default]
    Idle,
    DialogOpen,
    Processing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Replace,
    Rename,
}

impl Resolution {
    fn action(self) -> DuplicateAction {
        match self {
            Resolution::Replace => DuplicateAction::Replace,
            Resolution::Rename => DuplicateAction::Rename,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FlowError {
    #[error("another duplicate resolution is already active")]
    AlreadyActive,
    #[error("no conflict dialog is open")]
    NoDialog,
}

#[derive(Debug)]
pub enum ResolveOutcome {
    Completed(StoredUpload),
    StillConflicting,
    Failed { message: String },
    TimedOut,
}

impl ResolveOutcome {
    pub fn message(&self) -> String {
        match self {
            ResolveOutcome::Completed(stored) => stored.confirmation(),
            ResolveOutcome::StillConflicting => {
                "The server still reports a duplicate; nothing was changed.".to_string()
            }
            ResolveOutcome::Failed { message } => message.clone(),
            ResolveOutcome::TimedOut => {
                "No response arrived in time; the duplicate resolution was reset.".to_string()
            }
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum CancelOutcome {
    /// Conflict state fully cleared.
    Cleared,
    /// A resolution upload is mid-flight; tearing it down now would leave
    /// things half-done, so the cancel is refused and the user warned.
    BlockedWhileProcessing,
    NothingToCancel,
}

impl CancelOutcome {
    pub fn message(&self) -> &'static str {
        match self {
            CancelOutcome::Cleared => "Upload cancelled; the existing file is untouched.",
            CancelOutcome::BlockedWhileProcessing => {
                "A resolution is still running; wait for it to finish."
            }
            CancelOutcome::NothingToCancel => "No duplicate resolution is active.",
        }
    }
}

#[derive(Default)]
struct FlowInner {
    state: FlowState,
    conflict: Option<UploadConflict>,
    pending: Option<UploadRequest>,
    progress_bytes: u64,
}

/// Drives one duplicate-resolution flow at a time:
/// `Idle -> DialogOpen -> Processing -> Idle`. The `Processing` state doubles
/// as the mutex: replace/rename/cancel are refused while an upload is
/// mid-flight, and a watchdog timer resets the flow if no response arrives.
pub struct ResolutionFlow<U> {
    uploader: U,
    watchdog: Duration,
    inner: Mutex<FlowInner>,
}

impl<U: ResolutionUploader> ResolutionFlow<U> {
    pub fn new(uploader: U) -> Self {
        Self::with_watchdog(uploader, RESOLUTION_WATCHDOG)
    }

    pub fn with_watchdog(uploader: U, watchdog: Duration) -> Self {
        Self {
            uploader,
            watchdog,
            inner: Mutex::new(FlowInner::default()),
        }
    }

    pub fn state(&self) -> FlowState {
        self.lock().state
    }

    pub fn conflict(&self) -> Option<UploadConflict> {
        self.lock().conflict.clone()
    }

    pub fn progress_bytes(&self) -> u64 {
        self.lock().progress_bytes
    }

    pub fn record_progress(&self, bytes: u64) {
        let mut inner = self.lock();
        if inner.state == FlowState::Processing {
            inner.progress_bytes = bytes;
        }
    }

    /// Opens the dialog for a validated conflict, remembering the original
    /// request so replace/rename can re-run it.
    pub fn open(&self, conflict: UploadConflict, request: UploadRequest) -> Result<(), FlowError> {
        let mut inner = self.lock();
        if inner.state != FlowState::Idle {
            return Err(FlowError::AlreadyActive);
        }
        inner.state = FlowState::DialogOpen;
        inner.conflict = Some(conflict);
        inner.pending = Some(request);
        inner.progress_bytes = 0;
        Ok(())
    }

    /// Re-runs the upload with the chosen action under the watchdog. The
    /// flow always ends back at `Idle`, whatever the upload does.
    pub async fn resolve(&self, resolution: Resolution) -> Result<ResolveOutcome, FlowError> {
        let request = {
            let mut inner = self.lock();
            if inner.state != FlowState::DialogOpen {
                return Err(FlowError::NoDialog);
            }
            let Some(request) = inner.pending.clone() else {
                return Err(FlowError::NoDialog);
            };
            inner.state = FlowState::Processing;
            request
        };

        let upload = self.uploader.upload_with_action(&request, resolution.action());
        let result = tokio::time::timeout(self.watchdog, upload).await;
        self.cleanup();

        Ok(match result {
            Err(_) => ResolveOutcome::TimedOut,
            Ok(Ok(UploadOutcome::Stored(stored))) => ResolveOutcome::Completed(stored),
            Ok(Ok(UploadOutcome::Duplicate(_))) => ResolveOutcome::StillConflicting,
            Ok(Err(err)) => ResolveOutcome::Failed { message: err.to_string() },
        })
    }

    /// Dialog-close routes through here as well. Refused while processing.
    pub fn cancel(&self) -> CancelOutcome {
        let mut inner = self.lock();
        match inner.state {
            FlowState::Processing => CancelOutcome::BlockedWhileProcessing,
            FlowState::DialogOpen => {
                *inner = FlowInner::default();
                CancelOutcome::Cleared
            }
            FlowState::Idle => CancelOutcome::NothingToCancel,
        }
    }

    /// The one place that clears conflict, dialog/processing state, the
    /// pending request and the progress counter together.
    fn cleanup(&self) {
        *self.lock() = FlowInner::default();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FlowInner> {
        self.inner.lock().expect("resolution flow lock poisoned")
    }
}

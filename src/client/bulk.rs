use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;
use crate::client::{ApiClient, ClientError, ProgressFn};
use crate::entities::{BulkDeleteOutcome, MediaId};

/// How many per-id error lines a summary shows before collapsing the rest
/// into an overflow count.
pub const MAX_ERROR_LINES: usize = 3;

/// Issues the batch request. The seam exists so capture semantics can be
/// tested against a recording deleter.
pub trait BulkDeleter {
    async fn bulk_delete(
        &self,
        ids: &[MediaId],
        progress: Option<ProgressFn>,
    ) -> Result<BulkDeleteOutcome, ClientError>;
}

impl BulkDeleter for ApiClient {
    async fn bulk_delete(
        &self,
        ids: &[MediaId],
        progress: Option<ProgressFn>,
    ) -> Result<BulkDeleteOutcome, ClientError> {
        ApiClient::bulk_delete(self, ids, progress).await
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BulkDeleteError {
    #[error("a bulk delete is already in progress")]
    AlreadyRunning,
    #[error("{0}")]
    Client(String),
}

struct InFlightGuard<'a>(&'a AtomicBool);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Runs one batch delete at a time over an id set captured at confirmation.
/// The ids are owned by the job from the moment `run` is called, so a list
/// that refreshes mid-request cannot change the payload.
#[derive(Default)]
pub struct BulkDeleteController {
    in_flight: AtomicBool,
}

impl BulkDeleteController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_running(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }

    pub async fn run<D: BulkDeleter>(
        &self,
        deleter: &D,
        confirmed_ids: Vec<MediaId>,
        progress: Option<ProgressFn>,
    ) -> Result<BulkDeleteOutcome, BulkDeleteError> {
        if self.in_flight.swap(true, Ordering::SeqCst) {
            return Err(BulkDeleteError::AlreadyRunning);
        }
        let _guard = InFlightGuard(&self.in_flight);

        deleter
            .bulk_delete(&confirmed_ids, progress)
            .await
            .map_err(|err| BulkDeleteError::Client(err.to_string()))
    }
}

/// Renders the aggregate outcome: headline, up to [`MAX_ERROR_LINES`] error
/// lines, then an overflow count.
pub fn summary(outcome: &BulkDeleteOutcome) -> String {
    let mut lines = vec![format!("Deleted {} of {} files.", outcome.deleted, outcome.total)];
    for err in outcome.errors.iter().take(MAX_ERROR_LINES) {
        lines.push(format!("  {err}"));
    }
    let overflow = outcome.errors.len().saturating_sub(MAX_ERROR_LINES);
    if overflow > 0 {
        lines.push(format!("  ...and {overflow} more errors."));
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    struct RecordingDeleter {
        delay: Duration,
        seen: Mutex<Vec<Vec<MediaId>>>,
    }

    impl RecordingDeleter {
        fn new(delay: Duration) -> Self {
            Self { delay, seen: Mutex::new(Vec::new()) }
        }
    }

    impl BulkDeleter for Arc<RecordingDeleter> {
        async fn bulk_delete(
            &self,
            ids: &[MediaId],
            _progress: Option<ProgressFn>,
        ) -> Result<BulkDeleteOutcome, ClientError> {
            self.seen.lock().unwrap().push(ids.to_vec());
            tokio::time::sleep(self.delay).await;
            Ok(BulkDeleteOutcome { deleted: ids.len(), total: ids.len(), errors: Vec::new() })
        }
    }

    #[tokio::test]
    async fn payload_is_the_id_set_captured_at_confirmation() {
        let deleter = Arc::new(RecordingDeleter::new(Duration::ZERO));
        let controller = BulkDeleteController::new();

        let mut displayed: Vec<MediaId> = vec!["a".into(), "b".into(), "c".into()];
        let confirmed = displayed.clone();
        // The displayed list refreshing afterwards must not leak into the job.
        displayed.push("d".into());

        controller.run(&deleter, confirmed, None).await.unwrap();
        assert_eq!(deleter.seen.lock().unwrap()[0], vec!["a".to_string(), "b".to_string(), "c".to_string()]);
    }

    #[tokio::test]
    async fn double_submission_is_rejected() {
        let deleter = Arc::new(RecordingDeleter::new(Duration::from_millis(200)));
        let controller = Arc::new(BulkDeleteController::new());

        let task = {
            let controller = controller.clone();
            let deleter = deleter.clone();
            tokio::spawn(async move { controller.run(&deleter, vec!["a".into()], None).await })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(controller.is_running());
        assert_eq!(
            controller.run(&deleter, vec!["b".into()], None).await.unwrap_err(),
            BulkDeleteError::AlreadyRunning
        );

        task.await.unwrap().unwrap();
        assert!(!controller.is_running());
        controller.run(&deleter, vec!["c".into()], None).await.unwrap();
        assert_eq!(deleter.seen.lock().unwrap().len(), 2);
    }

    #[test]
    fn summary_caps_error_lines_and_counts_the_rest() {
        let outcome = BulkDeleteOutcome {
            deleted: 1,
            total: 6,
            errors: (1..=5).map(|i| format!("id{i}: not found")).collect(),
        };
        let text = summary(&outcome);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "Deleted 1 of 6 files.");
        assert_eq!(lines.len(), 5);
        assert_eq!(lines[4], "  ...and 2 more errors.");
    }

    #[test]
    fn summary_with_few_errors_has_no_overflow_line() {
        let outcome = BulkDeleteOutcome {
            deleted: 2,
            total: 3,
            errors: vec!["x: not found".to_string()],
        };
        let text = summary(&outcome);
        assert_eq!(text.lines().count(), 2);
        assert!(!text.contains("more errors"));
    }
}

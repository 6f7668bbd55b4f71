//! Immediate, non-queued upload.
//!
//! Unlike the queue, this path is cancellable: switching the active project
//! cancels the one upload in flight.

use crate::api::{sanitize_error_message, CaseBackend, UploadResult};
use crate::context::ProjectContext;
use crate::error::{CasePilotError, Result};
use crate::events::{EventBus, NoticeLevel, RefreshReason};
use crate::logging::{log_error, log_info};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;

use super::types::DocumentFile;

const SOURCE: &str = "upload-queue";

#[derive(Clone)]
pub struct SingleUpload {
    backend: Arc<dyn CaseBackend>,
    events: EventBus,
    project: ProjectContext,
    /// Token of the upload in flight, tagged with its generation
    in_flight: Arc<Mutex<Option<(u64, CancellationToken)>>>,
    generation: Arc<AtomicU64>,
}

impl SingleUpload {
    pub fn new(backend: Arc<dyn CaseBackend>, events: EventBus, project: ProjectContext) -> Self {
        Self {
            backend,
            events,
            project,
            in_flight: Arc::new(Mutex::new(None)),
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Upload one document now. Starting a new upload replaces (and cancels)
    /// the previous one.
    pub async fn upload(&self, file: DocumentFile) -> Result<UploadResult> {
        let project = self.project.current().ok_or_else(|| {
            CasePilotError::Validation("Select a project before uploading.".to_string())
        })?;

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let token = CancellationToken::new();
        {
            let mut in_flight = self.in_flight.lock()?;
            if let Some((_, previous)) = in_flight.replace((generation, token.clone())) {
                previous.cancel();
            }
        }

        log_info(
            SOURCE,
            &format!("📤 Direct upload of {} to {}", file.file_name, project),
        )
        .unwrap_or_default();

        let result = tokio::select! {
            _ = token.cancelled() => Err(CasePilotError::Cancelled),
            result = self.backend.upload_document(&file, &project) => result,
        };

        self.clear(generation);

        match &result {
            Ok(upload) => {
                self.events.notice(
                    SOURCE,
                    NoticeLevel::Success,
                    format!("Success! {} cases generated.", upload.count),
                );
                self.events
                    .request_refresh(SOURCE, RefreshReason::UploadCompleted);
            }
            Err(CasePilotError::Cancelled) => {
                log_info(
                    SOURCE,
                    &format!("Upload of {} cancelled by project switch", file.file_name),
                )
                .unwrap_or_default();
            }
            Err(e) => {
                log_error(
                    SOURCE,
                    &format!("✗ Direct upload failed: {} - Error: {}", file.file_name, e),
                )
                .unwrap_or_default();
                self.events.error_notice(
                    SOURCE,
                    "Upload Failed",
                    sanitize_error_message(&e.to_string()),
                );
            }
        }

        result
    }

    /// Cancel the upload in flight. Returns false if there was none.
    pub fn cancel_in_flight(&self) -> bool {
        let taken = match self.in_flight.lock() {
            Ok(mut in_flight) => in_flight.take(),
            Err(_) => None,
        };

        match taken {
            Some((_, token)) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    pub fn is_uploading(&self) -> bool {
        self.in_flight
            .lock()
            .map(|in_flight| in_flight.is_some())
            .unwrap_or(false)
    }

    fn clear(&self, generation: u64) {
        if let Ok(mut in_flight) = self.in_flight.lock() {
            if matches!(in_flight.as_ref(), Some((current, _)) if *current == generation) {
                *in_flight = None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::QUEUE_QUOTA_MESSAGE;
    use crate::events::AppEventPayload;
    use crate::testing::FakeBackend;
    use std::time::Duration;

    fn document() -> DocumentFile {
        DocumentFile::new("/tmp/login.docx", "login.docx", 512)
    }

    fn setup(backend: Arc<FakeBackend>) -> (SingleUpload, EventBus) {
        let events = EventBus::default();
        let project = ProjectContext::new(Some("Web".to_string()));
        (SingleUpload::new(backend, events.clone(), project), events)
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_notifies_and_refreshes() {
        let backend = Arc::new(FakeBackend::new());
        backend.push_upload_ok(7);
        let (single, events) = setup(backend.clone());
        let mut rx = events.subscribe();

        let result = single.upload(document()).await.unwrap();
        assert_eq!(result.count, 7);
        assert!(!single.is_uploading());
        assert_eq!(backend.uploads(), vec![("login.docx".to_string(), "Web".to_string())]);

        let notice = rx.recv().await.unwrap();
        assert_eq!(
            notice.payload,
            AppEventPayload::Notice {
                level: NoticeLevel::Success,
                message: "Success! 7 cases generated.".to_string(),
            }
        );
        assert!(rx.recv().await.unwrap().triggers_refresh());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_in_flight() {
        let backend = Arc::new(FakeBackend::new());
        backend.set_upload_delay(Duration::from_secs(30));
        let (single, events) = setup(backend);
        let mut rx = events.subscribe();

        let task = {
            let single = single.clone();
            tokio::spawn(async move { single.upload(document()).await })
        };

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(single.is_uploading());
        assert!(single.cancel_in_flight());

        let result = task.await.unwrap();
        assert!(matches!(result, Err(CasePilotError::Cancelled)));
        assert!(!single.cancel_in_flight());

        // Cancellation is silent
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_shows_error_notice() {
        let backend = Arc::new(FakeBackend::new());
        backend.push_upload_err("No test cases found in document");
        let (single, events) = setup(backend);
        let mut rx = events.subscribe();

        assert!(single.upload(document()).await.is_err());

        let event = rx.recv().await.unwrap();
        assert_eq!(
            event.payload,
            AppEventPayload::ErrorNotice {
                title: "Upload Failed".to_string(),
                message: "No test cases found in document".to_string(),
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_quota_failure_is_rewritten() {
        let backend = Arc::new(FakeBackend::new());
        backend.push_upload_err(
            r#"429 RESOURCE_EXHAUSTED. {"error": {"code": 429, "message": "Quota exceeded"}}"#,
        );
        let (single, events) = setup(backend);
        let mut rx = events.subscribe();

        let err = single.upload(document()).await.unwrap_err();
        assert!(err.is_quota());

        let event = rx.recv().await.unwrap();
        assert_eq!(
            event.payload,
            AppEventPayload::ErrorNotice {
                title: "Upload Failed".to_string(),
                message: QUEUE_QUOTA_MESSAGE.to_string(),
            }
        );
    }

    #[tokio::test]
    async fn test_requires_active_project() {
        let backend = Arc::new(FakeBackend::new());
        let single = SingleUpload::new(
            backend.clone(),
            EventBus::default(),
            ProjectContext::default(),
        );

        let err = single.upload(document()).await.unwrap_err();
        assert!(matches!(err, CasePilotError::Validation(_)));
        assert!(backend.uploads().is_empty());
    }
}

//! Sequential upload processor.
//!
//! Drains the queue one item at a time in FIFO order. A single `is_running`
//! latch keeps at most one loop alive per queue.

use crate::api::{sanitize_error_message, CaseBackend, UploadResult};
use crate::context::ProjectContext;
use crate::error::{CasePilotError, Result};
use crate::events::{AppEventPayload, EventBus, NoticeLevel, RefreshReason};
use crate::logging::{log_error, log_info, log_warn};
use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::sleep;
use uuid::Uuid;

use super::queue_manager::{self, ClaimCounter, SharedQueue};
use super::types::{
    Phase, UploadQueueItem, AI_ANALYZING_DELAY, EXTRACTING_DELAY, QUEUE_CLEANUP_DELAY,
};

const SOURCE: &str = "upload-queue";

/// Phases a cosmetic timer may advance from
const TIMER_ADVANCEABLE: [Phase; 2] = [Phase::Uploading, Phase::AiAnalyzing];

#[derive(Clone)]
pub struct UploadProcessor {
    queue: SharedQueue,
    claims: ClaimCounter,
    is_running: Arc<Mutex<bool>>,
    backend: Arc<dyn CaseBackend>,
    events: EventBus,
    project: ProjectContext,
}

impl UploadProcessor {
    pub fn new(
        queue: SharedQueue,
        claims: ClaimCounter,
        is_running: Arc<Mutex<bool>>,
        backend: Arc<dyn CaseBackend>,
        events: EventBus,
        project: ProjectContext,
    ) -> Self {
        Self {
            queue,
            claims,
            is_running,
            backend,
            events,
            project,
        }
    }

    /// Start the processing loop unless one is already draining this queue.
    pub fn start(&self) -> Result<()> {
        if !self.try_start()? {
            return Ok(());
        }

        let processor = self.clone();

        tokio::spawn(async move {
            log_info(SOURCE, "📤 Upload processor started").unwrap_or_default();
            processor.run_loop().await;
            log_info(SOURCE, "📤 Upload processor stopped").unwrap_or_default();
        });

        Ok(())
    }

    async fn run_loop(&self) {
        loop {
            let item = match self.next_item() {
                Ok(Some(item)) => item,
                Ok(None) => break,
                Err(e) => {
                    log_error(SOURCE, &format!("Upload processor halted: {}", e))
                        .unwrap_or_default();
                    self.release();
                    break;
                }
            };

            self.events.publish(SOURCE, AppEventPayload::QueueChanged);
            self.process_item(item).await;
        }
    }

    /// Claim the next pending item, or release the latch when none is left.
    ///
    /// The latch is cleared while the queue lock is held so an item enqueued
    /// concurrently is either seen by this scan or starts a new loop.
    fn next_item(&self) -> Result<Option<UploadQueueItem>> {
        let mut queue = self.queue.lock()?;

        if let Some(item) = queue_manager::claim_next_pending(&mut queue, &self.claims) {
            return Ok(Some(item));
        }

        let has_items = !queue.is_empty();
        let claims_now = self.claims.load(Ordering::SeqCst);
        *self.is_running.lock()? = false;
        drop(queue);

        if has_items {
            self.schedule_cleanup(claims_now);
        }
        Ok(None)
    }

    async fn process_item(&self, item: UploadQueueItem) {
        self.schedule_phase_advance(item.id, Phase::AiAnalyzing, AI_ANALYZING_DELAY);
        self.schedule_phase_advance(item.id, Phase::Extracting, EXTRACTING_DELAY);

        log_info(
            SOURCE,
            &format!(
                "📤 Uploading {} ({} bytes)",
                item.file.file_name, item.file.size
            ),
        )
        .unwrap_or_default();

        match self.upload(&item).await {
            Ok(result) => self.handle_upload_success(&item, result),
            Err(e) => self.handle_upload_failure(&item, e),
        }
    }

    async fn upload(&self, item: &UploadQueueItem) -> Result<UploadResult> {
        // Project is resolved when the item starts, not when it was queued
        let project = self.project.current().ok_or_else(|| {
            CasePilotError::Validation("Select a project before uploading.".to_string())
        })?;

        self.backend.upload_document(&item.file, &project).await
    }

    fn handle_upload_success(&self, item: &UploadQueueItem, result: UploadResult) {
        queue_manager::update_item(&self.queue, item.id, |entry| entry.phase = Phase::Saving);
        self.events.publish(SOURCE, AppEventPayload::QueueChanged);

        let count = result.count;
        queue_manager::update_item(&self.queue, item.id, |entry| {
            entry.phase = Phase::Done;
            entry.result = Some(result);
        });
        self.events.publish(SOURCE, AppEventPayload::QueueChanged);

        log_info(
            SOURCE,
            &format!("✓ Upload successful: {} ({} cases)", item.file.file_name, count),
        )
        .unwrap_or_default();

        self.events.notice(
            SOURCE,
            NoticeLevel::Success,
            format!("✅ {}: {} cases", item.file.file_name, count),
        );
        self.events
            .request_refresh(SOURCE, RefreshReason::UploadCompleted);
    }

    fn handle_upload_failure(&self, item: &UploadQueueItem, error: CasePilotError) {
        let message = sanitize_error_message(&error.to_string());

        queue_manager::update_item(&self.queue, item.id, |entry| {
            entry.phase = Phase::Error;
            entry.error = Some(message.clone());
        });
        self.events.publish(SOURCE, AppEventPayload::QueueChanged);

        log_error(
            SOURCE,
            &format!("✗ Upload failed: {} - Error: {}", item.file.file_name, error),
        )
        .unwrap_or_default();

        self.events.error_notice(
            SOURCE,
            format!("Upload Failed: {}", item.file.file_name),
            message,
        );
    }

    /// Cosmetic progress step, independent of the real request.
    fn schedule_phase_advance(&self, item_id: Uuid, to: Phase, delay: Duration) {
        let queue = Arc::clone(&self.queue);
        let events = self.events.clone();

        tokio::spawn(async move {
            sleep(delay).await;
            if queue_manager::advance_phase_if(&queue, item_id, &TIMER_ADVANCEABLE, to) {
                events.publish(SOURCE, AppEventPayload::QueueChanged);
            }
        });
    }

    /// Sweep finished items after a quiet period. Any claim in between
    /// cancels the sweep; the drain that made it schedules its own.
    fn schedule_cleanup(&self, claims_when_scheduled: u64) {
        let queue = Arc::clone(&self.queue);
        let claims = Arc::clone(&self.claims);
        let events = self.events.clone();

        tokio::spawn(async move {
            sleep(QUEUE_CLEANUP_DELAY).await;
            match queue_manager::sweep_completed(&queue, &claims, claims_when_scheduled) {
                Ok(true) => {
                    events.publish(SOURCE, AppEventPayload::QueueChanged);
                }
                Ok(false) => {}
                Err(e) => {
                    log_warn(SOURCE, &format!("Queue cleanup skipped: {}", e))
                        .unwrap_or_default();
                }
            }
        });
    }

    fn try_start(&self) -> Result<bool> {
        let mut is_running = self.is_running.lock()?;

        if *is_running {
            return Ok(false);
        }

        *is_running = true;
        Ok(true)
    }

    fn release(&self) {
        if let Ok(mut is_running) = self.is_running.lock() {
            *is_running = false;
        }
    }
}

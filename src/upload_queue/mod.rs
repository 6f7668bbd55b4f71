// Module declarations
mod processor;
mod queue_manager;
mod single;
mod status;
mod types;

pub use single::SingleUpload;
pub use status::{StatusColor, StatusPresentation};
pub use types::*;

use crate::api::CaseBackend;
use crate::context::ProjectContext;
use crate::error::Result;
use crate::events::EventBus;
use std::collections::VecDeque;
use std::sync::atomic::AtomicU64;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// Bounded, strictly sequential document upload queue.
#[derive(Clone)]
pub struct UploadQueue {
    queue: queue_manager::SharedQueue,
    claims: queue_manager::ClaimCounter,
    is_running: Arc<Mutex<bool>>,
    backend: Arc<dyn CaseBackend>,
    events: EventBus,
    project: ProjectContext,
}

impl std::fmt::Debug for UploadQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadQueue")
            .field("queue", &"<queued items>")
            .field("is_running", &self.is_running)
            .field("backend", &"<backend>")
            .finish()
    }
}

impl UploadQueue {
    pub fn new(backend: Arc<dyn CaseBackend>, events: EventBus, project: ProjectContext) -> Self {
        Self {
            queue: Arc::new(Mutex::new(VecDeque::new())),
            claims: Arc::new(AtomicU64::new(0)),
            is_running: Arc::new(Mutex::new(false)),
            backend,
            events,
            project,
        }
    }

    /// Queue documents and make sure the processor is draining.
    pub fn enqueue(&self, files: Vec<DocumentFile>) -> Result<EnqueueOutcome> {
        let outcome = queue_manager::enqueue(&self.queue, &self.events, files)?;
        if !outcome.accepted.is_empty() {
            self.start_processing()?;
        }
        Ok(outcome)
    }

    pub fn start_processing(&self) -> Result<()> {
        let processor = processor::UploadProcessor::new(
            Arc::clone(&self.queue),
            Arc::clone(&self.claims),
            Arc::clone(&self.is_running),
            Arc::clone(&self.backend),
            self.events.clone(),
            self.project.clone(),
        );

        processor.start()
    }

    pub fn remove_item(&self, item_id: Uuid) -> Result<()> {
        queue_manager::remove_item(&self.queue, &self.events, item_id)
    }

    pub fn snapshot(&self) -> Vec<UploadQueueItem> {
        queue_manager::snapshot(&self.queue)
    }

    pub fn get_status(&self) -> QueueStatus {
        queue_manager::get_status(&self.queue, self.is_running())
    }

    pub fn is_running(&self) -> bool {
        self.is_running
            .lock()
            .map(|running| *running)
            .unwrap_or(false)
    }
}

//! Type definitions for the upload queue.
//!
//! Defines the core data structures: Phase, DocumentFile, UploadQueueItem,
//! QueueStatus, and the queue timing constants.

use crate::api::UploadResult;
use crate::error::Result;
use crate::validation::validate_document;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use uuid::Uuid;

/// Maximum number of items held by the queue at once
pub const MAX_QUEUE_SIZE: usize = 5;

/// Cosmetic phase advance to `ai_analyzing`, measured from upload start
pub const AI_ANALYZING_DELAY: Duration = Duration::from_millis(1200);

/// Cosmetic phase advance to `extracting`, measured from upload start
pub const EXTRACTING_DELAY: Duration = Duration::from_millis(4000);

/// Quiet period after the queue drains before `done` items are swept
pub const QUEUE_CLEANUP_DELAY: Duration = Duration::from_millis(5000);

/// Upload lifecycle, ordered by progress weight.
///
/// `Done` and `Error` are terminal; `Error` is reachable from any
/// non-terminal phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Pending,
    Uploading,
    AiAnalyzing,
    Extracting,
    Saving,
    Done,
    Error,
}

impl Phase {
    pub fn progress(&self) -> u8 {
        match self {
            Phase::Pending => 0,
            Phase::Uploading => 25,
            Phase::AiAnalyzing => 55,
            Phase::Extracting => 85,
            Phase::Saving => 95,
            Phase::Done | Phase::Error => 100,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Phase::Done | Phase::Error)
    }

    /// In flight: neither waiting nor finished.
    pub fn is_active(&self) -> bool {
        !matches!(self, Phase::Pending) && !self.is_terminal()
    }

    /// Users may only remove items that are not mid-flight.
    pub fn is_removable(&self) -> bool {
        !self.is_active()
    }

    /// Whether moving from `self` to `next` follows the lifecycle forward.
    pub fn can_advance_to(&self, next: Phase) -> bool {
        if self.is_terminal() {
            return false;
        }
        match next {
            Phase::Error => true,
            Phase::Pending => false,
            _ => next.progress() > self.progress(),
        }
    }
}

/// A document selected for upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentFile {
    pub path: PathBuf,
    pub file_name: String,
    pub size: u64,
}

impl DocumentFile {
    pub fn new(path: impl Into<PathBuf>, file_name: impl Into<String>, size: u64) -> Self {
        Self {
            path: path.into(),
            file_name: file_name.into(),
            size,
        }
    }

    /// Validate a path on disk and describe it.
    pub fn from_path(path: &Path) -> Result<Self> {
        let (path, file_name, size) = validate_document(path)?;
        Ok(Self {
            path,
            file_name,
            size,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadQueueItem {
    /// Time-ordered random id (UUIDv7)
    pub id: Uuid,
    pub file: DocumentFile,
    pub phase: Phase,
    pub error: Option<String>,
    pub result: Option<UploadResult>,
    pub queued_at: DateTime<Utc>,
}

impl UploadQueueItem {
    pub fn new(file: DocumentFile) -> Self {
        Self {
            id: Uuid::now_v7(),
            file,
            phase: Phase::Pending,
            error: None,
            result: None,
            queued_at: Utc::now(),
        }
    }
}

/// What `enqueue` did with a batch of files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnqueueOutcome {
    pub accepted: Vec<Uuid>,
    /// Files beyond the remaining capacity
    pub dropped: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStatus {
    pub pending: usize,
    pub active: usize,
    pub done: usize,
    pub failed: usize,
    pub is_running: bool,
}

impl QueueStatus {
    pub fn total(&self) -> usize {
        self.pending + self.active + self.done + self.failed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_progress_weights() {
        let weights: Vec<u8> = [
            Phase::Pending,
            Phase::Uploading,
            Phase::AiAnalyzing,
            Phase::Extracting,
            Phase::Saving,
            Phase::Done,
            Phase::Error,
        ]
        .iter()
        .map(Phase::progress)
        .collect();
        assert_eq!(weights, vec![0, 25, 55, 85, 95, 100, 100]);
    }

    #[test]
    fn test_phase_transitions_move_forward() {
        assert!(Phase::Pending.can_advance_to(Phase::Uploading));
        assert!(Phase::Uploading.can_advance_to(Phase::Extracting));
        assert!(Phase::Extracting.can_advance_to(Phase::Error));
        assert!(!Phase::Extracting.can_advance_to(Phase::AiAnalyzing));
        assert!(!Phase::Uploading.can_advance_to(Phase::Pending));
        assert!(!Phase::Done.can_advance_to(Phase::Error));
        assert!(!Phase::Error.can_advance_to(Phase::Done));
    }

    #[test]
    fn test_active_and_removable() {
        assert!(Phase::Pending.is_removable());
        assert!(Phase::Done.is_removable());
        assert!(Phase::Error.is_removable());
        for phase in [
            Phase::Uploading,
            Phase::AiAnalyzing,
            Phase::Extracting,
            Phase::Saving,
        ] {
            assert!(phase.is_active());
            assert!(!phase.is_removable());
        }
    }

    #[test]
    fn test_phase_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&Phase::AiAnalyzing).unwrap(),
            "\"ai_analyzing\""
        );
    }

    #[test]
    fn test_item_ids_are_unique() {
        let file = DocumentFile::new("/tmp/a.docx", "a.docx", 10);
        let a = UploadQueueItem::new(file.clone());
        let b = UploadQueueItem::new(file);
        assert_ne!(a.id, b.id);
        assert_eq!(a.phase, Phase::Pending);
    }
}

//! Queue operations: enqueue, remove, phase updates and queries.
//!
//! Every function takes the shared queue and holds its lock only for the
//! duration of the call.

use crate::error::{CasePilotError, Result};
use crate::events::{AppEventPayload, EventBus, NoticeLevel};
use crate::logging::{log_info, log_warn};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use super::types::{
    DocumentFile, EnqueueOutcome, Phase, QueueStatus, UploadQueueItem, MAX_QUEUE_SIZE,
};

pub type SharedQueue = Arc<Mutex<VecDeque<UploadQueueItem>>>;

/// Number of items ever claimed. Read and bumped only under the queue lock.
pub type ClaimCounter = Arc<AtomicU64>;

const SOURCE: &str = "upload-queue";

/// Append files as `pending` items, up to the remaining capacity.
///
/// A full queue accepts nothing and reports a capacity error; a batch larger
/// than the remaining room is truncated with a warning.
pub fn enqueue(
    queue: &SharedQueue,
    events: &EventBus,
    files: Vec<DocumentFile>,
) -> Result<EnqueueOutcome> {
    let requested = files.len();

    let accepted = {
        let mut queue = queue.lock()?;
        let available = MAX_QUEUE_SIZE.saturating_sub(queue.len());

        if available == 0 {
            drop(queue);
            events.error_notice(
                SOURCE,
                "Queue Full",
                format!("Max {} files can be in the queue at once.", MAX_QUEUE_SIZE),
            );
            log_warn(
                SOURCE,
                &format!("⚠ Queue full, rejected {} file(s)", requested),
            )
            .unwrap_or_default();
            return Err(CasePilotError::QueueFull {
                capacity: MAX_QUEUE_SIZE,
            });
        }

        if requested > available {
            events.notice(
                SOURCE,
                NoticeLevel::Warning,
                format!(
                    "Only added {} files. Limit is {}.",
                    available, MAX_QUEUE_SIZE
                ),
            );
        }

        let mut accepted = Vec::new();
        for file in files.into_iter().take(available) {
            let item = UploadQueueItem::new(file);
            log_info(
                SOURCE,
                &format!("📥 Queued {} ({} bytes)", item.file.file_name, item.file.size),
            )
            .unwrap_or_default();
            accepted.push(item.id);
            queue.push_back(item);
        }
        accepted
    };

    if !accepted.is_empty() {
        events.publish(SOURCE, AppEventPayload::QueueChanged);
    }

    Ok(EnqueueOutcome {
        dropped: requested - accepted.len(),
        accepted,
    })
}

/// Remove an item that is not mid-flight.
pub fn remove_item(queue: &SharedQueue, events: &EventBus, item_id: Uuid) -> Result<()> {
    {
        let mut queue = queue.lock()?;
        let position = queue
            .iter()
            .position(|item| item.id == item_id)
            .ok_or_else(|| {
                CasePilotError::Validation(format!("No queued upload with id {}", item_id))
            })?;

        if !queue[position].phase.is_removable() {
            return Err(CasePilotError::Validation(format!(
                "{} is uploading and cannot be removed",
                queue[position].file.file_name
            )));
        }

        if let Some(item) = queue.remove(position) {
            log_info(
                SOURCE,
                &format!("🗑 Removed {} from queue", item.file.file_name),
            )
            .unwrap_or_default();
        }
    }

    events.publish(SOURCE, AppEventPayload::QueueChanged);
    Ok(())
}

/// Claim the first `pending` item by moving it to `uploading`.
pub fn claim_next_pending(
    queue: &mut VecDeque<UploadQueueItem>,
    claims: &AtomicU64,
) -> Option<UploadQueueItem> {
    let item = queue.iter_mut().find(|item| item.phase == Phase::Pending)?;
    item.phase = Phase::Uploading;
    claims.fetch_add(1, Ordering::SeqCst);
    Some(item.clone())
}

/// Apply `update` to the item with `item_id`. Returns false if it is gone.
pub fn update_item<F>(queue: &SharedQueue, item_id: Uuid, update: F) -> bool
where
    F: FnOnce(&mut UploadQueueItem),
{
    match queue.lock() {
        Ok(mut queue) => match queue.iter_mut().find(|item| item.id == item_id) {
            Some(item) => {
                update(item);
                true
            }
            None => false,
        },
        Err(_) => false,
    }
}

/// Timer-driven advance: only applies while the item is still in one of
/// `from` and the move is forward.
pub fn advance_phase_if(queue: &SharedQueue, item_id: Uuid, from: &[Phase], to: Phase) -> bool {
    let mut advanced = false;
    update_item(queue, item_id, |item| {
        if from.contains(&item.phase) && item.phase.can_advance_to(to) {
            item.phase = to;
            advanced = true;
        }
    });
    advanced
}

/// Drop `done` items, keep failures.
///
/// Skipped while anything is unfinished, and when any item was claimed after
/// the sweep was scheduled (`claims_when_scheduled` no longer matches).
pub fn sweep_completed(
    queue: &SharedQueue,
    claims: &AtomicU64,
    claims_when_scheduled: u64,
) -> Result<bool> {
    let mut queue = queue.lock()?;

    if claims.load(Ordering::SeqCst) != claims_when_scheduled
        || queue.iter().any(|item| !item.phase.is_terminal())
    {
        return Ok(false);
    }

    let before = queue.len();
    queue.retain(|item| item.phase == Phase::Error);
    Ok(queue.len() != before)
}

pub fn snapshot(queue: &SharedQueue) -> Vec<UploadQueueItem> {
    queue
        .lock()
        .map(|queue| queue.iter().cloned().collect())
        .unwrap_or_default()
}

pub fn get_status(queue: &SharedQueue, is_running: bool) -> QueueStatus {
    let mut status = QueueStatus {
        is_running,
        ..QueueStatus::default()
    };

    if let Ok(queue) = queue.lock() {
        for item in queue.iter() {
            match item.phase {
                Phase::Pending => status.pending += 1,
                Phase::Done => status.done += 1,
                Phase::Error => status.failed += 1,
                _ => status.active += 1,
            }
        }
    }

    status
}

#[cfg(test)]
mod tests {
    use super::*;

    fn files(count: usize) -> Vec<DocumentFile> {
        (0..count)
            .map(|i| DocumentFile::new(format!("/tmp/doc{}.docx", i), format!("doc{}.docx", i), 100))
            .collect()
    }

    fn new_queue() -> SharedQueue {
        Arc::new(Mutex::new(VecDeque::new()))
    }

    #[tokio::test]
    async fn test_enqueue_preserves_order() {
        let queue = new_queue();
        let events = EventBus::default();
        let mut rx = events.subscribe();

        let outcome = enqueue(&queue, &events, files(3)).unwrap();
        assert_eq!(outcome.accepted.len(), 3);
        assert_eq!(outcome.dropped, 0);

        let names: Vec<String> = snapshot(&queue)
            .into_iter()
            .map(|item| item.file.file_name)
            .collect();
        assert_eq!(names, vec!["doc0.docx", "doc1.docx", "doc2.docx"]);

        let event = rx.recv().await.unwrap();
        assert_eq!(event.payload, AppEventPayload::QueueChanged);
    }

    #[tokio::test]
    async fn test_enqueue_truncates_to_capacity() {
        let queue = new_queue();
        let events = EventBus::default();
        enqueue(&queue, &events, files(3)).unwrap();

        let mut rx = events.subscribe();
        let outcome = enqueue(&queue, &events, files(4)).unwrap();
        assert_eq!(outcome.accepted.len(), 2);
        assert_eq!(outcome.dropped, 2);
        assert_eq!(snapshot(&queue).len(), MAX_QUEUE_SIZE);

        let event = rx.recv().await.unwrap();
        assert_eq!(
            event.payload,
            AppEventPayload::Notice {
                level: NoticeLevel::Warning,
                message: "Only added 2 files. Limit is 5.".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn test_enqueue_full_queue_rejects_everything() {
        let queue = new_queue();
        let events = EventBus::default();
        enqueue(&queue, &events, files(5)).unwrap();

        let mut rx = events.subscribe();
        let err = enqueue(&queue, &events, files(1)).unwrap_err();
        assert!(matches!(err, CasePilotError::QueueFull { capacity: 5 }));
        assert_eq!(snapshot(&queue).len(), 5);

        let event = rx.recv().await.unwrap();
        assert_eq!(
            event.payload,
            AppEventPayload::ErrorNotice {
                title: "Queue Full".to_string(),
                message: "Max 5 files can be in the queue at once.".to_string(),
            }
        );
    }

    #[test]
    fn test_remove_rejects_active_items() {
        let queue = new_queue();
        let events = EventBus::default();
        let outcome = enqueue(&queue, &events, files(2)).unwrap();

        {
            let mut guard = queue.lock().unwrap();
            claim_next_pending(&mut guard, &AtomicU64::new(0)).unwrap();
        }

        let err = remove_item(&queue, &events, outcome.accepted[0]).unwrap_err();
        assert!(matches!(err, CasePilotError::Validation(_)));

        remove_item(&queue, &events, outcome.accepted[1]).unwrap();
        assert_eq!(snapshot(&queue).len(), 1);

        assert!(remove_item(&queue, &events, Uuid::now_v7()).is_err());
    }

    #[test]
    fn test_claim_skips_non_pending() {
        let queue = new_queue();
        let events = EventBus::default();
        let outcome = enqueue(&queue, &events, files(2)).unwrap();

        let claims = AtomicU64::new(0);

        let mut guard = queue.lock().unwrap();
        let first = claim_next_pending(&mut guard, &claims).unwrap();
        assert_eq!(first.id, outcome.accepted[0]);
        assert_eq!(first.phase, Phase::Uploading);

        let second = claim_next_pending(&mut guard, &claims).unwrap();
        assert_eq!(second.id, outcome.accepted[1]);
        assert!(claim_next_pending(&mut guard, &claims).is_none());
        assert_eq!(claims.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_late_timer_does_not_regress() {
        let queue = new_queue();
        let events = EventBus::default();
        let id = enqueue(&queue, &events, files(1)).unwrap().accepted[0];
        let from = [Phase::Uploading, Phase::AiAnalyzing];

        // Not started yet
        assert!(!advance_phase_if(&queue, id, &from, Phase::AiAnalyzing));

        update_item(&queue, id, |item| item.phase = Phase::Uploading);
        assert!(advance_phase_if(&queue, id, &from, Phase::Extracting));
        // The 1200ms timer firing after the 4000ms one
        assert!(!advance_phase_if(&queue, id, &from, Phase::AiAnalyzing));

        update_item(&queue, id, |item| item.phase = Phase::Error);
        assert!(!advance_phase_if(&queue, id, &from, Phase::Extracting));
        assert_eq!(snapshot(&queue)[0].phase, Phase::Error);
    }

    #[test]
    fn test_sweep_keeps_failures() {
        let queue = new_queue();
        let events = EventBus::default();
        let ids = enqueue(&queue, &events, files(3)).unwrap().accepted;

        update_item(&queue, ids[0], |item| item.phase = Phase::Done);
        update_item(&queue, ids[1], |item| item.phase = Phase::Error);

        let claims = AtomicU64::new(0);

        // ids[2] still pending
        assert!(!sweep_completed(&queue, &claims, 0).unwrap());
        assert_eq!(snapshot(&queue).len(), 3);

        update_item(&queue, ids[2], |item| item.phase = Phase::Done);
        assert!(sweep_completed(&queue, &claims, 0).unwrap());

        let remaining = snapshot(&queue);
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, ids[1]);
    }

    #[test]
    fn test_sweep_skipped_after_newer_claim() {
        let queue = new_queue();
        let events = EventBus::default();
        let ids = enqueue(&queue, &events, files(2)).unwrap().accepted;
        let claims = AtomicU64::new(0);

        update_item(&queue, ids[0], |item| item.phase = Phase::Done);
        let scheduled_at = claims.load(Ordering::SeqCst);

        // ids[1] starts and finishes before the sweep fires
        claim_next_pending(&mut queue.lock().unwrap(), &claims).unwrap();
        update_item(&queue, ids[1], |item| item.phase = Phase::Done);

        assert!(!sweep_completed(&queue, &claims, scheduled_at).unwrap());
        assert_eq!(snapshot(&queue).len(), 2);

        let current = claims.load(Ordering::SeqCst);
        assert!(sweep_completed(&queue, &claims, current).unwrap());
        assert!(snapshot(&queue).is_empty());
    }

    #[test]
    fn test_status_counts() {
        let queue = new_queue();
        let events = EventBus::default();
        let ids = enqueue(&queue, &events, files(4)).unwrap().accepted;

        update_item(&queue, ids[0], |item| item.phase = Phase::Done);
        update_item(&queue, ids[1], |item| item.phase = Phase::Error);
        update_item(&queue, ids[2], |item| item.phase = Phase::Extracting);

        let status = get_status(&queue, true);
        assert_eq!(status.done, 1);
        assert_eq!(status.failed, 1);
        assert_eq!(status.active, 1);
        assert_eq!(status.pending, 1);
        assert_eq!(status.total(), 4);
        assert!(status.is_running);
    }
}

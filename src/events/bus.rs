use super::types::{AppEvent, AppEventPayload, EventSequence, NoticeLevel, RefreshReason};
use crate::logging::log_debug;
use chrono::Utc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;

pub type EventReceiver = broadcast::Receiver<AppEvent>;
pub type EventSender = broadcast::Sender<AppEvent>;

pub const DEFAULT_BUS_CAPACITY: usize = 256;

/// Event bus for notices, queue updates and refresh triggers
#[derive(Clone, Debug)]
pub struct EventBus {
    sender: EventSender,
    sequence: Arc<AtomicU64>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_BUS_CAPACITY)
    }
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            sequence: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Publish an event (returns sequence number).
    ///
    /// A bus with no subscribers still consumes a sequence number; the send
    /// error is only logged.
    pub fn publish(&self, source: &str, payload: AppEventPayload) -> EventSequence {
        let sequence = self.sequence.fetch_add(1, Ordering::SeqCst);

        let event = AppEvent {
            sequence,
            timestamp: Utc::now(),
            source: source.to_string(),
            payload,
        };

        if let Err(e) = self.sender.send(event) {
            log_debug(
                "events",
                &format!("Event {} from {} had no receivers: {}", sequence, source, e),
            )
            .unwrap_or_default();
        }

        sequence
    }

    pub fn notice(&self, source: &str, level: NoticeLevel, message: impl Into<String>) {
        self.publish(
            source,
            AppEventPayload::Notice {
                level,
                message: message.into(),
            },
        );
    }

    pub fn error_notice(&self, source: &str, title: impl Into<String>, message: impl Into<String>) {
        self.publish(
            source,
            AppEventPayload::ErrorNotice {
                title: title.into(),
                message: message.into(),
            },
        );
    }

    pub fn request_refresh(&self, source: &str, reason: RefreshReason) {
        self.publish(source, AppEventPayload::RefreshRequested { reason });
    }

    /// Subscribe to events
    pub fn subscribe(&self) -> EventReceiver {
        self.sender.subscribe()
    }

    /// Get current sequence number
    pub fn current_sequence(&self) -> EventSequence {
        self.sequence.load(Ordering::SeqCst)
    }

    /// Get number of active receivers
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

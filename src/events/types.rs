use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Sequence number for ordering events
pub type EventSequence = u64;

/// Event published on the application bus
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppEvent {
    pub sequence: EventSequence,
    pub timestamp: DateTime<Utc>,
    /// Component that published the event ("upload-queue", "review", ...)
    pub source: String,
    pub payload: AppEventPayload,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeLevel {
    Success,
    Info,
    Warning,
    Error,
}

/// Why a module/stat refresh was requested
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshReason {
    UploadCompleted,
    CaseSubmitted,
    ModuleReset,
    ProjectChanged,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AppEventPayload {
    /// Transient toast
    Notice { level: NoticeLevel, message: String },

    /// Blocking error dialog
    ErrorNotice { title: String, message: String },

    /// Upload queue contents or phases changed
    QueueChanged,

    /// Module/stat summaries should be fetched again
    RefreshRequested { reason: RefreshReason },

    /// Review view closed; front end returns to the module list
    ReturnToModules,

    ProjectSwitched { project: String },
}

impl AppEvent {
    pub fn payload_type(&self) -> &str {
        match &self.payload {
            AppEventPayload::Notice { .. } => "notice",
            AppEventPayload::ErrorNotice { .. } => "error_notice",
            AppEventPayload::QueueChanged => "queue_changed",
            AppEventPayload::RefreshRequested { .. } => "refresh_requested",
            AppEventPayload::ReturnToModules => "return_to_modules",
            AppEventPayload::ProjectSwitched { .. } => "project_switched",
        }
    }

    /// Events that should make the module list re-fetch its summaries.
    ///
    /// `ProjectSwitched` is always followed by `ReturnToModules`, which does
    /// the fetch.
    pub fn triggers_refresh(&self) -> bool {
        matches!(
            self.payload,
            AppEventPayload::RefreshRequested { .. } | AppEventPayload::ReturnToModules
        )
    }
}

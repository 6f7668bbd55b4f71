use thiserror::Error;

/// Substrings that mark a rate-limit failure from the AI report generator.
pub const QUOTA_MARKERS: [&str; 2] = ["429", "RESOURCE_EXHAUSTED"];

/// CasePilot client errors
#[derive(Debug, Error)]
pub enum CasePilotError {
    /// Non-2xx response from the backend
    #[error("{message}")]
    Server { status: Option<u16>, message: String },

    /// Rate limit reported by the AI-backed generator
    #[error("{0}")]
    Quota(String),

    /// Input rejected before any request was sent
    #[error("Validation error: {0}")]
    Validation(String),

    /// Upload queue already holds the maximum number of items
    #[error("Queue full: max {capacity} files can be in the queue at once")]
    QueueFull { capacity: usize },

    /// In-flight request cancelled (project switch)
    #[error("Upload cancelled")]
    Cancelled,

    /// Configuration file errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP transport errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Mutex poison error
    #[error("Lock poisoned: {0}")]
    LockPoisoned(String),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, CasePilotError>;

impl CasePilotError {
    /// Build an error from a server-reported message, promoting rate-limit
    /// messages to `Quota`.
    pub fn from_server_message(status: Option<u16>, message: impl Into<String>) -> Self {
        let message = message.into();
        if status == Some(429) || is_quota_message(&message) {
            CasePilotError::Quota(message)
        } else {
            CasePilotError::Server { status, message }
        }
    }

    /// True when the error looks like a quota/rate-limit failure.
    pub fn is_quota(&self) -> bool {
        match self {
            CasePilotError::Quota(_) => true,
            other => is_quota_message(&other.to_string()),
        }
    }
}

pub fn is_quota_message(message: &str) -> bool {
    QUOTA_MARKERS.iter().any(|marker| message.contains(marker))
}

impl From<CasePilotError> for String {
    fn from(err: CasePilotError) -> String {
        err.to_string()
    }
}

impl<T> From<std::sync::PoisonError<T>> for CasePilotError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        CasePilotError::LockPoisoned(err.to_string())
    }
}

impl From<Box<dyn std::error::Error>> for CasePilotError {
    fn from(err: Box<dyn std::error::Error>) -> Self {
        CasePilotError::Other(err.to_string())
    }
}

/// Helper trait for adding context to errors
pub trait ErrorContext<T> {
    fn context(self, msg: &str) -> Result<T>;
}

impl<T, E: Into<CasePilotError>> ErrorContext<T> for std::result::Result<T, E> {
    fn context(self, msg: &str) -> Result<T> {
        self.map_err(|e| {
            let err: CasePilotError = e.into();
            match err {
                CasePilotError::Other(s) => CasePilotError::Other(format!("{}: {}", msg, s)),
                CasePilotError::Config(s) => CasePilotError::Config(format!("{}: {}", msg, s)),
                CasePilotError::Validation(s) => {
                    CasePilotError::Validation(format!("{}: {}", msg, s))
                }
                CasePilotError::Server { status, message } => CasePilotError::Server {
                    status,
                    message: format!("{}: {}", msg, message),
                },
                CasePilotError::LockPoisoned(s) => {
                    CasePilotError::LockPoisoned(format!("{}: {}", msg, s))
                }
                other => other,
            }
        })
    }
}

//! Backend access.
//!
//! `CaseBackend` is the seam between the client workflows and the server that
//! extracts cases and writes AI defect reports. `HttpBackend` is the reqwest
//! implementation; tests substitute in-memory fakes.

mod client;
pub mod errors;
pub mod types;

pub use client::HttpBackend;
pub use errors::{
    error_from_response, sanitize_error_message, server_error_message, QUEUE_QUOTA_MESSAGE,
    REVIEW_QUOTA_MESSAGE,
};
pub use types::*;

use crate::error::Result;
use crate::upload_queue::DocumentFile;
use async_trait::async_trait;

#[async_trait]
pub trait CaseBackend: Send + Sync {
    /// Upload a document; the server extracts a module of cases from it.
    async fn upload_document(&self, file: &DocumentFile, project: &str) -> Result<UploadResult>;

    /// Next unfinished (or next retest) case of a module.
    async fn start_module(&self, module_name: &str, project: &str) -> Result<NextCase>;

    async fn submit_result(&self, request: &SubmitResultRequest) -> Result<()>;

    /// Reset every case outcome of a module.
    async fn retest_module(&self, project: &str, module_name: &str) -> Result<()>;

    async fn list_projects(&self) -> Result<Vec<ProjectSummary>>;

    async fn create_project(&self, name: &str) -> Result<()>;

    async fn list_modules(&self, project: &str) -> Result<Vec<ModuleSummary>>;

    async fn project_stats(&self, project: &str) -> Result<ProjectStats>;

    /// Every case of the project as CSV (`ID,Module,Content,Status,Bug Report`).
    async fn export_csv(&self, project: &str) -> Result<String>;
}

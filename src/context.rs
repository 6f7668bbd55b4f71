//! Application context: the components and the active project selection,
//! created once at start-up and shared by the front end.

use crate::api::{sanitize_error_message, CaseBackend, ProjectSummary};
use crate::config::{save_config_to, CasePilotConfig, Theme};
use crate::error::{CasePilotError, Result};
use crate::events::{AppEventPayload, EventBus, NoticeLevel, RefreshReason};
use crate::logging::{log_error, log_info};
use crate::review::CaseReviewSession;
use crate::sync::ModuleProgressSync;
use crate::upload_queue::{SingleUpload, UploadQueue};
use crate::validation::validate_project_name;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};

const SOURCE: &str = "app";

/// Shared handle to the active project name.
///
/// Components read it when they need it, so a switch is visible to the next
/// request without re-wiring anything.
#[derive(Debug, Clone, Default)]
pub struct ProjectContext {
    active: Arc<RwLock<Option<String>>>,
}

impl ProjectContext {
    pub fn new(active: Option<String>) -> Self {
        Self {
            active: Arc::new(RwLock::new(active)),
        }
    }

    pub fn current(&self) -> Option<String> {
        self.active.read().ok().and_then(|active| active.clone())
    }

    pub fn set(&self, project: Option<String>) {
        if let Ok(mut active) = self.active.write() {
            *active = project;
        }
    }
}

pub struct AppContext {
    config: Mutex<CasePilotConfig>,
    config_path: PathBuf,
    backend: Arc<dyn CaseBackend>,
    events: EventBus,
    project: ProjectContext,
    projects: Mutex<Vec<ProjectSummary>>,
    upload_queue: UploadQueue,
    single_upload: SingleUpload,
    sync: ModuleProgressSync,
}

impl AppContext {
    pub fn new(
        config: CasePilotConfig,
        config_path: PathBuf,
        backend: Arc<dyn CaseBackend>,
        events: EventBus,
    ) -> Self {
        let project = ProjectContext::new(config.active_project.clone());
        let upload_queue = UploadQueue::new(Arc::clone(&backend), events.clone(), project.clone());
        let single_upload =
            SingleUpload::new(Arc::clone(&backend), events.clone(), project.clone());
        let sync = ModuleProgressSync::new(Arc::clone(&backend), project.clone(), events.clone());

        Self {
            config: Mutex::new(config),
            config_path,
            backend,
            events,
            project,
            projects: Mutex::new(Vec::new()),
            upload_queue,
            single_upload,
            sync,
        }
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn project(&self) -> &ProjectContext {
        &self.project
    }

    pub fn active_project(&self) -> Option<String> {
        self.project.current()
    }

    pub fn upload_queue(&self) -> &UploadQueue {
        &self.upload_queue
    }

    pub fn single_upload(&self) -> &SingleUpload {
        &self.single_upload
    }

    pub fn sync(&self) -> &ModuleProgressSync {
        &self.sync
    }

    pub fn backend(&self) -> Arc<dyn CaseBackend> {
        Arc::clone(&self.backend)
    }

    pub fn config(&self) -> CasePilotConfig {
        self.config
            .lock()
            .map(|config| config.clone())
            .unwrap_or_default()
    }

    /// A fresh review session bound to this context.
    pub fn review_session(&self) -> CaseReviewSession {
        CaseReviewSession::new(self.backend(), self.events.clone(), self.project.clone())
    }

    pub fn projects(&self) -> Vec<ProjectSummary> {
        self.projects
            .lock()
            .map(|projects| projects.clone())
            .unwrap_or_default()
    }

    /// Fetch the project list and keep the selection valid.
    ///
    /// A selection missing from the list falls back to the first project; an
    /// empty list clears it.
    pub async fn load_projects(&self) -> Result<Vec<ProjectSummary>> {
        let projects = self.backend.list_projects().await.inspect_err(|e| {
            log_error(SOURCE, &format!("Failed to load projects: {}", e)).unwrap_or_default();
        })?;

        *self.projects.lock()? = projects.clone();

        let selected = self.project.current();
        let selection_valid = selected
            .as_deref()
            .is_some_and(|name| projects.iter().any(|project| project.name == name));

        if !selection_valid {
            let fallback = projects.first().map(|project| project.name.clone());
            log_info(
                SOURCE,
                &format!("Active project {:?} unavailable, using {:?}", selected, fallback),
            )
            .unwrap_or_default();

            self.project.set(fallback.clone());
            self.persist_active_project(fallback)?;
            self.events
                .request_refresh(SOURCE, RefreshReason::ProjectChanged);
        }

        Ok(projects)
    }

    /// Make `name` the active project.
    ///
    /// Cancels the single in-flight upload; queued uploads keep running.
    pub fn switch_project(&self, name: &str) -> Result<()> {
        let known = self.projects();
        if !known.is_empty() && !known.iter().any(|project| project.name == name) {
            return Err(CasePilotError::Validation(format!(
                "Unknown project: {}",
                name
            )));
        }

        if self.single_upload.cancel_in_flight() {
            self.events
                .notice(SOURCE, NoticeLevel::Info, "Previous upload cancelled");
        }

        self.project.set(Some(name.to_string()));
        self.persist_active_project(Some(name.to_string()))?;

        log_info(SOURCE, &format!("Switched to project {}", name)).unwrap_or_default();
        self.events.notice(
            SOURCE,
            NoticeLevel::Success,
            format!("Switched to {}", name),
        );
        self.events.publish(
            SOURCE,
            AppEventPayload::ProjectSwitched {
                project: name.to_string(),
            },
        );
        self.events.publish(SOURCE, AppEventPayload::ReturnToModules);
        Ok(())
    }

    pub async fn create_project(&self, name: &str) -> Result<()> {
        let name = match validate_project_name(name) {
            Ok(name) => name,
            Err(e) => {
                if let CasePilotError::Validation(message) = &e {
                    self.events.error_notice(SOURCE, "Invalid Name", message.clone());
                }
                return Err(e);
            }
        };

        if let Err(e) = self.backend.create_project(&name).await {
            self.events.error_notice(
                SOURCE,
                "Create Failed",
                sanitize_error_message(&e.to_string()),
            );
            return Err(e);
        }

        self.events.notice(
            SOURCE,
            NoticeLevel::Success,
            format!("✅ Project \"{}\" created!", name),
        );
        self.load_projects().await?;
        self.switch_project(&name)
    }

    /// File name the server suggests for a project's export.
    pub fn default_export_file_name(project: &str) -> String {
        format!("{}_test_cases.csv", project)
    }

    /// Download every case of the active project as CSV into `path`.
    ///
    /// Returns the number of case rows written.
    pub async fn export_csv(&self, path: &Path) -> Result<usize> {
        let Some(project) = self.project.current() else {
            let message = "Please select a project first.";
            self.events.error_notice(SOURCE, "No Project", message);
            return Err(CasePilotError::Validation(message.to_string()));
        };

        self.events
            .notice(SOURCE, NoticeLevel::Info, "📥 Downloading CSV...");

        let written = match self.backend.export_csv(&project).await {
            Ok(csv) => std::fs::write(path, &csv)
                .map(|()| count_csv_rows(&csv))
                .map_err(CasePilotError::from),
            Err(e) => Err(e),
        };

        match written {
            Ok(rows) => {
                log_info(
                    SOURCE,
                    &format!("Exported {} rows of {} to {}", rows, project, path.display()),
                )
                .unwrap_or_default();
                self.events.notice(
                    SOURCE,
                    NoticeLevel::Success,
                    format!("Saved {} cases to {}", rows, path.display()),
                );
                Ok(rows)
            }
            Err(e) => {
                log_error(SOURCE, &format!("Export of {} failed: {}", project, e))
                    .unwrap_or_default();
                self.events.error_notice(
                    SOURCE,
                    "Export Failed",
                    sanitize_error_message(&e.to_string()),
                );
                Err(e)
            }
        }
    }

    pub fn set_theme(&self, theme: Theme) -> Result<()> {
        let mut config = self.config.lock()?;
        config.theme = theme;
        save_config_to(&self.config_path, &config)
    }

    fn persist_active_project(&self, project: Option<String>) -> Result<()> {
        let mut config = self.config.lock()?;
        config.active_project = project;
        save_config_to(&self.config_path, &config)
    }
}

/// Data rows in a CSV body with a header line. Quoted fields may span lines.
fn count_csv_rows(csv: &str) -> usize {
    let mut records: usize = 0;
    let mut in_quotes = false;
    let mut record_open = false;

    for ch in csv.chars() {
        match ch {
            '"' => {
                in_quotes = !in_quotes;
                record_open = true;
            }
            '\n' if !in_quotes => {
                if record_open {
                    records += 1;
                }
                record_open = false;
            }
            '\r' if !in_quotes => {}
            _ => record_open = true,
        }
    }
    if record_open {
        records += 1;
    }

    records.saturating_sub(1)
}

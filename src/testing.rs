//! Scripted in-memory backend for unit tests.

use crate::api::{
    CaseBackend, CaseId, ModuleSummary, NextCase, ProjectStats, ProjectSummary, ServedCase,
    SubmitResultRequest, UploadResult,
};
use crate::error::{CasePilotError, Result};
use crate::upload_queue::DocumentFile;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

enum UploadOutcome {
    Ok(u64),
    Err(String),
}

#[derive(Default)]
struct FakeState {
    upload_delay: Duration,
    upload_outcomes: VecDeque<UploadOutcome>,
    uploads: Vec<(String, String)>,
    in_flight: usize,
    max_in_flight: usize,

    cases: VecDeque<std::result::Result<NextCase, String>>,
    start_module_calls: Vec<(String, String)>,

    submit_outcomes: VecDeque<Option<String>>,
    submissions: Vec<SubmitResultRequest>,

    retest_error: Option<String>,
    retest_calls: Vec<(String, String)>,

    projects: Vec<ProjectSummary>,
    created_projects: Vec<String>,
    modules: Vec<ModuleSummary>,
    modules_error: Option<String>,
    module_requests: Vec<String>,
    stats: ProjectStats,
    export: Option<std::result::Result<String, String>>,
    export_requests: Vec<String>,
}

#[derive(Default)]
pub struct FakeBackend {
    state: Mutex<FakeState>,
}

/// Keeps the in-flight counter right even when an upload future is dropped.
struct InFlight<'a>(&'a Mutex<FakeState>);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if let Ok(mut state) = self.0.lock() {
            state.in_flight -= 1;
        }
    }
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }

    pub fn set_upload_delay(&self, delay: Duration) {
        self.state().upload_delay = delay;
    }

    pub fn push_upload_ok(&self, count: u64) {
        self.state().upload_outcomes.push_back(UploadOutcome::Ok(count));
    }

    pub fn push_upload_err(&self, message: &str) {
        self.state()
            .upload_outcomes
            .push_back(UploadOutcome::Err(message.to_string()));
    }

    /// (file name, project) per upload call, in call order
    pub fn uploads(&self) -> Vec<(String, String)> {
        self.state().uploads.clone()
    }

    pub fn max_concurrent_uploads(&self) -> usize {
        self.state().max_in_flight
    }

    pub fn push_case(&self, id: i64, text: &str, is_retest: bool) {
        self.state().cases.push_back(Ok(NextCase::Case(ServedCase {
            id: CaseId(id),
            text: text.to_string(),
            is_retest,
        })));
    }

    pub fn push_finished(&self) {
        self.state().cases.push_back(Ok(NextCase::Finished));
    }

    pub fn push_start_module_err(&self, message: &str) {
        self.state().cases.push_back(Err(message.to_string()));
    }

    pub fn start_module_calls(&self) -> Vec<(String, String)> {
        self.state().start_module_calls.clone()
    }

    pub fn push_submit_ok(&self) {
        self.state().submit_outcomes.push_back(None);
    }

    pub fn push_submit_err(&self, message: &str) {
        self.state()
            .submit_outcomes
            .push_back(Some(message.to_string()));
    }

    pub fn submissions(&self) -> Vec<SubmitResultRequest> {
        self.state().submissions.clone()
    }

    pub fn set_retest_error(&self, message: Option<&str>) {
        self.state().retest_error = message.map(str::to_string);
    }

    pub fn retest_calls(&self) -> Vec<(String, String)> {
        self.state().retest_calls.clone()
    }

    pub fn set_projects(&self, names: &[&str]) {
        self.state().projects = names
            .iter()
            .map(|name| ProjectSummary {
                name: name.to_string(),
                created_at: None,
            })
            .collect();
    }

    pub fn created_projects(&self) -> Vec<String> {
        self.state().created_projects.clone()
    }

    pub fn set_modules(&self, modules: Vec<ModuleSummary>) {
        self.state().modules = modules;
    }

    pub fn set_modules_error(&self, message: Option<&str>) {
        self.state().modules_error = message.map(str::to_string);
    }

    /// Projects passed to `list_modules`, in call order
    pub fn module_requests(&self) -> Vec<String> {
        self.state().module_requests.clone()
    }

    pub fn set_stats(&self, stats: ProjectStats) {
        self.state().stats = stats;
    }

    pub fn set_export(&self, outcome: std::result::Result<&str, &str>) {
        self.state().export = Some(outcome.map(str::to_string).map_err(str::to_string));
    }

    pub fn export_requests(&self) -> Vec<String> {
        self.state().export_requests.clone()
    }
}

pub fn module(name: &str, total: u64, passed: u64, progress: f64) -> ModuleSummary {
    ModuleSummary {
        name: name.to_string(),
        total,
        passed,
        failed: 0,
        progress,
    }
}

fn server_error(message: &str) -> CasePilotError {
    CasePilotError::from_server_message(Some(500), message)
}

#[async_trait]
impl CaseBackend for FakeBackend {
    async fn upload_document(&self, file: &DocumentFile, project: &str) -> Result<UploadResult> {
        let delay = {
            let mut state = self.state();
            state
                .uploads
                .push((file.file_name.clone(), project.to_string()));
            state.in_flight += 1;
            state.max_in_flight = state.max_in_flight.max(state.in_flight);
            state.upload_delay
        };
        let _in_flight = InFlight(&self.state);

        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        // Bind before matching so the guard is released ahead of `_in_flight`
        let outcome = self.state().upload_outcomes.pop_front();
        match outcome {
            Some(UploadOutcome::Err(message)) => Err(server_error(&message)),
            Some(UploadOutcome::Ok(count)) => Ok(UploadResult {
                module: Some(file.file_name.clone()),
                count,
            }),
            None => Ok(UploadResult {
                module: Some(file.file_name.clone()),
                count: 1,
            }),
        }
    }

    async fn start_module(&self, module_name: &str, project: &str) -> Result<NextCase> {
        let mut state = self.state();
        state
            .start_module_calls
            .push((module_name.to_string(), project.to_string()));
        match state.cases.pop_front() {
            Some(Ok(next)) => Ok(next),
            Some(Err(message)) => Err(server_error(&message)),
            None => Ok(NextCase::Finished),
        }
    }

    async fn submit_result(&self, request: &SubmitResultRequest) -> Result<()> {
        let mut state = self.state();
        state.submissions.push(request.clone());
        match state.submit_outcomes.pop_front().flatten() {
            Some(message) => Err(server_error(&message)),
            None => Ok(()),
        }
    }

    async fn retest_module(&self, project: &str, module_name: &str) -> Result<()> {
        let mut state = self.state();
        state
            .retest_calls
            .push((project.to_string(), module_name.to_string()));
        match &state.retest_error {
            Some(message) => Err(CasePilotError::from_server_message(Some(200), message.clone())),
            None => Ok(()),
        }
    }

    async fn list_projects(&self) -> Result<Vec<ProjectSummary>> {
        Ok(self.state().projects.clone())
    }

    async fn create_project(&self, name: &str) -> Result<()> {
        let mut state = self.state();
        if state.projects.iter().any(|project| project.name == name) {
            return Err(server_error("Project already exists"));
        }
        state.created_projects.push(name.to_string());
        state.projects.push(ProjectSummary {
            name: name.to_string(),
            created_at: None,
        });
        Ok(())
    }

    async fn list_modules(&self, project: &str) -> Result<Vec<ModuleSummary>> {
        let mut state = self.state();
        state.module_requests.push(project.to_string());
        match &state.modules_error {
            Some(message) => Err(server_error(message)),
            None => Ok(state.modules.clone()),
        }
    }

    async fn project_stats(&self, _project: &str) -> Result<ProjectStats> {
        Ok(self.state().stats.clone())
    }

    async fn export_csv(&self, project: &str) -> Result<String> {
        let mut state = self.state();
        state.export_requests.push(project.to_string());
        match &state.export {
            Some(Ok(csv)) => Ok(csv.clone()),
            Some(Err(message)) => Err(server_error(message)),
            None => Ok("ID,Module,Content,Status,Bug Report\r\n".to_string()),
        }
    }
}

//! Case review state machine.
//!
//! One case is presented at a time. Every fetch replaces the current case,
//! and each outcome is posted before the next case is requested.

use crate::api::{
    sanitize_error_message, CaseBackend, CaseId, CaseStatus, NextCase, SubmitResultRequest,
    REVIEW_QUOTA_MESSAGE,
};
use crate::context::ProjectContext;
use crate::error::{CasePilotError, Result};
use crate::events::{AppEventPayload, EventBus, NoticeLevel, RefreshReason};
use crate::logging::{log_error, log_info, log_warn};
use crate::validation::validate_bug_description;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

use super::parser::{parse, ParsedCase};

const SOURCE: &str = "review";

/// Pause between the completion notice and returning to the module list
pub const MODULE_FINISHED_RETURN_DELAY: Duration = Duration::from_millis(1000);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewState {
    Idle,
    Loading,
    Presenting,
    /// Fail pressed; waiting for the defect description
    AwaitingDefect,
    Submitting,
    /// Server reported the module complete
    Finished,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewAction {
    Pass,
    Fail,
    Skip,
    Exit,
}

/// Keyboard shortcut mapping. `f` only exists in normal mode, `s` only in
/// retest mode.
pub fn action_for_key(key: &str, is_retest: bool) -> Option<ReviewAction> {
    let key = key.trim();
    if key.eq_ignore_ascii_case("esc") || key.eq_ignore_ascii_case("escape") {
        return Some(ReviewAction::Exit);
    }

    match key.to_lowercase().as_str() {
        "p" => Some(ReviewAction::Pass),
        "f" if !is_retest => Some(ReviewAction::Fail),
        "s" if is_retest => Some(ReviewAction::Skip),
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentCase {
    pub id: CaseId,
    /// Original text, sent back as context for the defect report
    pub raw_text: String,
    pub is_retest: bool,
    pub parsed: ParsedCase,
}

pub struct CaseReviewSession {
    backend: Arc<dyn CaseBackend>,
    events: EventBus,
    project: ProjectContext,
    module: Option<String>,
    current: Option<CurrentCase>,
    state: ReviewState,
}

impl CaseReviewSession {
    pub fn new(backend: Arc<dyn CaseBackend>, events: EventBus, project: ProjectContext) -> Self {
        Self {
            backend,
            events,
            project,
            module: None,
            current: None,
            state: ReviewState::Idle,
        }
    }

    pub fn state(&self) -> ReviewState {
        self.state
    }

    pub fn module(&self) -> Option<&str> {
        self.module.as_deref()
    }

    pub fn current_case(&self) -> Option<&CurrentCase> {
        self.current.as_ref()
    }

    pub fn is_retest(&self) -> bool {
        self.current.as_ref().is_some_and(|case| case.is_retest)
    }

    /// Actions offered for the current state and mode.
    pub fn available_actions(&self) -> Vec<ReviewAction> {
        match self.state {
            ReviewState::Presenting if self.is_retest() => {
                vec![ReviewAction::Skip, ReviewAction::Pass, ReviewAction::Exit]
            }
            ReviewState::Presenting => {
                vec![ReviewAction::Fail, ReviewAction::Pass, ReviewAction::Exit]
            }
            _ => vec![ReviewAction::Exit],
        }
    }

    pub async fn open_module(&mut self, module_name: &str) -> ReviewState {
        log_info(SOURCE, &format!("Opening module {}", module_name)).unwrap_or_default();
        self.module = Some(module_name.to_string());
        self.fetch_next().await
    }

    /// Request the next unfinished (or next retest) case for the module.
    pub async fn fetch_next(&mut self) -> ReviewState {
        self.current = None;

        let Some(module) = self.module.clone() else {
            self.state = ReviewState::Idle;
            return self.state;
        };
        let Some(project) = self.project.current() else {
            self.events
                .notice(SOURCE, NoticeLevel::Error, "Select a project first");
            self.state = ReviewState::Idle;
            return self.state;
        };

        self.state = ReviewState::Loading;

        match self.backend.start_module(&module, &project).await {
            Ok(NextCase::Finished) => {
                log_info(SOURCE, &format!("Module {} complete", module)).unwrap_or_default();
                self.events
                    .notice(SOURCE, NoticeLevel::Success, "Module Complete! 🎉");
                self.schedule_return_to_modules();
                self.state = ReviewState::Finished;
            }
            Ok(NextCase::Case(case)) => {
                let parsed = parse(&case.text);
                self.current = Some(CurrentCase {
                    id: case.id,
                    raw_text: case.text,
                    is_retest: case.is_retest,
                    parsed,
                });
                self.state = ReviewState::Presenting;
            }
            Err(e) => {
                log_error(SOURCE, &format!("Failed to fetch case from {}: {}", module, e))
                    .unwrap_or_default();
                self.events
                    .notice(SOURCE, NoticeLevel::Error, "Error fetching case");
                self.state = ReviewState::Idle;
            }
        }

        self.state
    }

    /// Dispatch a shortcut. Only `Escape` works outside `Presenting`.
    pub async fn handle_key(&mut self, key: &str) -> ReviewState {
        let Some(action) = action_for_key(key, self.is_retest()) else {
            return self.state;
        };

        if action == ReviewAction::Exit {
            return self.exit();
        }
        if self.state != ReviewState::Presenting {
            return self.state;
        }

        match action {
            ReviewAction::Pass => self.handle_pass().await,
            ReviewAction::Fail => self.handle_fail(),
            ReviewAction::Skip => self.skip_case().await,
            ReviewAction::Exit => self.exit(),
        }
    }

    pub async fn handle_pass(&mut self) -> ReviewState {
        self.submit_result(CaseStatus::Pass, None).await
    }

    /// Open the defect prompt (normal mode only).
    pub fn handle_fail(&mut self) -> ReviewState {
        if self.state == ReviewState::Presenting && !self.is_retest() {
            self.state = ReviewState::AwaitingDefect;
        }
        self.state
    }

    /// Submit the defect description typed into the prompt.
    pub async fn submit_defect(&mut self, description: &str) -> ReviewState {
        if self.state != ReviewState::AwaitingDefect {
            return self.state;
        }

        match validate_bug_description(description) {
            Ok(description) => {
                self.submit_result(CaseStatus::Failed, Some(description))
                    .await
            }
            Err(e) => {
                let message = match e {
                    CasePilotError::Validation(message) => message,
                    other => other.to_string(),
                };
                self.events
                    .error_notice(SOURCE, "Missing Description", message);
                self.state
            }
        }
    }

    pub fn cancel_defect(&mut self) -> ReviewState {
        if self.state == ReviewState::AwaitingDefect {
            self.state = ReviewState::Presenting;
        }
        self.state
    }

    /// Retest mode only: move on without recording anything.
    pub async fn skip_case(&mut self) -> ReviewState {
        if self.state != ReviewState::Presenting || !self.is_retest() {
            return self.state;
        }

        if let Some(case) = &self.current {
            log_info(SOURCE, &format!("Skipped retest of case {}", case.id)).unwrap_or_default();
        }
        self.events.notice(SOURCE, NoticeLevel::Info, "Case skipped");
        self.fetch_next().await
    }

    /// Post the outcome of the current case.
    ///
    /// Success advances. On failure a `Pass` still advances (the status is
    /// assumed saved); a `Failed` stays on the case for a manual retry.
    pub async fn submit_result(
        &mut self,
        status: CaseStatus,
        bug_description: Option<String>,
    ) -> ReviewState {
        let Some(case) = self.current.clone() else {
            return self.state;
        };
        let Some(project) = self.project.current() else {
            self.events
                .notice(SOURCE, NoticeLevel::Error, "Select a project first");
            return self.state;
        };

        self.state = ReviewState::Submitting;

        let request = SubmitResultRequest {
            case_id: case.id,
            status,
            project,
            failed_case_text: Some(case.raw_text.clone()),
            bug_description,
        };

        match self.backend.submit_result(&request).await {
            Ok(()) => {
                log_info(
                    SOURCE,
                    &format!("Case {} submitted as {}", case.id, status.as_str()),
                )
                .unwrap_or_default();

                let notice = match status {
                    CaseStatus::Pass => "Case Passed",
                    CaseStatus::Failed => "Bug Reported ✅",
                };
                self.events.notice(SOURCE, NoticeLevel::Success, notice);
                self.events
                    .request_refresh(SOURCE, RefreshReason::CaseSubmitted);
                self.fetch_next().await
            }
            Err(e) => {
                log_warn(
                    SOURCE,
                    &format!("Submitting case {} as {} failed: {}", case.id, status.as_str(), e),
                )
                .unwrap_or_default();

                let message = if e.is_quota() {
                    REVIEW_QUOTA_MESSAGE.to_string()
                } else {
                    sanitize_error_message(&e.to_string())
                };
                self.events.error_notice(SOURCE, "AI Report Error", message);

                match status {
                    CaseStatus::Pass => self.fetch_next().await,
                    CaseStatus::Failed => {
                        self.state = ReviewState::Presenting;
                        self.state
                    }
                }
            }
        }
    }

    /// Leave the review view.
    pub fn exit(&mut self) -> ReviewState {
        self.module = None;
        self.current = None;
        self.state = ReviewState::Idle;
        self.events.publish(SOURCE, AppEventPayload::ReturnToModules);
        self.state
    }

    /// Reset every case outcome of a module so it can be run again.
    pub async fn retest_module(&self, module_name: &str) -> Result<()> {
        let project = self.project.current().ok_or_else(|| {
            CasePilotError::Validation("Select a project first".to_string())
        })?;

        match self.backend.retest_module(&project, module_name).await {
            Ok(()) => {
                log_info(SOURCE, &format!("Module {} reset for retest", module_name))
                    .unwrap_or_default();
                self.events.notice(
                    SOURCE,
                    NoticeLevel::Success,
                    format!("Module \"{}\" reset! 🎉", module_name),
                );
                self.events
                    .request_refresh(SOURCE, RefreshReason::ModuleReset);
                Ok(())
            }
            Err(e) => {
                let message = match &e {
                    CasePilotError::Server { message, .. } | CasePilotError::Quota(message)
                        if !message.is_empty() =>
                    {
                        message.clone()
                    }
                    CasePilotError::Server { .. } | CasePilotError::Quota(_) => {
                        "Unknown error".to_string()
                    }
                    other => other.to_string(),
                };
                self.events
                    .error_notice(SOURCE, "Retest Failed", sanitize_error_message(&message));
                Err(e)
            }
        }
    }

    fn schedule_return_to_modules(&self) {
        let events = self.events.clone();
        tokio::spawn(async move {
            sleep(MODULE_FINISHED_RETURN_DELAY).await;
            events.publish(SOURCE, AppEventPayload::ReturnToModules);
        });
    }
}

//! Wire types for the test-case backend.
//!
//! The server answers with loosely shaped JSON; every endpoint is decoded into
//! an explicit type here and optional fields are defaulted.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Server-side case identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CaseId(pub i64);

impl fmt::Display for CaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Successful upload: the server generated a module with `count` cases.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadResult {
    #[serde(default)]
    pub module: Option<String>,
    #[serde(default)]
    pub count: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct CaseBody {
    pub id: CaseId,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub is_retest: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub(crate) enum StartModuleBody {
    Case { case: CaseBody },
    Finished { finished: bool },
}

/// One case served for review
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServedCase {
    pub id: CaseId,
    pub text: String,
    pub is_retest: bool,
}

/// Result of asking for the next case of a module
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NextCase {
    Finished,
    Case(ServedCase),
}

impl StartModuleBody {
    /// `None` for `{"finished": false}`, which carries no case.
    pub(crate) fn into_next_case(self) -> Option<NextCase> {
        match self {
            StartModuleBody::Case { case } => Some(NextCase::Case(ServedCase {
                id: case.id,
                text: case.text.unwrap_or_default(),
                is_retest: case.is_retest.unwrap_or(false),
            })),
            StartModuleBody::Finished { finished: true } => Some(NextCase::Finished),
            StartModuleBody::Finished { finished: false } => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CaseStatus {
    Pass,
    Failed,
}

impl CaseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CaseStatus::Pass => "Pass",
            CaseStatus::Failed => "Failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmitResultRequest {
    pub case_id: CaseId,
    pub status: CaseStatus,
    pub project: String,
    /// Original raw case text, used by the server as AI context
    pub failed_case_text: Option<String>,
    pub bug_description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct SuccessBody {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct StartModuleRequest<'a> {
    pub module_name: &'a str,
    pub project: &'a str,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct RetestModuleRequest<'a> {
    pub project: &'a str,
    pub module_name: &'a str,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct CreateProjectRequest<'a> {
    pub name: &'a str,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectSummary {
    pub name: String,
    #[serde(default)]
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ProjectsBody {
    #[serde(default)]
    pub projects: Vec<ProjectSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleSummary {
    pub name: String,
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub passed: u64,
    #[serde(default)]
    pub failed: u64,
    #[serde(default)]
    pub progress: f64,
}

impl ModuleSummary {
    pub fn is_complete(&self) -> bool {
        self.progress >= 100.0
    }
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ModulesBody {
    #[serde(default)]
    pub modules: Vec<ModuleSummary>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectStats {
    #[serde(default)]
    pub total_cases: u64,
    #[serde(default)]
    pub passed: u64,
    #[serde(default)]
    pub failed: u64,
    #[serde(default)]
    pub pending: u64,
    #[serde(default)]
    pub modules: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_module_case_body() {
        let body: StartModuleBody = serde_json::from_str(
            r#"{"case":{"id":42,"text":"Steps: open<br>Expected result: ok","is_retest":true}}"#,
        )
        .unwrap();
        assert_eq!(
            body.into_next_case(),
            Some(NextCase::Case(ServedCase {
                id: CaseId(42),
                text: "Steps: open<br>Expected result: ok".to_string(),
                is_retest: true,
            }))
        );
    }

    #[test]
    fn test_start_module_defaults_missing_fields() {
        let body: StartModuleBody =
            serde_json::from_str(r#"{"case":{"id":7,"text":null}}"#).unwrap();
        match body.into_next_case() {
            Some(NextCase::Case(case)) => {
                assert_eq!(case.text, "");
                assert!(!case.is_retest);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_start_module_finished() {
        let body: StartModuleBody = serde_json::from_str(r#"{"finished":true}"#).unwrap();
        assert_eq!(body.into_next_case(), Some(NextCase::Finished));

        let body: StartModuleBody = serde_json::from_str(r#"{"finished":false}"#).unwrap();
        assert_eq!(body.into_next_case(), None);

        assert!(serde_json::from_str::<StartModuleBody>(r#"{"other":1}"#).is_err());
    }

    #[test]
    fn test_submit_request_shape() {
        let request = SubmitResultRequest {
            case_id: CaseId(3),
            status: CaseStatus::Failed,
            project: "Web".to_string(),
            failed_case_text: Some("Check login".to_string()),
            bug_description: Some("500 on submit".to_string()),
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["case_id"], 3);
        assert_eq!(value["status"], "Failed");
        assert_eq!(value["failed_case_text"], "Check login");
    }

    #[test]
    fn test_module_summary_defaults() {
        let body: ModulesBody =
            serde_json::from_str(r#"{"modules":[{"name":"Auth","progress":100}]}"#).unwrap();
        assert_eq!(body.modules.len(), 1);
        assert!(body.modules[0].is_complete());
        assert_eq!(body.modules[0].total, 0);
    }
}

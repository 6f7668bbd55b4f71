//! reqwest implementation of the backend contract.

use super::errors::{error_from_response, server_error_message};
use super::types::*;
use super::CaseBackend;
use crate::error::{CasePilotError, Result};
use crate::upload_queue::DocumentFile;
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::de::DeserializeOwned;
use std::time::Duration;

const CONNECT_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(server_url: &str) -> Result<Self> {
        // No overall timeout: AI extraction of a large document can take minutes
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            base_url: server_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/{}", self.base_url, path)
    }
}

/// Decode a 2xx JSON body, or turn a non-2xx response into a server error.
async fn decode_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
        return Err(error_from_response(status.as_u16(), &body));
    }

    serde_json::from_str(&body).map_err(CasePilotError::from)
}

/// For `{success, error?}` endpoints.
async fn expect_success(response: reqwest::Response) -> Result<()> {
    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
        return Err(error_from_response(status.as_u16(), &body));
    }

    match serde_json::from_str::<SuccessBody>(&body) {
        Ok(SuccessBody { success: true, .. }) => Ok(()),
        Ok(SuccessBody { error, .. }) => Err(CasePilotError::from_server_message(
            Some(status.as_u16()),
            error.unwrap_or_else(|| "Unknown error".to_string()),
        )),
        Err(_) => Err(CasePilotError::from_server_message(
            Some(status.as_u16()),
            server_error_message(status.as_u16(), &body),
        )),
    }
}

#[async_trait]
impl CaseBackend for HttpBackend {
    async fn upload_document(&self, file: &DocumentFile, project: &str) -> Result<UploadResult> {
        let bytes = tokio::fs::read(&file.path).await?;
        let part = Part::bytes(bytes).file_name(file.file_name.clone());
        let form = Form::new()
            .text("project", project.to_string())
            .part("file", part);

        let response = self
            .client
            .post(self.url("upload"))
            .multipart(form)
            .send()
            .await?;

        decode_json(response).await
    }

    async fn start_module(&self, module_name: &str, project: &str) -> Result<NextCase> {
        let response = self
            .client
            .post(self.url("start-module"))
            .json(&StartModuleRequest {
                module_name,
                project,
            })
            .send()
            .await?;

        let body: StartModuleBody = decode_json(response).await?;
        body.into_next_case().ok_or_else(|| {
            CasePilotError::Other("Server returned neither a case nor completion".to_string())
        })
    }

    async fn submit_result(&self, request: &SubmitResultRequest) -> Result<()> {
        let response = self
            .client
            .post(self.url("submit-result"))
            .json(request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(error_from_response(status.as_u16(), &body));
        }
        Ok(())
    }

    async fn retest_module(&self, project: &str, module_name: &str) -> Result<()> {
        let response = self
            .client
            .post(self.url("modules/retest"))
            .json(&RetestModuleRequest {
                project,
                module_name,
            })
            .send()
            .await?;

        expect_success(response).await
    }

    async fn list_projects(&self) -> Result<Vec<ProjectSummary>> {
        let response = self.client.get(self.url("projects")).send().await?;
        let body: ProjectsBody = decode_json(response).await?;
        Ok(body.projects)
    }

    async fn create_project(&self, name: &str) -> Result<()> {
        let response = self
            .client
            .post(self.url("projects"))
            .json(&CreateProjectRequest { name })
            .send()
            .await?;

        expect_success(response).await
    }

    async fn list_modules(&self, project: &str) -> Result<Vec<ModuleSummary>> {
        let response = self
            .client
            .get(self.url("modules"))
            .query(&[("project", project)])
            .send()
            .await?;

        let body: ModulesBody = decode_json(response).await?;
        Ok(body.modules)
    }

    async fn project_stats(&self, project: &str) -> Result<ProjectStats> {
        let response = self
            .client
            .get(self.url("stats"))
            .query(&[("project", project)])
            .send()
            .await?;

        decode_json(response).await
    }

    async fn export_csv(&self, project: &str) -> Result<String> {
        let response = self
            .client
            .get(self.url("export/csv"))
            .query(&[("project", project)])
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(error_from_response(status.as_u16(), &body));
        }
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_building() {
        let backend = HttpBackend::new("http://localhost:8000/").unwrap();
        assert_eq!(backend.base_url(), "http://localhost:8000");
        assert_eq!(backend.url("start-module"), "http://localhost:8000/api/start-module");
        assert_eq!(
            backend.url("modules/retest"),
            "http://localhost:8000/api/modules/retest"
        );
    }
}

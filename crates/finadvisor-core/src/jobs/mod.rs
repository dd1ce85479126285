//! Remote job backend: submission, status polling and report download
//!
//! The backend runs a crew of agents per job. A job is submitted once, then
//! polled by id until it reports a terminal status; every poll returns the
//! whole list of agent messages produced so far.

#[cfg(test)]
pub(crate) mod fake;
pub mod poller;
pub mod session;
pub mod tracker;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::TransportError;
use crate::http::{ensure_success, join_url, read_json};

pub use poller::{spawn_poller, PollHandle, PollSnapshot};
pub use session::{validate_submission, AdvisorSession, Submission};
pub use tracker::{JobPhase, JobTracker, Transition};

/// One unit of output from a named agent
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentMessage {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub agent: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub description: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub summary: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub expected_output: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub raw: String,
    #[serde(default)]
    pub json_dict: Option<Value>,
}

impl AgentMessage {
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            &self.agent
        } else {
            &self.name
        }
    }
}

/// Job status as reported by the backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStatus {
    InProgress(String),
    Completed,
    Failed,
    Unrecognized(String),
}

impl JobStatus {
    pub fn parse(status: &str) -> Self {
        match status.trim().to_lowercase().as_str() {
            "processing" | "pending" | "queued" | "running" => {
                JobStatus::InProgress(status.trim().to_lowercase())
            }
            "completed" => JobStatus::Completed,
            "failed" | "error" => JobStatus::Failed,
            other => JobStatus::Unrecognized(other.to_string()),
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobStatus::InProgress(_))
    }
}

#[derive(Serialize)]
struct ExecuteRequest<'a> {
    user_data: &'a str,
    user_query: &'a str,
}

/// Acknowledgement of an accepted job
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SubmitReceipt {
    pub job_id: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub message: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JobStatusResponse {
    pub status: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub result: Vec<AgentMessage>,
    #[serde(default)]
    pub error: Option<String>,
}

fn null_as_empty<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

fn null_as_default<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Vec<AgentMessage>, D::Error> {
    Ok(Option::<Vec<AgentMessage>>::deserialize(deserializer)?.unwrap_or_default())
}

/// The job-processing service
#[async_trait]
pub trait JobBackend: Send + Sync {
    async fn submit(&self, user_data: &str, user_query: &str)
        -> Result<SubmitReceipt, TransportError>;

    async fn job_status(&self, job_id: &str) -> Result<JobStatusResponse, TransportError>;

    async fn download_report(&self, job_id: &str) -> Result<String, TransportError>;
}

#[derive(Clone)]
pub struct HttpJobBackend {
    client: Client,
    base_url: String,
}

impl HttpJobBackend {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.to_string(),
        }
    }

    fn execute_url(&self) -> String {
        join_url(&self.base_url, "api/execute/")
    }

    fn status_url(&self, job_id: &str) -> String {
        join_url(&self.base_url, &format!("api/{}", job_id))
    }

    fn download_url(&self, job_id: &str) -> String {
        join_url(&self.base_url, &format!("api/download/{}", job_id))
    }
}

#[async_trait]
impl JobBackend for HttpJobBackend {
    async fn submit(
        &self,
        user_data: &str,
        user_query: &str,
    ) -> Result<SubmitReceipt, TransportError> {
        let url = self.execute_url();
        debug!("Submitting job to {}", url);

        let response = self
            .client
            .post(&url)
            .json(&ExecuteRequest {
                user_data,
                user_query,
            })
            .send()
            .await?;

        read_json(response, "job submission").await
    }

    async fn job_status(&self, job_id: &str) -> Result<JobStatusResponse, TransportError> {
        let url = self.status_url(job_id);
        let response = self.client.get(&url).send().await?;
        read_json(response, "job status").await
    }

    async fn download_report(&self, job_id: &str) -> Result<String, TransportError> {
        let url = self.download_url(job_id);
        let response = self.client.get(&url).send().await?;
        let response = ensure_success(response, "report download").await?;
        Ok(response.text().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_parsing() {
        assert_eq!(
            JobStatus::parse("processing"),
            JobStatus::InProgress("processing".into())
        );
        assert_eq!(JobStatus::parse("Completed"), JobStatus::Completed);
        assert_eq!(JobStatus::parse("failed"), JobStatus::Failed);
        assert_eq!(
            JobStatus::parse("cancelled"),
            JobStatus::Unrecognized("cancelled".into())
        );
        assert!(!JobStatus::parse("queued").is_terminal());
        assert!(JobStatus::parse("cancelled").is_terminal());
    }

    #[test]
    fn test_submission_body_uses_backend_field_names() {
        let body = serde_json::to_value(ExecuteRequest {
            user_data: "My monthly salary is ₹50000.",
            user_query: "How should I save for a house?",
        })
        .unwrap();

        assert_eq!(
            body,
            serde_json::json!({
                "user_data": "My monthly salary is ₹50000.",
                "user_query": "How should I save for a house?"
            })
        );
    }

    #[test]
    fn test_backend_endpoint_paths() {
        let backend = HttpJobBackend::new("http://localhost:8000/");

        assert_eq!(backend.execute_url(), "http://localhost:8000/api/execute/");
        assert_eq!(backend.status_url("abc-123"), "http://localhost:8000/api/abc-123");
        assert_eq!(
            backend.download_url("abc-123"),
            "http://localhost:8000/api/download/abc-123"
        );
    }

    #[test]
    fn test_status_response_tolerates_nulls() {
        let response: JobStatusResponse = serde_json::from_str(
            r#"{
                "status": "processing",
                "result": [
                    {"agent": "Debt Manager", "description": null, "summary": "Reviewed loans",
                     "raw": "{\"message\": \"ok\"}", "json_dict": null}
                ]
            }"#,
        )
        .unwrap();

        let message = &response.result[0];
        assert_eq!(message.display_name(), "Debt Manager");
        assert_eq!(message.description, "");
        assert!(message.json_dict.is_none());
        assert!(response.error.is_none());
    }

    #[test]
    fn test_status_response_null_result() {
        let response: JobStatusResponse =
            serde_json::from_str(r#"{"status": "failed", "result": null, "error": "boom"}"#)
                .unwrap();
        assert!(response.result.is_empty());
        assert_eq!(response.error.as_deref(), Some("boom"));
    }

    #[test]
    fn test_receipt_parses() {
        let receipt: SubmitReceipt =
            serde_json::from_str(r#"{"job_id": "abc", "message": "Job started successfully!"}"#)
                .unwrap();
        assert_eq!(receipt.job_id, "abc");
        assert_eq!(receipt.message, "Job started successfully!");
    }
}

//! Scripted in-memory backend for tests

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::time::Instant;

use super::{AgentMessage, JobBackend, JobStatusResponse, SubmitReceipt};
use crate::error::TransportError;

type StatusOutcome = Result<JobStatusResponse, TransportError>;

/// Hands out `job-1`, `job-2`, ... and replays scripted status responses per
/// job. Once a job's script runs out it reports `processing` forever.
#[derive(Default)]
pub(crate) struct FakeBackend {
    submissions: Mutex<Vec<(String, String)>>,
    fail_submit: Mutex<bool>,
    scripts: Mutex<HashMap<String, VecDeque<StatusOutcome>>>,
    polls: Mutex<Vec<(String, Instant)>>,
}

impl FakeBackend {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn script(&self, job_id: &str, outcomes: Vec<StatusOutcome>) {
        self.scripts
            .lock()
            .unwrap()
            .insert(job_id.to_string(), outcomes.into());
    }

    pub(crate) fn fail_next_submit(&self) {
        *self.fail_submit.lock().unwrap() = true;
    }

    pub(crate) fn submissions(&self) -> Vec<(String, String)> {
        self.submissions.lock().unwrap().clone()
    }

    pub(crate) fn polls_for(&self, job_id: &str) -> Vec<Instant> {
        self.polls
            .lock()
            .unwrap()
            .iter()
            .filter(|(id, _)| id == job_id)
            .map(|(_, at)| *at)
            .collect()
    }
}

pub(crate) fn status(status: &str, result: Vec<AgentMessage>) -> StatusOutcome {
    Ok(JobStatusResponse {
        status: status.to_string(),
        result,
        error: None,
    })
}

pub(crate) fn fetch_error() -> StatusOutcome {
    Err(TransportError::EmptyResponse("job status".into()))
}

#[async_trait]
impl JobBackend for FakeBackend {
    async fn submit(
        &self,
        user_data: &str,
        user_query: &str,
    ) -> Result<SubmitReceipt, TransportError> {
        let mut submissions = self.submissions.lock().unwrap();
        submissions.push((user_data.to_string(), user_query.to_string()));

        let mut fail = self.fail_submit.lock().unwrap();
        if *fail {
            *fail = false;
            return Err(TransportError::EmptyResponse("job submission".into()));
        }

        Ok(SubmitReceipt {
            job_id: format!("job-{}", submissions.len()),
            message: "Job started successfully!".to_string(),
        })
    }

    async fn job_status(&self, job_id: &str) -> Result<JobStatusResponse, TransportError> {
        self.polls
            .lock()
            .unwrap()
            .push((job_id.to_string(), Instant::now()));

        self.scripts
            .lock()
            .unwrap()
            .get_mut(job_id)
            .and_then(|script| script.pop_front())
            .unwrap_or_else(|| status("processing", Vec::new()))
    }

    async fn download_report(&self, job_id: &str) -> Result<String, TransportError> {
        Ok(format!("Report for {}", job_id))
    }
}

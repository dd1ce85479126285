//! Advisor session: submission plus the single active poll loop
//!
//! Front-ends that cannot block on the network split a submission into
//! [`AdvisorSession::prepare`] (validate, reset, cancel the old loop) and
//! [`AdvisorSession::finish`] (record the receipt, start polling), running
//! the backend call in between on their own task. [`AdvisorSession::submit`]
//! does all three in one go.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, info};

use super::poller::{spawn_poller, PollHandle, PollSnapshot};
use super::tracker::{JobTracker, Transition};
use super::{JobBackend, SubmitReceipt};
use crate::error::{SubmitError, TransportError, ValidationError};

/// A validated submission waiting for its backend call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub ticket: u64,
    pub user_data: String,
    pub user_query: String,
}

impl Submission {
    /// Issue the backend call for this submission.
    pub async fn send(&self, backend: &dyn JobBackend) -> Result<SubmitReceipt, TransportError> {
        backend.submit(&self.user_data, &self.user_query).await
    }
}

pub fn validate_submission(user_data: &str, user_query: &str) -> Result<(), ValidationError> {
    if user_data.trim().is_empty() || user_query.trim().is_empty() {
        return Err(ValidationError::MissingSubmissionInput);
    }
    Ok(())
}

pub struct AdvisorSession<T> {
    backend: Arc<dyn JobBackend>,
    period: Duration,
    events: mpsc::UnboundedSender<T>,
    tracker: JobTracker,
    poller: Option<PollHandle>,
    ticket: u64,
    pending: bool,
}

impl<T> AdvisorSession<T>
where
    T: From<PollSnapshot> + Send + 'static,
{
    pub fn new(
        backend: Arc<dyn JobBackend>,
        period: Duration,
        events: mpsc::UnboundedSender<T>,
    ) -> Self {
        Self {
            backend,
            period,
            events,
            tracker: JobTracker::new(),
            poller: None,
            ticket: 0,
            pending: false,
        }
    }

    pub fn backend(&self) -> Arc<dyn JobBackend> {
        Arc::clone(&self.backend)
    }

    pub fn tracker(&self) -> &JobTracker {
        &self.tracker
    }

    /// True while a submission is in flight or a job is being polled.
    pub fn is_busy(&self) -> bool {
        self.pending || self.tracker.phase().is_active()
    }

    /// Validate, then wipe all job-scoped state and stop the current poll
    /// loop. Nothing is sent yet.
    pub fn prepare(
        &mut self,
        user_data: &str,
        user_query: &str,
    ) -> Result<Submission, ValidationError> {
        validate_submission(user_data, user_query)?;

        if let Some(old) = self.poller.take() {
            debug!("Cancelling poll loop for job {}", old.job_id());
        }
        self.tracker.reset();
        self.ticket += 1;
        self.pending = true;

        Ok(Submission {
            ticket: self.ticket,
            user_data: user_data.to_string(),
            user_query: user_query.to_string(),
        })
    }

    /// Record the outcome of a submission's backend call. Outcomes for a
    /// superseded ticket are ignored.
    pub fn finish(
        &mut self,
        ticket: u64,
        outcome: Result<SubmitReceipt, TransportError>,
    ) -> Result<(), SubmitError> {
        if ticket != self.ticket {
            debug!("Ignoring outcome of superseded submission {}", ticket);
            return Ok(());
        }
        self.pending = false;

        let receipt = outcome?;
        self.tracker.begin(&receipt);
        self.poller = Some(spawn_poller(
            self.backend(),
            receipt.job_id.clone(),
            self.period,
            self.events.clone(),
        ));
        self.tracker.start_polling();
        info!("Polling job {} every {:?}", receipt.job_id, self.period);
        Ok(())
    }

    pub async fn submit(&mut self, user_data: &str, user_query: &str) -> Result<(), SubmitError> {
        let submission = self.prepare(user_data, user_query)?;
        let outcome = submission.send(self.backend.as_ref()).await;
        self.finish(submission.ticket, outcome)
    }

    /// Feed a snapshot from the poll loop into the state machine.
    pub fn apply(&mut self, snapshot: PollSnapshot) -> Transition {
        let transition = self.tracker.apply(snapshot);
        if matches!(transition, Transition::Completed | Transition::Failed(_)) {
            self.poller = None;
        }
        transition
    }

    /// Stop waiting for the current job, keeping the results already shown.
    /// A submission still in flight is abandoned too. Returns false when
    /// nothing was running.
    pub fn cancel(&mut self) -> bool {
        if !self.is_busy() {
            return false;
        }
        self.poller = None;
        // outcome of an in-flight submission no longer matches
        self.ticket += 1;
        self.pending = false;
        self.tracker.cancel();
        true
    }
}

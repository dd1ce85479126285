//! Job state machine
//!
//! `Idle -> Submitted -> Polling -> Completed | Failed | Cancelled`. The
//! tracker owns all
//! job-scoped state and only changes through [`JobTracker::reset`],
//! [`JobTracker::begin`] and poll snapshots. Snapshots for another job, or
//! older than the last one accepted, are dropped.

use tracing::{debug, info, warn};

use super::poller::PollSnapshot;
use super::{AgentMessage, JobStatus, SubmitReceipt};
use crate::format::final_output;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum JobPhase {
    #[default]
    Idle,
    Submitted,
    Polling,
    Completed,
    Failed(String),
    /// The user stopped waiting for the job
    Cancelled,
}

impl JobPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobPhase::Completed | JobPhase::Failed(_) | JobPhase::Cancelled
        )
    }

    pub fn is_active(&self) -> bool {
        matches!(self, JobPhase::Submitted | JobPhase::Polling)
    }
}

/// What applying a snapshot did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// Still running; `new_messages` is how many more results than before
    Progress { new_messages: usize },
    Completed,
    Failed(String),
    /// Snapshot belonged to another job or arrived out of order
    Stale,
}

#[derive(Debug, Default)]
pub struct JobTracker {
    job_id: Option<String>,
    phase: JobPhase,
    status: Option<String>,
    results: Vec<AgentMessage>,
    last_seq: u64,
    last_message_count: usize,
    ack: Option<String>,
    final_output: Option<String>,
}

impl JobTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear everything job-scoped and return to `Idle`.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// `Idle -> Submitted`
    pub fn begin(&mut self, receipt: &SubmitReceipt) {
        self.reset();
        info!("Job {} submitted", receipt.job_id);
        self.job_id = Some(receipt.job_id.clone());
        self.ack = Some(receipt.message.clone());
        self.phase = JobPhase::Submitted;
    }

    /// `Submitted -> Polling`, once the poll loop is running.
    pub fn start_polling(&mut self) {
        if self.phase == JobPhase::Submitted {
            self.phase = JobPhase::Polling;
        }
    }

    /// Stop following the current job; snapshots arriving later are stale.
    /// Returns false when there was nothing to cancel.
    pub fn cancel(&mut self) -> bool {
        if self.phase.is_terminal() {
            return false;
        }
        info!("Job {} cancelled", self.job_id.as_deref().unwrap_or("(not yet accepted)"));
        self.phase = JobPhase::Cancelled;
        true
    }

    pub fn apply(&mut self, snapshot: PollSnapshot) -> Transition {
        if self.job_id.as_deref() != Some(snapshot.job_id.as_str()) {
            debug!("Dropping snapshot for abandoned job {}", snapshot.job_id);
            return Transition::Stale;
        }
        if snapshot.seq <= self.last_seq || self.phase.is_terminal() {
            debug!(
                "Dropping out-of-order snapshot {} for job {}",
                snapshot.seq, snapshot.job_id
            );
            return Transition::Stale;
        }

        self.last_seq = snapshot.seq;
        self.status = Some(snapshot.status_text);
        // Each poll carries the full list, so replace rather than merge
        self.results = snapshot.results;

        match snapshot.status {
            JobStatus::InProgress(_) => {
                self.phase = JobPhase::Polling;
                let new_messages = self.results.len().saturating_sub(self.last_message_count);
                self.last_message_count = self.results.len();
                Transition::Progress { new_messages }
            }
            JobStatus::Completed => {
                self.last_message_count = self.results.len();
                if let Some(last) = self.results.last() {
                    self.final_output = Some(final_output(last));
                }
                self.phase = JobPhase::Completed;
                info!(
                    "Job {} completed with {} agent messages",
                    snapshot.job_id,
                    self.results.len()
                );
                Transition::Completed
            }
            JobStatus::Failed | JobStatus::Unrecognized(_) => {
                let reason = snapshot.error.unwrap_or_else(|| match &snapshot.status {
                    JobStatus::Unrecognized(s) => format!("Unexpected job status '{}'", s),
                    _ => "Job failed".to_string(),
                });
                warn!("Job {} failed: {}", snapshot.job_id, reason);
                self.phase = JobPhase::Failed(reason.clone());
                Transition::Failed(reason)
            }
        }
    }

    pub fn job_id(&self) -> Option<&str> {
        self.job_id.as_deref()
    }

    pub fn phase(&self) -> &JobPhase {
        &self.phase
    }

    /// Last raw status string from the backend
    pub fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }

    pub fn results(&self) -> &[AgentMessage] {
        &self.results
    }

    pub fn ack(&self) -> Option<&str> {
        self.ack.as_deref()
    }

    pub fn final_output(&self) -> Option<&str> {
        self.final_output.as_deref()
    }

    /// What to show as the answer: the final output, else the acknowledgement.
    pub fn display_output(&self) -> Option<&str> {
        self.final_output().or_else(|| self.ack())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn receipt(job_id: &str) -> SubmitReceipt {
        SubmitReceipt {
            job_id: job_id.into(),
            message: "Job started successfully!".into(),
        }
    }

    fn agent(name: &str) -> AgentMessage {
        AgentMessage {
            name: name.into(),
            summary: format!("{} finished", name),
            ..AgentMessage::default()
        }
    }

    fn snapshot(job_id: &str, seq: u64, status: &str, results: Vec<AgentMessage>) -> PollSnapshot {
        PollSnapshot {
            job_id: job_id.into(),
            seq,
            status: JobStatus::parse(status),
            status_text: status.into(),
            results,
            error: None,
        }
    }

    #[test]
    fn test_begin_enters_submitted() {
        let mut tracker = JobTracker::new();
        tracker.begin(&receipt("job-1"));
        assert_eq!(tracker.phase(), &JobPhase::Submitted);
        assert_eq!(tracker.job_id(), Some("job-1"));
        assert_eq!(tracker.display_output(), Some("Job started successfully!"));

        tracker.start_polling();
        assert_eq!(tracker.phase(), &JobPhase::Polling);
    }

    #[test]
    fn test_progress_replaces_results() {
        let mut tracker = JobTracker::new();
        tracker.begin(&receipt("job-1"));

        let t = tracker.apply(snapshot("job-1", 1, "processing", vec![agent("A"), agent("B")]));
        assert_eq!(t, Transition::Progress { new_messages: 2 });

        // A shorter list still replaces the previous one
        let t = tracker.apply(snapshot("job-1", 2, "processing", vec![agent("C")]));
        assert_eq!(t, Transition::Progress { new_messages: 0 });
        assert_eq!(tracker.results().len(), 1);
        assert_eq!(tracker.results()[0].name, "C");
        assert_eq!(tracker.status(), Some("processing"));
    }

    #[test]
    fn test_completion_uses_last_message() {
        let mut tracker = JobTracker::new();
        tracker.begin(&receipt("job-1"));
        let done = AgentMessage {
            json_dict: Some(json!({"message": "Done"})),
            ..agent("B")
        };

        let t = tracker.apply(snapshot("job-1", 1, "completed", vec![agent("A"), done]));

        assert_eq!(t, Transition::Completed);
        assert_eq!(tracker.phase(), &JobPhase::Completed);
        assert_eq!(tracker.final_output(), Some("Done"));
    }

    #[test]
    fn test_completion_without_results_keeps_ack() {
        let mut tracker = JobTracker::new();
        tracker.begin(&receipt("job-1"));
        tracker.apply(snapshot("job-1", 1, "completed", vec![]));
        assert_eq!(tracker.final_output(), None);
        assert_eq!(tracker.display_output(), Some("Job started successfully!"));
    }

    #[test]
    fn test_stale_and_foreign_snapshots_rejected() {
        let mut tracker = JobTracker::new();
        tracker.begin(&receipt("job-2"));
        tracker.apply(snapshot("job-2", 3, "processing", vec![agent("A")]));

        assert_eq!(
            tracker.apply(snapshot("job-1", 9, "completed", vec![])),
            Transition::Stale
        );
        assert_eq!(
            tracker.apply(snapshot("job-2", 2, "processing", vec![])),
            Transition::Stale
        );
        assert_eq!(tracker.results().len(), 1);
        assert_eq!(tracker.phase(), &JobPhase::Polling);
    }

    #[test]
    fn test_nothing_applies_after_terminal_state() {
        let mut tracker = JobTracker::new();
        tracker.begin(&receipt("job-1"));
        tracker.apply(snapshot("job-1", 1, "completed", vec![agent("A")]));
        assert_eq!(
            tracker.apply(snapshot("job-1", 2, "processing", vec![])),
            Transition::Stale
        );
        assert_eq!(tracker.results().len(), 1);
    }

    #[test]
    fn test_failed_status_reports_backend_error() {
        let mut tracker = JobTracker::new();
        tracker.begin(&receipt("job-1"));
        let mut snap = snapshot("job-1", 1, "failed", vec![]);
        snap.error = Some("crew crashed".into());

        assert_eq!(tracker.apply(snap), Transition::Failed("crew crashed".into()));
        assert_eq!(tracker.phase(), &JobPhase::Failed("crew crashed".into()));
    }

    #[test]
    fn test_unknown_status_fails_job() {
        let mut tracker = JobTracker::new();
        tracker.begin(&receipt("job-1"));
        let t = tracker.apply(snapshot("job-1", 1, "cancelled", vec![]));
        assert_eq!(t, Transition::Failed("Unexpected job status 'cancelled'".into()));
    }

    #[test]
    fn test_cancel_is_terminal_and_rejects_later_snapshots() {
        let mut tracker = JobTracker::new();
        tracker.begin(&receipt("job-1"));
        tracker.start_polling();
        tracker.apply(snapshot("job-1", 1, "processing", vec![agent("A")]));

        assert!(tracker.cancel());
        assert_eq!(tracker.phase(), &JobPhase::Cancelled);
        assert!(!tracker.phase().is_active());
        assert_eq!(
            tracker.apply(snapshot("job-1", 2, "completed", vec![agent("B")])),
            Transition::Stale
        );
        assert_eq!(tracker.results()[0].name, "A");

        // already terminal
        assert!(!tracker.cancel());
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut tracker = JobTracker::new();
        tracker.begin(&receipt("job-1"));
        tracker.apply(snapshot("job-1", 1, "completed", vec![agent("A")]));

        tracker.reset();

        assert_eq!(tracker.phase(), &JobPhase::Idle);
        assert!(tracker.job_id().is_none());
        assert!(tracker.results().is_empty());
        assert!(tracker.display_output().is_none());
        assert!(tracker.status().is_none());
    }
}

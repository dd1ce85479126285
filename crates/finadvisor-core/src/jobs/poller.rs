//! Fixed-interval status polling
//!
//! One tokio task per job. The first fetch goes out immediately, the next
//! one a period after the previous tick, and a fetch is always awaited before
//! the next tick so requests never overlap. Fetch failures are logged and
//! skipped. The loop ends on a terminal status, when the receiver goes away,
//! or when its [`PollHandle`] is dropped.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use super::{AgentMessage, JobBackend, JobStatus};

/// One poll response, stamped with the job it belongs to and its position in
/// the poll sequence
#[derive(Debug, Clone)]
pub struct PollSnapshot {
    pub job_id: String,
    pub seq: u64,
    pub status: JobStatus,
    pub status_text: String,
    pub results: Vec<AgentMessage>,
    pub error: Option<String>,
}

/// Owns a running poll loop; dropping it aborts the loop.
#[derive(Debug)]
pub struct PollHandle {
    job_id: String,
    task: JoinHandle<()>,
}

impl PollHandle {
    pub fn job_id(&self) -> &str {
        &self.job_id
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Start polling `job_id`, delivering each snapshot into `events`.
pub fn spawn_poller<T>(
    backend: Arc<dyn JobBackend>,
    job_id: String,
    period: Duration,
    events: mpsc::UnboundedSender<T>,
) -> PollHandle
where
    T: From<PollSnapshot> + Send + 'static,
{
    let task = tokio::spawn(poll_until_terminal(
        backend,
        job_id.clone(),
        period,
        events,
    ));
    PollHandle { job_id, task }
}

pub async fn poll_until_terminal<T>(
    backend: Arc<dyn JobBackend>,
    job_id: String,
    period: Duration,
    events: mpsc::UnboundedSender<T>,
) where
    T: From<PollSnapshot> + Send + 'static,
{
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut seq = 0u64;

    loop {
        ticker.tick().await;
        seq += 1;

        let response = match backend.job_status(&job_id).await {
            Ok(response) => response,
            Err(e) => {
                warn!("Error fetching status of job {}: {}", job_id, e);
                continue;
            }
        };

        let status = JobStatus::parse(&response.status);
        let terminal = status.is_terminal();
        debug!(
            "Job {} poll {}: {} with {} messages",
            job_id,
            seq,
            response.status,
            response.result.len()
        );

        let snapshot = PollSnapshot {
            job_id: job_id.clone(),
            seq,
            status,
            status_text: response.status,
            results: response.result,
            error: response.error,
        };

        if events.send(T::from(snapshot)).is_err() {
            debug!("Snapshot receiver closed, stopping poll of job {}", job_id);
            break;
        }
        if terminal {
            break;
        }
    }
}

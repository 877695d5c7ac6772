use async_trait::async_trait;
use common::judge_job::{JobMode, JobPayload};
use common::verdict::Verdict;
use tracing::warn;

use crate::error::QueueError;

/// The shared store between the server and the external judge worker.
#[async_trait]
pub trait QueueStore: Send + Sync {
    /// Cheap liveness probe, checked before every queue operation.
    async fn is_ready(&self) -> bool;

    /// Write the job hash and push its id onto the work list.
    async fn enqueue(&self, job_id: &str, payload: &JobPayload) -> Result<(), QueueError>;

    /// Raw verdict string, `None` while the worker has not written one.
    async fn fetch_raw_verdict(
        &self,
        mode: JobMode,
        job_id: &str,
    ) -> Result<Option<String>, QueueError>;

    /// Read and decode the verdict for a job.
    ///
    /// A missing key is [`Verdict::Pending`]. A payload that cannot be
    /// decoded becomes a `MALFORMED_VERDICT` system error instead of failing
    /// the poll.
    async fn fetch_verdict(&self, mode: JobMode, job_id: &str) -> Result<Verdict, QueueError> {
        let Some(raw) = self.fetch_raw_verdict(mode, job_id).await? else {
            return Ok(Verdict::Pending);
        };

        match Verdict::parse(&raw) {
            Ok(verdict) => Ok(verdict),
            Err(e) => {
                warn!(job_id, mode = mode.as_str(), error = %e, "Rejected malformed verdict");
                Ok(Verdict::malformed(&e))
            }
        }
    }
}

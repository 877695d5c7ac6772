use common::judge_job::JobMode;

/// Key layout of the judge protocol.
///
/// With the default prefix:
/// - `judge:{jobId}` hash holding `data` and `createdAt`
/// - `judge:queue` list the worker pops job ids from
/// - `judge:{mode}:verdict:{jobId}` string the worker writes its verdict to
#[derive(Clone, Debug)]
pub struct QueueKeys {
    prefix: String,
}

impl QueueKeys {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn job(&self, job_id: &str) -> String {
        format!("{}:{}", self.prefix, job_id)
    }

    pub fn queue(&self) -> String {
        format!("{}:queue", self.prefix)
    }

    pub fn verdict(&self, mode: JobMode, job_id: &str) -> String {
        format!("{}:{}:verdict:{}", self.prefix, mode.as_str(), job_id)
    }
}

impl Default for QueueKeys {
    fn default() -> Self {
        Self::new("judge")
    }
}

use thiserror::Error;

#[derive(Debug, Error)]
pub enum QueueError {
    /// The store did not answer a readiness probe.
    #[error("queue store unavailable: {0}")]
    Unavailable(String),

    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("failed to encode job payload: {0}")]
    Serialization(#[from] serde_json::Error),
}

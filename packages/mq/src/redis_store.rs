use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use common::config::QueueAppConfig;
use common::judge_job::{JobMode, JobPayload, encode_created_at};
use redis::aio::ConnectionManager;
use tracing::{info, warn};

use crate::error::QueueError;
use crate::keys::QueueKeys;
use crate::store::QueueStore;

/// Redis-backed [`QueueStore`].
#[derive(Clone)]
pub struct RedisQueueStore {
    conn: ConnectionManager,
    keys: QueueKeys,
    ready_timeout: Duration,
}

impl RedisQueueStore {
    pub async fn connect(config: &QueueAppConfig) -> Result<Self, QueueError> {
        let client = redis::Client::open(config.url.as_str())?;
        let conn = ConnectionManager::new(client).await?;
        info!(url = %config.url, prefix = %config.key_prefix, "Connected to queue store");

        Ok(Self {
            conn,
            keys: QueueKeys::new(config.key_prefix.clone()),
            ready_timeout: Duration::from_secs(config.ready_timeout_secs),
        })
    }
}

#[async_trait]
impl QueueStore for RedisQueueStore {
    async fn is_ready(&self) -> bool {
        let mut conn = self.conn.clone();
        let ping_cmd = redis::cmd("PING");
        let ping = ping_cmd.query_async::<String>(&mut conn);
        match tokio::time::timeout(self.ready_timeout, ping).await {
            Ok(Ok(_)) => true,
            Ok(Err(e)) => {
                warn!(error = %e, "Queue store PING failed");
                false
            }
            Err(_) => {
                warn!("Queue store PING timed out");
                false
            }
        }
    }

    async fn enqueue(&self, job_id: &str, payload: &JobPayload) -> Result<(), QueueError> {
        let data = serde_json::to_string(payload)?;
        let mut conn = self.conn.clone();

        redis::pipe()
            .atomic()
            .cmd("HSET")
            .arg(self.keys.job(job_id))
            .arg("data")
            .arg(data)
            .arg("createdAt")
            .arg(encode_created_at(Utc::now()))
            .ignore()
            .cmd("LPUSH")
            .arg(self.keys.queue())
            .arg(job_id)
            .ignore()
            .query_async::<()>(&mut conn)
            .await?;

        Ok(())
    }

    async fn fetch_raw_verdict(
        &self,
        mode: JobMode,
        job_id: &str,
    ) -> Result<Option<String>, QueueError> {
        let mut conn = self.conn.clone();
        let raw = redis::cmd("GET")
            .arg(self.keys.verdict(mode, job_id))
            .query_async::<Option<String>>(&mut conn)
            .await?;
        Ok(raw)
    }
}

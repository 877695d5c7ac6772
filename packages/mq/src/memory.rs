use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use common::judge_job::{JobMode, JobPayload, JobRecord, decode_created_at, encode_created_at};
use dashmap::DashMap;

use crate::error::QueueError;
use crate::keys::QueueKeys;
use crate::store::QueueStore;

/// In-process [`QueueStore`] with the same key layout as Redis.
///
/// Used when the queue is disabled in config and by tests, which play the
/// worker's role through [`MemoryQueueStore::put_verdict`].
pub struct MemoryQueueStore {
    keys: QueueKeys,
    ready: AtomicBool,
    hashes: DashMap<String, HashMap<String, String>>,
    lists: Mutex<HashMap<String, VecDeque<String>>>,
    strings: DashMap<String, String>,
}

impl MemoryQueueStore {
    pub fn new(keys: QueueKeys) -> Self {
        Self {
            keys,
            ready: AtomicBool::new(true),
            hashes: DashMap::new(),
            lists: Mutex::new(HashMap::new()),
            strings: DashMap::new(),
        }
    }

    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::SeqCst);
    }

    /// Write a verdict the way the worker would.
    pub fn put_verdict(&self, mode: JobMode, job_id: &str, raw: impl Into<String>) {
        self.strings
            .insert(self.keys.verdict(mode, job_id), raw.into());
    }

    /// Job ids on the work list, oldest first (the end the worker pops from).
    pub fn queued_job_ids(&self) -> Vec<String> {
        let lists = self.lists.lock().unwrap_or_else(|p| p.into_inner());
        lists
            .get(&self.keys.queue())
            .map(|list| list.iter().rev().cloned().collect())
            .unwrap_or_default()
    }

    /// The job hash for an id, decoded.
    pub fn job(&self, job_id: &str) -> Option<JobRecord> {
        let hash = self.hashes.get(&self.keys.job(job_id))?;
        let data: JobPayload = serde_json::from_str(hash.get("data")?).ok()?;
        let created_at = decode_created_at(hash.get("createdAt")?)?;
        Some(JobRecord { data, created_at })
    }
}

impl Default for MemoryQueueStore {
    fn default() -> Self {
        Self::new(QueueKeys::default())
    }
}

#[async_trait]
impl QueueStore for MemoryQueueStore {
    async fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    async fn enqueue(&self, job_id: &str, payload: &JobPayload) -> Result<(), QueueError> {
        if !self.ready.load(Ordering::SeqCst) {
            return Err(QueueError::Unavailable("memory store marked not ready".into()));
        }

        let data = serde_json::to_string(payload)?;
        let hash = HashMap::from([
            ("data".to_string(), data),
            ("createdAt".to_string(), encode_created_at(Utc::now())),
        ]);
        self.hashes.insert(self.keys.job(job_id), hash);

        let mut lists = self.lists.lock().unwrap_or_else(|p| p.into_inner());
        lists
            .entry(self.keys.queue())
            .or_default()
            .push_front(job_id.to_string());

        Ok(())
    }

    async fn fetch_raw_verdict(
        &self,
        mode: JobMode,
        job_id: &str,
    ) -> Result<Option<String>, QueueError> {
        if !self.ready.load(Ordering::SeqCst) {
            return Err(QueueError::Unavailable("memory store marked not ready".into()));
        }
        Ok(self
            .strings
            .get(&self.keys.verdict(mode, job_id))
            .map(|v| v.value().clone()))
    }
}

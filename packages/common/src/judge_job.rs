use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which flow a job belongs to. Determines the verdict key the worker writes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobMode {
    /// Ad-hoc "try it" run, nothing persisted.
    Run,
    /// Graded submission.
    Submit,
}

impl JobMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Run => "run",
            Self::Submit => "submit",
        }
    }
}

/// One test case shipped to the worker.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobTestCase {
    /// Stored test case id. Absent for ad-hoc run mode cases, where the
    /// worker falls back to the case's index.
    #[serde(
        rename = "testCaseId",
        alias = "id",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub id: Option<i32>,
    pub input: String,
    pub expected_output: String,
    #[serde(default = "default_public")]
    pub is_public: bool,
}

fn default_public() -> bool {
    true
}

/// The `data` field of the `judge:{jobId}` hash.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobPayload {
    pub code: String,
    pub language: String,
    pub test_cases: Vec<JobTestCase>,
    pub mode: JobMode,
}

/// A job as it sits in the queue store.
#[derive(Clone, Debug, PartialEq)]
pub struct JobRecord {
    pub data: JobPayload,
    pub created_at: DateTime<Utc>,
}

/// `createdAt` hash field: epoch milliseconds as a decimal string.
pub fn encode_created_at(at: DateTime<Utc>) -> String {
    at.timestamp_millis().to_string()
}

pub fn decode_created_at(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp_millis(raw.trim().parse().ok()?)
}

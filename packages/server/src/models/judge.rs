use common::judge_job::JobTestCase;
use common::{ErrorDetail, GradingStatus, JobState, TestResult, VerdictMetrics};
use serde::{Deserialize, Serialize};

/// One ad-hoc test case for a run.
#[derive(Clone, Debug, Deserialize, utoipa::ToSchema)]
pub struct RunTestCase {
    #[schema(example = "1 2")]
    pub input: String,
    #[schema(example = "3")]
    pub expected_output: String,
}

impl From<RunTestCase> for JobTestCase {
    fn from(tc: RunTestCase) -> Self {
        Self {
            id: None,
            input: tc.input,
            expected_output: tc.expected_output,
            is_public: true,
        }
    }
}

/// Request body for an ad-hoc run.
#[derive(Deserialize, utoipa::ToSchema)]
pub struct RunRequest {
    #[schema(example = "a, b = map(int, input().split())\nprint(a + b)")]
    pub code: String,
    #[schema(example = "python")]
    pub language: String,
    pub test_cases: Vec<RunTestCase>,
}

/// Request body for a graded submission.
#[derive(Deserialize, utoipa::ToSchema)]
pub struct SubmitRequest {
    #[schema(example = 1)]
    pub assignment_id: i32,
    pub code: String,
    #[schema(example = "python")]
    pub language: String,
}

/// Accepted ad-hoc run.
#[derive(Serialize, utoipa::ToSchema)]
pub struct RunAccepted {
    #[schema(example = "3f1c2a9e-0b7d-4c55-8d0e-1b2c3d4e5f60")]
    pub job_id: String,
    #[schema(example = "/api/v1/judge/status/3f1c2a9e-0b7d-4c55-8d0e-1b2c3d4e5f60")]
    pub status_url: String,
}

/// Accepted graded submission.
#[derive(Serialize, utoipa::ToSchema)]
pub struct SubmitAccepted {
    #[schema(example = 42)]
    pub submission_id: i32,
    #[schema(example = "42")]
    pub job_id: String,
    #[schema(example = "/api/v1/judge/submit-status/42")]
    pub status_url: String,
    /// Attempts left after this one. Null when the assignment has no cap.
    #[schema(example = 2)]
    pub remaining_attempts: Option<i64>,
}

/// Metrics visible for ad-hoc runs.
#[derive(Serialize, utoipa::ToSchema)]
pub struct RunMetrics {
    pub passed: u32,
    pub total: u32,
    pub average_runtime_ms: Option<f64>,
}

impl From<VerdictMetrics> for RunMetrics {
    fn from(m: VerdictMetrics) -> Self {
        Self {
            passed: m.passed,
            total: m.total,
            average_runtime_ms: m.average_runtime_ms,
        }
    }
}

/// Status of an ad-hoc run.
#[derive(Serialize, utoipa::ToSchema)]
pub struct RunStatusResponse {
    pub job_id: String,
    pub status: JobState,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub test_results: Vec<TestResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics: Option<RunMetrics>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorDetail>,
}

/// Status of a graded submission's job.
#[derive(Serialize, utoipa::ToSchema)]
pub struct SubmitStatusResponse {
    pub job_id: String,
    pub submission_id: i32,
    pub status: JobState,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub test_results: Vec<TestResult>,
    /// Present once the job completed, with the public/private split.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics: Option<VerdictMetrics>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorDetail>,
    pub grading_status: GradingStatus,
    pub auto_score: Option<f64>,
    pub final_score: Option<f64>,
}

/// Attempt budget for the calling student.
#[derive(Serialize, utoipa::ToSchema)]
pub struct AttemptsResponse {
    #[schema(example = 1)]
    pub assignment_id: i32,
    #[schema(example = 1)]
    pub used: u64,
    /// Null when uncapped.
    #[schema(example = 3)]
    pub max: Option<i32>,
    /// Null when uncapped.
    #[schema(example = 2)]
    pub remaining: Option<i64>,
}

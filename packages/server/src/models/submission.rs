use chrono::{DateTime, Utc};
use common::{ErrorDetail, GradingStatus, SubmissionStatus, TestResult};
use serde::{Deserialize, Serialize};

use crate::entity::{plagiarism_report, submission};

/// Full submission details.
#[derive(Serialize, utoipa::ToSchema)]
pub struct SubmissionResponse {
    #[schema(example = 42)]
    pub id: i32,
    #[schema(example = 7)]
    pub student_id: i32,
    #[schema(example = 1)]
    pub assignment_id: i32,
    #[schema(example = "python")]
    pub language: String,
    pub code: String,
    pub status: SubmissionStatus,
    pub grading_status: GradingStatus,
    pub auto_score: Option<f64>,
    pub manual_score: Option<f64>,
    pub final_score: Option<f64>,
    pub feedback: Option<String>,
    /// Compile or system error, when the job failed.
    pub error: Option<ErrorDetail>,
    pub test_results: Vec<TestResult>,
    #[schema(example = "2025-10-01T14:30:00Z")]
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl SubmissionResponse {
    pub fn new(
        sub: submission::Model,
        test_results: Vec<TestResult>,
        error: Option<ErrorDetail>,
    ) -> Self {
        Self {
            id: sub.id,
            student_id: sub.student_id,
            assignment_id: sub.assignment_id,
            language: sub.language,
            code: sub.code,
            status: sub.status,
            grading_status: sub.grading_status,
            auto_score: sub.auto_score,
            manual_score: sub.manual_score,
            final_score: sub.final_score,
            feedback: sub.feedback,
            error,
            test_results,
            created_at: sub.created_at,
            completed_at: sub.completed_at,
        }
    }
}

/// Request body for an instructor grade.
#[derive(Deserialize, utoipa::ToSchema)]
pub struct GradeRequest {
    /// Points, between 0 and the assignment's maximum.
    #[schema(example = 90.0)]
    pub manual_score: f64,
    #[schema(example = "Clean solution, missing edge case for empty input.")]
    pub feedback: Option<String>,
}

/// Grade after an instructor update.
#[derive(Serialize, utoipa::ToSchema)]
pub struct GradeResponse {
    #[schema(example = 42)]
    pub submission_id: i32,
    pub grading_status: GradingStatus,
    pub auto_score: Option<f64>,
    pub manual_score: Option<f64>,
    #[schema(example = 84.25)]
    pub final_score: Option<f64>,
    pub feedback: Option<String>,
}

impl From<submission::Model> for GradeResponse {
    fn from(sub: submission::Model) -> Self {
        Self {
            submission_id: sub.id,
            grading_status: sub.grading_status,
            auto_score: sub.auto_score,
            manual_score: sub.manual_score,
            final_score: sub.final_score,
            feedback: sub.feedback,
        }
    }
}

/// One similarity finding involving a submission.
#[derive(Serialize, utoipa::ToSchema)]
pub struct PlagiarismReportResponse {
    #[schema(example = 42)]
    pub submission_id: i32,
    #[schema(example = 17)]
    pub compared_submission_id: i32,
    #[schema(example = 0.82)]
    pub similarity: f64,
    /// Whether the similarity reaches the reporting threshold.
    pub flagged: bool,
    pub checked_at: DateTime<Utc>,
}

impl From<plagiarism_report::Model> for PlagiarismReportResponse {
    fn from(r: plagiarism_report::Model) -> Self {
        Self {
            submission_id: r.submission_id,
            compared_submission_id: r.compared_submission_id,
            similarity: r.similarity,
            flagged: crate::services::plagiarism::is_flagged(r.similarity),
            checked_at: r.checked_at,
        }
    }
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct PlagiarismReportList {
    pub data: Vec<PlagiarismReportResponse>,
}

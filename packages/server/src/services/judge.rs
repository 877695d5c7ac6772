//! Submission admission, queueing and the verdict state machine.

use std::collections::HashMap;

use chrono::Utc;
use common::event::{SubmissionCompleted, SubmissionCreated};
use common::judge_job::{JobMode, JobPayload, JobTestCase};
use common::{
    DomainEvent, ErrorDetail, FailureKind, GradingStatus, JobState, SubmissionStatus, TestResult,
    Verdict, VerdictMetrics,
};
use sea_orm::sea_query::LockType;
use sea_orm::*;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::config::SubmissionConfig;
use crate::entity::{
    assignment, plagiarism_fingerprint, plagiarism_report, submission, submission_attempt,
    test_case, test_result,
};
use crate::error::AppError;
use crate::services::{grading, plagiarism};
use crate::state::AppState;

/// Check the fields every job needs.
pub fn validate_code(code: &str, language: &str, config: &SubmissionConfig) -> Result<(), AppError> {
    if code.trim().is_empty() {
        return Err(AppError::Validation("Code is required".into()));
    }
    if language.trim().is_empty() {
        return Err(AppError::Validation("Language is required".into()));
    }
    if code.chars().count() > config.max_code_length {
        return Err(AppError::Validation(format!(
            "Code exceeds the maximum length of {} characters",
            config.max_code_length
        )));
    }
    Ok(())
}

pub fn validate_language(language: &str, config: &SubmissionConfig) -> Result<(), AppError> {
    if config.languages.iter().any(|l| l == language) {
        Ok(())
    } else {
        Err(AppError::Validation(format!(
            "Unsupported language '{language}'"
        )))
    }
}

/// `None` means the assignment has no cap.
pub fn remaining_attempts(max_submissions: Option<i32>, used: u64) -> Option<i64> {
    max_submissions.map(|max| std::cmp::Ord::max(max as i64 - used as i64, 0))
}

pub async fn attempts_used<C: ConnectionTrait>(
    db: &C,
    assignment_id: i32,
    student_id: i32,
) -> Result<u64, DbErr> {
    submission_attempt::Entity::find()
        .filter(submission_attempt::Column::AssignmentId.eq(assignment_id))
        .filter(submission_attempt::Column::StudentId.eq(student_id))
        .count(db)
        .await
}

/// Fail fast with 503 when the queue store does not answer its readiness probe.
pub async fn ensure_queue_ready(state: &AppState) -> Result<(), AppError> {
    if state.queue.is_ready().await {
        Ok(())
    } else {
        Err(AppError::ServiceUnavailable("queue store not ready".into()))
    }
}

/// Queue an ad-hoc run. Nothing is persisted; returns the job id.
#[instrument(skip(state, code, test_cases))]
pub async fn enqueue_run(
    state: &AppState,
    code: String,
    language: String,
    test_cases: Vec<JobTestCase>,
) -> Result<String, AppError> {
    validate_code(&code, &language, &state.config.submission)?;
    if test_cases.is_empty() {
        return Err(AppError::Validation("At least one test case is required".into()));
    }
    ensure_queue_ready(state).await?;

    let job_id = Uuid::new_v4().to_string();
    let case_count = test_cases.len();
    let payload = JobPayload {
        code,
        language,
        test_cases,
        mode: JobMode::Run,
    };
    state.queue.enqueue(&job_id, &payload).await?;

    info!(job_id = %job_id, test_cases = case_count, "Run job enqueued");
    Ok(job_id)
}

pub struct SubmitOutcome {
    pub submission: submission::Model,
    pub job_id: String,
    /// Attempts left after this one. `None` when uncapped.
    pub remaining_attempts: Option<i64>,
}

/// Delete a submission together with everything hanging off it.
async fn delete_submission_cascade<C: ConnectionTrait>(db: &C, submission_id: i32) -> Result<(), DbErr> {
    test_result::Entity::delete_many()
        .filter(test_result::Column::SubmissionId.eq(submission_id))
        .exec(db)
        .await?;
    plagiarism_fingerprint::Entity::delete_many()
        .filter(plagiarism_fingerprint::Column::SubmissionId.eq(submission_id))
        .exec(db)
        .await?;
    plagiarism_report::Entity::delete_many()
        .filter(
            Condition::any()
                .add(plagiarism_report::Column::SubmissionId.eq(submission_id))
                .add(plagiarism_report::Column::ComparedSubmissionId.eq(submission_id)),
        )
        .exec(db)
        .await?;
    submission::Entity::delete_by_id(submission_id).exec(db).await?;
    Ok(())
}

/// Admit a graded submission.
///
/// The assignment row lock serializes concurrent resubmissions by the same
/// student. The transaction only commits once the job is on the queue.
#[instrument(skip(state, code))]
pub async fn submit(
    state: &AppState,
    student_id: i32,
    assignment_id: i32,
    code: String,
    language: String,
) -> Result<SubmitOutcome, AppError> {
    validate_code(&code, &language, &state.config.submission)?;
    validate_language(&language, &state.config.submission)?;
    ensure_queue_ready(state).await?;

    let txn = state.db.begin().await?;

    let assignment = assignment::Entity::find_by_id(assignment_id)
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .ok_or_else(|| AppError::NotFound("Assignment not found".into()))?;

    let used = attempts_used(&txn, assignment_id, student_id).await?;
    let remaining = remaining_attempts(assignment.max_submissions, used);
    if remaining == Some(0) {
        info!(student_id, assignment_id, used, "Submission attempts exhausted");
        return Err(AppError::AttemptsExhausted {
            max_submissions: assignment.max_submissions.unwrap_or_default(),
        });
    }

    let previous = submission::Entity::find()
        .filter(submission::Column::StudentId.eq(student_id))
        .filter(submission::Column::AssignmentId.eq(assignment_id))
        .one(&txn)
        .await?;
    if let Some(prev) = previous {
        delete_submission_cascade(&txn, prev.id).await?;
        info!(previous_id = prev.id, "Replacing earlier submission");
    }

    let now = Utc::now();
    let model = submission::ActiveModel {
        student_id: Set(student_id),
        assignment_id: Set(assignment_id),
        language: Set(language.clone()),
        code: Set(code.clone()),
        status: Set(SubmissionStatus::Queued),
        grading_status: Set(GradingStatus::Pending),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    submission_attempt::ActiveModel {
        student_id: Set(student_id),
        assignment_id: Set(assignment_id),
        created_at: Set(now),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    let test_cases: Vec<JobTestCase> = test_case::Entity::find()
        .filter(test_case::Column::AssignmentId.eq(assignment_id))
        .order_by_asc(test_case::Column::Position)
        .order_by_asc(test_case::Column::Id)
        .all(&txn)
        .await?
        .into_iter()
        .map(|tc| JobTestCase {
            id: Some(tc.id),
            input: tc.input,
            expected_output: tc.expected_output,
            is_public: tc.is_public,
        })
        .collect();
    if test_cases.is_empty() {
        return Err(AppError::NoTestCases);
    }

    let job_id = model.id.to_string();
    let case_count = test_cases.len();
    let payload = JobPayload {
        code,
        language: language.clone(),
        test_cases,
        mode: JobMode::Submit,
    };
    state.queue.enqueue(&job_id, &payload).await?;

    txn.commit().await?;

    info!(
        submission_id = model.id,
        job_id = %job_id,
        test_cases = case_count,
        "Submission enqueued"
    );

    state
        .events
        .publish(DomainEvent::new(SubmissionCreated {
            submission_id: model.id,
            assignment_id,
            student_id,
            classroom_id: assignment.classroom_id,
            language,
        }))
        .await;

    Ok(SubmitOutcome {
        submission: model,
        job_id,
        remaining_attempts: remaining.map(|r| r - 1),
    })
}

/// Where a submission's job stands, as seen by the client.
pub struct SubmissionProgress {
    pub submission: submission::Model,
    pub state: JobState,
    pub test_results: Vec<TestResult>,
    pub error: Option<ErrorDetail>,
}

impl SubmissionProgress {
    pub fn metrics(&self) -> VerdictMetrics {
        VerdictMetrics::from_results(&self.test_results)
    }
}

pub fn to_test_result(row: &test_result::Model) -> TestResult {
    TestResult {
        test_case_id: row.test_case_id,
        status: row.status,
        actual: row.actual.clone(),
        execution_time: row.execution_time_ms,
        memory: row.memory_kb,
        error_type: row.error_type.clone(),
        error_message: row.error_message.clone(),
        is_public: Some(row.is_public),
    }
}

fn job_state_of(sub: &submission::Model) -> JobState {
    match sub.status {
        SubmissionStatus::Queued => JobState::Pending,
        SubmissionStatus::Running => JobState::Running,
        SubmissionStatus::Completed => JobState::Completed,
        SubmissionStatus::Error => match sub.failure_kind {
            Some(FailureKind::CompileError) => JobState::CompileError,
            _ => JobState::SystemError,
        },
    }
}

/// Build progress from stored state only.
pub async fn stored_progress<C: ConnectionTrait>(
    db: &C,
    sub: submission::Model,
) -> Result<SubmissionProgress, AppError> {
    let test_results = if sub.status == SubmissionStatus::Completed {
        test_result::Entity::find()
            .filter(test_result::Column::SubmissionId.eq(sub.id))
            .order_by_asc(test_result::Column::Id)
            .all(db)
            .await?
            .iter()
            .map(to_test_result)
            .collect()
    } else {
        vec![]
    };

    let error = (sub.status == SubmissionStatus::Error).then(|| ErrorDetail {
        error_type: sub.error_type.clone().unwrap_or_default(),
        error_message: sub.error_message.clone().unwrap_or_default(),
        full_error: sub.full_error.clone(),
    });

    Ok(SubmissionProgress {
        state: job_state_of(&sub),
        submission: sub,
        test_results,
        error,
    })
}

/// Poll the verdict for a submission and advance its state.
///
/// Finished submissions are answered from the database without touching the
/// queue store.
#[instrument(skip(state, sub), fields(submission_id = sub.id))]
pub async fn poll_submission(
    state: &AppState,
    sub: submission::Model,
) -> Result<SubmissionProgress, AppError> {
    if sub.status.is_terminal() {
        return stored_progress(&state.db, sub).await;
    }

    ensure_queue_ready(state).await?;
    let verdict = state
        .queue
        .fetch_verdict(JobMode::Submit, &sub.id.to_string())
        .await?;

    match verdict {
        Verdict::Pending => stored_progress(&state.db, sub).await,
        Verdict::Running => mark_running(&state.db, sub).await,
        Verdict::CompileError(detail) => {
            mark_failed(&state.db, sub.id, FailureKind::CompileError, detail).await
        }
        Verdict::SystemError(detail) => {
            mark_failed(&state.db, sub.id, FailureKind::SystemError, detail).await
        }
        Verdict::Completed(results) => finalize(state, sub.id, results).await,
    }
}

async fn mark_running(
    db: &DatabaseConnection,
    sub: submission::Model,
) -> Result<SubmissionProgress, AppError> {
    if !sub.status.can_transition_to(SubmissionStatus::Running) {
        return stored_progress(db, sub).await;
    }

    let updated = submission::Entity::update_many()
        .set(submission::ActiveModel {
            status: Set(SubmissionStatus::Running),
            updated_at: Set(Utc::now()),
            ..Default::default()
        })
        .filter(submission::Column::Id.eq(sub.id))
        .filter(submission::Column::Status.eq(SubmissionStatus::Queued))
        .exec(db)
        .await?;

    if updated.rows_affected > 0 {
        info!(submission_id = sub.id, "Submission running");
    }

    let current = crate::services::lookup::find_submission(db, sub.id).await?;
    stored_progress(db, current).await
}

async fn mark_failed(
    db: &DatabaseConnection,
    submission_id: i32,
    kind: FailureKind,
    detail: ErrorDetail,
) -> Result<SubmissionProgress, AppError> {
    let txn = db.begin().await?;

    let sub = submission::Entity::find_by_id(submission_id)
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .ok_or_else(|| AppError::NotFound("Submission not found".into()))?;

    if !sub.status.can_transition_to(SubmissionStatus::Error) {
        txn.commit().await?;
        return stored_progress(db, sub).await;
    }

    let now = Utc::now();
    let mut active: submission::ActiveModel = sub.into();
    active.status = Set(SubmissionStatus::Error);
    active.failure_kind = Set(Some(kind));
    active.error_type = Set(Some(detail.error_type.clone()));
    active.error_message = Set(Some(detail.error_message.clone()));
    active.full_error = Set(detail.full_error.clone());
    active.completed_at = Set(Some(now));
    active.updated_at = Set(now);
    let updated = active.update(&txn).await?;

    txn.commit().await?;

    warn!(
        submission_id,
        failure = ?kind,
        error_type = %detail.error_type,
        "Submission failed in the judge"
    );

    stored_progress(db, updated).await
}

/// First `completed` observation: persist results, mark completed, grade,
/// start the plagiarism check and emit `SUBMISSION_COMPLETED`.
async fn finalize(
    state: &AppState,
    submission_id: i32,
    mut results: Vec<TestResult>,
) -> Result<SubmissionProgress, AppError> {
    let txn = state.db.begin().await?;

    let sub = submission::Entity::find_by_id(submission_id)
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .ok_or_else(|| AppError::NotFound("Submission not found".into()))?;

    if !sub.status.can_transition_to(SubmissionStatus::Completed) {
        // Another poll got here first.
        txn.commit().await?;
        return stored_progress(&state.db, sub).await;
    }

    let visibility: HashMap<i32, bool> = test_case::Entity::find()
        .filter(test_case::Column::AssignmentId.eq(sub.assignment_id))
        .all(&txn)
        .await?
        .into_iter()
        .map(|tc| (tc.id, tc.is_public))
        .collect();

    let now = Utc::now();
    for result in &mut results {
        if result.is_public.is_none() {
            result.is_public = Some(
                result
                    .test_case_id
                    .and_then(|id| visibility.get(&id).copied())
                    .unwrap_or(true),
            );
        }
    }

    if !results.is_empty() {
        test_result::Entity::insert_many(results.iter().map(|r| test_result::ActiveModel {
            submission_id: Set(submission_id),
            test_case_id: Set(r.test_case_id),
            status: Set(r.status),
            actual: Set(r.actual.clone()),
            execution_time_ms: Set(r.execution_time),
            memory_kb: Set(r.memory),
            error_type: Set(r.error_type.clone()),
            error_message: Set(r.error_message.clone()),
            is_public: Set(r.is_public()),
            created_at: Set(now),
            ..Default::default()
        }))
        .exec_without_returning(&txn)
        .await?;
    }

    let mut active: submission::ActiveModel = sub.into();
    active.status = Set(SubmissionStatus::Completed);
    active.completed_at = Set(Some(now));
    active.updated_at = Set(now);
    let completed = active.update(&txn).await?;

    txn.commit().await?;

    let metrics = VerdictMetrics::from_results(&results);
    info!(
        submission_id,
        passed = metrics.passed,
        total = metrics.total,
        "Submission completed"
    );

    let score = match grading::grade_submission(&state.db, &state.events, submission_id, &metrics)
        .await
    {
        Ok(grade) => Some(grade.auto_score),
        Err(e) => {
            error!(submission_id, error = ?e, "Grading failed");
            None
        }
    };

    plagiarism::spawn_check(
        state.db.clone(),
        state.similarity.clone(),
        state.events.clone(),
        submission_id,
    );

    let classroom_id = assignment::Entity::find_by_id(completed.assignment_id)
        .one(&state.db)
        .await
        .ok()
        .flatten()
        .and_then(|a| a.classroom_id);

    state
        .events
        .publish(DomainEvent::new(SubmissionCompleted {
            submission_id,
            assignment_id: completed.assignment_id,
            student_id: completed.student_id,
            classroom_id,
            score,
            passed_tests: metrics.passed,
            total_tests: metrics.total,
            public_passed_tests: metrics.public_passed,
            public_total_tests: metrics.public_total,
            private_passed_tests: metrics.private_passed,
            private_total_tests: metrics.private_total,
            average_runtime_ms: metrics.average_runtime_ms,
            status: SubmissionStatus::Completed,
            test_results: results.clone(),
        }))
        .await;

    let current = crate::services::lookup::find_submission(&state.db, submission_id).await?;
    Ok(SubmissionProgress {
        state: JobState::Completed,
        submission: current,
        test_results: results,
        error: None,
    })
}

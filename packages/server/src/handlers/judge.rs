use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use common::judge_job::{JobMode, JobTestCase};
use common::{JobState, Verdict, VerdictMetrics};
use tracing::instrument;

use crate::error::{AppError, ErrorBody};
use crate::extractors::auth::{AuthUser, permissions};
use crate::extractors::json::AppJson;
use crate::models::judge::*;
use crate::services::{judge, lookup};
use crate::state::AppState;

fn run_status_url(job_id: &str) -> String {
    format!("/api/v1/judge/status/{job_id}")
}

fn submit_status_url(job_id: &str) -> String {
    format!("/api/v1/judge/submit-status/{job_id}")
}

#[utoipa::path(
    post,
    path = "/run",
    tag = "Judge",
    operation_id = "runCode",
    summary = "Run code against ad-hoc test cases",
    description = "Queues an unscored run. Nothing is persisted; poll the returned status URL for the verdict.",
    request_body = RunRequest,
    responses(
        (status = 202, description = "Run queued", body = RunAccepted),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 503, description = "Queue store unavailable (SERVICE_UNAVAILABLE)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, payload), fields(language = %payload.language))]
pub async fn run(
    State(state): State<AppState>,
    AppJson(payload): AppJson<RunRequest>,
) -> Result<impl IntoResponse, AppError> {
    let test_cases: Vec<JobTestCase> = payload.test_cases.into_iter().map(Into::into).collect();
    let job_id = judge::enqueue_run(&state, payload.code, payload.language, test_cases).await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(RunAccepted {
            status_url: run_status_url(&job_id),
            job_id,
        }),
    ))
}

#[utoipa::path(
    get,
    path = "/status/{job_id}",
    tag = "Judge",
    operation_id = "getRunStatus",
    summary = "Poll an ad-hoc run",
    description = "Returns `pending` until the worker has written a verdict. Unreadable verdicts are reported as `system_error` with `MALFORMED_VERDICT`.",
    params(
        ("job_id" = String, Path, description = "Job ID returned by the run endpoint")
    ),
    responses(
        (status = 200, description = "Current run state", body = RunStatusResponse),
        (status = 503, description = "Queue store unavailable (SERVICE_UNAVAILABLE)", body = ErrorBody),
    ),
)]
#[instrument(skip(state))]
pub async fn run_status(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Json<RunStatusResponse>, AppError> {
    judge::ensure_queue_ready(&state).await?;
    let verdict = state.queue.fetch_verdict(JobMode::Run, &job_id).await?;
    let status = verdict.state();

    let response = match verdict {
        Verdict::Pending | Verdict::Running => RunStatusResponse {
            job_id,
            status,
            test_results: vec![],
            metrics: None,
            error: None,
        },
        Verdict::CompileError(detail) | Verdict::SystemError(detail) => RunStatusResponse {
            job_id,
            status,
            test_results: vec![],
            metrics: None,
            error: Some(detail),
        },
        Verdict::Completed(results) => RunStatusResponse {
            job_id,
            status,
            metrics: Some(VerdictMetrics::from_results(&results).into()),
            test_results: results,
            error: None,
        },
    };

    Ok(Json(response))
}

#[utoipa::path(
    post,
    path = "/submit",
    tag = "Judge",
    operation_id = "submitCode",
    summary = "Submit code for grading",
    description = "Replaces the caller's earlier submission for the assignment, counts one attempt and queues the job against the assignment's test cases. Requires `submission:submit` permission.",
    request_body = SubmitRequest,
    responses(
        (status = 202, description = "Submission queued", body = SubmitAccepted),
        (status = 400, description = "Validation error (VALIDATION_ERROR, NO_TEST_CASES)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED, ATTEMPTS_EXHAUSTED)", body = ErrorBody),
        (status = 404, description = "Assignment not found (NOT_FOUND)", body = ErrorBody),
        (status = 503, description = "Queue store unavailable (SERVICE_UNAVAILABLE)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload), fields(user_id = auth_user.user_id, assignment_id = payload.assignment_id))]
pub async fn submit(
    auth_user: AuthUser,
    State(state): State<AppState>,
    AppJson(payload): AppJson<SubmitRequest>,
) -> Result<impl IntoResponse, AppError> {
    auth_user.require_permission(permissions::SUBMISSION_SUBMIT)?;

    let outcome = judge::submit(
        &state,
        auth_user.user_id,
        payload.assignment_id,
        payload.code,
        payload.language,
    )
    .await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(SubmitAccepted {
            submission_id: outcome.submission.id,
            status_url: submit_status_url(&outcome.job_id),
            job_id: outcome.job_id,
            remaining_attempts: outcome.remaining_attempts,
        }),
    ))
}

#[utoipa::path(
    get,
    path = "/submit-status/{job_id}",
    tag = "Judge",
    operation_id = "getSubmitStatus",
    summary = "Poll a graded submission",
    description = "Advances the submission's state from the worker's verdict. The first `completed` observation persists results, grades the submission and starts the plagiarism check. Students may poll their own submissions; others need `grade:manage`.",
    params(
        ("job_id" = String, Path, description = "Job ID returned by the submit endpoint")
    ),
    responses(
        (status = 200, description = "Current submission state", body = SubmitStatusResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Submission not found (NOT_FOUND)", body = ErrorBody),
        (status = 503, description = "Queue store unavailable (SERVICE_UNAVAILABLE)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(user_id = auth_user.user_id))]
pub async fn submit_status(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Json<SubmitStatusResponse>, AppError> {
    let submission_id: i32 = job_id
        .parse()
        .map_err(|_| AppError::NotFound("Submission not found".into()))?;
    let sub = lookup::find_submission(&state.db, submission_id).await?;
    auth_user.require_owner_or(sub.student_id, permissions::GRADE_MANAGE)?;

    let progress = judge::poll_submission(&state, sub).await?;
    let metrics = (progress.state == JobState::Completed).then(|| progress.metrics());

    Ok(Json(SubmitStatusResponse {
        job_id,
        submission_id: progress.submission.id,
        status: progress.state,
        metrics,
        test_results: progress.test_results,
        error: progress.error,
        grading_status: progress.submission.grading_status,
        auto_score: progress.submission.auto_score,
        final_score: progress.submission.final_score,
    }))
}

#[utoipa::path(
    get,
    path = "/{id}/attempts",
    tag = "Judge",
    operation_id = "getAttempts",
    summary = "Get the caller's attempt budget",
    description = "Counts every attempt the caller made on the assignment, including overwritten submissions.",
    params(
        ("id" = i32, Path, description = "Assignment ID")
    ),
    responses(
        (status = 200, description = "Attempt budget", body = AttemptsResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 404, description = "Assignment not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(user_id = auth_user.user_id))]
pub async fn attempts(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<AttemptsResponse>, AppError> {
    let assignment = lookup::find_assignment(&state.db, id).await?;
    let used = judge::attempts_used(&state.db, id, auth_user.user_id).await?;

    Ok(Json(AttemptsResponse {
        assignment_id: id,
        used,
        max: assignment.max_submissions,
        remaining: judge::remaining_attempts(assignment.max_submissions, used),
    }))
}

use axum::Json;
use axum::extract::{Path, State};
use sea_orm::*;
use tracing::instrument;

use crate::entity::plagiarism_report;
use crate::error::{AppError, ErrorBody};
use crate::extractors::auth::{AuthUser, permissions};
use crate::extractors::json::AppJson;
use crate::models::submission::*;
use crate::services::{grading, judge, lookup};
use crate::state::AppState;

#[utoipa::path(
    get,
    path = "/{id}",
    tag = "Submissions",
    operation_id = "getSubmission",
    summary = "Get submission details",
    description = "Returns the submission with its stored test results and scores. Students can view their own submission; others need `grade:manage`.",
    params(
        ("id" = i32, Path, description = "Submission ID")
    ),
    responses(
        (status = 200, description = "Submission details", body = SubmissionResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Submission not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(user_id = auth_user.user_id))]
pub async fn get_submission(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<SubmissionResponse>, AppError> {
    let sub = lookup::find_submission(&state.db, id).await?;
    auth_user.require_owner_or(sub.student_id, permissions::GRADE_MANAGE)?;

    let progress = judge::stored_progress(&state.db, sub).await?;
    Ok(Json(SubmissionResponse::new(
        progress.submission,
        progress.test_results,
        progress.error,
    )))
}

#[utoipa::path(
    post,
    path = "/{id}/grade",
    tag = "Submissions",
    operation_id = "gradeSubmission",
    summary = "Record an instructor grade",
    description = "Manual assignments take the score as final. Hybrid assignments average it with the automatic score. Automatic assignments reject manual grades. Requires `grade:manage` permission.",
    params(
        ("id" = i32, Path, description = "Submission ID")
    ),
    request_body = GradeRequest,
    responses(
        (status = 200, description = "Grade recorded", body = GradeResponse),
        (status = 400, description = "Invalid score (VALIDATION_ERROR, INVALID_SCORE)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Submission not found (NOT_FOUND)", body = ErrorBody),
        (status = 409, description = "Hybrid grade without an automatic score (MISSING_AUTO_SCORE)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload), fields(user_id = auth_user.user_id))]
pub async fn grade_submission(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
    AppJson(payload): AppJson<GradeRequest>,
) -> Result<Json<GradeResponse>, AppError> {
    auth_user.require_permission(permissions::GRADE_MANAGE)?;

    let feedback = payload
        .feedback
        .map(|f| f.trim().to_string())
        .filter(|f| !f.is_empty());
    let updated =
        grading::update_manual_grade(&state.db, &state.events, id, payload.manual_score, feedback)
            .await?;

    Ok(Json(updated.into()))
}

#[utoipa::path(
    get,
    path = "/{id}/plagiarism",
    tag = "Submissions",
    operation_id = "listPlagiarismReports",
    summary = "List similarity findings for a submission",
    description = "Returns every report where the submission is on either side, most similar first. Requires `plagiarism:view` permission.",
    params(
        ("id" = i32, Path, description = "Submission ID")
    ),
    responses(
        (status = 200, description = "Similarity reports", body = PlagiarismReportList),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Submission not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(user_id = auth_user.user_id))]
pub async fn list_plagiarism(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<PlagiarismReportList>, AppError> {
    auth_user.require_permission(permissions::PLAGIARISM_VIEW)?;
    lookup::find_submission(&state.db, id).await?;

    let reports = plagiarism_report::Entity::find()
        .filter(
            Condition::any()
                .add(plagiarism_report::Column::SubmissionId.eq(id))
                .add(plagiarism_report::Column::ComparedSubmissionId.eq(id)),
        )
        .order_by_desc(plagiarism_report::Column::Similarity)
        .order_by_asc(plagiarism_report::Column::Id)
        .all(&state.db)
        .await?;

    Ok(Json(PlagiarismReportList {
        data: reports.into_iter().map(Into::into).collect(),
    }))
}

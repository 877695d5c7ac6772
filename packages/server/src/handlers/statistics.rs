use axum::Json;
use axum::extract::{Path, State};
use tracing::instrument;

use crate::error::{AppError, ErrorBody};
use crate::extractors::auth::{AuthUser, permissions};
use crate::models::statistics::*;
use crate::services::{lookup, statistics};
use crate::state::AppState;

#[utoipa::path(
    get,
    path = "/{id}/statistics",
    tag = "Statistics",
    operation_id = "getAssignmentStatistics",
    summary = "Get today's assignment statistics",
    description = "Returns today's snapshot, computing it on first read. Requires `statistics:view` permission.",
    params(
        ("id" = i32, Path, description = "Assignment ID")
    ),
    responses(
        (status = 200, description = "Assignment statistics", body = AssignmentStatisticsResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Assignment not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(user_id = auth_user.user_id))]
pub async fn assignment_statistics(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<AssignmentStatisticsResponse>, AppError> {
    auth_user.require_permission(permissions::STATISTICS_VIEW)?;
    lookup::find_assignment(&state.db, id).await?;

    let snapshot = statistics::assignment::snapshot(&state.db, id).await?;
    Ok(Json(snapshot.into()))
}

#[utoipa::path(
    get,
    path = "/{id}/statistics",
    tag = "Statistics",
    operation_id = "getClassroomStatistics",
    summary = "Get today's classroom statistics",
    description = "Returns today's snapshot, computing it on first read. Requires `statistics:view` permission.",
    params(
        ("id" = i32, Path, description = "Classroom ID")
    ),
    responses(
        (status = 200, description = "Classroom statistics", body = ClassroomStatisticsResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Classroom not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(user_id = auth_user.user_id))]
pub async fn classroom_statistics(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<ClassroomStatisticsResponse>, AppError> {
    auth_user.require_permission(permissions::STATISTICS_VIEW)?;
    lookup::find_classroom(&state.db, id).await?;

    let snapshot = statistics::classroom::snapshot(&state.db, id).await?;
    Ok(Json(snapshot.into()))
}

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use chrono::Utc;
use common::DomainEvent;
use common::event::StudentEnrolled;
use sea_orm::sea_query::OnConflict;
use sea_orm::*;
use tracing::{info, instrument};

use crate::entity::enrollment;
use crate::error::{AppError, ErrorBody};
use crate::extractors::auth::{AuthUser, permissions};
use crate::extractors::json::AppJson;
use crate::models::enrollment::*;
use crate::services::lookup;
use crate::state::AppState;

#[utoipa::path(
    post,
    path = "/{id}/enrollments",
    tag = "Enrollments",
    operation_id = "enrollStudent",
    summary = "Enroll a student in a classroom",
    description = "Idempotent: enrolling a student twice returns the existing enrollment. Requires `enrollment:manage` permission.",
    params(
        ("id" = i32, Path, description = "Classroom ID")
    ),
    request_body = EnrollRequest,
    responses(
        (status = 201, description = "Student enrolled", body = EnrollmentResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Classroom not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload), fields(student_id = payload.student_id))]
pub async fn enroll_student(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(classroom_id): Path<i32>,
    AppJson(payload): AppJson<EnrollRequest>,
) -> Result<impl IntoResponse, AppError> {
    auth_user.require_permission(permissions::ENROLLMENT_MANAGE)?;
    if payload.student_id <= 0 {
        return Err(AppError::Validation("student_id must be positive".into()));
    }
    lookup::find_classroom(&state.db, classroom_id).await?;

    enrollment::Entity::insert(enrollment::ActiveModel {
        classroom_id: Set(classroom_id),
        student_id: Set(payload.student_id),
        enrolled_at: Set(Utc::now()),
        ..Default::default()
    })
    .on_conflict(
        OnConflict::columns([
            enrollment::Column::ClassroomId,
            enrollment::Column::StudentId,
        ])
        .do_nothing()
        .to_owned(),
    )
    .exec_without_returning(&state.db)
    .await?;

    let row = enrollment::Entity::find()
        .filter(enrollment::Column::ClassroomId.eq(classroom_id))
        .filter(enrollment::Column::StudentId.eq(payload.student_id))
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::Internal("Enrollment missing after insert".into()))?;

    info!(
        enrollment_id = row.id,
        classroom_id,
        student_id = row.student_id,
        "Student enrolled"
    );

    state
        .events
        .publish(DomainEvent::new(StudentEnrolled {
            enrollment_id: row.id,
            classroom_id,
            student_id: row.student_id,
        }))
        .await;

    Ok((StatusCode::CREATED, Json(EnrollmentResponse::from(row))))
}

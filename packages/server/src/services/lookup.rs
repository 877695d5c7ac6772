use sea_orm::*;

use crate::entity::{assignment, classroom, submission};
use crate::error::AppError;

/// Find an assignment by ID or return 404.
pub async fn find_assignment<C: ConnectionTrait>(
    db: &C,
    id: i32,
) -> Result<assignment::Model, AppError> {
    assignment::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("Assignment not found".into()))
}

/// Find a submission by ID or return 404.
pub async fn find_submission<C: ConnectionTrait>(
    db: &C,
    id: i32,
) -> Result<submission::Model, AppError> {
    submission::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("Submission not found".into()))
}

/// Find a classroom by ID or return 404.
pub async fn find_classroom<C: ConnectionTrait>(
    db: &C,
    id: i32,
) -> Result<classroom::Model, AppError> {
    classroom::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("Classroom not found".into()))
}

use sea_orm::sea_query::{Index, IndexCreateStatement, PostgresQueryBuilder};
use sea_orm::{ConnectionTrait, DatabaseConnection, DbErr};
use tracing::{info, warn};

use crate::entity::{submission, submission_attempt};

/// Ensure required database indexes exist.
///
/// SeaORM's schema-sync doesn't support composite non-unique indexes,
/// so we create them manually on startup.
pub async fn ensure_indexes(db: &DatabaseConnection) -> Result<(), DbErr> {
    // Attempt cap check:
    // SELECT COUNT(*) FROM submission_attempt WHERE assignment_id = ? AND student_id = ?
    create_index(
        db,
        "idx_attempt_assignment_student",
        Index::create()
            .if_not_exists()
            .name("idx_attempt_assignment_student")
            .table(submission_attempt::Entity)
            .col(submission_attempt::Column::AssignmentId)
            .col(submission_attempt::Column::StudentId)
            .to_owned(),
    )
    .await;

    // Runtime history and statistics:
    // SELECT ... FROM submission WHERE assignment_id = ? AND status = 'completed'
    create_index(
        db,
        "idx_submission_assignment_status",
        Index::create()
            .if_not_exists()
            .name("idx_submission_assignment_status")
            .table(submission::Entity)
            .col(submission::Column::AssignmentId)
            .col(submission::Column::Status)
            .to_owned(),
    )
    .await;

    Ok(())
}

async fn create_index(db: &DatabaseConnection, name: &str, stmt: IndexCreateStatement) {
    let sql = stmt.to_string(PostgresQueryBuilder);
    match db.execute_unprepared(&sql).await {
        Ok(_) => info!("Ensured index {} exists", name),
        Err(e) => warn!("Failed to create index {}: {}", name, e),
    }
}

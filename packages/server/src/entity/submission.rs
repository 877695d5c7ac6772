use common::{FailureKind, GradingStatus, SubmissionStatus};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// The live submission of one student for one assignment.
/// Resubmitting replaces the row.
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "submission")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    #[sea_orm(unique_key = "student_assignment")]
    pub student_id: i32,
    #[sea_orm(unique_key = "student_assignment")]
    pub assignment_id: i32,
    #[sea_orm(belongs_to, from = "assignment_id", to = "id")]
    pub assignment: HasOne<super::assignment::Entity>,

    pub language: String,
    #[sea_orm(column_type = "Text")]
    pub code: String,

    pub status: SubmissionStatus,
    pub failure_kind: Option<FailureKind>,
    pub error_type: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub error_message: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub full_error: Option<String>,

    pub grading_status: GradingStatus,
    /// Engine score in points.
    pub auto_score: Option<f64>,
    pub manual_score: Option<f64>,
    pub final_score: Option<f64>,
    #[sea_orm(column_type = "Text", nullable)]
    pub feedback: Option<String>,

    #[sea_orm(has_many)]
    pub test_results: HasMany<super::test_result::Entity>,

    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
    pub completed_at: Option<DateTimeUtc>,
}

impl Model {
    /// Score used for statistics: the final grade if set, else the engine's.
    pub fn effective_score(&self) -> Option<f64> {
        self.final_score.or(self.auto_score)
    }
}

impl ActiveModelBehavior for ActiveModel {}

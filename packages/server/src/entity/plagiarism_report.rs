use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Similarity of `submission_id` against `compared_submission_id`.
/// Unique per ordered pair; re-checks overwrite the similarity.
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "plagiarism_report")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    #[sea_orm(unique_key = "report_pair")]
    pub submission_id: i32,
    #[sea_orm(unique_key = "report_pair")]
    pub compared_submission_id: i32,
    #[sea_orm(indexed)]
    pub assignment_id: i32,

    /// 0.0 to 1.0.
    pub similarity: f64,
    pub checked_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}

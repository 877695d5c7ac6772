use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "classroom_statistics")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    #[sea_orm(unique_key = "classroom_snapshot")]
    pub classroom_id: i32,
    #[sea_orm(unique_key = "classroom_snapshot")]
    pub snapshot_date: Date,
    pub snapshot_time: DateTimeUtc,

    pub total_students: i32,
    /// Students with an attempt in the last 30 days.
    pub active_students: i32,
    pub active_student_rate: f64,
    pub total_submissions: i32,
    pub submissions_per_student: f64,

    pub avg_score: Option<f64>,
    pub median_score: Option<f64>,

    pub plagiarism_rate: f64,
    pub avg_similarity: Option<f64>,
    pub max_similarity: Option<f64>,
    pub runtime_error_rate: f64,

    pub assignment_completion_rate: f64,
    pub dropoff_rate: f64,
}

impl ActiveModelBehavior for ActiveModel {}

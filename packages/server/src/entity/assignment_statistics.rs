use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Daily snapshot of an assignment's health. One row per (assignment, day).
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "assignment_statistics")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    #[sea_orm(unique_key = "assignment_snapshot")]
    pub assignment_id: i32,
    #[sea_orm(unique_key = "assignment_snapshot")]
    pub snapshot_date: Date,
    pub snapshot_time: DateTimeUtc,

    /// Attempts ever made, including overwritten ones.
    pub total_submissions: i32,
    pub distinct_submitters: i32,

    /// Percent of max points.
    pub average_score: Option<f64>,
    pub median_score: Option<f64>,

    pub average_runtime_ms: Option<f64>,
    pub min_runtime_ms: Option<f64>,
    pub p25_runtime_ms: Option<f64>,
    pub median_runtime_ms: Option<f64>,
    pub p75_runtime_ms: Option<f64>,
    pub max_runtime_ms: Option<f64>,

    pub avg_attempts: f64,
    pub median_attempts: f64,
    pub max_attempts: i32,

    pub public_test_pass_rate: Option<f64>,
    pub private_test_pass_rate: Option<f64>,
    pub runtime_error_rate: f64,

    pub plagiarism_rate: f64,
    pub avg_similarity: Option<f64>,
    pub max_similarity: Option<f64>,
}

impl ActiveModelBehavior for ActiveModel {}

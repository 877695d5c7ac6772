use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "assignment_test_case_stats")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    #[sea_orm(unique_key = "assignment_case")]
    pub assignment_id: i32,
    #[sea_orm(unique_key = "assignment_case")]
    pub snapshot_date: Date,
    #[sea_orm(unique_key = "assignment_case")]
    pub test_case_id: i32,
    pub is_public: bool,
    pub runs: i32,
    /// Percent of runs that did not pass.
    pub failure_rate: f64,
    pub avg_runtime_ms: Option<f64>,
}

impl ActiveModelBehavior for ActiveModel {}

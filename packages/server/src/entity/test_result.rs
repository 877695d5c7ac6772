use common::TestOutcome;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "test_result")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    #[sea_orm(indexed)]
    pub submission_id: i32,
    #[sea_orm(belongs_to, from = "submission_id", to = "id")]
    pub submission: HasOne<super::submission::Entity>,

    /// NULL when the worker did not say which case this was.
    pub test_case_id: Option<i32>,
    pub status: TestOutcome,
    #[sea_orm(column_type = "Text", nullable)]
    pub actual: Option<String>,
    pub execution_time_ms: Option<f64>,
    pub memory_kb: Option<f64>,
    pub error_type: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub error_message: Option<String>,
    pub is_public: bool,

    pub created_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}

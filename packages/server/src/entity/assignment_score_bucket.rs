use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "assignment_score_bucket")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    #[sea_orm(unique_key = "assignment_bucket")]
    pub assignment_id: i32,
    #[sea_orm(unique_key = "assignment_bucket")]
    pub snapshot_date: Date,
    #[sea_orm(unique_key = "assignment_bucket")]
    pub bucket_start: i32,
    pub bucket_end: i32,
    pub count: i32,
}

impl ActiveModelBehavior for ActiveModel {}

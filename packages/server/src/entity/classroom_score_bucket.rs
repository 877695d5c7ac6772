use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "classroom_score_bucket")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    #[sea_orm(unique_key = "classroom_bucket")]
    pub classroom_id: i32,
    #[sea_orm(unique_key = "classroom_bucket")]
    pub snapshot_date: Date,
    /// Lower bound of a 10-point band; 100 is its own band.
    #[sea_orm(unique_key = "classroom_bucket")]
    pub bucket_start: i32,
    pub count: i32,
}

impl ActiveModelBehavior for ActiveModel {}

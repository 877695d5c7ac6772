use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "classroom_language_usage")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    #[sea_orm(unique_key = "classroom_language")]
    pub classroom_id: i32,
    #[sea_orm(unique_key = "classroom_language")]
    pub snapshot_date: Date,
    #[sea_orm(unique_key = "classroom_language")]
    pub language: String,
    pub count: i32,
}

impl ActiveModelBehavior for ActiveModel {}

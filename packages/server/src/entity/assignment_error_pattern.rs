use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "assignment_error_pattern")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    #[sea_orm(indexed)]
    pub assignment_id: i32,
    pub snapshot_date: Date,
    pub error_type: String,
    #[sea_orm(column_type = "Text")]
    pub error_message: String,
    pub occurrences: i32,
}

impl ActiveModelBehavior for ActiveModel {}

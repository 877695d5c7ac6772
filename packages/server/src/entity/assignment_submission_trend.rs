use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "assignment_submission_trend")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    #[sea_orm(unique_key = "assignment_day")]
    pub assignment_id: i32,
    #[sea_orm(unique_key = "assignment_day")]
    pub trend_date: Date,
    pub submission_count: i32,
}

impl ActiveModelBehavior for ActiveModel {}

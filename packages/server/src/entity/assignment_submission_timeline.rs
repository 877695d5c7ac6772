use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Weekly submission heat map. Counters only ever grow.
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "assignment_submission_timeline")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    #[sea_orm(unique_key = "assignment_slot")]
    pub assignment_id: i32,
    /// 0 = Sunday.
    #[sea_orm(unique_key = "assignment_slot")]
    pub day_of_week: i32,
    #[sea_orm(unique_key = "assignment_slot")]
    pub hour_of_day: i32,
    pub submission_count: i32,
}

impl ActiveModelBehavior for ActiveModel {}

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "enrollment")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    #[sea_orm(unique_key = "classroom_student")]
    pub classroom_id: i32,
    #[sea_orm(unique_key = "classroom_student")]
    pub student_id: i32,
    #[sea_orm(belongs_to, from = "classroom_id", to = "id")]
    pub classroom: HasOne<super::classroom::Entity>,

    pub enrolled_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}

use common::GradingMethod;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "assignment")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub title: String,

    /// Maximum score. NULL or 0 means 100.
    pub points: Option<i32>,
    pub grading_method: GradingMethod,
    /// Attempt cap per student. NULL means unlimited.
    pub max_submissions: Option<i32>,
    #[sea_orm(default_value = false)]
    pub plagiarism_detection: bool,

    #[sea_orm(indexed)]
    pub classroom_id: Option<i32>,
    #[sea_orm(belongs_to, from = "classroom_id", to = "id")]
    pub classroom: HasOne<super::classroom::Entity>,

    #[sea_orm(has_many)]
    pub test_cases: HasMany<super::test_case::Entity>,
    #[sea_orm(has_many)]
    pub submissions: HasMany<super::submission::Entity>,
    #[sea_orm(has_many)]
    pub attempts: HasMany<super::submission_attempt::Entity>,

    pub created_at: DateTimeUtc,
}

impl Model {
    pub fn max_points(&self) -> f64 {
        match self.points {
            Some(p) if p > 0 => p as f64,
            _ => 100.0,
        }
    }
}

impl ActiveModelBehavior for ActiveModel {}

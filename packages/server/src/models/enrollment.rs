use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entity::enrollment;

#[derive(Deserialize, utoipa::ToSchema)]
pub struct EnrollRequest {
    #[schema(example = 7)]
    pub student_id: i32,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct EnrollmentResponse {
    #[schema(example = 1)]
    pub id: i32,
    #[schema(example = 3)]
    pub classroom_id: i32,
    #[schema(example = 7)]
    pub student_id: i32,
    pub enrolled_at: DateTime<Utc>,
}

impl From<enrollment::Model> for EnrollmentResponse {
    fn from(e: enrollment::Model) -> Self {
        Self {
            id: e.id,
            classroom_id: e.classroom_id,
            student_id: e.student_id,
            enrolled_at: e.enrolled_at,
        }
    }
}

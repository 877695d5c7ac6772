#[cfg(feature = "sea-orm")]
use sea_orm::prelude::StringLen;

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle of a graded submission.
///
/// The row itself is the job's state machine: the poll handler only ever
/// moves it forward along `Queued -> Running -> Completed | Error`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema)]
#[cfg_attr(
    feature = "sea-orm",
    derive(sea_orm::DeriveActiveEnum, sea_orm::EnumIter),
    sea_orm(rs_type = "String", db_type = "String(StringLen::None)")
)]
#[serde(rename_all = "lowercase")]
pub enum SubmissionStatus {
    /// Job written to the queue, no verdict yet.
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "queued"))]
    Queued,
    /// The worker reported that it picked the job up.
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "running"))]
    Running,
    /// Test results persisted.
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "completed"))]
    Completed,
    /// Compilation or system failure.
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "error"))]
    Error,
}

impl SubmissionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Error)
    }

    /// Whether the poll handler may move a submission from `self` to `next`.
    pub fn can_transition_to(&self, next: SubmissionStatus) -> bool {
        use SubmissionStatus::*;
        matches!(
            (self, next),
            (Queued, Running) | (Queued, Completed) | (Queued, Error)
                | (Running, Completed)
                | (Running, Error)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for SubmissionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a submission ended in [`SubmissionStatus::Error`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema)]
#[cfg_attr(
    feature = "sea-orm",
    derive(sea_orm::DeriveActiveEnum, sea_orm::EnumIter),
    sea_orm(rs_type = "String", db_type = "String(StringLen::None)")
)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "compile_error"))]
    CompileError,
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "system_error"))]
    SystemError,
}

/// Where a submission stands with respect to its grade.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema)]
#[cfg_attr(
    feature = "sea-orm",
    derive(sea_orm::DeriveActiveEnum, sea_orm::EnumIter),
    sea_orm(rs_type = "String", db_type = "String(StringLen::None)")
)]
pub enum GradingStatus {
    #[serde(rename = "pending")]
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "pending"))]
    Pending,
    /// Automatic score recorded, waiting for an instructor.
    #[serde(rename = "system graded")]
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "system graded"))]
    SystemGraded,
    #[serde(rename = "graded")]
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "graded"))]
    Graded,
}

/// Per-assignment policy deciding whether the automatic score is final,
/// advisory or ignored.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema)]
#[cfg_attr(
    feature = "sea-orm",
    derive(sea_orm::DeriveActiveEnum, sea_orm::EnumIter),
    sea_orm(rs_type = "String", db_type = "String(StringLen::None)")
)]
pub enum GradingMethod {
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "Automatic"))]
    Automatic,
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "Hybrid"))]
    Hybrid,
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "Manual"))]
    Manual,
}

impl GradingMethod {
    /// Grading status a submission lands in once its automatic score is recorded.
    pub fn status_after_auto_grade(&self) -> GradingStatus {
        match self {
            Self::Automatic => GradingStatus::Graded,
            Self::Hybrid => GradingStatus::SystemGraded,
            Self::Manual => GradingStatus::Pending,
        }
    }
}

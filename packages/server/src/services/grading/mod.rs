pub mod engine;

use std::collections::HashMap;

use chrono::Utc;
use common::event::GradeUpdated;
use common::{DomainEvent, EventBus, GradingMethod, GradingStatus, SubmissionStatus, VerdictMetrics};
use sea_orm::sea_query::LockType;
use sea_orm::*;
use tracing::{info, instrument, warn};

use crate::entity::{submission, test_result};
use crate::error::AppError;
use crate::services::lookup::{find_assignment, find_submission};
use crate::utils::percentile::sorted;

pub use engine::{GradeBreakdown, WEIGHTS, round2};

/// Result of grading one submission automatically.
#[derive(Clone, Debug, PartialEq)]
pub struct AutoGrade {
    pub auto_score: f64,
    pub grading_status: GradingStatus,
    /// Set only when the method grades without an instructor.
    pub final_score: Option<f64>,
    pub breakdown: GradeBreakdown,
}

/// Per-submission mean of positive test runtimes over the other completed
/// submissions to the assignment, ascending.
pub async fn runtime_history<C: ConnectionTrait>(
    db: &C,
    assignment_id: i32,
    exclude_submission_id: i32,
) -> Result<Vec<f64>, DbErr> {
    let ids: Vec<i32> = submission::Entity::find()
        .select_only()
        .column(submission::Column::Id)
        .filter(submission::Column::AssignmentId.eq(assignment_id))
        .filter(submission::Column::Status.eq(SubmissionStatus::Completed))
        .filter(submission::Column::Id.ne(exclude_submission_id))
        .into_tuple()
        .all(db)
        .await?;

    if ids.is_empty() {
        return Ok(vec![]);
    }

    let timings: Vec<(i32, Option<f64>)> = test_result::Entity::find()
        .select_only()
        .column(test_result::Column::SubmissionId)
        .column(test_result::Column::ExecutionTimeMs)
        .filter(test_result::Column::SubmissionId.is_in(ids))
        .filter(test_result::Column::ExecutionTimeMs.gt(0.0))
        .into_tuple()
        .all(db)
        .await?;

    let mut per_submission: HashMap<i32, (f64, u32)> = HashMap::new();
    for (submission_id, time) in timings {
        if let Some(t) = time {
            let entry = per_submission.entry(submission_id).or_default();
            entry.0 += t;
            entry.1 += 1;
        }
    }

    Ok(sorted(
        per_submission
            .into_values()
            .map(|(sum, n)| sum / n as f64)
            .filter(|avg| *avg > 0.0),
    ))
}

/// Grade a completed submission and persist the automatic score.
///
/// Automatic assignments are finalized immediately and emit `GRADE_UPDATED`.
#[instrument(skip(db, events, metrics))]
pub async fn grade_submission(
    db: &DatabaseConnection,
    events: &EventBus,
    submission_id: i32,
    metrics: &VerdictMetrics,
) -> Result<AutoGrade, AppError> {
    let sub = find_submission(db, submission_id).await?;
    let assignment = find_assignment(db, sub.assignment_id).await?;

    let history = match runtime_history(db, assignment.id, submission_id).await {
        Ok(h) => h,
        Err(e) => {
            warn!(assignment_id = assignment.id, error = %e, "Failed to load runtime history");
            vec![]
        }
    };

    let breakdown = engine::grade(metrics, &history, assignment.max_points());
    let grading_status = assignment.grading_method.status_after_auto_grade();
    let final_score = (assignment.grading_method == GradingMethod::Automatic)
        .then_some(breakdown.final_score);

    let mut update = submission::ActiveModel {
        id: Set(submission_id),
        auto_score: Set(Some(breakdown.final_score)),
        grading_status: Set(grading_status),
        updated_at: Set(Utc::now()),
        ..Default::default()
    };
    if final_score.is_some() {
        update.final_score = Set(final_score);
    }
    update.update(db).await?;

    info!(
        submission_id,
        assignment_id = assignment.id,
        auto_score = breakdown.final_score,
        percentage = breakdown.percentage_score,
        performance = breakdown.performance_score,
        history = history.len(),
        grading_status = ?grading_status,
        "Submission graded"
    );

    if let Some(score) = final_score {
        events
            .publish(DomainEvent::new(GradeUpdated {
                submission_id,
                assignment_id: assignment.id,
                classroom_id: assignment.classroom_id,
                final_score: score,
            }))
            .await;
    }

    Ok(AutoGrade {
        auto_score: breakdown.final_score,
        grading_status,
        final_score,
        breakdown,
    })
}

/// Final score for an instructor grade, after validation.
pub fn manual_final_score(
    method: GradingMethod,
    max_points: f64,
    auto_score: Option<f64>,
    manual_score: f64,
) -> Result<f64, AppError> {
    if !manual_score.is_finite() || manual_score < 0.0 || manual_score > max_points {
        return Err(AppError::InvalidScore(format!(
            "Manual score must be between 0 and {max_points}"
        )));
    }

    match method {
        GradingMethod::Automatic => Err(AppError::InvalidScore(
            "Manual grading not allowed for Automatic assignments".into(),
        )),
        GradingMethod::Hybrid => {
            let auto = auto_score.ok_or(AppError::MissingAutoScore)?;
            Ok(round2((auto + manual_score) / 2.0))
        }
        GradingMethod::Manual => Ok(round2(manual_score)),
    }
}

/// Record an instructor's grade and emit `GRADE_UPDATED`.
#[instrument(skip(db, events, feedback))]
pub async fn update_manual_grade(
    db: &DatabaseConnection,
    events: &EventBus,
    submission_id: i32,
    manual_score: f64,
    feedback: Option<String>,
) -> Result<submission::Model, AppError> {
    let txn = db.begin().await?;

    let sub = submission::Entity::find_by_id(submission_id)
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .ok_or_else(|| AppError::NotFound("Submission not found".into()))?;
    let assignment = find_assignment(&txn, sub.assignment_id).await?;

    let final_score = manual_final_score(
        assignment.grading_method,
        assignment.max_points(),
        sub.auto_score,
        manual_score,
    )?;

    let mut active: submission::ActiveModel = sub.into();
    active.manual_score = Set(Some(manual_score));
    active.final_score = Set(Some(final_score));
    active.feedback = Set(feedback);
    active.grading_status = Set(GradingStatus::Graded);
    active.updated_at = Set(Utc::now());
    let updated = active.update(&txn).await?;

    txn.commit().await?;

    info!(
        submission_id,
        assignment_id = assignment.id,
        final_score,
        "Manual grade recorded"
    );

    events
        .publish(DomainEvent::new(GradeUpdated {
            submission_id,
            assignment_id: assignment.id,
            classroom_id: assignment.classroom_id,
            final_score,
        }))
        .await;

    Ok(updated)
}

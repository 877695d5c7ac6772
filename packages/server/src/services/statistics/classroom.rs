use std::collections::{HashMap, HashSet};

use chrono::{Duration, Utc};
use common::SubmissionStatus;
use sea_orm::sea_query::OnConflict;
use sea_orm::*;
use tracing::{info, instrument};

use super::assignment::load_reports;
use super::calculator;
use super::today;
use crate::entity::{
    assignment, classroom, classroom_language_usage, classroom_score_bucket, classroom_statistics,
    enrollment, submission, submission_attempt,
};

/// A student counts as active with an attempt inside this window.
pub const ACTIVE_WINDOW_DAYS: i64 = 30;
/// Percent of max points at which an assignment counts as completed.
pub const COMPLETION_THRESHOLD: f64 = 70.0;

/// Rebuild today's classroom snapshot.
#[instrument(skip(db))]
pub async fn recompute(
    db: &DatabaseConnection,
    classroom_id: i32,
) -> Result<classroom_statistics::Model, DbErr> {
    classroom::Entity::find_by_id(classroom_id)
        .one(db)
        .await?
        .ok_or_else(|| DbErr::RecordNotFound(format!("classroom {classroom_id}")))?;

    let students: HashSet<i32> = enrollment::Entity::find()
        .filter(enrollment::Column::ClassroomId.eq(classroom_id))
        .all(db)
        .await?
        .into_iter()
        .map(|e| e.student_id)
        .collect();

    let assignments: HashMap<i32, f64> = assignment::Entity::find()
        .filter(assignment::Column::ClassroomId.eq(classroom_id))
        .all(db)
        .await?
        .into_iter()
        .map(|a| (a.id, a.max_points()))
        .collect();
    let assignment_ids: Vec<i32> = assignments.keys().copied().collect();

    let (attempts, submissions) = if assignment_ids.is_empty() {
        (vec![], vec![])
    } else {
        (
            submission_attempt::Entity::find()
                .filter(submission_attempt::Column::AssignmentId.is_in(assignment_ids.clone()))
                .all(db)
                .await?,
            submission::Entity::find()
                .filter(submission::Column::AssignmentId.is_in(assignment_ids.clone()))
                .all(db)
                .await?,
        )
    };
    let reports = load_reports(db, assignment_ids).await?;

    let since = Utc::now() - Duration::days(ACTIVE_WINDOW_DAYS);
    let active: HashSet<i32> = attempts
        .iter()
        .filter(|a| a.created_at >= since && students.contains(&a.student_id))
        .map(|a| a.student_id)
        .collect();

    let mut percentages = Vec::new();
    let mut completed_pairs = 0usize;
    for s in submissions
        .iter()
        .filter(|s| s.status == SubmissionStatus::Completed)
    {
        let (Some(score), Some(&max_points)) = (s.effective_score(), assignments.get(&s.assignment_id))
        else {
            continue;
        };
        let pct = calculator::to_percent(score, max_points);
        percentages.push(pct);
        if pct >= COMPLETION_THRESHOLD && students.contains(&s.student_id) {
            completed_pairs += 1;
        }
    }

    let total_students = students.len();
    let live = submissions.len();
    let errored = submissions
        .iter()
        .filter(|s| s.status == SubmissionStatus::Error)
        .count();
    let scores = calculator::score_summary(&percentages);
    let plagiarism = calculator::plagiarism_summary(&reports, live);
    let buckets = calculator::classroom_score_buckets(&percentages);
    let languages = calculator::language_usage(submissions.iter().map(|s| s.language.as_str()));

    let date = today();
    let txn = db.begin().await?;

    classroom_statistics::Entity::insert(classroom_statistics::ActiveModel {
        classroom_id: Set(classroom_id),
        snapshot_date: Set(date),
        snapshot_time: Set(Utc::now()),
        total_students: Set(total_students as i32),
        active_students: Set(active.len() as i32),
        active_student_rate: Set(calculator::rate(active.len(), total_students)),
        total_submissions: Set(attempts.len() as i32),
        submissions_per_student: Set(if total_students == 0 {
            0.0
        } else {
            attempts.len() as f64 / total_students as f64
        }),
        avg_score: Set(scores.average),
        median_score: Set(scores.median),
        plagiarism_rate: Set(plagiarism.rate),
        avg_similarity: Set(plagiarism.avg_similarity),
        max_similarity: Set(plagiarism.max_similarity),
        runtime_error_rate: Set(calculator::rate(errored, live)),
        assignment_completion_rate: Set(calculator::rate(
            completed_pairs,
            total_students * assignments.len(),
        )),
        dropoff_rate: Set(calculator::rate(total_students - active.len(), total_students)),
        ..Default::default()
    })
    .on_conflict(
        OnConflict::columns([
            classroom_statistics::Column::ClassroomId,
            classroom_statistics::Column::SnapshotDate,
        ])
        .update_columns([
            classroom_statistics::Column::SnapshotTime,
            classroom_statistics::Column::TotalStudents,
            classroom_statistics::Column::ActiveStudents,
            classroom_statistics::Column::ActiveStudentRate,
            classroom_statistics::Column::TotalSubmissions,
            classroom_statistics::Column::SubmissionsPerStudent,
            classroom_statistics::Column::AvgScore,
            classroom_statistics::Column::MedianScore,
            classroom_statistics::Column::PlagiarismRate,
            classroom_statistics::Column::AvgSimilarity,
            classroom_statistics::Column::MaxSimilarity,
            classroom_statistics::Column::RuntimeErrorRate,
            classroom_statistics::Column::AssignmentCompletionRate,
            classroom_statistics::Column::DropoffRate,
        ])
        .to_owned(),
    )
    .exec_without_returning(&txn)
    .await?;

    classroom_score_bucket::Entity::insert_many(buckets.iter().map(|b| {
        classroom_score_bucket::ActiveModel {
            classroom_id: Set(classroom_id),
            snapshot_date: Set(date),
            bucket_start: Set(b.start),
            count: Set(b.count),
            ..Default::default()
        }
    }))
    .on_conflict(
        OnConflict::columns([
            classroom_score_bucket::Column::ClassroomId,
            classroom_score_bucket::Column::SnapshotDate,
            classroom_score_bucket::Column::BucketStart,
        ])
        .update_column(classroom_score_bucket::Column::Count)
        .to_owned(),
    )
    .exec_without_returning(&txn)
    .await?;

    classroom_language_usage::Entity::delete_many()
        .filter(classroom_language_usage::Column::ClassroomId.eq(classroom_id))
        .filter(classroom_language_usage::Column::SnapshotDate.eq(date))
        .exec(&txn)
        .await?;
    if !languages.is_empty() {
        classroom_language_usage::Entity::insert_many(languages.iter().map(|(language, count)| {
            classroom_language_usage::ActiveModel {
                classroom_id: Set(classroom_id),
                snapshot_date: Set(date),
                language: Set(language.clone()),
                count: Set(*count),
                ..Default::default()
            }
        }))
        .exec_without_returning(&txn)
        .await?;
    }

    txn.commit().await?;

    info!(
        classroom_id,
        students = total_students,
        active = active.len(),
        "Classroom statistics recomputed"
    );

    find_snapshot(db, classroom_id)
        .await?
        .ok_or_else(|| DbErr::RecordNotFound(format!("statistics for classroom {classroom_id}")))
}

async fn find_snapshot<C: ConnectionTrait>(
    db: &C,
    classroom_id: i32,
) -> Result<Option<classroom_statistics::Model>, DbErr> {
    classroom_statistics::Entity::find()
        .filter(classroom_statistics::Column::ClassroomId.eq(classroom_id))
        .filter(classroom_statistics::Column::SnapshotDate.eq(today()))
        .one(db)
        .await
}

pub struct ClassroomSnapshot {
    pub stats: classroom_statistics::Model,
    pub score_distribution: Vec<classroom_score_bucket::Model>,
    pub language_usage: Vec<classroom_language_usage::Model>,
}

/// Read today's snapshot, computing it first if it does not exist yet.
pub async fn snapshot(
    db: &DatabaseConnection,
    classroom_id: i32,
) -> Result<ClassroomSnapshot, DbErr> {
    let stats = match find_snapshot(db, classroom_id).await? {
        Some(s) => s,
        None => recompute(db, classroom_id).await?,
    };
    let date = stats.snapshot_date;

    let score_distribution = classroom_score_bucket::Entity::find()
        .filter(classroom_score_bucket::Column::ClassroomId.eq(classroom_id))
        .filter(classroom_score_bucket::Column::SnapshotDate.eq(date))
        .order_by_asc(classroom_score_bucket::Column::BucketStart)
        .all(db)
        .await?;
    let language_usage = classroom_language_usage::Entity::find()
        .filter(classroom_language_usage::Column::ClassroomId.eq(classroom_id))
        .filter(classroom_language_usage::Column::SnapshotDate.eq(date))
        .order_by_desc(classroom_language_usage::Column::Count)
        .order_by_asc(classroom_language_usage::Column::Language)
        .all(db)
        .await?;

    Ok(ClassroomSnapshot {
        stats,
        score_distribution,
        language_usage,
    })
}

/// Classroom an assignment belongs to, if any.
pub async fn classroom_of(db: &DatabaseConnection, assignment_id: i32) -> Result<Option<i32>, DbErr> {
    Ok(assignment::Entity::find_by_id(assignment_id)
        .one(db)
        .await?
        .and_then(|a| a.classroom_id))
}

use chrono::{DateTime, NaiveDate, Utc};
use common::{SubmissionStatus, TestOutcome};
use sea_orm::sea_query::{Expr, ExprTrait, OnConflict};
use sea_orm::*;
use tracing::{debug, info, instrument};

use super::calculator::{self, ResultSample};
use super::today;
use crate::entity::{
    assignment, assignment_error_pattern, assignment_score_bucket, assignment_statistics,
    assignment_submission_timeline, assignment_submission_trend, assignment_test_case_stats,
    plagiarism_report, submission, submission_attempt, test_result,
};

/// Everything a snapshot is computed from.
struct Population {
    assignment: assignment::Model,
    attempts: Vec<submission_attempt::Model>,
    submissions: Vec<submission::Model>,
    samples: Vec<ResultSample>,
    reports: Vec<(i32, f64)>,
}

impl Population {
    fn completed(&self) -> impl Iterator<Item = &submission::Model> {
        self.submissions
            .iter()
            .filter(|s| s.status == SubmissionStatus::Completed)
    }

    fn score_percentages(&self) -> Vec<f64> {
        let max_points = self.assignment.max_points();
        self.completed()
            .filter_map(|s| s.effective_score())
            .map(|score| calculator::to_percent(score, max_points))
            .collect()
    }
}

async fn load_assignment<C: ConnectionTrait>(
    db: &C,
    assignment_id: i32,
) -> Result<assignment::Model, DbErr> {
    assignment::Entity::find_by_id(assignment_id)
        .one(db)
        .await?
        .ok_or_else(|| DbErr::RecordNotFound(format!("assignment {assignment_id}")))
}

async fn load_submissions<C: ConnectionTrait>(
    db: &C,
    assignment_id: i32,
) -> Result<Vec<submission::Model>, DbErr> {
    submission::Entity::find()
        .filter(submission::Column::AssignmentId.eq(assignment_id))
        .all(db)
        .await
}

async fn load_attempts<C: ConnectionTrait>(
    db: &C,
    assignment_id: i32,
) -> Result<Vec<submission_attempt::Model>, DbErr> {
    submission_attempt::Entity::find()
        .filter(submission_attempt::Column::AssignmentId.eq(assignment_id))
        .all(db)
        .await
}

/// (checked submission, similarity) for every report in the assignment.
pub(super) async fn load_reports<C: ConnectionTrait>(
    db: &C,
    assignment_ids: Vec<i32>,
) -> Result<Vec<(i32, f64)>, DbErr> {
    if assignment_ids.is_empty() {
        return Ok(vec![]);
    }
    plagiarism_report::Entity::find()
        .select_only()
        .column(plagiarism_report::Column::SubmissionId)
        .column(plagiarism_report::Column::Similarity)
        .filter(plagiarism_report::Column::AssignmentId.is_in(assignment_ids))
        .into_tuple()
        .all(db)
        .await
}

pub(super) async fn load_samples<C: ConnectionTrait>(
    db: &C,
    submission_ids: Vec<i32>,
) -> Result<Vec<ResultSample>, DbErr> {
    if submission_ids.is_empty() {
        return Ok(vec![]);
    }
    Ok(test_result::Entity::find()
        .filter(test_result::Column::SubmissionId.is_in(submission_ids))
        .all(db)
        .await?
        .into_iter()
        .map(|r| ResultSample {
            submission_id: r.submission_id,
            test_case_id: r.test_case_id,
            passed: r.status == TestOutcome::Passed,
            is_public: r.is_public,
            execution_time_ms: r.execution_time_ms,
            error_type: r.error_type,
            error_message: r.error_message,
        })
        .collect())
}

async fn load_population<C: ConnectionTrait>(
    db: &C,
    assignment_id: i32,
) -> Result<Population, DbErr> {
    let assignment = load_assignment(db, assignment_id).await?;
    let attempts = load_attempts(db, assignment_id).await?;
    let submissions = load_submissions(db, assignment_id).await?;
    let completed_ids: Vec<i32> = submissions
        .iter()
        .filter(|s| s.status == SubmissionStatus::Completed)
        .map(|s| s.id)
        .collect();
    let samples = load_samples(db, completed_ids).await?;
    let reports = load_reports(db, vec![assignment_id]).await?;

    Ok(Population {
        assignment,
        attempts,
        submissions,
        samples,
        reports,
    })
}

fn distinct_submitters(attempts: &[submission_attempt::Model]) -> i32 {
    let mut ids: Vec<i32> = attempts.iter().map(|a| a.student_id).collect();
    ids.sort_unstable();
    ids.dedup();
    ids.len() as i32
}

/// Rebuild today's snapshot for an assignment from scratch.
#[instrument(skip(db))]
pub async fn recompute(
    db: &DatabaseConnection,
    assignment_id: i32,
) -> Result<assignment_statistics::Model, DbErr> {
    let pop = load_population(db, assignment_id).await?;
    let date = today();
    let now = Utc::now();

    let percentages = pop.score_percentages();
    let scores = calculator::score_summary(&percentages);
    let buckets = calculator::assignment_score_buckets(&percentages);
    let runtimes = calculator::runtime_distribution(&calculator::runtime_per_submission(
        &pop.samples,
    ));
    let attempts = calculator::attempts_distribution(pop.attempts.iter().map(|a| a.student_id));
    let (public_rate, private_rate) = calculator::pass_rates(&pop.samples);
    let case_stats = calculator::test_case_stats(&pop.samples);
    let patterns = calculator::error_patterns(&pop.samples, calculator::ERROR_PATTERN_LIMIT);
    let live = pop.submissions.len();
    let errored = pop
        .submissions
        .iter()
        .filter(|s| s.status == SubmissionStatus::Error)
        .count();
    let plagiarism = calculator::plagiarism_summary(&pop.reports, live);

    let txn = db.begin().await?;

    assignment_statistics::Entity::insert(assignment_statistics::ActiveModel {
        assignment_id: Set(assignment_id),
        snapshot_date: Set(date),
        snapshot_time: Set(now),
        total_submissions: Set(pop.attempts.len() as i32),
        distinct_submitters: Set(distinct_submitters(&pop.attempts)),
        average_score: Set(scores.average),
        median_score: Set(scores.median),
        average_runtime_ms: Set(runtimes.average),
        min_runtime_ms: Set(runtimes.min),
        p25_runtime_ms: Set(runtimes.p25),
        median_runtime_ms: Set(runtimes.median),
        p75_runtime_ms: Set(runtimes.p75),
        max_runtime_ms: Set(runtimes.max),
        avg_attempts: Set(attempts.average),
        median_attempts: Set(attempts.median),
        max_attempts: Set(attempts.max),
        public_test_pass_rate: Set(public_rate),
        private_test_pass_rate: Set(private_rate),
        runtime_error_rate: Set(calculator::rate(errored, live)),
        plagiarism_rate: Set(plagiarism.rate),
        avg_similarity: Set(plagiarism.avg_similarity),
        max_similarity: Set(plagiarism.max_similarity),
        ..Default::default()
    })
    .on_conflict(
        OnConflict::columns([
            assignment_statistics::Column::AssignmentId,
            assignment_statistics::Column::SnapshotDate,
        ])
        .update_columns([
            assignment_statistics::Column::SnapshotTime,
            assignment_statistics::Column::TotalSubmissions,
            assignment_statistics::Column::DistinctSubmitters,
            assignment_statistics::Column::AverageScore,
            assignment_statistics::Column::MedianScore,
            assignment_statistics::Column::AverageRuntimeMs,
            assignment_statistics::Column::MinRuntimeMs,
            assignment_statistics::Column::P25RuntimeMs,
            assignment_statistics::Column::MedianRuntimeMs,
            assignment_statistics::Column::P75RuntimeMs,
            assignment_statistics::Column::MaxRuntimeMs,
            assignment_statistics::Column::AvgAttempts,
            assignment_statistics::Column::MedianAttempts,
            assignment_statistics::Column::MaxAttempts,
            assignment_statistics::Column::PublicTestPassRate,
            assignment_statistics::Column::PrivateTestPassRate,
            assignment_statistics::Column::RuntimeErrorRate,
            assignment_statistics::Column::PlagiarismRate,
            assignment_statistics::Column::AvgSimilarity,
            assignment_statistics::Column::MaxSimilarity,
        ])
        .to_owned(),
    )
    .exec_without_returning(&txn)
    .await?;

    upsert_score_buckets(&txn, assignment_id, date, &buckets).await?;

    assignment_test_case_stats::Entity::delete_many()
        .filter(assignment_test_case_stats::Column::AssignmentId.eq(assignment_id))
        .filter(assignment_test_case_stats::Column::SnapshotDate.eq(date))
        .exec(&txn)
        .await?;
    if !case_stats.is_empty() {
        assignment_test_case_stats::Entity::insert_many(case_stats.iter().map(|s| {
            assignment_test_case_stats::ActiveModel {
                assignment_id: Set(assignment_id),
                snapshot_date: Set(date),
                test_case_id: Set(s.test_case_id),
                is_public: Set(s.is_public),
                runs: Set(s.runs),
                failure_rate: Set(s.failure_rate),
                avg_runtime_ms: Set(s.avg_runtime_ms),
                ..Default::default()
            }
        }))
        .exec_without_returning(&txn)
        .await?;
    }

    assignment_error_pattern::Entity::delete_many()
        .filter(assignment_error_pattern::Column::AssignmentId.eq(assignment_id))
        .filter(assignment_error_pattern::Column::SnapshotDate.eq(date))
        .exec(&txn)
        .await?;
    if !patterns.is_empty() {
        assignment_error_pattern::Entity::insert_many(patterns.iter().map(|p| {
            assignment_error_pattern::ActiveModel {
                assignment_id: Set(assignment_id),
                snapshot_date: Set(date),
                error_type: Set(p.error_type.clone()),
                error_message: Set(p.error_message.clone()),
                occurrences: Set(p.occurrences),
                ..Default::default()
            }
        }))
        .exec_without_returning(&txn)
        .await?;
    }

    txn.commit().await?;

    info!(
        assignment_id,
        submissions = live,
        attempts = pop.attempts.len(),
        "Assignment statistics recomputed"
    );

    find_snapshot(db, assignment_id, date)
        .await?
        .ok_or_else(|| DbErr::RecordNotFound(format!("statistics for assignment {assignment_id}")))
}

async fn upsert_score_buckets<C: ConnectionTrait>(
    db: &C,
    assignment_id: i32,
    date: NaiveDate,
    buckets: &[calculator::Bucket],
) -> Result<(), DbErr> {
    assignment_score_bucket::Entity::insert_many(buckets.iter().map(|b| {
        assignment_score_bucket::ActiveModel {
            assignment_id: Set(assignment_id),
            snapshot_date: Set(date),
            bucket_start: Set(b.start),
            bucket_end: Set(b.end),
            count: Set(b.count),
            ..Default::default()
        }
    }))
    .on_conflict(
        OnConflict::columns([
            assignment_score_bucket::Column::AssignmentId,
            assignment_score_bucket::Column::SnapshotDate,
            assignment_score_bucket::Column::BucketStart,
        ])
        .update_columns([
            assignment_score_bucket::Column::BucketEnd,
            assignment_score_bucket::Column::Count,
        ])
        .to_owned(),
    )
    .exec_without_returning(db)
    .await?;
    Ok(())
}

pub async fn find_snapshot<C: ConnectionTrait>(
    db: &C,
    assignment_id: i32,
    date: NaiveDate,
) -> Result<Option<assignment_statistics::Model>, DbErr> {
    assignment_statistics::Entity::find()
        .filter(assignment_statistics::Column::AssignmentId.eq(assignment_id))
        .filter(assignment_statistics::Column::SnapshotDate.eq(date))
        .one(db)
        .await
}

/// Apply a partial update to today's row. Returns false when there is no
/// row yet.
async fn patch_today(
    db: &DatabaseConnection,
    assignment_id: i32,
    patch: assignment_statistics::ActiveModel,
) -> Result<bool, DbErr> {
    let result = assignment_statistics::Entity::update_many()
        .set(patch)
        .filter(assignment_statistics::Column::AssignmentId.eq(assignment_id))
        .filter(assignment_statistics::Column::SnapshotDate.eq(today()))
        .exec(db)
        .await?;
    Ok(result.rows_affected > 0)
}

/// Bump the heat-map slot and daily trend for a new submission, then
/// refresh the submission totals.
#[instrument(skip(db))]
pub async fn record_submission(
    db: &DatabaseConnection,
    assignment_id: i32,
    at: DateTime<Utc>,
) -> Result<(), DbErr> {
    let (day_of_week, hour_of_day) = calculator::timeline_slot(at);

    assignment_submission_timeline::Entity::insert(assignment_submission_timeline::ActiveModel {
        assignment_id: Set(assignment_id),
        day_of_week: Set(day_of_week),
        hour_of_day: Set(hour_of_day),
        submission_count: Set(1),
        ..Default::default()
    })
    .on_conflict(
        OnConflict::columns([
            assignment_submission_timeline::Column::AssignmentId,
            assignment_submission_timeline::Column::DayOfWeek,
            assignment_submission_timeline::Column::HourOfDay,
        ])
        .value(
            assignment_submission_timeline::Column::SubmissionCount,
            Expr::col((
                assignment_submission_timeline::Entity,
                assignment_submission_timeline::Column::SubmissionCount,
            ))
            .add(1),
        )
        .to_owned(),
    )
    .exec_without_returning(db)
    .await?;

    assignment_submission_trend::Entity::insert(assignment_submission_trend::ActiveModel {
        assignment_id: Set(assignment_id),
        trend_date: Set(at.date_naive()),
        submission_count: Set(1),
        ..Default::default()
    })
    .on_conflict(
        OnConflict::columns([
            assignment_submission_trend::Column::AssignmentId,
            assignment_submission_trend::Column::TrendDate,
        ])
        .value(
            assignment_submission_trend::Column::SubmissionCount,
            Expr::col((
                assignment_submission_trend::Entity,
                assignment_submission_trend::Column::SubmissionCount,
            ))
            .add(1),
        )
        .to_owned(),
    )
    .exec_without_returning(db)
    .await?;

    let attempts = load_attempts(db, assignment_id).await?;
    let patched = patch_today(
        db,
        assignment_id,
        assignment_statistics::ActiveModel {
            snapshot_time: Set(Utc::now()),
            total_submissions: Set(attempts.len() as i32),
            distinct_submitters: Set(distinct_submitters(&attempts)),
            ..Default::default()
        },
    )
    .await?;
    if !patched {
        recompute(db, assignment_id).await?;
    }

    debug!(assignment_id, day_of_week, hour_of_day, "Submission counted");
    Ok(())
}

/// Refresh only the plagiarism figures.
#[instrument(skip(db))]
pub async fn refresh_plagiarism(db: &DatabaseConnection, assignment_id: i32) -> Result<(), DbErr> {
    let live = submission::Entity::find()
        .filter(submission::Column::AssignmentId.eq(assignment_id))
        .count(db)
        .await? as usize;
    let reports = load_reports(db, vec![assignment_id]).await?;
    let summary = calculator::plagiarism_summary(&reports, live);

    let patched = patch_today(
        db,
        assignment_id,
        assignment_statistics::ActiveModel {
            snapshot_time: Set(Utc::now()),
            plagiarism_rate: Set(summary.rate),
            avg_similarity: Set(summary.avg_similarity),
            max_similarity: Set(summary.max_similarity),
            ..Default::default()
        },
    )
    .await?;
    if !patched {
        recompute(db, assignment_id).await?;
    }
    Ok(())
}

/// Refresh only the score distribution and average/median score.
#[instrument(skip(db))]
pub async fn refresh_scores(db: &DatabaseConnection, assignment_id: i32) -> Result<(), DbErr> {
    let assignment = load_assignment(db, assignment_id).await?;
    let submissions = load_submissions(db, assignment_id).await?;
    let pop = Population {
        assignment,
        attempts: vec![],
        submissions,
        samples: vec![],
        reports: vec![],
    };
    let percentages = pop.score_percentages();
    let scores = calculator::score_summary(&percentages);

    let patched = patch_today(
        db,
        assignment_id,
        assignment_statistics::ActiveModel {
            snapshot_time: Set(Utc::now()),
            average_score: Set(scores.average),
            median_score: Set(scores.median),
            ..Default::default()
        },
    )
    .await?;
    if !patched {
        recompute(db, assignment_id).await?;
        return Ok(());
    }

    let buckets = calculator::assignment_score_buckets(&percentages);
    upsert_score_buckets(db, assignment_id, today(), &buckets).await
}

/// Today's snapshot with its breakdowns.
pub struct AssignmentSnapshot {
    pub stats: assignment_statistics::Model,
    pub score_distribution: Vec<assignment_score_bucket::Model>,
    pub timeline: Vec<assignment_submission_timeline::Model>,
    pub trend: Vec<assignment_submission_trend::Model>,
    pub test_cases: Vec<assignment_test_case_stats::Model>,
    pub error_patterns: Vec<assignment_error_pattern::Model>,
}

/// Read today's snapshot, computing it first if it does not exist yet.
pub async fn snapshot(
    db: &DatabaseConnection,
    assignment_id: i32,
) -> Result<AssignmentSnapshot, DbErr> {
    let date = today();
    let stats = match find_snapshot(db, assignment_id, date).await? {
        Some(s) => s,
        None => recompute(db, assignment_id).await?,
    };

    let score_distribution = assignment_score_bucket::Entity::find()
        .filter(assignment_score_bucket::Column::AssignmentId.eq(assignment_id))
        .filter(assignment_score_bucket::Column::SnapshotDate.eq(date))
        .order_by_asc(assignment_score_bucket::Column::BucketStart)
        .all(db)
        .await?;
    let timeline = assignment_submission_timeline::Entity::find()
        .filter(assignment_submission_timeline::Column::AssignmentId.eq(assignment_id))
        .order_by_asc(assignment_submission_timeline::Column::DayOfWeek)
        .order_by_asc(assignment_submission_timeline::Column::HourOfDay)
        .all(db)
        .await?;
    let trend = assignment_submission_trend::Entity::find()
        .filter(assignment_submission_trend::Column::AssignmentId.eq(assignment_id))
        .order_by_asc(assignment_submission_trend::Column::TrendDate)
        .all(db)
        .await?;
    let test_cases = assignment_test_case_stats::Entity::find()
        .filter(assignment_test_case_stats::Column::AssignmentId.eq(assignment_id))
        .filter(assignment_test_case_stats::Column::SnapshotDate.eq(date))
        .order_by_asc(assignment_test_case_stats::Column::TestCaseId)
        .all(db)
        .await?;
    let error_patterns = assignment_error_pattern::Entity::find()
        .filter(assignment_error_pattern::Column::AssignmentId.eq(assignment_id))
        .filter(assignment_error_pattern::Column::SnapshotDate.eq(date))
        .order_by_desc(assignment_error_pattern::Column::Occurrences)
        .order_by_asc(assignment_error_pattern::Column::Id)
        .all(db)
        .await?;

    Ok(AssignmentSnapshot {
        stats,
        score_distribution,
        timeline,
        trend,
        test_cases,
        error_patterns,
    })
}

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use crate::entity::{
    assignment_error_pattern, assignment_score_bucket, assignment_submission_timeline,
    assignment_submission_trend, assignment_test_case_stats, classroom_language_usage,
    classroom_score_bucket,
};
use crate::services::statistics::assignment::AssignmentSnapshot;
use crate::services::statistics::calculator::{self, TestCaseStat};
use crate::services::statistics::classroom::ClassroomSnapshot;

/// How many entries the most-missed and slowest lists carry.
const TEST_CASE_HIGHLIGHTS: usize = 5;

#[derive(Serialize, utoipa::ToSchema)]
pub struct ScoreBucketResponse {
    #[schema(example = 61)]
    pub start: i32,
    #[schema(example = 80)]
    pub end: i32,
    #[schema(example = 4)]
    pub count: i32,
}

impl From<assignment_score_bucket::Model> for ScoreBucketResponse {
    fn from(b: assignment_score_bucket::Model) -> Self {
        Self {
            start: b.bucket_start,
            end: b.bucket_end,
            count: b.count,
        }
    }
}

impl From<classroom_score_bucket::Model> for ScoreBucketResponse {
    fn from(b: classroom_score_bucket::Model) -> Self {
        let end = if b.bucket_start >= 100 {
            100
        } else {
            b.bucket_start + 9
        };
        Self {
            start: b.bucket_start,
            end,
            count: b.count,
        }
    }
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct RuntimeDistributionResponse {
    pub average_ms: Option<f64>,
    pub min_ms: Option<f64>,
    pub p25_ms: Option<f64>,
    pub median_ms: Option<f64>,
    pub p75_ms: Option<f64>,
    pub max_ms: Option<f64>,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct AttemptsDistributionResponse {
    #[schema(example = 1.5)]
    pub average: f64,
    pub median: f64,
    pub max: i32,
}

/// Submissions in one weekday/hour slot. Day 0 is Sunday.
#[derive(Serialize, utoipa::ToSchema)]
pub struct TimelineSlotResponse {
    pub day_of_week: i32,
    pub hour_of_day: i32,
    pub count: i32,
}

impl From<assignment_submission_timeline::Model> for TimelineSlotResponse {
    fn from(t: assignment_submission_timeline::Model) -> Self {
        Self {
            day_of_week: t.day_of_week,
            hour_of_day: t.hour_of_day,
            count: t.submission_count,
        }
    }
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct TrendPointResponse {
    pub date: NaiveDate,
    pub count: i32,
}

impl From<assignment_submission_trend::Model> for TrendPointResponse {
    fn from(t: assignment_submission_trend::Model) -> Self {
        Self {
            date: t.trend_date,
            count: t.submission_count,
        }
    }
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct TestCaseStatResponse {
    pub test_case_id: i32,
    pub is_public: bool,
    pub runs: i32,
    /// Percent of runs that did not pass.
    pub failure_rate: f64,
    pub avg_runtime_ms: Option<f64>,
}

impl From<TestCaseStat> for TestCaseStatResponse {
    fn from(s: TestCaseStat) -> Self {
        Self {
            test_case_id: s.test_case_id,
            is_public: s.is_public,
            runs: s.runs,
            failure_rate: s.failure_rate,
            avg_runtime_ms: s.avg_runtime_ms,
        }
    }
}

fn to_stat(row: &assignment_test_case_stats::Model) -> TestCaseStat {
    TestCaseStat {
        test_case_id: row.test_case_id,
        is_public: row.is_public,
        runs: row.runs,
        failure_rate: row.failure_rate,
        avg_runtime_ms: row.avg_runtime_ms,
    }
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct ErrorPatternResponse {
    #[schema(example = "RuntimeError")]
    pub error_type: String,
    #[schema(example = "IndexError: list index out of range")]
    pub error_message: String,
    pub occurrences: i32,
}

impl From<assignment_error_pattern::Model> for ErrorPatternResponse {
    fn from(e: assignment_error_pattern::Model) -> Self {
        Self {
            error_type: e.error_type,
            error_message: e.error_message,
            occurrences: e.occurrences,
        }
    }
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct PlagiarismStatsResponse {
    /// Percent of live submissions with a finding at or above the threshold.
    pub rate: f64,
    pub avg_similarity: Option<f64>,
    pub max_similarity: Option<f64>,
}

/// Today's statistics snapshot for an assignment.
#[derive(Serialize, utoipa::ToSchema)]
pub struct AssignmentStatisticsResponse {
    #[schema(example = 1)]
    pub assignment_id: i32,
    pub snapshot_date: NaiveDate,
    pub snapshot_time: DateTime<Utc>,
    /// Attempts ever made, including overwritten ones.
    pub total_submissions: i32,
    pub distinct_submitters: i32,
    /// Percent of max points.
    pub average_score: Option<f64>,
    pub median_score: Option<f64>,
    pub score_distribution: Vec<ScoreBucketResponse>,
    pub runtime: RuntimeDistributionResponse,
    pub attempts: AttemptsDistributionResponse,
    pub public_test_pass_rate: Option<f64>,
    pub private_test_pass_rate: Option<f64>,
    pub runtime_error_rate: f64,
    pub plagiarism: PlagiarismStatsResponse,
    pub test_cases: Vec<TestCaseStatResponse>,
    pub most_missed_test_cases: Vec<TestCaseStatResponse>,
    pub slowest_test_cases: Vec<TestCaseStatResponse>,
    pub error_patterns: Vec<ErrorPatternResponse>,
    pub timeline: Vec<TimelineSlotResponse>,
    pub trend: Vec<TrendPointResponse>,
}

impl From<AssignmentSnapshot> for AssignmentStatisticsResponse {
    fn from(snap: AssignmentSnapshot) -> Self {
        let s = snap.stats;
        let stats: Vec<TestCaseStat> = snap.test_cases.iter().map(to_stat).collect();

        Self {
            assignment_id: s.assignment_id,
            snapshot_date: s.snapshot_date,
            snapshot_time: s.snapshot_time,
            total_submissions: s.total_submissions,
            distinct_submitters: s.distinct_submitters,
            average_score: s.average_score,
            median_score: s.median_score,
            score_distribution: snap.score_distribution.into_iter().map(Into::into).collect(),
            runtime: RuntimeDistributionResponse {
                average_ms: s.average_runtime_ms,
                min_ms: s.min_runtime_ms,
                p25_ms: s.p25_runtime_ms,
                median_ms: s.median_runtime_ms,
                p75_ms: s.p75_runtime_ms,
                max_ms: s.max_runtime_ms,
            },
            attempts: AttemptsDistributionResponse {
                average: s.avg_attempts,
                median: s.median_attempts,
                max: s.max_attempts,
            },
            public_test_pass_rate: s.public_test_pass_rate,
            private_test_pass_rate: s.private_test_pass_rate,
            runtime_error_rate: s.runtime_error_rate,
            plagiarism: PlagiarismStatsResponse {
                rate: s.plagiarism_rate,
                avg_similarity: s.avg_similarity,
                max_similarity: s.max_similarity,
            },
            most_missed_test_cases: calculator::most_missed(&stats, TEST_CASE_HIGHLIGHTS)
                .into_iter()
                .map(Into::into)
                .collect(),
            slowest_test_cases: calculator::slowest(&stats, TEST_CASE_HIGHLIGHTS)
                .into_iter()
                .map(Into::into)
                .collect(),
            test_cases: stats.into_iter().map(Into::into).collect(),
            error_patterns: snap.error_patterns.into_iter().map(Into::into).collect(),
            timeline: snap.timeline.into_iter().map(Into::into).collect(),
            trend: snap.trend.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct LanguageUsageResponse {
    #[schema(example = "python")]
    pub language: String,
    pub count: i32,
}

impl From<classroom_language_usage::Model> for LanguageUsageResponse {
    fn from(l: classroom_language_usage::Model) -> Self {
        Self {
            language: l.language,
            count: l.count,
        }
    }
}

/// Today's statistics snapshot for a classroom.
#[derive(Serialize, utoipa::ToSchema)]
pub struct ClassroomStatisticsResponse {
    #[schema(example = 3)]
    pub classroom_id: i32,
    pub snapshot_date: NaiveDate,
    pub snapshot_time: DateTime<Utc>,
    pub total_students: i32,
    /// Students with an attempt in the last 30 days.
    pub active_students: i32,
    pub active_student_rate: f64,
    pub total_submissions: i32,
    pub submissions_per_student: f64,
    pub avg_score: Option<f64>,
    pub median_score: Option<f64>,
    pub score_distribution: Vec<ScoreBucketResponse>,
    pub plagiarism: PlagiarismStatsResponse,
    pub runtime_error_rate: f64,
    pub assignment_completion_rate: f64,
    pub dropoff_rate: f64,
    pub language_usage: Vec<LanguageUsageResponse>,
}

impl From<ClassroomSnapshot> for ClassroomStatisticsResponse {
    fn from(snap: ClassroomSnapshot) -> Self {
        let s = snap.stats;
        Self {
            classroom_id: s.classroom_id,
            snapshot_date: s.snapshot_date,
            snapshot_time: s.snapshot_time,
            total_students: s.total_students,
            active_students: s.active_students,
            active_student_rate: s.active_student_rate,
            total_submissions: s.total_submissions,
            submissions_per_student: s.submissions_per_student,
            avg_score: s.avg_score,
            median_score: s.median_score,
            score_distribution: snap.score_distribution.into_iter().map(Into::into).collect(),
            plagiarism: PlagiarismStatsResponse {
                rate: s.plagiarism_rate,
                avg_similarity: s.avg_similarity,
                max_similarity: s.max_similarity,
            },
            runtime_error_rate: s.runtime_error_rate,
            assignment_completion_rate: s.assignment_completion_rate,
            dropoff_rate: s.dropoff_rate,
            language_usage: snap.language_usage.into_iter().map(Into::into).collect(),
        }
    }
}

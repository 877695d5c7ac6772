//! Pure aggregations behind the statistics snapshots.

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{DateTime, Datelike, Timelike, Utc};

use crate::services::plagiarism::is_flagged;
use crate::utils::percentile::{mean, median, percentile, sorted};

/// Assignment score bands, inclusive, over percent of max points.
pub const ASSIGNMENT_BUCKETS: [(i32, i32); 5] = [(0, 20), (21, 40), (41, 60), (61, 80), (81, 100)];

pub const ERROR_PATTERN_LIMIT: usize = 5;
pub const UNKNOWN: &str = "Unknown";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Bucket {
    pub start: i32,
    pub end: i32,
    pub count: i32,
}

/// Rate in percent; 0 for an empty population.
pub fn rate(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

pub fn to_percent(points: f64, max_points: f64) -> f64 {
    if max_points <= 0.0 {
        0.0
    } else {
        (points / max_points * 100.0).clamp(0.0, 100.0)
    }
}

pub fn assignment_score_buckets(percentages: &[f64]) -> Vec<Bucket> {
    let mut buckets: Vec<Bucket> = ASSIGNMENT_BUCKETS
        .iter()
        .map(|&(start, end)| Bucket { start, end, count: 0 })
        .collect();

    for &score in percentages {
        let slot = buckets
            .iter()
            .position(|b| score <= b.end as f64)
            .unwrap_or(buckets.len() - 1);
        buckets[slot].count += 1;
    }
    buckets
}

/// Ten-point bands 0-9 .. 90-99, with a perfect 100 counted on its own.
pub fn classroom_score_buckets(percentages: &[f64]) -> Vec<Bucket> {
    let mut buckets: Vec<Bucket> = (0..=10)
        .map(|i| Bucket {
            start: i * 10,
            end: if i == 10 { 100 } else { i * 10 + 9 },
            count: 0,
        })
        .collect();

    for &score in percentages {
        let slot = ((score.clamp(0.0, 100.0) / 10.0).floor() as usize).min(10);
        buckets[slot].count += 1;
    }
    buckets
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ScoreSummary {
    pub average: Option<f64>,
    pub median: Option<f64>,
}

pub fn score_summary(percentages: &[f64]) -> ScoreSummary {
    if percentages.is_empty() {
        return ScoreSummary::default();
    }
    let ordered = sorted(percentages.iter().copied());
    ScoreSummary {
        average: mean(&ordered),
        median: Some(median(&ordered)),
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct RuntimeDistribution {
    pub average: Option<f64>,
    pub min: Option<f64>,
    pub p25: Option<f64>,
    pub median: Option<f64>,
    pub p75: Option<f64>,
    pub max: Option<f64>,
}

/// Distribution of per-submission mean runtimes, in ms.
pub fn runtime_distribution(runtimes: &[f64]) -> RuntimeDistribution {
    if runtimes.is_empty() {
        return RuntimeDistribution::default();
    }
    let ordered = sorted(runtimes.iter().copied());
    RuntimeDistribution {
        average: mean(&ordered).map(f64::round),
        min: ordered.first().copied(),
        p25: Some(percentile(&ordered, 25.0)),
        median: Some(median(&ordered)),
        p75: Some(percentile(&ordered, 75.0)),
        max: ordered.last().copied(),
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct AttemptsDistribution {
    pub average: f64,
    pub median: f64,
    pub max: i32,
}

/// Attempts per student, from the student id of every attempt row.
pub fn attempts_distribution(student_ids: impl IntoIterator<Item = i32>) -> AttemptsDistribution {
    let mut per_student: HashMap<i32, i32> = HashMap::new();
    for id in student_ids {
        *per_student.entry(id).or_default() += 1;
    }
    if per_student.is_empty() {
        return AttemptsDistribution::default();
    }

    let counts = sorted(per_student.values().map(|&c| c as f64));
    AttemptsDistribution {
        average: mean(&counts).unwrap_or_default(),
        median: median(&counts),
        max: per_student.values().copied().max().unwrap_or_default(),
    }
}

/// One test outcome as the aggregations see it.
#[derive(Clone, Debug, PartialEq)]
pub struct ResultSample {
    pub submission_id: i32,
    pub test_case_id: Option<i32>,
    pub passed: bool,
    pub is_public: bool,
    pub execution_time_ms: Option<f64>,
    pub error_type: Option<String>,
    pub error_message: Option<String>,
}

/// Mean of positive runtimes per submission.
pub fn runtime_per_submission(samples: &[ResultSample]) -> Vec<f64> {
    let mut acc: BTreeMap<i32, (f64, u32)> = BTreeMap::new();
    for s in samples {
        if let Some(t) = s.execution_time_ms.filter(|t| *t > 0.0) {
            let e = acc.entry(s.submission_id).or_default();
            e.0 += t;
            e.1 += 1;
        }
    }
    acc.into_values().map(|(sum, n)| sum / n as f64).collect()
}

/// Pass rates for public and private tests; `None` when none ran.
pub fn pass_rates(samples: &[ResultSample]) -> (Option<f64>, Option<f64>) {
    let rate_for = |public: bool| {
        let group: Vec<&ResultSample> = samples.iter().filter(|s| s.is_public == public).collect();
        (!group.is_empty()).then(|| rate(group.iter().filter(|s| s.passed).count(), group.len()))
    };
    (rate_for(true), rate_for(false))
}

#[derive(Clone, Debug, PartialEq)]
pub struct TestCaseStat {
    pub test_case_id: i32,
    pub is_public: bool,
    pub runs: i32,
    pub failure_rate: f64,
    pub avg_runtime_ms: Option<f64>,
}

/// Per-case failure rate and runtime, ordered by case id. Results the worker
/// did not attribute to a case are skipped.
pub fn test_case_stats(samples: &[ResultSample]) -> Vec<TestCaseStat> {
    let mut by_case: BTreeMap<i32, Vec<&ResultSample>> = BTreeMap::new();
    for s in samples {
        if let Some(id) = s.test_case_id {
            by_case.entry(id).or_default().push(s);
        }
    }

    by_case
        .into_iter()
        .map(|(test_case_id, runs)| {
            let failed = runs.iter().filter(|s| !s.passed).count();
            let times: Vec<f64> = runs
                .iter()
                .filter_map(|s| s.execution_time_ms.filter(|t| *t > 0.0))
                .collect();
            TestCaseStat {
                test_case_id,
                is_public: runs.iter().all(|s| s.is_public),
                runs: runs.len() as i32,
                failure_rate: rate(failed, runs.len()),
                avg_runtime_ms: mean(&times),
            }
        })
        .collect()
}

/// Highest failure rates first.
pub fn most_missed(stats: &[TestCaseStat], limit: usize) -> Vec<TestCaseStat> {
    let mut v = stats.to_vec();
    v.sort_by(|a, b| {
        b.failure_rate
            .total_cmp(&a.failure_rate)
            .then(a.test_case_id.cmp(&b.test_case_id))
    });
    v.truncate(limit);
    v
}

/// Slowest average runtimes first. Cases without timings are left out.
pub fn slowest(stats: &[TestCaseStat], limit: usize) -> Vec<TestCaseStat> {
    let mut v: Vec<TestCaseStat> = stats
        .iter()
        .filter(|s| s.avg_runtime_ms.is_some())
        .cloned()
        .collect();
    v.sort_by(|a, b| {
        b.avg_runtime_ms
            .unwrap_or_default()
            .total_cmp(&a.avg_runtime_ms.unwrap_or_default())
            .then(a.test_case_id.cmp(&b.test_case_id))
    });
    v.truncate(limit);
    v
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ErrorPattern {
    pub error_type: String,
    pub error_message: String,
    pub occurrences: i32,
}

/// Most frequent (type, message) pairs among failing results.
pub fn error_patterns(samples: &[ResultSample], limit: usize) -> Vec<ErrorPattern> {
    let mut counts: HashMap<(String, String), i32> = HashMap::new();
    for s in samples.iter().filter(|s| !s.passed) {
        let key = (
            s.error_type.clone().unwrap_or_else(|| UNKNOWN.to_owned()),
            s.error_message.clone().unwrap_or_else(|| UNKNOWN.to_owned()),
        );
        *counts.entry(key).or_default() += 1;
    }

    let mut patterns: Vec<ErrorPattern> = counts
        .into_iter()
        .map(|((error_type, error_message), occurrences)| ErrorPattern {
            error_type,
            error_message,
            occurrences,
        })
        .collect();
    patterns.sort_by(|a, b| {
        b.occurrences
            .cmp(&a.occurrences)
            .then_with(|| a.error_type.cmp(&b.error_type))
            .then_with(|| a.error_message.cmp(&b.error_message))
    });
    patterns.truncate(limit);
    patterns
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PlagiarismSummary {
    pub rate: f64,
    pub avg_similarity: Option<f64>,
    pub max_similarity: Option<f64>,
}

/// `reports` are (checked submission, similarity) pairs. The rate counts
/// distinct checked submissions with a flagged report; similarity figures
/// cover flagged reports only.
pub fn plagiarism_summary(reports: &[(i32, f64)], population: usize) -> PlagiarismSummary {
    let flagged: Vec<(i32, f64)> = reports
        .iter()
        .copied()
        .filter(|(_, s)| is_flagged(*s))
        .collect();
    let flagged_submissions: HashSet<i32> = flagged.iter().map(|(id, _)| *id).collect();
    let similarities: Vec<f64> = flagged.iter().map(|(_, s)| *s).collect();

    PlagiarismSummary {
        rate: rate(flagged_submissions.len(), population),
        avg_similarity: mean(&similarities),
        max_similarity: similarities.iter().copied().reduce(f64::max),
    }
}

/// Heat-map slot for a timestamp: (day of week with 0 = Sunday, hour), UTC.
pub fn timeline_slot(at: DateTime<Utc>) -> (i32, i32) {
    (
        at.weekday().num_days_from_sunday() as i32,
        at.hour() as i32,
    )
}

/// Language name to number of submissions, sorted by name.
pub fn language_usage<'a>(languages: impl IntoIterator<Item = &'a str>) -> Vec<(String, i32)> {
    let mut counts: BTreeMap<String, i32> = BTreeMap::new();
    for lang in languages {
        *counts.entry(lang.to_owned()).or_default() += 1;
    }
    counts.into_iter().collect()
}

//! Pure score computation. No I/O; history is handed in by the caller.

use common::VerdictMetrics;

use crate::utils::percentile::percentile;

/// Weighting policy applied to every automatically graded submission.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GradingWeights {
    /// Share of the percentage score earned by passing tests.
    pub test_case_passing: f64,
    /// Share of the test score carried by private tests, when any exist.
    pub private_test_weight: f64,
    /// Share of the percentage score earned by runtime.
    pub performance: f64,
}

pub const WEIGHTS: GradingWeights = GradingWeights {
    test_case_passing: 0.85,
    private_test_weight: 0.6,
    performance: 0.15,
};

/// Used when there is nothing to compare the runtime against.
pub const DEFAULT_PERFORMANCE_SCORE: f64 = 70.0;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TestScore {
    pub test_case_score: f64,
    pub public_test_score: f64,
    pub private_test_score: f64,
    pub weighted: f64,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GradeBreakdown {
    pub test: TestScore,
    pub performance_score: f64,
    pub weighted_performance_score: f64,
    /// Clamped to 0..=100.
    pub percentage_score: f64,
    /// Points, rounded to two decimals.
    pub final_score: f64,
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn ratio(passed: u32, total: u32) -> f64 {
    if total == 0 {
        0.0
    } else {
        passed as f64 / total as f64 * 100.0
    }
}

pub fn test_score(metrics: &VerdictMetrics, weights: &GradingWeights) -> TestScore {
    let test_case_score = ratio(metrics.passed, metrics.total);

    let (public_test_score, private_test_score) = if metrics.private_total > 0 {
        (
            ratio(metrics.public_passed, metrics.public_total) * (1.0 - weights.private_test_weight),
            ratio(metrics.private_passed, metrics.private_total) * weights.private_test_weight,
        )
    } else {
        (test_case_score, 0.0)
    };

    TestScore {
        test_case_score,
        public_test_score,
        private_test_score,
        weighted: (public_test_score + private_test_score) * weights.test_case_passing,
    }
}

/// Tier score for `runtime` against the ascending `history` of per-submission
/// average runtimes.
pub fn performance_score(runtime: Option<f64>, history: &[f64]) -> f64 {
    let (Some(rt), false) = (runtime, history.is_empty()) else {
        return DEFAULT_PERFORMANCE_SCORE;
    };

    let p25 = percentile(history, 25.0);
    let median = percentile(history, 50.0);
    let p75 = percentile(history, 75.0);
    let max = history[history.len() - 1];

    if rt <= p25 {
        100.0
    } else if rt <= median {
        80.0
    } else if rt <= p75 {
        60.0
    } else if rt <= max * 0.9 {
        40.0
    } else {
        20.0
    }
}

/// Compute the automatic grade.
///
/// `history` must be sorted ascending. `max_points` is the assignment's
/// maximum score, already defaulted.
pub fn grade(metrics: &VerdictMetrics, history: &[f64], max_points: f64) -> GradeBreakdown {
    let test = test_score(metrics, &WEIGHTS);
    let performance_score = performance_score(metrics.average_runtime_ms, history);
    let weighted_performance_score = performance_score * WEIGHTS.performance;

    let percentage_score = (test.weighted + weighted_performance_score).clamp(0.0, 100.0);
    let final_score = round2(percentage_score / 100.0 * max_points);

    GradeBreakdown {
        test,
        performance_score,
        weighted_performance_score,
        percentage_score,
        final_score,
    }
}

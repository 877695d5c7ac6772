pub mod assignment;
pub mod assignment_error_pattern;
pub mod assignment_score_bucket;
pub mod assignment_statistics;
pub mod assignment_submission_timeline;
pub mod assignment_submission_trend;
pub mod assignment_test_case_stats;
pub mod classroom;
pub mod classroom_language_usage;
pub mod classroom_score_bucket;
pub mod classroom_statistics;
pub mod enrollment;
pub mod plagiarism_fingerprint;
pub mod plagiarism_report;
pub mod submission;
pub mod submission_attempt;
pub mod test_case;
pub mod test_result;

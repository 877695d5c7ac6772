pub mod config;
pub mod event;
pub mod event_bus;
pub mod judge_job;
pub mod submission_status;
pub mod verdict;

pub use event::{DomainEvent, EventKind, EventPayload};
pub use event_bus::{DeliveryMode, EventBus, Subscriber};
pub use submission_status::{FailureKind, GradingMethod, GradingStatus, SubmissionStatus};
pub use verdict::{ErrorDetail, JobState, TestOutcome, TestResult, Verdict, VerdictMetrics};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::submission_status::SubmissionStatus;
use crate::verdict::TestResult;

/// Topic an event is published under.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    SubmissionCreated,
    SubmissionCompleted,
    PlagiarismDetected,
    StatisticsCalculated,
    GradeUpdated,
    StudentEnrolled,
}

impl EventKind {
    pub fn topic(&self) -> &'static str {
        match self {
            Self::SubmissionCreated => "SUBMISSION_CREATED",
            Self::SubmissionCompleted => "SUBMISSION_COMPLETED",
            Self::PlagiarismDetected => "PLAGIARISM_DETECTED",
            Self::StatisticsCalculated => "STATISTICS_CALCULATED",
            Self::GradeUpdated => "GRADE_UPDATED",
            Self::StudentEnrolled => "STUDENT_ENROLLED",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SubmissionCreated {
    pub submission_id: i32,
    pub assignment_id: i32,
    pub student_id: i32,
    pub classroom_id: Option<i32>,
    pub language: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SubmissionCompleted {
    pub submission_id: i32,
    pub assignment_id: i32,
    pub student_id: i32,
    pub classroom_id: Option<i32>,
    /// Automatic score in points, `None` if grading failed.
    pub score: Option<f64>,
    pub passed_tests: u32,
    pub total_tests: u32,
    pub public_passed_tests: u32,
    pub public_total_tests: u32,
    pub private_passed_tests: u32,
    pub private_total_tests: u32,
    pub average_runtime_ms: Option<f64>,
    pub status: SubmissionStatus,
    pub test_results: Vec<TestResult>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlagiarismDetected {
    pub submission_id: i32,
    pub compared_submission_id: i32,
    pub assignment_id: i32,
    pub classroom_id: Option<i32>,
    pub student_id: Option<i32>,
    pub similarity: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StatisticsCalculated {
    pub assignment_id: i32,
    pub classroom_id: Option<i32>,
    pub snapshot_date: NaiveDate,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GradeUpdated {
    pub submission_id: i32,
    pub assignment_id: i32,
    pub classroom_id: Option<i32>,
    pub final_score: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StudentEnrolled {
    pub enrollment_id: i32,
    pub classroom_id: i32,
    pub student_id: i32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventPayload {
    SubmissionCreated(SubmissionCreated),
    SubmissionCompleted(SubmissionCompleted),
    PlagiarismDetected(PlagiarismDetected),
    StatisticsCalculated(StatisticsCalculated),
    GradeUpdated(GradeUpdated),
    StudentEnrolled(StudentEnrolled),
}

/// An immutable record of something that happened in the pipeline.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DomainEvent {
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub payload: EventPayload,
}

impl DomainEvent {
    pub fn new(payload: impl Into<EventPayload>) -> Self {
        Self {
            timestamp: Utc::now(),
            payload: payload.into(),
        }
    }

    pub fn kind(&self) -> EventKind {
        match &self.payload {
            EventPayload::SubmissionCreated(_) => EventKind::SubmissionCreated,
            EventPayload::SubmissionCompleted(_) => EventKind::SubmissionCompleted,
            EventPayload::PlagiarismDetected(_) => EventKind::PlagiarismDetected,
            EventPayload::StatisticsCalculated(_) => EventKind::StatisticsCalculated,
            EventPayload::GradeUpdated(_) => EventKind::GradeUpdated,
            EventPayload::StudentEnrolled(_) => EventKind::StudentEnrolled,
        }
    }

    pub fn topic(&self) -> &'static str {
        self.kind().topic()
    }

    /// Assignment the event concerns, if any.
    pub fn assignment_id(&self) -> Option<i32> {
        match &self.payload {
            EventPayload::SubmissionCreated(p) => Some(p.assignment_id),
            EventPayload::SubmissionCompleted(p) => Some(p.assignment_id),
            EventPayload::PlagiarismDetected(p) => Some(p.assignment_id),
            EventPayload::StatisticsCalculated(p) => Some(p.assignment_id),
            EventPayload::GradeUpdated(p) => Some(p.assignment_id),
            EventPayload::StudentEnrolled(_) => None,
        }
    }

    /// Classroom carried on the payload. May be absent even when the
    /// assignment belongs to one; subscribers resolve it themselves then.
    pub fn classroom_id(&self) -> Option<i32> {
        match &self.payload {
            EventPayload::SubmissionCreated(p) => p.classroom_id,
            EventPayload::SubmissionCompleted(p) => p.classroom_id,
            EventPayload::PlagiarismDetected(p) => p.classroom_id,
            EventPayload::StatisticsCalculated(p) => p.classroom_id,
            EventPayload::GradeUpdated(p) => p.classroom_id,
            EventPayload::StudentEnrolled(p) => Some(p.classroom_id),
        }
    }
}

impl From<SubmissionCreated> for EventPayload {
    fn from(p: SubmissionCreated) -> Self {
        Self::SubmissionCreated(p)
    }
}

impl From<SubmissionCompleted> for EventPayload {
    fn from(p: SubmissionCompleted) -> Self {
        Self::SubmissionCompleted(p)
    }
}

impl From<PlagiarismDetected> for EventPayload {
    fn from(p: PlagiarismDetected) -> Self {
        Self::PlagiarismDetected(p)
    }
}

impl From<StatisticsCalculated> for EventPayload {
    fn from(p: StatisticsCalculated) -> Self {
        Self::StatisticsCalculated(p)
    }
}

impl From<GradeUpdated> for EventPayload {
    fn from(p: GradeUpdated) -> Self {
        Self::GradeUpdated(p)
    }
}

impl From<StudentEnrolled> for EventPayload {
    fn from(p: StudentEnrolled) -> Self {
        Self::StudentEnrolled(p)
    }
}

//! Fingerprint exchange with the external similarity service.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use common::event::PlagiarismDetected;
use common::{DomainEvent, EventBus, SubmissionStatus};
use sea_orm::sea_query::OnConflict;
use sea_orm::*;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{error, info, instrument, warn};

use crate::config::PlagiarismConfig;
use crate::entity::{assignment, plagiarism_fingerprint, plagiarism_report, submission};

/// Similarity at or above which a pair is reported.
pub const PLAGIARISM_THRESHOLD: f64 = 0.3;

pub fn is_flagged(similarity: f64) -> bool {
    similarity >= PLAGIARISM_THRESHOLD
}

#[derive(Debug, Error)]
pub enum PlagiarismError {
    #[error("similarity request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("similarity service responded with {0}")]
    Status(reqwest::StatusCode),
    #[error("database error: {0}")]
    Db(#[from] DbErr),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExistingSubmission {
    pub id: i32,
    pub fingerprint: Vec<i64>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SimilarityRequest {
    pub submission_id: i32,
    pub assignment_id: i32,
    pub language: String,
    pub code: String,
    pub existing_submissions: Vec<ExistingSubmission>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SimilarityMatch {
    pub compared_submission: i32,
    pub similarity: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SimilarityResponse {
    #[serde(default)]
    pub fingerprint: Value,
    #[serde(default)]
    pub results: Vec<SimilarityMatch>,
}

/// The external service that fingerprints code and scores it against
/// earlier fingerprints.
#[async_trait]
pub trait SimilarityService: Send + Sync {
    async fn check(&self, request: &SimilarityRequest)
    -> Result<SimilarityResponse, PlagiarismError>;
}

pub struct HttpSimilarityService {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpSimilarityService {
    pub fn new(config: &PlagiarismConfig) -> Result<Self, PlagiarismError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            endpoint: format!("{}/plagiarism/check", config.base_url.trim_end_matches('/')),
        })
    }
}

#[async_trait]
impl SimilarityService for HttpSimilarityService {
    async fn check(
        &self,
        request: &SimilarityRequest,
    ) -> Result<SimilarityResponse, PlagiarismError> {
        let response = self.client.post(&self.endpoint).json(request).send().await?;
        if !response.status().is_success() {
            return Err(PlagiarismError::Status(response.status()));
        }
        Ok(response.json().await?)
    }
}

/// Decode a stored fingerprint. Accepts a JSON array or a `{1,2,3}` /
/// `[1,2,3]` string; unreadable entries become 0.
pub fn normalize_fingerprint(value: &Value) -> Vec<i64> {
    match value {
        Value::Array(items) => items.iter().map(hash_value).collect(),
        Value::String(s) => {
            let trimmed = s.trim();
            let inner = trimmed
                .strip_prefix('{')
                .and_then(|r| r.strip_suffix('}'))
                .or_else(|| trimmed.strip_prefix('[').and_then(|r| r.strip_suffix(']')))
                .unwrap_or(trimmed);
            if inner.trim().is_empty() {
                return vec![];
            }
            inner
                .split(',')
                .map(|n| n.trim().parse::<i64>().unwrap_or(0))
                .collect()
        }
        _ => vec![],
    }
}

fn hash_value(v: &Value) -> i64 {
    match v {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .unwrap_or(0),
        Value::String(s) => s.trim().parse().unwrap_or(0),
        _ => 0,
    }
}

/// Run one check and persist its outcome. Returns the number of flagged pairs.
///
/// Assignments without detection enabled are skipped.
#[instrument(skip(db, service, events))]
pub async fn run_check(
    db: &DatabaseConnection,
    service: &dyn SimilarityService,
    events: &EventBus,
    submission_id: i32,
) -> Result<usize, PlagiarismError> {
    let Some(sub) = submission::Entity::find_by_id(submission_id).one(db).await? else {
        info!(submission_id, "Submission gone before plagiarism check, skipping");
        return Ok(0);
    };

    let assignment = assignment::Entity::find_by_id(sub.assignment_id)
        .one(db)
        .await?;
    let Some(assignment) = assignment.filter(|a| a.plagiarism_detection) else {
        info!(
            submission_id,
            assignment_id = sub.assignment_id,
            "Plagiarism detection disabled, skipping"
        );
        return Ok(0);
    };

    let peer_ids: Vec<i32> = submission::Entity::find()
        .select_only()
        .column(submission::Column::Id)
        .filter(submission::Column::AssignmentId.eq(assignment.id))
        .filter(submission::Column::Status.eq(SubmissionStatus::Completed))
        .filter(submission::Column::Id.ne(submission_id))
        .into_tuple()
        .all(db)
        .await?;

    let existing_submissions: Vec<ExistingSubmission> = if peer_ids.is_empty() {
        vec![]
    } else {
        plagiarism_fingerprint::Entity::find()
            .filter(plagiarism_fingerprint::Column::SubmissionId.is_in(peer_ids))
            .order_by_asc(plagiarism_fingerprint::Column::SubmissionId)
            .all(db)
            .await?
            .into_iter()
            .map(|fp| ExistingSubmission {
                id: fp.submission_id,
                fingerprint: normalize_fingerprint(&fp.fingerprint),
            })
            .collect()
    };

    info!(
        submission_id,
        assignment_id = assignment.id,
        compared = existing_submissions.len(),
        "Requesting similarity check"
    );

    let request = SimilarityRequest {
        submission_id,
        assignment_id: assignment.id,
        language: sub.language.clone(),
        code: sub.code.clone(),
        existing_submissions,
    };
    let response = service.check(&request).await?;

    let now = Utc::now();
    let txn = db.begin().await?;

    // A response without a fingerprint array leaves any stored one in place.
    if response.fingerprint.is_array() {
        plagiarism_fingerprint::Entity::insert(plagiarism_fingerprint::ActiveModel {
            submission_id: Set(submission_id),
            fingerprint: Set(Value::from(normalize_fingerprint(&response.fingerprint))),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        })
        .on_conflict(
            OnConflict::column(plagiarism_fingerprint::Column::SubmissionId)
                .update_columns([
                    plagiarism_fingerprint::Column::Fingerprint,
                    plagiarism_fingerprint::Column::UpdatedAt,
                ])
                .to_owned(),
        )
        .exec_without_returning(&txn)
        .await?;
    } else {
        warn!(submission_id, "Similarity service returned no fingerprint");
    }

    // Keep the best score per peer in case the service repeats one.
    let mut matches: HashMap<i32, f64> = HashMap::new();
    for m in &response.results {
        if m.compared_submission == submission_id {
            continue;
        }
        let best = matches.entry(m.compared_submission).or_insert(m.similarity);
        if m.similarity > *best {
            *best = m.similarity;
        }
    }

    for (&compared_submission_id, &similarity) in &matches {
        plagiarism_report::Entity::insert(plagiarism_report::ActiveModel {
            submission_id: Set(submission_id),
            compared_submission_id: Set(compared_submission_id),
            assignment_id: Set(assignment.id),
            similarity: Set(similarity),
            checked_at: Set(now),
            ..Default::default()
        })
        .on_conflict(
            OnConflict::columns([
                plagiarism_report::Column::SubmissionId,
                plagiarism_report::Column::ComparedSubmissionId,
            ])
            .update_columns([
                plagiarism_report::Column::Similarity,
                plagiarism_report::Column::CheckedAt,
            ])
            .to_owned(),
        )
        .exec_without_returning(&txn)
        .await?;
    }

    txn.commit().await?;

    let mut flagged: Vec<(i32, f64)> = matches
        .into_iter()
        .filter(|(_, similarity)| is_flagged(*similarity))
        .collect();
    flagged.sort_by_key(|(id, _)| *id);

    for &(compared_submission_id, similarity) in &flagged {
        info!(
            submission_id,
            compared_submission_id, similarity, "Plagiarism detected"
        );
        events
            .publish(DomainEvent::new(PlagiarismDetected {
                submission_id,
                compared_submission_id,
                assignment_id: assignment.id,
                classroom_id: assignment.classroom_id,
                student_id: Some(sub.student_id),
                similarity,
            }))
            .await;
    }

    Ok(flagged.len())
}

/// Run [`run_check`] on its own task. Failures are logged, never returned.
pub fn spawn_check(
    db: DatabaseConnection,
    service: Arc<dyn SimilarityService>,
    events: Arc<EventBus>,
    submission_id: i32,
) {
    tokio::spawn(async move {
        if let Err(e) = run_check(&db, service.as_ref(), &events, submission_id).await {
            error!(submission_id, error = %e, "Plagiarism check failed");
        }
    });
}

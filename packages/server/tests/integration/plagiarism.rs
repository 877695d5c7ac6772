use std::time::Duration;

use async_trait::async_trait;
use axum::http::StatusCode;
use common::{DeliveryMode, EventBus};
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter};
use serde_json::{Value, json};
use server::entity::{plagiarism_fingerprint, plagiarism_report, submission};
use server::services::plagiarism::{
    self, PlagiarismError, SimilarityRequest, SimilarityResponse, SimilarityService,
};

use crate::common::{NewAssignment, SIMILARITY_TIMEOUT_SECS, TestApp, routes};

async fn wait_for_fingerprint(app: &TestApp, submission_id: i32) -> plagiarism_fingerprint::Model {
    app.eventually(move || async move {
        plagiarism_fingerprint::Entity::find()
            .filter(plagiarism_fingerprint::Column::SubmissionId.eq(submission_id))
            .one(&app.db)
            .await
            .unwrap()
    })
    .await
}

async fn wait_for_report(app: &TestApp, submission_id: i32) -> plagiarism_report::Model {
    app.eventually(move || async move {
        plagiarism_report::Entity::find()
            .filter(plagiarism_report::Column::SubmissionId.eq(submission_id))
            .one(&app.db)
            .await
            .unwrap()
    })
    .await
}

async fn detecting_assignment(app: &TestApp) -> i32 {
    app.create_assignment(NewAssignment {
        plagiarism_detection: true,
        test_cases: vec![true, true],
        ..Default::default()
    })
    .await
}

#[tokio::test]
async fn similar_pair_is_flagged_and_listed() {
    let app = TestApp::spawn().await;
    let assignment_id = detecting_assignment(&app).await;
    let alice = app.token(1, "student");
    let bob = app.token(2, "student");
    let instructor = app.token(100, "instructor");

    app.similarity
        .respond_with(json!({"fingerprint": [11, 22, 33], "results": []}));
    let first = app
        .submit_and_complete(&alice, assignment_id, "print(input())", 2, 5.0)
        .await;
    wait_for_fingerprint(&app, first).await;

    app.similarity.respond_with(json!({
        "fingerprint": [11, 22, 44],
        "results": [{"compared_submission": first, "similarity": 0.8}]
    }));
    let second = app
        .submit_and_complete(&bob, assignment_id, "print(input( ))", 2, 6.0)
        .await;
    let report = wait_for_report(&app, second).await;
    assert_eq!(report.compared_submission_id, first);
    assert_eq!(report.assignment_id, assignment_id);
    assert_eq!(report.similarity, 0.8);

    let requests = app.similarity.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0]["existing_submissions"], json!([]));
    assert_eq!(requests[1]["submission_id"], second);
    assert_eq!(requests[1]["language"], "python");
    assert_eq!(
        requests[1]["existing_submissions"],
        json!([{"id": first, "fingerprint": [11, 22, 33]}])
    );

    let res = app
        .get_with_token(&routes::plagiarism(second), &instructor)
        .await;
    assert_eq!(res.status, 200, "{}", res.text);
    let data = res.body["data"].as_array().unwrap();
    assert_eq!(data.len(), 1);
    assert_eq!(data[0]["submission_id"], second);
    assert_eq!(data[0]["compared_submission_id"], first);
    assert_eq!(data[0]["similarity"], 0.8);
    assert_eq!(data[0]["flagged"], true);

    // The earlier submission sees the same pair from the other side.
    let res = app
        .get_with_token(&routes::plagiarism(first), &instructor)
        .await;
    assert_eq!(res.body["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn low_similarity_is_stored_unflagged() {
    let app = TestApp::spawn().await;
    let assignment_id = detecting_assignment(&app).await;
    let alice = app.token(1, "student");
    let bob = app.token(2, "student");
    let instructor = app.token(100, "instructor");

    let first = app
        .submit_and_complete(&alice, assignment_id, "print(1)", 2, 5.0)
        .await;
    wait_for_fingerprint(&app, first).await;

    app.similarity.respond_with(json!({
        "fingerprint": [7],
        "results": [{"compared_submission": first, "similarity": 0.2}]
    }));
    let second = app
        .submit_and_complete(&bob, assignment_id, "print(2)", 1, 5.0)
        .await;
    let report = wait_for_report(&app, second).await;
    assert_eq!(report.similarity, 0.2);

    let res = app
        .get_with_token(&routes::plagiarism(second), &instructor)
        .await;
    assert_eq!(res.status, 200);
    assert_eq!(res.body["data"][0]["flagged"], false);
}

#[tokio::test]
async fn self_matches_are_ignored() {
    let app = TestApp::spawn().await;
    let assignment_id = detecting_assignment(&app).await;
    let student = app.token(1, "student");

    // Ids start at 1 in a fresh database, so the first submission is 1.
    app.similarity.respond_with(json!({
        "fingerprint": [1, 2],
        "results": [{"compared_submission": 1, "similarity": 1.0}]
    }));
    let submission_id = app
        .submit_and_complete(&student, assignment_id, "print(1)", 2, 5.0)
        .await;
    assert_eq!(submission_id, 1);
    wait_for_fingerprint(&app, submission_id).await;

    let reports = plagiarism_report::Entity::find()
        .filter(plagiarism_report::Column::SubmissionId.eq(submission_id))
        .filter(plagiarism_report::Column::ComparedSubmissionId.eq(submission_id))
        .all(&app.db)
        .await
        .unwrap();
    assert!(reports.is_empty());
}

#[tokio::test]
async fn disabled_detection_never_calls_service() {
    let app = TestApp::spawn().await;
    let assignment_id = app
        .create_assignment(NewAssignment {
            plagiarism_detection: false,
            test_cases: vec![true],
            ..Default::default()
        })
        .await;
    let student = app.token(1, "student");

    let submission_id = app
        .submit_and_complete(&student, assignment_id, "print(1)", 1, 5.0)
        .await;
    tokio::time::sleep(std::time::Duration::from_millis(300)).await;

    assert!(app.similarity.requests().is_empty());
    let fingerprint = plagiarism_fingerprint::Entity::find()
        .filter(plagiarism_fingerprint::Column::SubmissionId.eq(submission_id))
        .one(&app.db)
        .await
        .unwrap();
    assert!(fingerprint.is_none());
}

#[tokio::test]
async fn students_cannot_view_reports() {
    let app = TestApp::spawn().await;
    let assignment_id = detecting_assignment(&app).await;
    let student = app.token(1, "student");

    let submission_id = app
        .submit_and_complete(&student, assignment_id, "print(1)", 2, 5.0)
        .await;

    let res = app
        .get_with_token(&routes::plagiarism(submission_id), &student)
        .await;
    assert_eq!(res.status, 403);
    assert_eq!(res.body["code"], "PERMISSION_DENIED");
}

async fn report_count(app: &TestApp, submission_id: i32) -> u64 {
    plagiarism_report::Entity::find()
        .filter(plagiarism_report::Column::SubmissionId.eq(submission_id))
        .count(&app.db)
        .await
        .unwrap()
}

async fn assert_graded_without_plagiarism_rows(app: &TestApp, submission_id: i32) {
    let stored = submission::Entity::find_by_id(submission_id)
        .one(&app.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, common::SubmissionStatus::Completed);
    assert!(stored.auto_score.is_some());

    let fingerprint = plagiarism_fingerprint::Entity::find()
        .filter(plagiarism_fingerprint::Column::SubmissionId.eq(submission_id))
        .one(&app.db)
        .await
        .unwrap();
    assert!(fingerprint.is_none());
    assert_eq!(report_count(app, submission_id).await, 0);
}

#[tokio::test]
async fn failing_similarity_service_does_not_affect_grading() {
    let app = TestApp::spawn().await;
    let assignment_id = detecting_assignment(&app).await;
    let student = app.token(1, "student");
    app.similarity.fail_with(StatusCode::INTERNAL_SERVER_ERROR);

    let submission_id = app
        .submit_and_complete(&student, assignment_id, "print(1)", 2, 5.0)
        .await;
    app.eventually(|| {
        let seen = app.similarity.requests().len();
        async move { (seen == 1).then_some(()) }
    })
    .await;
    tokio::time::sleep(Duration::from_millis(200)).await;

    assert_graded_without_plagiarism_rows(&app, submission_id).await;

    let res = app
        .get_with_token(&routes::submit_status(&submission_id.to_string()), &student)
        .await;
    assert_eq!(res.status, 200);
    assert_eq!(res.body["status"], "completed");
    assert_eq!(res.body["grading_status"], "graded");
}

#[tokio::test]
async fn slow_similarity_service_times_out_quietly() {
    let app = TestApp::spawn().await;
    let assignment_id = detecting_assignment(&app).await;
    let student = app.token(1, "student");
    app.similarity
        .delay_by(Duration::from_secs(SIMILARITY_TIMEOUT_SECS + 2));

    let submission_id = app
        .submit_and_complete(&student, assignment_id, "print(1)", 1, 5.0)
        .await;
    tokio::time::sleep(Duration::from_secs(SIMILARITY_TIMEOUT_SECS + 1)).await;

    assert_eq!(app.similarity.requests().len(), 1);
    assert_graded_without_plagiarism_rows(&app, submission_id).await;
}

/// Answers every check with a fixed response.
struct FixedService(SimilarityResponse);

#[async_trait]
impl SimilarityService for FixedService {
    async fn check(
        &self,
        _request: &SimilarityRequest,
    ) -> Result<SimilarityResponse, PlagiarismError> {
        Ok(self.0.clone())
    }
}

#[tokio::test]
async fn response_without_fingerprint_keeps_the_stored_one() {
    let app = TestApp::spawn().await;
    let assignment_id = detecting_assignment(&app).await;
    let student = app.token(1, "student");

    app.similarity
        .respond_with(json!({"fingerprint": [5, 6, 7], "results": []}));
    let submission_id = app
        .submit_and_complete(&student, assignment_id, "print(1)", 2, 5.0)
        .await;
    wait_for_fingerprint(&app, submission_id).await;

    let service = FixedService(SimilarityResponse {
        fingerprint: Value::Null,
        results: vec![],
    });
    let bus = EventBus::new(DeliveryMode::Inline);
    let flagged = plagiarism::run_check(&app.db, &service, &bus, submission_id)
        .await
        .unwrap();
    assert_eq!(flagged, 0);

    let stored = wait_for_fingerprint(&app, submission_id).await;
    assert_eq!(plagiarism::normalize_fingerprint(&stored.fingerprint), vec![5, 6, 7]);
}

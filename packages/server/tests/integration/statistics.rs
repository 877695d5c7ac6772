use serde_json::{Value, json};

use crate::common::{NewAssignment, TestApp, routes};

fn bucket_count(body: &Value, start: i64) -> i64 {
    body["score_distribution"]
        .as_array()
        .unwrap()
        .iter()
        .find(|b| b["start"] == start)
        .map(|b| b["count"].as_i64().unwrap())
        .unwrap_or(0)
}

mod assignment_statistics {
    use super::*;

    #[tokio::test]
    async fn requires_statistics_permission() {
        let app = TestApp::spawn().await;
        let assignment_id = app.create_assignment(NewAssignment::default()).await;
        let student = app.token(1, "student");

        let res = app
            .get_with_token(&routes::assignment_statistics(assignment_id), &student)
            .await;
        assert_eq!(res.status, 403);
    }

    #[tokio::test]
    async fn unknown_assignment_is_404() {
        let app = TestApp::spawn().await;
        let instructor = app.token(100, "instructor");

        let res = app
            .get_with_token(&routes::assignment_statistics(777), &instructor)
            .await;
        assert_eq!(res.status, 404);
    }

    #[tokio::test]
    async fn empty_assignment_has_a_zeroed_snapshot() {
        let app = TestApp::spawn().await;
        let assignment_id = app.create_assignment(NewAssignment::default()).await;
        let instructor = app.token(100, "instructor");

        let res = app
            .get_with_token(&routes::assignment_statistics(assignment_id), &instructor)
            .await;
        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["total_submissions"], 0);
        assert!(res.body["average_score"].is_null());
        assert_eq!(res.body["score_distribution"].as_array().unwrap().len(), 5);
    }

    #[tokio::test]
    async fn snapshot_reflects_completed_submissions() {
        let app = TestApp::spawn().await;
        let assignment_id = app.create_assignment(NewAssignment::default()).await;
        let instructor = app.token(100, "instructor");

        let first = app.token(1, "student");
        app.submit_and_complete(&first, assignment_id, "print(1)", 8, 12.0)
            .await;
        let second = app.token(2, "student");
        app.submit_and_complete(&second, assignment_id, "print(2)", 10, 4.0)
            .await;

        let res = app
            .get_with_token(&routes::assignment_statistics(assignment_id), &instructor)
            .await;
        assert_eq!(res.status, 200);
        assert_eq!(res.body["total_submissions"], 2);
        assert_eq!(res.body["distinct_submitters"], 2);
        assert_eq!(bucket_count(&res.body, 61), 1);
        assert_eq!(bucket_count(&res.body, 81), 1);
        assert_eq!(res.body["attempts"]["max"], 1);
        assert_eq!(res.body["runtime"]["min_ms"], 4.0);
        assert_eq!(res.body["runtime"]["max_ms"], 12.0);
        assert_eq!(res.body["runtime_error_rate"], 0.0);

        let patterns = res.body["error_patterns"].as_array().unwrap();
        assert_eq!(patterns.len(), 1);
        assert_eq!(patterns[0]["error_type"], "WrongAnswer");
        assert_eq!(patterns[0]["occurrences"], 2);

        let most_missed = res.body["most_missed_test_cases"].as_array().unwrap();
        assert_eq!(most_missed[0]["failure_rate"], 50.0);
    }

    #[tokio::test]
    async fn repeated_reads_return_the_same_snapshot() {
        let app = TestApp::spawn().await;
        let assignment_id = app.create_assignment(NewAssignment::default()).await;
        let student = app.token(1, "student");
        app.submit_and_complete(&student, assignment_id, "print(1)", 5, 7.0)
            .await;
        let instructor = app.token(100, "instructor");

        let first = app
            .get_with_token(&routes::assignment_statistics(assignment_id), &instructor)
            .await;
        let second = app
            .get_with_token(&routes::assignment_statistics(assignment_id), &instructor)
            .await;

        assert_eq!(first.body["snapshot_time"], second.body["snapshot_time"]);
        assert_eq!(first.body["score_distribution"], second.body["score_distribution"]);
        assert_eq!(first.body["average_score"], second.body["average_score"]);
    }

    #[tokio::test]
    async fn timeline_and_trend_count_every_attempt() {
        let app = TestApp::spawn().await;
        let assignment_id = app.create_assignment(NewAssignment::default()).await;
        let student = app.token(1, "student");

        for code in ["print(1)", "print(2)", "print(3)"] {
            let res = app.submit(&student, assignment_id, code).await;
            assert_eq!(res.status, 202);
        }

        let instructor = app.token(100, "instructor");
        let res = app
            .get_with_token(&routes::assignment_statistics(assignment_id), &instructor)
            .await;

        let timeline_total: i64 = res.body["timeline"]
            .as_array()
            .unwrap()
            .iter()
            .map(|slot| slot["count"].as_i64().unwrap())
            .sum();
        assert_eq!(timeline_total, 3);

        let trend = res.body["trend"].as_array().unwrap();
        assert_eq!(trend.len(), 1);
        assert_eq!(trend[0]["count"], 3);

        assert_eq!(res.body["total_submissions"], 3);
        assert_eq!(res.body["distinct_submitters"], 1);
        assert_eq!(res.body["attempts"]["max"], 3);
    }

    #[tokio::test]
    async fn manual_grade_updates_score_distribution() {
        let app = TestApp::spawn().await;
        let assignment_id = app
            .create_assignment(NewAssignment {
                grading_method: common::GradingMethod::Manual,
                ..Default::default()
            })
            .await;
        let student = app.token(1, "student");
        let submission_id = app
            .submit_and_complete(&student, assignment_id, "print(1)", 10, 2.0)
            .await;
        let instructor = app.token(100, "instructor");

        let graded = app
            .post_with_token(
                &routes::grade(submission_id),
                &json!({"manual_score": 15.0}),
                &instructor,
            )
            .await;
        assert_eq!(graded.status, 200);

        let res = app
            .get_with_token(&routes::assignment_statistics(assignment_id), &instructor)
            .await;
        assert_eq!(bucket_count(&res.body, 0), 1);
        assert_eq!(res.body["average_score"], 15.0);
    }

    #[tokio::test]
    async fn replaying_completion_leaves_the_snapshot_unchanged() {
        use common::DomainEvent;
        use common::event::SubmissionCompleted;
        use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder};
        use server::entity::{assignment_score_bucket, assignment_statistics};

        let app = TestApp::spawn().await;
        let assignment_id = app.create_assignment(NewAssignment::default()).await;
        let student = app.token(1, "student");
        let submission_id = app
            .submit_and_complete(&student, assignment_id, "print(1)", 8, 12.0)
            .await;

        let load = || async {
            let row = assignment_statistics::Entity::find()
                .filter(assignment_statistics::Column::AssignmentId.eq(assignment_id))
                .one(&app.db)
                .await
                .unwrap()
                .expect("snapshot written on completion");
            let buckets: Vec<(i32, i32)> = assignment_score_bucket::Entity::find()
                .filter(assignment_score_bucket::Column::AssignmentId.eq(assignment_id))
                .order_by_asc(assignment_score_bucket::Column::BucketStart)
                .all(&app.db)
                .await
                .unwrap()
                .into_iter()
                .map(|b| (b.bucket_start, b.count))
                .collect();
            (row, buckets)
        };
        let (before, buckets_before) = load().await;

        let event = DomainEvent::new(SubmissionCompleted {
            submission_id,
            assignment_id,
            student_id: 1,
            classroom_id: None,
            score: Some(78.5),
            passed_tests: 8,
            total_tests: 10,
            public_passed_tests: 8,
            public_total_tests: 10,
            private_passed_tests: 0,
            private_total_tests: 0,
            average_runtime_ms: Some(12.0),
            status: common::SubmissionStatus::Completed,
            test_results: vec![],
        });
        for _ in 0..2 {
            assert_eq!(app.events.dispatch(&event).await, 0);
        }

        let (after, buckets_after) = load().await;
        assert_eq!(
            assignment_statistics::Model {
                snapshot_time: before.snapshot_time,
                ..after
            },
            before
        );
        assert_eq!(buckets_after, buckets_before);
        let rows = assignment_statistics::Entity::find()
            .filter(assignment_statistics::Column::AssignmentId.eq(assignment_id))
            .count(&app.db)
            .await
            .unwrap();
        assert_eq!(rows, 1);
    }
}

mod classroom_statistics {
    use super::*;

    #[tokio::test]
    async fn enrollment_is_idempotent() {
        let app = TestApp::spawn().await;
        let classroom_id = app.create_classroom("CS101").await;
        let instructor = app.token(100, "instructor");

        let first = app
            .post_with_token(
                &routes::enrollments(classroom_id),
                &json!({"student_id": 1}),
                &instructor,
            )
            .await;
        assert_eq!(first.status, 201, "{}", first.text);

        let again = app
            .post_with_token(
                &routes::enrollments(classroom_id),
                &json!({"student_id": 1}),
                &instructor,
            )
            .await;
        assert_eq!(again.status, 201);
        assert_eq!(first.body["id"], again.body["id"]);
    }

    #[tokio::test]
    async fn enrollment_requires_permission_and_classroom() {
        let app = TestApp::spawn().await;
        let classroom_id = app.create_classroom("CS101").await;
        let student = app.token(1, "student");
        let instructor = app.token(100, "instructor");

        let denied = app
            .post_with_token(
                &routes::enrollments(classroom_id),
                &json!({"student_id": 1}),
                &student,
            )
            .await;
        assert_eq!(denied.status, 403);

        let missing = app
            .post_with_token(&routes::enrollments(999), &json!({"student_id": 1}), &instructor)
            .await;
        assert_eq!(missing.status, 404);
    }

    #[tokio::test]
    async fn classroom_snapshot_tracks_students_and_scores() {
        let app = TestApp::spawn().await;
        let classroom_id = app.create_classroom("CS101").await;
        let instructor = app.token(100, "instructor");
        for student_id in [1, 2] {
            let res = app
                .post_with_token(
                    &routes::enrollments(classroom_id),
                    &json!({"student_id": student_id}),
                    &instructor,
                )
                .await;
            assert_eq!(res.status, 201);
        }

        let assignment_id = app
            .create_assignment(NewAssignment {
                classroom_id: Some(classroom_id),
                ..Default::default()
            })
            .await;
        let student = app.token(1, "student");
        app.submit_and_complete(&student, assignment_id, "print(1)", 10, 3.0)
            .await;

        let res = app
            .get_with_token(&routes::classroom_statistics(classroom_id), &instructor)
            .await;
        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["total_students"], 2);
        assert_eq!(res.body["active_students"], 1);
        assert_eq!(res.body["active_student_rate"], 50.0);
        assert_eq!(res.body["dropoff_rate"], 50.0);
        assert_eq!(res.body["total_submissions"], 1);
        assert_eq!(res.body["assignment_completion_rate"], 50.0);
        assert_eq!(res.body["score_distribution"].as_array().unwrap().len(), 11);
        assert_eq!(res.body["language_usage"][0]["language"], "python");
        assert_eq!(res.body["language_usage"][0]["count"], 1);
    }

    #[tokio::test]
    async fn unknown_classroom_is_404() {
        let app = TestApp::spawn().await;
        let instructor = app.token(100, "instructor");

        let res = app
            .get_with_token(&routes::classroom_statistics(31337), &instructor)
            .await;
        assert_eq!(res.status, 404);
    }
}

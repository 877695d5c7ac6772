use common::judge_job::JobMode;
use serde_json::json;

use crate::common::{NewAssignment, TestApp, routes};

mod run_mode {
    use super::*;

    #[tokio::test]
    async fn run_is_queued_and_polled_until_completed() {
        let app = TestApp::spawn().await;
        let res = app
            .post_without_token(
                routes::RUN,
                &json!({
                    "code": "print(sum(map(int, input().split())))",
                    "language": "python",
                    "test_cases": [{"input": "1 2", "expected_output": "3"}],
                }),
            )
            .await;

        assert_eq!(res.status, 202, "{}", res.text);
        let job_id = res.body["job_id"].as_str().unwrap().to_string();
        assert_eq!(res.body["status_url"], routes::run_status(&job_id));

        let job = app.queue.job(&job_id).expect("job hash written");
        assert_eq!(job.data.mode, JobMode::Run);
        assert_eq!(job.data.test_cases.len(), 1);
        assert_eq!(app.queue.queued_job_ids(), vec![job_id.clone()]);

        let pending = app.get_without_token(&routes::run_status(&job_id)).await;
        assert_eq!(pending.status, 200);
        assert_eq!(pending.body["status"], "pending");

        app.queue.put_verdict(
            JobMode::Run,
            &job_id,
            json!({
                "status": "completed",
                "testResults": [
                    {"status": "passed", "actual": "3", "executionTime": 11.6},
                    {"status": "failed", "actual": "4", "executionTime": 13.0},
                ],
            })
            .to_string(),
        );

        let done = app.get_without_token(&routes::run_status(&job_id)).await;
        assert_eq!(done.body["status"], "completed");
        assert_eq!(done.body["metrics"]["passed"], 1);
        assert_eq!(done.body["metrics"]["total"], 2);
        assert_eq!(done.body["metrics"]["average_runtime_ms"], 12.0);
        assert_eq!(done.body["test_results"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn empty_test_cases_are_rejected() {
        let app = TestApp::spawn().await;
        let res = app
            .post_without_token(
                routes::RUN,
                &json!({"code": "print(1)", "language": "python", "test_cases": []}),
            )
            .await;

        assert_eq!(res.status, 400);
        assert_eq!(res.body["code"], "VALIDATION_ERROR");
        assert!(app.queue.queued_job_ids().is_empty());
    }

    #[tokio::test]
    async fn oversized_code_is_rejected() {
        let app = TestApp::spawn().await;
        let res = app
            .post_without_token(
                routes::RUN,
                &json!({
                    "code": "x".repeat(10_001),
                    "language": "python",
                    "test_cases": [{"input": "", "expected_output": ""}],
                }),
            )
            .await;

        assert_eq!(res.status, 400);
        assert_eq!(res.body["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn compile_error_surfaces_error_triple() {
        let app = TestApp::spawn().await;
        app.queue.put_verdict(
            JobMode::Run,
            "job-1",
            json!({
                "status": "compile_error",
                "error": {"errorType": "SyntaxError", "errorMessage": "invalid syntax", "fullError": "line 1"},
            })
            .to_string(),
        );

        let res = app.get_without_token(&routes::run_status("job-1")).await;
        assert_eq!(res.status, 200);
        assert_eq!(res.body["status"], "compile_error");
        assert_eq!(res.body["error"]["errorType"], "SyntaxError");
        assert_eq!(res.body["error"]["fullError"], "line 1");
    }

    #[tokio::test]
    async fn malformed_verdict_is_a_system_error_not_a_500() {
        let app = TestApp::spawn().await;
        app.queue.put_verdict(JobMode::Run, "job-2", "{not json");

        let res = app.get_without_token(&routes::run_status("job-2")).await;
        assert_eq!(res.status, 200);
        assert_eq!(res.body["status"], "system_error");
        assert_eq!(res.body["error"]["errorType"], "MALFORMED_VERDICT");
    }

    #[tokio::test]
    async fn unavailable_store_returns_503() {
        let app = TestApp::spawn().await;
        app.queue.set_ready(false);

        let res = app
            .post_without_token(
                routes::RUN,
                &json!({
                    "code": "print(1)",
                    "language": "python",
                    "test_cases": [{"input": "", "expected_output": "1"}],
                }),
            )
            .await;
        assert_eq!(res.status, 503);
        assert_eq!(res.body["code"], "SERVICE_UNAVAILABLE");
    }
}

mod submit_mode {
    use super::*;

    #[tokio::test]
    async fn requires_authentication() {
        let app = TestApp::spawn().await;
        let assignment_id = app.create_assignment(NewAssignment::default()).await;

        let res = app
            .post_without_token(
                routes::SUBMIT,
                &json!({"assignment_id": assignment_id, "code": "print(1)", "language": "python"}),
            )
            .await;
        assert_eq!(res.status, 401);
        assert_eq!(res.body["code"], "TOKEN_MISSING");
    }

    #[tokio::test]
    async fn requires_submit_permission() {
        let app = TestApp::spawn().await;
        let assignment_id = app.create_assignment(NewAssignment::default()).await;
        let instructor = app.token(100, "instructor");

        let res = app.submit(&instructor, assignment_id, "print(1)").await;
        assert_eq!(res.status, 403);
        assert_eq!(res.body["code"], "PERMISSION_DENIED");
    }

    #[tokio::test]
    async fn submission_is_queued_with_assignment_test_cases() {
        let app = TestApp::spawn().await;
        let assignment_id = app
            .create_assignment(NewAssignment {
                test_cases: vec![true, true, false],
                ..Default::default()
            })
            .await;
        let student = app.token(1, "student");

        let res = app.submit(&student, assignment_id, "print(1)").await;
        assert_eq!(res.status, 202, "{}", res.text);
        let submission_id = res.body["submission_id"].as_i64().unwrap();
        assert_eq!(res.body["job_id"], submission_id.to_string());
        assert!(res.body["remaining_attempts"].is_null());

        let job = app.queue.job(&submission_id.to_string()).unwrap();
        assert_eq!(job.data.mode, JobMode::Submit);
        assert_eq!(job.data.test_cases.len(), 3);
        assert!(!job.data.test_cases[2].is_public);
        assert!(job.data.test_cases.iter().all(|tc| tc.id.is_some()));

        let status = app
            .get_with_token(&routes::submit_status(&submission_id.to_string()), &student)
            .await;
        assert_eq!(status.status, 200);
        assert_eq!(status.body["status"], "pending");
        assert_eq!(status.body["grading_status"], "pending");
    }

    #[tokio::test]
    async fn attempt_cap_blocks_extra_submissions() {
        let app = TestApp::spawn().await;
        let assignment_id = app
            .create_assignment(NewAssignment {
                max_submissions: Some(2),
                ..Default::default()
            })
            .await;
        let student = app.token(1, "student");

        let first = app.submit(&student, assignment_id, "print(1)").await;
        assert_eq!(first.status, 202);
        assert_eq!(first.body["remaining_attempts"], 1);

        let second = app.submit(&student, assignment_id, "print(2)").await;
        assert_eq!(second.status, 202);
        assert_eq!(second.body["remaining_attempts"], 0);

        let third = app.submit(&student, assignment_id, "print(3)").await;
        assert_eq!(third.status, 403);
        assert_eq!(third.body["code"], "ATTEMPTS_EXHAUSTED");

        assert_eq!(app.submission_count(assignment_id).await, 1);
        assert_eq!(app.queue.queued_job_ids().len(), 2);

        let attempts = app
            .get_with_token(&routes::attempts(assignment_id), &student)
            .await;
        assert_eq!(attempts.body["used"], 2);
        assert_eq!(attempts.body["max"], 2);
        assert_eq!(attempts.body["remaining"], 0);
    }

    #[tokio::test]
    async fn resubmission_replaces_previous_submission() {
        let app = TestApp::spawn().await;
        let assignment_id = app.create_assignment(NewAssignment::default()).await;
        let student = app.token(1, "student");

        let first = app.submit(&student, assignment_id, "print('old')").await;
        let first_id = first.body["submission_id"].as_i64().unwrap() as i32;
        let second = app.submit(&student, assignment_id, "print('new')").await;
        let second_id = second.body["submission_id"].as_i64().unwrap() as i32;
        assert_ne!(first_id, second_id);

        assert_eq!(app.submission_count(assignment_id).await, 1);

        let gone = app.get_with_token(&routes::submission(first_id), &student).await;
        assert_eq!(gone.status, 404);

        let current = app.get_with_token(&routes::submission(second_id), &student).await;
        assert_eq!(current.status, 200);
        assert_eq!(current.body["code"], "print('new')");
        assert_eq!(current.body["status"], "queued");
    }

    #[tokio::test]
    async fn different_students_keep_separate_submissions() {
        let app = TestApp::spawn().await;
        let assignment_id = app.create_assignment(NewAssignment::default()).await;

        for student_id in [1, 2] {
            let token = app.token(student_id, "student");
            let res = app.submit(&token, assignment_id, "print(1)").await;
            assert_eq!(res.status, 202);
        }

        assert_eq!(app.submission_count(assignment_id).await, 2);
    }

    #[tokio::test]
    async fn assignment_without_test_cases_is_rejected() {
        let app = TestApp::spawn().await;
        let assignment_id = app
            .create_assignment(NewAssignment {
                test_cases: vec![],
                ..Default::default()
            })
            .await;
        let student = app.token(1, "student");

        let res = app.submit(&student, assignment_id, "print(1)").await;
        assert_eq!(res.status, 400);
        assert_eq!(res.body["code"], "NO_TEST_CASES");

        assert_eq!(app.submission_count(assignment_id).await, 0);
        let attempts = app
            .get_with_token(&routes::attempts(assignment_id), &student)
            .await;
        assert_eq!(attempts.body["used"], 0);
    }

    #[tokio::test]
    async fn unsupported_language_is_rejected() {
        let app = TestApp::spawn().await;
        let assignment_id = app.create_assignment(NewAssignment::default()).await;
        let student = app.token(1, "student");

        let res = app
            .post_with_token(
                routes::SUBMIT,
                &json!({"assignment_id": assignment_id, "code": "+++", "language": "brainfuck"}),
                &student,
            )
            .await;
        assert_eq!(res.status, 400);
        assert_eq!(res.body["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn unknown_assignment_is_404() {
        let app = TestApp::spawn().await;
        let student = app.token(1, "student");

        let res = app.submit(&student, 9999, "print(1)").await;
        assert_eq!(res.status, 404);
        assert_eq!(res.body["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn unavailable_store_returns_503_without_side_effects() {
        let app = TestApp::spawn().await;
        let assignment_id = app.create_assignment(NewAssignment::default()).await;
        let student = app.token(1, "student");
        app.queue.set_ready(false);

        let res = app.submit(&student, assignment_id, "print(1)").await;
        assert_eq!(res.status, 503);
        assert_eq!(res.body["code"], "SERVICE_UNAVAILABLE");
        assert_eq!(app.submission_count(assignment_id).await, 0);
    }

    #[tokio::test]
    async fn other_students_cannot_poll_a_submission() {
        let app = TestApp::spawn().await;
        let assignment_id = app.create_assignment(NewAssignment::default()).await;
        let owner = app.token(1, "student");
        let other = app.token(2, "student");

        let res = app.submit(&owner, assignment_id, "print(1)").await;
        let job_id = res.body["job_id"].as_str().unwrap().to_string();

        let denied = app.get_with_token(&routes::submit_status(&job_id), &other).await;
        assert_eq!(denied.status, 403);

        let instructor = app.token(100, "instructor");
        let allowed = app
            .get_with_token(&routes::submit_status(&job_id), &instructor)
            .await;
        assert_eq!(allowed.status, 200);
    }
}

mod polling {
    use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, QueryOrder};
    use server::entity::{submission, test_result};

    use super::*;

    #[tokio::test]
    async fn run_poll_with_unavailable_store_returns_503() {
        let app = TestApp::spawn().await;
        app.queue.put_verdict(JobMode::Run, "job-9", r#"{"status":"running"}"#);
        app.queue.set_ready(false);

        let res = app.get_without_token(&routes::run_status("job-9")).await;
        assert_eq!(res.status, 503);
        assert_eq!(res.body["code"], "SERVICE_UNAVAILABLE");
    }

    #[tokio::test]
    async fn submit_poll_with_unavailable_store_returns_503_and_keeps_state() {
        let app = TestApp::spawn().await;
        let assignment_id = app.create_assignment(NewAssignment::default()).await;
        let student = app.token(1, "student");

        let res = app.submit(&student, assignment_id, "print(1)").await;
        let submission_id = res.body["submission_id"].as_i64().unwrap() as i32;
        app.complete_job(submission_id, assignment_id, 10, 5.0).await;
        app.queue.set_ready(false);

        let res = app
            .get_with_token(&routes::submit_status(&submission_id.to_string()), &student)
            .await;
        assert_eq!(res.status, 503);
        assert_eq!(res.body["code"], "SERVICE_UNAVAILABLE");

        let stored = submission::Entity::find_by_id(submission_id)
            .one(&app.db)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.status, common::SubmissionStatus::Queued);

        app.queue.set_ready(true);
        let res = app
            .get_with_token(&routes::submit_status(&submission_id.to_string()), &student)
            .await;
        assert_eq!(res.status, 200);
        assert_eq!(res.body["status"], "completed");
    }

    #[tokio::test]
    async fn python_runner_verdict_is_stored_and_graded() {
        let app = TestApp::spawn().await;
        let assignment_id = app
            .create_assignment(NewAssignment {
                test_cases: vec![true, true, false],
                ..Default::default()
            })
            .await;
        let ids = app.test_case_ids(assignment_id).await;
        let student = app.token(1, "student");

        let res = app.submit(&student, assignment_id, "print(1/0)").await;
        let submission_id = res.body["submission_id"].as_i64().unwrap() as i32;

        let job = app.queue.job(&submission_id.to_string()).unwrap();
        let sent: Vec<Option<i32>> = job.data.test_cases.iter().map(|tc| tc.id).collect();
        assert_eq!(sent, ids.iter().copied().map(Some).collect::<Vec<_>>());

        // Ids echoed the way the runner does: numbers or strings.
        app.queue.put_verdict(
            JobMode::Submit,
            &submission_id.to_string(),
            json!({
                "status": "completed",
                "testResults": [
                    {"testCaseId": ids[0], "input": ["0", "0"], "expectedOutput": "0", "isPublic": true,
                     "status": "passed", "actual": "0", "error": null, "executionTime": 10},
                    {"testCaseId": ids[1].to_string(), "input": ["1", "1"], "expectedOutput": "2", "isPublic": true,
                     "status": "runtime_error", "actual": "", "error": "ZeroDivisionError: division by zero",
                     "errorType": "DIVISION_BY_ZERO", "fullError": "ZeroDivisionError: division by zero", "executionTime": 12},
                    {"testCaseId": ids[2].to_string(), "input": ["2", "2"], "expectedOutput": "4", "isPublic": false,
                     "status": "timeout", "actual": null, "error": "Execution timed out after 5 seconds",
                     "errorType": "EXECUTION_TIMEOUT", "executionTime": 5000},
                ],
                "metrics": {"passedTests": 1, "totalTests": 3, "averageRuntime": 1674},
            })
            .to_string(),
        );

        let res = app
            .get_with_token(&routes::submit_status(&submission_id.to_string()), &student)
            .await;
        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["status"], "completed");
        assert_eq!(res.body["metrics"]["passed"], 1);
        assert_eq!(res.body["metrics"]["total"], 3);
        assert_eq!(res.body["grading_status"], "graded");
        assert!(res.body["auto_score"].as_f64().is_some());
        assert_eq!(res.body["test_results"][1]["status"], "runtime_error");
        assert_eq!(res.body["test_results"][2]["status"], "timeout");

        let rows = test_result::Entity::find()
            .filter(test_result::Column::SubmissionId.eq(submission_id))
            .order_by_asc(test_result::Column::Id)
            .all(&app.db)
            .await
            .unwrap();
        let stored_ids: Vec<Option<i32>> = rows.iter().map(|r| r.test_case_id).collect();
        assert_eq!(stored_ids, ids.iter().copied().map(Some).collect::<Vec<_>>());
        assert_eq!(
            rows[1].error_message.as_deref(),
            Some("ZeroDivisionError: division by zero")
        );

        let instructor = app.token(100, "instructor");
        let stats = app
            .get_with_token(&routes::assignment_statistics(assignment_id), &instructor)
            .await;
        let patterns = stats.body["error_patterns"].as_array().unwrap();
        assert_eq!(patterns.len(), 2);
        assert!(patterns.iter().any(|p| p["error_type"] == "DIVISION_BY_ZERO"
            && p["error_message"] == "ZeroDivisionError: division by zero"));
        assert!(patterns.iter().any(|p| p["error_type"] == "EXECUTION_TIMEOUT"));
    }
}

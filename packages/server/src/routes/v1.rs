use utoipa_axum::router::OpenApiRouter;
use utoipa_axum::routes;

use crate::handlers;
use crate::state::AppState;

pub fn routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .nest("/judge", judge_routes())
        .nest("/assignments", assignment_routes())
        .nest("/submissions", submission_routes())
        .nest("/classrooms", classroom_routes())
}

fn judge_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(handlers::judge::run))
        .routes(routes!(handlers::judge::run_status))
        .routes(routes!(handlers::judge::submit))
        .routes(routes!(handlers::judge::submit_status))
}

fn assignment_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(handlers::judge::attempts))
        .routes(routes!(handlers::statistics::assignment_statistics))
}

fn submission_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(handlers::submission::get_submission))
        .routes(routes!(handlers::submission::grade_submission))
        .routes(routes!(handlers::submission::list_plagiarism))
}

fn classroom_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(handlers::statistics::classroom_statistics))
        .routes(routes!(handlers::enrollment::enroll_student))
}

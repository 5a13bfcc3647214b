// src/routes.rs

use axum::{
    Router, http::Method, middleware,
    routing::{get, post, put},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    handlers::{exams, reviewers},
    state::AppState,
    utils::jwt::auth_middleware,
};

/// Assembles the main application router.
///
/// * Public catalog routes, protected exam/attempt routes.
/// * Applies global middleware (Trace, CORS).
/// * Injects global state (pool, config, insight backend).
pub fn create_router(state: AppState) -> Router {
    let origins = [
        "http://localhost:3000".parse().unwrap(),
        "http://127.0.0.1:3000".parse().unwrap(),
    ];

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
        ]);

    let reviewer_routes = Router::new()
        .route("/", get(reviewers::list_reviewers))
        .route("/{id}", get(reviewers::get_reviewer));

    // Route order matters: the /attempts/user/* literals must register
    // before the /attempts/{attempt_id} captures.
    let exam_routes = Router::new()
        .route("/{reviewer_id}/start", post(exams::start_exam))
        .route("/attempts/user/history", get(exams::get_user_history))
        .route(
            "/attempts/user/progress/{reviewer_id}",
            get(exams::get_reviewer_progress),
        )
        .route("/attempts/{attempt_id}", get(exams::get_attempt_result))
        .route(
            "/attempts/{attempt_id}/review",
            get(exams::get_attempt_review),
        )
        .route(
            "/attempts/{attempt_id}/recommendations",
            get(exams::get_recommendations),
        )
        .route("/attempts/{attempt_id}/answer", put(exams::save_answer))
        .route("/attempts/{attempt_id}/pause", put(exams::pause_exam))
        .route("/attempts/{attempt_id}/submit", post(exams::submit_exam))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    Router::new()
        .nest("/api/reviewers", reviewer_routes)
        .nest("/api/exams", exam_routes)
        // Global Middleware (applied from outside in)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

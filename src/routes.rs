// src/routes.rs

use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method, header},
    middleware,
    routing::{delete, get, post, put},
};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

use crate::{
    handlers::{auth, content, courses, exam, files},
    state::AppState,
    utils::jwt::auth_middleware,
};

/// Assembles the main application router.
///
/// * Every `/api` route requires a bearer token.
/// * Stored files are served statically under `/files`.
/// * Applies global middleware (Trace, CORS).
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin([
            HeaderValue::from_static("http://localhost:3000"),
            HeaderValue::from_static("http://127.0.0.1:3000"),
        ])
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    let course_routes = Router::new()
        .route(
            "/{id}/topics",
            post(content::create_topic).get(content::list_topics),
        )
        .route("/{id}/enrollments", post(courses::enroll_student));

    let topic_routes = Router::new()
        .route("/{id}", delete(content::delete_topic))
        .route("/{id}/order", put(content::reorder_topic))
        .route("/{id}/items", post(content::create_item));

    let item_routes = Router::new()
        .route(
            "/{id}",
            put(content::update_item).delete(content::delete_item),
        )
        .route("/{id}/order", put(content::reorder_item))
        .route("/{id}/render", get(content::render_item));

    let exam_routes = Router::new()
        .route("/exams/{id}/attempts", post(exam::start_attempt))
        .route("/exams/{id}/attempts/count", get(exam::attempts_taken))
        .route("/attempts/{id}/submit", post(exam::submit_attempt))
        .route("/responses/{id}/grade", put(exam::grade_response));

    let file_routes = Router::new()
        .route("/", post(files::upload_file))
        .layer(DefaultBodyLimit::max(files::MAX_UPLOAD_BYTES));

    let api_routes = Router::new()
        .route("/auth/refresh", post(auth::refresh_token))
        .nest("/courses", course_routes)
        .nest("/topics", topic_routes)
        .nest("/items", item_routes)
        .nest("/files", file_routes)
        .merge(exam_routes)
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .route("/health", get(|| async { "ok" }))
        .nest("/api", api_routes)
        .nest_service("/files", ServeDir::new(&state.config.upload_dir))
        // Global Middleware (applied from outside in)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}

// src/routes.rs

use axum::{Router, http::Method, middleware, routing::post};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{handlers::exams, state::AppState, utils::jwt::auth_middleware};

/// Assembles the main application router.
///
/// * Mounts the exam submission entry point behind token verification.
/// * Applies global middleware (Trace, CORS).
/// * Injects global state (record store, event bus, config).
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

    let exam_routes = Router::new()
        .route("/submit", post(exams::submit_exam))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    Router::new()
        .nest("/api/exams", exam_routes)
        // Global Middleware (applied from outside in)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

// src/routes.rs

use axum::{
    Router, http::Method, middleware,
    routing::{get, post},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    handlers::{monitor, session},
    state::AppState,
    utils::jwt::auth_middleware,
};

/// Assembles the main application router.
///
/// * All session routes sit behind the candidate-token middleware.
/// * Applies global middleware (Trace, CORS).
/// * Injects global state (registry + collaborators + config).
pub fn create_router(state: AppState) -> Router {
    let origin: axum::http::HeaderValue = state.config.allowed_origin.parse().unwrap();
    let cors = CorsLayer::new()
        .allow_origin([origin])
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
        ]);

    let session_routes = Router::new()
        .route("/", post(session::create_session))
        .route(
            "/{id}",
            get(session::get_session).delete(session::discard_session),
        )
        .route("/{id}/proceed", post(session::proceed))
        .route("/{id}/start", post(session::start))
        .route("/{id}/answer", post(session::select_answer))
        .route("/{id}/next", post(session::next_question))
        .route("/{id}/previous", post(session::previous_question))
        .route("/{id}/submit", post(session::submit))
        .route("/{id}/monitor/presence", post(monitor::report_presence))
        .route("/{id}/monitor/fullscreen", post(monitor::report_fullscreen))
        .route("/{id}/monitor/visibility", post(monitor::report_visibility))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    Router::new()
        .nest("/api/sessions", session_routes)
        // Global Middleware (applied from outside in)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

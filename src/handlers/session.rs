// src/handlers/session.rs

use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::json;
use tokio::time::Instant;
use validator::Validate;

use crate::{
    engine::{
        environment::{ClientEnvironment, ExamEnvironment},
        monitor::SessionRuntime,
        presence::PresenceFeed,
    },
    error::AppError,
    models::{
        question::OptionLabel,
        session::{CandidateRef, SelectAnswerRequest, SessionView},
    },
    state::{AppState, SessionEntry},
};

/// Looks up a session by id and enforces ownership: the session key is
/// the candidate's identifier triple, so only the token that created a
/// session can act on it.
pub(crate) async fn owned_entry(
    state: &AppState,
    id: &str,
    candidate: &CandidateRef,
) -> Result<SessionEntry, AppError> {
    if id != candidate.session_key() {
        return Err(AppError::Forbidden(
            "Session belongs to a different candidate".to_string(),
        ));
    }
    let sessions = state.sessions.read().await;
    sessions
        .get(id)
        .cloned()
        .ok_or_else(|| AppError::NotFound("Session not found".to_string()))
}

async fn render_view(entry: &SessionEntry, id: &str) -> SessionView {
    let session = entry.runtime.lock().await;
    session.view(
        id,
        Instant::now(),
        entry.bridge.fullscreen_held(),
        entry.bridge.camera_active(),
    )
}

/// Creates a new exam session for the verified identifier triple.
///
/// Refuses when the results sink already records an attempt for the
/// triple, or when a session for it is currently hosted.
pub async fn create_session(
    State(state): State<AppState>,
    Extension(candidate): Extension<CandidateRef>,
) -> Result<impl IntoResponse, AppError> {
    if state.results.check_existing_attempt(&candidate).await? {
        return Err(AppError::Conflict(
            "An attempt for this exam is already recorded".to_string(),
        ));
    }

    let key = candidate.session_key();
    let mut sessions = state.sessions.write().await;
    if sessions.contains_key(&key) {
        return Err(AppError::Conflict(
            "A session for this exam is already open".to_string(),
        ));
    }

    let feed = Arc::new(PresenceFeed::new(state.config.presence_staleness()));
    let bridge = Arc::new(ClientEnvironment::new());
    let runtime = SessionRuntime::new(
        candidate,
        state.config.monitor_policy(),
        feed.clone(),
        bridge.clone(),
        state.results.clone(),
    );

    sessions.insert(
        key.clone(),
        SessionEntry {
            runtime,
            feed,
            bridge,
        },
    );
    tracing::info!("Session created for {}", candidate);

    Ok((StatusCode::CREATED, Json(json!({ "id": key }))))
}

/// Read-only projection of the session for the UI layer.
pub async fn get_session(
    State(state): State<AppState>,
    Extension(candidate): Extension<CandidateRef>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let entry = owned_entry(&state, &id, &candidate).await?;
    Ok(Json(render_view(&entry, &id).await))
}

/// Candidate action "proceed": leaves the instructions screen for the
/// camera check.
pub async fn proceed(
    State(state): State<AppState>,
    Extension(candidate): Extension<CandidateRef>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let entry = owned_entry(&state, &id, &candidate).await?;
    entry.runtime.lock().await.proceed()?;
    Ok(Json(render_view(&entry, &id).await))
}

/// Candidate action "start exam": runs the guarded transition into the
/// monitored phase.
pub async fn start(
    State(state): State<AppState>,
    Extension(candidate): Extension<CandidateRef>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let entry = owned_entry(&state, &id, &candidate).await?;
    entry.runtime.clone().start(state.content.as_ref()).await?;
    Ok(Json(render_view(&entry, &id).await))
}

/// Selects an option for the question under the cursor.
pub async fn select_answer(
    State(state): State<AppState>,
    Extension(candidate): Extension<CandidateRef>,
    Path(id): Path<String>,
    Json(payload): Json<SelectAnswerRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;
    let selected = OptionLabel::parse(&payload.selected)
        .ok_or_else(|| AppError::BadRequest("Unknown option label".to_string()))?;

    let entry = owned_entry(&state, &id, &candidate).await?;
    entry.runtime.lock().await.select_answer(selected)?;
    Ok(Json(render_view(&entry, &id).await))
}

pub async fn next_question(
    State(state): State<AppState>,
    Extension(candidate): Extension<CandidateRef>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let entry = owned_entry(&state, &id, &candidate).await?;
    entry.runtime.lock().await.next()?;
    Ok(Json(render_view(&entry, &id).await))
}

pub async fn previous_question(
    State(state): State<AppState>,
    Extension(candidate): Extension<CandidateRef>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let entry = owned_entry(&state, &id, &candidate).await?;
    entry.runtime.lock().await.previous()?;
    Ok(Json(render_view(&entry, &id).await))
}

/// Candidate submit from the last question: scores the sheet and hands
/// the report to the results sink.
pub async fn submit(
    State(state): State<AppState>,
    Extension(candidate): Extension<CandidateRef>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let entry = owned_entry(&state, &id, &candidate).await?;
    entry.runtime.submit().await?;
    Ok(Json(render_view(&entry, &id).await))
}

/// Discards a session: allowed before monitoring starts and after the
/// session has ended, never while the exam is running.
pub async fn discard_session(
    State(state): State<AppState>,
    Extension(candidate): Extension<CandidateRef>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let entry = owned_entry(&state, &id, &candidate).await?;
    entry.runtime.lock().await.can_discard()?;

    // Nothing is armed at this point; dropping the entry releases the
    // session and its mailboxes.
    state.sessions.write().await.remove(&id);
    tracing::info!("Session discarded for {}", candidate);

    Ok(Json(json!({ "discarded": true })))
}

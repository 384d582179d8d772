// src/handlers/monitor.rs

use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use serde::Deserialize;
use serde_json::json;

use crate::{
    engine::{presence::PresenceError, session::HardViolation},
    error::AppError,
    handlers::session::owned_entry,
    models::session::CandidateRef,
    state::AppState,
};

/// One client-reported presence sample: either a detection result or a
/// detector failure, never both.
#[derive(Debug, Deserialize)]
pub struct PresenceReport {
    pub present: Option<bool>,
    pub error: Option<PresenceError>,
}

/// Client-reported fullscreen state edge.
#[derive(Debug, Deserialize)]
pub struct FullscreenReport {
    pub active: bool,
}

/// Client-reported visibility edge of the exam surface.
#[derive(Debug, Deserialize)]
pub struct VisibilityReport {
    pub hidden: bool,
}

/// Ingests a presence sample into the session's feed. The armed engine
/// polls the feed on its own interval; before the exam starts the same
/// feed backs the camera check gate.
pub async fn report_presence(
    State(state): State<AppState>,
    Extension(candidate): Extension<CandidateRef>,
    Path(id): Path<String>,
    Json(report): Json<PresenceReport>,
) -> Result<impl IntoResponse, AppError> {
    let outcome = match (report.present, report.error) {
        (Some(present), None) => Ok(present),
        (None, Some(error)) => Err(error),
        _ => {
            return Err(AppError::BadRequest(
                "Report exactly one of 'present' or 'error'".to_string(),
            ));
        }
    };

    let entry = owned_entry(&state, &id, &candidate).await?;
    entry.bridge.note_camera_started();
    entry.feed.report(outcome);

    Ok(Json(json!({ "recorded": true })))
}

/// Ingests a fullscreen edge. Leaving fullscreen while armed is a hard
/// violation and terminates the session immediately.
pub async fn report_fullscreen(
    State(state): State<AppState>,
    Extension(candidate): Extension<CandidateRef>,
    Path(id): Path<String>,
    Json(report): Json<FullscreenReport>,
) -> Result<impl IntoResponse, AppError> {
    let entry = owned_entry(&state, &id, &candidate).await?;
    entry.bridge.note_fullscreen(report.active);

    let reason = if report.active {
        None
    } else {
        entry
            .runtime
            .report_hard_violation(HardViolation::FullscreenExited)
            .await
    };

    Ok(Json(json!({
        "terminated": reason.is_some(),
        "reason": reason,
    })))
}

/// Ingests a visibility edge. A hidden exam surface while armed is a
/// hard violation and terminates the session immediately.
pub async fn report_visibility(
    State(state): State<AppState>,
    Extension(candidate): Extension<CandidateRef>,
    Path(id): Path<String>,
    Json(report): Json<VisibilityReport>,
) -> Result<impl IntoResponse, AppError> {
    let entry = owned_entry(&state, &id, &candidate).await?;

    let reason = if report.hidden {
        entry
            .runtime
            .report_hard_violation(HardViolation::Backgrounded)
            .await
    } else {
        None
    };

    Ok(Json(json!({
        "terminated": reason.is_some(),
        "reason": reason,
    })))
}

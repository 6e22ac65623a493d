//! Selection handlers
//!
//! GET /api/session, POST /api/session/select, POST /api/session/clear

use axum::{
    extract::{rejection::JsonRejection, State},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::{error::ApiResult, models::CurrentSession, AppState};

/// POST /api/session/select request
#[derive(Debug, Deserialize)]
pub struct SelectRequest {
    #[serde(default)]
    pub item_id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub sku: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// GET /api/session
pub async fn get_current(State(state): State<AppState>) -> Json<CurrentSession> {
    Json(state.session.current().await)
}

/// POST /api/session/select
///
/// Replaces the selection and empties the queue.
pub async fn select_item(
    State(state): State<AppState>,
    payload: Result<Json<SelectRequest>, JsonRejection>,
) -> ApiResult<Json<CurrentSession>> {
    let request = super::parse_json(payload)?;

    state
        .session
        .select(&request.item_id, request.title, request.sku, request.created_at)
        .await?;

    Ok(Json(state.session.current().await))
}

/// POST /api/session/clear
pub async fn clear_selection(State(state): State<AppState>) -> Json<CurrentSession> {
    state.session.clear_selection().await;
    Json(state.session.current().await)
}

/// Build selection routes
pub fn session_routes() -> Router<AppState> {
    Router::new()
        .route("/api/session", get(get_current))
        .route("/api/session/select", post(select_item))
        .route("/api/session/clear", post(clear_selection))
}

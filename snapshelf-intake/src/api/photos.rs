//! Queue handlers
//!
//! GET /api/photos, DELETE /api/photos/*path, POST /api/photos/reorder,
//! GET /preview/*path

use axum::{
    body::Body,
    extract::{rejection::JsonRejection, Path, State},
    http::Request,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower::ServiceExt;
use tower_http::services::ServeFile;

use crate::{error::ApiResult, models::QueuedPhoto, AppState};

/// POST /api/photos/reorder request
#[derive(Debug, Deserialize)]
pub struct ReorderRequest {
    /// Relative paths, first to last; may be partial
    pub order: Vec<String>,
}

/// Queue listing response (also returned after mutations)
#[derive(Debug, Serialize)]
pub struct PhotoListResponse {
    pub photos: Vec<QueuedPhoto>,
}

/// POST /api/photos/reorder response
#[derive(Debug, Serialize)]
pub struct ReorderResponse {
    /// How many supplied paths matched queued photos
    pub matched: usize,
    pub photos: Vec<QueuedPhoto>,
}

/// GET /api/photos
pub async fn list_photos(State(state): State<AppState>) -> Json<PhotoListResponse> {
    Json(PhotoListResponse {
        photos: state.session.list_queued_for_preview().await,
    })
}

/// DELETE /api/photos/*path
///
/// Removes the photo from the queue and deletes the file.
pub async fn remove_photo(
    State(state): State<AppState>,
    Path(relative_path): Path<String>,
) -> ApiResult<Json<PhotoListResponse>> {
    state.session.remove_photo(&relative_path).await?;
    Ok(list_photos(State(state)).await)
}

/// POST /api/photos/reorder
pub async fn reorder_photos(
    State(state): State<AppState>,
    payload: Result<Json<ReorderRequest>, JsonRejection>,
) -> ApiResult<Json<ReorderResponse>> {
    let request = super::parse_json(payload)?;
    let matched = state.session.reorder(&request.order).await?;
    Ok(Json(ReorderResponse {
        matched,
        photos: state.session.list_queued_for_preview().await,
    }))
}

/// GET /preview/*path
///
/// Serves the raw bytes of a queued photo.
pub async fn preview_photo(
    State(state): State<AppState>,
    Path(relative_path): Path<String>,
    request: Request<Body>,
) -> ApiResult<Response> {
    let path = state.session.queued_file(&relative_path).await?;

    let response = match ServeFile::new(path).oneshot(request).await {
        Ok(response) => response.map(Body::new).into_response(),
        Err(never) => match never {},
    };
    Ok(response)
}

/// Build queue routes
pub fn photo_routes() -> Router<AppState> {
    Router::new()
        .route("/api/photos", get(list_photos))
        .route("/api/photos/reorder", post(reorder_photos))
        .route("/api/photos/*path", delete(remove_photo))
        .route("/preview/*path", get(preview_photo))
}

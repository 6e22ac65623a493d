//! Finalize handler
//!
//! POST /api/finalize

use axum::{extract::State, routing::post, Json, Router};

use crate::{
    error::{ApiError, ApiResult},
    models::FinalizeOutcome,
    AppState, SessionError,
};

/// POST /api/finalize
///
/// Normalizes and uploads the queue, then publishes and cleans up. Blocks
/// until the upload finished; warnings report the best-effort steps.
///
/// The pipeline runs on its own task: a client that disconnects mid-upload
/// does not cancel the upload, the disposal of originals or the clear step.
pub async fn finalize(State(state): State<AppState>) -> ApiResult<Json<FinalizeOutcome>> {
    let session = state.session.clone();
    let result = tokio::spawn(async move { session.finalize().await })
        .await
        .map_err(|e| ApiError::Internal(format!("finalize task failed: {}", e)))?;

    match result {
        Ok(outcome) => {
            if let Some(warning) = outcome.warnings.first() {
                state.record_error(warning.to_string()).await;
            }
            Ok(Json(outcome))
        }
        Err(e) => {
            if matches!(e, SessionError::Upstream(_) | SessionError::Io(_)) {
                state.record_error(e.to_string()).await;
            }
            Err(e.into())
        }
    }
}

/// Build finalize routes
pub fn finalize_routes() -> Router<AppState> {
    Router::new().route("/api/finalize", post(finalize))
}

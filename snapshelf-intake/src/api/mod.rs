//! HTTP API handlers for snapshelf-intake
//!
//! JSON front door over the session manager plus SSE and photo previews.

pub mod buildinfo;
pub mod catalog;
pub mod finalize;
pub mod health;
pub mod photos;
pub mod session;
pub mod sse;

pub use catalog::catalog_routes;
pub use finalize::finalize_routes;
pub use health::health_routes;
pub use photos::photo_routes;
pub use session::session_routes;
pub use sse::event_stream;

use axum::extract::rejection::JsonRejection;
use axum::Json;

use crate::error::{ApiError, ApiResult};

/// Unwrap a JSON body, reporting malformed input as `INVALID_REQUEST`
pub(crate) fn parse_json<T>(payload: Result<Json<T>, JsonRejection>) -> ApiResult<T> {
    payload
        .map(|Json(value)| value)
        .map_err(|rejection| ApiError::BadRequest(rejection.body_text()))
}

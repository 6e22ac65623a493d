//! snapshelf-intake library interface
//!
//! Exposes the session manager, its collaborators and the HTTP router so
//! integration tests can drive them directly.

pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod services;
pub mod session;

pub use crate::error::{ApiError, ApiResult, SessionError, SessionResult};
pub use crate::session::SessionManager;

use axum::Router;
use chrono::{DateTime, Utc};
use snapshelf_common::events::EventBus;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::services::CatalogClient;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// The one session for the watched folder
    pub session: Arc<SessionManager>,
    /// Catalog client, used directly for item lookups
    pub catalog: Arc<dyn CatalogClient>,
    /// Event bus for SSE broadcasting
    pub event_bus: EventBus,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
    /// Last error for diagnostic purposes
    pub last_error: Arc<RwLock<Option<String>>>,
}

impl AppState {
    pub fn new(
        session: Arc<SessionManager>,
        catalog: Arc<dyn CatalogClient>,
        event_bus: EventBus,
    ) -> Self {
        Self {
            session,
            catalog,
            event_bus,
            startup_time: Utc::now(),
            last_error: Arc::new(RwLock::new(None)),
        }
    }

    /// Remember an error for `/health`
    pub async fn record_error(&self, message: impl Into<String>) {
        *self.last_error.write().await = Some(message.into());
    }
}

/// Build application router
///
/// CORS is permissive: the UI is served from its own origin.
pub fn build_router(state: AppState) -> Router {
    use axum::routing::get;
    use tower_http::{cors::CorsLayer, trace::TraceLayer};

    Router::new()
        .merge(api::session_routes())
        .merge(api::photo_routes())
        .merge(api::finalize_routes())
        .merge(api::catalog_routes())
        .merge(api::health_routes())
        .route("/events", get(api::event_stream))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

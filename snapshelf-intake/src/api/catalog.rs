//! Catalog lookup handler
//!
//! GET /api/catalog/items?limit=&q=

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::{error::ApiResult, models::CatalogItem, AppState};

pub const DEFAULT_ITEM_LIMIT: usize = 25;
pub const MAX_ITEM_LIMIT: usize = 250;

/// Query parameters for item lookup
#[derive(Debug, Default, Deserialize)]
pub struct ItemQuery {
    pub limit: Option<usize>,
    /// Case-insensitive title/SKU filter
    pub q: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ItemListResponse {
    pub items: Vec<CatalogItem>,
}

/// GET /api/catalog/items
///
/// Recent items that still have no photos, newest first.
pub async fn list_items_missing_photos(
    State(state): State<AppState>,
    Query(query): Query<ItemQuery>,
) -> ApiResult<Json<ItemListResponse>> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_ITEM_LIMIT)
        .clamp(1, MAX_ITEM_LIMIT);

    let items = state
        .catalog
        .list_recent_items_missing_photos(limit, query.q.as_deref())
        .await?;

    tracing::debug!(count = items.len(), limit, "Catalog items listed");
    Ok(Json(ItemListResponse { items }))
}

/// Build catalog routes
pub fn catalog_routes() -> Router<AppState> {
    Router::new().route("/api/catalog/items", get(list_items_missing_photos))
}

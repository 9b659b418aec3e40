//! services/api/src/web/history.rs
//!
//! The caller's own search history.

use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use chrono::{DateTime, Utc};
use pharmacheck_core::domain::NewSearch;
use pharmacheck_core::{Bundle, RenderedView, ResultsView, SearchHistoryEntry, SearchType};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::error::{ApiError, ErrorBody};
use crate::web::auth::MessageResponse;
use crate::web::middleware::AuthUser;
use crate::web::state::AppState;

pub const DEFAULT_HISTORY_LIMIT: i64 = 50;

/// Appends a search with its result snapshot to the caller's history.
/// Failures are logged, not returned.
pub async fn record_search<T: Serialize>(
    state: &AppState,
    caller: &AuthUser,
    query: String,
    search_type: SearchType,
    snapshot: &T,
) {
    let search_data = match serde_json::to_string(snapshot) {
        Ok(json) => Some(json),
        Err(e) => {
            warn!("Failed to serialize {} snapshot for history: {}", search_type.as_str(), e);
            None
        }
    };
    let search = NewSearch {
        user_id: caller.user.user_id,
        query,
        search_type,
        search_data,
    };
    match state.history.append(search).await {
        Ok(entry) => info!(
            search_id = entry.search_id,
            search_type = search_type.as_str(),
            "recorded search"
        ),
        Err(e) => warn!(user_id = %caller.user.user_id, "Failed to record search history: {}", e),
    }
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct HistoryParams {
    /// Defaults to 50.
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl HistoryParams {
    pub fn limit(&self) -> i64 {
        self.limit.unwrap_or(DEFAULT_HISTORY_LIMIT).max(0)
    }

    pub fn offset(&self) -> i64 {
        self.offset.unwrap_or(0).max(0)
    }
}

/// One history entry as listed; the snapshot stays serialized.
#[derive(Serialize, ToSchema)]
pub struct HistoryEntryBody {
    pub search_id: i64,
    pub user_id: Uuid,
    pub query: String,
    #[schema(value_type = String)]
    pub search_type: SearchType,
    pub search_data: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<SearchHistoryEntry> for HistoryEntryBody {
    fn from(entry: SearchHistoryEntry) -> Self {
        Self {
            search_id: entry.search_id,
            user_id: entry.user_id,
            query: entry.query,
            search_type: entry.search_type,
            search_data: entry.search_data,
            created_at: entry.created_at,
        }
    }
}

pub fn entry_bodies(entries: Vec<SearchHistoryEntry>) -> Vec<HistoryEntryBody> {
    entries.into_iter().map(HistoryEntryBody::from).collect()
}

/// A history entry with its snapshot parsed and, for interaction checks,
/// rendered the way the results page showed it.
#[derive(Serialize, ToSchema)]
pub struct HistoryDetail {
    pub search_id: i64,
    pub user_id: Uuid,
    pub query: String,
    #[schema(value_type = String)]
    pub search_type: SearchType,
    #[schema(value_type = Object)]
    pub search_data: Option<serde_json::Value>,
    #[schema(value_type = Object)]
    pub view: Option<RenderedView>,
    pub created_at: DateTime<Utc>,
}

impl From<SearchHistoryEntry> for HistoryDetail {
    fn from(entry: SearchHistoryEntry) -> Self {
        let bundle = entry
            .search_data
            .as_deref()
            .and_then(|raw| serde_json::from_str::<Bundle>(raw).ok());

        let (search_data, view) = match bundle {
            Some(bundle) => {
                let view = ResultsView::new(bundle).render();
                let data = entry
                    .search_data
                    .as_deref()
                    .and_then(|raw| serde_json::from_str(raw).ok());
                (data, Some(view))
            }
            // Not a bundle: keep whatever JSON it is, or the raw text.
            None => {
                let data = entry.search_data.map(|raw| {
                    serde_json::from_str(&raw).unwrap_or(serde_json::Value::String(raw))
                });
                (data, None)
            }
        };

        Self {
            search_id: entry.search_id,
            user_id: entry.user_id,
            query: entry.query,
            search_type: entry.search_type,
            search_data,
            view,
            created_at: entry.created_at,
        }
    }
}

/// GET /users/search_history - The caller's searches, newest first
#[utoipa::path(
    get,
    path = "/users/search_history",
    params(HistoryParams),
    responses(
        (status = 200, description = "History entries", body = [HistoryEntryBody]),
        (status = 401, description = "Authentication required", body = ErrorBody)
    ),
    security(("bearer" = [])),
    tag = "history"
)]
pub async fn list_history_handler(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<AuthUser>,
    Query(params): Query<HistoryParams>,
) -> Result<Json<Vec<HistoryEntryBody>>, ApiError> {
    let entries = state
        .history
        .list(caller.user.user_id, params.limit(), params.offset())
        .await?;
    debug!(count = entries.len(), "listed search history");
    Ok(Json(entry_bodies(entries)))
}

/// GET /users/search_history/{search_id} - One entry with its snapshot rendered
#[utoipa::path(
    get,
    path = "/users/search_history/{search_id}",
    params(("search_id" = i64, Path, description = "History entry id")),
    responses(
        (status = 200, description = "History entry", body = HistoryDetail),
        (status = 404, description = "Search history entry not found", body = ErrorBody)
    ),
    security(("bearer" = [])),
    tag = "history"
)]
pub async fn get_history_handler(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<AuthUser>,
    Path(search_id): Path<i64>,
) -> Result<Json<HistoryDetail>, ApiError> {
    let entry = state.history.get(caller.user.user_id, search_id).await?;
    Ok(Json(HistoryDetail::from(entry)))
}

/// DELETE /users/search_history/{search_id} - Remove one entry
#[utoipa::path(
    delete,
    path = "/users/search_history/{search_id}",
    params(("search_id" = i64, Path, description = "History entry id")),
    responses(
        (status = 200, description = "Entry deleted", body = MessageResponse),
        (status = 404, description = "Search history entry not found", body = ErrorBody)
    ),
    security(("bearer" = [])),
    tag = "history"
)]
pub async fn delete_history_handler(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<AuthUser>,
    Path(search_id): Path<i64>,
) -> Result<Json<MessageResponse>, ApiError> {
    state.history.delete(caller.user.user_id, search_id).await?;
    Ok(MessageResponse::new("Search history entry deleted"))
}

/// DELETE /users/search_history - Remove every entry of the caller
#[utoipa::path(
    delete,
    path = "/users/search_history",
    responses((status = 200, description = "History cleared", body = MessageResponse)),
    security(("bearer" = [])),
    tag = "history"
)]
pub async fn clear_history_handler(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<AuthUser>,
) -> Result<Json<MessageResponse>, ApiError> {
    let removed = state.history.clear(caller.user.user_id).await?;
    info!(user_id = %caller.user.user_id, removed, "cleared search history");
    Ok(MessageResponse::new("Search history cleared"))
}

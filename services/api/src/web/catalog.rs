//! services/api/src/web/catalog.rs
//!
//! Catalog endpoints: autocomplete, single-name search and batch validation.

use axum::{
    extract::{Query, State},
    http::HeaderMap,
    Json,
};
use pharmacheck_core::catalog::normalize_names;
use pharmacheck_core::{CatalogEntry, CatalogKind, SearchType};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::{IntoParams, ToSchema};

use crate::error::{ApiError, ErrorBody};
use crate::web::history::record_search;
use crate::web::middleware::optional_caller;
use crate::web::state::AppState;

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AutocompleteParams {
    /// Partially typed name; fewer than 2 characters returns nothing.
    pub q: Option<String>,
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SearchParams {
    pub input: Option<String>,
}

/// One suggestion or search hit.
#[derive(Serialize, ToSchema)]
pub struct CatalogEntryBody {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generic_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl From<CatalogEntry> for CatalogEntryBody {
    fn from(entry: CatalogEntry) -> Self {
        Self {
            name: entry.name,
            generic_name: entry.generic_name,
            url: entry.url,
        }
    }
}

#[derive(Deserialize, ToSchema)]
pub struct ValidateDrugsRequest {
    #[serde(default)]
    pub drugs: Vec<String>,
}

#[derive(Serialize, ToSchema)]
pub struct ValidDrug {
    pub drug_name: String,
    pub url: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct ValidateDrugsResponse {
    pub valid_drugs: Vec<ValidDrug>,
    pub not_found_drugs: Vec<String>,
}

fn entries(found: Vec<CatalogEntry>) -> Json<Vec<CatalogEntryBody>> {
    Json(found.into_iter().map(CatalogEntryBody::from).collect())
}

fn required_input(params: SearchParams) -> Result<String, ApiError> {
    params
        .input
        .filter(|i| !i.trim().is_empty())
        .ok_or_else(|| ApiError::Validation("input parameter is required".to_string()))
}

/// GET /drugs/autocomplete - Drug name suggestions
#[utoipa::path(
    get,
    path = "/drugs/autocomplete",
    params(AutocompleteParams),
    responses((status = 200, description = "Up to 20 suggestions", body = [CatalogEntryBody])),
    tag = "catalog"
)]
pub async fn drugs_autocomplete_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<AutocompleteParams>,
) -> Result<Json<Vec<CatalogEntryBody>>, ApiError> {
    let query = params.q.unwrap_or_default();
    let found = state.catalog.autocomplete(&query, CatalogKind::Drug).await?;
    Ok(entries(found))
}

/// GET /conditions/autocomplete - Condition name suggestions
#[utoipa::path(
    get,
    path = "/conditions/autocomplete",
    params(AutocompleteParams),
    responses((status = 200, description = "Up to 20 suggestions", body = [CatalogEntryBody])),
    tag = "catalog"
)]
pub async fn conditions_autocomplete_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<AutocompleteParams>,
) -> Result<Json<Vec<CatalogEntryBody>>, ApiError> {
    let query = params.q.unwrap_or_default();
    let found = state
        .catalog
        .autocomplete(&query, CatalogKind::Condition)
        .await?;
    Ok(entries(found))
}

/// GET /search_drugs - Best single drug for a free-text query, or null
#[utoipa::path(
    get,
    path = "/search_drugs",
    params(SearchParams),
    responses(
        (status = 200, description = "Closest drug, null if none", body = CatalogEntryBody),
        (status = 400, description = "Missing input", body = ErrorBody)
    ),
    tag = "catalog"
)]
pub async fn search_drugs_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Option<CatalogEntryBody>>, ApiError> {
    let input = required_input(params)?;
    let found = state.catalog.search_drug(&input).await?;
    Ok(Json(found.map(CatalogEntryBody::from)))
}

/// GET /search_conditions - Matching conditions; an empty list means not found
///
/// Logged to the caller's history as a CONDITION search when a valid token is sent.
#[utoipa::path(
    get,
    path = "/search_conditions",
    params(SearchParams),
    responses(
        (status = 200, description = "Matching conditions", body = [CatalogEntryBody]),
        (status = 400, description = "Missing input", body = ErrorBody)
    ),
    tag = "catalog"
)]
pub async fn search_conditions_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(params): Query<SearchParams>,
) -> Result<Json<Vec<CatalogEntryBody>>, ApiError> {
    let input = required_input(params)?;
    let found = entries(state.catalog.search_conditions(&input).await?);

    if let Some(caller) = optional_caller(&state, &headers).await {
        record_search(&state, &caller, input, SearchType::Condition, &found.0).await;
    }
    Ok(found)
}

/// POST /validate_drugs - Strict, case-insensitive validation of medication names
#[utoipa::path(
    post,
    path = "/validate_drugs",
    request_body = ValidateDrugsRequest,
    responses(
        (status = 200, description = "Validation outcome", body = ValidateDrugsResponse),
        (status = 400, description = "No drugs or too many drugs", body = ErrorBody)
    ),
    tag = "catalog"
)]
pub async fn validate_drugs_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ValidateDrugsRequest>,
) -> Result<Json<ValidateDrugsResponse>, ApiError> {
    // Blanks and case duplicates count once, as in the interaction check
    let drugs = normalize_names(&req.drugs);
    if drugs.is_empty() {
        return Err(ApiError::Validation("drugs parameter is required".to_string()));
    }
    let max = state.config.max_medications;
    if drugs.len() > max {
        return Err(ApiError::Validation(format!("Maximum {} drugs allowed", max)));
    }

    let validation = state.catalog.validate(CatalogKind::Drug, &drugs).await?;
    Ok(Json(ValidateDrugsResponse {
        valid_drugs: validation
            .found
            .into_iter()
            .map(|d| ValidDrug {
                drug_name: d.name,
                url: d.url,
            })
            .collect(),
        not_found_drugs: validation.not_found,
    }))
}

//! services/api/src/web/drug_lookup.rs
//!
//! Single-drug lookups: the stored drug-drug, food and disease records of one
//! active ingredient, served straight from the interaction store.

use axum::{
    extract::{Query, State},
    http::HeaderMap,
    Extension, Json,
};
use pharmacheck_core::{
    DiseaseInteraction, DrugInteraction, DrugProfile, FoodInteraction, SearchType,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::{IntoParams, ToSchema};

use crate::error::{ApiError, ErrorBody};
use crate::web::history::record_search;
use crate::web::middleware::{optional_caller, AuthUser};
use crate::web::state::AppState;

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ActiveIngredientParams {
    /// Drug name, matched exactly and case-insensitively.
    pub active_ingredient: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct AllInteractionsResponse {
    /// Canonical catalog name of the looked-up drug.
    pub drug: String,
    #[schema(value_type = Vec<Object>)]
    pub drug_interactions: Vec<DrugInteraction>,
    #[schema(value_type = Vec<Object>)]
    pub food_interactions: Vec<FoodInteraction>,
    #[schema(value_type = Vec<Object>)]
    pub disease_interactions: Vec<DiseaseInteraction>,
}

impl From<DrugProfile> for AllInteractionsResponse {
    fn from(profile: DrugProfile) -> Self {
        Self {
            drug: profile.drug.name,
            drug_interactions: profile.interactions.drug_drug,
            food_interactions: profile.interactions.food,
            disease_interactions: profile.interactions.disease,
        }
    }
}

/// History snapshot of a per-kind lookup.
#[derive(Serialize)]
struct LookupSnapshot<'a, T> {
    interactions: &'a [T],
    drug: &'a str,
}

async fn load_profile(state: &AppState, params: ActiveIngredientParams) -> Result<DrugProfile, ApiError> {
    let name = params
        .active_ingredient
        .filter(|n| !n.trim().is_empty())
        .ok_or_else(|| ApiError::Validation("active_ingredient parameter is required".to_string()))?;
    Ok(state.aggregator.drug_profile(&name).await?)
}

//=========================================================================================
// Handlers
//=========================================================================================

/// GET /drug_interactions - Drug-drug records of one drug
///
/// Logged to the caller's history as a DRUG search when a valid token is sent.
#[utoipa::path(
    get,
    path = "/drug_interactions",
    params(ActiveIngredientParams),
    responses(
        (status = 200, description = "Drug-drug records", body = [Object]),
        (status = 400, description = "Missing active_ingredient", body = ErrorBody),
        (status = 404, description = "Unknown drug", body = ErrorBody)
    ),
    tag = "drug lookup"
)]
pub async fn drug_interactions_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(params): Query<ActiveIngredientParams>,
) -> Result<Json<Vec<DrugInteraction>>, ApiError> {
    let profile = load_profile(&state, params).await?;
    let interactions = profile.interactions.drug_drug;

    if let Some(caller) = optional_caller(&state, &headers).await {
        let snapshot = LookupSnapshot {
            interactions: &interactions,
            drug: &profile.drug.name,
        };
        record_search(&state, &caller, profile.drug.name.clone(), SearchType::Drug, &snapshot).await;
    }
    Ok(Json(interactions))
}

/// GET /food_interactions - Food and lifestyle records of one drug
#[utoipa::path(
    get,
    path = "/food_interactions",
    params(ActiveIngredientParams),
    responses(
        (status = 200, description = "Food records", body = [Object]),
        (status = 400, description = "Missing active_ingredient", body = ErrorBody),
        (status = 401, description = "Authentication required", body = ErrorBody),
        (status = 404, description = "Unknown drug", body = ErrorBody)
    ),
    security(("bearer" = [])),
    tag = "drug lookup"
)]
pub async fn food_interactions_handler(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<AuthUser>,
    Query(params): Query<ActiveIngredientParams>,
) -> Result<Json<Vec<FoodInteraction>>, ApiError> {
    let profile = load_profile(&state, params).await?;
    let interactions = profile.interactions.food;

    let snapshot = LookupSnapshot {
        interactions: &interactions,
        drug: &profile.drug.name,
    };
    record_search(
        &state,
        &caller,
        profile.drug.name.clone(),
        SearchType::FoodInteraction,
        &snapshot,
    )
    .await;
    Ok(Json(interactions))
}

/// GET /disease_interactions - Disease records of one drug
#[utoipa::path(
    get,
    path = "/disease_interactions",
    params(ActiveIngredientParams),
    responses(
        (status = 200, description = "Disease records", body = [Object]),
        (status = 400, description = "Missing active_ingredient", body = ErrorBody),
        (status = 401, description = "Authentication required", body = ErrorBody),
        (status = 404, description = "Unknown drug", body = ErrorBody)
    ),
    security(("bearer" = [])),
    tag = "drug lookup"
)]
pub async fn disease_interactions_handler(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<AuthUser>,
    Query(params): Query<ActiveIngredientParams>,
) -> Result<Json<Vec<DiseaseInteraction>>, ApiError> {
    let profile = load_profile(&state, params).await?;
    let interactions = profile.interactions.disease;

    let snapshot = LookupSnapshot {
        interactions: &interactions,
        drug: &profile.drug.name,
    };
    record_search(
        &state,
        &caller,
        profile.drug.name.clone(),
        SearchType::DiseaseInteraction,
        &snapshot,
    )
    .await;
    Ok(Json(interactions))
}

/// GET /all_interactions - Every record of one drug, grouped by kind
///
/// Logged to the caller's history as a DRUG search when a valid token is sent.
#[utoipa::path(
    get,
    path = "/all_interactions",
    params(ActiveIngredientParams),
    responses(
        (status = 200, description = "All records of the drug", body = AllInteractionsResponse),
        (status = 400, description = "Missing active_ingredient", body = ErrorBody),
        (status = 404, description = "Unknown drug", body = ErrorBody)
    ),
    tag = "drug lookup"
)]
pub async fn all_interactions_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(params): Query<ActiveIngredientParams>,
) -> Result<Json<AllInteractionsResponse>, ApiError> {
    let body = AllInteractionsResponse::from(load_profile(&state, params).await?);

    if let Some(caller) = optional_caller(&state, &headers).await {
        record_search(&state, &caller, body.drug.clone(), SearchType::Drug, &body).await;
    }
    Ok(Json(body))
}

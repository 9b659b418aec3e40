//! services/api/src/web/interactions.rs
//!
//! The interaction check and the patient-friendly translation endpoints.

use axum::{extract::State, Extension, Json};
use pharmacheck_core::{Bundle, InteractionKind, InteractionQuery, RecordRef, SearchType};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

use crate::error::{ApiError, ErrorBody};
use crate::web::history::record_search;
use crate::web::middleware::AuthUser;
use crate::web::state::AppState;

//=========================================================================================
// Request/Response Types
//=========================================================================================

/// Current medications, as a JSON list or a comma-separated string.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(untagged)]
pub enum MedicationList {
    List(Vec<String>),
    Csv(String),
}

impl MedicationList {
    pub fn into_names(self) -> Vec<String> {
        match self {
            MedicationList::List(names) => names,
            MedicationList::Csv(joined) => joined.split(',').map(str::to_string).collect(),
        }
    }
}

#[derive(Deserialize, ToSchema)]
pub struct CheckInteractionsRequest {
    pub drugs: Option<MedicationList>,
    pub prescribed_drug: Option<String>,
    /// Validated against the catalog when present.
    pub condition: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct TranslateRequest {
    pub professional_description: Option<String>,
    /// Drug-drug record id.
    pub interaction_id: Option<i64>,
    pub food_interaction_id: Option<i64>,
    pub disease_interaction_id: Option<i64>,
}

impl TranslateRequest {
    /// The record the translation is cached on, if any. At most one id may be given.
    fn record(&self) -> Result<Option<RecordRef>, ApiError> {
        let ids = [
            (InteractionKind::DrugDrug, self.interaction_id),
            (InteractionKind::Food, self.food_interaction_id),
            (InteractionKind::Disease, self.disease_interaction_id),
        ];
        let mut given = ids
            .into_iter()
            .filter_map(|(kind, id)| id.map(|id| RecordRef::new(kind, id)));
        let record = given.next();
        if given.next().is_some() {
            return Err(ApiError::Validation(
                "Only one of interaction_id, food_interaction_id and disease_interaction_id may be given"
                    .to_string(),
            ));
        }
        Ok(record)
    }
}

#[derive(Serialize, ToSchema)]
pub struct TranslateResponse {
    pub consumer_description: String,
}

//=========================================================================================
// Handlers
//=========================================================================================

/// POST /check_drug_interactions - Validate the inputs and return the merged interaction bundle
///
/// Every successful check is appended to the caller's search history.
#[utoipa::path(
    post,
    path = "/check_drug_interactions",
    request_body = CheckInteractionsRequest,
    responses(
        (status = 200, description = "Interaction bundle", body = Object),
        (status = 400, description = "Missing or too many medications", body = ErrorBody),
        (status = 401, description = "Authentication required", body = ErrorBody),
        (status = 404, description = "Drug, condition or medications not found", body = ErrorBody)
    ),
    security(("bearer" = [])),
    tag = "interactions"
)]
pub async fn check_interactions_handler(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<AuthUser>,
    Json(req): Json<CheckInteractionsRequest>,
) -> Result<Json<Bundle>, ApiError> {
    let prescribed_drug = req
        .prescribed_drug
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .ok_or_else(|| ApiError::Validation("prescribed_drug is required".to_string()))?;

    let query = InteractionQuery {
        prescribed_drug,
        current_medications: req.drugs.map(MedicationList::into_names).unwrap_or_default(),
        treated_condition: req.condition,
    };
    let bundle = state.aggregator.check_interactions(&query).await?;

    let drugs: Vec<&str> = std::iter::once(bundle.prescribed_drug.as_str())
        .chain(bundle.drugs.iter().map(String::as_str))
        .collect();
    record_search(&state, &caller, drugs.join(", "), SearchType::Interaction, &bundle).await;
    Ok(Json(bundle))
}

/// POST /translate_description - Patient-friendly paraphrase of a professional description
///
/// When a record id is given the description must be that record's stored text;
/// the paraphrase is generated once and cached on the record.
#[utoipa::path(
    post,
    path = "/translate_description",
    request_body = TranslateRequest,
    responses(
        (status = 200, description = "Patient-friendly text", body = TranslateResponse),
        (status = 400, description = "Missing description or text not matching the record", body = ErrorBody),
        (status = 401, description = "Authentication required", body = ErrorBody),
        (status = 404, description = "Unknown record", body = ErrorBody),
        (status = 503, description = "Paraphraser unavailable or timed out", body = ErrorBody)
    ),
    security(("bearer" = [])),
    tag = "interactions"
)]
pub async fn translate_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<TranslateRequest>,
) -> Result<Json<TranslateResponse>, ApiError> {
    let record = req.record()?;
    let description = req
        .professional_description
        .filter(|d| !d.trim().is_empty())
        .ok_or_else(|| {
            ApiError::Validation("professional_description parameter is required".to_string())
        })?;

    let consumer_description = state.translations.translate(record, &description).await?;
    Ok(Json(TranslateResponse {
        consumer_description,
    }))
}

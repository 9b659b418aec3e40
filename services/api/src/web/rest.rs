//! services/api/src/web/rest.rs
//!
//! The health endpoint and the master definition for the OpenAPI document.

use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi, ToSchema,
};

use crate::error::ErrorBody;
use crate::web::{auth, care_team, catalog, drug_lookup, history, interactions};

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        health_handler,
        auth::register_handler,
        auth::login_handler,
        auth::me_handler,
        auth::logout_handler,
        catalog::drugs_autocomplete_handler,
        catalog::conditions_autocomplete_handler,
        catalog::search_drugs_handler,
        catalog::search_conditions_handler,
        catalog::validate_drugs_handler,
        drug_lookup::drug_interactions_handler,
        drug_lookup::food_interactions_handler,
        drug_lookup::disease_interactions_handler,
        drug_lookup::all_interactions_handler,
        interactions::check_interactions_handler,
        interactions::translate_handler,
        history::list_history_handler,
        history::get_history_handler,
        history::delete_history_handler,
        history::clear_history_handler,
        care_team::search_doctors_handler,
        care_team::all_doctors_handler,
        care_team::doctor_patients_handler,
        care_team::remove_patient_handler,
        care_team::patient_history_handler,
        care_team::patient_history_entry_handler,
        care_team::request_doctor_handler,
        care_team::patient_doctors_handler,
        care_team::remove_doctor_handler,
    ),
    components(
        schemas(
            HealthResponse,
            ErrorBody,
            auth::RegisterRequest,
            auth::LoginRequest,
            auth::UserProfile,
            auth::AuthResponse,
            auth::MeResponse,
            auth::MessageResponse,
            catalog::CatalogEntryBody,
            catalog::ValidateDrugsRequest,
            catalog::ValidDrug,
            catalog::ValidateDrugsResponse,
            drug_lookup::AllInteractionsResponse,
            interactions::MedicationList,
            interactions::CheckInteractionsRequest,
            interactions::TranslateRequest,
            interactions::TranslateResponse,
            history::HistoryEntryBody,
            history::HistoryDetail,
            care_team::DoctorSummary,
            care_team::PatientOverview,
            care_team::RequestDoctorRequest,
            care_team::RemoveDoctorRequest,
            care_team::SuccessResponse,
        )
    ),
    modifiers(&BearerAuth),
    tags(
        (name = "PharmaCheck API", description = "Drug, food and disease interaction checks with patient-friendly explanations.")
    )
)]
pub struct ApiDoc;

/// Registers the `bearer` scheme referenced by the protected paths.
struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(HttpBuilder::new().scheme(HttpAuthScheme::Bearer).build()),
            );
        }
    }
}

//=========================================================================================
// Health
//=========================================================================================

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: &'static str,
    pub timestamp: DateTime<Utc>,
}

/// GET /health - Liveness check
#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Service is up", body = HealthResponse)),
    tag = "health"
)]
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        timestamp: Utc::now(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_document_lists_every_route_group() {
        let doc = ApiDoc::openapi();
        let paths = &doc.paths.paths;
        for path in [
            "/health",
            "/auth/login",
            "/drugs/autocomplete",
            "/check_drug_interactions",
            "/translate_description",
            "/food_interactions",
            "/all_interactions",
            "/users/search_history/{search_id}",
            "/doctors/patients/{patient_id}/search_history",
            "/patients/request_doctor",
        ] {
            assert!(paths.contains_key(path), "missing {}", path);
        }
        let components = doc.components.expect("components");
        assert!(components.security_schemes.contains_key("bearer"));
    }
}

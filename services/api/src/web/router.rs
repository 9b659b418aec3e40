//! services/api/src/web/router.rs
//!
//! Builds the complete axum application: public and protected routes, CORS,
//! request tracing and the Swagger UI.

use axum::{
    http::{
        header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
        HeaderValue, Method,
    },
    middleware as axum_middleware,
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::warn;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::web::{
    auth, care_team, catalog, drug_lookup, history, interactions,
    middleware::require_auth,
    rest::{health_handler, ApiDoc},
    state::AppState,
};

fn cors_layer(origin: &str) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE, ACCEPT]);
    match origin.parse::<HeaderValue>() {
        Ok(origin) => cors.allow_origin(origin),
        Err(_) => {
            warn!(origin, "Ignoring invalid CORS origin");
            cors
        }
    }
}

/// The API router without the Swagger UI.
pub fn api_router(state: Arc<AppState>) -> Router {
    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/health", get(health_handler))
        .route("/auth/register", post(auth::register_handler))
        .route("/auth/login", post(auth::login_handler))
        .route("/drugs/autocomplete", get(catalog::drugs_autocomplete_handler))
        .route("/conditions/autocomplete", get(catalog::conditions_autocomplete_handler))
        .route("/search_drugs", get(catalog::search_drugs_handler))
        .route("/search_conditions", get(catalog::search_conditions_handler))
        .route("/validate_drugs", post(catalog::validate_drugs_handler))
        .route("/drug_interactions", get(drug_lookup::drug_interactions_handler))
        .route("/all_interactions", get(drug_lookup::all_interactions_handler))
        .route("/doctors/all", get(care_team::all_doctors_handler));

    // Protected routes (bearer token required)
    let protected_routes = Router::new()
        .route("/auth/me", get(auth::me_handler))
        .route("/auth/logout", post(auth::logout_handler))
        .route("/check_drug_interactions", post(interactions::check_interactions_handler))
        .route("/translate_description", post(interactions::translate_handler))
        .route("/food_interactions", get(drug_lookup::food_interactions_handler))
        .route("/disease_interactions", get(drug_lookup::disease_interactions_handler))
        .route(
            "/users/search_history",
            get(history::list_history_handler).delete(history::clear_history_handler),
        )
        .route(
            "/users/search_history/{search_id}",
            get(history::get_history_handler).delete(history::delete_history_handler),
        )
        .route("/doctors/search", get(care_team::search_doctors_handler))
        .route("/doctors/patients", get(care_team::doctor_patients_handler))
        .route(
            "/doctors/patients/{patient_id}",
            delete(care_team::remove_patient_handler),
        )
        .route(
            "/doctors/patients/{patient_id}/search_history",
            get(care_team::patient_history_handler),
        )
        .route(
            "/doctors/patients/{patient_id}/search_history/{search_id}",
            get(care_team::patient_history_entry_handler),
        )
        .route("/patients/request_doctor", post(care_team::request_doctor_handler))
        .route("/patients/doctors", get(care_team::patient_doctors_handler))
        .route("/patients/my_doctor", delete(care_team::remove_doctor_handler))
        .layer(axum_middleware::from_fn_with_state(state.clone(), require_auth));

    let cors = cors_layer(&state.config.cors_allowed_origin);

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// The full application: the API plus Swagger UI at `/swagger-ui`.
pub fn app_router(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(api_router(state))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::web::state::Ports;
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
    };
    use pharmacheck_core::testing::{
        InMemoryAccounts, InMemoryCatalog, InMemoryInteractions, ScriptedParaphraser,
    };
    use pharmacheck_core::{InteractionKind, RecordRef, Role, SearchType, Severity, User};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    struct Harness {
        router: Router,
        catalog: Arc<InMemoryCatalog>,
        interactions: Arc<InMemoryInteractions>,
        paraphraser: Arc<ScriptedParaphraser>,
        accounts: Arc<InMemoryAccounts>,
    }

    impl Harness {
        fn new() -> Self {
            let config = Config::from_lookup(|name| match name {
                "DATABASE_URL" => Some("postgres://unused".to_string()),
                _ => None,
            })
            .unwrap();

            let catalog = Arc::new(InMemoryCatalog::new());
            catalog.add_drug(1, "Aspirin", Some("acetylsalicylic acid"));
            catalog.add_drug(2, "Warfarin", None);
            catalog.add_drug(3, "Lisinopril", None);
            catalog.add_condition(10, "Hypertension");

            let interactions = Arc::new(InMemoryInteractions::new());
            interactions.add_drug_interaction(
                2,
                100,
                "Aspirin",
                Severity::Major,
                "Increased risk of bleeding.",
            );
            interactions.add_food_interaction(2, 200, "Alcohol (Ethanol)", Severity::Moderate);

            let paraphraser = Arc::new(ScriptedParaphraser::replying("You may bleed more easily."));
            let accounts = Arc::new(InMemoryAccounts::new());

            let ports = Ports {
                catalog: catalog.clone(),
                interactions: interactions.clone(),
                translations: interactions.clone(),
                paraphraser: paraphraser.clone(),
                users: accounts.clone(),
                history: accounts.clone(),
                care_team: accounts.clone(),
            };
            let state = Arc::new(AppState::new(Arc::new(config), ports));

            Self {
                router: api_router(state),
                catalog,
                interactions,
                paraphraser,
                accounts,
            }
        }

        fn login(&self, username: &str, role: Role) -> (User, String) {
            let user = self.accounts.add_user(username, role, "unused-hash");
            let token = self.accounts.issue_token(user.user_id);
            (user, token)
        }

        async fn send(
            &self,
            method: &str,
            uri: &str,
            token: Option<&str>,
            body: Option<Value>,
        ) -> (StatusCode, Value) {
            let mut builder = Request::builder().method(method).uri(uri);
            if let Some(token) = token {
                builder = builder.header("authorization", format!("Bearer {}", token));
            }
            let request = match body {
                Some(body) => builder
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
                None => builder.body(Body::empty()).unwrap(),
            };

            let response = self.router.clone().oneshot(request).await.unwrap();
            let status = response.status();
            let bytes = to_bytes(response.into_body(), 1024 * 1024).await.unwrap();
            let json = if bytes.is_empty() {
                Value::Null
            } else {
                serde_json::from_slice(&bytes).unwrap()
            };
            (status, json)
        }
    }

    #[tokio::test]
    async fn health_is_public() {
        let h = Harness::new();
        let (status, body) = h.send("GET", "/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
    }

    #[tokio::test]
    async fn protected_routes_require_a_valid_token() {
        let h = Harness::new();
        let check = json!({"prescribed_drug": "Aspirin", "drugs": ["Warfarin"]});

        let (status, body) = h
            .send("POST", "/check_drug_interactions", None, Some(check.clone()))
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["code"], "UNAUTHORIZED");

        let (status, _) = h
            .send("POST", "/check_drug_interactions", Some("stale"), Some(check))
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(h.interactions.calls().is_empty());
    }

    #[tokio::test]
    async fn register_login_me_logout() {
        let h = Harness::new();
        let (status, body) = h
            .send(
                "POST",
                "/auth/register",
                None,
                Some(json!({"username": "dana", "email": "dana@example.com", "password": "s3cret"})),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["success"], true);
        assert_eq!(body["user"]["role"], "PATIENT");

        let (status, body) = h
            .send(
                "POST",
                "/auth/login",
                None,
                Some(json!({"username": "dana@example.com", "password": "s3cret"})),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        let token = body["token"].as_str().unwrap().to_string();

        let (status, body) = h.send("GET", "/auth/me", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["user"]["username"], "dana");

        let (status, body) = h.send("POST", "/auth/logout", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Logged out successfully");

        let (status, _) = h.send("GET", "/auth/me", Some(&token), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn expired_sessions_are_refused_and_purged_on_the_next_sign_in() {
        use pharmacheck_core::{AuthSession, UserStore};

        let h = Harness::new();
        let (user, _) = h.login("pat", Role::Patient);
        h.accounts
            .create_auth_session(&AuthSession {
                token: "stale".to_string(),
                user_id: user.user_id,
                expires_at: chrono::Utc::now() - chrono::Duration::minutes(5),
            })
            .await
            .unwrap();
        assert_eq!(h.accounts.session_count(), 2);

        let (status, _) = h.send("GET", "/auth/me", Some("stale"), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = h
            .send(
                "POST",
                "/auth/register",
                None,
                Some(json!({"username": "dana", "email": "dana@example.com", "password": "s3cret"})),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(h.accounts.session_count(), 2);
        assert!(h.accounts.validate_auth_session("stale").await.is_err());
    }

    #[tokio::test]
    async fn bad_credentials_and_duplicate_accounts_are_rejected() {
        let h = Harness::new();
        let register = json!({"username": "dana", "email": "dana@example.com", "password": "s3cret"});
        let (status, _) = h.send("POST", "/auth/register", None, Some(register.clone())).await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, body) = h.send("POST", "/auth/register", None, Some(register)).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"], "Username already exists");

        let (status, body) = h
            .send(
                "POST",
                "/auth/login",
                None,
                Some(json!({"username": "dana", "password": "wrong"})),
            )
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "Invalid username or password");

        let (status, body) = h
            .send(
                "POST",
                "/auth/register",
                None,
                Some(json!({"username": "x", "email": "x@example.com", "password": "p", "role": "NURSE"})),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "VALIDATION_FAILED");
    }

    #[tokio::test]
    async fn autocomplete_and_validation() {
        let h = Harness::new();
        let (_, body) = h.send("GET", "/drugs/autocomplete?q=a", None, None).await;
        assert_eq!(body, json!([]));
        assert!(h.catalog.calls().is_empty());

        let (status, body) = h.send("GET", "/drugs/autocomplete?q=as", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body[0]["name"], "Aspirin");
        assert_eq!(body[0]["generic_name"], "acetylsalicylic acid");

        let (status, body) = h
            .send(
                "POST",
                "/validate_drugs",
                None,
                Some(json!({"drugs": ["warfarin", "Xanadrin123"]})),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["valid_drugs"][0]["drug_name"], "Warfarin");
        assert_eq!(body["not_found_drugs"], json!(["Xanadrin123"]));

        let (status, body) = h
            .send(
                "POST",
                "/validate_drugs",
                None,
                Some(json!({"drugs": ["a", "b", "c", "d", "e", "f"]})),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Maximum 5 drugs allowed");

        let (status, body) = h
            .send(
                "POST",
                "/validate_drugs",
                None,
                Some(json!({"drugs": ["Warfarin", "WARFARIN", " ", "Aspirin", "aspirin", "Lisinopril"]})),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["valid_drugs"].as_array().map(Vec::len), Some(3));

        let (status, _) = h.send("GET", "/search_conditions", None, None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn interaction_check_returns_the_bundle_and_records_history() {
        let h = Harness::new();
        let (user, token) = h.login("pat", Role::Patient);

        let (status, body) = h
            .send(
                "POST",
                "/check_drug_interactions",
                Some(&token),
                Some(json!({
                    "prescribed_drug": "Aspirin",
                    "drugs": "Warfarin",
                    "condition": "Hypertension"
                })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["interactions"].as_array().unwrap().len(), 1);
        assert_eq!(body["interactions"][0]["severity"], "Major");
        assert_eq!(body["interactions"][0]["drug"], "Warfarin ↔ Aspirin");
        assert_eq!(body["food_interactions"].as_array().unwrap().len(), 1);
        assert_eq!(body["disease_interactions"], json!([]));
        assert_eq!(body["condition"], "Hypertension");

        let history = h.accounts.history_of(user.user_id);
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].query, "Aspirin, Warfarin");
        assert_eq!(history[0].search_type, SearchType::Interaction);

        let uri = format!("/users/search_history/{}", history[0].search_id);
        let (status, body) = h.send("GET", &uri, Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["search_data"]["prescribed_drug"], "Aspirin");
        assert_eq!(body["view"]["tabs"][0]["count"], 1);
        assert_eq!(body["view"]["tabs"][1]["label"], "Food Interactions");
    }

    #[tokio::test]
    async fn unknown_medication_is_reported_without_fetching() {
        let h = Harness::new();
        let (_, token) = h.login("pat", Role::Patient);

        let (status, body) = h
            .send(
                "POST",
                "/check_drug_interactions",
                Some(&token),
                Some(json!({"prescribed_drug": "Aspirin", "drugs": ["Warfarin", "Xanadrin123"]})),
            )
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "NOT_FOUND");
        assert_eq!(body["terms"], json!(["Xanadrin123"]));
        assert!(h.interactions.calls().is_empty());

        let (status, body) = h
            .send(
                "POST",
                "/check_drug_interactions",
                Some(&token),
                Some(json!({"drugs": ["Warfarin"]})),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "prescribed_drug is required");
    }

    #[tokio::test]
    async fn single_drug_lookups_return_each_kind() {
        let h = Harness::new();
        h.interactions
            .add_disease_interaction(2, 300, "Liver disease", Severity::Major);

        let (status, body) = h
            .send("GET", "/drug_interactions?active_ingredient=warfarin", None, None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body[0]["name"], "Aspirin");
        assert_eq!(body[0]["professional_description"], "Increased risk of bleeding.");

        let (status, body) = h
            .send("GET", "/all_interactions?active_ingredient=WARFARIN", None, None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["drug"], "Warfarin");
        assert_eq!(body["drug_interactions"].as_array().map(Vec::len), Some(1));
        assert_eq!(body["food_interactions"][0]["interaction_name"], "Alcohol (Ethanol)");
        assert_eq!(body["disease_interactions"][0]["disease_name"], "Liver disease");

        let (status, body) = h
            .send("GET", "/all_interactions?active_ingredient=Xanadrin123", None, None)
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "NOT_FOUND");

        let (status, body) = h.send("GET", "/drug_interactions", None, None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "active_ingredient parameter is required");

        let (status, _) = h
            .send("GET", "/food_interactions?active_ingredient=Warfarin", None, None)
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        let (status, _) = h
            .send("GET", "/disease_interactions?active_ingredient=Warfarin", None, None)
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn lookups_are_recorded_with_their_search_type() {
        let h = Harness::new();
        h.interactions
            .add_disease_interaction(2, 300, "Liver disease", Severity::Major);
        let (user, token) = h.login("pat", Role::Patient);

        for uri in [
            "/food_interactions?active_ingredient=warfarin",
            "/disease_interactions?active_ingredient=warfarin",
            "/drug_interactions?active_ingredient=warfarin",
            "/search_conditions?input=Hyper",
        ] {
            let (status, _) = h.send("GET", uri, Some(&token), None).await;
            assert_eq!(status, StatusCode::OK, "{}", uri);
        }
        // Anonymous lookups leave no trace
        h.send("GET", "/all_interactions?active_ingredient=Warfarin", None, None)
            .await;

        let history = h.accounts.history_of(user.user_id);
        let kinds: Vec<SearchType> = history.iter().map(|e| e.search_type).collect();
        assert_eq!(
            kinds,
            vec![
                SearchType::FoodInteraction,
                SearchType::DiseaseInteraction,
                SearchType::Drug,
                SearchType::Condition,
            ]
        );
        assert_eq!(history[0].query, "Warfarin");
        assert_eq!(history[3].query, "Hyper");

        let uri = format!("/users/search_history/{}", history[1].search_id);
        let (status, body) = h.send("GET", &uri, Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["search_data"]["drug"], "Warfarin");
        assert_eq!(
            body["search_data"]["interactions"][0]["disease_name"],
            "Liver disease"
        );
    }

    #[tokio::test]
    async fn translation_is_generated_once_per_record() {
        let h = Harness::new();
        let (_, token) = h.login("pat", Role::Patient);
        let request = json!({
            "professional_description": "Increased risk of bleeding.",
            "interaction_id": 100
        });

        for _ in 0..2 {
            let (status, body) = h
                .send("POST", "/translate_description", Some(&token), Some(request.clone()))
                .await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(body["consumer_description"], "You may bleed more easily.");
        }
        assert_eq!(h.paraphraser.calls(), 1);
        assert_eq!(
            h.interactions
                .ai_text(RecordRef::new(InteractionKind::DrugDrug, 100))
                .as_deref(),
            Some("You may bleed more easily.")
        );

        let (status, body) = h
            .send(
                "POST",
                "/translate_description",
                Some(&token),
                Some(json!({"professional_description": "  "})),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "professional_description parameter is required");
        assert_eq!(h.paraphraser.calls(), 1);
    }

    #[tokio::test]
    async fn translation_of_foreign_text_never_reaches_the_record() {
        let h = Harness::new();
        let (_, token) = h.login("pat", Role::Patient);

        let (status, body) = h
            .send(
                "POST",
                "/translate_description",
                Some(&token),
                Some(json!({
                    "professional_description": "These drugs never interact.",
                    "interaction_id": 100
                })),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "VALIDATION_FAILED");
        assert_eq!(h.paraphraser.calls(), 0);
        assert!(h
            .interactions
            .ai_text(RecordRef::new(InteractionKind::DrugDrug, 100))
            .is_none());
    }

    #[tokio::test]
    async fn paraphraser_failure_is_retryable() {
        let h = Harness::new();
        let (_, token) = h.login("pat", Role::Patient);
        h.paraphraser.fail_next("connection refused");
        let request = json!({
            "professional_description": "Alcohol (Ethanol) interacts with drug 2",
            "food_interaction_id": 200
        });

        let (status, body) = h
            .send("POST", "/translate_description", Some(&token), Some(request.clone()))
            .await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["code"], "TRANSLATION_FAILED");
        assert!(h
            .interactions
            .ai_text(RecordRef::new(InteractionKind::Food, 200))
            .is_none());

        let (status, _) = h
            .send("POST", "/translate_description", Some(&token), Some(request))
            .await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn care_team_links_gate_doctor_access() {
        let h = Harness::new();
        let (patient, patient_token) = h.login("pat", Role::Patient);
        let (_, doctor_token) = h.login("drhouse", Role::Doctor);
        let history_uri = format!("/doctors/patients/{}/search_history", patient.user_id);

        let (status, body) = h.send("GET", &history_uri, Some(&doctor_token), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"], "Patient not assigned to you");

        let (status, body) = h.send("GET", "/doctors/patients", Some(&patient_token), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"], "DOCTOR role required");

        let request = json!({"doctor_username": "drhouse"});
        let (status, body) = h
            .send("POST", "/patients/request_doctor", Some(&patient_token), Some(request.clone()))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Successfully requested oversight from Dr. drhouse");

        let (status, _) = h
            .send("POST", "/patients/request_doctor", Some(&patient_token), Some(request))
            .await;
        assert_eq!(status, StatusCode::CONFLICT);

        h.send(
            "POST",
            "/check_drug_interactions",
            Some(&patient_token),
            Some(json!({"prescribed_drug": "Aspirin", "drugs": ["Warfarin"]})),
        )
        .await;

        let (status, body) = h.send("GET", &history_uri, Some(&doctor_token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 1);

        let (status, body) = h.send("GET", "/doctors/patients", Some(&doctor_token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body[0]["username"], "pat");
        assert_eq!(body[0]["total_searches"], 1);
        assert_eq!(body[0]["recent_searches"].as_array().unwrap().len(), 1);

        let (status, body) = h.send("GET", "/doctors/search?query=hou", Some(&patient_token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body[0]["username"], "drhouse");

        let uri = format!("/doctors/patients/{}", patient.user_id);
        let (status, _) = h.send("DELETE", &uri, Some(&doctor_token), None).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = h.send("GET", &history_uri, Some(&doctor_token), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn history_can_be_deleted_and_cleared() {
        let h = Harness::new();
        let (_, token) = h.login("pat", Role::Patient);
        let check = json!({"prescribed_drug": "Aspirin", "drugs": ["Warfarin"]});
        for _ in 0..3 {
            h.send("POST", "/check_drug_interactions", Some(&token), Some(check.clone()))
                .await;
        }

        let (_, body) = h.send("GET", "/users/search_history?limit=2", Some(&token), None).await;
        let listed = body.as_array().unwrap();
        assert_eq!(listed.len(), 2);
        let newest = listed[0]["search_id"].as_i64().unwrap();

        let uri = format!("/users/search_history/{}", newest);
        let (status, body) = h.send("DELETE", &uri, Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Search history entry deleted");
        let (status, body) = h.send("GET", &uri, Some(&token), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Search history entry not found");

        let (status, _) = h.send("DELETE", "/users/search_history", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        let (_, body) = h.send("GET", "/users/search_history", Some(&token), None).await;
        assert_eq!(body, json!([]));
    }
}

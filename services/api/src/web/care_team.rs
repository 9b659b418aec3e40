//! services/api/src/web/care_team.rs
//!
//! Doctor-patient links: patients ask a doctor for oversight, doctors review
//! the searches of the patients assigned to them.

use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use futures::future::try_join_all;
use pharmacheck_core::{PortError, Role, User};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::error::{ApiError, ErrorBody};
use crate::web::auth::UserProfile;
use crate::web::history::{entry_bodies, HistoryDetail, HistoryEntryBody, HistoryParams};
use crate::web::middleware::AuthUser;
use crate::web::state::AppState;

const DOCTOR_SEARCH_MIN_LEN: usize = 2;
const DOCTOR_SEARCH_LIMIT: i64 = 10;
const RECENT_SEARCHES: i64 = 5;

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct DoctorSearchParams {
    pub query: Option<String>,
}

/// Minimal doctor listing used for selection.
#[derive(Serialize, ToSchema)]
pub struct DoctorSummary {
    pub user_id: Uuid,
    pub username: String,
}

impl From<User> for DoctorSummary {
    fn from(user: User) -> Self {
        Self {
            user_id: user.user_id,
            username: user.username,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct PatientOverview {
    #[serde(flatten)]
    pub user: UserProfile,
    pub recent_searches: Vec<HistoryEntryBody>,
    pub total_searches: i64,
}

#[derive(Deserialize, ToSchema)]
pub struct RequestDoctorRequest {
    pub doctor_id: Option<Uuid>,
    pub doctor_username: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct RemoveDoctorRequest {
    pub doctor_id: Option<Uuid>,
}

#[derive(Serialize, ToSchema)]
pub struct SuccessResponse {
    pub success: bool,
    pub message: String,
}

impl SuccessResponse {
    fn new(message: impl Into<String>) -> Json<Self> {
        Json(Self {
            success: true,
            message: message.into(),
        })
    }
}

async fn ensure_assigned(state: &AppState, doctor_id: Uuid, patient_id: Uuid) -> Result<(), ApiError> {
    if state.care_team.is_assigned(doctor_id, patient_id).await? {
        Ok(())
    } else {
        Err(ApiError::Forbidden("Patient not assigned to you".to_string()))
    }
}

//=========================================================================================
// Doctor Directory
//=========================================================================================

/// GET /doctors/search - Doctors whose username contains the query
#[utoipa::path(
    get,
    path = "/doctors/search",
    params(DoctorSearchParams),
    responses((status = 200, description = "Up to 10 doctors", body = [DoctorSummary])),
    security(("bearer" = [])),
    tag = "care team"
)]
pub async fn search_doctors_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<DoctorSearchParams>,
) -> Result<Json<Vec<DoctorSummary>>, ApiError> {
    let query = params.query.unwrap_or_default();
    let query = query.trim();
    if query.chars().count() < DOCTOR_SEARCH_MIN_LEN {
        return Ok(Json(Vec::new()));
    }
    let doctors = state
        .care_team
        .search_doctors(query, DOCTOR_SEARCH_LIMIT)
        .await?;
    Ok(Json(doctors.into_iter().map(DoctorSummary::from).collect()))
}

/// GET /doctors/all - Every registered doctor
#[utoipa::path(
    get,
    path = "/doctors/all",
    responses((status = 200, description = "All doctors", body = [DoctorSummary])),
    tag = "care team"
)]
pub async fn all_doctors_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<DoctorSummary>>, ApiError> {
    let doctors = state.care_team.all_doctors().await?;
    Ok(Json(doctors.into_iter().map(DoctorSummary::from).collect()))
}

//=========================================================================================
// Doctor Endpoints
//=========================================================================================

/// GET /doctors/patients - The caller's patients with their recent searches
#[utoipa::path(
    get,
    path = "/doctors/patients",
    responses(
        (status = 200, description = "Assigned patients", body = [PatientOverview]),
        (status = 403, description = "DOCTOR role required", body = ErrorBody)
    ),
    security(("bearer" = [])),
    tag = "care team"
)]
pub async fn doctor_patients_handler(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<AuthUser>,
) -> Result<Json<Vec<PatientOverview>>, ApiError> {
    caller.require(Role::Doctor)?;

    let patients = state.care_team.patients_of(caller.user.user_id).await?;
    let overviews = try_join_all(patients.into_iter().map(|patient| {
        let history = state.history.clone();
        async move {
            let (recent, total) = tokio::try_join!(
                history.list(patient.user_id, RECENT_SEARCHES, 0),
                history.count(patient.user_id)
            )?;
            Ok::<_, PortError>(PatientOverview {
                user: UserProfile::from(patient),
                recent_searches: entry_bodies(recent),
                total_searches: total,
            })
        }
    }))
    .await?;

    Ok(Json(overviews))
}

/// DELETE /doctors/patients/{patient_id} - Stop overseeing a patient
#[utoipa::path(
    delete,
    path = "/doctors/patients/{patient_id}",
    params(("patient_id" = Uuid, Path, description = "Patient user id")),
    responses(
        (status = 200, description = "Patient removed", body = SuccessResponse),
        (status = 403, description = "DOCTOR role required", body = ErrorBody),
        (status = 404, description = "Patient not assigned to this doctor", body = ErrorBody)
    ),
    security(("bearer" = [])),
    tag = "care team"
)]
pub async fn remove_patient_handler(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<AuthUser>,
    Path(patient_id): Path<Uuid>,
) -> Result<Json<SuccessResponse>, ApiError> {
    caller.require(Role::Doctor)?;
    state
        .care_team
        .unassign(caller.user.user_id, patient_id)
        .await?;
    info!(doctor_id = %caller.user.user_id, %patient_id, "doctor removed patient");
    Ok(SuccessResponse::new("Patient removed successfully"))
}

/// GET /doctors/patients/{patient_id}/search_history - An assigned patient's searches
#[utoipa::path(
    get,
    path = "/doctors/patients/{patient_id}/search_history",
    params(
        ("patient_id" = Uuid, Path, description = "Patient user id"),
        HistoryParams
    ),
    responses(
        (status = 200, description = "History entries", body = [HistoryEntryBody]),
        (status = 403, description = "Not a doctor, or patient not assigned", body = ErrorBody)
    ),
    security(("bearer" = [])),
    tag = "care team"
)]
pub async fn patient_history_handler(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<AuthUser>,
    Path(patient_id): Path<Uuid>,
    Query(params): Query<HistoryParams>,
) -> Result<Json<Vec<HistoryEntryBody>>, ApiError> {
    caller.require(Role::Doctor)?;
    ensure_assigned(&state, caller.user.user_id, patient_id).await?;

    let entries = state
        .history
        .list(patient_id, params.limit(), params.offset())
        .await?;
    Ok(Json(entry_bodies(entries)))
}

/// GET /doctors/patients/{patient_id}/search_history/{search_id} - One of an assigned patient's checks, rendered
#[utoipa::path(
    get,
    path = "/doctors/patients/{patient_id}/search_history/{search_id}",
    params(
        ("patient_id" = Uuid, Path, description = "Patient user id"),
        ("search_id" = i64, Path, description = "History entry id")
    ),
    responses(
        (status = 200, description = "History entry", body = HistoryDetail),
        (status = 403, description = "Not a doctor, or patient not assigned", body = ErrorBody),
        (status = 404, description = "Search history entry not found", body = ErrorBody)
    ),
    security(("bearer" = [])),
    tag = "care team"
)]
pub async fn patient_history_entry_handler(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<AuthUser>,
    Path((patient_id, search_id)): Path<(Uuid, i64)>,
) -> Result<Json<HistoryDetail>, ApiError> {
    caller.require(Role::Doctor)?;
    ensure_assigned(&state, caller.user.user_id, patient_id).await?;

    let entry = state.history.get(patient_id, search_id).await?;
    Ok(Json(HistoryDetail::from(entry)))
}

//=========================================================================================
// Patient Endpoints
//=========================================================================================

/// POST /patients/request_doctor - Ask a doctor for oversight
#[utoipa::path(
    post,
    path = "/patients/request_doctor",
    request_body = RequestDoctorRequest,
    responses(
        (status = 200, description = "Doctor assigned", body = SuccessResponse),
        (status = 400, description = "No doctor given", body = ErrorBody),
        (status = 403, description = "PATIENT role required", body = ErrorBody),
        (status = 404, description = "Doctor not found", body = ErrorBody),
        (status = 409, description = "Already assigned", body = ErrorBody)
    ),
    security(("bearer" = [])),
    tag = "care team"
)]
pub async fn request_doctor_handler(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<AuthUser>,
    Json(req): Json<RequestDoctorRequest>,
) -> Result<Json<SuccessResponse>, ApiError> {
    caller.require(Role::Patient)?;

    let username = req
        .doctor_username
        .as_deref()
        .map(str::trim)
        .filter(|u| !u.is_empty());
    let doctor = match (req.doctor_id, username) {
        (Some(id), _) => state.care_team.find_doctor(id).await?,
        (None, Some(username)) => state.care_team.find_doctor_by_username(username).await?,
        (None, None) => {
            return Err(ApiError::Validation(
                "doctor_id or doctor_username is required".to_string(),
            ))
        }
    };

    state
        .care_team
        .assign(doctor.user_id, caller.user.user_id)
        .await
        .map_err(|e| match e {
            PortError::Conflict(_) => {
                PortError::Conflict("You are already assigned to this doctor".to_string())
            }
            other => other,
        })?;

    info!(doctor_id = %doctor.user_id, patient_id = %caller.user.user_id, "patient requested oversight");
    Ok(SuccessResponse::new(format!(
        "Successfully requested oversight from Dr. {}",
        doctor.username
    )))
}

/// GET /patients/doctors - Doctors overseeing the caller
#[utoipa::path(
    get,
    path = "/patients/doctors",
    responses(
        (status = 200, description = "Assigned doctors", body = [UserProfile]),
        (status = 403, description = "PATIENT role required", body = ErrorBody)
    ),
    security(("bearer" = [])),
    tag = "care team"
)]
pub async fn patient_doctors_handler(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<AuthUser>,
) -> Result<Json<Vec<UserProfile>>, ApiError> {
    caller.require(Role::Patient)?;
    let doctors = state.care_team.doctors_of(caller.user.user_id).await?;
    Ok(Json(doctors.into_iter().map(UserProfile::from).collect()))
}

/// DELETE /patients/my_doctor - Leave a doctor's oversight
#[utoipa::path(
    delete,
    path = "/patients/my_doctor",
    request_body = RemoveDoctorRequest,
    responses(
        (status = 200, description = "Doctor removed", body = SuccessResponse),
        (status = 400, description = "No doctor given", body = ErrorBody),
        (status = 403, description = "PATIENT role required", body = ErrorBody),
        (status = 404, description = "Not assigned to this doctor", body = ErrorBody)
    ),
    security(("bearer" = [])),
    tag = "care team"
)]
pub async fn remove_doctor_handler(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<AuthUser>,
    Json(req): Json<RemoveDoctorRequest>,
) -> Result<Json<SuccessResponse>, ApiError> {
    caller.require(Role::Patient)?;
    let doctor_id = req
        .doctor_id
        .ok_or_else(|| ApiError::Validation("doctor_id is required".to_string()))?;

    state
        .care_team
        .unassign(doctor_id, caller.user.user_id)
        .await?;
    info!(%doctor_id, patient_id = %caller.user.user_id, "patient left oversight");
    Ok(SuccessResponse::new("Patient removed successfully"))
}

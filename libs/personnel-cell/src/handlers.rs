// libs/personnel-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    Json,
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use serde_json::{json, Value};
use uuid::Uuid;

use notification_cell::{APPOINTMENT_UPDATED, NEW_APPOINTMENT};
use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::{
    AddMedicationRequest, AddNoteRequest, AppointmentListQuery, CareError,
    CreateAppointmentRequest, UpdateAppointmentRequest, ROLE_MEDICAL_PERSONNEL,
};
use crate::services::{
    AppointmentScheduleService, CareInsightsService, PatientRosterService, PregnancyRecordService,
};
use crate::state::AppState;

/// Resolve the caller to a personnel id. Every ownership filter downstream
/// is scoped to this id; the role check alone is never the boundary.
fn personnel_id(user: &User) -> Result<Uuid, AppError> {
    if user.role.as_deref() != Some(ROLE_MEDICAL_PERSONNEL) {
        return Err(AppError::Forbidden(
            "Medical personnel access only".to_string(),
        ));
    }

    Uuid::parse_str(&user.id).map_err(|_| AppError::BadRequest("Invalid personnel id".to_string()))
}

/// Log the detailed cause, surface only a short generic message.
fn internal(action: &str, err: CareError) -> AppError {
    tracing::error!("Failed to {}: {}", action, err);
    AppError::Internal(format!("Unable to {}", action))
}

// ==============================================================================
// SCHEDULE OVERVIEW HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn get_dashboard(
    State(state): State<Arc<AppState>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let caller = personnel_id(&user)?;
    let service = CareInsightsService::new(&state.config);

    let summary = service
        .dashboard(caller, auth.token())
        .await
        .map_err(|e| internal("load the dashboard", e))?;

    Ok(Json(json!({
        "success": true,
        "data": summary
    })))
}

#[axum::debug_handler]
pub async fn get_analytics(
    State(state): State<Arc<AppState>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let caller = personnel_id(&user)?;
    let service = CareInsightsService::new(&state.config);

    let analytics = service
        .analytics(caller, auth.token())
        .await
        .map_err(|e| internal("load analytics", e))?;

    Ok(Json(json!({
        "success": true,
        "data": analytics
    })))
}

// ==============================================================================
// PATIENT HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn list_patients(
    State(state): State<Arc<AppState>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let caller = personnel_id(&user)?;
    let service = PatientRosterService::new(&state.config);

    let patients = service
        .roster(caller, auth.token())
        .await
        .map_err(|e| internal("list patients", e))?;

    Ok(Json(json!({
        "success": true,
        "data": patients
    })))
}

#[axum::debug_handler]
pub async fn get_patient_detail(
    State(state): State<Arc<AppState>>,
    Path(patient_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let caller = personnel_id(&user)?;
    let service = PatientRosterService::new(&state.config);

    let detail = service
        .detail(caller, patient_id, auth.token())
        .await
        .map_err(|e| match e {
            CareError::PatientNotLinked => {
                AppError::Forbidden("No appointment links you to this patient".to_string())
            }
            CareError::PatientNotFound => AppError::NotFound("Patient not found".to_string()),
            other => internal("load patient details", other),
        })?;

    Ok(Json(json!({
        "success": true,
        "data": detail
    })))
}

// ==============================================================================
// APPOINTMENT HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn list_appointments(
    State(state): State<Arc<AppState>>,
    Query(filter): Query<AppointmentListQuery>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let caller = personnel_id(&user)?;
    let service = AppointmentScheduleService::new(&state.config);

    let appointments = service
        .list_for_personnel(caller, &filter, auth.token())
        .await
        .map_err(|e| internal("list appointments", e))?;

    Ok(Json(json!({
        "success": true,
        "data": appointments
    })))
}

#[axum::debug_handler]
pub async fn create_appointment(
    State(state): State<Arc<AppState>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateAppointmentRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let caller = personnel_id(&user)?;
    let service = AppointmentScheduleService::new(&state.config);

    let created = service
        .create(caller, request, auth.token())
        .await
        .map_err(|e| match e {
            CareError::PatientNotFound => AppError::NotFound("Patient not found".to_string()),
            other => internal("create the appointment", other),
        })?;

    state
        .notifier
        .emit(created.appointment.mother_id, NEW_APPOINTMENT, json!(&created))
        .await;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "data": created
        })),
    ))
}

#[axum::debug_handler]
pub async fn update_appointment(
    State(state): State<Arc<AppState>>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<UpdateAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let caller = personnel_id(&user)?;
    let service = AppointmentScheduleService::new(&state.config);

    let updated = service
        .update(caller, appointment_id, &request, auth.token())
        .await
        .map_err(|e| match e {
            CareError::AppointmentNotFound => {
                AppError::NotFound("Appointment not found".to_string())
            }
            other => internal("update the appointment", other),
        })?;

    state
        .notifier
        .emit(updated.appointment.mother_id, APPOINTMENT_UPDATED, json!(&updated))
        .await;

    Ok(Json(json!({
        "success": true,
        "data": updated
    })))
}

// ==============================================================================
// PREGNANCY RECORD HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn add_patient_note(
    State(state): State<Arc<AppState>>,
    Path(patient_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<AddNoteRequest>,
) -> Result<Json<Value>, AppError> {
    let caller = personnel_id(&user)?;
    let service = PregnancyRecordService::new(&state.config);

    let record = service
        .append_note(patient_id, caller, request.content, auth.token())
        .await
        .map_err(|e| match e {
            CareError::RecordNotFound => {
                AppError::NotFound("Pregnancy record not found".to_string())
            }
            other => internal("add the note", other),
        })?;

    Ok(Json(json!({
        "success": true,
        "data": record
    })))
}

#[axum::debug_handler]
pub async fn add_medication(
    State(state): State<Arc<AppState>>,
    Path(patient_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<AddMedicationRequest>,
) -> Result<Json<Value>, AppError> {
    let caller = personnel_id(&user)?;
    let service = PregnancyRecordService::new(&state.config);

    let record = service
        .add_medication(patient_id, caller, request, auth.token())
        .await
        .map_err(|e| match e {
            CareError::RecordNotFound => {
                AppError::NotFound("Pregnancy record not found".to_string())
            }
            other => internal("add the medication", other),
        })?;

    Ok(Json(json!({
        "success": true,
        "data": record
    })))
}

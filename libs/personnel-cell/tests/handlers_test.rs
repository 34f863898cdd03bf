use std::sync::Arc;

use assert_matches::assert_matches;
use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    Json,
};
use axum_extra::TypedHeader;
use chrono::{Duration, Utc};
use headers::{authorization::Bearer, Authorization};
use serde_json::{json, Value};
use uuid::Uuid;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use personnel_cell::handlers::*;
use personnel_cell::models::{
    AddMedicationRequest, AddNoteRequest, AppointmentListQuery, AppointmentStatus,
    CreateAppointmentRequest, UpdateAppointmentRequest,
};
use personnel_cell::state::AppState;
use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;
use shared_utils::test_utils::MockRows;

fn test_state(mock_server: &MockServer) -> Arc<AppState> {
    let config = AppConfig {
        supabase_url: mock_server.uri(),
        supabase_anon_key: "test-anon-key".to_string(),
        supabase_jwt_secret: "test-secret-key-for-jwt-validation-must-be-long-enough".to_string(),
        port: 0,
    };

    Arc::new(AppState::new(config))
}

fn personnel_extension(id: Uuid) -> Extension<User> {
    Extension(User {
        id: id.to_string(),
        email: Some("midwife@example.com".to_string()),
        role: Some("medical_personnel".to_string()),
        metadata: None,
        created_at: Some(Utc::now()),
    })
}

fn mother_extension(id: Uuid) -> Extension<User> {
    Extension(User {
        id: id.to_string(),
        email: Some("amina@example.com".to_string()),
        role: Some("mother".to_string()),
        metadata: None,
        created_at: Some(Utc::now()),
    })
}

fn auth_header() -> TypedHeader<Authorization<Bearer>> {
    TypedHeader(Authorization::bearer("test-access-token").unwrap())
}

// ==============================================================================
// DASHBOARD
// ==============================================================================

#[tokio::test]
async fn dashboard_with_empty_schedule_returns_zeroes() {
    let mock_server = MockServer::start().await;
    let state = test_state(&mock_server);
    let personnel = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    let result = get_dashboard(
        State(state),
        auth_header(),
        personnel_extension(personnel),
    )
    .await;

    let body = result.expect("dashboard should succeed").0;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["today_appointments"], json!([]));
    assert_eq!(body["data"]["upcoming_appointments"], json!([]));
    assert_eq!(body["data"]["total_patients"], 0);
}

#[tokio::test]
async fn dashboard_rejects_non_personnel_callers() {
    let mock_server = MockServer::start().await;
    let state = test_state(&mock_server);

    let result = get_dashboard(
        State(state),
        auth_header(),
        mother_extension(Uuid::new_v4()),
    )
    .await;

    assert_matches!(result, Err(AppError::Forbidden(_)));
}

// ==============================================================================
// APPOINTMENT LISTING
// ==============================================================================

#[tokio::test]
async fn list_appointments_applies_status_filter_and_enriches() {
    let mock_server = MockServer::start().await;
    let state = test_state(&mock_server);
    let personnel = Uuid::new_v4();
    let mother = Uuid::new_v4();
    let appointment_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("status", "eq.confirmed"))
        .and(query_param(
            "medical_personnel_id",
            format!("eq.{}", personnel),
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockRows::appointment_row(
                &appointment_id.to_string(),
                &mother.to_string(),
                &personnel.to_string(),
                "2026-09-01T09:00:00Z",
                "confirmed",
            )
        ])))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/users"))
        .respond_with(ResponseTemplate::new(200)
            .set_body_json(json!([MockRows::mother_row(&mother.to_string())])))
        .mount(&mock_server)
        .await;

    let result = list_appointments(
        State(state),
        Query(AppointmentListQuery {
            status: Some(AppointmentStatus::Confirmed),
            date: None,
        }),
        auth_header(),
        personnel_extension(personnel),
    )
    .await;

    let body = result.expect("listing should succeed").0;
    let data = body["data"].as_array().expect("data is an array");
    assert_eq!(data.len(), 1);
    assert_eq!(data[0]["status"], "confirmed");
    assert_eq!(data[0]["mother"]["full_name"], "Amina Yusuf");
}

// ==============================================================================
// APPOINTMENT CREATION
// ==============================================================================

#[tokio::test]
async fn create_appointment_always_stores_scheduled() {
    let mock_server = MockServer::start().await;
    let state = test_state(&mock_server);
    let personnel = Uuid::new_v4();
    let mother = Uuid::new_v4();
    let appointment_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/users"))
        .and(query_param("role", "eq.mother"))
        .and(query_param("id", format!("eq.{}", mother)))
        .respond_with(ResponseTemplate::new(200)
            .set_body_json(json!([MockRows::mother_row(&mother.to_string())])))
        .mount(&mock_server)
        .await;

    // Only matches when the stored status is `scheduled`.
    Mock::given(method("POST"))
        .and(path("/rest/v1/appointments"))
        .and(body_partial_json(json!({"status": "scheduled"})))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            MockRows::appointment_row(
                &appointment_id.to_string(),
                &mother.to_string(),
                &personnel.to_string(),
                "2026-09-01T09:00:00Z",
                "scheduled",
            )
        ])))
        .mount(&mock_server)
        .await;

    // A caller-supplied status is dropped at deserialization.
    let request: CreateAppointmentRequest = serde_json::from_value(json!({
        "mother_id": mother,
        "appointment_date": "2026-09-01T09:00:00Z",
        "appointment_time": "09:00",
        "appointment_type": "antenatal_checkup",
        "status": "completed"
    }))
    .unwrap();

    let mut receiver = state.notifier.subscribe(mother).await;

    let result = create_appointment(
        State(state),
        auth_header(),
        personnel_extension(personnel),
        Json(request),
    )
    .await;

    let (status, Json(body)) = result.expect("creation should succeed");
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["status"], "scheduled");
    assert_eq!(body["data"]["mother"]["full_name"], "Amina Yusuf");

    let raw = receiver.try_recv().expect("mother should be notified");
    let event: Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(event["event"], "new-appointment");
    assert_eq!(event["payload"]["status"], "scheduled");
}

#[tokio::test]
async fn create_appointment_with_unknown_mother_is_not_found() {
    let mock_server = MockServer::start().await;
    let state = test_state(&mock_server);

    Mock::given(method("GET"))
        .and(path("/rest/v1/users"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    // Nothing may be persisted when validation fails.
    Mock::given(method("POST"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([])))
        .expect(0)
        .mount(&mock_server)
        .await;

    let request = CreateAppointmentRequest {
        mother_id: Uuid::new_v4(),
        appointment_date: Utc::now() + Duration::days(7),
        appointment_time: "09:00".to_string(),
        appointment_type: "antenatal_checkup".to_string(),
        notes: None,
    };

    let result = create_appointment(
        State(state),
        auth_header(),
        personnel_extension(Uuid::new_v4()),
        Json(request),
    )
    .await;

    assert_matches!(result, Err(AppError::NotFound(_)));
}

// ==============================================================================
// APPOINTMENT UPDATES
// ==============================================================================

#[tokio::test]
async fn update_appointment_of_other_personnel_is_not_found() {
    let mock_server = MockServer::start().await;
    let state = test_state(&mock_server);

    // The ownership filter makes a foreign appointment read as absent.
    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(0)
        .mount(&mock_server)
        .await;

    let result = update_appointment(
        State(state),
        Path(Uuid::new_v4()),
        auth_header(),
        personnel_extension(Uuid::new_v4()),
        Json(UpdateAppointmentRequest {
            status: Some(AppointmentStatus::Cancelled),
            notes: None,
            meeting_link: None,
        }),
    )
    .await;

    assert_matches!(result, Err(AppError::NotFound(_)));
}

#[tokio::test]
async fn update_appointment_applies_fields_and_notifies_the_mother() {
    let mock_server = MockServer::start().await;
    let state = test_state(&mock_server);
    let personnel = Uuid::new_v4();
    let mother = Uuid::new_v4();
    let appointment_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("id", format!("eq.{}", appointment_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockRows::appointment_row(
                &appointment_id.to_string(),
                &mother.to_string(),
                &personnel.to_string(),
                "2026-09-01T09:00:00Z",
                "scheduled",
            )
        ])))
        .mount(&mock_server)
        .await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointments"))
        .and(body_partial_json(json!({"status": "confirmed"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockRows::appointment_row(
                &appointment_id.to_string(),
                &mother.to_string(),
                &personnel.to_string(),
                "2026-09-01T09:00:00Z",
                "confirmed",
            )
        ])))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/users"))
        .respond_with(ResponseTemplate::new(200)
            .set_body_json(json!([MockRows::mother_row(&mother.to_string())])))
        .mount(&mock_server)
        .await;

    let mut receiver = state.notifier.subscribe(mother).await;

    let result = update_appointment(
        State(state),
        Path(appointment_id),
        auth_header(),
        personnel_extension(personnel),
        Json(UpdateAppointmentRequest {
            status: Some(AppointmentStatus::Confirmed),
            notes: Some(String::new()),
            meeting_link: None,
        }),
    )
    .await;

    let body = result.expect("update should succeed").0;
    assert_eq!(body["data"]["status"], "confirmed");

    let raw = receiver.try_recv().expect("mother should be notified");
    let event: Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(event["event"], "appointment-updated");
}

// ==============================================================================
// PATIENT DETAIL AND ROSTER
// ==============================================================================

#[tokio::test]
async fn patient_detail_without_linking_appointment_is_forbidden() {
    let mock_server = MockServer::start().await;
    let state = test_state(&mock_server);

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    let result = get_patient_detail(
        State(state),
        Path(Uuid::new_v4()),
        auth_header(),
        personnel_extension(Uuid::new_v4()),
    )
    .await;

    assert_matches!(result, Err(AppError::Forbidden(_)));
}

#[tokio::test]
async fn patient_detail_combines_profile_record_and_history() {
    let mock_server = MockServer::start().await;
    let state = test_state(&mock_server);
    let personnel = Uuid::new_v4();
    let patient = Uuid::new_v4();
    let appointment_id = Uuid::new_v4();
    let record_id = Uuid::new_v4();

    // Link probe.
    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("limit", "1"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!([{"id": appointment_id}])),
        )
        .mount(&mock_server)
        .await;

    // Shared appointment history.
    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("order", "appointment_date.desc,appointment_time.desc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockRows::appointment_row(
                &appointment_id.to_string(),
                &patient.to_string(),
                &personnel.to_string(),
                "2026-07-10T09:00:00Z",
                "completed",
            )
        ])))
        .mount(&mock_server)
        .await;

    // Patient profile.
    Mock::given(method("GET"))
        .and(path("/rest/v1/users"))
        .and(query_param("id", format!("eq.{}", patient)))
        .respond_with(ResponseTemplate::new(200)
            .set_body_json(json!([MockRows::mother_row(&patient.to_string())])))
        .mount(&mock_server)
        .await;

    // Pregnancy record with one medication prescribed by the caller.
    let mut record = MockRows::pregnancy_record_row(&record_id.to_string(), &patient.to_string());
    record["medications"] = json!([{
        "name": "Ferrous sulfate",
        "dosage": "200mg",
        "frequency": "daily",
        "prescribed_by": personnel,
        "start_date": "2026-06-01",
        "end_date": null
    }]);
    Mock::given(method("GET"))
        .and(path("/rest/v1/pregnancy_records"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([record])))
        .mount(&mock_server)
        .await;

    // Prescriber enrichment.
    Mock::given(method("GET"))
        .and(path("/rest/v1/users"))
        .and(query_param("id", format!("in.({})", personnel)))
        .respond_with(ResponseTemplate::new(200)
            .set_body_json(json!([MockRows::personnel_row(&personnel.to_string())])))
        .mount(&mock_server)
        .await;

    let result = get_patient_detail(
        State(state),
        Path(patient),
        auth_header(),
        personnel_extension(personnel),
    )
    .await;

    let body = result.expect("detail should succeed").0;
    let data = &body["data"];
    assert_eq!(data["patient"]["full_name"], "Amina Yusuf");
    assert_eq!(
        data["pregnancy_record"]["medications"][0]["prescriber"]["full_name"],
        "Dr. Niamh Byrne"
    );
    assert_eq!(data["appointments"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn patient_list_keeps_one_entry_per_mother() {
    let mock_server = MockServer::start().await;
    let state = test_state(&mock_server);
    let personnel = Uuid::new_v4();
    let first = Uuid::new_v4();
    let second = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("select", "mother_id"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"mother_id": first},
            {"mother_id": second},
            {"mother_id": first}
        ])))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/users"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockRows::mother_row(&first.to_string()),
            MockRows::mother_row(&second.to_string())
        ])))
        .mount(&mock_server)
        .await;

    let result = list_patients(State(state), auth_header(), personnel_extension(personnel)).await;

    let body = result.expect("roster should succeed").0;
    let data = body["data"].as_array().expect("data is an array");
    assert_eq!(data.len(), 2);
    assert_eq!(data[0]["id"], json!(first));
    assert_eq!(data[1]["id"], json!(second));
}

// ==============================================================================
// PREGNANCY RECORD MUTATIONS
// ==============================================================================

#[tokio::test]
async fn add_note_appends_and_returns_the_record() {
    let mock_server = MockServer::start().await;
    let state = test_state(&mock_server);
    let personnel = Uuid::new_v4();
    let patient = Uuid::new_v4();
    let record_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/pregnancy_records"))
        .and(query_param("mother_id", format!("eq.{}", patient)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockRows::pregnancy_record_row(&record_id.to_string(), &patient.to_string())
        ])))
        .mount(&mock_server)
        .await;

    let mut updated = MockRows::pregnancy_record_row(&record_id.to_string(), &patient.to_string());
    updated["notes"] = json!([{
        "content": "Fundal height on track",
        "author": personnel,
        "created_at": "2026-08-07T10:00:00Z"
    }]);
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/pregnancy_records"))
        .and(query_param("id", format!("eq.{}", record_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([updated])))
        .mount(&mock_server)
        .await;

    let result = add_patient_note(
        State(state),
        Path(patient),
        auth_header(),
        personnel_extension(personnel),
        Json(AddNoteRequest {
            content: "Fundal height on track".to_string(),
        }),
    )
    .await;

    let body = result.expect("note append should succeed").0;
    let notes = body["data"]["notes"].as_array().expect("notes is an array");
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0]["author"], json!(personnel));
}

#[tokio::test]
async fn add_note_without_a_record_is_not_found() {
    let mock_server = MockServer::start().await;
    let state = test_state(&mock_server);

    Mock::given(method("GET"))
        .and(path("/rest/v1/pregnancy_records"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    let result = add_patient_note(
        State(state),
        Path(Uuid::new_v4()),
        auth_header(),
        personnel_extension(Uuid::new_v4()),
        Json(AddNoteRequest {
            content: "Fundal height on track".to_string(),
        }),
    )
    .await;

    assert_matches!(result, Err(AppError::NotFound(_)));
}

#[tokio::test]
async fn add_medication_enriches_the_prescriber() {
    let mock_server = MockServer::start().await;
    let state = test_state(&mock_server);
    let personnel = Uuid::new_v4();
    let patient = Uuid::new_v4();
    let record_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/pregnancy_records"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockRows::pregnancy_record_row(&record_id.to_string(), &patient.to_string())
        ])))
        .mount(&mock_server)
        .await;

    let mut updated = MockRows::pregnancy_record_row(&record_id.to_string(), &patient.to_string());
    updated["medications"] = json!([{
        "name": "Folic acid",
        "dosage": "400mcg",
        "frequency": "daily",
        "prescribed_by": personnel,
        "start_date": "2026-08-07",
        "end_date": null
    }]);
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/pregnancy_records"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([updated])))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/users"))
        .respond_with(ResponseTemplate::new(200)
            .set_body_json(json!([MockRows::personnel_row(&personnel.to_string())])))
        .mount(&mock_server)
        .await;

    let result = add_medication(
        State(state),
        Path(patient),
        auth_header(),
        personnel_extension(personnel),
        Json(AddMedicationRequest {
            name: "Folic acid".to_string(),
            dosage: "400mcg".to_string(),
            frequency: "daily".to_string(),
            start_date: chrono::NaiveDate::from_ymd_opt(2026, 8, 7).unwrap(),
            end_date: None,
        }),
    )
    .await;

    let body = result.expect("medication append should succeed").0;
    let medications = body["data"]["medications"].as_array().unwrap();
    assert_eq!(medications.len(), 1);
    assert_eq!(medications[0]["prescriber"]["specialization"], "Obstetrics");
}

// ==============================================================================
// ANALYTICS
// ==============================================================================

#[tokio::test]
async fn analytics_counts_the_caller_schedule() {
    let mock_server = MockServer::start().await;
    let state = test_state(&mock_server);
    let personnel = Uuid::new_v4();
    let mother = Uuid::new_v4();

    let past = (Utc::now() - Duration::days(30)).to_rfc3339();
    let future = (Utc::now() + Duration::days(14)).to_rfc3339();

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockRows::appointment_row(
                &Uuid::new_v4().to_string(),
                &mother.to_string(),
                &personnel.to_string(),
                &past,
                "completed",
            ),
            MockRows::appointment_row(
                &Uuid::new_v4().to_string(),
                &mother.to_string(),
                &personnel.to_string(),
                &past,
                "completed",
            ),
            MockRows::appointment_row(
                &Uuid::new_v4().to_string(),
                &mother.to_string(),
                &personnel.to_string(),
                &future,
                "scheduled",
            )
        ])))
        .mount(&mock_server)
        .await;

    let result = get_analytics(State(state), auth_header(), personnel_extension(personnel)).await;

    let body = result.expect("analytics should succeed").0;
    let data = &body["data"];
    assert_eq!(data["total_appointments"], 3);
    assert_eq!(data["completed_appointments"], 2);
    assert_eq!(data["upcoming_appointments"], 1);
    assert_eq!(data["total_patients"], 1);

    let months = data["monthly_appointments"].as_array().unwrap();
    assert!(!months.is_empty());
    assert!(months.iter().all(|entry| entry["count"].as_u64().unwrap_or(0) > 0));
}

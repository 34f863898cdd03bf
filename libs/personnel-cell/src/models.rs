// libs/personnel-cell/src/models.rs
use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const ROLE_MOTHER: &str = "mother";
pub const ROLE_MEDICAL_PERSONNEL: &str = "medical_personnel";

// ==============================================================================
// CORE RECORDS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub mother_id: Uuid,
    pub medical_personnel_id: Uuid,
    pub appointment_date: DateTime<Utc>,
    /// Clock label shown to users ("10:30"); secondary sort key after the date.
    pub appointment_time: String,
    pub appointment_type: String,
    pub status: AppointmentStatus,
    pub notes: Option<String>,
    pub meeting_link: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Scheduled,
    Confirmed,
    Completed,
    Cancelled,
}

impl AppointmentStatus {
    /// Statuses that count as "still on the calendar".
    pub fn is_active(&self) -> bool {
        matches!(self, AppointmentStatus::Scheduled | AppointmentStatus::Confirmed)
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentStatus::Scheduled => write!(f, "scheduled"),
            AppointmentStatus::Confirmed => write!(f, "confirmed"),
            AppointmentStatus::Completed => write!(f, "completed"),
            AppointmentStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CareNote {
    pub content: String,
    pub author: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Medication {
    pub name: String,
    pub dosage: String,
    pub frequency: String,
    pub prescribed_by: Uuid,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
}

/// One per mother. Notes and medications are append-only through this API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PregnancyRecord {
    pub id: Uuid,
    pub mother_id: Uuid,
    #[serde(default)]
    pub notes: Vec<CareNote>,
    #[serde(default)]
    pub medications: Vec<Medication>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ==============================================================================
// ENRICHMENT VIEWS (read-time joins against the users table)
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MotherBrief {
    pub id: Uuid,
    pub full_name: String,
    pub phone: Option<String>,
    pub profile_image: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AppointmentWithMother {
    #[serde(flatten)]
    pub appointment: Appointment,
    pub mother: Option<MotherBrief>,
}

/// Roster entry: the brief profile plus pregnancy metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatientOverview {
    pub id: Uuid,
    pub full_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub profile_image: Option<String>,
    pub due_date: Option<NaiveDate>,
    pub pregnancy_stage: Option<String>,
}

/// Full patient profile. Credential secrets are excluded by the column list
/// used for the read, never filtered after the fact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatientProfile {
    pub id: Uuid,
    pub full_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub role: String,
    pub profile_image: Option<String>,
    pub due_date: Option<NaiveDate>,
    pub pregnancy_stage: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrescriberBrief {
    pub id: Uuid,
    pub full_name: String,
    pub specialization: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MedicationWithPrescriber {
    #[serde(flatten)]
    pub medication: Medication,
    pub prescriber: Option<PrescriberBrief>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PregnancyRecordDetail {
    pub id: Uuid,
    pub mother_id: Uuid,
    pub notes: Vec<CareNote>,
    pub medications: Vec<MedicationWithPrescriber>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ==============================================================================
// REQUEST MODELS
// ==============================================================================

/// The stored status is always `scheduled`; a status field in the request
/// body is dropped at deserialization.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateAppointmentRequest {
    pub mother_id: Uuid,
    pub appointment_date: DateTime<Utc>,
    pub appointment_time: String,
    pub appointment_type: String,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateAppointmentRequest {
    pub status: Option<AppointmentStatus>,
    pub notes: Option<String>,
    pub meeting_link: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AppointmentListQuery {
    pub status: Option<AppointmentStatus>,
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AddNoteRequest {
    pub content: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AddMedicationRequest {
    pub name: String,
    pub dosage: String,
    pub frequency: String,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
}

// ==============================================================================
// RESPONSE MODELS
// ==============================================================================

#[derive(Debug, Serialize)]
pub struct DashboardSummary {
    pub today_appointments: Vec<AppointmentWithMother>,
    pub upcoming_appointments: Vec<AppointmentWithMother>,
    pub total_patients: usize,
}

#[derive(Debug, Serialize)]
pub struct PatientDetail {
    pub patient: PatientProfile,
    pub pregnancy_record: Option<PregnancyRecordDetail>,
    pub appointments: Vec<Appointment>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonthlyCount {
    pub year: i32,
    pub month: u32,
    pub count: usize,
}

#[derive(Debug, Serialize)]
pub struct CareAnalytics {
    pub total_appointments: usize,
    pub completed_appointments: usize,
    pub upcoming_appointments: usize,
    pub total_patients: usize,
    pub monthly_appointments: Vec<MonthlyCount>,
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, thiserror::Error)]
pub enum CareError {
    #[error("patient not found")]
    PatientNotFound,

    #[error("appointment not found")]
    AppointmentNotFound,

    #[error("pregnancy record not found")]
    RecordNotFound,

    #[error("no appointment links the caller to this patient")]
    PatientNotLinked,

    #[error("database error: {0}")]
    Database(String),
}

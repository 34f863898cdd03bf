// libs/personnel-cell/src/services/appointments.rs
use std::collections::{HashMap, HashSet};

use chrono::Utc;
use reqwest::Method;
use serde_json::{json, Map, Value};
use tracing::debug;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{
    Appointment, AppointmentListQuery, AppointmentStatus, AppointmentWithMother, CareError,
    CreateAppointmentRequest, MotherBrief, UpdateAppointmentRequest, ROLE_MOTHER,
};
use crate::services::{local_day_bounds, MOTHER_BRIEF_COLUMNS};

/// Reads and writes against the appointments table, always scoped to the
/// calling personnel. Results carry a `MotherBrief` joined in memory from a
/// second users read.
pub struct AppointmentScheduleService {
    supabase: SupabaseClient,
}

impl AppointmentScheduleService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    /// List the caller's appointments, optionally narrowed to one status
    /// and/or one local calendar day, ordered by date then time ascending.
    pub async fn list_for_personnel(
        &self,
        personnel_id: Uuid,
        filter: &AppointmentListQuery,
        auth_token: &str,
    ) -> Result<Vec<AppointmentWithMother>, CareError> {
        let mut query_parts = vec![format!("medical_personnel_id=eq.{}", personnel_id)];

        if let Some(status) = filter.status {
            query_parts.push(format!("status=eq.{}", status));
        }
        if let Some(day) = filter.date {
            let (start, end) = local_day_bounds(day);
            query_parts.push(format!(
                "appointment_date=gte.{}",
                urlencoding::encode(&start.to_rfc3339())
            ));
            query_parts.push(format!(
                "appointment_date=lte.{}",
                urlencoding::encode(&end.to_rfc3339())
            ));
        }

        let path = format!(
            "/rest/v1/appointments?{}&order=appointment_date.asc,appointment_time.asc",
            query_parts.join("&")
        );
        let appointments = self.fetch_appointments(&path, auth_token).await?;

        self.with_mothers(appointments, auth_token).await
    }

    /// Create an appointment owned by the caller. The referenced user must
    /// exist with role `mother`; the stored status is always `scheduled`.
    ///
    /// The existence check and the insert are two store round trips with no
    /// transaction between them.
    pub async fn create(
        &self,
        personnel_id: Uuid,
        request: CreateAppointmentRequest,
        auth_token: &str,
    ) -> Result<AppointmentWithMother, CareError> {
        let mother = self.find_mother(request.mother_id, auth_token).await?;

        let now = Utc::now();
        let record = json!({
            "mother_id": request.mother_id,
            "medical_personnel_id": personnel_id,
            "appointment_date": request.appointment_date.to_rfc3339(),
            "appointment_time": request.appointment_time,
            "appointment_type": request.appointment_type,
            "status": AppointmentStatus::Scheduled,
            "notes": request.notes,
            "created_at": now.to_rfc3339(),
            "updated_at": now.to_rfc3339(),
        });

        let rows: Vec<Value> = self
            .supabase
            .mutate_returning(Method::POST, "/rest/v1/appointments", Some(auth_token), record)
            .await
            .map_err(|e| CareError::Database(e.to_string()))?;

        let appointment = parse_single_appointment(rows)?;
        debug!(
            "Appointment {} created for mother {}",
            appointment.id, appointment.mother_id
        );

        Ok(AppointmentWithMother {
            appointment,
            mother: Some(mother),
        })
    }

    /// Apply a sparse update to one of the caller's appointments. Ownership
    /// is part of the lookup filter, so a foreign appointment reads as
    /// absent rather than forbidden.
    pub async fn update(
        &self,
        personnel_id: Uuid,
        appointment_id: Uuid,
        request: &UpdateAppointmentRequest,
        auth_token: &str,
    ) -> Result<AppointmentWithMother, CareError> {
        let scoped = format!(
            "/rest/v1/appointments?id=eq.{}&medical_personnel_id=eq.{}",
            appointment_id, personnel_id
        );

        let existing = self.fetch_appointments(&scoped, auth_token).await?;
        if existing.is_empty() {
            return Err(CareError::AppointmentNotFound);
        }

        let changes = sparse_update_map(request);
        let rows: Vec<Value> = self
            .supabase
            .mutate_returning(Method::PATCH, &scoped, Some(auth_token), Value::Object(changes))
            .await
            .map_err(|e| CareError::Database(e.to_string()))?;

        let appointment = parse_single_appointment(rows)?;

        let briefs = self
            .fetch_mother_briefs(&HashSet::from([appointment.mother_id]), auth_token)
            .await?;
        let mother = briefs.get(&appointment.mother_id).cloned();

        Ok(AppointmentWithMother { appointment, mother })
    }

    pub(crate) async fn fetch_appointments(
        &self,
        path: &str,
        auth_token: &str,
    ) -> Result<Vec<Appointment>, CareError> {
        let rows: Vec<Value> = self
            .supabase
            .request(Method::GET, path, Some(auth_token), None)
            .await
            .map_err(|e| CareError::Database(e.to_string()))?;

        rows.into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<Appointment>, _>>()
            .map_err(|e| CareError::Database(format!("failed to parse appointments: {}", e)))
    }

    pub(crate) async fn with_mothers(
        &self,
        appointments: Vec<Appointment>,
        auth_token: &str,
    ) -> Result<Vec<AppointmentWithMother>, CareError> {
        let ids: HashSet<Uuid> = appointments.iter().map(|a| a.mother_id).collect();
        let briefs = self.fetch_mother_briefs(&ids, auth_token).await?;

        Ok(appointments
            .into_iter()
            .map(|appointment| {
                let mother = briefs.get(&appointment.mother_id).cloned();
                AppointmentWithMother { appointment, mother }
            })
            .collect())
    }

    pub(crate) async fn fetch_mother_briefs(
        &self,
        ids: &HashSet<Uuid>,
        auth_token: &str,
    ) -> Result<HashMap<Uuid, MotherBrief>, CareError> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let id_list = ids
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(",");
        let path = format!(
            "/rest/v1/users?id=in.({})&select={}",
            id_list, MOTHER_BRIEF_COLUMNS
        );

        let briefs: Vec<MotherBrief> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| CareError::Database(e.to_string()))?;

        Ok(briefs.into_iter().map(|brief| (brief.id, brief)).collect())
    }

    async fn find_mother(&self, mother_id: Uuid, auth_token: &str) -> Result<MotherBrief, CareError> {
        let path = format!(
            "/rest/v1/users?id=eq.{}&role=eq.{}&select={}",
            mother_id, ROLE_MOTHER, MOTHER_BRIEF_COLUMNS
        );

        let rows: Vec<MotherBrief> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| CareError::Database(e.to_string()))?;

        rows.into_iter().next().ok_or(CareError::PatientNotFound)
    }
}

fn parse_single_appointment(rows: Vec<Value>) -> Result<Appointment, CareError> {
    let row = rows
        .into_iter()
        .next()
        .ok_or_else(|| CareError::Database("mutation returned no row".to_string()))?;

    serde_json::from_value(row)
        .map_err(|e| CareError::Database(format!("failed to parse appointment: {}", e)))
}

/// Build the PATCH body from the fields actually supplied. Empty strings are
/// treated as absent, not as clears.
pub(crate) fn sparse_update_map(request: &UpdateAppointmentRequest) -> Map<String, Value> {
    let mut changes = Map::new();

    if let Some(status) = request.status {
        changes.insert("status".to_string(), json!(status));
    }
    if let Some(notes) = request.notes.as_deref().filter(|value| !value.is_empty()) {
        changes.insert("notes".to_string(), json!(notes));
    }
    if let Some(link) = request
        .meeting_link
        .as_deref()
        .filter(|value| !value.is_empty())
    {
        changes.insert("meeting_link".to_string(), json!(link));
    }

    changes.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));

    changes
}

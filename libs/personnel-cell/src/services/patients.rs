// libs/personnel-cell/src/services/patients.rs
use std::collections::{HashMap, HashSet};

use reqwest::Method;
use serde_json::Value;
use tracing::warn;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{CareError, PatientDetail, PatientOverview, PatientProfile};
use crate::services::{
    AppointmentScheduleService, PregnancyRecordService, PATIENT_OVERVIEW_COLUMNS,
    PATIENT_PROFILE_COLUMNS,
};

/// Patient-facing reads for a personnel user: the deduplicated roster and
/// the combined per-patient detail view.
pub struct PatientRosterService {
    supabase: SupabaseClient,
    schedule: AppointmentScheduleService,
    records: PregnancyRecordService,
}

impl PatientRosterService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            schedule: AppointmentScheduleService::new(config),
            records: PregnancyRecordService::new(config),
        }
    }

    /// Every patient the caller has ever had an appointment with, one entry
    /// per mother, ordered by most recently created appointment first.
    pub async fn roster(
        &self,
        personnel_id: Uuid,
        auth_token: &str,
    ) -> Result<Vec<PatientOverview>, CareError> {
        let path = format!(
            "/rest/v1/appointments?medical_personnel_id=eq.{}&select=mother_id&order=created_at.desc",
            personnel_id
        );

        let rows: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| CareError::Database(e.to_string()))?;

        let ordered_ids: Vec<Uuid> = rows
            .iter()
            .filter_map(|row| row.get("mother_id"))
            .filter_map(|id| serde_json::from_value(id.clone()).ok())
            .collect();

        let distinct: HashSet<Uuid> = ordered_ids.iter().copied().collect();
        let overviews = self.fetch_overviews(&distinct, auth_token).await?;

        Ok(first_seen_roster(&ordered_ids, &overviews))
    }

    /// Combined view of one patient: profile, pregnancy record with
    /// enriched medications, and the shared appointment history.
    ///
    /// The caller must already share at least one appointment with the
    /// patient, whatever its status.
    pub async fn detail(
        &self,
        personnel_id: Uuid,
        patient_id: Uuid,
        auth_token: &str,
    ) -> Result<PatientDetail, CareError> {
        self.ensure_linked(personnel_id, patient_id, auth_token).await?;

        let profile_path = format!(
            "/rest/v1/users?id=eq.{}&select={}",
            patient_id, PATIENT_PROFILE_COLUMNS
        );
        let profiles: Vec<PatientProfile> = self
            .supabase
            .request(Method::GET, &profile_path, Some(auth_token), None)
            .await
            .map_err(|e| CareError::Database(e.to_string()))?;

        let Some(patient) = profiles.into_iter().next() else {
            // An appointment references this mother but the user row is gone.
            warn!(
                "Appointment links personnel {} to missing user {}",
                personnel_id, patient_id
            );
            return Err(CareError::PatientNotFound);
        };

        let pregnancy_record = self.records.find_detail(patient_id, auth_token).await?;

        let history_path = format!(
            "/rest/v1/appointments?medical_personnel_id=eq.{}&mother_id=eq.{}&order=appointment_date.desc,appointment_time.desc",
            personnel_id, patient_id
        );
        let appointments = self.schedule.fetch_appointments(&history_path, auth_token).await?;

        Ok(PatientDetail {
            patient,
            pregnancy_record,
            appointments,
        })
    }

    async fn ensure_linked(
        &self,
        personnel_id: Uuid,
        patient_id: Uuid,
        auth_token: &str,
    ) -> Result<(), CareError> {
        let path = format!(
            "/rest/v1/appointments?medical_personnel_id=eq.{}&mother_id=eq.{}&select=id&limit=1",
            personnel_id, patient_id
        );

        let rows: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| CareError::Database(e.to_string()))?;

        if rows.is_empty() {
            return Err(CareError::PatientNotLinked);
        }

        Ok(())
    }

    async fn fetch_overviews(
        &self,
        ids: &HashSet<Uuid>,
        auth_token: &str,
    ) -> Result<HashMap<Uuid, PatientOverview>, CareError> {
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
            id_list, PATIENT_OVERVIEW_COLUMNS
        );

        let overviews: Vec<PatientOverview> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| CareError::Database(e.to_string()))?;

        Ok(overviews
            .into_iter()
            .map(|overview| (overview.id, overview))
            .collect())
    }
}

/// Dedupe by mother id, keeping the first occurrence in appointment order.
pub(crate) fn first_seen_roster(
    ordered_ids: &[Uuid],
    overviews: &HashMap<Uuid, PatientOverview>,
) -> Vec<PatientOverview> {
    let mut seen = HashSet::new();
    let mut roster = Vec::new();

    for id in ordered_ids {
        if seen.insert(*id) {
            if let Some(overview) = overviews.get(id) {
                roster.push(overview.clone());
            }
        }
    }

    roster
}

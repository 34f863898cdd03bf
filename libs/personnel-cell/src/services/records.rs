// libs/personnel-cell/src/services/records.rs
use std::collections::{HashMap, HashSet};

use chrono::Utc;
use reqwest::Method;
use serde_json::{json, Value};
use tracing::debug;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{
    AddMedicationRequest, CareError, CareNote, Medication, MedicationWithPrescriber,
    PregnancyRecord, PregnancyRecordDetail, PrescriberBrief,
};
use crate::services::PRESCRIBER_COLUMNS;

/// Append-only mutations on a mother's pregnancy record, plus prescriber
/// enrichment for the medication list.
// TODO: decide whether appending requires a linking appointment, as the
// patient detail view already does; today any authenticated personnel can
// write to any record through this surface.
pub struct PregnancyRecordService {
    supabase: SupabaseClient,
}

impl PregnancyRecordService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    pub async fn find_by_mother(
        &self,
        mother_id: Uuid,
        auth_token: &str,
    ) -> Result<Option<PregnancyRecord>, CareError> {
        let path = format!("/rest/v1/pregnancy_records?mother_id=eq.{}", mother_id);

        let rows: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| CareError::Database(e.to_string()))?;

        rows.into_iter()
            .next()
            .map(|row| {
                serde_json::from_value(row).map_err(|e| {
                    CareError::Database(format!("failed to parse pregnancy record: {}", e))
                })
            })
            .transpose()
    }

    /// Find the record and enrich its medication list, for read paths.
    pub async fn find_detail(
        &self,
        mother_id: Uuid,
        auth_token: &str,
    ) -> Result<Option<PregnancyRecordDetail>, CareError> {
        match self.find_by_mother(mother_id, auth_token).await? {
            Some(record) => Ok(Some(self.with_prescribers(record, auth_token).await?)),
            None => Ok(None),
        }
    }

    /// Append a care note stamped with the author and current time, and
    /// persist the whole list.
    pub async fn append_note(
        &self,
        mother_id: Uuid,
        author: Uuid,
        content: String,
        auth_token: &str,
    ) -> Result<PregnancyRecord, CareError> {
        let record = self
            .find_by_mother(mother_id, auth_token)
            .await?
            .ok_or(CareError::RecordNotFound)?;

        let mut notes = record.notes;
        notes.push(CareNote {
            content,
            author,
            created_at: Utc::now(),
        });

        let updated = self.persist_lists(record.id, json!({ "notes": notes }), auth_token).await?;
        debug!("Care note appended to record {}", updated.id);

        Ok(updated)
    }

    /// Append a medication prescribed by the caller, then return the record
    /// with the full medication list enriched.
    pub async fn add_medication(
        &self,
        mother_id: Uuid,
        prescriber: Uuid,
        request: AddMedicationRequest,
        auth_token: &str,
    ) -> Result<PregnancyRecordDetail, CareError> {
        let record = self
            .find_by_mother(mother_id, auth_token)
            .await?
            .ok_or(CareError::RecordNotFound)?;

        let mut medications = record.medications;
        medications.push(Medication {
            name: request.name,
            dosage: request.dosage,
            frequency: request.frequency,
            prescribed_by: prescriber,
            start_date: request.start_date,
            end_date: request.end_date,
        });

        let updated = self
            .persist_lists(record.id, json!({ "medications": medications }), auth_token)
            .await?;
        debug!("Medication appended to record {}", updated.id);

        self.with_prescribers(updated, auth_token).await
    }

    pub(crate) async fn with_prescribers(
        &self,
        record: PregnancyRecord,
        auth_token: &str,
    ) -> Result<PregnancyRecordDetail, CareError> {
        let ids: HashSet<Uuid> = record
            .medications
            .iter()
            .map(|medication| medication.prescribed_by)
            .collect();
        let prescribers = self.fetch_prescribers(&ids, auth_token).await?;

        let medications = record
            .medications
            .into_iter()
            .map(|medication| {
                let prescriber = prescribers.get(&medication.prescribed_by).cloned();
                MedicationWithPrescriber {
                    medication,
                    prescriber,
                }
            })
            .collect();

        Ok(PregnancyRecordDetail {
            id: record.id,
            mother_id: record.mother_id,
            notes: record.notes,
            medications,
            created_at: record.created_at,
            updated_at: record.updated_at,
        })
    }

    async fn fetch_prescribers(
        &self,
        ids: &HashSet<Uuid>,
        auth_token: &str,
    ) -> Result<HashMap<Uuid, PrescriberBrief>, CareError> {
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
            id_list, PRESCRIBER_COLUMNS
        );

        let briefs: Vec<PrescriberBrief> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| CareError::Database(e.to_string()))?;

        Ok(briefs.into_iter().map(|brief| (brief.id, brief)).collect())
    }

    /// Document-style array replace: the whole list goes back in one PATCH.
    async fn persist_lists(
        &self,
        record_id: Uuid,
        mut changes: Value,
        auth_token: &str,
    ) -> Result<PregnancyRecord, CareError> {
        if let Some(map) = changes.as_object_mut() {
            map.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));
        }

        let path = format!("/rest/v1/pregnancy_records?id=eq.{}", record_id);
        let rows: Vec<Value> = self
            .supabase
            .mutate_returning(Method::PATCH, &path, Some(auth_token), changes)
            .await
            .map_err(|e| CareError::Database(e.to_string()))?;

        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| CareError::Database("record update returned no row".to_string()))?;

        serde_json::from_value(row)
            .map_err(|e| CareError::Database(format!("failed to parse pregnancy record: {}", e)))
    }
}

// libs/personnel-cell/src/services/insights.rs
use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Datelike, Local, Months, Timelike, Utc};
use reqwest::Method;
use serde_json::Value;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{
    Appointment, AppointmentStatus, CareAnalytics, CareError, DashboardSummary, MonthlyCount,
};
use crate::services::{local_day_bounds, AppointmentScheduleService};

/// Read-only aggregates over a personnel user's schedule: the day view and
/// the trailing workload analytics. Counting happens in memory over one
/// fetch per figure; nothing here writes.
pub struct CareInsightsService {
    supabase: SupabaseClient,
    schedule: AppointmentScheduleService,
}

impl CareInsightsService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            schedule: AppointmentScheduleService::new(config),
        }
    }

    pub async fn dashboard(
        &self,
        personnel_id: Uuid,
        auth_token: &str,
    ) -> Result<DashboardSummary, CareError> {
        let (day_start, day_end) = local_day_bounds(Local::now().date_naive());
        let today_path = format!(
            "/rest/v1/appointments?medical_personnel_id=eq.{}&appointment_date=gte.{}&appointment_date=lte.{}&order=appointment_date.asc,appointment_time.asc",
            personnel_id,
            urlencoding::encode(&day_start.to_rfc3339()),
            urlencoding::encode(&day_end.to_rfc3339()),
        );
        let today = self.schedule.fetch_appointments(&today_path, auth_token).await?;

        // Second precision avoids nanosecond mismatches against Postgres.
        let now = Utc::now();
        let now = now.with_nanosecond(0).unwrap_or(now);
        let upcoming_path = format!(
            "/rest/v1/appointments?medical_personnel_id=eq.{}&appointment_date=gte.{}&status=in.(scheduled,confirmed)&order=appointment_date.asc&limit=10",
            personnel_id,
            urlencoding::encode(&now.to_rfc3339()),
        );
        let upcoming = self.schedule.fetch_appointments(&upcoming_path, auth_token).await?;

        let total_patients = self.distinct_patient_count(personnel_id, auth_token).await?;

        Ok(DashboardSummary {
            today_appointments: self.schedule.with_mothers(today, auth_token).await?,
            upcoming_appointments: self.schedule.with_mothers(upcoming, auth_token).await?,
            total_patients,
        })
    }

    pub async fn analytics(
        &self,
        personnel_id: Uuid,
        auth_token: &str,
    ) -> Result<CareAnalytics, CareError> {
        let path = format!(
            "/rest/v1/appointments?medical_personnel_id=eq.{}",
            personnel_id
        );
        let appointments = self.schedule.fetch_appointments(&path, auth_token).await?;

        Ok(summarize(&appointments, Utc::now()))
    }

    async fn distinct_patient_count(
        &self,
        personnel_id: Uuid,
        auth_token: &str,
    ) -> Result<usize, CareError> {
        let path = format!(
            "/rest/v1/appointments?medical_personnel_id=eq.{}&select=mother_id",
            personnel_id
        );

        let rows: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| CareError::Database(e.to_string()))?;

        let distinct: HashSet<Uuid> = rows
            .iter()
            .filter_map(|row| row.get("mother_id"))
            .filter_map(|id| serde_json::from_value(id.clone()).ok())
            .collect();

        Ok(distinct.len())
    }
}

pub(crate) fn summarize(appointments: &[Appointment], now: DateTime<Utc>) -> CareAnalytics {
    let completed_appointments = appointments
        .iter()
        .filter(|a| a.status == AppointmentStatus::Completed)
        .count();
    let upcoming_appointments = appointments
        .iter()
        .filter(|a| a.status.is_active() && a.appointment_date >= now)
        .count();
    let total_patients = appointments
        .iter()
        .map(|a| a.mother_id)
        .collect::<HashSet<_>>()
        .len();

    CareAnalytics {
        total_appointments: appointments.len(),
        completed_appointments,
        upcoming_appointments,
        total_patients,
        monthly_appointments: monthly_histogram(appointments, now),
    }
}

/// Appointment counts per calendar month over the trailing six months,
/// ascending. Months without appointments are absent rather than zero.
pub(crate) fn monthly_histogram(
    appointments: &[Appointment],
    now: DateTime<Utc>,
) -> Vec<MonthlyCount> {
    let window_start = now.checked_sub_months(Months::new(6)).unwrap_or(now);

    let mut buckets: BTreeMap<(i32, u32), usize> = BTreeMap::new();
    for appointment in appointments {
        if appointment.appointment_date >= window_start {
            let key = (
                appointment.appointment_date.year(),
                appointment.appointment_date.month(),
            );
            *buckets.entry(key).or_insert(0) += 1;
        }
    }

    buckets
        .into_iter()
        .map(|((year, month), count)| MonthlyCount { year, month, count })
        .collect()
}

pub mod appointments;
pub mod insights;
pub mod patients;
pub mod records;

pub use appointments::AppointmentScheduleService;
pub use insights::CareInsightsService;
pub use patients::PatientRosterService;
pub use records::PregnancyRecordService;

use chrono::{DateTime, Duration, Local, NaiveDate, NaiveTime, TimeZone, Utc};

/// Column lists for user reads. Credential columns are never part of these,
/// which is how secrets stay out of responses.
pub(crate) const MOTHER_BRIEF_COLUMNS: &str = "id,full_name,phone,profile_image";
pub(crate) const PATIENT_OVERVIEW_COLUMNS: &str =
    "id,full_name,email,phone,profile_image,due_date,pregnancy_stage";
pub(crate) const PATIENT_PROFILE_COLUMNS: &str =
    "id,full_name,email,phone,role,profile_image,due_date,pregnancy_stage,created_at";
pub(crate) const PRESCRIBER_COLUMNS: &str = "id,full_name,specialization";

/// UTC bounds of one server-local calendar day, 00:00:00.000 through
/// 23:59:59.999 inclusive.
pub(crate) fn local_day_bounds(day: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
    let start_naive = day.and_time(NaiveTime::MIN);
    let end_naive = start_naive + Duration::days(1) - Duration::milliseconds(1);

    let start = Local
        .from_local_datetime(&start_naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|| Utc.from_utc_datetime(&start_naive));
    let end = Local
        .from_local_datetime(&end_naive)
        .latest()
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|| Utc.from_utc_datetime(&end_naive));

    (start, end)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    #[test]
    fn day_bounds_span_the_whole_local_day() {
        let day = NaiveDate::from_ymd_opt(2026, 6, 15).unwrap();
        let (start, end) = local_day_bounds(day);

        assert!(start < end);

        let local_start = start.with_timezone(&Local);
        let local_end = end.with_timezone(&Local);
        assert_eq!(local_start.time(), NaiveTime::MIN);
        assert_eq!(local_end.hour(), 23);
        assert_eq!(local_end.minute(), 59);
        assert_eq!(local_end.second(), 59);
    }
}

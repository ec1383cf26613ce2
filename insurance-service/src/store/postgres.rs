use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{FromRow, PgPool};
use tracing::{debug, info};

use super::VerificationStore;
use crate::error::{InsuranceError, InsuranceResult};
use crate::models::{
    Alert, Appointment, InsuranceRecord, NewAlert, NewInsuranceRecord, NewVerificationLog,
    Patient, VerificationCommit, VerificationLog, VerificationStatus, VerificationWrite,
};

const APPOINTMENT_COLUMNS: &str = "id, patient_id, clinic_id, scheduled_time, status, \
     verification_status, copay, provider, updated_at";
const ALERT_COLUMNS: &str = "id, appointment_id, alert_type, message, severity, resolved, created_at";

#[derive(Debug, FromRow)]
struct PatientRow {
    id: i64,
    clinic_id: i64,
    first_name: String,
    last_name: String,
    dob: Option<NaiveDate>,
    phone: Option<String>,
    primary_provider: Option<String>,
}

impl From<PatientRow> for Patient {
    fn from(row: PatientRow) -> Self {
        Self {
            id: row.id,
            clinic_id: row.clinic_id,
            first_name: row.first_name,
            last_name: row.last_name,
            dob: row.dob,
            phone: row.phone,
            primary_provider: row.primary_provider,
        }
    }
}

#[derive(Debug, FromRow)]
struct AppointmentRow {
    id: i64,
    patient_id: i64,
    clinic_id: i64,
    scheduled_time: DateTime<Utc>,
    status: String,
    verification_status: String,
    copay: Option<f64>,
    provider: Option<String>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<AppointmentRow> for Appointment {
    type Error = InsuranceError;

    fn try_from(row: AppointmentRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            patient_id: row.patient_id,
            clinic_id: row.clinic_id,
            scheduled_time: row.scheduled_time,
            status: row.status.parse()?,
            verification_status: VerificationStatus::parse_lenient(&row.verification_status),
            copay: row.copay,
            provider: row.provider,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct InsuranceRecordRow {
    id: i64,
    patient_id: i64,
    provider: String,
    status: String,
    copay: Option<f64>,
    last_checked: Option<DateTime<Utc>>,
    policy_id: Option<String>,
}

impl From<InsuranceRecordRow> for InsuranceRecord {
    fn from(row: InsuranceRecordRow) -> Self {
        Self {
            id: row.id,
            patient_id: row.patient_id,
            provider: row.provider,
            status: VerificationStatus::parse_lenient(&row.status),
            copay: row.copay,
            last_checked: row.last_checked,
            policy_id: row.policy_id,
        }
    }
}

#[derive(Debug, FromRow)]
struct VerificationLogRow {
    id: i64,
    patient_id: i64,
    appointment_id: Option<i64>,
    status: String,
    provider: String,
    copay: Option<f64>,
    last_checked: DateTime<Utc>,
    details: Option<String>,
}

impl From<VerificationLogRow> for VerificationLog {
    fn from(row: VerificationLogRow) -> Self {
        Self {
            id: row.id,
            patient_id: row.patient_id,
            appointment_id: row.appointment_id,
            status: VerificationStatus::parse_lenient(&row.status),
            provider: row.provider,
            copay: row.copay,
            last_checked: row.last_checked,
            details: row.details,
        }
    }
}

#[derive(Debug, FromRow)]
struct AlertRow {
    id: i64,
    appointment_id: i64,
    alert_type: String,
    message: String,
    severity: String,
    resolved: bool,
    created_at: DateTime<Utc>,
}

impl TryFrom<AlertRow> for Alert {
    type Error = InsuranceError;

    fn try_from(row: AlertRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            appointment_id: row.appointment_id,
            alert_type: row.alert_type,
            message: row.message,
            severity: row.severity.parse()?,
            resolved: row.resolved,
            created_at: row.created_at,
        })
    }
}

fn collect<R, T>(rows: Vec<R>) -> InsuranceResult<Vec<T>>
where
    T: TryFrom<R, Error = InsuranceError>,
{
    rows.into_iter().map(T::try_from).collect()
}

/// PostgreSQL-backed store
#[derive(Clone)]
pub struct PgVerificationStore {
    pool: PgPool,
}

impl PgVerificationStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> InsuranceResult<Self> {
        let pool = PgPool::connect(database_url).await?;
        Ok(Self::new(pool))
    }

    /// Apply the bundled schema migrations
    pub async fn migrate(&self) -> InsuranceResult<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        info!("Verification schema migrations applied");
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl VerificationStore for PgVerificationStore {
    async fn get_patient(&self, patient_id: i64) -> InsuranceResult<Option<Patient>> {
        let row = sqlx::query_as::<_, PatientRow>(
            r#"
            SELECT id, clinic_id, first_name, last_name, dob, phone, primary_provider
            FROM patients
            WHERE id = $1
            "#,
        )
        .bind(patient_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Patient::from))
    }

    async fn get_appointment(&self, appointment_id: i64) -> InsuranceResult<Option<Appointment>> {
        let row = sqlx::query_as::<_, AppointmentRow>(&format!(
            "SELECT {APPOINTMENT_COLUMNS} FROM appointments WHERE id = $1"
        ))
        .bind(appointment_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Appointment::try_from).transpose()
    }

    async fn appointments_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> InsuranceResult<Vec<Appointment>> {
        let rows = sqlx::query_as::<_, AppointmentRow>(&format!(
            "SELECT {APPOINTMENT_COLUMNS} FROM appointments \
             WHERE scheduled_time BETWEEN $1 AND $2 \
             ORDER BY scheduled_time ASC, id ASC"
        ))
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await?;

        collect(rows)
    }

    async fn clinic_appointments(&self, clinic_id: i64, limit: usize) -> InsuranceResult<Vec<Appointment>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = sqlx::query_as::<_, AppointmentRow>(&format!(
            "SELECT {APPOINTMENT_COLUMNS} FROM appointments \
             WHERE clinic_id = $1 \
             ORDER BY scheduled_time ASC, id ASC \
             LIMIT $2"
        ))
        .bind(clinic_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        collect(rows)
    }

    async fn find_insurance_record(&self, patient_id: i64) -> InsuranceResult<Option<InsuranceRecord>> {
        let row = sqlx::query_as::<_, InsuranceRecordRow>(
            r#"
            SELECT id, patient_id, provider, status, copay, last_checked, policy_id
            FROM insurance_records
            WHERE patient_id = $1
            "#,
        )
        .bind(patient_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(InsuranceRecord::from))
    }

    async fn get_or_create_insurance_record(
        &self,
        record: NewInsuranceRecord,
    ) -> InsuranceResult<InsuranceRecord> {
        // The no-op update makes RETURNING yield the existing row on conflict
        let row = sqlx::query_as::<_, InsuranceRecordRow>(
            r#"
            INSERT INTO insurance_records (patient_id, provider, status, policy_id)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (patient_id) DO UPDATE SET patient_id = EXCLUDED.patient_id
            RETURNING id, patient_id, provider, status, copay, last_checked, policy_id
            "#,
        )
        .bind(record.patient_id)
        .bind(&record.provider)
        .bind(record.status.as_str())
        .bind(&record.policy_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into())
    }

    async fn commit_verification(&self, write: VerificationWrite) -> InsuranceResult<VerificationCommit> {
        let mut tx = self.pool.begin().await?;

        let record = sqlx::query_as::<_, InsuranceRecordRow>(
            r#"
            UPDATE insurance_records
            SET provider = $2, status = $3, copay = $4, last_checked = $5
            WHERE id = $1
            RETURNING id, patient_id, provider, status, copay, last_checked, policy_id
            "#,
        )
        .bind(write.insurance_record_id)
        .bind(&write.provider)
        .bind(write.status.as_str())
        .bind(write.copay)
        .bind(write.checked_at)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| InsuranceError::not_found("insurance record", write.insurance_record_id))?;

        let appointment = sqlx::query_as::<_, AppointmentRow>(&format!(
            "UPDATE appointments \
             SET verification_status = $2, copay = $3, provider = $4, updated_at = $5 \
             WHERE id = $1 \
             RETURNING {APPOINTMENT_COLUMNS}"
        ))
        .bind(write.appointment_id)
        .bind(write.status.as_str())
        .bind(write.copay)
        .bind(&write.provider)
        .bind(write.checked_at)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| InsuranceError::not_found("appointment", write.appointment_id))?;

        let log = sqlx::query_as::<_, VerificationLogRow>(
            r#"
            INSERT INTO verification_logs
                (patient_id, appointment_id, status, provider, copay, last_checked, details)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, patient_id, appointment_id, status, provider, copay, last_checked, details
            "#,
        )
        .bind(write.log.patient_id)
        .bind(write.log.appointment_id)
        .bind(write.log.status.as_str())
        .bind(&write.log.provider)
        .bind(write.log.copay)
        .bind(write.log.checked_at)
        .bind(&write.log.details)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        debug!(appointment_id = write.appointment_id, "Verification committed");

        Ok(VerificationCommit {
            record: record.into(),
            appointment: appointment.try_into()?,
            log: log.into(),
        })
    }

    async fn append_log(&self, log: NewVerificationLog) -> InsuranceResult<VerificationLog> {
        let row = sqlx::query_as::<_, VerificationLogRow>(
            r#"
            INSERT INTO verification_logs
                (patient_id, appointment_id, status, provider, copay, last_checked, details)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, patient_id, appointment_id, status, provider, copay, last_checked, details
            "#,
        )
        .bind(log.patient_id)
        .bind(log.appointment_id)
        .bind(log.status.as_str())
        .bind(&log.provider)
        .bind(log.copay)
        .bind(log.checked_at)
        .bind(&log.details)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into())
    }

    async fn logs_for_appointment(&self, appointment_id: i64) -> InsuranceResult<Vec<VerificationLog>> {
        let rows = sqlx::query_as::<_, VerificationLogRow>(
            r#"
            SELECT id, patient_id, appointment_id, status, provider, copay, last_checked, details
            FROM verification_logs
            WHERE appointment_id = $1
            ORDER BY id ASC
            "#,
        )
        .bind(appointment_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(VerificationLog::from).collect())
    }

    async fn prune_logs_before(&self, cutoff: DateTime<Utc>) -> InsuranceResult<u64> {
        let result = sqlx::query("DELETE FROM verification_logs WHERE last_checked < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    async fn insert_alert(&self, alert: NewAlert) -> InsuranceResult<Alert> {
        let row = sqlx::query_as::<_, AlertRow>(&format!(
            "INSERT INTO alerts (appointment_id, alert_type, message, severity) \
             VALUES ($1, $2, $3, $4) \
             RETURNING {ALERT_COLUMNS}"
        ))
        .bind(alert.appointment_id)
        .bind(&alert.alert_type)
        .bind(&alert.message)
        .bind(alert.severity.as_str())
        .fetch_one(&self.pool)
        .await?;

        row.try_into()
    }

    async fn get_alert(&self, alert_id: i64) -> InsuranceResult<Option<Alert>> {
        let row = sqlx::query_as::<_, AlertRow>(&format!(
            "SELECT {ALERT_COLUMNS} FROM alerts WHERE id = $1"
        ))
        .bind(alert_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Alert::try_from).transpose()
    }

    async fn set_alert_resolved(&self, alert_id: i64, resolved: bool) -> InsuranceResult<Alert> {
        let row = sqlx::query_as::<_, AlertRow>(&format!(
            "UPDATE alerts SET resolved = $2 WHERE id = $1 RETURNING {ALERT_COLUMNS}"
        ))
        .bind(alert_id)
        .bind(resolved)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| InsuranceError::not_found("alert", alert_id))?;

        row.try_into()
    }

    async fn clinic_alerts(&self, clinic_id: i64) -> InsuranceResult<Vec<Alert>> {
        let rows = sqlx::query_as::<_, AlertRow>(
            r#"
            SELECT a.id, a.appointment_id, a.alert_type, a.message, a.severity, a.resolved, a.created_at
            FROM alerts a
            JOIN appointments ap ON ap.id = a.appointment_id
            WHERE ap.clinic_id = $1
            ORDER BY a.created_at DESC, a.id DESC
            "#,
        )
        .bind(clinic_id)
        .fetch_all(&self.pool)
        .await?;

        collect(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AlertSeverity, AppointmentStatus};

    fn appointment_row(status: &str, verification_status: &str) -> AppointmentRow {
        AppointmentRow {
            id: 1,
            patient_id: 2,
            clinic_id: 3,
            scheduled_time: Utc::now(),
            status: status.into(),
            verification_status: verification_status.into(),
            copay: None,
            provider: Some("Aetna".into()),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_appointment_row_conversion() {
        let appointment = Appointment::try_from(appointment_row("scheduled", "expired")).unwrap();
        assert_eq!(appointment.status, AppointmentStatus::Scheduled);
        assert_eq!(appointment.verification_status, VerificationStatus::Expired);
    }

    #[test]
    fn test_unknown_verification_status_degrades_to_review() {
        let appointment = Appointment::try_from(appointment_row("scheduled", "lapsed")).unwrap();
        assert_eq!(appointment.verification_status, VerificationStatus::NeedsReview);
    }

    #[test]
    fn test_unknown_appointment_status_is_rejected() {
        let err = Appointment::try_from(appointment_row("no_show", "verified")).unwrap_err();
        assert!(matches!(err, InsuranceError::InvalidData(_)));
    }

    #[test]
    fn test_alert_row_conversion() {
        let alert = Alert::try_from(AlertRow {
            id: 5,
            appointment_id: 1,
            alert_type: "insurance".into(),
            message: "Insurance expired for appointment 1.".into(),
            severity: "critical".into(),
            resolved: false,
            created_at: Utc::now(),
        })
        .unwrap();
        assert_eq!(alert.severity, AlertSeverity::Critical);
    }
}

//! Persistence seam for the verification engine
//!
//! The engine never talks to a database directly. Every read and write goes
//! through [`VerificationStore`], which has an in-memory implementation for
//! tests and local runs and a PostgreSQL implementation for deployment.

mod memory;
mod postgres;

pub use memory::InMemoryVerificationStore;
pub use postgres::PgVerificationStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::InsuranceResult;
use crate::models::{
    Alert, Appointment, InsuranceRecord, NewAlert, NewInsuranceRecord, NewVerificationLog,
    Patient, VerificationCommit, VerificationLog, VerificationWrite,
};

#[async_trait]
pub trait VerificationStore: Send + Sync {
    async fn get_patient(&self, patient_id: i64) -> InsuranceResult<Option<Patient>>;

    async fn get_appointment(&self, appointment_id: i64) -> InsuranceResult<Option<Appointment>>;

    /// Appointments with `start <= scheduled_time <= end`, earliest first
    async fn appointments_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> InsuranceResult<Vec<Appointment>>;

    /// A clinic's appointments ordered by scheduled time ascending
    async fn clinic_appointments(&self, clinic_id: i64, limit: usize) -> InsuranceResult<Vec<Appointment>>;

    async fn find_insurance_record(&self, patient_id: i64) -> InsuranceResult<Option<InsuranceRecord>>;

    /// Insert `record`, or return the patient's existing record if one raced in first
    async fn get_or_create_insurance_record(
        &self,
        record: NewInsuranceRecord,
    ) -> InsuranceResult<InsuranceRecord>;

    /// Apply record update, appointment mirror and audit log as one unit
    ///
    /// Either all three become visible or none does. Fails with `NotFound`
    /// if the record or appointment no longer exists.
    async fn commit_verification(&self, write: VerificationWrite) -> InsuranceResult<VerificationCommit>;

    /// Standalone audit entry, used for payer lookups
    async fn append_log(&self, log: NewVerificationLog) -> InsuranceResult<VerificationLog>;

    async fn logs_for_appointment(&self, appointment_id: i64) -> InsuranceResult<Vec<VerificationLog>>;

    /// Delete logs checked before `cutoff`; returns how many were removed
    async fn prune_logs_before(&self, cutoff: DateTime<Utc>) -> InsuranceResult<u64>;

    async fn insert_alert(&self, alert: NewAlert) -> InsuranceResult<Alert>;

    async fn get_alert(&self, alert_id: i64) -> InsuranceResult<Option<Alert>>;

    async fn set_alert_resolved(&self, alert_id: i64, resolved: bool) -> InsuranceResult<Alert>;

    /// Alerts on a clinic's appointments, newest first
    async fn clinic_alerts(&self, clinic_id: i64) -> InsuranceResult<Vec<Alert>>;
}

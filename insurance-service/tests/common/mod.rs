#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use insurance_service::*;

pub fn patient(id: i64, clinic_id: i64, first_name: &str, last_name: &str) -> Patient {
    Patient {
        id,
        clinic_id,
        first_name: first_name.into(),
        last_name: last_name.into(),
        dob: None,
        phone: None,
        primary_provider: None,
    }
}

pub fn appointment(id: i64, patient_id: i64, clinic_id: i64, scheduled_time: DateTime<Utc>) -> Appointment {
    Appointment {
        id,
        patient_id,
        clinic_id,
        scheduled_time,
        status: AppointmentStatus::Scheduled,
        verification_status: VerificationStatus::NeedsReview,
        copay: None,
        provider: None,
        updated_at: scheduled_time,
    }
}

/// Clinic 1 with John Doe (patient 7) and Jane Roe (patient 1)
pub async fn seeded_store() -> Arc<InMemoryVerificationStore> {
    let store = Arc::new(InMemoryVerificationStore::new());
    store.insert_patient(patient(7, 1, "John", "Doe")).await;
    store.insert_patient(patient(1, 1, "Jane", "Roe")).await;
    store
}

pub fn hours_from_now(hours: i64) -> DateTime<Utc> {
    Utc::now() + Duration::hours(hours)
}

/// Delegating store that fails selected operations
pub struct FaultyStore {
    pub inner: Arc<InMemoryVerificationStore>,
    pub fail_commits_for: HashSet<i64>,
    pub fail_alerts: bool,
    /// Held before every window query, to keep a sweep in flight
    pub window_delay: Option<std::time::Duration>,
}

impl FaultyStore {
    pub fn new(inner: Arc<InMemoryVerificationStore>) -> Self {
        Self {
            inner,
            fail_commits_for: HashSet::new(),
            fail_alerts: false,
            window_delay: None,
        }
    }
}

#[async_trait]
impl VerificationStore for FaultyStore {
    async fn get_patient(&self, patient_id: i64) -> InsuranceResult<Option<Patient>> {
        self.inner.get_patient(patient_id).await
    }

    async fn get_appointment(&self, appointment_id: i64) -> InsuranceResult<Option<Appointment>> {
        self.inner.get_appointment(appointment_id).await
    }

    async fn appointments_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> InsuranceResult<Vec<Appointment>> {
        if let Some(delay) = self.window_delay {
            tokio::time::sleep(delay).await;
        }
        self.inner.appointments_between(start, end).await
    }

    async fn clinic_appointments(&self, clinic_id: i64, limit: usize) -> InsuranceResult<Vec<Appointment>> {
        self.inner.clinic_appointments(clinic_id, limit).await
    }

    async fn find_insurance_record(&self, patient_id: i64) -> InsuranceResult<Option<InsuranceRecord>> {
        self.inner.find_insurance_record(patient_id).await
    }

    async fn get_or_create_insurance_record(
        &self,
        record: NewInsuranceRecord,
    ) -> InsuranceResult<InsuranceRecord> {
        self.inner.get_or_create_insurance_record(record).await
    }

    async fn commit_verification(&self, write: VerificationWrite) -> InsuranceResult<VerificationCommit> {
        if self.fail_commits_for.contains(&write.appointment_id) {
            return Err(InsuranceError::Store("connection reset".into()));
        }
        self.inner.commit_verification(write).await
    }

    async fn append_log(&self, log: NewVerificationLog) -> InsuranceResult<VerificationLog> {
        self.inner.append_log(log).await
    }

    async fn logs_for_appointment(&self, appointment_id: i64) -> InsuranceResult<Vec<VerificationLog>> {
        self.inner.logs_for_appointment(appointment_id).await
    }

    async fn prune_logs_before(&self, cutoff: DateTime<Utc>) -> InsuranceResult<u64> {
        self.inner.prune_logs_before(cutoff).await
    }

    async fn insert_alert(&self, alert: NewAlert) -> InsuranceResult<Alert> {
        if self.fail_alerts {
            return Err(InsuranceError::Store("alerts table unavailable".into()));
        }
        self.inner.insert_alert(alert).await
    }

    async fn get_alert(&self, alert_id: i64) -> InsuranceResult<Option<Alert>> {
        self.inner.get_alert(alert_id).await
    }

    async fn set_alert_resolved(&self, alert_id: i64, resolved: bool) -> InsuranceResult<Alert> {
        self.inner.set_alert_resolved(alert_id, resolved).await
    }

    async fn clinic_alerts(&self, clinic_id: i64) -> InsuranceResult<Vec<Alert>> {
        self.inner.clinic_alerts(clinic_id).await
    }
}

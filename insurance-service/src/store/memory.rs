use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use super::VerificationStore;
use crate::error::{InsuranceError, InsuranceResult};
use crate::models::{
    Alert, Appointment, InsuranceRecord, NewAlert, NewInsuranceRecord, NewVerificationLog,
    Patient, VerificationCommit, VerificationLog, VerificationWrite,
};

#[derive(Default)]
struct MemoryState {
    patients: BTreeMap<i64, Patient>,
    appointments: BTreeMap<i64, Appointment>,
    records: BTreeMap<i64, InsuranceRecord>,
    logs: BTreeMap<i64, VerificationLog>,
    alerts: BTreeMap<i64, Alert>,
    last_record_id: i64,
    last_log_id: i64,
    last_alert_id: i64,
}

/// In-memory store (for development and testing)
///
/// One write lock per operation; `commit_verification` validates before it
/// mutates, so a failed commit leaves nothing behind.
#[derive(Default)]
pub struct InMemoryVerificationStore {
    state: RwLock<MemoryState>,
}

impl InMemoryVerificationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a patient, standing in for the booking side
    pub async fn insert_patient(&self, patient: Patient) {
        self.state.write().await.patients.insert(patient.id, patient);
    }

    /// Seed an appointment, standing in for the booking side
    pub async fn insert_appointment(&self, appointment: Appointment) {
        self.state.write().await.appointments.insert(appointment.id, appointment);
    }

    pub async fn all_logs(&self) -> Vec<VerificationLog> {
        self.state.read().await.logs.values().cloned().collect()
    }

    pub async fn all_alerts(&self) -> Vec<Alert> {
        self.state.read().await.alerts.values().cloned().collect()
    }
}

#[async_trait]
impl VerificationStore for InMemoryVerificationStore {
    async fn get_patient(&self, patient_id: i64) -> InsuranceResult<Option<Patient>> {
        Ok(self.state.read().await.patients.get(&patient_id).cloned())
    }

    async fn get_appointment(&self, appointment_id: i64) -> InsuranceResult<Option<Appointment>> {
        Ok(self.state.read().await.appointments.get(&appointment_id).cloned())
    }

    async fn appointments_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> InsuranceResult<Vec<Appointment>> {
        let state = self.state.read().await;
        let mut appointments: Vec<Appointment> = state
            .appointments
            .values()
            .filter(|a| a.scheduled_time >= start && a.scheduled_time <= end)
            .cloned()
            .collect();
        appointments.sort_by_key(|a| (a.scheduled_time, a.id));
        Ok(appointments)
    }

    async fn clinic_appointments(&self, clinic_id: i64, limit: usize) -> InsuranceResult<Vec<Appointment>> {
        let state = self.state.read().await;
        let mut appointments: Vec<Appointment> = state
            .appointments
            .values()
            .filter(|a| a.clinic_id == clinic_id)
            .cloned()
            .collect();
        appointments.sort_by_key(|a| (a.scheduled_time, a.id));
        appointments.truncate(limit);
        Ok(appointments)
    }

    async fn find_insurance_record(&self, patient_id: i64) -> InsuranceResult<Option<InsuranceRecord>> {
        let state = self.state.read().await;
        Ok(state.records.values().find(|r| r.patient_id == patient_id).cloned())
    }

    async fn get_or_create_insurance_record(
        &self,
        record: NewInsuranceRecord,
    ) -> InsuranceResult<InsuranceRecord> {
        let mut state = self.state.write().await;
        if let Some(existing) = state.records.values().find(|r| r.patient_id == record.patient_id) {
            return Ok(existing.clone());
        }

        state.last_record_id += 1;
        let created = InsuranceRecord {
            id: state.last_record_id,
            patient_id: record.patient_id,
            provider: record.provider,
            status: record.status,
            copay: None,
            last_checked: None,
            policy_id: record.policy_id,
        };
        state.records.insert(created.id, created.clone());
        Ok(created)
    }

    async fn commit_verification(&self, write: VerificationWrite) -> InsuranceResult<VerificationCommit> {
        let mut state = self.state.write().await;
        if !state.records.contains_key(&write.insurance_record_id) {
            return Err(InsuranceError::not_found("insurance record", write.insurance_record_id));
        }
        if !state.appointments.contains_key(&write.appointment_id) {
            return Err(InsuranceError::not_found("appointment", write.appointment_id));
        }

        let record = state
            .records
            .get_mut(&write.insurance_record_id)
            .ok_or_else(|| InsuranceError::not_found("insurance record", write.insurance_record_id))?;
        record.provider = write.provider.clone();
        record.status = write.status;
        record.copay = write.copay;
        record.last_checked = Some(write.checked_at);
        let record = record.clone();

        let appointment = state
            .appointments
            .get_mut(&write.appointment_id)
            .ok_or_else(|| InsuranceError::not_found("appointment", write.appointment_id))?;
        appointment.verification_status = write.status;
        appointment.copay = write.copay;
        appointment.provider = Some(write.provider.clone());
        appointment.updated_at = write.checked_at;
        let appointment = appointment.clone();

        state.last_log_id += 1;
        let log = VerificationLog {
            id: state.last_log_id,
            patient_id: write.log.patient_id,
            appointment_id: write.log.appointment_id,
            status: write.log.status,
            provider: write.log.provider,
            copay: write.log.copay,
            last_checked: write.log.checked_at,
            details: write.log.details,
        };
        state.logs.insert(log.id, log.clone());

        Ok(VerificationCommit { record, appointment, log })
    }

    async fn append_log(&self, log: NewVerificationLog) -> InsuranceResult<VerificationLog> {
        let mut state = self.state.write().await;
        state.last_log_id += 1;
        let log = VerificationLog {
            id: state.last_log_id,
            patient_id: log.patient_id,
            appointment_id: log.appointment_id,
            status: log.status,
            provider: log.provider,
            copay: log.copay,
            last_checked: log.checked_at,
            details: log.details,
        };
        state.logs.insert(log.id, log.clone());
        Ok(log)
    }

    async fn logs_for_appointment(&self, appointment_id: i64) -> InsuranceResult<Vec<VerificationLog>> {
        let state = self.state.read().await;
        Ok(state
            .logs
            .values()
            .filter(|log| log.appointment_id == Some(appointment_id))
            .cloned()
            .collect())
    }

    async fn prune_logs_before(&self, cutoff: DateTime<Utc>) -> InsuranceResult<u64> {
        let mut state = self.state.write().await;
        let before = state.logs.len();
        state.logs.retain(|_, log| log.last_checked >= cutoff);
        Ok((before - state.logs.len()) as u64)
    }

    async fn insert_alert(&self, alert: NewAlert) -> InsuranceResult<Alert> {
        let mut state = self.state.write().await;
        if !state.appointments.contains_key(&alert.appointment_id) {
            return Err(InsuranceError::not_found("appointment", alert.appointment_id));
        }

        state.last_alert_id += 1;
        let alert = Alert {
            id: state.last_alert_id,
            appointment_id: alert.appointment_id,
            alert_type: alert.alert_type,
            message: alert.message,
            severity: alert.severity,
            resolved: false,
            created_at: Utc::now(),
        };
        state.alerts.insert(alert.id, alert.clone());
        Ok(alert)
    }

    async fn get_alert(&self, alert_id: i64) -> InsuranceResult<Option<Alert>> {
        Ok(self.state.read().await.alerts.get(&alert_id).cloned())
    }

    async fn set_alert_resolved(&self, alert_id: i64, resolved: bool) -> InsuranceResult<Alert> {
        let mut state = self.state.write().await;
        let alert = state
            .alerts
            .get_mut(&alert_id)
            .ok_or_else(|| InsuranceError::not_found("alert", alert_id))?;
        alert.resolved = resolved;
        Ok(alert.clone())
    }

    async fn clinic_alerts(&self, clinic_id: i64) -> InsuranceResult<Vec<Alert>> {
        let state = self.state.read().await;
        let mut alerts: Vec<Alert> = state
            .alerts
            .values()
            .filter(|alert| {
                state
                    .appointments
                    .get(&alert.appointment_id)
                    .is_some_and(|a| a.clinic_id == clinic_id)
            })
            .cloned()
            .collect();
        alerts.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(alerts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AlertSeverity, AppointmentStatus, VerificationStatus};
    use chrono::Duration;

    fn appointment(id: i64, clinic_id: i64, scheduled_time: DateTime<Utc>) -> Appointment {
        Appointment {
            id,
            patient_id: 1,
            clinic_id,
            scheduled_time,
            status: AppointmentStatus::Scheduled,
            verification_status: VerificationStatus::NeedsReview,
            copay: None,
            provider: None,
            updated_at: scheduled_time,
        }
    }

    fn write_for(record_id: i64, appointment_id: i64) -> VerificationWrite {
        let checked_at = Utc::now();
        VerificationWrite {
            insurance_record_id: record_id,
            appointment_id,
            provider: "Aetna".into(),
            status: VerificationStatus::Verified,
            copay: Some(27.0),
            checked_at,
            log: NewVerificationLog {
                patient_id: 1,
                appointment_id: Some(appointment_id),
                status: VerificationStatus::Verified,
                provider: "Aetna".into(),
                copay: Some(27.0),
                checked_at,
                details: None,
            },
        }
    }

    #[tokio::test]
    async fn test_one_record_per_patient() {
        let store = InMemoryVerificationStore::new();
        let first = store
            .get_or_create_insurance_record(NewInsuranceRecord::placeholder(1, "Aetna"))
            .await
            .unwrap();
        let second = store
            .get_or_create_insurance_record(NewInsuranceRecord::placeholder(1, "Cigna"))
            .await
            .unwrap();
        assert_eq!(first, second);
        assert_eq!(second.provider, "Aetna");
    }

    #[tokio::test]
    async fn test_commit_updates_all_three() {
        let store = InMemoryVerificationStore::new();
        store.insert_appointment(appointment(4, 1, Utc::now())).await;
        let record = store
            .get_or_create_insurance_record(NewInsuranceRecord::placeholder(1, "Aetna"))
            .await
            .unwrap();

        let commit = store.commit_verification(write_for(record.id, 4)).await.unwrap();
        assert_eq!(commit.record.status, VerificationStatus::Verified);
        assert_eq!(commit.appointment.verification_status, VerificationStatus::Verified);
        assert_eq!(commit.appointment.copay, commit.record.copay);
        assert_eq!(store.logs_for_appointment(4).await.unwrap(), vec![commit.log]);
    }

    #[tokio::test]
    async fn test_failed_commit_writes_nothing() {
        let store = InMemoryVerificationStore::new();
        let record = store
            .get_or_create_insurance_record(NewInsuranceRecord::placeholder(1, "Aetna"))
            .await
            .unwrap();

        let err = store.commit_verification(write_for(record.id, 99)).await.unwrap_err();
        assert!(err.is_not_found());
        let untouched = store.find_insurance_record(1).await.unwrap().unwrap();
        assert_eq!(untouched.status, VerificationStatus::NeedsReview);
        assert!(untouched.last_checked.is_none());
        assert!(store.all_logs().await.is_empty());
    }

    #[tokio::test]
    async fn test_window_bounds_are_inclusive() {
        let store = InMemoryVerificationStore::new();
        let start = Utc::now();
        let end = start + Duration::days(2);
        store.insert_appointment(appointment(1, 1, start)).await;
        store.insert_appointment(appointment(2, 1, end)).await;
        store.insert_appointment(appointment(3, 1, end + Duration::seconds(1))).await;
        store.insert_appointment(appointment(4, 1, start - Duration::seconds(1))).await;

        let ids: Vec<i64> = store
            .appointments_between(start, end)
            .await
            .unwrap()
            .iter()
            .map(|a| a.id)
            .collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_prune_keeps_recent_logs() {
        let store = InMemoryVerificationStore::new();
        let now = Utc::now();
        for age in [1, 10, 40] {
            store
                .append_log(NewVerificationLog {
                    patient_id: 0,
                    appointment_id: None,
                    status: VerificationStatus::Expired,
                    provider: "Aetna".into(),
                    copay: None,
                    checked_at: now - Duration::days(age),
                    details: None,
                })
                .await
                .unwrap();
        }

        let pruned = store.prune_logs_before(now - Duration::days(30)).await.unwrap();
        assert_eq!(pruned, 1);
        assert_eq!(store.all_logs().await.len(), 2);
    }

    #[tokio::test]
    async fn test_clinic_alerts_newest_first() {
        let store = InMemoryVerificationStore::new();
        store.insert_appointment(appointment(1, 1, Utc::now())).await;
        store.insert_appointment(appointment(2, 2, Utc::now())).await;

        for appointment_id in [1, 1, 2] {
            store
                .insert_alert(NewAlert {
                    appointment_id,
                    alert_type: "insurance".into(),
                    message: "Insurance expired.".into(),
                    severity: AlertSeverity::Critical,
                })
                .await
                .unwrap();
        }

        let ids: Vec<i64> = store.clinic_alerts(1).await.unwrap().iter().map(|a| a.id).collect();
        assert_eq!(ids, vec![2, 1]);
        assert!(store.set_alert_resolved(3, true).await.unwrap().resolved);
        assert!(store.set_alert_resolved(42, true).await.unwrap_err().is_not_found());
    }
}

// Record manager: one verification run per appointment
use std::sync::Arc;

use chrono::Utc;
use logger_redacted::{redacted_info, redacted_warn};
use tracing::{debug, instrument};

use crate::alerts::{AlertDispatch, AlertGenerator};
use crate::error::InsuranceResult;
use crate::models::{
    Appointment, InsuranceRecord, NewInsuranceRecord, NewVerificationLog, VerificationStatus,
    VerificationWrite,
};
use crate::oracle::{CoverageOracle, DeterministicOracle};
use crate::store::VerificationStore;

/// Result of [`EligibilityVerifier::run_check`]
#[derive(Debug, Clone, PartialEq)]
pub struct VerificationRun {
    pub record: InsuranceRecord,
    pub appointment: Appointment,
    pub status: VerificationStatus,
    pub alert: AlertDispatch,
}

pub fn verification_details(appointment_id: i64, manual: bool) -> String {
    if manual {
        format!("Manual re-verification requested for appointment {appointment_id}.")
    } else {
        format!("Verification executed via scheduler for appointment {appointment_id}.")
    }
}

pub struct EligibilityVerifier {
    store: Arc<dyn VerificationStore>,
    oracle: Arc<dyn CoverageOracle>,
    alerts: AlertGenerator,
    /// Provider for a patient's placeholder record when the caller gave none
    default_provider: String,
}

impl EligibilityVerifier {
    pub fn new(
        store: Arc<dyn VerificationStore>,
        alerts: AlertGenerator,
        default_provider: impl Into<String>,
    ) -> Self {
        Self {
            store,
            oracle: Arc::new(DeterministicOracle),
            alerts,
            default_provider: default_provider.into(),
        }
    }

    pub fn with_oracle(mut self, oracle: Arc<dyn CoverageOracle>) -> Self {
        self.oracle = oracle;
        self
    }

    pub fn store(&self) -> &Arc<dyn VerificationStore> {
        &self.store
    }

    /// Verify coverage for one appointment
    ///
    /// The record update, the appointment mirror and the audit log are
    /// committed together. Alerting happens afterwards and its failure is
    /// reported in [`VerificationRun::alert`] instead of failing the run.
    #[instrument(skip(self, appointment), fields(appointment_id = appointment.id, patient_id = appointment.patient_id))]
    pub async fn run_check(
        &self,
        appointment: &Appointment,
        provider_name: Option<&str>,
        manual: bool,
    ) -> InsuranceResult<VerificationRun> {
        let provider_name = provider_name.map(str::trim).filter(|name| !name.is_empty());
        let record = self.ensure_record(appointment.patient_id, provider_name).await?;

        let outcome = self.oracle.evaluate(appointment.patient_id, appointment.id);
        let provider = provider_name.unwrap_or(record.provider.as_str()).to_string();
        let checked_at = Utc::now();

        let commit = self
            .store
            .commit_verification(VerificationWrite {
                insurance_record_id: record.id,
                appointment_id: appointment.id,
                provider: provider.clone(),
                status: outcome.status,
                copay: outcome.copay,
                checked_at,
                log: NewVerificationLog {
                    patient_id: appointment.patient_id,
                    appointment_id: Some(appointment.id),
                    status: outcome.status,
                    provider,
                    copay: outcome.copay,
                    checked_at,
                    details: Some(verification_details(appointment.id, manual)),
                },
            })
            .await?;

        debug!(status = %outcome.status, copay = ?outcome.copay, "Verification recorded");

        let alert = if outcome.status.needs_attention() {
            match self.alerts.create_alert(&commit.appointment, outcome.status, manual).await {
                Ok(alert) => AlertDispatch::Raised(alert),
                Err(e) => {
                    redacted_warn!(
                        "Alert could not be raised for appointment {}, verification kept: {}",
                        appointment.id,
                        e
                    );
                    AlertDispatch::Failed(e.to_string())
                }
            }
        } else {
            AlertDispatch::NotRequired
        };

        Ok(VerificationRun {
            record: commit.record,
            appointment: commit.appointment,
            status: outcome.status,
            alert,
        })
    }

    async fn ensure_record(
        &self,
        patient_id: i64,
        provider_name: Option<&str>,
    ) -> InsuranceResult<InsuranceRecord> {
        if let Some(record) = self.store.find_insurance_record(patient_id).await? {
            return Ok(record);
        }

        let provider = provider_name.unwrap_or(self.default_provider.as_str());
        let record = self
            .store
            .get_or_create_insurance_record(NewInsuranceRecord::placeholder(patient_id, provider))
            .await?;
        redacted_info!(
            "Created insurance record {} ({}) for patient id {}",
            record.id,
            record.policy_id.as_deref().unwrap_or("no policy"),
            patient_id
        );
        Ok(record)
    }
}

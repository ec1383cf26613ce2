// Alert generation for verification runs that need staff attention
use std::sync::Arc;

use events_bus::{BroadcastHub, HubEvent};
use logger_redacted::redacted_info;
use tracing::debug;

use crate::error::InsuranceResult;
use crate::models::{Alert, AlertSeverity, Appointment, NewAlert, Patient, VerificationStatus};
use crate::store::VerificationStore;

pub const INSURANCE_ALERT_TYPE: &str = "insurance";
pub const MANUAL_RECHECK_SUFFIX: &str = " Manual re-check requested.";

/// What happened to the alert side of a verification run
#[derive(Debug, Clone, PartialEq)]
pub enum AlertDispatch {
    /// Coverage verified, nothing raised
    NotRequired,
    Raised(Alert),
    /// Alert could not be persisted; the verification itself still stands
    Failed(String),
}

impl AlertDispatch {
    pub fn alert(&self) -> Option<&Alert> {
        match self {
            Self::Raised(alert) => Some(alert),
            _ => None,
        }
    }
}

/// `"Insurance expired for patient John Doe."`, falling back to the
/// appointment id when the patient is unknown
pub fn alert_message(
    patient: Option<&Patient>,
    appointment_id: i64,
    status: VerificationStatus,
    manual: bool,
) -> String {
    let mut message = match patient {
        Some(patient) => format!(
            "Insurance {} for patient {} {}.",
            status.humanized(),
            patient.first_name,
            patient.last_name
        ),
        None => format!("Insurance {} for appointment {}.", status.humanized(), appointment_id),
    };
    if manual {
        message.push_str(MANUAL_RECHECK_SUFFIX);
    }
    message
}

#[derive(Clone)]
pub struct AlertGenerator {
    store: Arc<dyn VerificationStore>,
    hub: BroadcastHub,
}

impl AlertGenerator {
    pub fn new(store: Arc<dyn VerificationStore>, hub: BroadcastHub) -> Self {
        Self { store, hub }
    }

    pub fn hub(&self) -> &BroadcastHub {
        &self.hub
    }

    /// Persist an alert for `appointment` and push it to connected observers
    ///
    /// Fails only if the alert cannot be stored. Delivery to observers is
    /// best effort and never surfaces an error.
    pub async fn create_alert(
        &self,
        appointment: &Appointment,
        status: VerificationStatus,
        manual: bool,
    ) -> InsuranceResult<Alert> {
        let patient = match self.store.get_patient(appointment.patient_id).await {
            Ok(patient) => patient,
            Err(e) => {
                debug!(appointment_id = appointment.id, error = %e, "Patient lookup failed, alert falls back to appointment id");
                None
            }
        };

        let alert = self
            .store
            .insert_alert(NewAlert {
                appointment_id: appointment.id,
                alert_type: INSURANCE_ALERT_TYPE.to_string(),
                message: alert_message(patient.as_ref(), appointment.id, status, manual),
                severity: AlertSeverity::for_status(status),
            })
            .await?;

        redacted_info!(
            "Raised {} alert {} for appointment {}: {}",
            alert.severity,
            alert.id,
            alert.appointment_id,
            alert.message
        );

        let event = HubEvent::alert(
            alert.id,
            alert.appointment_id,
            alert.severity.as_str(),
            &alert.message,
            alert.created_at,
        );
        let report = self.hub.broadcast(&event).await;
        debug!(alert_id = alert.id, delivered = report.delivered, pruned = report.pruned.len(), "Alert published");

        Ok(alert)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn patient() -> Patient {
        Patient {
            id: 7,
            clinic_id: 1,
            first_name: "John".into(),
            last_name: "Doe".into(),
            dob: None,
            phone: None,
            primary_provider: None,
        }
    }

    #[test]
    fn test_message_names_patient() {
        let message = alert_message(Some(&patient()), 42, VerificationStatus::Expired, false);
        assert_eq!(message, "Insurance expired for patient John Doe.");
    }

    #[test]
    fn test_message_falls_back_to_appointment() {
        let message = alert_message(None, 42, VerificationStatus::NeedsReview, false);
        assert_eq!(message, "Insurance needs review for appointment 42.");
    }

    #[test]
    fn test_manual_suffix() {
        let message = alert_message(Some(&patient()), 42, VerificationStatus::NeedsReview, true);
        assert_eq!(message, "Insurance needs review for patient John Doe. Manual re-check requested.");
    }
}

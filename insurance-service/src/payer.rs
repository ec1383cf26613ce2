// Payer lookup simulator
use std::sync::Arc;

use chrono::Utc;
use logger_redacted::redacted_info;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::error::{InsuranceError, InsuranceResult};
use crate::models::{NewVerificationLog, PayerVerificationRequest, PayerVerificationResponse, VerificationStatus};
use crate::oracle::{digest_mod, round_cents, sha256};
use crate::store::VerificationStore;

pub const PLAN_TYPES: [&str; 4] = ["HMO", "PPO", "EPO", "POS"];

/// Deterministic part of a payer lookup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayerQuote {
    pub status: VerificationStatus,
    pub plan_type: String,
    pub copay: Option<f64>,
    pub deductible: f64,
}

impl PayerQuote {
    /// Same payer, patient name and policy always give the same quote
    pub fn compute(payer_id: &str, patient_name: &str, policy_id: Option<&str>) -> Self {
        let seed = format!("{}:{}:{}", payer_id, patient_name, policy_id.unwrap_or("unknown"));
        let digest = sha256(&seed);

        let status = VerificationStatus::ALL[digest_mod(&digest, VerificationStatus::ALL.len() as u64) as usize];
        let mut rng = StdRng::from_seed(digest);
        let plan_type = PLAN_TYPES.choose(&mut rng).copied().unwrap_or("PPO").to_string();

        let copay = match status {
            VerificationStatus::Verified => Some(round_cents(25.0 + digest_mod(&digest, 150) as f64)),
            _ => None,
        };
        let deductible = round_cents(500.0 + digest_mod(&digest, 1500) as f64);

        Self { status, plan_type, copay, deductible }
    }

    pub fn message(&self) -> String {
        match self.copay {
            Some(_) => "Patient coverage verified and copay assigned.".to_string(),
            None => format!("Coverage requires manual review ({}).", self.status.humanized()),
        }
    }
}

/// "aetna" -> "Aetna"
fn capitalize(value: &str) -> String {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

/// Stand-in for an external payer eligibility API
///
/// Every lookup is written to the verification log, attributed to the
/// appointment's patient or to patient id 0 when no appointment is given.
#[derive(Clone)]
pub struct PayerSimulator {
    store: Arc<dyn VerificationStore>,
}

impl PayerSimulator {
    pub fn new(store: Arc<dyn VerificationStore>) -> Self {
        Self { store }
    }

    pub async fn verify(
        &self,
        payer_id: &str,
        request: &PayerVerificationRequest,
    ) -> InsuranceResult<PayerVerificationResponse> {
        let patient_id = match request.appointment_id {
            Some(appointment_id) => {
                self.store
                    .get_appointment(appointment_id)
                    .await?
                    .ok_or_else(|| InsuranceError::not_found("appointment", appointment_id))?
                    .patient_id
            }
            None => 0,
        };

        let quote = PayerQuote::compute(payer_id, &request.patient_name, request.policy_id.as_deref());
        let verified_at = Utc::now();

        self.store
            .append_log(NewVerificationLog {
                patient_id,
                appointment_id: request.appointment_id,
                status: quote.status,
                provider: payer_id.to_string(),
                copay: quote.copay,
                checked_at: verified_at,
                details: Some(format!("Payer simulator lookup for {}.", request.patient_name)),
            })
            .await?;

        redacted_info!(
            "Payer {} lookup for patient {}: {}",
            payer_id,
            request.patient_name,
            quote.status
        );

        Ok(PayerVerificationResponse {
            provider: capitalize(payer_id),
            message: quote.message(),
            status: quote.status,
            plan_type: quote.plan_type,
            copay: quote.copay,
            deductible: quote.deductible,
            verified_at,
        })
    }
}

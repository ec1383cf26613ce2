// Deterministic coverage oracle
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::models::VerificationStatus;

/// What the oracle says about one (patient, appointment) pair
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CoverageOutcome {
    pub status: VerificationStatus,
    /// Present only when `status` is `Verified`
    pub copay: Option<f64>,
}

/// Source of coverage decisions
///
/// Implementations must be pure: same inputs, same outcome, no I/O.
pub trait CoverageOracle: Send + Sync {
    fn evaluate(&self, patient_id: i64, appointment_id: i64) -> CoverageOutcome;
}

/// SHA-256 based stand-in for a real payer network
#[derive(Debug, Clone, Copy, Default)]
pub struct DeterministicOracle;

impl CoverageOracle for DeterministicOracle {
    fn evaluate(&self, patient_id: i64, appointment_id: i64) -> CoverageOutcome {
        let digest = sha256(&format!("{patient_id}-{appointment_id}"));
        let index = digest_mod(&digest, VerificationStatus::ALL.len() as u64) as usize;
        let status = VerificationStatus::ALL[index];

        let copay = match status {
            VerificationStatus::Verified => Some(copay_for_patient(patient_id)),
            _ => None,
        };
        CoverageOutcome { status, copay }
    }
}

/// `20 + (patient_id mod 4) * 7`, rounded to cents
pub fn copay_for_patient(patient_id: i64) -> f64 {
    round_cents(20.0 + (patient_id.rem_euclid(4) as f64) * 7.0)
}

pub(crate) fn sha256(key: &str) -> [u8; 32] {
    Sha256::digest(key.as_bytes()).into()
}

/// Remainder of the digest read as a big-endian unsigned integer
pub(crate) fn digest_mod(digest: &[u8], modulus: u64) -> u64 {
    let modulus = u128::from(modulus.max(1));
    let rem = digest
        .iter()
        .fold(0u128, |acc, byte| (acc * 256 + u128::from(*byte)) % modulus);
    rem as u64
}

pub(crate) fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn evaluate(patient_id: i64, appointment_id: i64) -> CoverageOutcome {
        DeterministicOracle.evaluate(patient_id, appointment_id)
    }

    #[test]
    fn test_known_outcomes() {
        let verified = evaluate(1, 4);
        assert_eq!(verified.status, VerificationStatus::Verified);
        assert_eq!(verified.copay, Some(27.0));

        assert_eq!(evaluate(1, 1).status, VerificationStatus::NeedsReview);
        assert_eq!(evaluate(1, 2).status, VerificationStatus::Expired);
        assert_eq!(evaluate(7, 42).status, VerificationStatus::Expired);
        assert_eq!(evaluate(4, 2).copay, Some(20.0));
        assert_eq!(evaluate(5, 3).copay, Some(27.0));
    }

    #[test]
    fn test_copay_formula() {
        assert_eq!(copay_for_patient(0), 20.0);
        assert_eq!(copay_for_patient(1), 27.0);
        assert_eq!(copay_for_patient(2), 34.0);
        assert_eq!(copay_for_patient(3), 41.0);
        assert_eq!(copay_for_patient(4), 20.0);
    }

    #[test]
    fn test_digest_mod_matches_small_integers() {
        assert_eq!(digest_mod(&[0x01, 0x00], 3), 256 % 3);
        assert_eq!(digest_mod(&[0xff, 0xff, 0xff], 7), 0xff_ffff % 7);
        assert_eq!(digest_mod(&[], 3), 0);
    }

    proptest! {
        #[test]
        fn prop_oracle_is_deterministic(patient_id in 0i64..1_000_000, appointment_id in 0i64..1_000_000) {
            prop_assert_eq!(evaluate(patient_id, appointment_id), evaluate(patient_id, appointment_id));
        }

        #[test]
        fn prop_copay_present_only_when_verified(patient_id in 0i64..1_000_000, appointment_id in 0i64..1_000_000) {
            let outcome = evaluate(patient_id, appointment_id);
            match outcome.status {
                VerificationStatus::Verified => {
                    let copay = outcome.copay.unwrap();
                    prop_assert!([20.0, 27.0, 34.0, 41.0].contains(&copay));
                    prop_assert_eq!(copay, copay_for_patient(patient_id));
                }
                _ => prop_assert!(outcome.copay.is_none()),
            }
        }
    }
}

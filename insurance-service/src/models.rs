use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::InsuranceError;

/// Coverage outcome of a verification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    Verified,
    NeedsReview,
    Expired,
}

impl VerificationStatus {
    /// Fixed order the oracle indexes into; changing it changes every outcome
    pub const ALL: [VerificationStatus; 3] = [
        VerificationStatus::Verified,
        VerificationStatus::NeedsReview,
        VerificationStatus::Expired,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Verified => "verified",
            Self::NeedsReview => "needs_review",
            Self::Expired => "expired",
        }
    }

    /// Wire form with underscores turned into spaces ("needs review")
    pub fn humanized(&self) -> String {
        self.as_str().replace('_', " ")
    }

    /// Anything other than `Verified` requires staff attention
    pub fn needs_attention(&self) -> bool {
        !matches!(self, Self::Verified)
    }

    /// Unknown stored values degrade to `NeedsReview` instead of failing
    pub fn parse_lenient(value: &str) -> Self {
        value.parse().unwrap_or(Self::NeedsReview)
    }
}

impl fmt::Display for VerificationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VerificationStatus {
    type Err = InsuranceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "verified" => Ok(Self::Verified),
            "needs_review" | "needs review" | "needs-review" => Ok(Self::NeedsReview),
            "expired" => Ok(Self::Expired),
            other => Err(InsuranceError::InvalidData(format!(
                "unknown verification status '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    Info,
    Warning,
    Critical,
}

impl AlertSeverity {
    /// Expired coverage is critical, review is a warning. `Verified` never
    /// raises an alert and maps to `Info` only for completeness.
    pub fn for_status(status: VerificationStatus) -> Self {
        match status {
            VerificationStatus::Expired => Self::Critical,
            VerificationStatus::NeedsReview => Self::Warning,
            VerificationStatus::Verified => Self::Info,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Critical => "critical",
        }
    }
}

impl fmt::Display for AlertSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AlertSeverity {
    type Err = InsuranceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "info" => Ok(Self::Info),
            "warning" => Ok(Self::Warning),
            "critical" => Ok(Self::Critical),
            other => Err(InsuranceError::InvalidData(format!("unknown alert severity '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppointmentStatus {
    Scheduled,
    Completed,
    Cancelled,
}

impl AppointmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Scheduled => "scheduled",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl FromStr for AppointmentStatus {
    type Err = InsuranceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "scheduled" => Ok(Self::Scheduled),
            "completed" => Ok(Self::Completed),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(InsuranceError::InvalidData(format!(
                "unknown appointment status '{other}'"
            ))),
        }
    }
}

/// Patient as owned by the booking side; read-only here
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Patient {
    pub id: i64,
    pub clinic_id: i64,
    pub first_name: String,
    pub last_name: String,
    pub dob: Option<NaiveDate>,
    pub phone: Option<String>,
    pub primary_provider: Option<String>,
}

impl Patient {
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name).trim().to_string()
    }
}

/// Appointment; the engine writes only the verification columns
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: i64,
    pub patient_id: i64,
    pub clinic_id: i64,
    pub scheduled_time: DateTime<Utc>,
    pub status: AppointmentStatus,
    pub verification_status: VerificationStatus,
    pub copay: Option<f64>,
    pub provider: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// One coverage record per patient
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsuranceRecord {
    pub id: i64,
    pub patient_id: i64,
    pub provider: String,
    pub status: VerificationStatus,
    pub copay: Option<f64>,
    pub last_checked: Option<DateTime<Utc>>,
    pub policy_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewInsuranceRecord {
    pub patient_id: i64,
    pub provider: String,
    pub status: VerificationStatus,
    pub policy_id: Option<String>,
}

impl NewInsuranceRecord {
    /// Placeholder created on a patient's first check: `POL-0007`, needs review
    pub fn placeholder(patient_id: i64, provider: impl Into<String>) -> Self {
        Self {
            patient_id,
            provider: provider.into(),
            status: VerificationStatus::NeedsReview,
            policy_id: Some(format!("POL-{patient_id:04}")),
        }
    }
}

/// Append-only audit row, one per verification run or payer lookup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationLog {
    pub id: i64,
    /// 0 when a payer lookup could not be attributed to a patient
    pub patient_id: i64,
    pub appointment_id: Option<i64>,
    pub status: VerificationStatus,
    pub provider: String,
    pub copay: Option<f64>,
    pub last_checked: DateTime<Utc>,
    pub details: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewVerificationLog {
    pub patient_id: i64,
    pub appointment_id: Option<i64>,
    pub status: VerificationStatus,
    pub provider: String,
    pub copay: Option<f64>,
    pub checked_at: DateTime<Utc>,
    pub details: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub id: i64,
    pub appointment_id: i64,
    #[serde(rename = "type")]
    pub alert_type: String,
    pub message: String,
    pub severity: AlertSeverity,
    pub resolved: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewAlert {
    pub appointment_id: i64,
    pub alert_type: String,
    pub message: String,
    pub severity: AlertSeverity,
}

/// Everything one verification run persists; applied as a single unit
#[derive(Debug, Clone, PartialEq)]
pub struct VerificationWrite {
    pub insurance_record_id: i64,
    pub appointment_id: i64,
    pub provider: String,
    pub status: VerificationStatus,
    pub copay: Option<f64>,
    pub checked_at: DateTime<Utc>,
    pub log: NewVerificationLog,
}

/// State after a committed [`VerificationWrite`]
#[derive(Debug, Clone, PartialEq)]
pub struct VerificationCommit {
    pub record: InsuranceRecord,
    pub appointment: Appointment,
    pub log: VerificationLog,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReverifyResult {
    pub appointment_id: i64,
    pub status: VerificationStatus,
    pub provider: String,
    pub copay: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationResult {
    pub appointment_id: i64,
    pub patient: String,
    pub provider: String,
    pub status: VerificationStatus,
    pub copay: Option<f64>,
    pub last_checked: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayerVerificationRequest {
    pub patient_name: String,
    #[serde(default)]
    pub dob: Option<NaiveDate>,
    pub policy_id: Option<String>,
    pub appointment_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayerVerificationResponse {
    /// Payer id, capitalized for display
    pub provider: String,
    pub status: VerificationStatus,
    pub plan_type: String,
    pub copay: Option<f64>,
    pub deductible: f64,
    pub message: String,
    pub verified_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_wire_names() {
        assert_eq!(VerificationStatus::NeedsReview.as_str(), "needs_review");
        assert_eq!(VerificationStatus::NeedsReview.humanized(), "needs review");
        assert_eq!(
            serde_json::to_string(&VerificationStatus::Expired).unwrap(),
            "\"expired\""
        );
    }

    #[test]
    fn test_status_parsing() {
        assert_eq!("verified".parse::<VerificationStatus>().unwrap(), VerificationStatus::Verified);
        assert_eq!("Needs Review".parse::<VerificationStatus>().unwrap(), VerificationStatus::NeedsReview);
        assert_eq!("needs-review".parse::<VerificationStatus>().unwrap(), VerificationStatus::NeedsReview);
        assert!("lapsed".parse::<VerificationStatus>().is_err());
        assert_eq!(VerificationStatus::parse_lenient("lapsed"), VerificationStatus::NeedsReview);
    }

    #[test]
    fn test_severity_follows_status() {
        assert_eq!(AlertSeverity::for_status(VerificationStatus::Expired), AlertSeverity::Critical);
        assert_eq!(AlertSeverity::for_status(VerificationStatus::NeedsReview), AlertSeverity::Warning);
    }

    #[test]
    fn test_placeholder_record() {
        let record = NewInsuranceRecord::placeholder(7, "Aetna");
        assert_eq!(record.policy_id.as_deref(), Some("POL-0007"));
        assert_eq!(record.status, VerificationStatus::NeedsReview);

        let wide = NewInsuranceRecord::placeholder(123456, "Aetna");
        assert_eq!(wide.policy_id.as_deref(), Some("POL-123456"));
    }

    #[test]
    fn test_alert_serializes_type_field() {
        let alert = Alert {
            id: 1,
            appointment_id: 2,
            alert_type: "insurance".into(),
            message: "Insurance expired for appointment 2.".into(),
            severity: AlertSeverity::Critical,
            resolved: false,
            created_at: Utc::now(),
        };
        let value = serde_json::to_value(&alert).unwrap();
        assert_eq!(value["type"], "insurance");
        assert_eq!(value["severity"], "critical");
    }
}

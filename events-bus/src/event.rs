// Event envelope pushed to observers
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Event type tag for a newly raised alert
pub const ALERT: &str = "alert";
/// Event type tag for a resolution toggle on an existing alert
pub const ALERT_UPDATE: &str = "alert:update";

/// `{type, payload}` envelope; the hub never inspects the payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HubEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    pub payload: Value,
}

impl HubEvent {
    pub fn new(event_type: impl Into<String>, payload: Value) -> Self {
        Self {
            event_type: event_type.into(),
            payload,
        }
    }

    pub fn alert(
        id: i64,
        appointment_id: i64,
        severity: &str,
        message: &str,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self::new(
            ALERT,
            json!({
                "id": id,
                "appointment_id": appointment_id,
                "severity": severity,
                "message": message,
                "created_at": created_at.to_rfc3339(),
            }),
        )
    }

    pub fn alert_update(id: i64, resolved: bool) -> Self {
        Self::new(ALERT_UPDATE, json!({ "id": id, "resolved": resolved }))
    }

    /// Serialized form sent over observer transports
    pub fn to_json(&self) -> crate::Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

//! Request/response DTOs for the message endpoints.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::DeliveryReport;

/// Request body for broadcast and directed send.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct SendMessageRequest {
    /// Opaque JSON message body, forwarded verbatim to recipients.
    pub message: serde_json::Value,
}

/// Delivery accounting returned by the message endpoints.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DeliveryResponse {
    /// Channel key the message was sent under.
    pub key: String,
    /// Target owner for directed sends; absent for broadcasts.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    /// Number of connections targeted by the snapshot.
    pub attempted: usize,
    /// Number of connections whose write succeeded.
    pub delivered: usize,
    /// `true` when every targeted write succeeded (trivially `true`
    /// for zero targets).
    pub complete: bool,
    /// Server timestamp of the fan-out.
    pub timestamp: DateTime<Utc>,
}

impl DeliveryResponse {
    /// Builds a response from a fan-out report.
    #[must_use]
    pub fn from_report(key: String, owner: Option<String>, report: &DeliveryReport) -> Self {
        Self {
            key,
            owner,
            attempted: report.attempted(),
            delivered: report.delivered(),
            complete: report.is_complete(),
            timestamp: Utc::now(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn empty_report_is_complete() {
        let response =
            DeliveryResponse::from_report("k".to_string(), None, &DeliveryReport::default());
        assert_eq!(response.attempted, 0);
        assert_eq!(response.delivered, 0);
        assert!(response.complete);
    }

    #[test]
    fn owner_field_is_omitted_for_broadcast() {
        let response =
            DeliveryResponse::from_report("k".to_string(), None, &DeliveryReport::default());
        let Ok(json) = serde_json::to_string(&response) else {
            panic!("serialization failed");
        };
        assert!(!json.contains("\"owner\""));
    }
}

//! Domain types: ingested access logs, detections and the alert read model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Format used when projecting persisted events into alerts
pub const ALERT_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// One HTTP access-log line reported by a client service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessLogEvent {
    pub timestamp: DateTime<Utc>,
    pub client_ip: String,
    pub endpoint: String,
    pub method: String,
    pub status_code: u16,
}

/// Kind of attack a detector reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AttackKind {
    #[serde(rename = "bruteforce")]
    BruteForce,
    #[serde(rename = "hightraffic")]
    HighTraffic,
}

impl AttackKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttackKind::BruteForce => "bruteforce",
            AttackKind::HighTraffic => "hightraffic",
        }
    }
}

impl fmt::Display for AttackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownAttackKind(pub String);

impl fmt::Display for UnknownAttackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown attack kind '{}'", self.0)
    }
}

impl std::error::Error for UnknownAttackKind {}

impl FromStr for AttackKind {
    type Err = UnknownAttackKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bruteforce" => Ok(AttackKind::BruteForce),
            "hightraffic" => Ok(AttackKind::HighTraffic),
            other => Err(UnknownAttackKind(other.to_string())),
        }
    }
}

/// A fired detection, before it is aggregated into its minute bucket
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityEvent {
    pub kind: AttackKind,
    pub timestamp: DateTime<Utc>,
    pub client_ip: String,
    pub details: String,
}

/// Durable, minute-bucketed aggregate of detections for one client and kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedSecurityEvent {
    pub id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub kind: AttackKind,
    pub client_ip: String,
    /// Start of the minute the detections fell into
    pub timestamp: DateTime<Utc>,
    pub attacks: i64,
    pub details: String,
}

/// Alert as served by the query API and stored in the alert cache.
///
/// An alert with every field empty is a padding entry, used to keep cached
/// pages at a fixed length.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alert {
    #[serde(rename = "type")]
    pub kind: String,
    pub timestamp: String,
    pub client_ip: String,
    pub details: String,
}

impl Alert {
    pub fn is_padding(&self) -> bool {
        self.kind.is_empty()
    }
}

impl From<&PersistedSecurityEvent> for Alert {
    fn from(event: &PersistedSecurityEvent) -> Self {
        Self {
            kind: event.kind.as_str().to_string(),
            timestamp: event.timestamp.format(ALERT_TIME_FORMAT).to_string(),
            client_ip: event.client_ip.clone(),
            details: event.details.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn attack_kind_round_trips_through_its_wire_name() {
        for kind in [AttackKind::BruteForce, AttackKind::HighTraffic] {
            assert_eq!(kind.as_str().parse::<AttackKind>(), Ok(kind));
            assert_eq!(
                serde_json::to_string(&kind).unwrap(),
                format!("\"{}\"", kind.as_str())
            );
        }
        assert!("sqlinjection".parse::<AttackKind>().is_err());
    }

    #[test]
    fn access_log_uses_snake_case_json_fields() {
        let event: AccessLogEvent = serde_json::from_str(
            r#"{"timestamp":"2025-01-08T12:00:00Z","client_ip":"192.168.1.1",
                "endpoint":"/api/v1/resource","method":"GET","status_code":401}"#,
        )
        .unwrap();
        assert_eq!(event.timestamp, Utc.with_ymd_and_hms(2025, 1, 8, 12, 0, 0).unwrap());
        assert_eq!(event.status_code, 401);
    }

    #[test]
    fn alert_projection_formats_bucket_timestamp() {
        let ts = Utc.with_ymd_and_hms(2025, 1, 8, 15, 4, 0).unwrap();
        let persisted = PersistedSecurityEvent {
            id: 1,
            created_at: ts,
            updated_at: ts,
            kind: AttackKind::HighTraffic,
            client_ip: "10.0.0.1".to_string(),
            timestamp: ts,
            attacks: 3,
            details: "10 consecutive requests within 1 minute".to_string(),
        };

        let alert = Alert::from(&persisted);
        assert_eq!(alert.kind, "hightraffic");
        assert_eq!(alert.timestamp, "2025-01-08T15:04:00Z");
        assert!(!alert.is_padding());
        assert!(Alert::default().is_padding());

        let json = serde_json::to_value(&alert).unwrap();
        assert_eq!(json["type"], "hightraffic");
    }
}

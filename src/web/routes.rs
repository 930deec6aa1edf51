//! HTTP routes: access-log ingestion and alert listing

use axum::{
    extract::{rejection::JsonRejection, rejection::QueryRejection, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::sync::Arc;
use tracing::{debug, error, warn};

use super::AppState;
use crate::domain::{AccessLogEvent, AttackKind};

/// Status envelope returned by every non-listing response
#[derive(Debug, Clone, Serialize)]
pub struct ApiResult {
    pub status: &'static str,
    pub message: &'static str,
}

pub const RESULT_LOG_OK: ApiResult = ApiResult {
    status: "success",
    message: "Log received and queued",
};

pub const RESULT_LOG_NOT_QUEUED: ApiResult = ApiResult {
    status: "fail",
    message: "Log received but not queued",
};

pub const RESULT_BAD_REQUEST: ApiResult = ApiResult {
    status: "fail",
    message: "Bad request",
};

pub const RESULT_INTERNAL: ApiResult = ApiResult {
    status: "fail",
    message: "Internal error",
};

fn reply(code: StatusCode, result: ApiResult) -> Response {
    (code, Json(result)).into_response()
}

#[derive(Debug, Deserialize)]
pub struct AccessLogRequest {
    pub timestamp: String,
    pub client_ip: String,
    pub endpoint: String,
    pub method: String,
    pub status_code: u16,
}

impl AccessLogRequest {
    fn into_event(self) -> Result<AccessLogEvent, String> {
        let timestamp = DateTime::parse_from_rfc3339(&self.timestamp)
            .map_err(|e| format!("invalid timestamp '{}': {}", self.timestamp, e))?
            .with_timezone(&Utc);
        let ip: IpAddr = self
            .client_ip
            .parse()
            .map_err(|_| format!("invalid client_ip '{}'", self.client_ip))?;
        if self.endpoint.is_empty() || self.method.is_empty() {
            return Err("endpoint and method are required".to_string());
        }
        if !(100..=599).contains(&self.status_code) {
            return Err(format!("invalid status_code {}", self.status_code));
        }

        Ok(AccessLogEvent {
            timestamp,
            client_ip: ip.to_string(),
            endpoint: self.endpoint,
            method: self.method,
            status_code: self.status_code,
        })
    }
}

/// POST /logs: validate an access log and queue it for detection
pub async fn ingest_log(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<AccessLogRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(payload) => payload,
        Err(e) => {
            warn!(error = %e, "access log rejected");
            return reply(StatusCode::BAD_REQUEST, RESULT_BAD_REQUEST);
        }
    };

    let event = match request.into_event() {
        Ok(event) => event,
        Err(reason) => {
            warn!(%reason, "access log rejected");
            return reply(StatusCode::BAD_REQUEST, RESULT_BAD_REQUEST);
        }
    };

    debug!(client_ip = %event.client_ip, status = event.status_code, "access log accepted");

    match state.publisher.publish(&event).await {
        Ok(()) => reply(StatusCode::OK, RESULT_LOG_OK),
        Err(e) => {
            error!(client_ip = %event.client_ip, error = %e, "failed to publish access log");
            reply(StatusCode::INTERNAL_SERVER_ERROR, RESULT_LOG_NOT_QUEUED)
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct AlertsQuery {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub limit: Option<String>,
}

/// GET /alerts?type=&limit=: most recently active alerts
pub async fn list_alerts(
    State(state): State<Arc<AppState>>,
    query: Result<Query<AlertsQuery>, QueryRejection>,
) -> Response {
    let Ok(Query(query)) = query else {
        return reply(StatusCode::BAD_REQUEST, RESULT_BAD_REQUEST);
    };

    let limit = match query.limit.as_deref() {
        None | Some("") => state.default_limit,
        Some(raw) => match raw.parse::<usize>() {
            Ok(limit) if limit > 0 => limit,
            _ => return reply(StatusCode::BAD_REQUEST, RESULT_BAD_REQUEST),
        },
    };

    let kind = match query.kind.as_deref() {
        None | Some("") => None,
        Some(raw) => match raw.parse::<AttackKind>() {
            Ok(kind) => Some(kind),
            Err(e) => {
                debug!(error = %e, "alert query rejected");
                return reply(StatusCode::BAD_REQUEST, RESULT_BAD_REQUEST);
            }
        },
    };

    match state.alerts.get_alerts(kind, limit).await {
        Ok(alerts) => Json(alerts).into_response(),
        Err(e) => {
            error!(kind = ?kind, limit, error = %e, "alert query failed");
            reply(StatusCode::INTERNAL_SERVER_ERROR, RESULT_INTERNAL)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerts::AlertService;
    use crate::broker::LogPublisher;
    use crate::cache::MemoryAlertCache;
    use crate::config::AlertsConfig;
    use crate::db::{Database, EventStore};
    use crate::domain::{PersistedSecurityEvent, SecurityEvent};
    use crate::error::{Error, Result};
    use crate::web::router;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use chrono::TimeZone;
    use std::sync::Mutex;
    use std::time::Duration;
    use tower::ServiceExt;

    #[derive(Default)]
    struct RecordingPublisher {
        published: Mutex<Vec<AccessLogEvent>>,
        fail: bool,
    }

    #[async_trait]
    impl LogPublisher for RecordingPublisher {
        async fn publish(&self, event: &AccessLogEvent) -> Result<()> {
            if self.fail {
                return Err(Error::Timeout(Duration::from_secs(1)));
            }
            self.published.lock().unwrap().push(event.clone());
            Ok(())
        }
    }

    struct FailingStore;

    #[async_trait]
    impl EventStore for FailingStore {
        async fn upsert(&self, _event: &SecurityEvent) -> Result<()> {
            Ok(())
        }

        async fn find_alerts(&self, _kind: Option<AttackKind>, _limit: usize) -> Result<Vec<PersistedSecurityEvent>> {
            Err(Error::InvalidRecord("database unavailable".to_string()))
        }
    }

    fn state(publisher: Arc<RecordingPublisher>, store: Arc<dyn EventStore>) -> Arc<AppState> {
        let config = AlertsConfig::default();
        let cache = Arc::new(MemoryAlertCache::new(config.cache_ttl()));
        Arc::new(AppState {
            publisher,
            alerts: AlertService::new(store, cache, &config),
            default_limit: 10,
        })
    }

    async fn call(state: Arc<AppState>, request: Request<Body>) -> (StatusCode, serde_json::Value) {
        let response = router(state).oneshot(request).await.unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
        (status, json)
    }

    fn post_log(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/logs")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn ingest_log_cases() {
        let cases: &[(&str, &str, StatusCode, bool)] = &[
            (
                "valid log",
                r#"{"timestamp":"2025-01-08T12:00:00Z","client_ip":"192.168.1.1","endpoint":"/api/v1/resource","method":"GET","status_code":401}"#,
                StatusCode::OK,
                true,
            ),
            (
                "malformed json",
                r#"{"timestamp":"2025-01-08T12:00:00Z","client_ip":"192.168.1.1","endpoint":"/api/v1/resource","method":"GET","status_code401}"#,
                StatusCode::BAD_REQUEST,
                false,
            ),
            (
                "unknown fields are ignored",
                r#"{"timestamp":"2025-01-08T12:00:00Z","client_ip":"192.168.1.1","endpoint":"/api/v1/resource","method":"GET","status_code":401,"other_things":"something"}"#,
                StatusCode::OK,
                true,
            ),
            (
                "missing timestamp",
                r#"{"client_ip":"192.168.1.1","endpoint":"/api/v1/resource","method":"GET","status_code":401}"#,
                StatusCode::BAD_REQUEST,
                false,
            ),
            (
                "date without time",
                r#"{"timestamp":"2025-01-08","client_ip":"192.168.1.1","endpoint":"/api/v1/resource","method":"GET","status_code":401}"#,
                StatusCode::BAD_REQUEST,
                false,
            ),
            (
                "truncated client ip",
                r#"{"timestamp":"2025-01-08T12:00:00Z","client_ip":"192.168.1","endpoint":"/api/v1/resource","method":"GET","status_code":401}"#,
                StatusCode::BAD_REQUEST,
                false,
            ),
        ];

        for (name, body, want_status, want_published) in cases {
            let publisher = Arc::new(RecordingPublisher::default());
            let db = Arc::new(Database::in_memory().await.unwrap());
            let (status, json) = call(state(publisher.clone(), db), post_log(body)).await;

            assert_eq!(status, *want_status, "{}", name);
            let published = publisher.published.lock().unwrap().clone();
            if *want_published {
                assert_eq!(json["status"], "success", "{}", name);
                assert_eq!(
                    published,
                    vec![AccessLogEvent {
                        timestamp: Utc.with_ymd_and_hms(2025, 1, 8, 12, 0, 0).unwrap(),
                        client_ip: "192.168.1.1".to_string(),
                        endpoint: "/api/v1/resource".to_string(),
                        method: "GET".to_string(),
                        status_code: 401,
                    }],
                    "{}",
                    name
                );
            } else {
                assert_eq!(json["status"], "fail", "{}", name);
                assert!(published.is_empty(), "{}", name);
            }
        }
    }

    #[tokio::test]
    async fn publish_failure_reports_not_queued() {
        let publisher = Arc::new(RecordingPublisher {
            published: Mutex::new(Vec::new()),
            fail: true,
        });
        let db = Arc::new(Database::in_memory().await.unwrap());
        let (status, json) = call(
            state(publisher, db),
            post_log(r#"{"timestamp":"2025-01-08T12:00:00Z","client_ip":"10.0.0.1","endpoint":"/","method":"GET","status_code":200}"#),
        )
        .await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json["message"], "Log received but not queued");
    }

    #[tokio::test]
    async fn list_alerts_returns_most_recent_first() {
        let db = Arc::new(Database::in_memory().await.unwrap());
        let base = Utc.with_ymd_and_hms(2025, 1, 8, 12, 0, 0).unwrap();
        for (i, (kind, ip)) in [
            (AttackKind::BruteForce, "10.0.0.1"),
            (AttackKind::HighTraffic, "10.0.0.2"),
            (AttackKind::BruteForce, "10.0.0.3"),
            (AttackKind::HighTraffic, "10.0.0.4"),
        ]
        .into_iter()
        .enumerate()
        {
            let ts = base + chrono::Duration::minutes(i as i64);
            let event = SecurityEvent {
                kind,
                timestamp: ts,
                client_ip: ip.to_string(),
                details: "details".to_string(),
            };
            db.upsert_at(&event, ts).await.unwrap();
        }

        let app = state(Arc::new(RecordingPublisher::default()), db);

        let (status, json) = call(app.clone(), get("/alerts?limit=3")).await;
        assert_eq!(status, StatusCode::OK);
        let ips: Vec<_> = json
            .as_array()
            .unwrap()
            .iter()
            .map(|a| a["client_ip"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(ips, vec!["10.0.0.4", "10.0.0.3", "10.0.0.2"]);

        let (status, json) = call(app.clone(), get("/alerts?type=bruteforce")).await;
        assert_eq!(status, StatusCode::OK);
        let alerts = json.as_array().unwrap();
        assert_eq!(alerts.len(), 2);
        assert!(alerts.iter().all(|a| a["type"] == "bruteforce"));
        assert_eq!(alerts[0]["timestamp"], "2025-01-08T12:02:00Z");
    }

    #[tokio::test]
    async fn list_alerts_rejects_bad_parameters() {
        let db = Arc::new(Database::in_memory().await.unwrap());
        let app = state(Arc::new(RecordingPublisher::default()), db);

        for uri in ["/alerts?limit=abc", "/alerts?limit=0", "/alerts?limit=-3", "/alerts?type=sqlinjection"] {
            let (status, json) = call(app.clone(), get(uri)).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{}", uri);
            assert_eq!(json["message"], "Bad request", "{}", uri);
        }
    }

    #[tokio::test]
    async fn store_failure_is_a_generic_error() {
        let app = state(Arc::new(RecordingPublisher::default()), Arc::new(FailingStore));

        let (status, json) = call(app, get("/alerts?limit=3")).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json["message"], "Internal error");
    }
}

//! Charge-point control API client
//!
//! This module defines the [`ChargePointClient`] trait consumed by the
//! orchestrator and an HTTP implementation against the cloud control API.
//! Each operation may fail with `Transport`, `Auth`, or `NotFound`; a
//! not-found result from [`ChargePointClient::session_status`] is the domain
//! signal consumed by the scheduler's retry path rather than a hard failure.

use crate::config::ApiConfig;
use crate::error::{AurigaError, Result};
use crate::logging::get_logger;
use crate::session::{SessionStatus, SessionTelemetry};
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

/// Outcome of a start-session request
#[derive(Debug, Clone, Serialize)]
pub struct StartResponse {
    /// Whether the charge point accepted the start request
    pub accepted: bool,

    /// Session identifier assigned on acceptance
    pub session_id: Option<String>,

    /// Human-readable outcome message from the API
    pub message: String,
}

/// Outcome of a stop-session request
#[derive(Debug, Clone, Serialize)]
pub struct StopResponse {
    /// Whether the charge point accepted the stop request
    pub accepted: bool,

    /// Human-readable outcome message from the API
    pub message: String,
}

/// Status of one EVSE on a charge point
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvseStatus {
    #[serde(default)]
    pub id: i64,
    pub hardware_status: String,
}

/// Hardware and network status of a charge point
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChargePointStatus {
    pub hardware_status: String,
    pub network_status: String,
    #[serde(default)]
    pub evses: Vec<EvseStatus>,
}

impl ChargePointStatus {
    /// Whether any EVSE on the point reports an in-progress charge
    pub fn is_charging(&self) -> bool {
        self.evses
            .iter()
            .any(|e| e.hardware_status.eq_ignore_ascii_case("charging"))
    }
}

/// Client contract for the external charge-point control API
#[async_trait::async_trait]
pub trait ChargePointClient: Send + Sync {
    /// Ask the charge point to start a session on the given EVSE
    async fn start_session(&self, charge_point_id: i64, evse_id: i64) -> Result<StartResponse>;

    /// Ask the charge point to stop the given session
    async fn stop_session(
        &self,
        charge_point_id: i64,
        session_id: &str,
        force: bool,
    ) -> Result<StopResponse>;

    /// Fetch current telemetry for a session. Returns `NotFound` when the
    /// API does not know the session.
    async fn session_status(&self, session_id: &str) -> Result<SessionTelemetry>;

    /// Fetch hardware/network status of a charge point
    async fn charge_point_status(&self, charge_point_id: i64) -> Result<ChargePointStatus>;

    /// Fetch charge point details
    async fn charge_point(&self, charge_point_id: i64) -> Result<serde_json::Value>;
}

/// Map a non-success HTTP status onto the error taxonomy
fn error_for_status(status: StatusCode, context: &str) -> AurigaError {
    match status.as_u16() {
        401 | 403 => AurigaError::auth(format!("{}: {}", context, status)),
        404 => AurigaError::not_found(context.to_string()),
        408 => AurigaError::transport(format!("{}: request timed out", context)),
        s if s >= 500 => AurigaError::transport(format!("{}: {}", context, status)),
        _ => AurigaError::api(format!("{}: {}", context, status)),
    }
}

/// Acceptance predicate for start responses
fn start_accepted(status: StatusCode, accept_any_2xx: bool) -> bool {
    if accept_any_2xx {
        status.is_success()
    } else {
        status == StatusCode::ACCEPTED
    }
}

/// Session payload as returned by the control API
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionDto {
    status: SessionStatus,
    #[serde(default)]
    energy: f64,
    #[serde(default)]
    power_kw: f64,
    #[serde(default)]
    amount: f64,
    #[serde(default)]
    soc_percent: Option<f64>,
    #[serde(default)]
    electricity_cost: Option<f64>,
    #[serde(default)]
    started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    stopped_at: Option<DateTime<Utc>>,
    #[serde(default)]
    evse_id: i64,
    #[serde(default)]
    charge_point_id: i64,
}

impl SessionDto {
    fn into_telemetry(self, session_id: &str) -> SessionTelemetry {
        SessionTelemetry {
            session_id: session_id.to_string(),
            charge_point_id: self.charge_point_id,
            evse_id: self.evse_id,
            status: self.status,
            energy_kwh: self.energy,
            power_kw: self.power_kw,
            amount: self.amount,
            soc_percent: self.soc_percent,
            electricity_cost: self.electricity_cost,
            started_at: self.started_at.unwrap_or_else(Utc::now),
            stopped_at: self.stopped_at,
        }
    }
}

/// HTTP implementation of [`ChargePointClient`]
pub struct HttpChargePointClient {
    base_url: String,
    access_token: String,
    accept_any_2xx: bool,
    http: reqwest::Client,
    logger: crate::logging::StructuredLogger,
}

impl HttpChargePointClient {
    /// Create a new client from API configuration
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            access_token: config.access_token.clone(),
            accept_any_2xx: config.accept_any_2xx,
            http,
            logger: get_logger("client"),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn get(&self, path: &str) -> reqwest::RequestBuilder {
        self.http
            .get(self.url(path))
            .bearer_auth(self.access_token.trim())
            .header(reqwest::header::ACCEPT, "application/json")
    }

    fn post(&self, path: &str) -> reqwest::RequestBuilder {
        self.http
            .post(self.url(path))
            .bearer_auth(self.access_token.trim())
            .header(reqwest::header::ACCEPT, "application/json")
    }

    /// Pull the `data` envelope out of an API payload, tolerating bare bodies
    fn unwrap_data(body: serde_json::Value) -> serde_json::Value {
        match body {
            serde_json::Value::Object(mut obj) => match obj.remove("data") {
                Some(inner) => inner,
                None => serde_json::Value::Object(obj),
            },
            other => other,
        }
    }

    fn body_message(body: &serde_json::Value, fallback: &str) -> String {
        body.get("message")
            .and_then(|m| m.as_str())
            .unwrap_or(fallback)
            .to_string()
    }
}

#[async_trait::async_trait]
impl ChargePointClient for HttpChargePointClient {
    async fn start_session(&self, charge_point_id: i64, evse_id: i64) -> Result<StartResponse> {
        let path = format!(
            "actions/charge-point/v1.0/{}/start/{}",
            charge_point_id, evse_id
        );
        let resp = self.post(&path).send().await?;
        let status = resp.status();
        let body: serde_json::Value = resp.json().await.unwrap_or_default();

        if !status.is_success() {
            self.logger.error(&format!(
                "Start request for charge point {} failed: {}",
                charge_point_id, status
            ));
            return Err(error_for_status(status, "start session"));
        }

        if !start_accepted(status, self.accept_any_2xx) {
            return Ok(StartResponse {
                accepted: false,
                session_id: None,
                message: Self::body_message(&body, "Start request was not accepted"),
            });
        }

        let session_id = body
            .get("sessionId")
            .and_then(|v| v.as_str().map(str::to_string).or_else(|| v.as_i64().map(|n| n.to_string())))
            .or_else(|| {
                body.get("data")
                    .and_then(|d| d.get("sessionId"))
                    .and_then(|v| v.as_str().map(str::to_string))
            });

        match session_id {
            Some(session_id) => Ok(StartResponse {
                accepted: true,
                session_id: Some(session_id),
                message: Self::body_message(&body, "Charging session has started"),
            }),
            None => Err(AurigaError::api(
                "Start was accepted but the response carried no session id",
            )),
        }
    }

    async fn stop_session(
        &self,
        charge_point_id: i64,
        session_id: &str,
        force: bool,
    ) -> Result<StopResponse> {
        let path = format!(
            "actions/charge-point/v1.0/{}/stop/{}",
            charge_point_id, session_id
        );
        let resp = self
            .post(&path)
            .json(&serde_json::json!({ "force": force }))
            .send()
            .await?;
        let status = resp.status();
        let body: serde_json::Value = resp.json().await.unwrap_or_default();

        if !status.is_success() {
            self.logger.error(&format!(
                "Stop request for session {} failed: {}",
                session_id, status
            ));
            return Err(error_for_status(status, "stop session"));
        }

        Ok(StopResponse {
            accepted: true,
            message: Self::body_message(&body, "Charging has stopped"),
        })
    }

    async fn session_status(&self, session_id: &str) -> Result<SessionTelemetry> {
        let path = format!("resources/sessions/v1.0/{}", session_id);
        let resp = self.get(&path).send().await?;
        let status = resp.status();

        if !status.is_success() {
            if status == StatusCode::NOT_FOUND {
                return Err(AurigaError::not_found(format!(
                    "session {} not known to the control API",
                    session_id
                )));
            }
            return Err(error_for_status(status, "session status"));
        }

        let body: serde_json::Value = resp.json().await?;
        let dto: SessionDto = serde_json::from_value(Self::unwrap_data(body))?;
        Ok(dto.into_telemetry(session_id))
    }

    async fn charge_point_status(&self, charge_point_id: i64) -> Result<ChargePointStatus> {
        let path = format!("resources/charge-points/v1.0/{}/status", charge_point_id);
        let resp = self.get(&path).send().await?;
        let status = resp.status();

        if !status.is_success() {
            return Err(error_for_status(status, "charge point status"));
        }

        let body: serde_json::Value = resp.json().await?;
        let parsed: ChargePointStatus = serde_json::from_value(Self::unwrap_data(body))?;
        Ok(parsed)
    }

    async fn charge_point(&self, charge_point_id: i64) -> Result<serde_json::Value> {
        let path = format!("resources/charge-points/v1.0/{}", charge_point_id);
        let resp = self.get(&path).send().await?;
        let status = resp.status();

        if !status.is_success() {
            return Err(error_for_status(status, "charge point lookup"));
        }

        let body: serde_json::Value = resp.json().await?;
        Ok(Self::unwrap_data(body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ApiConfig;

    fn test_client(accept_any_2xx: bool) -> HttpChargePointClient {
        let config = ApiConfig {
            base_url: "https://csms.example.com/public-api/".to_string(),
            access_token: "token".to_string(),
            request_timeout_secs: 5,
            accept_any_2xx,
        };
        HttpChargePointClient::new(&config).unwrap()
    }

    #[test]
    fn url_joining_strips_slashes() {
        let client = test_client(false);
        assert_eq!(
            client.url("/resources/sessions/v1.0/abc"),
            "https://csms.example.com/public-api/resources/sessions/v1.0/abc"
        );
        assert_eq!(
            client.url("actions/charge-point/v1.0/1/start/2"),
            "https://csms.example.com/public-api/actions/charge-point/v1.0/1/start/2"
        );
    }

    #[test]
    fn status_mapping() {
        assert!(matches!(
            error_for_status(StatusCode::UNAUTHORIZED, "x"),
            AurigaError::Auth { .. }
        ));
        assert!(matches!(
            error_for_status(StatusCode::FORBIDDEN, "x"),
            AurigaError::Auth { .. }
        ));
        assert!(matches!(
            error_for_status(StatusCode::NOT_FOUND, "x"),
            AurigaError::NotFound { .. }
        ));
        assert!(matches!(
            error_for_status(StatusCode::BAD_GATEWAY, "x"),
            AurigaError::Transport { .. }
        ));
        assert!(matches!(
            error_for_status(StatusCode::UNPROCESSABLE_ENTITY, "x"),
            AurigaError::Api { .. }
        ));
    }

    #[test]
    fn acceptance_predicate() {
        // Strict mode: only 202
        assert!(start_accepted(StatusCode::ACCEPTED, false));
        assert!(!start_accepted(StatusCode::OK, false));

        // Relaxed mode: any 2xx
        assert!(start_accepted(StatusCode::OK, true));
        assert!(start_accepted(StatusCode::ACCEPTED, true));
        assert!(!start_accepted(StatusCode::BAD_REQUEST, true));
    }

    #[test]
    fn session_dto_parses_api_payload() {
        let body = serde_json::json!({
            "data": {
                "status": "active",
                "energy": 2.5,
                "powerKw": 7.2,
                "amount": 1.4,
                "socPercent": 64.0,
                "startedAt": "2024-05-01T10:00:00Z",
                "evseId": 1,
                "chargePointId": 63205
            }
        });
        let dto: SessionDto =
            serde_json::from_value(HttpChargePointClient::unwrap_data(body)).unwrap();
        let telemetry = dto.into_telemetry("abc123");
        assert_eq!(telemetry.session_id, "abc123");
        assert_eq!(telemetry.status, SessionStatus::Active);
        assert_eq!(telemetry.charge_point_id, 63205);
        assert!((telemetry.energy_kwh - 2.5).abs() < 1e-9);
        assert_eq!(telemetry.soc_percent, Some(64.0));
        assert!(telemetry.stopped_at.is_none());
    }

    #[test]
    fn charge_point_status_detects_charging() {
        let status = ChargePointStatus {
            hardware_status: "available".to_string(),
            network_status: "online".to_string(),
            evses: vec![EvseStatus {
                id: 1,
                hardware_status: "Charging".to_string(),
            }],
        };
        assert!(status.is_charging());

        let idle = ChargePointStatus {
            hardware_status: "available".to_string(),
            network_status: "online".to_string(),
            evses: vec![],
        };
        assert!(!idle.is_charging());
    }
}

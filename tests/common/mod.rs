//! Shared test helpers: a scripted charge-point client and event counters.
#![allow(dead_code)]

use auriga::client::{ChargePointClient, ChargePointStatus, StartResponse, StopResponse};
use auriga::config::PollingConfig;
use auriga::error::{AurigaError, Result};
use auriga::events::EventBus;
use auriga::session::{SessionStatus, SessionTelemetry};
use chrono::Utc;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Charge-point client driven by scripted responses.
///
/// Each operation pops the next scripted result; an exhausted status script
/// yields not-found. The client also tracks call counts and whether two
/// status calls ever overlapped in time.
#[derive(Default)]
pub struct ScriptedClient {
    start_results: Mutex<VecDeque<Result<StartResponse>>>,
    stop_results: Mutex<VecDeque<Result<StopResponse>>>,
    status_results: Mutex<VecDeque<Result<SessionTelemetry>>>,
    start_calls: AtomicU32,
    stop_calls: AtomicU32,
    status_calls: AtomicU32,
    status_delay: Mutex<Option<Duration>>,
    in_flight: AtomicBool,
    overlap_seen: AtomicBool,
}

impl ScriptedClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_start(&self, result: Result<StartResponse>) {
        self.start_results.lock().unwrap().push_back(result);
    }

    pub fn push_stop(&self, result: Result<StopResponse>) {
        self.stop_results.lock().unwrap().push_back(result);
    }

    pub fn push_status(&self, result: Result<SessionTelemetry>) {
        self.status_results.lock().unwrap().push_back(result);
    }

    /// Make every status call take this long (virtual time)
    pub fn set_status_delay(&self, delay: Duration) {
        *self.status_delay.lock().unwrap() = Some(delay);
    }

    pub fn start_calls(&self) -> u32 {
        self.start_calls.load(Ordering::SeqCst)
    }

    pub fn stop_calls(&self) -> u32 {
        self.stop_calls.load(Ordering::SeqCst)
    }

    pub fn status_calls(&self) -> u32 {
        self.status_calls.load(Ordering::SeqCst)
    }

    pub fn overlap_seen(&self) -> bool {
        self.overlap_seen.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl ChargePointClient for ScriptedClient {
    async fn start_session(&self, _charge_point_id: i64, _evse_id: i64) -> Result<StartResponse> {
        self.start_calls.fetch_add(1, Ordering::SeqCst);
        self.start_results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(AurigaError::generic("no scripted start response")))
    }

    async fn stop_session(
        &self,
        _charge_point_id: i64,
        _session_id: &str,
        _force: bool,
    ) -> Result<StopResponse> {
        self.stop_calls.fetch_add(1, Ordering::SeqCst);
        self.stop_results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(AurigaError::generic("no scripted stop response")))
    }

    async fn session_status(&self, session_id: &str) -> Result<SessionTelemetry> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        if self.in_flight.swap(true, Ordering::SeqCst) {
            self.overlap_seen.store(true, Ordering::SeqCst);
        }

        let delay = *self.status_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let result = self
            .status_results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| {
                Err(AurigaError::not_found(format!(
                    "session {} not scripted",
                    session_id
                )))
            });

        self.in_flight.store(false, Ordering::SeqCst);
        result
    }

    async fn charge_point_status(&self, _charge_point_id: i64) -> Result<ChargePointStatus> {
        Ok(ChargePointStatus {
            hardware_status: "available".to_string(),
            network_status: "online".to_string(),
            evses: vec![],
        })
    }

    async fn charge_point(&self, charge_point_id: i64) -> Result<serde_json::Value> {
        Ok(serde_json::json!({ "id": charge_point_id }))
    }
}

/// Telemetry reading fixture
pub fn telemetry(session_id: &str, status: SessionStatus, energy_kwh: f64) -> SessionTelemetry {
    SessionTelemetry {
        session_id: session_id.to_string(),
        charge_point_id: 63205,
        evse_id: 1,
        status,
        energy_kwh,
        power_kw: 7.2,
        amount: energy_kwh * 0.25,
        soc_percent: None,
        electricity_cost: None,
        started_at: Utc::now(),
        stopped_at: if status.is_terminal() {
            Some(Utc::now())
        } else {
            None
        },
    }
}

pub fn accepted_start(session_id: &str) -> StartResponse {
    StartResponse {
        accepted: true,
        session_id: Some(session_id.to_string()),
        message: "Charging session has started".to_string(),
    }
}

pub fn rejected_start(message: &str) -> StartResponse {
    StartResponse {
        accepted: false,
        session_id: None,
        message: message.to_string(),
    }
}

pub fn accepted_stop() -> StopResponse {
    StopResponse {
        accepted: true,
        message: "Charging has stopped".to_string(),
    }
}

/// Polling configuration fixture
pub fn polling(interval_secs: u64, retry_backoff_secs: u64, max_retries: u32) -> PollingConfig {
    PollingConfig {
        interval_secs,
        retry_backoff_secs,
        max_retries,
    }
}

/// Count `Started` events published on the bus
pub fn count_started(bus: &EventBus) -> Arc<AtomicU32> {
    let count = Arc::new(AtomicU32::new(0));
    {
        let count = Arc::clone(&count);
        bus.subscribe_started(move |_| {
            count.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
    }
    count
}

/// Count `Stopped` events published on the bus
pub fn count_stopped(bus: &EventBus) -> Arc<AtomicU32> {
    let count = Arc::new(AtomicU32::new(0));
    {
        let count = Arc::clone(&count);
        bus.subscribe_stopped(move |_| {
            count.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
    }
    count
}

/// Advance virtual time and give spawned tasks a chance to run
pub async fn advance(duration: Duration) {
    tokio::time::sleep(duration).await;
    tokio::time::sleep(Duration::from_millis(5)).await;
}

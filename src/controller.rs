//! Session controller
//!
//! Public start/stop/status operations for charging sessions. The
//! controller owns the transient [`ChargingState`], talks to the
//! charge-point client, publishes lifecycle events over the bus, and holds
//! the scheduler's cancellation handle for explicit stops.

use crate::client::{ChargePointClient, ChargePointStatus};
use crate::error::{AurigaError, Result};
use crate::events::{EventBus, SessionEvent};
use crate::logging::get_logger;
use crate::scheduler::SchedulerHandle;
use crate::session::{ChargingState, ChargingStateSnapshot};
use serde::Serialize;
use std::sync::{Arc, Mutex};

/// Outcome of a start request
#[derive(Debug, Clone, Serialize)]
pub struct StartOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    pub charging: bool,
    pub message: String,
}

/// Outcome of a stop request
#[derive(Debug, Clone, Serialize)]
pub struct StopOutcome {
    pub success: bool,
    pub message: String,
}

/// Coordinator for the charging-session lifecycle
pub struct SessionController {
    client: Arc<dyn ChargePointClient>,
    bus: Arc<EventBus>,
    state: Arc<Mutex<ChargingState>>,
    scheduler: SchedulerHandle,
    logger: crate::logging::StructuredLogger,
}

impl SessionController {
    /// Create the controller and register its `Stopped` subscription,
    /// which clears the charging state whenever a session ends, whether
    /// through an explicit stop or through the scheduler's terminal and
    /// give-up paths.
    pub fn new(
        client: Arc<dyn ChargePointClient>,
        bus: Arc<EventBus>,
        state: Arc<Mutex<ChargingState>>,
        scheduler: SchedulerHandle,
    ) -> Self {
        {
            let state = Arc::clone(&state);
            bus.subscribe_stopped(move |_| {
                state
                    .lock()
                    .map(|mut s| s.clear())
                    .map_err(|_| AurigaError::generic("charging state lock poisoned"))
            });
        }

        Self {
            client,
            bus,
            state,
            scheduler,
            logger: get_logger("controller"),
        }
    }

    fn lock_state(&self) -> Result<std::sync::MutexGuard<'_, ChargingState>> {
        self.state
            .lock()
            .map_err(|_| AurigaError::generic("charging state lock poisoned"))
    }

    /// Start a charging session on the given charge point and EVSE.
    ///
    /// The client is invoked once, with no internal retry. On acceptance
    /// the charging state is set and one `Started` event is published. A
    /// client-reported rejection returns a structured failure without
    /// mutating state; transport and auth failures propagate to the caller.
    pub async fn start(&self, charge_point_id: i64, evse_id: i64) -> Result<StartOutcome> {
        if charge_point_id <= 0 {
            return Err(AurigaError::validation(
                "charge_point_id",
                "must be a positive identifier",
            ));
        }
        if evse_id <= 0 {
            return Err(AurigaError::validation(
                "evse_id",
                "must be a positive identifier",
            ));
        }

        // One session per orchestrator instance
        {
            let state = self.lock_state()?;
            if state.is_charging() {
                return Ok(StartOutcome {
                    success: false,
                    session_id: state.active_session_id().map(str::to_string),
                    charging: true,
                    message: "A charging session is already active".to_string(),
                });
            }
        }

        let response = self.client.start_session(charge_point_id, evse_id).await?;

        if !response.accepted {
            self.logger.warn(&format!(
                "Charge point {} did not accept the start request: {}",
                charge_point_id, response.message
            ));
            return Ok(StartOutcome {
                success: false,
                session_id: None,
                charging: false,
                message: response.message,
            });
        }

        let session_id = response.session_id.ok_or_else(|| {
            AurigaError::api("Start was accepted but no session id was returned")
        })?;

        self.lock_state()?.begin(session_id.clone())?;

        self.logger.info(&format!(
            "Charging session {} started on charge point {} evse {}",
            session_id, charge_point_id, evse_id
        ));

        self.bus.publish(&SessionEvent::Started {
            session_id: session_id.clone(),
            charge_point_id,
            evse_id,
        });

        Ok(StartOutcome {
            success: true,
            session_id: Some(session_id),
            charging: true,
            message: "Charging session has started".to_string(),
        })
    }

    /// Stop the active charging session.
    ///
    /// Without an active session this is an idempotent no-op that emits no
    /// event. Otherwise the client's stop operation runs with force
    /// semantics; local state is cleared and `Stopped` published only on
    /// confirmed success, so a failed stop can be retried meaningfully.
    pub async fn stop(&self, charge_point_id: i64) -> Result<StopOutcome> {
        if charge_point_id <= 0 {
            return Err(AurigaError::validation(
                "charge_point_id",
                "must be a positive identifier",
            ));
        }

        let session_id = {
            let state = self.lock_state()?;
            match state.active_session_id() {
                Some(id) => id.to_string(),
                None => {
                    return Ok(StopOutcome {
                        success: false,
                        message: "No charging session found".to_string(),
                    });
                }
            }
        };

        let response = self
            .client
            .stop_session(charge_point_id, &session_id, true)
            .await?;

        if !response.accepted {
            self.logger.warn(&format!(
                "Charge point {} did not confirm the stop of session {}: {}",
                charge_point_id, session_id, response.message
            ));
            return Ok(StopOutcome {
                success: false,
                message: response.message,
            });
        }

        // Clear before publishing so an in-flight scheduler tick observing
        // the state cannot emit a second Stopped for this session.
        self.lock_state()?.clear();
        self.scheduler.cancel();
        self.bus.publish(&SessionEvent::Stopped {
            session_id: Some(session_id.clone()),
            telemetry: None,
        });

        self.logger
            .info(&format!("Charging session {} stopped", session_id));

        Ok(StopOutcome {
            success: true,
            message: response.message,
        })
    }

    /// Read-through to the charge-point status endpoint
    pub async fn charge_point_status(&self, charge_point_id: i64) -> Result<ChargePointStatus> {
        if charge_point_id <= 0 {
            return Err(AurigaError::validation(
                "charge_point_id",
                "must be a positive identifier",
            ));
        }
        self.client.charge_point_status(charge_point_id).await
    }

    /// Read-through to the charge-point details endpoint
    pub async fn charge_point(&self, charge_point_id: i64) -> Result<serde_json::Value> {
        if charge_point_id <= 0 {
            return Err(AurigaError::validation(
                "charge_point_id",
                "must be a positive identifier",
            ));
        }
        self.client.charge_point(charge_point_id).await
    }

    /// Current transient charging state
    pub fn state_snapshot(&self) -> Result<ChargingStateSnapshot> {
        Ok(self.lock_state()?.snapshot())
    }
}

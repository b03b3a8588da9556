//! Charging session data model for Auriga
//!
//! This module defines the session status lifecycle, the telemetry snapshot
//! returned by the charge-point API, the persisted session record, and the
//! transient charging state owned by the orchestrator.

use crate::error::{AurigaError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Session status as reported by the charge-point API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    /// Start accepted, charging not yet confirmed
    Pending,

    /// Session is currently delivering energy
    Active,

    /// Session completed normally
    Finished,

    /// Session failed
    Failed,

    /// Session expired without completing
    Expired,
}

impl SessionStatus {
    /// Whether this status ends the session lifecycle
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionStatus::Finished | SessionStatus::Failed | SessionStatus::Expired
        )
    }

    /// Position in the monotonic lifecycle: pending < active < terminal
    fn rank(&self) -> u8 {
        match self {
            SessionStatus::Pending => 0,
            SessionStatus::Active => 1,
            SessionStatus::Finished | SessionStatus::Failed | SessionStatus::Expired => 2,
        }
    }

    /// Whether a session in this status may next be observed in `next`.
    /// Repeated non-terminal observations are allowed; reverse transitions
    /// and anything after a terminal status are not.
    pub fn can_transition_to(&self, next: SessionStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        next.rank() >= self.rank()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Pending => "pending",
            SessionStatus::Active => "active",
            SessionStatus::Finished => "finished",
            SessionStatus::Failed => "failed",
            SessionStatus::Expired => "expired",
        }
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Point-in-time telemetry reading for a session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionTelemetry {
    /// Session identifier this reading belongs to
    pub session_id: String,

    /// Charge point the session runs on
    pub charge_point_id: i64,

    /// EVSE within the charge point
    pub evse_id: i64,

    /// Session status at read time
    pub status: SessionStatus,

    /// Energy delivered so far (kWh)
    pub energy_kwh: f64,

    /// Instantaneous power (kW)
    pub power_kw: f64,

    /// Accumulated session cost
    pub amount: f64,

    /// Vehicle state of charge, when reported
    pub soc_percent: Option<f64>,

    /// Electricity cost component, when reported
    pub electricity_cost: Option<f64>,

    /// When the session started
    pub started_at: DateTime<Utc>,

    /// When the session stopped, for terminal readings
    pub stopped_at: Option<DateTime<Utc>>,
}

/// Persisted session snapshot row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    pub session_id: String,
    pub charge_point_id: i64,
    pub evse_id: i64,
    pub status: SessionStatus,
    pub started_at: DateTime<Utc>,
    pub stopped_at: Option<DateTime<Utc>>,
    pub energy_kwh: f64,
    pub power_kw: f64,
    pub amount: f64,
    pub soc_percent: Option<f64>,
    pub electricity_cost: Option<f64>,
}

impl SessionRecord {
    /// Build a record from a telemetry reading
    pub fn from_telemetry(telemetry: &SessionTelemetry) -> Self {
        Self {
            session_id: telemetry.session_id.clone(),
            charge_point_id: telemetry.charge_point_id,
            evse_id: telemetry.evse_id,
            status: telemetry.status,
            started_at: telemetry.started_at,
            stopped_at: telemetry.stopped_at,
            energy_kwh: telemetry.energy_kwh,
            power_kw: telemetry.power_kw,
            amount: telemetry.amount,
            soc_percent: telemetry.soc_percent,
            electricity_cost: telemetry.electricity_cost,
        }
    }
}

/// Transient, process-owned charging state.
///
/// Invariant: `active_session_id` is `Some` if and only if `is_charging` is
/// true. Fields are private; the only mutators are [`ChargingState::begin`]
/// and [`ChargingState::clear`], so the invariant holds by construction.
#[derive(Debug, Default)]
pub struct ChargingState {
    is_charging: bool,
    active_session_id: Option<String>,
}

impl ChargingState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a session as the active one. Fails if a session is already
    /// active; no concurrent session is permitted per orchestrator instance.
    pub fn begin(&mut self, session_id: String) -> Result<()> {
        if self.is_charging {
            return Err(AurigaError::generic(format!(
                "A charging session is already active: {}",
                self.active_session_id.as_deref().unwrap_or("unknown")
            )));
        }
        self.is_charging = true;
        self.active_session_id = Some(session_id);
        Ok(())
    }

    /// Clear the active session. Idempotent.
    pub fn clear(&mut self) {
        self.is_charging = false;
        self.active_session_id = None;
    }

    pub fn is_charging(&self) -> bool {
        self.is_charging
    }

    pub fn active_session_id(&self) -> Option<&str> {
        self.active_session_id.as_deref()
    }

    /// Whether `session_id` is the currently active session
    pub fn is_active_session(&self, session_id: &str) -> bool {
        self.is_charging && self.active_session_id.as_deref() == Some(session_id)
    }

    /// Serializable view for the web layer
    pub fn snapshot(&self) -> ChargingStateSnapshot {
        ChargingStateSnapshot {
            is_charging: self.is_charging,
            active_session_id: self.active_session_id.clone(),
        }
    }
}

/// Read-only view of [`ChargingState`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChargingStateSnapshot {
    pub is_charging: bool,
    pub active_session_id: Option<String>,
}

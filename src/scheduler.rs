//! Telemetry poll scheduler
//!
//! A state machine (`Idle`/`Polling`/`Retrying`/`Stopped`) run as a tokio
//! task. While a session is active the scheduler queries telemetry on a
//! configured interval, persists a snapshot per poll, and watches for
//! terminal statuses. When the session cannot be found it backs off and
//! retries a bounded number of times before publishing `Stopped` and giving
//! up.
//!
//! Tick execution is serialized: the select loop does not arm the timer
//! again until the in-flight tick's awaits complete, so an interval that
//! elapses mid-tick is skipped rather than run concurrently.

use crate::client::ChargePointClient;
use crate::config::PollingConfig;
use crate::error::AurigaError;
use crate::events::{EventBus, SessionEvent};
use crate::logging::get_logger;
use crate::session::{ChargingState, SessionRecord, SessionStatus, SessionTelemetry};
use crate::store::SessionStore;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

/// Commands accepted by the scheduler task
#[derive(Debug, Clone)]
pub enum SchedulerCommand {
    /// A session was accepted; begin polling it
    SessionStarted {
        session_id: String,
        charge_point_id: i64,
        evse_id: i64,
    },

    /// Cancel the timer and stop polling
    Cancel,
}

/// Cancellation handle returned when the scheduler task is spawned
#[derive(Clone)]
pub struct SchedulerHandle {
    tx: mpsc::UnboundedSender<SchedulerCommand>,
}

impl SchedulerHandle {
    /// Cancel the scheduler's timer from any state
    pub fn cancel(&self) {
        let _ = self.tx.send(SchedulerCommand::Cancel);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SchedulerState {
    Idle,
    Polling,
    Retrying { retries: u32 },
    Stopped,
}

#[derive(Debug, Clone)]
struct ActiveSession {
    session_id: String,
    charge_point_id: i64,
    evse_id: i64,
}

/// Poll scheduler state machine
pub struct PollScheduler {
    client: Arc<dyn ChargePointClient>,
    store: Arc<dyn SessionStore>,
    bus: Arc<EventBus>,
    charging_state: Arc<Mutex<ChargingState>>,
    interval: Duration,
    retry_backoff: Duration,
    max_retries: u32,
    state: SchedulerState,
    active: Option<ActiveSession>,
    commands: mpsc::UnboundedReceiver<SchedulerCommand>,
    logger: crate::logging::StructuredLogger,
}

impl PollScheduler {
    /// Spawn the scheduler task. Its bus subscriptions forward `Started`
    /// and `Stopped` events into the command channel; the returned handle
    /// lets the controller cancel polling directly.
    pub fn spawn(
        client: Arc<dyn ChargePointClient>,
        store: Arc<dyn SessionStore>,
        bus: Arc<EventBus>,
        charging_state: Arc<Mutex<ChargingState>>,
        config: &PollingConfig,
    ) -> SchedulerHandle {
        let (tx, rx) = mpsc::unbounded_channel();

        {
            let tx = tx.clone();
            bus.subscribe_started(move |event| {
                if let SessionEvent::Started {
                    session_id,
                    charge_point_id,
                    evse_id,
                } = event
                {
                    tx.send(SchedulerCommand::SessionStarted {
                        session_id: session_id.clone(),
                        charge_point_id: *charge_point_id,
                        evse_id: *evse_id,
                    })
                    .map_err(|e| AurigaError::generic(e.to_string()))?;
                }
                Ok(())
            });
        }
        {
            let tx = tx.clone();
            bus.subscribe_stopped(move |_| {
                tx.send(SchedulerCommand::Cancel)
                    .map_err(|e| AurigaError::generic(e.to_string()))?;
                Ok(())
            });
        }

        let scheduler = Self {
            client,
            store,
            bus,
            charging_state,
            interval: config.interval(),
            retry_backoff: config.retry_backoff(),
            max_retries: config.max_retries,
            state: SchedulerState::Idle,
            active: None,
            commands: rx,
            logger: get_logger("scheduler"),
        };

        tokio::spawn(scheduler.run());

        SchedulerHandle { tx }
    }

    /// Scheduler main loop
    async fn run(mut self) {
        self.logger.info("Poll scheduler started");

        loop {
            let delay = match self.state {
                SchedulerState::Polling => Some(self.interval),
                SchedulerState::Retrying { .. } => Some(self.retry_backoff),
                SchedulerState::Idle | SchedulerState::Stopped => None,
            };

            tokio::select! {
                biased;

                maybe_cmd = self.commands.recv() => {
                    match maybe_cmd {
                        Some(cmd) => self.handle_command(cmd),
                        None => break,
                    }
                }

                _ = sleep_or_never(delay) => {
                    self.tick().await;
                }
            }
        }

        self.logger.info("Poll scheduler exited");
    }

    fn handle_command(&mut self, cmd: SchedulerCommand) {
        match cmd {
            SchedulerCommand::SessionStarted {
                session_id,
                charge_point_id,
                evse_id,
            } => match self.state {
                SchedulerState::Idle | SchedulerState::Stopped => {
                    self.logger.info(&format!(
                        "Polling session {} on charge point {} evse {} every {:?}",
                        session_id, charge_point_id, evse_id, self.interval
                    ));
                    self.active = Some(ActiveSession {
                        session_id,
                        charge_point_id,
                        evse_id,
                    });
                    self.state = SchedulerState::Polling;
                }
                _ => {
                    self.logger.warn(&format!(
                        "Ignoring start of session {}: already polling another session",
                        session_id
                    ));
                }
            },
            SchedulerCommand::Cancel => self.cancel(),
        }
    }

    /// Cancel the timer and reset retry state. Idempotent.
    fn cancel(&mut self) {
        if self.state == SchedulerState::Stopped {
            return;
        }
        if self.state != SchedulerState::Idle {
            self.logger.info("Telemetry polling cancelled");
        }
        self.state = SchedulerState::Stopped;
        self.active = None;
    }

    /// One poll cycle for the active session
    async fn tick(&mut self) {
        let Some(active) = self.active.clone() else {
            self.state = SchedulerState::Stopped;
            return;
        };

        match self.client.session_status(&active.session_id).await {
            Ok(mut telemetry) => {
                // Older API payloads omit the identifiers; fill them in from
                // the start command so persisted rows stay addressable.
                if telemetry.charge_point_id == 0 {
                    telemetry.charge_point_id = active.charge_point_id;
                }
                if telemetry.evse_id == 0 {
                    telemetry.evse_id = active.evse_id;
                }

                if telemetry.status.is_terminal() {
                    self.finalize(&active, telemetry).await;
                } else if telemetry.status == SessionStatus::Active {
                    let record = SessionRecord::from_telemetry(&telemetry);
                    if let Err(e) = self.store.insert(record).await {
                        self.logger.error(&format!(
                            "Failed to persist snapshot for session {}: {}",
                            active.session_id, e
                        ));
                    }
                    // A found session resets any retry counter
                    self.state = SchedulerState::Polling;
                } else {
                    self.logger.debug(&format!(
                        "Session {} is still pending",
                        active.session_id
                    ));
                    self.state = SchedulerState::Polling;
                }
            }
            Err(e) if e.is_not_found() => self.on_not_found(&active),
            Err(e) => {
                // Transient failure; the next tick retries without
                // consuming the bounded not-found budget.
                self.logger.error(&format!(
                    "Telemetry poll for session {} failed: {}",
                    active.session_id, e
                ));
            }
        }
    }

    /// Persist the terminal record, then publish `Stopped` exactly once
    async fn finalize(&mut self, active: &ActiveSession, telemetry: SessionTelemetry) {
        let record = SessionRecord::from_telemetry(&telemetry);
        if let Err(e) = self.store.insert(record).await {
            // Stopped must not precede the terminal record; stay armed so
            // the next tick re-reads and retries the write.
            self.logger.error(&format!(
                "Failed to persist terminal record for session {}, will retry: {}",
                active.session_id, e
            ));
            self.state = SchedulerState::Polling;
            return;
        }

        self.logger.info(&format!(
            "Session {} reached terminal status {}",
            active.session_id, telemetry.status
        ));
        self.publish_stopped(active, Some(telemetry));
        self.state = SchedulerState::Stopped;
        self.active = None;
    }

    /// Bounded-retry bookkeeping for the not-found signal
    fn on_not_found(&mut self, active: &ActiveSession) {
        let attempts = match self.state {
            SchedulerState::Retrying { retries } => retries + 1,
            _ => 1,
        };

        if attempts >= self.max_retries {
            self.logger.warn(&format!(
                "Session {} not found after {} attempts, giving up",
                active.session_id, attempts
            ));
            // No terminal record exists; no session was ever observed
            self.publish_stopped(active, None);
            self.state = SchedulerState::Stopped;
            self.active = None;
        } else {
            self.logger.warn(&format!(
                "Session {} not found, attempt {}/{}, retrying after {:?}",
                active.session_id, attempts, self.max_retries, self.retry_backoff
            ));
            self.state = SchedulerState::Retrying { retries: attempts };
        }
    }

    /// Publish `Stopped` unless an explicit stop already won the race
    fn publish_stopped(&self, active: &ActiveSession, telemetry: Option<SessionTelemetry>) {
        let still_active = self
            .charging_state
            .lock()
            .map(|s| s.is_active_session(&active.session_id))
            .unwrap_or(false);

        if !still_active {
            self.logger.debug(&format!(
                "Session {} is no longer active, skipping Stopped publication",
                active.session_id
            ));
            return;
        }

        self.bus.publish(&SessionEvent::Stopped {
            session_id: Some(active.session_id.clone()),
            telemetry,
        });
    }
}

async fn sleep_or_never(delay: Option<Duration>) {
    match delay {
        Some(d) => tokio::time::sleep(d).await,
        None => std::future::pending().await,
    }
}

//! In-process session event bus
//!
//! Synchronous publish/subscribe decoupling the session controller from the
//! poll scheduler. Handlers for one event kind run in subscription order; a
//! failing handler is logged and does not prevent delivery to later
//! subscribers, nor does it affect the other event kind. Every published
//! event is also forwarded to a broadcast channel consumed by the web
//! layer's event stream.

use crate::error::Result;
use crate::logging::get_logger;
use crate::session::SessionTelemetry;
use serde::Serialize;
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;

/// Events published over the bus
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "payload")]
pub enum SessionEvent {
    /// A charging session was accepted and is now active
    Started {
        session_id: String,
        charge_point_id: i64,
        evse_id: i64,
    },

    /// The active charging session ended, was stopped, or was given up on
    Stopped {
        session_id: Option<String>,
        telemetry: Option<SessionTelemetry>,
    },
}

impl SessionEvent {
    /// Event kind name, used for dispatch and for the SSE event field
    pub fn kind(&self) -> &'static str {
        match self {
            SessionEvent::Started { .. } => "charging.started",
            SessionEvent::Stopped { .. } => "charging.stopped",
        }
    }

    pub fn session_id(&self) -> Option<&str> {
        match self {
            SessionEvent::Started { session_id, .. } => Some(session_id),
            SessionEvent::Stopped { session_id, .. } => session_id.as_deref(),
        }
    }
}

type Handler = Arc<dyn Fn(&SessionEvent) -> Result<()> + Send + Sync>;

/// Synchronous-dispatch publish/subscribe bus for [`SessionEvent`]s
pub struct EventBus {
    started_handlers: Mutex<Vec<Handler>>,
    stopped_handlers: Mutex<Vec<Handler>>,
    stream_tx: broadcast::Sender<SessionEvent>,
    logger: crate::logging::StructuredLogger,
}

impl EventBus {
    pub fn new() -> Self {
        let (stream_tx, _) = broadcast::channel(64);
        Self {
            started_handlers: Mutex::new(Vec::new()),
            stopped_handlers: Mutex::new(Vec::new()),
            stream_tx,
            logger: get_logger("events"),
        }
    }

    /// Subscribe to `Started` events. Handlers run in subscription order.
    pub fn subscribe_started<F>(&self, handler: F)
    where
        F: Fn(&SessionEvent) -> Result<()> + Send + Sync + 'static,
    {
        if let Ok(mut handlers) = self.started_handlers.lock() {
            handlers.push(Arc::new(handler));
        }
    }

    /// Subscribe to `Stopped` events. Handlers run in subscription order.
    pub fn subscribe_stopped<F>(&self, handler: F)
    where
        F: Fn(&SessionEvent) -> Result<()> + Send + Sync + 'static,
    {
        if let Ok(mut handlers) = self.stopped_handlers.lock() {
            handlers.push(Arc::new(handler));
        }
    }

    /// Subscribe to the broadcast stream of all published events
    pub fn subscribe_stream(&self) -> broadcast::Receiver<SessionEvent> {
        self.stream_tx.subscribe()
    }

    /// Publish an event, dispatching synchronously to every subscriber of
    /// its kind in subscription order. A handler failure is logged and does
    /// not stop delivery.
    pub fn publish(&self, event: &SessionEvent) {
        let handlers = {
            let source = match event {
                SessionEvent::Started { .. } => &self.started_handlers,
                SessionEvent::Stopped { .. } => &self.stopped_handlers,
            };
            match source.lock() {
                Ok(guard) => guard.clone(),
                Err(_) => Vec::new(),
            }
        };

        for handler in handlers {
            if let Err(e) = handler(event) {
                self.logger.error(&format!(
                    "Handler for {} failed: {}",
                    event.kind(),
                    e
                ));
            }
        }

        // Web stream subscribers are best-effort; a lagging or absent
        // receiver must not block dispatch.
        let _ = self.stream_tx.send(event.clone());
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

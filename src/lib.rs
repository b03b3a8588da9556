//! # Auriga - Charging Session Orchestrator
//!
//! A Rust service that drives vehicle charging sessions against a
//! cloud-managed charge-point control API: it starts and stops sessions,
//! polls telemetry on a schedule while a session is active, persists
//! snapshots, detects terminal conditions, and retries a bounded number of
//! times before giving up.
//!
//! ## Architecture
//!
//! The application follows a modular architecture with clear separation of concerns:
//!
//! - `config`: Configuration management and validation
//! - `logging`: Structured logging and tracing
//! - `error`: Error taxonomy shared across components
//! - `client`: Charge-point control API client
//! - `session`: Session data model and transient charging state
//! - `events`: In-process session event bus
//! - `store`: Session snapshot persistence
//! - `scheduler`: Telemetry poll state machine
//! - `controller`: Public start/stop/status operations
//! - `web`: HTTP server and REST API

pub mod client;
pub mod config;
pub mod controller;
pub mod error;
pub mod events;
pub mod logging;
pub mod scheduler;
pub mod session;
pub mod store;
pub mod web;

// Re-export commonly used types
pub use config::Config;
pub use controller::SessionController;
pub use error::{AurigaError, Result};

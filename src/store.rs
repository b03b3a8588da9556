//! Session snapshot persistence
//!
//! Stores one row per telemetry poll. The store enforces the monotonic
//! session lifecycle: a row that would move a session backwards, or any row
//! after a terminal row, is refused, so a session gains at most one terminal
//! record.

use crate::error::{AurigaError, Result};
use crate::logging::get_logger;
use crate::session::SessionRecord;
use std::path::Path;
use tokio::sync::Mutex;

/// Persistence contract for session snapshot rows
#[async_trait::async_trait]
pub trait SessionStore: Send + Sync {
    /// Append a snapshot row
    async fn insert(&self, record: SessionRecord) -> Result<()>;

    /// All rows for one session, in insertion order
    async fn find_by_session(&self, session_id: &str) -> Result<Vec<SessionRecord>>;

    /// All rows, in insertion order
    async fn list(&self) -> Result<Vec<SessionRecord>>;
}

/// Refuse rows that violate the monotonic lifecycle for their session
fn check_transition(rows: &[SessionRecord], record: &SessionRecord) -> Result<()> {
    let last = rows
        .iter()
        .filter(|r| r.session_id == record.session_id)
        .next_back();

    if let Some(last) = last
        && !last.status.can_transition_to(record.status)
    {
        return Err(AurigaError::persistence(format!(
            "Session {} cannot move from {} to {}",
            record.session_id, last.status, record.status
        )));
    }
    Ok(())
}

/// JSON-file-backed session store
pub struct JsonFileStore {
    file_path: String,
    rows: Mutex<Vec<SessionRecord>>,
    logger: crate::logging::StructuredLogger,
}

impl JsonFileStore {
    /// Create a store over the given file, loading any existing rows
    pub fn new(file_path: &str) -> Self {
        let logger = get_logger("store");

        let rows = match Self::load(file_path) {
            Ok(rows) => rows,
            Err(e) => {
                logger.warn(&format!(
                    "Could not load session store from {}: {}",
                    file_path, e
                ));
                Vec::new()
            }
        };

        Self {
            file_path: file_path.to_string(),
            rows: Mutex::new(rows),
            logger,
        }
    }

    fn load(file_path: &str) -> Result<Vec<SessionRecord>> {
        let path = Path::new(file_path);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let contents = std::fs::read_to_string(path)?;
        let rows = serde_json::from_str(&contents)?;
        Ok(rows)
    }

    async fn save(&self, rows: &[SessionRecord]) -> Result<()> {
        let contents = serde_json::to_string_pretty(rows)?;
        tokio::fs::write(&self.file_path, contents)
            .await
            .map_err(|e| AurigaError::persistence(format!("write {}: {}", self.file_path, e)))?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl SessionStore for JsonFileStore {
    async fn insert(&self, record: SessionRecord) -> Result<()> {
        let mut rows = self.rows.lock().await;
        check_transition(&rows, &record)?;

        rows.push(record);
        if let Err(e) = self.save(rows.as_slice()).await {
            // Roll the row back so a retried insert is consistent
            rows.pop();
            return Err(e);
        }

        self.logger.debug(&format!(
            "Persisted snapshot; store now holds {} rows",
            rows.len()
        ));
        Ok(())
    }

    async fn find_by_session(&self, session_id: &str) -> Result<Vec<SessionRecord>> {
        let rows = self.rows.lock().await;
        Ok(rows
            .iter()
            .filter(|r| r.session_id == session_id)
            .cloned()
            .collect())
    }

    async fn list(&self) -> Result<Vec<SessionRecord>> {
        let rows = self.rows.lock().await;
        Ok(rows.clone())
    }
}

/// In-memory session store, used in tests and as a stand-in when no
/// persistence file is configured
#[derive(Default)]
pub struct MemoryStore {
    rows: Mutex<Vec<SessionRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl SessionStore for MemoryStore {
    async fn insert(&self, record: SessionRecord) -> Result<()> {
        let mut rows = self.rows.lock().await;
        check_transition(&rows, &record)?;
        rows.push(record);
        Ok(())
    }

    async fn find_by_session(&self, session_id: &str) -> Result<Vec<SessionRecord>> {
        let rows = self.rows.lock().await;
        Ok(rows
            .iter()
            .filter(|r| r.session_id == session_id)
            .cloned()
            .collect())
    }

    async fn list(&self) -> Result<Vec<SessionRecord>> {
        let rows = self.rows.lock().await;
        Ok(rows.clone())
    }
}

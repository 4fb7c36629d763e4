//! Error types for slotscrape
//!
//! Centralized error handling using thiserror. Every variant carries the scope it
//! affects; the worker pool absorbs row and unit errors into the run report and
//! propagates run-scoped ones.

use std::time::Duration;

use thiserror::Error;

/// How far an error reaches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorScope {
    /// Aborts the whole run
    Run,
    /// Affects a single unit (or the units of one worker)
    Unit,
    /// Affects a single table row
    Row,
}

/// All error types that can occur in slotscrape
#[derive(Debug, Error)]
pub enum ScrapeError {
    /// Index page could not be loaded or produced no unit links
    #[error("Discovery failed: {0}")]
    Discovery(String),

    /// A worker could not open its automation session
    #[error("Session init failed for worker {worker}: {message}")]
    SessionInit { worker: usize, message: String },

    /// Every worker failed to open a session
    #[error("No automation session could be opened")]
    NoSessions,

    /// Expected content never appeared within the page timeout
    #[error("Navigation timeout after {}ms for unit {unit}", .timeout.as_millis())]
    NavigationTimeout { unit: String, timeout: Duration },

    /// Navigation failed for a reason other than the timeout
    #[error("Navigation to {url} failed: {message}")]
    Navigation { url: String, message: String },

    /// A data row could not be read through the column contract
    #[error("Malformed row {row} in {course}: {reason}")]
    MalformedRow { course: String, row: usize, reason: String },

    /// Dataset could not be written durably
    #[error("Persist error: {0}")]
    Persist(String),

    /// Requested term/unit/course does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid configuration
    #[error("Config error: {0}")]
    Config(String),

    /// A selector in the schema contract failed to compile
    #[error("Schema error: {0}")]
    Schema(String),

    /// Completion API error
    #[error("LLM error: {0}")]
    Llm(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ScrapeError {
    /// Scope affected by this error.
    pub fn scope(&self) -> ErrorScope {
        match self {
            ScrapeError::MalformedRow { .. } => ErrorScope::Row,
            ScrapeError::SessionInit { .. }
            | ScrapeError::NavigationTimeout { .. }
            | ScrapeError::Navigation { .. } => ErrorScope::Unit,
            _ => ErrorScope::Run,
        }
    }

    /// Whether the run can continue after this error.
    pub fn is_fatal(&self) -> bool {
        self.scope() == ErrorScope::Run
    }
}

/// Result type alias for slotscrape operations
pub type Result<T> = std::result::Result<T, ScrapeError>;

//! Run report
//!
//! Records which units and rows failed during a run and why. A completed run
//! always produces a dataset plus one of these.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ScrapeError;

/// Why a unit ended up empty or partial.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    SessionInit,
    NavigationTimeout,
    Navigation,
    WorkerPanic,
    Other,
}

impl FailureKind {
    pub fn of(err: &ScrapeError) -> Self {
        match err {
            ScrapeError::SessionInit { .. } => FailureKind::SessionInit,
            ScrapeError::NavigationTimeout { .. } => FailureKind::NavigationTimeout,
            ScrapeError::Navigation { .. } => FailureKind::Navigation,
            _ => FailureKind::Other,
        }
    }
}

/// A unit-level failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitFailure {
    pub unit: String,
    pub kind: FailureKind,
    pub message: String,
}

impl UnitFailure {
    pub fn from_error(unit: impl Into<String>, err: &ScrapeError) -> Self {
        Self {
            unit: unit.into(),
            kind: FailureKind::of(err),
            message: err.to_string(),
        }
    }
}

/// A skipped table row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowIssue {
    pub unit: String,
    /// None when the block had no usable heading
    pub course: Option<String>,
    /// Position among the block's rows, header = 0
    pub row: usize,
    pub reason: String,
}

/// Summary of one scrape run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub term: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub concurrency: usize,
    pub units_total: usize,
    pub units_succeeded: usize,
    pub failures: Vec<UnitFailure>,
    pub malformed_rows: Vec<RowIssue>,
}

impl RunReport {
    pub fn new(term: impl Into<String>, concurrency: usize, started_at: DateTime<Utc>) -> Self {
        Self {
            term: term.into(),
            started_at,
            finished_at: started_at,
            concurrency,
            units_total: 0,
            units_succeeded: 0,
            failures: Vec::new(),
            malformed_rows: Vec::new(),
        }
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty() && self.malformed_rows.is_empty()
    }

    /// Failed unit ids, in report order.
    pub fn failed_units(&self) -> Vec<&str> {
        self.failures.iter().map(|f| f.unit.as_str()).collect()
    }

    /// Sort entries so the report is independent of completion order.
    pub fn normalize(&mut self) {
        self.failures.sort_by(|a, b| a.unit.cmp(&b.unit));
        self.malformed_rows
            .sort_by(|a, b| (&a.unit, &a.course, a.row).cmp(&(&b.unit, &b.course, b.row)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_failure_kind_of() {
        let err = ScrapeError::NavigationTimeout {
            unit: "chem".to_string(),
            timeout: Duration::from_secs(1),
        };
        assert_eq!(FailureKind::of(&err), FailureKind::NavigationTimeout);
        assert_eq!(FailureKind::of(&ScrapeError::NoSessions), FailureKind::Other);
    }

    #[test]
    fn test_unit_failure_from_error() {
        let err = ScrapeError::SessionInit {
            worker: 1,
            message: "boom".to_string(),
        };
        let failure = UnitFailure::from_error("chem", &err);
        assert_eq!(failure.unit, "chem");
        assert_eq!(failure.kind, FailureKind::SessionInit);
        assert!(failure.message.contains("boom"));
    }

    #[test]
    fn test_normalize_sorts_by_unit() {
        let mut report = RunReport::new("t", 2, Utc::now());
        for unit in ["phys", "chem", "bio"] {
            report.failures.push(UnitFailure {
                unit: unit.to_string(),
                kind: FailureKind::Navigation,
                message: String::new(),
            });
        }
        report.normalize();
        assert_eq!(report.failed_units(), vec!["bio", "chem", "phys"]);
        assert!(!report.is_clean());
    }

    #[test]
    fn test_kind_serializes_snake_case() {
        let json = serde_json::to_string(&FailureKind::NavigationTimeout).unwrap();
        assert_eq!(json, "\"navigation_timeout\"");
    }
}

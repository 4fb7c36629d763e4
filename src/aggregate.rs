//! Result aggregator
//!
//! Folds per-unit results into one Dataset after fan-in. Unit ids are disjoint
//! across workers, and the dataset and report are kept in sorted order, so the
//! outcome does not depend on which worker finished first.

use chrono::{DateTime, Utc};

use crate::domain::Dataset;
use crate::pool::UnitResult;
use crate::report::{RowIssue, RunReport, UnitFailure};

/// Accumulates unit results for one term.
#[derive(Debug, Default)]
pub struct Aggregator {
    dataset: Dataset,
    failures: Vec<UnitFailure>,
    skipped_rows: Vec<RowIssue>,
    succeeded: usize,
}

impl Aggregator {
    pub fn new(term: impl Into<String>) -> Self {
        Self {
            dataset: Dataset::new(term),
            ..Default::default()
        }
    }

    /// Fold in one unit's result.
    ///
    /// Failed units are still recorded, mapped to an empty course set. Should the
    /// same unit arrive twice, a successful result wins over a failed one.
    pub fn add(&mut self, result: UnitResult) {
        let ok = result.is_ok();
        if let Some(existing_failed) = self.failures.iter().position(|f| f.unit == result.unit) {
            if ok {
                self.failures.remove(existing_failed);
            } else {
                log::warn!("Duplicate failed result for unit {}, ignoring", result.unit);
                return;
            }
        } else if self.dataset.units.contains_key(&result.unit) {
            log::warn!("Duplicate result for unit {}, ignoring", result.unit);
            return;
        }

        match result.failure {
            Some(failure) => self.failures.push(failure),
            None => self.succeeded += 1,
        }
        self.skipped_rows.extend(result.skipped_rows);
        self.dataset.units.insert(result.unit, result.courses);
    }

    /// Finish into the dataset plus a report covering `started_at..now`.
    pub fn finish(self, concurrency: usize, started_at: DateTime<Utc>) -> (Dataset, RunReport) {
        let mut report = RunReport::new(self.dataset.term.clone(), concurrency, started_at);
        report.finished_at = Utc::now();
        report.units_total = self.dataset.units.len();
        report.units_succeeded = self.succeeded;
        report.failures = self.failures;
        report.malformed_rows = self.skipped_rows;
        report.normalize();
        (self.dataset, report)
    }
}

/// Merge results into a dataset, ignoring the report.
pub fn merge(term: &str, results: impl IntoIterator<Item = UnitResult>) -> Dataset {
    let mut aggregator = Aggregator::new(term);
    for result in results {
        aggregator.add(result);
    }
    aggregator.dataset
}
